//! GDS layer specifications.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A GDS layer specification: layer number and datatype.
///
/// Written as `layer/datatype`, e.g. `99/0`.
#[derive(
    Debug, Default, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct LayerSpec(pub i16, pub i16);

impl LayerSpec {
    #[inline]
    pub const fn new(layer: i16, datatype: i16) -> Self {
        Self(layer, datatype)
    }

    #[inline]
    pub fn layer(&self) -> i16 {
        self.0
    }

    #[inline]
    pub fn datatype(&self) -> i16 {
        self.1
    }
}

impl Display for LayerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("error parsing layer `{original}`; expected `layer/datatype`")]
pub struct LayerParseError {
    original: String,
}

impl FromStr for LayerSpec {
    type Err = LayerParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || LayerParseError {
            original: s.to_string(),
        };
        let (layer, datatype) = s.trim().split_once('/').ok_or_else(err)?;
        Ok(Self(
            layer.trim().parse().map_err(|_| err())?,
            datatype.trim().parse().map_err(|_| err())?,
        ))
    }
}

impl TryFrom<String> for LayerSpec {
    type Error = LayerParseError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<LayerSpec> for String {
    fn from(value: LayerSpec) -> Self {
        value.to_string()
    }
}

impl From<gds21::GdsLayerSpec> for LayerSpec {
    fn from(other: gds21::GdsLayerSpec) -> Self {
        Self(other.layer, other.xtype)
    }
}

impl From<(i16, i16)> for LayerSpec {
    fn from(value: (i16, i16)) -> Self {
        Self(value.0, value.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let spec: LayerSpec = "998/0".parse().unwrap();
        assert_eq!(spec, LayerSpec(998, 0));
        assert_eq!(spec.to_string(), "998/0");
        assert_eq!(" 1 / 10 ".parse::<LayerSpec>().unwrap(), LayerSpec(1, 10));
        assert!("1".parse::<LayerSpec>().is_err());
        assert!("a/0".parse::<LayerSpec>().is_err());
    }
}
