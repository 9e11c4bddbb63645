//! The PDK layer table.

use std::collections::BTreeSet;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{with_err_context, ErrorContext, Result};
use crate::layout::layers::LayerSpec;

lazy_static! {
    static ref SOURCE: Regex =
        Regex::new(r"<source>([^<]*)</source>").expect("failed to compile layer source pattern");
}

/// The set of layers declared by a layer-properties file.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct LayerTable {
    layers: BTreeSet<LayerSpec>,
}

impl LayerTable {
    /// Parses the `<source>` entries of a layer-properties document.
    ///
    /// Entries look like `1/0@1`; anything after `@` is ignored, and
    /// entries without an integer layer and datatype are skipped.
    pub fn parse(xml: &str) -> Self {
        let layers = SOURCE
            .captures_iter(xml)
            .filter_map(|caps| {
                let text = caps.get(1)?.as_str();
                let entry = text.split('@').next()?;
                entry.parse::<LayerSpec>().ok()
            })
            .collect();
        Self { layers }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = with_err_context(std::fs::read_to_string(path), || {
            ErrorContext::ReadFile(path.to_path_buf())
        })?;
        Ok(Self::parse(&xml))
    }

    #[inline]
    pub fn contains(&self, layer: LayerSpec) -> bool {
        self.layers.contains(&layer)
    }

    pub fn layers(&self) -> impl Iterator<Item = LayerSpec> + '_ {
        self.layers.iter().copied()
    }

    /// Returns the layers of `used` missing from the table, in ascending order.
    pub fn undeclared(&self, used: impl IntoIterator<Item = LayerSpec>) -> Vec<LayerSpec> {
        let used: BTreeSet<LayerSpec> = used.into_iter().collect();
        used.into_iter().filter(|l| !self.contains(*l)).collect()
    }
}
