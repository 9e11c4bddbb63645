use std::fmt::{Debug, Display};
use std::path::PathBuf;

use thiserror::Error;

use crate::deps::arcstr::ArcStr;
use crate::layout::error::LayoutError;
use crate::packer::PackError;

pub type Result<T> = std::result::Result<T, MergeError>;

pub struct MergeError {
    pub(crate) source: ErrorSource,
    pub(crate) context: Vec<ErrorContext>,
}

impl MergeError {
    pub fn source(&self) -> &ErrorSource {
        &self.source
    }

    /// Returns `true` if the error should abort the whole run
    /// rather than only the submission being processed.
    pub fn is_fatal(&self) -> bool {
        matches!(self.source, ErrorSource::Placement(_) | ErrorSource::InvalidConfig(_))
    }
}

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.source)?;
        for item in self.context.iter() {
            write!(f, "\n\twhile {}", item)?;
        }
        Ok(())
    }
}

impl Debug for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.source)?;
        if !self.context.is_empty() {
            writeln!(f, "\nError occurred:")?;
            for (i, item) in self.context.iter().enumerate() {
                writeln!(f, "\t{}: {:?}", i, item)?;
            }
        }
        Ok(())
    }
}

impl<T> From<T> for MergeError
where
    T: Into<ErrorSource>,
{
    fn from(value: T) -> Self {
        Self {
            source: value.into(),
            context: Vec::new(),
        }
    }
}

impl MergeError {
    pub fn new(source: impl Into<ErrorSource>) -> Self {
        Self {
            source: source.into(),
            context: Vec::new(),
        }
    }

    pub fn with_context(mut self, ctx: impl Into<ErrorContext>) -> Self {
        self.context.push(ctx.into());
        self
    }

    #[inline]
    pub fn into_inner(self) -> ErrorSource {
        self.source
    }
}

#[inline]
pub fn with_err_context<T, E, C>(result: std::result::Result<T, E>, ctx: C) -> Result<T>
where
    C: FnOnce() -> ErrorContext,
    E: Into<MergeError>,
{
    result.map_err(|err| err.into().with_context(ctx()))
}

#[derive(Debug, Clone, Eq, PartialEq)]
#[non_exhaustive]
pub enum ErrorContext {
    CreateDir(PathBuf),
    CreateFile(PathBuf),
    ReadFile(PathBuf),
    Submission(ArcStr),
    Task(ArcStr),
}

impl Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ErrorContext::*;
        match self {
            CreateDir(path) => write!(f, "creating directory {path:?}"),
            CreateFile(path) => write!(f, "creating file {path:?}"),
            ReadFile(path) => write!(f, "reading file {path:?}"),
            Submission(name) => write!(f, "processing submission {name}"),
            Task(task) => write!(f, "{task}"),
        }
    }
}

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ErrorSource {
    #[error("internal error: {0}")]
    Internal(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported layout format: {0:?}")]
    UnsupportedFormat(PathBuf),

    #[error("cannot rescale database unit {native} to {canonical} (ratio {ratio})")]
    InvalidUnits {
        native: f64,
        canonical: f64,
        ratio: f64,
    },

    #[error("layout has no usable top cell")]
    NoTopCell,

    #[error("no slot available on the canvas: {0}")]
    Placement(#[from] PackError),

    #[error("error while converting layout: {0}")]
    Layout(#[from] LayoutError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("error parsing TOML: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("error writing CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("error writing image: {0}")]
    Image(#[from] image::ImageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_is_rendered_innermost_first() {
        let err = MergeError::new(ErrorSource::NoTopCell)
            .with_context(ErrorContext::Submission(arcstr::literal!("EBeam_a.gds")))
            .with_context(ErrorContext::Task(arcstr::literal!("merging submissions")));
        let text = err.to_string();
        assert!(text.starts_with("layout has no usable top cell"));
        assert!(text.contains("while processing submission EBeam_a.gds"));
        assert!(text.ends_with("while merging submissions"));
        assert!(!err.is_fatal());
    }
}
