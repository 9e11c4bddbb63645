use std::fmt::Display;

use crate::log::Log;

/// The output of a validator.
#[derive(Debug)]
pub struct ValidatorOutput<I, W, E, D> {
    pub(crate) infos: Vec<I>,
    pub(crate) warnings: Vec<W>,
    pub(crate) errors: Vec<E>,
    /// Additional validation data.
    pub(crate) data: D,
}

/// Dummy struct for infos, warnings, or errors that do not yet exist.
#[derive(Default, Debug, Clone, Eq, PartialEq, Hash)]
pub struct Empty;

impl Log for Empty {
    fn log(&self) {}
}

impl<I, W, E, D> Default for ValidatorOutput<I, W, E, D>
where
    D: Default,
{
    fn default() -> Self {
        Self {
            infos: Vec::new(),
            warnings: Vec::new(),
            errors: Vec::new(),
            data: D::default(),
        }
    }
}

impl<I, W, E, D> ValidatorOutput<I, W, E, D>
where
    I: Log,
    W: Log,
    E: Log + Display,
    D: Log + Default,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs all stored info, warning, and error messages.
    pub fn log(&self) {
        self.data.log();
        self.infos.log();
        self.warnings.log();
        self.errors.log();
    }

    /// Returns `true` is any errors were encountered.
    #[inline]
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Returns the number of errors encountered.
    #[inline]
    pub fn num_errors(&self) -> usize {
        self.errors.len()
    }

    #[inline]
    pub fn infos(&self) -> &[I] {
        &self.infos
    }

    #[inline]
    pub fn warnings(&self) -> &[W] {
        &self.warnings
    }

    #[inline]
    pub fn errors(&self) -> &[E] {
        &self.errors
    }

    #[inline]
    pub fn data(&self) -> &D {
        &self.data
    }

    /// Returns the first encountered error as a [`String`], if any.
    pub fn first_error(&self) -> Option<String> {
        self.errors.first().map(|e| format!("{e}"))
    }
}
