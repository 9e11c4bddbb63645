//! Conversion between the layout data model and interchange formats.

pub mod error;
pub mod gds;
