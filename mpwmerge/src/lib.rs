//! Multi-project-wafer layout merging and submission checks.
//!
//! Submissions are GDSII layouts authored independently by many
//! contributors. A [`merge::Merger`] normalizes, sanitizes, and clips each
//! one, then packs it onto a shared canvas without overlapping previously
//! placed floorplans. The [`verify`] module checks a single submission
//! against the black-box cell list and the PDK layer table.

pub mod category;
pub mod clip;
pub mod config;
pub mod discover;
pub mod error;
pub mod layout;
pub(crate) mod log;
pub mod merge;
pub mod occupancy;
pub mod packer;
pub mod preview;
pub mod report;
pub mod sanitize;
pub mod units;
pub mod validation;
pub mod verify;

pub mod deps {
    pub use {arcstr, gds21, subgeom};
}
