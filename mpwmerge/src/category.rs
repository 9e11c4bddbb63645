//! Filename-based routing of submissions.

use std::path::Path;

use crate::config::{CategoryConfig, MergeConfig, ReservedFile};

/// Where a discovered file goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// A fixed infrastructure file placed directly under the top cell.
    Reserved(&'a ReservedFile),
    /// A submission packed into the container of its category.
    Category(&'a CategoryConfig),
}

/// Returns the category of `file_name`.
///
/// Keywords are matched case-insensitively as substrings, in configuration
/// order. Unmatched names get the default category; [`None`] is returned
/// only if the default category is not configured.
pub fn categorize<'a>(config: &'a MergeConfig, file_name: &str) -> Option<&'a CategoryConfig> {
    let lower = file_name.to_lowercase();
    config
        .categories
        .iter()
        .find(|c| lower.contains(&c.keyword.to_lowercase()))
        .or_else(|| config.category(&config.default_category))
}

/// Returns the reserved entry whose stem matches the stem of `path`, ignoring case.
pub fn reserved<'a>(config: &'a MergeConfig, path: &Path) -> Option<&'a ReservedFile> {
    let stem = path.file_stem()?.to_string_lossy().to_lowercase();
    config
        .reserved
        .iter()
        .find(|r| r.stem.to_lowercase() == stem)
}

/// Routes `path` to a fixed placement or a category.
pub fn route<'a>(config: &'a MergeConfig, path: &Path) -> Option<Route<'a>> {
    if let Some(r) = reserved(config, path) {
        return Some(Route::Reserved(r));
    }
    let name = path.file_name()?.to_string_lossy();
    categorize(config, &name).map(Route::Category)
}
