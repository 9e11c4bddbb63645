//! Discovery of layout files on disk.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use crate::deps::arcstr::ArcStr;
use crate::error::{with_err_context, ErrorContext, Result};

/// Format of the modification stamp appended to wrapper cell names.
pub const DATE_STAMP_FORMAT: &str = "%Y%m%d_%H%M";

/// The directory a file was found in.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum Origin {
    Framework,
    Submission,
}

/// Layout interchange formats recognized by extension.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum LayoutFormat {
    Gds,
    Oasis,
}

impl LayoutFormat {
    /// Determines the format from the extension of `path`, ignoring case.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_string_lossy().to_lowercase();
        match ext.as_str() {
            "gds" => Some(Self::Gds),
            "oas" => Some(Self::Oasis),
            _ => None,
        }
    }
}

impl Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Framework => write!(f, "framework"),
            Self::Submission => write!(f, "submission"),
        }
    }
}

/// A discovered layout file.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub path: PathBuf,
    /// The file name, including extension.
    pub name: ArcStr,
    pub origin: Origin,
    pub format: LayoutFormat,
    /// Last modification time, used as a version stamp.
    pub modified: DateTime<Local>,
}

impl Submission {
    /// Creates a submission record for the file at `path`.
    ///
    /// Returns [`None`] if `path` does not have a layout extension.
    pub fn from_path(path: impl Into<PathBuf>, origin: Origin) -> Result<Option<Self>> {
        let path = path.into();
        let Some(format) = LayoutFormat::from_path(&path) else {
            return Ok(None);
        };
        let name: ArcStr = match path.file_name() {
            Some(name) => name.to_string_lossy().as_ref().into(),
            None => return Ok(None),
        };
        let modified = with_err_context(
            std::fs::metadata(&path).and_then(|m| m.modified()),
            || ErrorContext::ReadFile(path.clone()),
        )?;
        Ok(Some(Self {
            path,
            name,
            origin,
            format,
            modified: DateTime::from(modified),
        }))
    }

    /// Returns the modification time formatted as `YYYYMMDD_HHMM`.
    pub fn date_stamp(&self) -> String {
        self.modified.format(DATE_STAMP_FORMAT).to_string()
    }
}

/// Lists the layout files of `framework` followed by those of `submissions`.
///
/// Directories are scanned non-recursively and each is sorted by file name.
/// A missing directory contributes no files.
pub fn discover(framework: &Path, submissions: &Path) -> Result<Vec<Submission>> {
    let mut files = scan(framework, Origin::Framework)?;
    files.extend(scan(submissions, Origin::Submission)?);
    Ok(files)
}

/// Lists the layout files directly inside `dir`, sorted by name.
pub fn scan(dir: &Path, origin: Origin) -> Result<Vec<Submission>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = with_err_context(std::fs::read_dir(dir), || {
        ErrorContext::ReadFile(dir.to_path_buf())
    })?;
    let mut paths = Vec::new();
    for entry in entries {
        let entry = with_err_context(entry, || ErrorContext::ReadFile(dir.to_path_buf()))?;
        let path = entry.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        if let Some(submission) = Submission::from_path(path, origin)? {
            files.push(submission);
        }
    }
    Ok(files)
}
