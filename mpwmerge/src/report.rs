//! Structured merge records and their renderings.

use std::fmt::Display;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::deps::arcstr::ArcStr;
use crate::error::{with_err_context, ErrorContext, Result};
use crate::log::{error, info, warn, Log};

/// Severity of a [`Record`].
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Info,
    Warning,
    Error,
}

/// One logged event.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub kind: RecordKind,
    /// The file the event concerns, if any.
    pub submission: Option<ArcStr>,
    pub message: String,
}

impl Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            RecordKind::Info => write!(f, "{}", self.message),
            RecordKind::Warning => write!(f, "WARNING: {}", self.message),
            RecordKind::Error => write!(f, "ERROR: {}", self.message),
        }
    }
}

impl Log for Record {
    fn log(&self) {
        let sub = self.submission.as_deref().unwrap_or("-");
        match self.kind {
            RecordKind::Info => info!("[{sub}] {}", self.message),
            RecordKind::Warning => warn!("[{sub}] {}", self.message),
            RecordKind::Error => error!("[{sub}] {}", self.message),
        }
    }
}

/// A committed placement, one row of the coordinates table.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub file: ArcStr,
    pub category: ArcStr,
    /// The user's design cell.
    pub cell: ArcStr,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

#[derive(Debug, Clone, Eq, PartialEq)]
enum Entry {
    /// Start of the records for one file.
    Section { file: ArcStr, date: String },
    Record(Record),
}

/// The provenance log of a merge run.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Report {
    entries: Vec<Entry>,
    placements: Vec<Placement>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts the section for `file`, modified at `date`.
    pub fn begin(&mut self, file: &ArcStr, date: impl Into<String>) {
        let date = date.into();
        info!("Loading: {file}, dated {date}");
        self.entries.push(Entry::Section {
            file: file.clone(),
            date,
        });
    }

    /// Adds a record and emits it through the logging facade.
    pub fn push(&mut self, kind: RecordKind, submission: Option<&ArcStr>, message: impl Into<String>) {
        let record = Record {
            kind,
            submission: submission.cloned(),
            message: message.into(),
        };
        record.log();
        self.entries.push(Entry::Record(record));
    }

    #[inline]
    pub fn info(&mut self, submission: Option<&ArcStr>, message: impl Into<String>) {
        self.push(RecordKind::Info, submission, message);
    }

    #[inline]
    pub fn warn(&mut self, submission: Option<&ArcStr>, message: impl Into<String>) {
        self.push(RecordKind::Warning, submission, message);
    }

    #[inline]
    pub fn error(&mut self, submission: Option<&ArcStr>, message: impl Into<String>) {
        self.push(RecordKind::Error, submission, message);
    }

    /// Iterates over all records in order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Record(r) => Some(r),
            Entry::Section { .. } => None,
        })
    }

    /// Iterates over the records concerning `file`.
    pub fn records_for<'a>(&'a self, file: &'a str) -> impl Iterator<Item = &'a Record> + 'a {
        self.records()
            .filter(move |r| r.submission.as_deref() == Some(file))
    }

    /// Returns the number of records of `kind`.
    pub fn count(&self, kind: RecordKind) -> usize {
        self.records().filter(|r| r.kind == kind).count()
    }

    pub fn add_placement(&mut self, placement: Placement) {
        self.placements.push(placement);
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Renders the report as the text log.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in self.entries.iter() {
            match entry {
                Entry::Section { file, date } => {
                    out.push_str(&format!("\nLoading: {file}, dated {date}\n"));
                }
                Entry::Record(r) if r.submission.is_some() => {
                    out.push_str(&format!("  - {r}\n"));
                }
                Entry::Record(r) => {
                    out.push_str(&format!("{r}\n"));
                }
            }
        }
        out
    }

    /// Writes the text log to `path`.
    pub fn write_text(&self, path: &Path) -> Result<()> {
        with_err_context(std::fs::write(path, self.render()), || {
            ErrorContext::CreateFile(path.to_path_buf())
        })
    }

    /// Writes the placement table to `path` as CSV.
    pub fn write_coords(&self, path: &Path) -> Result<()> {
        let inner = || -> Result<()> {
            let mut writer = csv::Writer::from_path(path)?;
            for placement in self.placements.iter() {
                writer.serialize(placement)?;
            }
            writer.flush()?;
            Ok(())
        };
        with_err_context(inner(), || ErrorContext::CreateFile(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_groups_by_file() {
        let file = arcstr::literal!("EBeam_a.gds");
        let mut report = Report::new();
        report.info(None, "Date: 2025-05-01, 12:00:00 local time");
        report.begin(&file, "20250501_1200");
        report.info(Some(&file), "course name: edXphot1x");
        report.warn(Some(&file), "Cell was clipped to maximum size of 605000 X 410000");
        let text = report.render();
        assert_eq!(
            text,
            "Date: 2025-05-01, 12:00:00 local time\n\
             \nLoading: EBeam_a.gds, dated 20250501_1200\n\
             \x20 - course name: edXphot1x\n\
             \x20 - WARNING: Cell was clipped to maximum size of 605000 X 410000\n"
        );
        assert_eq!(report.count(RecordKind::Warning), 1);
        assert_eq!(report.records_for("EBeam_a.gds").count(), 2);
    }

    #[test]
    fn coords_are_written_as_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("EBeam.coords");
        let mut report = Report::new();
        report.add_placement(Placement {
            file: arcstr::literal!("EBeam_a.gds"),
            category: arcstr::literal!("edXphot1x"),
            cell: arcstr::literal!("top"),
            x: 0,
            y: 418_000,
            width: 605_000,
            height: 410_000,
        });
        report.write_coords(&path).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "file,category,cell,x,y,width,height\nEBeam_a.gds,edXphot1x,top,0,418000,605000,410000\n"
        );
    }
}
