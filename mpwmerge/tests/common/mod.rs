#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeZone};
use mpwmerge::config::MergeConfig;
use mpwmerge::discover::{discover, Submission};
use mpwmerge::layout::cell::Cell;
use mpwmerge::layout::layers::LayerSpec;
use mpwmerge::layout::Layout;
use subgeom::{Point, Rect};
use tempfile::TempDir;

pub const FLOORPLAN: LayerSpec = LayerSpec::new(99, 0);
pub const WAVEGUIDE: LayerSpec = LayerSpec::new(1, 0);
pub const TEXT: LayerSpec = LayerSpec::new(10, 0);

pub fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Rect {
    Rect::new(Point::new(x0, y0), Point::new(x1, y1))
}

pub fn fixed_time() -> DateTime<Local> {
    Local.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap()
}

/// A single-cell design whose floorplan is `w` by `h` at the origin.
pub fn design(name: &str, w: i64, h: i64) -> Layout {
    design_with_dbu(name, w, h, 0.001)
}

pub fn design_with_dbu(name: &str, w: i64, h: i64, dbu: f64) -> Layout {
    let mut layout = Layout::new("lib", dbu);
    let mut cell = Cell::new(name);
    cell.draw_rect(FLOORPLAN, rect(0, 0, w, h));
    cell.draw_rect(WAVEGUIDE, rect(w / 4, h / 4, w / 2, h / 2));
    layout.add_cell(cell);
    layout
}

/// Scratch `framework/` and `submissions/` directories.
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("framework")).unwrap();
        std::fs::create_dir(dir.path().join("submissions")).unwrap();
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn framework(&self) -> PathBuf {
        self.path().join("framework")
    }

    pub fn submissions(&self) -> PathBuf {
        self.path().join("submissions")
    }

    pub fn out(&self) -> PathBuf {
        self.path().join("merge")
    }

    pub fn add_submission(&self, name: &str, layout: &Layout) -> PathBuf {
        let path = self.submissions().join(name);
        layout.to_gds(&path).unwrap();
        path
    }

    pub fn add_framework(&self, name: &str, layout: &Layout) -> PathBuf {
        let path = self.framework().join(name);
        layout.to_gds(&path).unwrap();
        path
    }

    /// The default configuration pointed at this workspace.
    pub fn config(&self) -> MergeConfig {
        MergeConfig {
            framework_dir: self.framework(),
            submissions_dir: self.submissions(),
            ..Default::default()
        }
    }

    pub fn files(&self) -> Vec<Submission> {
        discover(&self.framework(), &self.submissions()).unwrap()
    }
}
