//! Submission checks.
//!
//! [`check_file`] runs, in order: loading, the single-top-cell rule, the
//! footprint extent check, black-box substitution with the marker scan,
//! and the PDK layer check. Every violation is one error.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use subgeom::Rect;

use self::blackbox::{cells_with_marker, replace_black_boxes, Replacement};
use self::pdk::LayerTable;
use self::rdb::ResultsDb;
use crate::config::CheckConfig;
use crate::deps::arcstr::ArcStr;
use crate::discover::LayoutFormat;
use crate::error::{ErrorSource, Result};
use crate::layout::layers::LayerSpec;
use crate::layout::Layout;
use crate::log::Log;
use crate::validation::ValidatorOutput;

pub mod blackbox;
pub mod pdk;
pub mod rdb;

pub type CheckOutput = ValidatorOutput<Info, Warning, CheckError, CheckData>;

/// Data gathered while checking.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckData {
    pub top: Option<ArcStr>,
    /// Combined extent of the extent layers.
    pub extent: Option<Rect>,
    pub replacements: Vec<Replacement>,
}

impl CheckData {
    /// Total number of substituted black-box instances.
    pub fn replaced(&self) -> usize {
        self.replacements.iter().map(|r| r.count).sum()
    }
}

impl Log for CheckData {
    fn log(&self) {
        use crate::log::info;
        if let Some(top) = &self.top {
            info!("top cell: {top}");
        }
        info!("number of black box cells replaced: {}", self.replaced());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Info {
    /// The extent of the extent layers, in microns.
    Extent { width: f64, height: f64 },
    /// Instances of a black-box cell were substituted.
    Replaced { name: ArcStr, count: usize },
}

impl Display for Info {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Extent { width, height } => write!(
                f,
                "bounding box of selected layers is {width:.3} um x {height:.3} um"
            ),
            Self::Replaced { name, count } => write!(f, "black box cell {name}: {count} instances"),
        }
    }
}

impl Log for Info {
    fn log(&self) {
        use crate::log::info;
        info!("{self}");
    }
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Warning {
    /// No layer table was configured, so layers were not checked.
    NoLayerTable,
}

impl Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoLayerTable => write!(f, "no PDK layer table configured; skipping layer check"),
        }
    }
}

impl Log for Warning {
    fn log(&self) {
        use crate::log::warn;
        warn!("{self}");
    }
}

/// A check violation.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum CheckError {
    /// The file could not be read.
    Load(String),
    /// The layout does not have exactly one top cell.
    TopCells { names: Vec<ArcStr> },
    /// The extent layers have no shapes.
    NoExtent { layers: Vec<LayerSpec> },
    /// The extent exceeds the allowed footprint; sizes in microns.
    Oversized {
        width: f64,
        height: f64,
        max_width: f64,
        max_height: f64,
    },
    /// A cell still carries black-box marker geometry after substitution.
    BlackBox { cell: ArcStr },
    /// The layer table could not be read.
    LayerTable(String),
    /// A layer used by the design is not declared by the PDK.
    UndeclaredLayer(LayerSpec),
}

impl CheckError {
    /// Category name used in the results database.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Load(_) => "load",
            Self::TopCells { .. } => "top_cells",
            Self::NoExtent { .. } | Self::Oversized { .. } => "floorplan",
            Self::BlackBox { .. } => "black_box",
            Self::LayerTable(_) | Self::UndeclaredLayer(_) => "pdk_layers",
        }
    }
}

impl Display for CheckError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Load(msg) => write!(f, "error loading layout: {msg}"),
            Self::TopCells { names } => write!(
                f,
                "layout does not have 1 top cell; it has {}: {names:?}",
                names.len()
            ),
            Self::NoExtent { layers } => {
                write!(f, "no shapes found on layers")?;
                for layer in layers {
                    write!(f, " {layer}")?;
                }
                Ok(())
            }
            Self::Oversized {
                width,
                height,
                max_width,
                max_height,
            } => write!(
                f,
                "bounding box of selected layers ({width:.3} um x {height:.3} um) exceeds allowed size {max_width:.3} um x {max_height:.3} um"
            ),
            Self::BlackBox { cell } => write!(
                f,
                "unidentified black box cell {cell}; only unmodified PDK cells may be used"
            ),
            Self::LayerTable(msg) => write!(f, "error reading PDK layer table: {msg}"),
            Self::UndeclaredLayer(layer) => {
                write!(f, "the layer {layer} in the design is not defined in the PDK")
            }
        }
    }
}

impl Log for CheckError {
    fn log(&self) {
        use crate::log::error;
        error!("{self}");
    }
}

/// Loads `path` and checks it.
pub fn check_file(path: impl AsRef<Path>, config: &CheckConfig) -> CheckOutput {
    let path = path.as_ref();
    match load(path) {
        Ok(mut layout) => check_layout(&mut layout, config),
        Err(err) => {
            let mut output = CheckOutput::new();
            output.errors.push(CheckError::Load(err.to_string()));
            output
        }
    }
}

fn load(path: &Path) -> Result<Layout> {
    match LayoutFormat::from_path(path) {
        Some(LayoutFormat::Oasis) => Err(ErrorSource::UnsupportedFormat(path.to_path_buf()).into()),
        _ => Layout::from_gds(path),
    }
}

/// Checks a loaded layout.
///
/// Black-box cells are substituted in place.
pub fn check_layout(layout: &mut Layout, config: &CheckConfig) -> CheckOutput {
    let mut output = CheckOutput::new();
    let name = |layout: &Layout, key| {
        layout
            .cell(key)
            .map(|c| c.name().clone())
            .unwrap_or_default()
    };

    let tops = layout.top_cells();
    if tops.len() != 1 {
        output.errors.push(CheckError::TopCells {
            names: tops.iter().map(|k| name(layout, *k)).collect(),
        });
        return output;
    }
    let top = tops[0];
    output.data.top = Some(name(layout, top));

    let um = |v: i64| v as f64 * layout.dbu();
    match layout.layer_bbox(top, &config.extent_layers).into_option() {
        None => output.errors.push(CheckError::NoExtent {
            layers: config.extent_layers.clone(),
        }),
        Some(extent) => {
            if extent.width() > config.max_width || extent.height() > config.max_height {
                output.errors.push(CheckError::Oversized {
                    width: um(extent.width()),
                    height: um(extent.height()),
                    max_width: um(config.max_width),
                    max_height: um(config.max_height),
                });
            } else {
                output.infos.push(Info::Extent {
                    width: um(extent.width()),
                    height: um(extent.height()),
                });
            }
            output.data.extent = Some(extent);
        }
    }

    let replacements = replace_black_boxes(layout, &config.black_box_cells);
    for r in replacements.iter().filter(|r| r.count > 0) {
        output.infos.push(Info::Replaced {
            name: r.name.clone(),
            count: r.count,
        });
    }
    output.data.replacements = replacements;
    for cell in cells_with_marker(layout, top, config.marker_layer) {
        output.errors.push(CheckError::BlackBox { cell });
    }

    match &config.layer_table {
        None => output.warnings.push(Warning::NoLayerTable),
        Some(path) => match LayerTable::from_file(path) {
            Ok(table) => {
                for layer in table.undeclared(layout.layers_under(top)) {
                    output.errors.push(CheckError::UndeclaredLayer(layer));
                }
            }
            Err(err) => output.errors.push(CheckError::LayerTable(err.to_string())),
        },
    }

    output
}

/// Returns the results database path for `input`: same directory and stem, `.lyrdb` extension.
pub fn rdb_path(input: &Path) -> PathBuf {
    input.with_extension("lyrdb")
}

/// Builds the results database for a checked file.
pub fn results_db(input: &Path, output: &CheckOutput) -> ResultsDb {
    let top = output
        .data()
        .top
        .as_ref()
        .map(|t| t.to_string())
        .unwrap_or_default();
    let mut db = ResultsDb::new(
        "Submission check",
        input.to_string_lossy(),
        top.clone(),
    );
    for err in output.errors() {
        let cell = match err {
            CheckError::BlackBox { cell } => cell.to_string(),
            _ => top.clone(),
        };
        db.push(err.category(), cell, err.to_string());
    }
    db
}

/// Writes the results database for `input` next to it, returning its path.
pub fn write_results(input: &Path, output: &CheckOutput) -> Result<PathBuf> {
    let path = rdb_path(input);
    results_db(input, output).write(&path)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use subgeom::{Point, Rect};

    use super::*;
    use crate::layout::cell::{Cell, Instance};

    fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Rect {
        Rect::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    fn with_gc(gc_name: &str, width: i64) -> Layout {
        let mut layout = Layout::new("lib", 0.001);
        let mut gc = Cell::new(gc_name);
        gc.draw_rect(LayerSpec(998, 0), rect(0, 0, 30_000, 30_000));
        gc.draw_rect(LayerSpec(1, 0), rect(0, 0, 30_000, 10_000));
        let gc = layout.add_cell(gc);
        let mut top = Cell::new("top");
        top.add_inst(Instance::new(gc));
        top.draw_rect(LayerSpec(1, 0), rect(0, 0, width, 500));
        layout.add_cell(top);
        layout
    }

    #[test]
    fn clean_design_has_no_errors() {
        let mut layout = with_gc("ebeam_gc_te1550", 100_000);
        let output = check_layout(&mut layout, &CheckConfig::default());
        assert_eq!(output.num_errors(), 0, "{:?}", output.errors());
        assert_eq!(output.data().replaced(), 1);
        assert_eq!(output.data().top.as_deref(), Some("top"));
        assert_eq!(output.warnings(), &[Warning::NoLayerTable]);
    }

    #[test]
    fn errors_accumulate() {
        let mut layout = with_gc("custom_gc", 700_000);
        let output = check_layout(&mut layout, &CheckConfig::default());
        assert_eq!(output.num_errors(), 2);
        assert!(matches!(output.errors()[0], CheckError::Oversized { .. }));
        assert_eq!(
            output.errors()[1],
            CheckError::BlackBox {
                cell: arcstr::literal!("custom_gc")
            }
        );
    }

    #[test]
    fn two_top_cells_stop_the_check() {
        let mut layout = with_gc("ebeam_gc_te1550", 100);
        layout.create_cell("stray");
        let output = check_layout(&mut layout, &CheckConfig::default());
        assert_eq!(output.num_errors(), 1);
        assert_eq!(output.errors()[0].category(), "top_cells");
        assert!(output.data().top.is_none());
    }

    #[test]
    fn missing_extent_layers() {
        let mut layout = Layout::new("lib", 0.001);
        let mut top = Cell::new("top");
        top.draw_rect(LayerSpec(99, 0), rect(0, 0, 10, 10));
        layout.add_cell(top);
        let output = check_layout(&mut layout, &CheckConfig::default());
        assert_eq!(output.num_errors(), 1);
        assert!(matches!(output.errors()[0], CheckError::NoExtent { .. }));
    }

    #[test]
    fn undeclared_layers_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let table = dir.path().join("EBeam.lyp");
        std::fs::write(&table, "<source>1/0@1</source><source>998/0@1</source>").unwrap();
        let config = CheckConfig::builder().layer_table(&table).build().unwrap();
        let mut layout = with_gc("ebeam_gc_te1550", 100_000);
        let top = layout.top_cells()[0];
        layout
            .cell_mut(top)
            .unwrap()
            .draw_rect(LayerSpec(63, 0), rect(0, 0, 10, 10));
        let output = check_layout(&mut layout, &config);
        assert_eq!(output.errors(), &[CheckError::UndeclaredLayer(LayerSpec(63, 0))]);
    }

    #[test]
    fn unreadable_file_is_one_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.gds");
        std::fs::write(&path, b"not a gds file").unwrap();
        let output = check_file(&path, &CheckConfig::default());
        assert_eq!(output.num_errors(), 1);
        assert!(matches!(output.errors()[0], CheckError::Load(_)));
        let rdb = write_results(&path, &output).unwrap();
        assert_eq!(rdb, dir.path().join("broken.lyrdb"));
        assert!(std::fs::read_to_string(rdb).unwrap().contains("'load'"));
    }
}
