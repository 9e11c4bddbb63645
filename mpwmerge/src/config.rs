//! Merge and check configuration.
//!
//! Every field has a default, so a TOML file only needs to name the
//! settings it overrides.

use std::path::{Path, PathBuf};

use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::deps::arcstr::ArcStr;
use crate::error::{ErrorSource, Result};
use crate::layout::layers::LayerSpec;

/// Settings for a merge run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default)]
pub struct MergeConfig {
    /// Name of the top cell of the merged layout.
    #[builder(setter(into))]
    pub top_cell_name: ArcStr,
    /// Base name of the output files.
    #[builder(setter(into))]
    pub output_name: ArcStr,
    /// Maximum footprint width of one submission, in database units.
    pub cell_width: i64,
    /// Maximum footprint height of one submission, in database units.
    pub cell_height: i64,
    pub gap_width: i64,
    pub gap_height: i64,
    /// Width of the canvas. Placement fails past this point.
    pub chip_width: i64,
    /// Height at which a column wraps.
    pub column_height: i64,
    /// Canonical database unit, in microns.
    pub dbu: f64,
    /// Layers kept for every submission.
    pub layers_keep: Vec<LayerSpec>,
    pub text_layer: LayerSpec,
    pub floorplan_layer: LayerSpec,
    /// Extra layer kept for trusted categories only.
    pub sem_layer: LayerSpec,
    /// Layer migrations applied to the whole canvas before export.
    pub layers_move: Vec<LayerMove>,
    /// Ordered category rules; the first matching keyword wins.
    pub categories: Vec<CategoryConfig>,
    /// Name of the category used when no keyword matches.
    #[builder(setter(into))]
    pub default_category: ArcStr,
    /// Files inserted at fixed offsets, bypassing the packer.
    pub reserved: Vec<ReservedFile>,
    /// Maximum number of cursor advances for a single placement.
    pub max_retries: usize,
    #[builder(setter(into))]
    pub framework_dir: PathBuf,
    #[builder(setter(into))]
    pub submissions_dir: PathBuf,
}

/// Moves every shape on `from` onto `to`.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LayerMove {
    pub from: LayerSpec,
    pub to: LayerSpec,
}

/// A submission category.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    /// Case-insensitive filename substring selecting this category.
    pub keyword: ArcStr,
    pub name: ArcStr,
    /// Name of the container cell under the top cell.
    pub container: ArcStr,
    /// Trusted categories may keep the SEM layer.
    #[serde(default)]
    pub trusted: bool,
}

/// A file placed at a fixed position under the top cell.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct ReservedFile {
    /// File stem, matched case-insensitively.
    pub stem: ArcStr,
    pub x: i64,
    pub y: i64,
}

impl CategoryConfig {
    pub fn new(keyword: &str, name: &str, container: &str, trusted: bool) -> Self {
        Self {
            keyword: keyword.into(),
            name: name.into(),
            container: container.into(),
            trusted,
        }
    }
}

impl Default for MergeConfig {
    fn default() -> Self {
        let l = LayerSpec::new;
        Self {
            top_cell_name: arcstr::literal!("EBeam_2025_05"),
            output_name: arcstr::literal!("EBeam"),
            cell_width: 605_000,
            cell_height: 410_000,
            gap_width: 8_000,
            gap_height: 8_000,
            chip_width: 8_650_000,
            column_height: 8_780_000,
            dbu: 0.001,
            layers_keep: vec![
                l(1, 0),
                l(1, 10),
                l(68, 0),
                l(81, 0),
                l(10, 0),
                l(99, 0),
                l(26, 0),
                l(31, 0),
                l(32, 0),
                l(33, 0),
                l(998, 0),
            ],
            text_layer: l(10, 0),
            floorplan_layer: l(99, 0),
            sem_layer: l(200, 0),
            layers_move: vec![LayerMove {
                from: l(31, 0),
                to: l(1, 0),
            }],
            categories: vec![
                CategoryConfig::new("elec413", "ELEC413", "ELEC413", true),
                CategoryConfig::new("openebl", "openEBL", "openEBL", false),
                CategoryConfig::new("siepic_passives", "SiEPIC_Passives", "SiEPIC_Passives", true),
                CategoryConfig::new("ebeam", "edXphot1x", "edX", true),
            ],
            default_category: arcstr::literal!("edXphot1x"),
            reserved: vec![
                ReservedFile {
                    stem: arcstr::literal!("EBL_Framework_1cm_PCM_static"),
                    x: 0,
                    y: 0,
                },
                ReservedFile {
                    stem: arcstr::literal!("UBC_static"),
                    x: 8_780_000,
                    y: 8_780_000,
                },
            ],
            max_retries: 100_000,
            framework_dir: PathBuf::from("framework"),
            submissions_dir: PathBuf::from("submissions"),
        }
    }
}

impl MergeConfig {
    #[inline]
    pub fn builder() -> MergeConfigBuilder {
        MergeConfigBuilder::default()
    }

    pub fn from_toml(input: &str) -> Result<Self> {
        let value: Self = toml::from_str(input)?;
        value.validate()?;
        Ok(value)
    }

    /// Reads a config file. Relative directories are resolved against the file's directory.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let mut value = Self::from_toml(&input)?;
        if let Some(base) = path.parent() {
            value.framework_dir = resolve(base, &value.framework_dir);
            value.submissions_dir = resolve(base, &value.submissions_dir);
        }
        Ok(value)
    }

    /// Checks the settings for consistency.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| -> Result<()> { Err(ErrorSource::InvalidConfig(msg).into()) };
        if self.cell_width <= 0 || self.cell_height <= 0 {
            return invalid(format!(
                "cell dimensions must be positive, got {} x {}",
                self.cell_width, self.cell_height
            ));
        }
        if self.gap_width < 0 || self.gap_height < 0 {
            return invalid("gaps must not be negative".to_string());
        }
        if self.column_height < self.cell_height || self.chip_width < self.cell_width {
            return invalid("canvas is smaller than a single cell".to_string());
        }
        if !self.dbu.is_finite() || self.dbu <= 0. {
            return invalid(format!("invalid database unit {}", self.dbu));
        }
        if self.max_retries == 0 {
            return invalid("max_retries must be at least 1".to_string());
        }
        if self.category(&self.default_category).is_none() {
            return invalid(format!(
                "default category {} is not among the configured categories",
                self.default_category
            ));
        }
        Ok(())
    }

    /// Looks up a category by name.
    pub fn category(&self, name: &str) -> Option<&CategoryConfig> {
        self.categories.iter().find(|c| c.name == name)
    }

    /// Returns the layers kept for submissions of `category`.
    pub fn allowed_layers(&self, category: &CategoryConfig) -> Vec<LayerSpec> {
        let mut layers = self.layers_keep.clone();
        if category.trusted && !layers.contains(&self.sem_layer) {
            layers.push(self.sem_layer);
        }
        layers
    }
}

/// Settings for the submission check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(default)]
#[builder(default)]
pub struct CheckConfig {
    /// Names of the opaque library cells that are substituted before the marker scan.
    pub black_box_cells: Vec<ArcStr>,
    /// Layer marking black-box geometry.
    pub marker_layer: LayerSpec,
    /// Layers whose combined extent must fit in the allowed footprint.
    pub extent_layers: Vec<LayerSpec>,
    pub max_width: i64,
    pub max_height: i64,
    /// Layer-properties file declaring the layers of the PDK.
    #[builder(setter(into, strip_option))]
    pub layer_table: Option<PathBuf>,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            black_box_cells: [
                "ebeam_gc_te1550",
                "ebeam_gc_tm1550",
                "GC_TE_1550_8degOxide_BB",
                "GC_TM_1550_8degOxide_BB",
                "ebeam_gc_te1310",
                "ebeam_gc_te1310_8deg",
                "GC_TE_1310_8degOxide_BB",
                "ebeam_GC_TM_1310_8degOxide",
                "GC_TM_1310_8degOxide_BB",
                "GC_TM_1310_8degOxide_BB$1",
                "ebeam_splitter_swg_assist_te1310",
                "ebeam_splitter_swg_assist_te1550",
                "ebeam_dream_splitter_1x2_te1550_BB",
            ]
            .into_iter()
            .map(ArcStr::from)
            .collect(),
            marker_layer: LayerSpec::new(998, 0),
            extent_layers: vec![LayerSpec::new(1, 0), LayerSpec::new(4, 0)],
            max_width: 605_000,
            max_height: 410_000,
            layer_table: None,
        }
    }
}

impl CheckConfig {
    #[inline]
    pub fn builder() -> CheckConfigBuilder {
        CheckConfigBuilder::default()
    }

    pub fn from_toml(input: &str) -> Result<Self> {
        let value = toml::from_str(input)?;
        Ok(value)
    }

    /// Reads a config file. A relative layer table path is resolved against the file's directory.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)?;
        let mut value = Self::from_toml(&input)?;
        if let (Some(base), Some(table)) = (path.parent(), value.layer_table.as_ref()) {
            value.layer_table = Some(resolve(base, table));
        }
        Ok(value)
    }
}

fn resolve(base: &Path, p: &Path) -> PathBuf {
    if p.is_relative() {
        base.join(p)
    } else {
        p.to_path_buf()
    }
}
