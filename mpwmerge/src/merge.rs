//! The merge driver.
//!
//! A [`Merger`] owns the output canvas and all state threaded through a
//! merge run: the packer cursor, the occupied floorplan region and the
//! report. Files are merged strictly in the order they are given.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Local};
use itertools::Itertools;
use subgeom::transform::Transformation;
use subgeom::{Dims, Point};

use crate::category::{self, Route};
use crate::clip::clip_to_footprint;
use crate::config::{CategoryConfig, MergeConfig, ReservedFile};
use crate::deps::arcstr::ArcStr;
use crate::discover::{discover, LayoutFormat, Submission};
use crate::error::{with_err_context, ErrorContext, ErrorSource, MergeError, Result};
use crate::layout::cell::{CellKey, Instance, TextElement};
use crate::layout::Layout;
use crate::occupancy::Occupancy;
use crate::packer::Packer;
use crate::preview::{self, PreviewOptions};
use crate::report::{Placement, RecordKind, Report};
use crate::sanitize::sanitize;
use crate::units;

/// Format of the provenance marker cell name.
pub const MERGE_STAMP_FORMAT: &str = ".merged:%Y-%m-%d-%H:%M:%S";

/// Category recorded in the placement table for files at fixed positions.
pub const RESERVED_CATEGORY: &str = "reserved";

/// Paths of the files written by [`Merger::write_outputs`].
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Outputs {
    pub gds: PathBuf,
    pub log: PathBuf,
    pub png: PathBuf,
    pub coords: PathBuf,
}

/// An owned [`Route`].
enum Target {
    Fixed(ReservedFile),
    Packed(CategoryConfig),
}

/// State of a merge run.
pub struct Merger {
    config: MergeConfig,
    now: DateTime<Local>,
    started: Instant,
    canvas: Layout,
    top: CellKey,
    containers: HashMap<ArcStr, CellKey>,
    packer: Packer,
    occupancy: Occupancy,
    report: Report,
}

impl Merger {
    /// Creates a merger stamped with the current local time.
    pub fn new(config: MergeConfig) -> Result<Self> {
        Self::with_time(config, Local::now())
    }

    /// Creates a merger stamped with `now`.
    ///
    /// Validates `config`, then sets up the empty canvas: the top cell,
    /// one container per category and the provenance marker cell.
    pub fn with_time(config: MergeConfig, now: DateTime<Local>) -> Result<Self> {
        config.validate()?;
        let mut canvas = Layout::new(config.output_name.clone(), config.dbu);
        let top = canvas.create_cell(config.top_cell_name.clone());

        let mut containers = HashMap::new();
        for category in config.categories.iter() {
            if containers.contains_key(&category.container) {
                continue;
            }
            let key = canvas.create_cell(category.container.clone());
            add_inst(&mut canvas, top, Instance::new(key));
            containers.insert(category.container.clone(), key);
        }

        let stamp = now.format(MERGE_STAMP_FORMAT).to_string();
        let stamp_cell = canvas.create_cell(stamp.as_str());
        if let Some(cell) = canvas.cell_mut(stamp_cell) {
            cell.add_annotation(TextElement::new(stamp.as_str(), Point::zero(), config.text_layer));
        }
        add_inst(&mut canvas, top, Instance::new(stamp_cell));

        let mut report = Report::new();
        report.info(
            None,
            format!("mpwmerge {}, layout merge", env!("CARGO_PKG_VERSION")),
        );
        report.info(
            None,
            format!("Date: {}", now.format("%Y-%m-%d, %H:%M:%S local time")),
        );

        Ok(Self {
            packer: Packer::new(&config),
            occupancy: Occupancy::new(config.floorplan_layer),
            config,
            now,
            started: Instant::now(),
            canvas,
            top,
            containers,
            report,
        })
    }

    /// Discovers the configured input directories and merges every file found.
    pub fn run(config: MergeConfig) -> Result<Self> {
        let files = discover(&config.framework_dir, &config.submissions_dir)?;
        let mut merger = Self::new(config)?;
        merger.merge_all(&files)?;
        merger.finish();
        Ok(merger)
    }

    /// Like [`Merger::run`], but also writes the outputs to `dir`.
    ///
    /// If the run aborts, the text log is still written before the error is returned.
    pub fn run_to(config: MergeConfig, dir: impl AsRef<Path>) -> Result<(Self, Outputs)> {
        let dir = dir.as_ref();
        let files = discover(&config.framework_dir, &config.submissions_dir)?;
        let mut merger = Self::new(config)?;
        if let Err(err) = merger.merge_all(&files) {
            merger.finish();
            merger.write_log(dir)?;
            return Err(err);
        }
        merger.finish();
        let outputs = merger.write_outputs(dir)?;
        Ok((merger, outputs))
    }

    #[inline]
    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    #[inline]
    pub fn now(&self) -> DateTime<Local> {
        self.now
    }

    /// The merged layout.
    #[inline]
    pub fn canvas(&self) -> &Layout {
        &self.canvas
    }

    /// The top cell of the canvas.
    #[inline]
    pub fn top(&self) -> CellKey {
        self.top
    }

    /// Returns the container cell named `name`.
    pub fn container(&self, name: &str) -> Option<CellKey> {
        self.containers.get(name).copied()
    }

    #[inline]
    pub fn occupancy(&self) -> &Occupancy {
        &self.occupancy
    }

    #[inline]
    pub fn packer(&self) -> &Packer {
        &self.packer
    }

    #[inline]
    pub fn report(&self) -> &Report {
        &self.report
    }

    #[inline]
    pub fn placements(&self) -> &[Placement] {
        self.report.placements()
    }

    /// Number of error records so far.
    pub fn num_errors(&self) -> usize {
        self.report.count(RecordKind::Error)
    }

    /// Merges `files` in order.
    ///
    /// Errors confined to one file are recorded and the run continues.
    /// Placement and configuration errors abort the run.
    pub fn merge_all(&mut self, files: &[Submission]) -> Result<()> {
        for sub in files {
            if let Err(err) = self.merge_file(sub) {
                let err = err.with_context(ErrorContext::Submission(sub.name.clone()));
                self.report.error(Some(&sub.name), err.source().to_string());
                if err.is_fatal() {
                    return Err(err.with_context(ErrorContext::Task(arcstr::literal!(
                        "merging submissions"
                    ))));
                }
            }
        }
        Ok(())
    }

    /// Loads, prepares and places a single file.
    pub fn merge_file(&mut self, sub: &Submission) -> Result<()> {
        self.report.begin(&sub.name, sub.date_stamp());
        let mut src = load(sub)?;

        let target = match category::route(&self.config, &sub.path) {
            Some(Route::Reserved(r)) => Target::Fixed(r.clone()),
            Some(Route::Category(c)) => Target::Packed(c.clone()),
            None => {
                return Err(ErrorSource::InvalidConfig(format!(
                    "default category `{}` is not configured",
                    self.config.default_category
                ))
                .into())
            }
        };
        if let Target::Packed(category) = &target {
            self.report
                .info(Some(&sub.name), format!("course name: {}", category.name));
        }

        self.normalize(sub, &mut src)?;

        let Some(top) = self.pick_top(sub, &src) else {
            return Ok(());
        };
        match target {
            Target::Fixed(reserved) => self.place_reserved(sub, &src, top, &reserved),
            Target::Packed(category) => self.place_design(sub, src, top, &category),
        }
    }

    /// Applies the final layer migration and closes the report.
    pub fn finish(&mut self) {
        for mv in self.config.layers_move.iter() {
            let moved = self.canvas.move_layer(mv.from, mv.to);
            self.report.info(
                None,
                format!("moved {moved} objects from layer {} to {}", mv.from, mv.to),
            );
        }
        let placed = self.report.placements().len();
        let errors = self.num_errors();
        self.report
            .info(None, format!("placed {placed} designs, {errors} errors"));
        self.report.info(
            None,
            format!("Execution time: {} seconds", self.started.elapsed().as_secs()),
        );
    }

    /// Writes the merged layout, the text log, the preview and the placement table to `dir`.
    pub fn write_outputs(&self, dir: impl AsRef<Path>) -> Result<Outputs> {
        let outputs = self.output_paths(dir.as_ref())?;
        self.canvas.to_gds_with_top(self.top, &outputs.gds)?;
        self.report.write_text(&outputs.log)?;
        preview::write_png(
            &self.canvas,
            self.top,
            &outputs.png,
            &PreviewOptions::default(),
        )?;
        self.report.write_coords(&outputs.coords)?;
        Ok(outputs)
    }

    /// Writes only the text log to `dir`, returning its path.
    pub fn write_log(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let outputs = self.output_paths(dir.as_ref())?;
        self.report.write_text(&outputs.log)?;
        Ok(outputs.log)
    }

    /// Creates `dir` and names the output files in it.
    fn output_paths(&self, dir: &Path) -> Result<Outputs> {
        with_err_context(std::fs::create_dir_all(dir), || {
            ErrorContext::CreateDir(dir.to_path_buf())
        })?;
        let name = self.config.output_name.as_str();
        Ok(Outputs {
            gds: dir.join(format!("{name}.gds")),
            log: dir.join(format!("{name}.txt")),
            png: dir.join(format!("{name}.png")),
            coords: dir.join(format!("{name}.coords")),
        })
    }

    fn normalize(&mut self, sub: &Submission, src: &mut Layout) -> Result<()> {
        let canonical = self.config.dbu;
        if !units::needs_rescale(src.dbu(), canonical) {
            return Ok(());
        }
        self.report.warn(
            Some(&sub.name),
            format!(
                "The database unit ({} dbu) in the layout does not match the required dbu of {}.",
                src.dbu(),
                canonical
            ),
        );
        if let Some(rescale) = units::normalize(src, canonical)? {
            self.report.warn(
                Some(&sub.name),
                format!(
                    "Database resolution has been corrected and the layout scaled by {}",
                    rescale.ratio
                ),
            );
        }
        Ok(())
    }

    /// Chooses the design cell of `src`, warning if the choice is ambiguous.
    fn pick_top(&mut self, sub: &Submission, src: &Layout) -> Option<CellKey> {
        let tops = src.top_cells();
        let name = |key: CellKey| {
            src.cell(key)
                .map(|c| c.name().clone())
                .unwrap_or_default()
        };
        let top = match tops.len() {
            0 => {
                self.report
                    .warn(Some(&sub.name), "layout does not contain a top cell");
                return None;
            }
            1 => tops[0],
            n => {
                let names = tops.iter().map(|k| name(*k)).join(", ");
                self.report.warn(
                    Some(&sub.name),
                    format!("layout should only contain one top cell; contains ({n}): {names}"),
                );
                preferred_top(src, &tops)
            }
        };
        self.report
            .info(Some(&sub.name), format!("top cell: {}", name(top)));
        Some(top)
    }

    /// Copies an infrastructure file under the top cell at its fixed offset.
    fn place_reserved(
        &mut self,
        sub: &Submission,
        src: &Layout,
        top: CellKey,
        reserved: &ReservedFile,
    ) -> Result<()> {
        let wrapper = self.wrap(sub, src, top, Point::zero())?;
        let loc = Point::new(reserved.x, reserved.y);
        add_inst(&mut self.canvas, self.top, Instance::at(wrapper, loc));
        self.occupancy
            .commit(&self.canvas, wrapper, translation(loc));
        self.report.info(
            Some(&sub.name),
            format!("Placed at fixed position: {}, {}", loc.x, loc.y),
        );

        let dims = self
            .canvas
            .bbox(wrapper)
            .into_option()
            .map(|r| r.dims())
            .unwrap_or_default();
        self.report.add_placement(Placement {
            file: sub.name.clone(),
            category: ArcStr::from(RESERVED_CATEGORY),
            cell: design_name(src, top),
            x: loc.x,
            y: loc.y,
            width: dims.w(),
            height: dims.h(),
        });
        Ok(())
    }

    /// Sanitizes, clips and packs a submitted design.
    fn place_design(
        &mut self,
        sub: &Submission,
        mut src: Layout,
        top: CellKey,
        category: &CategoryConfig,
    ) -> Result<()> {
        let file = &sub.name;
        if src.bbox(top).is_empty() {
            self.report.warn(Some(file), "empty layout. Skipping.");
            return Ok(());
        }

        let allowed = self.config.allowed_layers(category);
        let text_layer = self.config.text_layer;
        let sanitized = sanitize(&mut src, top, &allowed, text_layer);
        for layer in sanitized.kept.iter() {
            self.report
                .info(Some(file), format!("loading layer: {layer}"));
        }
        for (layer, _) in sanitized.deleted.iter() {
            self.report
                .info(Some(file), format!("deleting layer: {layer}"));
        }
        for label in sanitized.labels.iter() {
            self.report
                .info(Some(file), format!("measurement label: {label}"));
        }
        if sanitized.text_shapes_removed > 0 {
            self.report.info(
                Some(file),
                format!(
                    "deleted {} non-text shapes on layer {text_layer}",
                    sanitized.text_shapes_removed
                ),
            );
        }

        let max = Dims::new(self.config.cell_width, self.config.cell_height);
        let Some(clipped) = clip_to_footprint(&mut src, top, max) else {
            self.report
                .warn(Some(file), "no geometry left after removing layers. Skipping.");
            return Ok(());
        };
        self.report
            .info(Some(file), format!("bounding box: {}", clipped.before));
        let Some(footprint) = clipped.after.into_option() else {
            self.report
                .warn(Some(file), "no geometry left after clipping. Skipping.");
            return Ok(());
        };
        if clipped.truncated() {
            self.report.warn(
                Some(file),
                format!(
                    "Cell was clipped to maximum size of {} X {}",
                    max.w(),
                    max.h()
                ),
            );
            self.report
                .info(Some(file), format!("clipped bounding box: {footprint}"));
        }

        let offset = Point::new(-clipped.before.left(), -clipped.before.bottom());
        let wrapper = self.wrap(sub, &src, clipped.cell, offset)?;
        if let Some(cell) = self.canvas.cell_mut(wrapper) {
            cell.add_annotations(
                sanitized
                    .signatures
                    .iter()
                    .map(|s| TextElement::new(s.clone(), Point::zero(), text_layer)),
            );
        }

        let container = self.container(&category.container).ok_or_else(|| {
            MergeError::new(ErrorSource::Internal(format!(
                "missing container cell `{}`",
                category.container
            )))
        })?;
        let dims = footprint.dims();
        let loc = self.packer.find_slot(dims, &self.occupancy)?;
        add_inst(&mut self.canvas, container, Instance::at(wrapper, loc));
        self.occupancy
            .commit(&self.canvas, wrapper, translation(loc));
        self.packer.commit(dims);
        self.report
            .info(Some(file), format!("Placed at position: {}, {}", loc.x, loc.y));

        self.report.add_placement(Placement {
            file: file.clone(),
            category: category.name.clone(),
            cell: design_name(&src, top),
            x: loc.x,
            y: loc.y,
            width: dims.w(),
            height: dims.h(),
        });
        Ok(())
    }

    /// Copies `key` from `src` into a new `<file>_<date>` wrapper cell, instanced at `offset`.
    fn wrap(
        &mut self,
        sub: &Submission,
        src: &Layout,
        key: CellKey,
        offset: Point,
    ) -> Result<CellKey> {
        let design = self.canvas.copy_tree(src, key).ok_or_else(|| {
            MergeError::new(ErrorSource::Internal(format!(
                "design cell missing from {}",
                sub.name
            )))
        })?;
        let wrapper = self
            .canvas
            .create_cell(format!("{}_{}", sub.name, sub.date_stamp()));
        add_inst(&mut self.canvas, wrapper, Instance::at(design, offset));
        Ok(wrapper)
    }
}

/// Reads a discovered file into a layout.
pub fn load(sub: &Submission) -> Result<Layout> {
    match sub.format {
        LayoutFormat::Gds => Layout::from_gds(&sub.path),
        LayoutFormat::Oasis => Err(ErrorSource::UnsupportedFormat(sub.path.clone()).into()),
    }
}

/// Picks the design cell among several top cells.
///
/// A cell named `top` or starting with `ebeam_` (ignoring case) wins;
/// otherwise the cell with the most descendants, then the first by name.
pub fn preferred_top(src: &Layout, tops: &[CellKey]) -> CellKey {
    let named = tops.iter().copied().find(|key| {
        src.cell(*key).map_or(false, |c| {
            let name = c.name().to_lowercase();
            name == "top" || name.starts_with("ebeam_")
        })
    });
    named
        .or_else(|| {
            tops.iter()
                .copied()
                .rev()
                .max_by_key(|key| src.descendants(*key).len())
        })
        .unwrap_or_default()
}

fn design_name(src: &Layout, key: CellKey) -> ArcStr {
    src.cell(key).map(|c| c.name().clone()).unwrap_or_default()
}

fn add_inst(layout: &mut Layout, parent: CellKey, inst: Instance) {
    if let Some(cell) = layout.cell_mut(parent) {
        cell.add_inst(inst);
    }
}

fn translation(p: Point) -> Transformation {
    Transformation::translate(p.x as f64, p.y as f64)
}
