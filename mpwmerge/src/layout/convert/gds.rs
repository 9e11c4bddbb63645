//! Utilities for GDS conversion.
//!
//! Converts between the [`Layout`] data model and [`gds21`] structures.

use std::collections::{HashMap, HashSet};
use std::convert::TryInto;

use derivative::Derivative;
use slotmap::SecondaryMap;
use subgeom::orientation::{self, Orientation};
use subgeom::{Path, Point, Polygon, Rect, Shape};

use super::error::{ErrorContext, ErrorHelper};
use crate::deps::arcstr::ArcStr;
use crate::error::{with_err_context, ErrorContext as MergeErrorContext, ErrorSource, Result};
use crate::layout::cell::{Cell, CellKey, Element, Instance, TextElement};
use crate::layout::error::{LayoutError, LayoutResult};
use crate::layout::layers::LayerSpec;
use crate::layout::Layout;
use crate::log::warn;

/// GDSII path type for paths extended by half their width.
const PATH_TYPE_HALF_WIDTH: i16 = 2;
/// GDSII path type for paths with explicit end extensions.
const PATH_TYPE_CUSTOM: i16 = 4;

/// A GDSII exporter.
///
/// Converts a [`Layout`] to a GDSII library ([`gds21::GdsLibrary`]).
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GdsExporter<'a> {
    #[derivative(Debug = "ignore")]
    layout: &'a Layout,
    backtrace: Vec<ErrorContext>,
    names_used: HashSet<ArcStr>,
    /// The top level cell.
    ///
    /// The name of this cell will be preserved, and only its hierarchy is exported.
    top: Option<CellKey>,
    names: SecondaryMap<CellKey, ArcStr>,
}

/// A GDSII importer.
///
/// Imports every struct of a [`gds21::GdsLibrary`] into a [`Layout`].
#[derive(Derivative)]
#[derivative(Debug)]
pub struct GdsImporter<'a> {
    #[derivative(Debug = "ignore")]
    layout: &'a mut Layout,
    backtrace: Vec<ErrorContext>,
    unsupported: Vec<gds21::GdsElement>,
    cell_map: HashMap<String, CellKey>,
}

/// GDSII conversion methods.
impl Layout {
    /// Converts the layout to a GDSII library.
    pub fn to_gds_lib(&self) -> LayoutResult<gds21::GdsLibrary> {
        GdsExporter::new(self, None).export_lib()
    }

    /// Converts the hierarchy under `top` to a GDSII library.
    pub fn to_gds_lib_with_top(&self, top: CellKey) -> LayoutResult<gds21::GdsLibrary> {
        GdsExporter::new(self, Some(top)).export_lib()
    }

    /// Saves the layout to a GDS file.
    pub fn to_gds(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        let inner = || -> Result<()> {
            self.to_gds_lib()?.save(path).map_err(LayoutError::from)?;
            Ok(())
        };
        with_err_context(inner(), || MergeErrorContext::CreateFile(path.to_path_buf()))
    }

    /// Saves the hierarchy under `top` to a GDS file.
    pub fn to_gds_with_top(&self, top: CellKey, path: impl AsRef<std::path::Path>) -> Result<()> {
        let path = path.as_ref();
        let inner = || -> Result<()> {
            self.to_gds_lib_with_top(top)?
                .save(path)
                .map_err(LayoutError::from)?;
            Ok(())
        };
        with_err_context(inner(), || MergeErrorContext::CreateFile(path.to_path_buf()))
    }

    /// Creates a layout from a GDSII library.
    ///
    /// The database unit of the new layout is taken from the library.
    pub fn from_gds_lib(gdslib: &gds21::GdsLibrary) -> LayoutResult<Layout> {
        let mut layout = Layout::new(gdslib.name.to_string(), gdslib.units.db_unit() * 1e6);
        let mut importer = GdsImporter::new(&mut layout);
        importer.import_all(gdslib)?;
        let GdsImporter { unsupported, .. } = importer;
        if !unsupported.is_empty() {
            warn!(
                "Read {} unsupported GDS elements from library {}",
                unsupported.len(),
                gdslib.name
            );
        }
        Ok(layout)
    }

    /// Reads a layout from a GDS file.
    pub fn from_gds(path: impl AsRef<std::path::Path>) -> Result<Layout> {
        let path = path.as_ref();
        let inner = || -> Result<Layout> {
            let library = gds21::GdsLibrary::load(path).map_err(LayoutError::from)?;
            Ok(Self::from_gds_lib(&library).map_err(ErrorSource::Layout)?)
        };
        with_err_context(inner(), || MergeErrorContext::ReadFile(path.to_path_buf()))
    }
}

impl<'a> GdsExporter<'a> {
    fn new(layout: &'a Layout, top: Option<CellKey>) -> Self {
        Self {
            layout,
            backtrace: Vec::new(),
            names_used: HashSet::with_capacity(layout.num_cells()),
            top,
            names: SecondaryMap::new(),
        }
    }

    /// Returns the keys of the cells to export, children before parents.
    fn export_set(&self) -> Vec<CellKey> {
        match self.top {
            Some(top) => self.layout.descendants(top).into_iter().rev().collect(),
            None => self.layout.cells().map(|(key, _)| key).collect(),
        }
    }

    /// Runs basic preprocessing before export.
    fn prepare(&mut self, keys: &[CellKey]) {
        if let Some(cell) = self.top.and_then(|top| self.layout.cell(top)) {
            self.names_used.insert(cell.name().clone());
        }
        for &key in keys {
            let name = self.get_cell_name(key);
            self.names.insert(key, name);
        }
    }

    /// Exports to a [`gds21::GdsLibrary`].
    fn export_lib(&mut self) -> LayoutResult<gds21::GdsLibrary> {
        let keys = self.export_set();
        self.prepare(&keys);

        self.backtrace.push(ErrorContext::Library);
        let mut gdslib = gds21::GdsLibrary::new(self.layout.name().as_str());

        // User units are always microns.
        let dbu = self.layout.dbu();
        if !dbu.is_finite() || dbu <= 0. {
            return self.fail(format!("invalid database unit for library: {dbu}"));
        }
        gdslib.units = gds21::GdsUnits::new(dbu, dbu * 1e-6);

        let layout = self.layout;
        for key in keys {
            let Some(cell) = layout.cell(key) else {
                return self.fail("instance of a cell missing from the layout");
            };
            let strukt = self.export_cell(key, cell)?;
            gdslib.structs.push(strukt);
        }
        self.backtrace.pop();
        Ok(gdslib)
    }

    /// Converts a [`Cell`] to a [`gds21::GdsStruct`] cell definition.
    fn export_cell(&mut self, key: CellKey, cell: &Cell) -> LayoutResult<gds21::GdsStruct> {
        self.backtrace.push(ErrorContext::Cell(cell.name().clone()));

        let mut elems = Vec::new();
        for inst in cell.insts() {
            elems.push(self.export_instance(inst)?.into());
        }

        self.backtrace.push(ErrorContext::Geometry);
        for elem in cell.elems() {
            elems.extend(self.export_element(elem)?);
        }
        self.backtrace.pop();

        self.backtrace.push(ErrorContext::Annotations);
        for annotation in cell.annotations() {
            elems.push(self.export_annotation(annotation)?);
        }
        self.backtrace.pop();

        let mut strukt = gds21::GdsStruct::new(self.names[key].as_str());
        strukt.elems = elems;

        self.backtrace.pop();
        Ok(strukt)
    }

    /// Converts an [`Instance`] to a GDS instance ([`gds21::GdsStructRef`]).
    fn export_instance(&mut self, inst: &Instance) -> LayoutResult<gds21::GdsStructRef> {
        let name = self.unwrap(
            self.names.get(inst.cell()).cloned(),
            "instance of a cell outside the exported hierarchy",
        )?;
        self.backtrace.push(ErrorContext::Instance(name.clone()));
        let gdsinst = gds21::GdsStructRef {
            name: name.to_string().into(),
            xy: self.export_point(&inst.loc())?,
            strans: orientation::to_strans(inst.orientation(), inst.mag()),
            ..Default::default()
        };
        self.backtrace.pop();
        Ok(gdsinst)
    }

    /// Converts an [`Element`] into zero or one [`gds21::GdsElement`]s.
    pub fn export_element(&mut self, elem: &Element) -> LayoutResult<Option<gds21::GdsElement>> {
        let layerspec = gds21::GdsLayerSpec {
            layer: elem.layer.layer(),
            xtype: elem.layer.datatype(),
        };
        self.export_shape(&elem.inner, &layerspec)
    }

    /// Converts a [`Shape`] to a [`gds21::GdsElement`].
    ///
    /// GDS boundaries include an explicit repetition of their origin for closure.
    /// So an N-sided polygon is described by a (N+1)-point vector.
    /// Degenerate shapes are skipped.
    pub fn export_shape(
        &mut self,
        shape: &Shape,
        layerspec: &gds21::GdsLayerSpec,
    ) -> LayoutResult<Option<gds21::GdsElement>> {
        let elem = match shape {
            Shape::Rect(r) => {
                let x0 = r.p0.x.try_into()?;
                let y0 = r.p0.y.try_into()?;
                let x1 = r.p1.x.try_into()?;
                let y1 = r.p1.y.try_into()?;
                let xy = gds21::GdsPoint::vec(&[(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]);
                gds21::GdsBoundary {
                    layer: layerspec.layer,
                    datatype: layerspec.xtype,
                    xy,
                    ..Default::default()
                }
                .into()
            }
            Shape::Polygon(poly) => {
                if poly.points.len() < 3 {
                    return Ok(None);
                }
                let mut xy = poly
                    .points
                    .iter()
                    .map(|p| self.export_point(p))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                xy.push(xy[0].clone());
                gds21::GdsBoundary {
                    layer: layerspec.layer,
                    datatype: layerspec.xtype,
                    xy,
                    ..Default::default()
                }
                .into()
            }
            Shape::Path(path) => {
                if path.points.is_empty() {
                    return Ok(None);
                }
                let xy = path
                    .points
                    .iter()
                    .map(|p| self.export_point(p))
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                gds21::GdsPath {
                    layer: layerspec.layer,
                    datatype: layerspec.xtype,
                    width: Some(i32::try_from(path.width)?),
                    xy,
                    ..Default::default()
                }
                .into()
            }
        };
        Ok(Some(elem))
    }

    /// Converts a [`TextElement`] to a [`gds21::GdsElement`].
    pub fn export_annotation(
        &mut self,
        text_elem: &TextElement,
    ) -> LayoutResult<gds21::GdsElement> {
        Ok(gds21::GdsTextElem {
            string: text_elem.string.to_string().into(),
            layer: text_elem.layer.layer(),
            texttype: text_elem.layer.datatype(),
            xy: self.export_point(&text_elem.loc)?,
            strans: None,
            ..Default::default()
        }
        .into())
    }

    /// Converts a [`Point`] to a GDS21 [`gds21::GdsPoint`].
    pub fn export_point(&mut self, pt: &Point) -> LayoutResult<gds21::GdsPoint> {
        let x = pt.x.try_into()?;
        let y = pt.y.try_into()?;
        Ok(gds21::GdsPoint::new(x, y))
    }

    /// Renames the cell with the given key to avoid duplicate cell names.
    ///
    /// Duplicates receive a `$1`, `$2`, ... suffix. The top cell is never renamed.
    fn get_cell_name(&mut self, key: CellKey) -> ArcStr {
        let name = self
            .layout
            .cell(key)
            .map(|cell| cell.name().clone())
            .unwrap_or_default();
        let name = if self.names_used.contains(&name) && self.top != Some(key) {
            let mut i = 1;
            loop {
                let newname = arcstr::format!("{}${}", name, i);
                if !self.names_used.contains(&newname) {
                    break newname;
                }
                i += 1;
            }
        } else {
            name
        };
        self.names_used.insert(name.clone());
        name
    }
}

impl ErrorHelper for GdsExporter<'_> {
    type Error = LayoutError;
    fn err(&self, msg: impl Into<String>) -> LayoutError {
        LayoutError::Export {
            message: msg.into(),
            stack: self.backtrace.clone(),
        }
    }
}

/// A helper for retrieving GDS dependencies in reverse topological order.
///
/// Each item in the ordered return value is guaranteed *not* to instantiate any item which comes later.
#[derive(Debug)]
pub struct GdsDepOrder<'a> {
    strukts: HashMap<String, &'a gds21::GdsStruct>,
    stack: Vec<&'a gds21::GdsStruct>,
    seen: HashSet<String>,
    visiting: HashSet<String>,
}

impl<'a> GdsDepOrder<'a> {
    /// Creates a new [`GdsDepOrder`] for a [`gds21::GdsLibrary`].
    fn new(gdslib: &'a gds21::GdsLibrary) -> Self {
        let strukts = gdslib
            .structs
            .iter()
            .map(|s| (s.name.to_string(), s))
            .collect();
        Self {
            strukts,
            stack: Vec::new(),
            seen: HashSet::new(),
            visiting: HashSet::new(),
        }
    }

    /// Returns a reverse topological sort of all structs in the library.
    ///
    /// Structs are visited in file order, so the result is deterministic.
    fn total_order(
        mut self,
        gdslib: &'a gds21::GdsLibrary,
    ) -> std::result::Result<Vec<&'a gds21::GdsStruct>, String> {
        for s in &gdslib.structs {
            self.push(s)?;
        }
        Ok(self.stack)
    }

    /// Adds all of `strukt`'s dependencies, and then `strukt` itself, to the stack.
    fn push(&mut self, strukt: &'a gds21::GdsStruct) -> std::result::Result<(), String> {
        let name = strukt.name.to_string();
        if self.seen.contains(&name) {
            return Ok(());
        }
        if !self.visiting.insert(name.clone()) {
            return Err(format!("cell {name} instantiates itself"));
        }
        for elem in &strukt.elems {
            use gds21::GdsElement::*;
            let child = match elem {
                GdsStructRef(ref x) => x.name.to_string(),
                GdsArrayRef(ref x) => x.name.to_string(),
                _ => continue,
            };
            let Some(child) = self.strukts.get(&child).copied() else {
                return Err(format!("cell {name} instantiates undefined cell {child}"));
            };
            self.push(child)?;
        }
        self.visiting.remove(&name);
        self.seen.insert(name);
        self.stack.push(strukt);
        Ok(())
    }
}

impl<'a> GdsImporter<'a> {
    /// Creates a new [`GdsImporter`].
    fn new(layout: &'a mut Layout) -> Self {
        GdsImporter {
            layout,
            backtrace: Vec::new(),
            unsupported: Vec::new(),
            cell_map: HashMap::new(),
        }
    }

    /// Imports a [gds21::GdsLibrary].
    fn import_all(&mut self, gdslib: &gds21::GdsLibrary) -> LayoutResult<()> {
        self.backtrace.push(ErrorContext::Library);
        let order = match GdsDepOrder::new(gdslib).total_order(gdslib) {
            Ok(order) => order,
            Err(msg) => return self.fail(msg),
        };
        for strukt in order {
            self.import_and_add(strukt)?;
        }
        self.backtrace.pop();
        Ok(())
    }

    /// Imports and adds a cell if not already defined.
    fn import_and_add(&mut self, strukt: &gds21::GdsStruct) -> LayoutResult<()> {
        let name = strukt.name.to_string();
        if self.cell_map.contains_key(&name) {
            return self.fail(format!("Cell {name} defined multiple times in GDS file"));
        }
        let mut cell = Cell::new(name.clone());
        self.import_cell(strukt, &mut cell)?;
        let key = self.layout.add_cell(cell);
        self.cell_map.insert(name, key);
        Ok(())
    }

    /// Imports a GDS Cell ([gds21::GdsStruct]) into a [Cell].
    fn import_cell(&mut self, strukt: &gds21::GdsStruct, cell: &mut Cell) -> LayoutResult<()> {
        self.backtrace
            .push(ErrorContext::Cell(strukt.name.to_string().into()));
        for elem in &strukt.elems {
            use gds21::GdsElement::*;
            match elem {
                GdsBoundary(ref x) => cell.add_element(self.import_boundary(x)?),
                GdsPath(ref x) => cell.add_element(self.import_path(x)?),
                GdsBox(ref x) => cell.add_element(self.import_box(x)?),
                GdsArrayRef(ref x) => cell.add_insts(self.import_instance_array(x)?),
                GdsStructRef(ref x) => cell.add_inst(self.import_instance(x)?),
                GdsTextElem(ref x) => cell.add_annotation(self.import_text_elem(x)?),
                // GDSII "Node" elements carry no mask geometry.
                GdsNode(ref x) => self.unsupported.push(x.clone().into()),
            }
        }
        self.backtrace.pop();
        Ok(())
    }

    /// Imports a [gds21::GdsBoundary] into an [Element].
    fn import_boundary(&mut self, x: &gds21::GdsBoundary) -> LayoutResult<Element> {
        self.backtrace.push(ErrorContext::Geometry);
        let mut pts: Vec<Point> = self.import_point_vec(&x.xy);
        if pts.len() > 1 && pts.first() == pts.last() {
            pts.pop();
        }
        let inner = if pts.len() == 4
            && ((pts[0].x == pts[1].x
                && pts[1].y == pts[2].y
                && pts[2].x == pts[3].x
                && pts[3].y == pts[0].y)
                || (pts[0].y == pts[1].y
                    && pts[1].x == pts[2].x
                    && pts[2].y == pts[3].y
                    && pts[3].x == pts[0].x))
        {
            Shape::Rect(Rect::new(pts[0], pts[2]))
        } else {
            Shape::Polygon(Polygon { points: pts })
        };
        let e = Element::new(self.import_element_layer(x), inner);
        self.backtrace.pop();
        Ok(e)
    }

    /// Imports a [gds21::GdsBox] into an [Element].
    fn import_box(&mut self, x: &gds21::GdsBox) -> LayoutResult<Element> {
        self.backtrace.push(ErrorContext::Geometry);
        // The first and third of the five box coordinates are opposite corners.
        let inner = Shape::Rect(Rect::new(
            self.import_point(&x.xy[0]),
            self.import_point(&x.xy[2]),
        ));
        let e = Element::new(self.import_element_layer(x), inner);
        self.backtrace.pop();
        Ok(e)
    }

    /// Imports a [gds21::GdsPath] into an [Element].
    ///
    /// Extended path ends are folded into the path's end points.
    /// A missing width is read as zero; negative (absolute) widths are used as-is.
    fn import_path(&mut self, x: &gds21::GdsPath) -> LayoutResult<Element> {
        self.backtrace.push(ErrorContext::Geometry);
        let mut points = self.import_point_vec(&x.xy);
        let width = x.width.map(|w| w.unsigned_abs() as usize).unwrap_or(0);
        match x.path_type {
            Some(PATH_TYPE_HALF_WIDTH) => {
                let half = (width / 2) as i64;
                extend_ends(&mut points, half, half);
            }
            Some(PATH_TYPE_CUSTOM) => {
                let begin = x.begin_extn.map(i64::from).unwrap_or(0);
                let end = x.end_extn.map(i64::from).unwrap_or(0);
                extend_ends(&mut points, begin, end);
            }
            _ => (),
        }
        let inner = Shape::Path(Path { width, points });
        let e = Element::new(self.import_element_layer(x), inner);
        self.backtrace.pop();
        Ok(e)
    }

    /// Imports a [gds21::GdsTextElem] into a [TextElement].
    fn import_text_elem(&mut self, text: &gds21::GdsTextElem) -> LayoutResult<TextElement> {
        self.backtrace.push(ErrorContext::Annotations);
        let elem = TextElement::new(
            text.string.to_string(),
            self.import_point(&text.xy),
            self.import_element_layer(text),
        );
        self.backtrace.pop();
        Ok(elem)
    }

    /// Looks up the key of an already-imported cell.
    fn lookup(&self, name: &str) -> LayoutResult<CellKey> {
        self.unwrap(
            self.cell_map.get(name).copied(),
            format!("Instance of invalid cell {name}"),
        )
    }

    /// Imports a [gds21::GdsStructRef] into an [Instance].
    fn import_instance(&mut self, sref: &gds21::GdsStructRef) -> LayoutResult<Instance> {
        let cname = sref.name.to_string();
        self.backtrace
            .push(ErrorContext::Instance(cname.clone().into()));
        let cell = self.lookup(&cname)?;
        let mut inst = Instance::at(cell, self.import_point(&sref.xy));
        if let Some(strans) = &sref.strans {
            (inst.orientation, inst.mag) = self.import_strans(strans);
        }
        self.backtrace.pop();
        Ok(inst)
    }

    /// Imports a (two-dimensional) [`gds21::GdsArrayRef`] into [`Instance`]s.
    ///
    /// GDSII arrays are described by three points: the origin, the origin
    /// displaced by `cols` column pitches, and the origin displaced by `rows`
    /// row pitches. The displacements are already in the parent's frame, so
    /// skewed lattices are expanded as given.
    fn import_instance_array(&mut self, aref: &gds21::GdsArrayRef) -> LayoutResult<Vec<Instance>> {
        let cname = aref.name.to_string();
        self.backtrace.push(ErrorContext::Array(cname.clone().into()));
        let cell = self.lookup(&cname)?;
        if aref.cols <= 0 || aref.rows <= 0 {
            return self.fail(format!(
                "Invalid array dimensions {} x {}",
                aref.cols, aref.rows
            ));
        }
        let (cols, rows) = (i64::from(aref.cols), i64::from(aref.rows));
        let p0 = self.import_point(&aref.xy[0]);
        let p1 = self.import_point(&aref.xy[1]);
        let p2 = self.import_point(&aref.xy[2]);
        let col_step = Point::new((p1.x - p0.x) / cols, (p1.y - p0.y) / cols);
        let row_step = Point::new((p2.x - p0.x) / rows, (p2.y - p0.y) / rows);

        let (orientation, mag) = match &aref.strans {
            Some(strans) => self.import_strans(strans),
            None => (Orientation::default(), 1.),
        };

        let mut insts = Vec::with_capacity((cols * rows) as usize);
        for ix in 0..cols {
            for iy in 0..rows {
                let loc = Point::new(
                    p0.x + ix * col_step.x + iy * row_step.x,
                    p0.y + ix * col_step.y + iy * row_step.y,
                );
                let mut inst = Instance::at(cell, loc);
                inst.orientation = orientation;
                inst.mag = mag;
                insts.push(inst);
            }
        }
        self.backtrace.pop();
        Ok(insts)
    }

    /// Imports a [`Point`].
    fn import_point(&self, pt: &gds21::GdsPoint) -> Point {
        Point::new(pt.x.into(), pt.y.into())
    }

    /// Imports a vector of [`Point`]s.
    fn import_point_vec(&self, pts: &[gds21::GdsPoint]) -> Vec<Point> {
        pts.iter().map(|p| self.import_point(p)).collect()
    }

    /// Imports an orientation and magnification.
    ///
    /// Absolute magnification and rotation flags are read as relative.
    fn import_strans(&mut self, strans: &gds21::GdsStrans) -> (Orientation, f64) {
        if strans.abs_mag || strans.abs_angle {
            warn!(
                "Reading absolute GDS magnification/angle as relative in {:?}",
                self.backtrace.last()
            );
        }
        (Orientation::from(strans), strans.mag.unwrap_or(1.))
    }

    /// Gets the [`LayerSpec`] for a GDS element implementing its [`gds21::HasLayer`] trait.
    fn import_element_layer(&self, elem: &impl gds21::HasLayer) -> LayerSpec {
        elem.layerspec().into()
    }
}

impl<'a> ErrorHelper for GdsImporter<'a> {
    type Error = LayoutError;
    fn err(&self, msg: impl Into<String>) -> LayoutError {
        LayoutError::Import {
            message: msg.into(),
            stack: self.backtrace.clone(),
        }
    }
}

/// Moves the end points of a path outward along its end segments.
fn extend_ends(points: &mut [Point], begin: i64, end: i64) {
    let n = points.len();
    if n < 2 {
        return;
    }
    let shift = |from: Point, to: Point, dist: i64| -> Point {
        let dx = (to.x - from.x) as f64;
        let dy = (to.y - from.y) as f64;
        let len = (dx * dx + dy * dy).sqrt();
        if len == 0. || dist == 0 {
            return to;
        }
        let d = dist as f64 / len;
        Point::new(
            (to.x as f64 + dx * d).round() as i64,
            (to.y as f64 + dy * d).round() as i64,
        )
    };
    points[0] = shift(points[1], points[0], begin);
    points[n - 1] = shift(points[n - 2], points[n - 1], end);
}

#[cfg(test)]
mod tests {
    use subgeom::bbox::BoundBox;
    use subgeom::orientation::Named;

    use super::*;

    fn sample_lib() -> gds21::GdsLibrary {
        let mut leaf = gds21::GdsStruct::new("leaf");
        leaf.elems.push(
            gds21::GdsBoundary {
                layer: 1,
                datatype: 0,
                xy: gds21::GdsPoint::vec(&[(0, 0), (100, 0), (100, 20), (0, 20), (0, 0)]),
                ..Default::default()
            }
            .into(),
        );
        let mut top = gds21::GdsStruct::new("top");
        top.elems.push(
            gds21::GdsArrayRef {
                name: "leaf".to_string().into(),
                xy: [
                    gds21::GdsPoint::new(0, 0),
                    gds21::GdsPoint::new(300, 0),
                    gds21::GdsPoint::new(0, 100),
                ],
                cols: 3,
                rows: 2,
                strans: None,
                ..Default::default()
            }
            .into(),
        );
        top.elems.push(
            gds21::GdsTextElem {
                string: "opt_in_TE_1550_device_x".to_string().into(),
                layer: 10,
                texttype: 0,
                xy: gds21::GdsPoint::new(5, 5),
                ..Default::default()
            }
            .into(),
        );
        let mut lib = gds21::GdsLibrary::new("lib");
        lib.units = gds21::GdsUnits::new(1e-3, 1e-9);
        // Parent first, to exercise dependency ordering.
        lib.structs.push(top);
        lib.structs.push(leaf);
        lib
    }

    #[test]
    fn import_expands_arrays() {
        let layout = Layout::from_gds_lib(&sample_lib()).unwrap();
        assert!((layout.dbu() - 0.001).abs() < 1e-12);
        let top = layout.cell_by_name("top").unwrap();
        assert_eq!(layout.cell(top).unwrap().insts().count(), 6);
        assert_eq!(
            layout.bbox(top).into_rect(),
            Rect::new(Point::zero(), Point::new(300, 70))
        );
        assert_eq!(layout.texts(top)[0].string.as_str(), "opt_in_TE_1550_device_x");
    }

    #[test]
    fn undefined_reference_fails() {
        let mut lib = sample_lib();
        lib.structs.pop();
        assert!(Layout::from_gds_lib(&lib).is_err());
    }

    #[test]
    fn export_renames_duplicates() {
        let mut layout = Layout::new("lib", 0.001);
        let a = layout.create_cell("cell");
        let b = layout.create_cell("cell");
        let mut top = Cell::new("cell");
        top.add_inst(Instance::at(a, Point::zero()));
        top.add_inst(Instance::at(b, Point::new(10, 0)));
        let top = layout.add_cell(top);
        let lib = layout.to_gds_lib_with_top(top).unwrap();
        let mut names: Vec<String> = lib.structs.iter().map(|s| s.name.to_string()).collect();
        names.sort();
        assert_eq!(names, vec!["cell", "cell$1", "cell$2"]);
        let top_struct = lib.structs.last().unwrap();
        assert_eq!(top_struct.name.to_string(), "cell");
    }

    #[test]
    fn instance_transform_survives_export() {
        let mut layout = Layout::new("lib", 0.001);
        let mut leaf = Cell::new("leaf");
        leaf.draw_rect(LayerSpec(1, 0), Rect::new(Point::zero(), Point::new(10, 20)));
        let leaf = layout.add_cell(leaf);
        let mut top = Cell::new("top");
        let mut inst = Instance::at(leaf, Point::new(100, 100));
        inst.orientation = Named::R90.into();
        inst.mag = 2.;
        top.add_inst(inst);
        let top = layout.add_cell(top);

        let lib = layout.to_gds_lib().unwrap();
        let back = Layout::from_gds_lib(&lib).unwrap();
        let top2 = back.cell_by_name("top").unwrap();
        assert_eq!(back.bbox(top2), layout.bbox(top));
        assert_eq!(
            back.bbox(top2).into_rect(),
            Rect::new(Point::new(60, 100), Point::new(100, 120))
        );
    }

    #[test]
    fn half_width_paths_are_extended() {
        let mut cell = gds21::GdsStruct::new("wg");
        cell.elems.push(
            gds21::GdsPath {
                layer: 1,
                datatype: 0,
                xy: gds21::GdsPoint::vec(&[(0, 0), (100, 0)]),
                width: Some(10),
                path_type: Some(2),
                ..Default::default()
            }
            .into(),
        );
        let mut lib = gds21::GdsLibrary::new("lib");
        lib.units = gds21::GdsUnits::new(1e-3, 1e-9);
        lib.structs.push(cell);
        let layout = Layout::from_gds_lib(&lib).unwrap();
        let key = layout.cell_by_name("wg").unwrap();
        let elem = layout.cell(key).unwrap().elems().next().unwrap().clone();
        assert_eq!(
            elem.inner.bbox().into_rect(),
            Rect::new(Point::new(-5, -5), Point::new(105, 5))
        );
    }
}
