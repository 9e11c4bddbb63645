//! The hierarchical layout data model.
//!
//! A [`Layout`] owns a flat arena of [`Cell`]s; instances refer to their
//! masters by [`CellKey`]. All coordinates in a layout are integers in
//! units of the layout's database unit.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use slotmap::SlotMap;
use subgeom::bbox::{Bbox, BoundBox};
use subgeom::transform::{Transform, Transformation};
use subgeom::Shape;

use self::cell::{Cell, CellKey, Element, Instance, TextElement};
use self::layers::LayerSpec;
use crate::deps::arcstr::ArcStr;

pub mod cell;
pub mod convert;
pub mod error;
pub mod layers;

/// A hierarchical layout.
#[derive(Debug, Clone)]
pub struct Layout {
    /// The library name.
    name: ArcStr,
    /// The database unit, in microns.
    dbu: f64,
    cells: SlotMap<CellKey, Cell>,
}

impl Layout {
    /// Creates an empty layout with database unit `dbu` (in microns).
    pub fn new(name: impl Into<ArcStr>, dbu: f64) -> Self {
        Self {
            name: name.into(),
            dbu,
            cells: SlotMap::with_key(),
        }
    }

    #[inline]
    pub fn name(&self) -> &ArcStr {
        &self.name
    }

    /// Returns the database unit in microns.
    #[inline]
    pub fn dbu(&self) -> f64 {
        self.dbu
    }

    /// Declares a new database unit without touching any coordinates.
    #[inline]
    pub fn set_dbu(&mut self, dbu: f64) {
        self.dbu = dbu;
    }

    /// Adds a cell to the layout, returning its key.
    pub fn add_cell(&mut self, cell: Cell) -> CellKey {
        self.cells.insert(cell)
    }

    /// Creates an empty cell named `name`.
    pub fn create_cell(&mut self, name: impl Into<ArcStr>) -> CellKey {
        self.add_cell(Cell::new(name))
    }

    #[inline]
    pub fn cell(&self, key: CellKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    #[inline]
    pub fn cell_mut(&mut self, key: CellKey) -> Option<&mut Cell> {
        self.cells.get_mut(key)
    }

    /// Iterates over all cells in insertion order.
    pub fn cells(&self) -> impl Iterator<Item = (CellKey, &Cell)> {
        self.cells.iter()
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = (CellKey, &mut Cell)> {
        self.cells.iter_mut()
    }

    /// Returns the number of cells in the layout.
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Returns the first cell named `name`.
    pub fn cell_by_name(&self, name: &str) -> Option<CellKey> {
        self.cells
            .iter()
            .find(|(_, cell)| cell.name().as_str() == name)
            .map(|(key, _)| key)
    }

    /// Returns every cell that is not instantiated by any other cell, sorted by name.
    pub fn top_cells(&self) -> Vec<CellKey> {
        let referenced: HashSet<CellKey> = self
            .cells
            .values()
            .flat_map(|cell| cell.insts().map(Instance::cell))
            .collect();
        let mut tops: Vec<CellKey> = self
            .cells
            .keys()
            .filter(|key| !referenced.contains(key))
            .collect();
        tops.sort_by(|a, b| self.cells[*a].name().cmp(self.cells[*b].name()));
        tops
    }

    /// Returns `key` and every cell it instantiates, directly or indirectly.
    ///
    /// Each cell appears once, parents before children.
    pub fn descendants(&self, key: CellKey) -> Vec<CellKey> {
        let mut seen = HashSet::from([key]);
        let mut order = vec![key];
        let mut queue = VecDeque::from([key]);
        while let Some(next) = queue.pop_front() {
            let Some(cell) = self.cells.get(next) else {
                continue;
            };
            for inst in cell.insts() {
                if seen.insert(inst.cell()) {
                    order.push(inst.cell());
                    queue.push_back(inst.cell());
                }
            }
        }
        order
    }

    /// Returns the bounding box of `key`, including all of its instances.
    pub fn bbox(&self, key: CellKey) -> Bbox {
        self.bbox_filtered(key, &|_| true, &mut HashMap::new())
    }

    /// Returns the bounding box of the geometry on `layers` under `key`.
    pub fn layer_bbox(&self, key: CellKey, layers: &[LayerSpec]) -> Bbox {
        self.bbox_filtered(key, &|layer| layers.contains(&layer), &mut HashMap::new())
    }

    fn bbox_filtered(
        &self,
        key: CellKey,
        keep: &dyn Fn(LayerSpec) -> bool,
        memo: &mut HashMap<CellKey, Bbox>,
    ) -> Bbox {
        if let Some(bbox) = memo.get(&key) {
            return *bbox;
        }
        let Some(cell) = self.cells.get(key) else {
            return Bbox::empty();
        };
        let mut bbox = Bbox::empty();
        for elem in cell.elems() {
            if keep(elem.layer) {
                bbox = elem.inner.union(bbox);
            }
        }
        for inst in cell.insts() {
            let b = self.bbox_filtered(inst.cell(), keep, memo);
            if !b.is_empty() {
                bbox = b
                    .into_rect()
                    .to_poly()
                    .transform(inst.transformation())
                    .points
                    .bbox()
                    .union(bbox);
            }
        }
        memo.insert(key, bbox);
        bbox
    }

    /// Returns the bounding box of `inst` in its parent's coordinates.
    pub fn inst_bbox(&self, inst: &Instance) -> Bbox {
        let bbox = self.bbox(inst.cell());
        if bbox.is_empty() {
            return bbox;
        }
        bbox.into_rect()
            .to_poly()
            .transform(inst.transformation())
            .points
            .bbox()
    }

    /// Visits every element under `key`, transformed into `key`'s coordinates.
    pub fn for_each_shape(&self, key: CellKey, f: &mut dyn FnMut(LayerSpec, Shape)) {
        self.for_each_shape_recur(key, Transformation::identity(), f);
    }

    fn for_each_shape_recur(
        &self,
        key: CellKey,
        trans: Transformation,
        f: &mut dyn FnMut(LayerSpec, Shape),
    ) {
        let Some(cell) = self.cells.get(key) else {
            return;
        };
        for elem in cell.elems() {
            f(elem.layer, elem.inner.transform(trans));
        }
        for inst in cell.insts() {
            let child = Transformation::cascade(trans, inst.transformation());
            self.for_each_shape_recur(inst.cell(), child, f);
        }
    }

    /// Collects the shapes on `layer` under `key`, in `key`'s coordinates.
    pub fn shapes_on(&self, key: CellKey, layer: LayerSpec) -> Vec<Shape> {
        let mut shapes = Vec::new();
        self.for_each_shape(key, &mut |l, shape| {
            if l == layer {
                shapes.push(shape);
            }
        });
        shapes
    }

    /// Collects every text annotation under `key`, in `key`'s coordinates.
    pub fn texts(&self, key: CellKey) -> Vec<TextElement> {
        let mut out = Vec::new();
        self.texts_recur(key, Transformation::identity(), &mut out);
        out
    }

    fn texts_recur(&self, key: CellKey, trans: Transformation, out: &mut Vec<TextElement>) {
        let Some(cell) = self.cells.get(key) else {
            return;
        };
        out.extend(cell.annotations().map(|t| t.transform(trans)));
        for inst in cell.insts() {
            let child = Transformation::cascade(trans, inst.transformation());
            self.texts_recur(inst.cell(), child, out);
        }
    }

    /// Returns the set of layers used by elements or annotations anywhere in the layout.
    pub fn layers(&self) -> BTreeSet<LayerSpec> {
        self.cells.values().flat_map(cell_layers).collect()
    }

    /// Returns the set of layers used by `key` and its descendants.
    pub fn layers_under(&self, key: CellKey) -> BTreeSet<LayerSpec> {
        self.descendants(key)
            .into_iter()
            .filter_map(|k| self.cells.get(k))
            .flat_map(cell_layers)
            .collect()
    }

    /// Deletes every element and annotation on `layer`, in every cell.
    ///
    /// Returns the number of removed objects.
    pub fn delete_layer(&mut self, layer: LayerSpec) -> usize {
        let mut removed = 0;
        for cell in self.cells.values_mut() {
            let before = cell.elems_mut().len() + cell.annotations_mut().len();
            cell.elems_mut().retain(|e| e.layer != layer);
            cell.annotations_mut().retain(|t| t.layer != layer);
            removed += before - cell.elems_mut().len() - cell.annotations_mut().len();
        }
        removed
    }

    /// Moves every element and annotation on `from` onto `to`, in every cell.
    pub fn move_layer(&mut self, from: LayerSpec, to: LayerSpec) -> usize {
        let mut moved = 0;
        for cell in self.cells.values_mut() {
            for elem in cell.elems_mut().iter_mut().filter(|e| e.layer == from) {
                elem.layer = to;
                moved += 1;
            }
            for text in cell.annotations_mut().iter_mut().filter(|t| t.layer == from) {
                text.layer = to;
                moved += 1;
            }
        }
        moved
    }

    /// Replaces the instances of `key` with their contents, recursively.
    ///
    /// Other cells instantiating the same masters are unaffected.
    pub fn flatten(&mut self, key: CellKey) {
        let Some(cell) = self.cells.get(key) else {
            return;
        };
        let mut elems = Vec::new();
        let mut texts = Vec::new();
        for inst in cell.insts() {
            self.flatten_inst(inst, &mut elems, &mut texts);
        }
        if let Some(cell) = self.cells.get_mut(key) {
            cell.insts_mut().clear();
            cell.add_elements(elems);
            cell.add_annotations(texts);
        }
    }

    /// Collects the contents of `inst`, transformed into its parent's coordinates.
    pub(crate) fn flatten_inst(
        &self,
        inst: &Instance,
        elems: &mut Vec<Element>,
        texts: &mut Vec<TextElement>,
    ) {
        let trans = inst.transformation();
        self.for_each_shape_recur(inst.cell(), trans, &mut |layer, inner| {
            elems.push(Element { layer, inner })
        });
        self.texts_recur(inst.cell(), trans, texts);
    }

    /// Copies `key` and its descendants from `src` into this layout.
    ///
    /// Returns the key of the copy of `key`, or [`None`] if `key` is not in `src`.
    /// Cell names are preserved; duplicates are resolved at export.
    pub fn copy_tree(&mut self, src: &Layout, key: CellKey) -> Option<CellKey> {
        let mut map: HashMap<CellKey, CellKey> = HashMap::new();
        // Children are copied before their parents so instance keys can be remapped.
        for old in src.descendants(key).into_iter().rev() {
            let Some(cell) = src.cell(old) else {
                continue;
            };
            let mut copy = cell.clone();
            for inst in copy.insts_mut().iter_mut() {
                if let Some(new) = map.get(&inst.cell()) {
                    inst.set_cell(*new);
                }
            }
            map.insert(old, self.add_cell(copy));
        }
        map.get(&key).copied()
    }

    /// Removes `key` and every descendant that is no longer instantiated elsewhere.
    pub fn prune(&mut self, key: CellKey) {
        let Some(cell) = self.cells.remove(key) else {
            return;
        };
        let children: BTreeSet<CellKey> = cell.insts().map(Instance::cell).collect();
        for child in children {
            let still_used = self
                .cells
                .values()
                .any(|c| c.insts().any(|i| i.cell() == child));
            if !still_used {
                self.prune(child);
            }
        }
    }
}

fn cell_layers(cell: &Cell) -> impl Iterator<Item = LayerSpec> + '_ {
    cell.elems()
        .map(|e| e.layer)
        .chain(cell.annotations().map(|t| t.layer))
}

#[cfg(test)]
mod tests {
    use subgeom::orientation::Named;
    use subgeom::{Point, Rect};

    use super::*;

    fn rect(x0: i64, y0: i64, x1: i64, y1: i64) -> Rect {
        Rect::new(Point::new(x0, y0), Point::new(x1, y1))
    }

    /// A top cell holding one rotated instance of a leaf with a single rectangle.
    fn two_level() -> (Layout, CellKey, CellKey) {
        let mut layout = Layout::new("lib", 0.001);
        let mut leaf = Cell::new("leaf");
        leaf.draw_rect(LayerSpec(1, 0), rect(0, 0, 100, 20));
        leaf.add_annotation(TextElement::new("opt_in_a", Point::new(5, 5), LayerSpec(10, 0)));
        let leaf = layout.add_cell(leaf);
        let mut top = Cell::new("top");
        top.add_inst(
            Instance::builder()
                .cell(leaf)
                .loc(Point::new(1000, 0))
                .orientation(Named::R90.into())
                .build()
                .unwrap(),
        );
        top.draw_rect(LayerSpec(99, 0), rect(0, 0, 50, 50));
        let top = layout.add_cell(top);
        (layout, top, leaf)
    }

    #[test]
    fn hierarchical_bbox() {
        let (layout, top, _) = two_level();
        assert_eq!(
            layout.bbox(top),
            Bbox::new(Point::new(0, 0), Point::new(1000, 100))
        );
        assert_eq!(
            layout.layer_bbox(top, &[LayerSpec(1, 0)]),
            Bbox::new(Point::new(980, 0), Point::new(1000, 100))
        );
        assert_eq!(layout.top_cells(), vec![top]);
    }

    #[test]
    fn flatten_moves_content_up() {
        let (mut layout, top, leaf) = two_level();
        layout.flatten(top);
        let cell = layout.cell(top).unwrap();
        assert_eq!(cell.insts().count(), 0);
        assert_eq!(cell.elems().count(), 2);
        assert_eq!(cell.annotations().next().unwrap().loc, Point::new(995, 5));
        // The master itself is untouched.
        assert_eq!(layout.cell(leaf).unwrap().elems().count(), 1);
        assert_eq!(layout.top_cells().len(), 2);
    }

    #[test]
    fn copy_tree_and_prune() {
        let (src, top, _) = two_level();
        let mut dst = Layout::new("dst", 0.001);
        let copy = dst.copy_tree(&src, top).unwrap();
        assert_eq!(dst.num_cells(), 2);
        assert_eq!(dst.bbox(copy), src.bbox(top));
        dst.prune(copy);
        assert_eq!(dst.num_cells(), 0);
    }

    #[test]
    fn layer_moves_and_deletes() {
        let (mut layout, top, _) = two_level();
        assert_eq!(
            layout.layers_under(top).into_iter().collect::<Vec<_>>(),
            vec![LayerSpec(1, 0), LayerSpec(10, 0), LayerSpec(99, 0)]
        );
        assert_eq!(layout.move_layer(LayerSpec(99, 0), LayerSpec(1, 0)), 1);
        assert_eq!(layout.delete_layer(LayerSpec(1, 0)), 2);
        assert_eq!(layout.layers(), BTreeSet::from([LayerSpec(10, 0)]));
    }
}
