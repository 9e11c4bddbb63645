//! Substitution of opaque library cells.
//!
//! Black-box cells ship as abstract views carrying marker geometry. A
//! design is clean if every such view disappears once the known cells are
//! swapped for an empty stand-in.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use lazy_static::lazy_static;
use regex::Regex;

use crate::deps::arcstr::ArcStr;
use crate::layout::cell::CellKey;
use crate::layout::layers::LayerSpec;
use crate::layout::Layout;

/// Name of the empty stand-in cell.
pub const DUMMY_CELL: &str = "dummy_cell";

lazy_static! {
    static ref NAME_PATTERNS: RwLock<HashMap<ArcStr, Regex>> = RwLock::new(HashMap::new());
}

/// Returns the pattern matching `name` and its `$`-suffixed variants.
pub fn name_pattern(name: &ArcStr) -> Regex {
    if let Some(regex) = NAME_PATTERNS.read().ok().and_then(|map| map.get(name).cloned()) {
        return regex;
    }
    let regex = Regex::new(&format!(r"^{}(\$.*)?$", regex::escape(name)))
        .expect("failed to compile black-box name pattern");
    if let Ok(mut map) = NAME_PATTERNS.write() {
        map.insert(name.clone(), regex.clone());
    }
    regex
}

/// Instances of one black-box cell that were swapped out.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
pub struct Replacement {
    /// The configured black-box name.
    pub name: ArcStr,
    /// Number of instances now pointing at the stand-in.
    pub count: usize,
}

/// Points every instance of a black-box cell at an empty [`DUMMY_CELL`].
///
/// Returns one entry per configured name, in order. Instances already
/// swapped by an earlier, more general name are not counted again.
pub fn replace_black_boxes(layout: &mut Layout, names: &[ArcStr]) -> Vec<Replacement> {
    let dummy = layout
        .cell_by_name(DUMMY_CELL)
        .unwrap_or_else(|| layout.create_cell(DUMMY_CELL));

    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let pattern = name_pattern(name);
        let masters: HashSet<CellKey> = layout
            .cells()
            .filter(|(key, cell)| *key != dummy && pattern.is_match(cell.name()))
            .map(|(key, _)| key)
            .collect();
        let mut count = 0;
        if !masters.is_empty() {
            for (_, cell) in layout.cells_mut() {
                for inst in cell.insts_mut().iter_mut() {
                    if masters.contains(&inst.cell()) {
                        inst.set_cell(dummy);
                        count += 1;
                    }
                }
            }
        }
        out.push(Replacement {
            name: name.clone(),
            count,
        });
    }
    out
}

/// Returns the cells under `top` holding geometry on `marker`.
pub fn cells_with_marker(layout: &Layout, top: CellKey, marker: LayerSpec) -> Vec<ArcStr> {
    layout
        .descendants(top)
        .into_iter()
        .filter_map(|key| layout.cell(key))
        .filter(|cell| cell.elems().any(|e| e.layer == marker))
        .map(|cell| cell.name().clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use subgeom::{Point, Rect};

    use super::*;
    use crate::layout::cell::{Cell, Instance};

    const MARKER: LayerSpec = LayerSpec::new(998, 0);

    fn bb(name: &str) -> Cell {
        let mut cell = Cell::new(name);
        cell.draw_rect(MARKER, Rect::new(Point::new(0, 0), Point::new(30, 30)));
        cell
    }

    #[test]
    fn variants_match_but_prefixes_do_not() {
        let pattern = name_pattern(&arcstr::literal!("ebeam_gc_te1550"));
        assert!(pattern.is_match("ebeam_gc_te1550"));
        assert!(pattern.is_match("ebeam_gc_te1550$1"));
        assert!(!pattern.is_match("ebeam_gc_te1550_custom"));
        assert!(!pattern.is_match("my_ebeam_gc_te1550"));
        let dotted = name_pattern(&arcstr::literal!("a.b"));
        assert!(!dotted.is_match("axb"));
    }

    #[test]
    fn known_cell_is_replaced() {
        let mut layout = Layout::new("lib", 0.001);
        let gc = layout.add_cell(bb("ebeam_gc_te1550"));
        let gc2 = layout.add_cell(bb("ebeam_gc_te1550$2"));
        let mut top = Cell::new("top");
        top.add_inst(Instance::new(gc));
        top.add_inst(Instance::at(gc2, Point::new(0, 127_000)));
        let top = layout.add_cell(top);

        assert_eq!(cells_with_marker(&layout, top, MARKER).len(), 2);
        let reps = replace_black_boxes(&mut layout, &[arcstr::literal!("ebeam_gc_te1550")]);
        assert_eq!(reps[0].count, 2);
        assert!(cells_with_marker(&layout, top, MARKER).is_empty());
        let dummy = layout.cell_by_name(DUMMY_CELL).unwrap();
        assert!(layout.cell(top).unwrap().insts().all(|i| i.cell() == dummy));
    }

    #[test]
    fn unknown_cell_remains() {
        let mut layout = Layout::new("lib", 0.001);
        let rogue = layout.add_cell(bb("my_grating"));
        let mut top = Cell::new("top");
        top.add_inst(Instance::new(rogue));
        let top = layout.add_cell(top);
        let reps = replace_black_boxes(&mut layout, &[arcstr::literal!("ebeam_gc_te1550")]);
        assert_eq!(reps[0].count, 0);
        assert_eq!(cells_with_marker(&layout, top, MARKER), vec![arcstr::literal!("my_grating")]);
    }
}
