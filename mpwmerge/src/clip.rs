//! Cropping of oversized designs to the allowed footprint.

use subgeom::bbox::{Bbox, BoundBox};
use subgeom::trim::Trim;
use subgeom::{Dims, Rect};

use crate::layout::cell::{Cell, CellKey};
use crate::layout::Layout;

/// The result of cropping a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clipped {
    /// The cropped copy of the cell.
    pub cell: CellKey,
    /// The crop box.
    pub bounds: Rect,
    /// Bounding box of the cell before cropping.
    pub before: Rect,
    /// Bounding box of the cropped copy.
    pub after: Bbox,
}

impl Clipped {
    /// Returns `true` if cropping removed any geometry extent.
    pub fn truncated(&self) -> bool {
        self.after != Bbox::from(self.before)
    }
}

/// Crops `key` to a box of size `max` anchored at the lower-left corner of its bounding box.
///
/// Returns [`None`] for a cell without geometry. The source cell is left
/// as is; the cropped version is added to `layout` as a new cell of the same name.
pub fn clip_to_footprint(layout: &mut Layout, key: CellKey, max: Dims) -> Option<Clipped> {
    let before = layout.bbox(key).into_option()?;
    let bounds = Rect::from_corner_dims(before.p0, max);
    let cell = clip_cell(layout, key, bounds)?;
    Some(Clipped {
        cell,
        bounds,
        before,
        after: layout.bbox(cell),
    })
}

/// Creates a copy of `key` with every shape inside `bounds`.
///
/// Returns [`None`] if `key` is not in `layout`.
/// Instances entirely inside `bounds` keep referencing their masters,
/// instances entirely outside are dropped, and instances crossing the
/// boundary are flattened into the copy and trimmed.
pub fn clip_cell(layout: &mut Layout, key: CellKey, bounds: Rect) -> Option<CellKey> {
    let src = layout.cell(key)?;
    let mut cell = Cell::new(src.name().clone());

    for elem in src.elems() {
        let bbox = elem.bbox();
        if bbox.is_empty() {
            continue;
        }
        if bounds.contains_rect(&bbox.into_rect()) {
            cell.add_element(elem.clone());
        } else {
            cell.add_elements(elem.clip(&bounds));
        }
    }
    cell.add_annotations(src.annotations().filter_map(|t| t.trim(&bounds)));

    let mut elems = Vec::new();
    let mut texts = Vec::new();
    for inst in src.insts() {
        let bbox = layout.inst_bbox(inst);
        match bbox.into_option() {
            Some(r) if bounds.contains_rect(&r) => cell.add_inst(inst.clone()),
            Some(r) if !intersects(&bounds, &r) => {}
            _ => layout.flatten_inst(inst, &mut elems, &mut texts),
        }
    }
    for elem in elems {
        cell.add_elements(elem.clip(&bounds));
    }
    cell.add_annotations(texts.iter().filter_map(|t| t.trim(&bounds)));

    Some(layout.add_cell(cell))
}

/// Closed-interval intersection test.
fn intersects(a: &Rect, b: &Rect) -> bool {
    a.hspan().intersects(&b.hspan()) && a.vspan().intersects(&b.vspan())
}

#[cfg(test)]
mod tests {
    use subgeom::{Path, Point, Polygon, Shape};

    use super::*;
    use crate::layout::cell::{Element, Instance, TextElement};
    use crate::layout::layers::LayerSpec;

    const SI: LayerSpec = LayerSpec::new(1, 0);

    fn oversized() -> (Layout, CellKey, CellKey) {
        let mut layout = Layout::new("lib", 0.001);
        let mut leaf = Cell::new("ring");
        leaf.draw_rect(SI, Rect::new(Point::zero(), Point::new(100, 100)));
        let leaf = layout.add_cell(leaf);

        let mut top = Cell::new("top");
        top.draw_rect(LayerSpec(99, 0), Rect::new(Point::new(10, 10), Point::new(1010, 510)));
        top.add_element(Element::new(
            SI,
            Path {
                points: vec![Point::new(10, 200), Point::new(900, 200)],
                width: 10,
            },
        ));
        top.add_inst(Instance::at(leaf, Point::new(20, 20)));
        top.add_inst(Instance::at(leaf, Point::new(450, 20)));
        top.add_inst(Instance::at(leaf, Point::new(800, 20)));
        top.add_annotation(TextElement::new("opt_in_a", Point::new(30, 30), LayerSpec(10, 0)));
        top.add_annotation(TextElement::new("opt_in_b", Point::new(700, 30), LayerSpec(10, 0)));
        let top = layout.add_cell(top);
        (layout, top, leaf)
    }

    #[test]
    fn oversized_cell_is_cropped() {
        let (mut layout, top, leaf) = oversized();
        let clipped = clip_to_footprint(&mut layout, top, Dims::new(500, 400)).unwrap();
        assert!(clipped.truncated());
        assert_eq!(
            clipped.bounds,
            Rect::new(Point::new(10, 10), Point::new(510, 410))
        );
        assert_eq!(
            clipped.after.into_rect(),
            Rect::new(Point::new(10, 10), Point::new(510, 410))
        );

        let cell = layout.cell(clipped.cell).unwrap();
        // Inside: kept. Straddling: flattened. Outside: dropped.
        assert_eq!(cell.insts().count(), 1);
        assert_eq!(cell.insts().next().unwrap().cell(), leaf);
        assert_eq!(cell.annotations().count(), 1);
        // The source is unchanged.
        assert_eq!(layout.cell(top).unwrap().insts().count(), 3);
    }

    #[test]
    fn every_shape_lies_in_the_crop_box() {
        let (mut layout, top, _) = oversized();
        let clipped = clip_to_footprint(&mut layout, top, Dims::new(500, 400)).unwrap();
        let mut shapes = Vec::new();
        layout.for_each_shape(clipped.cell, &mut |_, s| shapes.push(s));
        assert!(!shapes.is_empty());
        for shape in shapes {
            assert!(
                clipped.bounds.contains_rect(&shape.bbox().into_rect()),
                "{shape:?} escapes the crop box"
            );
        }
    }

    #[test]
    fn small_cell_is_not_truncated() {
        let (mut layout, _, leaf) = oversized();
        let clipped = clip_to_footprint(&mut layout, leaf, Dims::new(500, 400)).unwrap();
        assert!(!clipped.truncated());
        assert_eq!(layout.bbox(clipped.cell), layout.bbox(leaf));
    }

    #[test]
    fn empty_cell_is_skipped() {
        let mut layout = Layout::new("lib", 0.001);
        let key = layout.create_cell("empty");
        assert!(clip_to_footprint(&mut layout, key, Dims::new(10, 10)).is_none());
    }

    #[test]
    fn diagonal_polygon_is_trimmed() {
        let mut layout = Layout::new("lib", 0.001);
        let mut cell = Cell::new("tri");
        cell.add_element(Element::new(
            SI,
            Polygon {
                points: vec![Point::new(0, 0), Point::new(200, 0), Point::new(0, 200)],
            },
        ));
        let key = layout.add_cell(cell);
        let clipped = clip_cell(&mut layout, key, Rect::new(Point::zero(), Point::new(100, 100)))
            .unwrap();
        let elems: Vec<_> = layout.cell(clipped).unwrap().elems().cloned().collect();
        assert_eq!(elems.len(), 1);
        match &elems[0].inner {
            Shape::Polygon(p) => assert_eq!(p.area(), 10_000.),
            other => panic!("unexpected shape {other:?}"),
        }
    }
}
