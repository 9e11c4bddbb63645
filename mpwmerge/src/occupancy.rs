//! Tracking of the floorplan area already claimed on the canvas.

use subgeom::region::Region;
use subgeom::transform::{Transform, Transformation};
use subgeom::{Rect, Shape};

use crate::layout::cell::CellKey;
use crate::layout::layers::LayerSpec;
use crate::layout::Layout;

/// The union of every placed floorplan shape, in canvas coordinates.
///
/// Updated on each commit; [`Occupancy::from_canvas`] recomputes the same
/// region from scratch.
#[derive(Debug, Clone, Default)]
pub struct Occupancy {
    layer: LayerSpec,
    region: Region,
}

impl Occupancy {
    /// Creates an empty tracker for floorplan shapes on `layer`.
    pub fn new(layer: LayerSpec) -> Self {
        Self {
            layer,
            region: Region::new(),
        }
    }

    /// Collects every floorplan shape under `top`.
    pub fn from_canvas(layout: &Layout, top: CellKey, layer: LayerSpec) -> Self {
        let mut occupancy = Self::new(layer);
        occupancy.add_shapes(layout.shapes_on(top, layer));
        occupancy
    }

    /// Adds the floorplan shapes of `key`, placed with `trans`.
    pub fn commit(&mut self, layout: &Layout, key: CellKey, trans: Transformation) {
        let shapes = layout
            .shapes_on(key, self.layer)
            .into_iter()
            .map(|s| s.transform(trans));
        self.add_shapes(shapes);
    }

    /// Adds shapes already in canvas coordinates.
    pub fn add_shapes(&mut self, shapes: impl IntoIterator<Item = Shape>) {
        for shape in shapes {
            for poly in shape.to_polygons() {
                self.region.insert(poly);
            }
        }
    }

    /// Returns `true` if the interior of `rect` intersects a placed floorplan.
    ///
    /// Unlike KLayout's `Region::interacting`, footprints that only share an
    /// edge or a corner are not overlapping.
    #[inline]
    pub fn overlaps(&self, rect: &Rect) -> bool {
        self.region.overlaps_rect(rect)
    }

    /// Returns the merged floorplan region.
    pub fn union(&self) -> Region {
        self.region.merged()
    }

    #[inline]
    pub fn layer(&self) -> LayerSpec {
        self.layer
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.region.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use subgeom::{Dims, Path, Point};

    use super::*;
    use crate::layout::cell::{Cell, Element, Instance, TextElement};

    const FP: LayerSpec = LayerSpec::new(99, 0);

    fn design(layout: &mut Layout, name: &str, w: i64, h: i64) -> CellKey {
        let mut cell = Cell::new(name);
        cell.draw_rect(FP, Rect::new(Point::zero(), Point::new(w, h)));
        cell.draw_rect(LayerSpec(1, 0), Rect::new(Point::zero(), Point::new(w * 2, h * 2)));
        cell.add_annotation(TextElement::new("x", Point::new(w * 5, h * 5), FP));
        layout.add_cell(cell)
    }

    #[test]
    fn incremental_matches_full_traversal() {
        let mut layout = Layout::new("canvas", 0.001);
        let top = layout.create_cell("top");
        let mut occupancy = Occupancy::new(FP);
        for (i, loc) in [Point::new(0, 0), Point::new(0, 120), Point::new(130, 0)]
            .into_iter()
            .enumerate()
        {
            let key = design(&mut layout, &format!("d{i}"), 100, 100);
            let inst = Instance::at(key, loc);
            occupancy.commit(&layout, key, inst.transformation());
            layout.cell_mut(top).unwrap().add_inst(inst);
        }
        let full = Occupancy::from_canvas(&layout, top, FP);
        assert_eq!(occupancy.union(), full.union());
        assert_eq!(full.union().area(), 30_000.);
    }

    #[test]
    fn touching_is_free_but_overlap_is_not() {
        let mut layout = Layout::new("canvas", 0.001);
        let key = design(&mut layout, "d", 605_000, 410_000);
        let mut occupancy = Occupancy::new(FP);
        occupancy.commit(&layout, key, Transformation::identity());
        let above = Rect::from_corner_dims(Point::new(0, 410_000), Dims::new(605_000, 410_000));
        let right = Rect::from_corner_dims(Point::new(605_000, 0), Dims::new(605_000, 410_000));
        let inside = Rect::from_corner_dims(Point::new(604_999, 0), Dims::new(10, 10));
        assert!(!occupancy.overlaps(&above));
        assert!(!occupancy.overlaps(&right));
        assert!(occupancy.overlaps(&inside));
    }

    #[test]
    fn bent_floorplan_path_covers_its_corner() {
        let mut layout = Layout::new("canvas", 0.001);
        let mut cell = Cell::new("bend");
        cell.add_element(Element::new(
            FP,
            Path {
                points: vec![Point::new(0, 0), Point::new(100, 0), Point::new(100, 100)],
                width: 20,
            },
        ));
        let key = layout.add_cell(cell);
        let occupancy = Occupancy::from_canvas(&layout, key, FP);
        assert!(occupancy.overlaps(&Rect::new(Point::new(103, -8), Point::new(108, -3))));
        assert!(!occupancy.overlaps(&Rect::new(Point::new(111, -20), Point::new(120, -11))));
    }

    #[test]
    fn texts_and_other_layers_are_ignored() {
        let mut layout = Layout::new("canvas", 0.001);
        let key = design(&mut layout, "d", 10, 10);
        let occupancy = Occupancy::from_canvas(&layout, key, FP);
        assert!(!occupancy.overlaps(&Rect::new(Point::new(10, 10), Point::new(20, 20))));
        assert!(!occupancy.overlaps(&Rect::new(Point::new(45, 45), Point::new(55, 55))));
    }
}
