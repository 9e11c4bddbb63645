//! Database unit normalization.

use subgeom::transform::{Transform, Transformation};

use crate::error::{ErrorSource, Result};
use crate::layout::Layout;

/// Number of decimal places considered when comparing database units.
const DBU_PLACES: i32 = 10;

/// A rescale applied to a layout.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rescale {
    /// The database unit the layout was authored in, in microns.
    pub native: f64,
    /// The database unit the layout now uses, in microns.
    pub canonical: f64,
    /// The factor applied to every coordinate.
    pub ratio: f64,
}

/// Rounds `value` to `places` decimal places.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Returns `true` if `native` differs from `canonical` after rounding.
pub fn needs_rescale(native: f64, canonical: f64) -> bool {
    round_to(native, DBU_PLACES) != round_to(canonical, DBU_PLACES)
}

/// Brings `layout` to the `canonical` database unit.
///
/// Coordinates are scaled by `native / canonical` so that physical
/// dimensions are preserved. Returns [`None`] if no rescale was needed.
/// The layout is left untouched if the ratio is not a finite positive number.
pub fn normalize(layout: &mut Layout, canonical: f64) -> Result<Option<Rescale>> {
    let native = layout.dbu();
    if !needs_rescale(native, canonical) {
        return Ok(None);
    }
    let ratio = round_to(native / canonical, DBU_PLACES);
    if !ratio.is_finite() || ratio <= 0. {
        return Err(ErrorSource::InvalidUnits {
            native,
            canonical,
            ratio,
        }
        .into());
    }
    scale(layout, ratio);
    layout.set_dbu(canonical);
    Ok(Some(Rescale {
        native,
        canonical,
        ratio,
    }))
}

/// Scales every coordinate in `layout` about the origin.
///
/// Shape points, path widths, text locations and instance positions are
/// scaled; instance magnifications are not, since the masters are scaled too.
pub fn scale(layout: &mut Layout, factor: f64) {
    let trans = Transformation::scale(factor);
    for (_, cell) in layout.cells_mut() {
        for elem in cell.elems_mut().iter_mut() {
            *elem = elem.transform(trans);
        }
        for text in cell.annotations_mut().iter_mut() {
            *text = text.transform(trans);
        }
        for inst in cell.insts_mut().iter_mut() {
            let loc = inst.loc().transform(trans);
            inst.set_loc(loc);
        }
    }
}

#[cfg(test)]
mod tests {
    use float_eq::assert_float_eq;
    use subgeom::{Path, Point, Rect};

    use super::*;
    use crate::layout::cell::{Cell, Element, Instance, TextElement};
    use crate::layout::layers::LayerSpec;

    fn sample(dbu: f64) -> Layout {
        let mut layout = Layout::new("lib", dbu);
        let mut leaf = Cell::new("leaf");
        leaf.draw_rect(LayerSpec(1, 0), Rect::new(Point::new(0, 0), Point::new(5000, 2000)));
        leaf.add_element(Element::new(
            LayerSpec(1, 0),
            Path {
                points: vec![Point::new(0, 0), Point::new(10000, 0)],
                width: 5000,
            },
        ));
        let leaf = layout.add_cell(leaf);
        let mut top = Cell::new("top");
        top.add_inst(Instance::at(leaf, Point::new(20000, 40000)));
        top.add_annotation(TextElement::new("opt_in_x", Point::new(100, 300), LayerSpec(10, 0)));
        layout.add_cell(top);
        layout
    }

    #[test]
    fn fine_grid_is_scaled_down() {
        let mut layout = sample(1e-4);
        let rescale = normalize(&mut layout, 1e-3).unwrap().unwrap();
        assert_float_eq!(rescale.ratio, 0.1, abs <= 1e-12);
        assert_float_eq!(layout.dbu(), 1e-3, abs <= 1e-15);

        let leaf = layout.cell_by_name("leaf").unwrap();
        let elems: Vec<_> = layout.cell(leaf).unwrap().elems().cloned().collect();
        assert_eq!(
            elems[0].inner.as_rect(),
            Some(Rect::new(Point::new(0, 0), Point::new(500, 200)))
        );
        match &elems[1].inner {
            subgeom::Shape::Path(path) => {
                assert_eq!(path.width, 500);
                assert_eq!(path.points[1], Point::new(1000, 0));
            }
            other => panic!("expected a path, got {other:?}"),
        }
        let top = layout.cell_by_name("top").unwrap();
        let top = layout.cell(top).unwrap();
        assert_eq!(top.insts().next().unwrap().loc(), Point::new(2000, 4000));
        assert_eq!(top.annotations().next().unwrap().loc, Point::new(10, 30));
    }

    #[test]
    fn matching_units_are_untouched() {
        let mut layout = sample(0.001);
        assert_eq!(normalize(&mut layout, 0.001).unwrap(), None);
        // Differences beyond ten decimal places are ignored.
        assert!(!needs_rescale(0.001 + 1e-13, 0.001));
    }

    #[test]
    fn round_trip_reproduces_coordinates() {
        let mut layout = sample(1e-4);
        let top = layout.cell_by_name("top").unwrap();
        let before = layout.bbox(top);
        normalize(&mut layout, 1e-3).unwrap();
        normalize(&mut layout, 1e-4).unwrap();
        assert_eq!(layout.bbox(top), before);
        assert_float_eq!(layout.dbu(), 1e-4, abs <= 1e-15);
    }

    #[test]
    fn invalid_ratio_is_rejected() {
        let mut layout = sample(0.);
        let err = normalize(&mut layout, 1e-3).unwrap_err();
        assert!(matches!(err.source(), ErrorSource::InvalidUnits { .. }));
        assert!(!err.is_fatal());
        assert_eq!(layout.dbu(), 0.);
    }
}
