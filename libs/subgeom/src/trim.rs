//! Trimming geometry to a bounding rectangle.

use crate::bbox::BoundBox;
use crate::{Point, Polygon, Rect};

/// Restricts a shape to the region covered by a bound of type `T`.
pub trait Trim<T> {
    /// The type of the trimmed shape.
    type Output;

    /// Trims `self` to `bounds`, returning [`None`] if nothing remains.
    fn trim(&self, bounds: &T) -> Option<Self::Output>;
}

impl Trim<Rect> for Point {
    type Output = Point;

    fn trim(&self, bounds: &Rect) -> Option<Self::Output> {
        bounds.bbox().contains(*self).then_some(*self)
    }
}

impl Trim<Rect> for Rect {
    type Output = Rect;

    fn trim(&self, bounds: &Rect) -> Option<Self::Output> {
        let bbox = self.intersection(bounds.bbox());
        if bbox.is_empty() || bbox.width() == 0 || bbox.height() == 0 {
            None
        } else {
            Some(bbox.into_rect())
        }
    }
}

/// One side of the clip rectangle.
#[derive(Debug, Clone, Copy)]
enum Edge {
    Left(i64),
    Right(i64),
    Bottom(i64),
    Top(i64),
}

impl Edge {
    fn inside(&self, p: Point) -> bool {
        match *self {
            Edge::Left(x) => p.x >= x,
            Edge::Right(x) => p.x <= x,
            Edge::Bottom(y) => p.y >= y,
            Edge::Top(y) => p.y <= y,
        }
    }

    /// Intersection of segment `p -> q` with this edge's line.
    ///
    /// Only called when `p` and `q` lie on opposite sides.
    fn intersect(&self, p: Point, q: Point) -> Point {
        let lerp = |a0: i64, a1: i64, b0: i64, b1: i64, at: i64| -> i64 {
            // Parametrized along the `a` axis; `a0 != a1` on a crossing segment.
            let t = (at - a0) as f64 / (a1 - a0) as f64;
            (b0 as f64 + t * (b1 - b0) as f64).round() as i64
        };
        match *self {
            Edge::Left(x) | Edge::Right(x) => Point::new(x, lerp(p.x, q.x, p.y, q.y, x)),
            Edge::Bottom(y) | Edge::Top(y) => Point::new(lerp(p.y, q.y, p.x, q.x, y), y),
        }
    }
}

impl Trim<Rect> for Polygon {
    type Output = Polygon;

    /// Sutherland-Hodgman clipping against each side of `bounds` in turn.
    ///
    /// Concave inputs may produce zero-width connecting edges along the
    /// boundary; the covered area is exact up to integer rounding.
    fn trim(&self, bounds: &Rect) -> Option<Self::Output> {
        let poly_bbox = self.points.bbox();
        if poly_bbox.is_empty() {
            return None;
        }
        if bounds.contains_rect(&poly_bbox.into_rect()) {
            return Some(self.clone());
        }
        if !bounds.overlaps(&poly_bbox.into_rect()) {
            return None;
        }

        let mut points = self.points.clone();
        for edge in [
            Edge::Left(bounds.left()),
            Edge::Right(bounds.right()),
            Edge::Bottom(bounds.bottom()),
            Edge::Top(bounds.top()),
        ] {
            if points.is_empty() {
                break;
            }
            let input = std::mem::take(&mut points);
            let n = input.len();
            for i in 0..n {
                let cur = input[i];
                let prev = input[(i + n - 1) % n];
                match (edge.inside(prev), edge.inside(cur)) {
                    (true, true) => points.push(cur),
                    (true, false) => points.push(edge.intersect(prev, cur)),
                    (false, true) => {
                        points.push(edge.intersect(prev, cur));
                        points.push(cur);
                    }
                    (false, false) => (),
                }
            }
        }

        points.dedup();
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        let poly = Polygon { points };
        if poly.points.len() < 3 || poly.area() == 0. {
            None
        } else {
            Some(poly)
        }
    }
}
