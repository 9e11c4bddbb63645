//! Polygonal regions with union and interior-overlap queries.
//!
//! A [`Region`] stores its area as a list of convex pieces. Pieces may
//! overlap one another; [`Region::merged`] produces the canonical union as
//! disjoint trapezoids.

use serde::{Deserialize, Serialize};

use crate::bbox::{Bbox, BoundBox};
use crate::{Point, Polygon, Rect};

const EPS: f64 = 1e-9;

/// A set of points in the plane described by convex polygons.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pieces: Vec<Polygon>,
}

impl Region {
    /// Creates an empty region.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a region covering the union of `polygons`.
    pub fn from_polygons(polygons: impl IntoIterator<Item = Polygon>) -> Self {
        let mut region = Self::new();
        for poly in polygons {
            region.insert(poly);
        }
        region
    }

    /// Adds the area of `poly` to the region.
    ///
    /// Rectangles are stored directly; other polygons are decomposed into
    /// convex trapezoids using the non-zero winding rule.
    pub fn insert(&mut self, poly: Polygon) {
        if poly.points.len() < 3 || poly.area() == 0. {
            return;
        }
        if let Some(rect) = poly.as_rect() {
            self.pieces.push(rect.to_poly());
        } else {
            self.pieces.extend(trapezoids(std::slice::from_ref(&poly)));
        }
    }

    /// Adds a rectangle to the region.
    pub fn insert_rect(&mut self, rect: Rect) {
        if rect.area() > 0 {
            self.pieces.push(rect.to_poly());
        }
    }

    /// Adds every piece of `other` to this region.
    pub fn extend(&mut self, other: &Region) {
        self.pieces.extend(other.pieces.iter().cloned());
    }

    /// Returns `true` if the region covers no area.
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Returns the convex pieces making up the region.
    pub fn pieces(&self) -> &[Polygon] {
        &self.pieces
    }

    /// Returns the union of the region as disjoint trapezoids in a canonical order.
    pub fn merged(&self) -> Region {
        Region {
            pieces: trapezoids(&self.pieces),
        }
    }

    /// Returns the area covered by the region, counting overlaps once.
    pub fn area(&self) -> f64 {
        self.merged().pieces.iter().map(Polygon::area).sum()
    }

    /// Returns `true` if the interior of `rect` intersects the interior of the region.
    ///
    /// Shapes that only touch along an edge or at a corner do not overlap.
    pub fn overlaps_rect(&self, rect: &Rect) -> bool {
        if rect.area() == 0 {
            return false;
        }
        let rpoly = rect.to_poly();
        self.pieces.iter().any(|piece| {
            piece
                .bbox()
                .into_option()
                .map(|b| b.overlaps(rect))
                .unwrap_or(false)
                && convex_overlap(&piece.points, &rpoly.points)
        })
    }

    /// Returns `true` if the interiors of the two regions intersect.
    pub fn interacting(&self, other: &Region) -> bool {
        self.pieces.iter().any(|a| {
            let abox = a.bbox();
            other.pieces.iter().any(|b| {
                let bbox = b.bbox();
                abox.into_option()
                    .zip(bbox.into_option())
                    .map(|(ra, rb)| ra.overlaps(&rb))
                    .unwrap_or(false)
                    && convex_overlap(&a.points, &b.points)
            })
        })
    }
}

impl BoundBox for Region {
    fn bbox(&self) -> Bbox {
        self.pieces
            .iter()
            .fold(Bbox::empty(), |acc, piece| acc.union(piece.bbox()))
    }
}

/// Separating-axis test for two convex polygons.
///
/// Returns `true` only when their interiors intersect.
fn convex_overlap(a: &[Point], b: &[Point]) -> bool {
    for poly in [a, b] {
        let n = poly.len();
        for i in 0..n {
            let (p, q) = (poly[i], poly[(i + 1) % n]);
            let axis = ((p.y - q.y) as i128, (q.x - p.x) as i128);
            if axis == (0, 0) {
                continue;
            }
            let project = |pts: &[Point]| {
                pts.iter()
                    .map(|pt| axis.0 * pt.x as i128 + axis.1 * pt.y as i128)
                    .fold((i128::MAX, i128::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
            };
            let (alo, ahi) = project(a);
            let (blo, bhi) = project(b);
            if ahi <= blo || bhi <= alo {
                return false;
            }
        }
    }
    true
}

/// A non-horizontal polygon edge, oriented bottom to top.
#[derive(Debug, Clone, Copy)]
struct SweepEdge {
    x0: f64,
    y0: f64,
    x1: f64,
    y1: f64,
    winding: i32,
}

impl SweepEdge {
    fn x_at(&self, y: f64) -> f64 {
        if (self.y1 - self.y0).abs() < EPS {
            return self.x0;
        }
        self.x0 + (self.x1 - self.x0) * (y - self.y0) / (self.y1 - self.y0)
    }

    /// Returns the y-coordinate at which two edges cross strictly inside both.
    fn crossing(&self, other: &SweepEdge) -> Option<f64> {
        let lo = self.y0.max(other.y0);
        let hi = self.y1.min(other.y1);
        if hi - lo <= EPS {
            return None;
        }
        let d_lo = self.x_at(lo) - other.x_at(lo);
        let d_hi = self.x_at(hi) - other.x_at(hi);
        if d_lo * d_hi >= 0. {
            return None;
        }
        let t = d_lo / (d_lo - d_hi);
        Some(lo + t * (hi - lo))
    }
}

/// A trapezoid with horizontal top and bottom sides.
#[derive(Debug, Clone, Copy)]
struct Trap {
    y0: f64,
    y1: f64,
    xl0: f64,
    xr0: f64,
    xl1: f64,
    xr1: f64,
}

impl Trap {
    /// Attempts to extend `self` upward by `above`, which must share its bottom side with our top.
    fn absorb(&mut self, above: &Trap) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() < EPS;
        let collinear = |x0: f64, x1: f64, x2: f64, h0: f64, h1: f64| {
            ((x1 - x0) * h1 - (x2 - x1) * h0).abs() < EPS * (1. + h0 * h1)
        };
        if !close(self.y1, above.y0) || !close(self.xl1, above.xl0) || !close(self.xr1, above.xr0)
        {
            return false;
        }
        let (h0, h1) = (self.y1 - self.y0, above.y1 - above.y0);
        if !collinear(self.xl0, self.xl1, above.xl1, h0, h1)
            || !collinear(self.xr0, self.xr1, above.xr1, h0, h1)
        {
            return false;
        }
        self.y1 = above.y1;
        self.xl1 = above.xl1;
        self.xr1 = above.xr1;
        true
    }

    fn to_polygon(self) -> Option<Polygon> {
        let r = |v: f64| v.round() as i64;
        let mut points = vec![
            Point::new(r(self.xl0), r(self.y0)),
            Point::new(r(self.xr0), r(self.y0)),
            Point::new(r(self.xr1), r(self.y1)),
            Point::new(r(self.xl1), r(self.y1)),
        ];
        points.dedup();
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        let poly = Polygon { points };
        (poly.points.len() >= 3 && poly.area() > 0.).then_some(poly)
    }
}

/// Decomposes the non-zero-winding union of `polygons` into disjoint trapezoids.
fn trapezoids(polygons: &[Polygon]) -> Vec<Polygon> {
    let mut edges = Vec::new();
    for poly in polygons {
        let n = poly.points.len();
        for i in 0..n {
            let (p, q) = (poly.points[i], poly.points[(i + 1) % n]);
            if p.y == q.y {
                continue;
            }
            let (lo, hi, winding) = if p.y < q.y { (p, q, 1) } else { (q, p, -1) };
            edges.push(SweepEdge {
                x0: lo.x as f64,
                y0: lo.y as f64,
                x1: hi.x as f64,
                y1: hi.y as f64,
                winding,
            });
        }
    }

    let mut ys: Vec<f64> = edges.iter().flat_map(|e| [e.y0, e.y1]).collect();
    for (i, a) in edges.iter().enumerate() {
        for b in &edges[i + 1..] {
            if let Some(y) = a.crossing(b) {
                ys.push(y);
            }
        }
    }
    ys.sort_by(f64::total_cmp);
    ys.dedup_by(|a, b| (*a - *b).abs() < EPS);

    let mut done: Vec<Trap> = Vec::new();
    let mut open: Vec<Trap> = Vec::new();
    for slab in ys.windows(2) {
        let (ya, yb) = (slab[0], slab[1]);
        let ym = (ya + yb) / 2.;
        let mut active: Vec<&SweepEdge> = edges
            .iter()
            .filter(|e| e.y0 <= ya + EPS && e.y1 >= yb - EPS)
            .collect();
        active.sort_by(|a, b| a.x_at(ym).total_cmp(&b.x_at(ym)));

        let mut traps = Vec::new();
        let mut winding = 0;
        let mut left: Option<&SweepEdge> = None;
        for e in active {
            let prev = winding;
            winding += e.winding;
            if prev == 0 && winding != 0 {
                left = Some(e);
            } else if prev != 0 && winding == 0 {
                if let Some(l) = left.take() {
                    traps.push(Trap {
                        y0: ya,
                        y1: yb,
                        xl0: l.x_at(ya),
                        xr0: e.x_at(ya),
                        xl1: l.x_at(yb),
                        xr1: e.x_at(yb),
                    });
                }
            }
        }

        let mut next_open = Vec::with_capacity(traps.len());
        for trap in traps {
            match open.iter().position(|o| {
                let mut o = *o;
                o.absorb(&trap)
            }) {
                Some(idx) => {
                    let mut o = open.swap_remove(idx);
                    o.absorb(&trap);
                    next_open.push(o);
                }
                None => next_open.push(trap),
            }
        }
        done.append(&mut open);
        open = next_open;
    }
    done.append(&mut open);

    let mut out: Vec<Polygon> = done.into_iter().filter_map(Trap::to_polygon).collect();
    out.sort_by(|a, b| a.points.cmp(&b.points));
    out
}
