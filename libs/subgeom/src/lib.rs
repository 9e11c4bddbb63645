//! Core geometric types and their operations/attributes.

use std::cmp::Ordering;
use std::fmt::Display;
use std::str::FromStr;

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use transform::{Transform, Transformation, Translate};

use self::bbox::{Bbox, BoundBox};
use self::trim::Trim;

pub mod bbox;
pub mod orientation;
pub mod region;
pub mod transform;
pub mod trim;

/// A point in two-dimensional layout-space.
#[derive(
    Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    /// Creates a new [`Point`] from (x,y) coordinates.
    pub fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Returns the origin, (0, 0).
    #[inline]
    pub fn zero() -> Self {
        Self { x: 0, y: 0 }
    }

    /// Gets the coordinate associated with direction `dir`.
    pub fn coord(&self, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.x,
            Dir::Vert => self.y,
        }
    }

    /// Creates a new [`Point`] shifted by `p.x` in the x-dimension and by `p.y` in the y-dimension.
    #[inline]
    pub fn translated(&self, p: Point) -> Self {
        let mut pt = *self;
        pt.translate(p);
        pt
    }
}

impl std::ops::Add<Point> for Point {
    type Output = Self;
    fn add(self, rhs: Point) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::AddAssign<Point> for Point {
    fn add_assign(&mut self, rhs: Point) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl std::ops::Sub<Point> for Point {
    type Output = Self;
    fn sub(self, rhs: Point) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Neg for Point {
    type Output = Self;
    fn neg(self) -> Self::Output {
        Self::new(-self.x, -self.y)
    }
}

impl From<(i64, i64)> for Point {
    fn from(value: (i64, i64)) -> Self {
        Self {
            x: value.0,
            y: value.1,
        }
    }
}

impl Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// A one-dimensional span.
#[derive(
    Debug, Default, Clone, Copy, Hash, Ord, PartialOrd, Serialize, Deserialize, PartialEq, Eq,
)]
pub struct Span {
    start: i64,
    stop: i64,
}

impl Span {
    /// Creates a new [`Span`] between two integers.
    pub fn new(start: i64, stop: i64) -> Self {
        use std::cmp::{max, min};
        let lower = min(start, stop);
        let upper = max(start, stop);
        Self {
            start: lower,
            stop: upper,
        }
    }

    pub fn with_start_and_length(start: i64, length: i64) -> Self {
        Self {
            stop: start + length,
            start,
        }
    }

    /// Gets the length of the span.
    #[inline]
    pub fn length(&self) -> i64 {
        self.stop - self.start
    }

    /// Gets the start of the span.
    #[inline]
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Gets the stop of the span.
    #[inline]
    pub fn stop(&self) -> i64 {
        self.stop
    }

    /// Checks if the span intersects with the [`Span`] `other`.
    ///
    /// Spans that only share an endpoint are considered intersecting.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.stop < self.start || self.stop < other.start)
    }

    /// Checks if the interiors of this span and `other` overlap.
    #[inline]
    pub fn overlaps(&self, other: &Self) -> bool {
        other.start < self.stop && self.start < other.stop
    }

    pub fn union(self, other: Self) -> Self {
        use std::cmp::{max, min};
        Self {
            start: min(self.start, other.start),
            stop: max(self.stop, other.stop),
        }
    }

    pub fn contains(self, other: Self) -> bool {
        self.union(other) == self
    }
}

impl From<(i64, i64)> for Span {
    #[inline]
    fn from(tup: (i64, i64)) -> Self {
        Self::new(tup.0, tup.1)
    }
}

impl From<Span> for (i64, i64) {
    #[inline]
    fn from(s: Span) -> Self {
        (s.start(), s.stop())
    }
}

/// An enumeration of axis-aligned directions.
#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum Dir {
    /// The horizontal, or x-aligned, direction.
    #[default]
    Horiz,
    /// The vertical, or y-aligned, direction.
    Vert,
}

#[derive(Debug, Clone, Eq, PartialEq, Error)]
#[error("error parsing direction `{original}`; expected horizontal or vertical")]
pub struct DirParseError {
    original: String,
}

impl FromStr for Dir {
    type Err = DirParseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowercase = s.to_lowercase();
        match lowercase.trim() {
            "vertical" | "vert" | "v" => Ok(Self::Vert),
            "horizontal" | "horiz" | "h" => Ok(Self::Horiz),
            _ => Err(DirParseError {
                original: s.to_string(),
            }),
        }
    }
}

impl Dir {
    /// Returns the perpendicular direction.
    pub fn other(self) -> Self {
        match self {
            Self::Horiz => Self::Vert,
            Self::Vert => Self::Horiz,
        }
    }
}

impl Display for Dir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::Horiz => write!(f, "horizontal"),
            Self::Vert => write!(f, "vertical"),
        }
    }
}

/// An open-ended geometric path with non-zero width.
///
/// Primarily consists of a series of ordered [`Point`]s.
/// Segment ends are flush with the path's points.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Path {
    pub points: Vec<Point>,
    pub width: usize,
}

impl Path {
    /// Converts the path into [`Polygon`]s: one four-sided polygon per
    /// segment, plus a mitered join polygon at each interior bend.
    ///
    /// Zero-length segments are skipped. A path with a single point
    /// produces no polygons. Bends sharper than 120 degrees are beveled.
    pub fn to_polygons(&self) -> Vec<Polygon> {
        let half = self.width as f64 / 2.;
        let segs: Vec<(Point, Point)> = self
            .points
            .windows(2)
            .filter(|seg| seg[0] != seg[1])
            .map(|seg| (seg[0], seg[1]))
            .collect();

        let mut polys: Vec<Polygon> = segs
            .iter()
            .map(|&(p, q)| {
                let (nx, ny) = unit_normal(p, q);
                let (nx, ny) = (nx * half, ny * half);
                Polygon {
                    points: vec![
                        offset(p, -nx, -ny),
                        offset(q, -nx, -ny),
                        offset(q, nx, ny),
                        offset(p, nx, ny),
                    ],
                }
            })
            .collect();

        if half > 0. {
            polys.extend(
                segs.windows(2)
                    .filter_map(|pair| join(pair[0], pair[1], half)),
            );
        }
        polys
    }
}

/// Left-hand unit normal of the segment from `p` to `q`.
fn unit_normal(p: Point, q: Point) -> (f64, f64) {
    let dx = (q.x - p.x) as f64;
    let dy = (q.y - p.y) as f64;
    let len = (dx * dx + dy * dy).sqrt();
    (-dy / len, dx / len)
}

fn offset(pt: Point, sx: f64, sy: f64) -> Point {
    Point::new(
        (pt.x as f64 + sx).round() as i64,
        (pt.y as f64 + sy).round() as i64,
    )
}

/// Fills the outer corner where segment `a` turns into segment `b`.
///
/// Returns [`None`] for collinear segments.
fn join(a: (Point, Point), b: (Point, Point), half: f64) -> Option<Polygon> {
    let v = a.1;
    let (d1x, d1y) = ((a.1.x - a.0.x) as f64, (a.1.y - a.0.y) as f64);
    let (d2x, d2y) = ((b.1.x - b.0.x) as f64, (b.1.y - b.0.y) as f64);
    let cross = d1x * d2y - d1y * d2x;
    if cross == 0. && d1x * d2x + d1y * d2y >= 0. {
        return None;
    }
    // The outer side is to the right of a left turn.
    let side = if cross > 0. { -1. } else { 1. };
    let (n1x, n1y) = unit_normal(a.0, a.1);
    let (n2x, n2y) = unit_normal(b.0, b.1);
    let (o1x, o1y) = (n1x * side, n1y * side);
    let (o2x, o2y) = (n2x * side, n2y * side);

    let mut points = vec![v, offset(v, o1x * half, o1y * half)];
    let denom = 1. + o1x * o2x + o1y * o2y;
    if denom >= 0.5 {
        let k = half / denom;
        points.push(offset(v, (o1x + o2x) * k, (o1y + o2y) * k));
    }
    points.push(offset(v, o2x * half, o2y * half));

    let mut poly = Polygon { points };
    if poly.signed_area() < 0. {
        poly.points.reverse();
    }
    if poly.area() == 0. {
        return None;
    }
    Some(poly)
}

impl Translate for Path {
    fn translate(&mut self, p: Point) {
        for pt in self.points.iter_mut() {
            pt.translate(p);
        }
    }
}

/// A closed n-sided polygon with arbitrary number of vertices.
///
/// Closure from the last point back to the first is implied;
/// the initial point need not be repeated at the end.
#[derive(Debug, Default, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Polygon {
    pub points: Vec<Point>,
}

impl Polygon {
    /// Returns the signed area of the polygon.
    ///
    /// Counter-clockwise polygons have positive area.
    pub fn signed_area(&self) -> f64 {
        let n = self.points.len();
        let mut acc: i128 = 0;
        for i in 0..n {
            let (a, b) = (self.points[i], self.points[(i + 1) % n]);
            acc += a.x as i128 * b.y as i128 - b.x as i128 * a.y as i128;
        }
        acc as f64 / 2.
    }

    /// Returns the absolute area of the polygon.
    #[inline]
    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Returns the polygon as a [`Rect`] if it is an axis-aligned rectangle.
    pub fn as_rect(&self) -> Option<Rect> {
        let pts = &self.points;
        if pts.len() == 4
            && ((pts[0].x == pts[1].x // Clockwise
                && pts[1].y == pts[2].y
                && pts[2].x == pts[3].x
                && pts[3].y == pts[0].y)
                || (pts[0].y == pts[1].y // Counter-clockwise
                    && pts[1].x == pts[2].x
                    && pts[2].y == pts[3].y
                    && pts[3].x == pts[0].x))
        {
            Some(Rect::new(pts[0], pts[2]))
        } else {
            None
        }
    }
}

impl Translate for Polygon {
    fn translate(&mut self, p: Point) {
        for pt in self.points.iter_mut() {
            pt.translate(p);
        }
    }
}

/// An axis-aligned rectangle, specified by lower-left and upper-right corners.
#[derive(
    Debug, Default, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub struct Rect {
    /// The lower-left corner.
    pub p0: Point,
    /// The upper-right corner.
    pub p1: Point,
}

impl Rect {
    /// Creates a rectangle with points `(0, 0), (dims.w(), dims.h())`.
    ///
    /// The caller should ensure that `dims.w()` and `dims.h()` are non-negative.
    pub fn with_dims(dims: Dims) -> Self {
        Self::new(Point::zero(), Point::new(dims.w(), dims.h()))
    }

    /// Creates a rectangle with its lower-left corner at `p0` and the given dimensions.
    pub fn from_corner_dims(p0: Point, dims: Dims) -> Self {
        Self::new(p0, Point::new(p0.x + dims.w(), p0.y + dims.h()))
    }

    /// Returns the center point of the rectangle.
    pub fn center(&self) -> Point {
        Point::new((self.p0.x + self.p1.x) / 2, (self.p0.y + self.p1.y) / 2)
    }

    /// Creates a new rectangle.
    pub fn new(p0: Point, p1: Point) -> Self {
        Self {
            p0: Point::new(p0.x.min(p1.x), p0.y.min(p1.y)),
            p1: Point::new(p0.x.max(p1.x), p0.y.max(p1.y)),
        }
    }

    /// Creates a rectangle from horizontal and vertical [`Span`]s.
    pub fn from_spans(h: Span, v: Span) -> Self {
        Self {
            p0: Point::new(h.start(), v.start()),
            p1: Point::new(h.stop(), v.stop()),
        }
    }

    /// Returns the bottom y-coordinate of the rectangle.
    #[inline]
    pub fn bottom(&self) -> i64 {
        self.p0.y
    }

    /// Returns the top y-coordinate of the rectangle.
    #[inline]
    pub fn top(&self) -> i64 {
        self.p1.y
    }

    /// Returns the left x-coordinate of the rectangle.
    #[inline]
    pub fn left(&self) -> i64 {
        self.p0.x
    }

    /// Returns the right x-coordinate of the rectangle.
    #[inline]
    pub fn right(&self) -> i64 {
        self.p1.x
    }

    /// Returns the horizontal span of the rectangle.
    pub fn hspan(&self) -> Span {
        Span::new(self.p0.x, self.p1.x)
    }

    /// Returns the vertical span of the rectangle.
    pub fn vspan(&self) -> Span {
        Span::new(self.p0.y, self.p1.y)
    }

    /// Returns the horizontal width of the rectangle.
    #[inline]
    pub fn width(&self) -> i64 {
        self.hspan().length()
    }

    /// Returns the vertical height of the rectangle.
    #[inline]
    pub fn height(&self) -> i64 {
        self.vspan().length()
    }

    /// Returns the area of the rectangle.
    #[inline]
    pub fn area(&self) -> i64 {
        self.width() * self.height()
    }

    /// Returns the dimensions of the rectangle.
    #[inline]
    pub fn dims(&self) -> Dims {
        Dims::new(self.width(), self.height())
    }

    /// Returns `true` if `other` lies entirely within this rectangle.
    ///
    /// Shared edges count as contained.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        self.hspan().contains(other.hspan()) && self.vspan().contains(other.vspan())
    }

    /// Returns `true` if the interiors of this rectangle and `other` overlap.
    ///
    /// Rectangles that only share an edge or a corner do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.hspan().overlaps(&other.hspan()) && self.vspan().overlaps(&other.vspan())
    }
}

impl Display for Rect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({};{})", self.p0, self.p1)
    }
}

impl From<Bbox> for Rect {
    fn from(r: Bbox) -> Self {
        debug_assert!(!r.is_empty());
        debug_assert!(r.p0.x <= r.p1.x);
        debug_assert!(r.p0.y <= r.p1.y);
        Self { p0: r.p0, p1: r.p1 }
    }
}

/// The primary geometric primitive comprising raw layout.
///
/// Variants include [`Rect`], [`Polygon`], and [`Path`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[enum_dispatch(ShapeTrait)]
pub enum Shape {
    Rect(Rect),
    Polygon(Polygon),
    Path(Path),
}

impl Transform for Shape {
    fn transform(&self, trans: Transformation) -> Self {
        match self {
            Self::Rect(s) => {
                // Rotations other than multiples of 90 degrees do not preserve rectangles.
                let poly = s.to_poly().transform(trans);
                match poly.as_rect() {
                    Some(r) => Self::Rect(r),
                    None => Self::Polygon(poly),
                }
            }
            Self::Polygon(s) => Self::Polygon(s.transform(trans)),
            Self::Path(s) => Self::Path(s.transform(trans)),
        }
    }
}

impl Translate for Shape {
    fn translate(&mut self, p: Point) {
        match self {
            Self::Rect(s) => s.translate(p),
            Self::Polygon(s) => s.translate(p),
            Self::Path(s) => s.translate(p),
        }
    }
}

impl Shape {
    pub fn as_rect(&self) -> Option<Rect> {
        if let Shape::Rect(rect) = self {
            Some(*rect)
        } else {
            None
        }
    }

    /// Converts the shape to the polygons covering its area.
    ///
    /// Rectangles and polygons produce a single polygon;
    /// paths produce one polygon per segment and one per bend.
    pub fn to_polygons(&self) -> Vec<Polygon> {
        match self {
            Self::Rect(r) => vec![r.to_poly()],
            Self::Polygon(p) => vec![p.clone()],
            Self::Path(p) => p.to_polygons(),
        }
    }

    /// Clips the shape to the rectangle `bounds`.
    ///
    /// Paths lying entirely within `bounds` are kept as paths;
    /// partially-covered paths are converted to their clipped segment polygons.
    pub fn clip(&self, bounds: &Rect) -> Vec<Shape> {
        match self {
            Self::Rect(r) => r.trim(bounds).map(Shape::Rect).into_iter().collect(),
            Self::Polygon(p) => p.trim(bounds).map(Shape::Polygon).into_iter().collect(),
            Self::Path(p) => {
                let bbox = self.bbox();
                if bbox.is_empty() {
                    return Vec::new();
                }
                if bounds.contains_rect(&bbox.into_rect()) {
                    return vec![self.clone()];
                }
                p.to_polygons()
                    .iter()
                    .filter_map(|poly| poly.trim(bounds))
                    .map(Shape::Polygon)
                    .collect()
            }
        }
    }
}

/// Common shape operations, dispatched from the [`Shape`] enum to its variants by [mod@enum_dispatch].
#[enum_dispatch]
pub trait ShapeTrait {
    /// Returns our "origin", an arbitrary [`Point`] on the shape.
    fn point0(&self) -> Point;
    /// Returns `true` if the [`Shape`] contains [`Point`] `pt`.
    ///
    /// Containment is *inclusive* for all [`Shape`] types.
    /// [`Point`]s on their boundary, which generally include all points specifying the shape itself, are regarded throughout as "inside" the shape.
    fn contains(&self, pt: Point) -> bool;
}

impl Rect {
    /// Converts the rectangle to a counter-clockwise four-sided [`Polygon`].
    pub fn to_poly(&self) -> Polygon {
        Polygon {
            points: vec![
                self.p0,
                Point::new(self.p1.x, self.p0.y),
                self.p1,
                Point::new(self.p0.x, self.p1.y),
            ],
        }
    }
}

impl ShapeTrait for Rect {
    fn point0(&self) -> Point {
        self.p0
    }
    fn contains(&self, pt: Point) -> bool {
        let (p0, p1) = (&self.p0, &self.p1);
        p0.x.min(p1.x) <= pt.x
            && p0.x.max(p1.x) >= pt.x
            && p0.y.min(p1.y) <= pt.y
            && p0.y.max(p1.y) >= pt.y
    }
}

impl ShapeTrait for Polygon {
    fn point0(&self) -> Point {
        self.points[0]
    }
    fn contains(&self, pt: Point) -> bool {
        // First check for the fast way out: if the point is outside the bounding box, it can't be in the polygon.
        if !self.points.bbox().contains(pt) {
            return false;
        }

        // Winding-number test, which works for all (realistically useful) layout-polygons.
        let mut winding_num: isize = 0;
        for idx in 0..self.points.len() {
            let (past, next) = (
                &self.points[idx],
                &self.points[(idx + 1) % self.points.len()],
            );

            if past.y.min(next.y) <= pt.y && past.y.max(next.y) >= pt.y {
                if next.y == past.y {
                    // Horizontal segment on the same y-level as the point.
                    if past.x.min(next.x) <= pt.x && past.x.max(next.x) >= pt.x {
                        return true;
                    }
                } else {
                    let xsolve = (next.x - past.x) * (pt.y - past.y) / (next.y - past.y) + past.x;

                    match xsolve.cmp(&pt.x) {
                        Ordering::Equal => return true,
                        Ordering::Greater => {
                            if next.y > past.y {
                                winding_num += 1;
                            } else {
                                winding_num -= 1;
                            }
                        }
                        Ordering::Less => (),
                    }
                }
            }
        }
        winding_num != 0
    }
}

impl ShapeTrait for Path {
    fn point0(&self) -> Point {
        self.points[0]
    }
    fn contains(&self, pt: Point) -> bool {
        self.to_polygons().iter().any(|poly| poly.contains(pt))
    }
}

/// A horizontal and vertical rectangular dimension with no specified location.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Default, Serialize, Deserialize,
)]
pub struct Dims {
    w: i64,
    h: i64,
}

impl Dims {
    /// Creates a new [`Dims`] from a width and height.
    pub fn new(w: i64, h: i64) -> Self {
        Self { w, h }
    }

    /// Returns the width (ie. the horizontal dimension).
    #[inline]
    pub fn width(&self) -> i64 {
        self.w
    }

    /// Returns the height (ie. the vertical dimension).
    #[inline]
    pub fn height(&self) -> i64 {
        self.h
    }

    /// A shorthand for [`Dims::width`].
    #[inline]
    pub fn w(&self) -> i64 {
        self.width()
    }

    /// A shorthand for [`Dims::height`].
    #[inline]
    pub fn h(&self) -> i64 {
        self.height()
    }

    /// Converts this dimension object into a [`Rect`].
    ///
    /// See [`Rect::with_dims`] for more information.
    #[inline]
    pub fn into_rect(self) -> Rect {
        Rect::with_dims(self)
    }
}

impl Display for Dims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} X {}", self.w, self.h)
    }
}
