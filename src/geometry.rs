//! Planar geometry shared by sensing and collision detection.

use serde::{Deserialize, Serialize};

/// Point in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Finite segment from `start` to `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }
}

/// Intersection found along a segment.
///
/// `offset` is the fraction of the first segment travelled before the hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Touch {
    pub point: Point,
    pub offset: f64,
}

// Relative tolerance on the cross product of the two directions.
const PARALLEL_TOL: f64 = 1e-10;

// Slack on both segment parameters so touches at an endpoint survive rounding.
const END_TOL: f64 = 1e-9;

pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Intersect two finite segments.
///
/// Returns the touch point with the offset measured along `seg_1`, or
/// `None` when the segments miss, are parallel, or either one is degenerate.
pub fn intersect(seg_1: &Segment, seg_2: &Segment) -> Option<Touch> {
    let (a, b) = (seg_1.start, seg_1.end);
    let (c, d) = (seg_2.start, seg_2.end);

    let dir_1 = (b.x - a.x, b.y - a.y);
    let dir_2 = (d.x - c.x, d.y - c.y);

    let denom = dir_2.1 * dir_1.0 - dir_2.0 * dir_1.1;
    let scale = dir_1.0.hypot(dir_1.1) * dir_2.0.hypot(dir_2.1);
    if scale == 0.0 || denom.abs() <= PARALLEL_TOL * scale {
        return None;
    }

    let t = (dir_2.0 * (a.y - c.y) - dir_2.1 * (a.x - c.x)) / denom;
    let u = ((c.y - a.y) * (a.x - b.x) - (c.x - a.x) * (a.y - b.y)) / denom;

    let range = -END_TOL..=1.0 + END_TOL;
    if !range.contains(&t) || !range.contains(&u) {
        return None;
    }
    let t = t.clamp(0.0, 1.0);

    Some(Touch {
        point: Point::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t)),
        offset: t,
    })
}

/// Edges of a closed polygon, wrapping from the last vertex to the first.
pub fn edges(poly: &[Point]) -> impl Iterator<Item = Segment> + '_ {
    let n_pts = poly.len();
    (0..n_pts).map(move |i| Segment::new(poly[i], poly[(i + 1) % n_pts]))
}

/// Whether any edge of `poly_1` crosses any edge of `poly_2`.
pub fn polys_intersect(poly_1: &[Point], poly_2: &[Point]) -> bool {
    edges(poly_1).any(|e_1| edges(poly_2).any(|e_2| intersect(&e_1, &e_2).is_some()))
}

/// Whether any edge of `poly` crosses `seg`.
pub fn poly_hits_segment(poly: &[Point], seg: &Segment) -> bool {
    edges(poly).any(|edge| intersect(&edge, seg).is_some())
}
