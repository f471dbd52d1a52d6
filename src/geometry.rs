//! Planar geometry on top of `geo`: the serde-friendly [`Point`] used in
//! configuration and records, cell polygons, polyline crossings and 1-D
//! interpolation.

use crate::error::{Result, ScenarioError};
use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Centroid, Coord, EuclideanDistance, Line, LineString, MultiPolygon, Polygon};
use serde::{Deserialize, Serialize};

const EPS: f64 = 1e-9;

/// A point in the projected (metric) coordinate system of the inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Point { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        geo::Point::from(*self).euclidean_distance(&geo::Point::from(*other))
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Line::new(*self, *other).centroid().into()
    }

    /// Distance to the closed segment `a`-`b`.
    pub fn distance_to_segment(&self, a: &Point, b: &Point) -> f64 {
        geo::Point::from(*self).euclidean_distance(&Line::new(*a, *b))
    }
}

impl From<[f64; 2]> for Point {
    fn from(xy: [f64; 2]) -> Self {
        Point::new(xy[0], xy[1])
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        [p.x, p.y]
    }
}

impl From<Point> for Coord<f64> {
    fn from(p: Point) -> Self {
        Coord { x: p.x, y: p.y }
    }
}

impl From<Coord<f64>> for Point {
    fn from(c: Coord<f64>) -> Self {
        Point::new(c.x, c.y)
    }
}

impl From<Point> for geo::Point<f64> {
    fn from(p: Point) -> Self {
        geo::Point::new(p.x, p.y)
    }
}

impl From<geo::Point<f64>> for Point {
    fn from(p: geo::Point<f64>) -> Self {
        Point::new(p.x(), p.y())
    }
}

/// Closed polygon through `ring`, without holes.
pub fn polygon(ring: &[Point]) -> Polygon<f64> {
    Polygon::new(ring.iter().copied().collect::<LineString<f64>>(), vec![])
}

/// Centroid of the union of adjacent polygons, weighted by area.
pub fn union_centroid<'a>(polygons: impl IntoIterator<Item = &'a Polygon<f64>>) -> Option<Point> {
    let union = MultiPolygon::new(polygons.into_iter().cloned().collect());
    union.centroid().map(Point::from)
}

/// Linear interpolation with the clamping behaviour of `numpy.interp`:
/// `x` outside `xp` returns the first or last `fp` value.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> Result<f64> {
    if xp.len() < 2 || xp.len() != fp.len() {
        return Err(ScenarioError::Geometry(format!(
            "cannot interpolate on a curve with {} x-values and {} y-values",
            xp.len(),
            fp.len()
        )));
    }
    let last = xp.len() - 1;
    if x <= xp[0] {
        return Ok(fp[0]);
    }
    if x >= xp[last] {
        return Ok(fp[last]);
    }
    let j = xp.partition_point(|&v| v <= x).clamp(1, last) - 1;
    let dx = xp[j + 1] - xp[j];
    if dx.abs() < EPS {
        return Ok(fp[j]);
    }
    Ok(fp[j] + (fp[j + 1] - fp[j]) / dx * (x - xp[j]))
}

/// All intersection points between two polylines. Collinear overlaps contribute
/// their end points. Duplicates (shared vertices) are removed.
pub fn polyline_intersections(a: &[Point], b: &[Point]) -> Vec<Point> {
    let a: LineString<f64> = a.iter().copied().collect();
    let b: LineString<f64> = b.iter().copied().collect();

    let mut found: Vec<Point> = Vec::new();
    let mut push = |c: Coord<f64>| {
        let p = Point::from(c);
        if !found.iter().any(|q| q.distance(&p) < 1e-7) {
            found.push(p);
        }
    };

    for la in a.lines() {
        for lb in b.lines() {
            match line_intersection(la, lb) {
                Some(LineIntersection::SinglePoint { intersection, .. }) => push(intersection),
                Some(LineIntersection::Collinear { intersection }) => {
                    push(intersection.start);
                    push(intersection.end);
                }
                None => {}
            }
        }
    }
    found
}

/// Two-point WKT line, coordinates rounded to whole metres.
pub fn linestring_wkt(a: &Point, b: &Point) -> String {
    format!(
        "LINESTRING ({:.0} {:.0}, {:.0} {:.0})",
        a.x, a.y, b.x, b.y
    )
}
