//! Planar shapes and intersection predicates used to match detections
//! against configured regions.
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// Tolerance for collinear / touching cases in orientation tests.
const EPSILON: f64 = 1e-9;

/// Default fraction used to derive a footprint from a bounding box.
pub const DEFAULT_FOOTPRINT_SCALE: f64 = 0.15;

pub type Point = Point2<f64>;

/// Axis-aligned bounding box in pixel coordinates (xmin, ymin, xmax, ymax).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl BBox {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn is_finite(&self) -> bool {
        self.xmin.is_finite() && self.ymin.is_finite() && self.xmax.is_finite() && self.ymax.is_finite()
    }

    /// The four corners, in the order (xmin,ymin) (xmin,ymax) (xmax,ymax) (xmax,ymin).
    pub fn corners(&self) -> [Point; 4] {
        [
            Point::new(self.xmin, self.ymin),
            Point::new(self.xmin, self.ymax),
            Point::new(self.xmax, self.ymax),
            Point::new(self.xmax, self.ymin),
        ]
    }
}

/// A shape that can be tested against a region.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    /// Open chain of segments.
    Polyline(Vec<Point>),
    /// Closed ring; the last vertex connects back to the first. Interior included.
    Polygon(Vec<Point>),
}

impl Shape {
    pub fn vertices(&self) -> &[Point] {
        match self {
            Shape::Polyline(pts) | Shape::Polygon(pts) => pts,
        }
    }

    /// Segments making up the shape boundary.
    pub fn edges(&self) -> Vec<(Point, Point)> {
        match self {
            Shape::Polyline(pts) => match pts.len() {
                0 => Vec::new(),
                1 => vec![(pts[0], pts[0])],
                _ => pts.windows(2).map(|w| (w[0], w[1])).collect(),
            },
            Shape::Polygon(pts) => match pts.len() {
                0 => Vec::new(),
                1 => vec![(pts[0], pts[0])],
                n => (0..n).map(|i| (pts[i], pts[(i + 1) % n])).collect(),
            },
        }
    }
}

/// Ground-contact quadrilateral derived from a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Footprint {
    pub vertices: [Point; 4],
}

impl Footprint {
    pub fn to_shape(&self) -> Shape {
        Shape::Polygon(self.vertices.to_vec())
    }
}

/// Footprint of `bbox` scaled toward the base of the object.
///
/// The scaled edge sits at `(ymax + ymin) * scale`. Callers should keep
/// `scale` below 0.5 so the derived edge stays inside the box extent.
pub fn footprint(bbox: &BBox, scale: f64) -> Footprint {
    let y_scaled = (bbox.ymax + bbox.ymin) * scale;
    Footprint {
        vertices: [
            Point::new(bbox.xmin, bbox.ymin),
            Point::new(bbox.xmin, y_scaled),
            Point::new(bbox.xmax, y_scaled),
            Point::new(bbox.xmax, bbox.ymin),
        ],
    }
}

/// Which part of a detection is tested against regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FootprintMode {
    /// Base of the object, see [`footprint`].
    #[default]
    Bottom,
    /// The whole bounding box.
    Box,
    /// Quadrilateral inset from the box by `(xmax + xmin) * scale` and `(ymax + ymin) * scale`.
    Center,
}

impl FootprintMode {
    pub fn shape(&self, bbox: &BBox, scale: f64) -> Shape {
        match self {
            FootprintMode::Bottom => footprint(bbox, scale).to_shape(),
            FootprintMode::Box => Shape::Polygon(bbox.corners().to_vec()),
            FootprintMode::Center => {
                let rx = (bbox.xmax + bbox.xmin) * scale;
                let ry = (bbox.ymax + bbox.ymin) * scale;
                Shape::Polygon(vec![
                    Point::new(bbox.xmin + rx, bbox.ymin + ry),
                    Point::new(bbox.xmin + rx, bbox.ymax - ry),
                    Point::new(bbox.xmax - rx, bbox.ymax - ry),
                    Point::new(bbox.xmax - rx, bbox.ymin + ry),
                ])
            }
        }
    }
}

/// True iff the two shapes share at least one point. Touching counts.
pub fn intersects(a: &Shape, b: &Shape) -> bool {
    let a_edges = a.edges();
    let b_edges = b.edges();
    if a_edges.is_empty() || b_edges.is_empty() {
        return false;
    }

    let crossing = a_edges
        .iter()
        .any(|&(p1, q1)| b_edges.iter().any(|&(p2, q2)| segments_intersect(p1, q1, p2, q2)));
    if crossing {
        return true;
    }

    // No boundary contact: one shape can still lie entirely inside the other.
    if let Shape::Polygon(ring) = b {
        if a.vertices().first().is_some_and(|p| point_in_polygon(p, ring)) {
            return true;
        }
    }
    if let Shape::Polygon(ring) = a {
        if b.vertices().first().is_some_and(|p| point_in_polygon(p, ring)) {
            return true;
        }
    }
    false
}

fn orientation(p: Point, q: Point, r: Point) -> i8 {
    let pq: Vector2<f64> = q - p;
    let pr: Vector2<f64> = r - p;
    let cross = pq.perp(&pr);
    if cross.abs() <= EPSILON {
        0
    } else if cross > 0.0 {
        1
    } else {
        -1
    }
}

/// `r` lies within the bounding box of segment `p`-`q` (assumes collinearity).
fn on_segment(p: Point, q: Point, r: Point) -> bool {
    r.x <= p.x.max(q.x) + EPSILON
        && r.x >= p.x.min(q.x) - EPSILON
        && r.y <= p.y.max(q.y) + EPSILON
        && r.y >= p.y.min(q.y) - EPSILON
}

pub fn segments_intersect(p1: Point, q1: Point, p2: Point, q2: Point) -> bool {
    let o1 = orientation(p1, q1, p2);
    let o2 = orientation(p1, q1, q2);
    let o3 = orientation(p2, q2, p1);
    let o4 = orientation(p2, q2, q1);

    if o1 != o2 && o3 != o4 && o1 != 0 && o2 != 0 && o3 != 0 && o4 != 0 {
        return true;
    }

    (o1 == 0 && on_segment(p1, q1, p2))
        || (o2 == 0 && on_segment(p1, q1, q2))
        || (o3 == 0 && on_segment(p2, q2, p1))
        || (o4 == 0 && on_segment(p2, q2, q1))
}

/// Even-odd ray cast. Points exactly on the boundary are handled by the edge test in [`intersects`].
pub fn point_in_polygon(p: &Point, ring: &[Point]) -> bool {
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}
