use serde::{Deserialize, Serialize};

/// A 2D point in layout coordinates (micrometers).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn contains(&self, other: &BBox) -> bool {
        self.contains_point(&other.min) && self.contains_point(&other.max)
    }

    pub fn intersects(&self, other: &BBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Grow the box by `margin` on every side.
    pub fn inflate(&self, margin: f64) -> Self {
        Self {
            min: Point::new(self.min.x - margin, self.min.y - margin),
            max: Point::new(self.max.x + margin, self.max.y + margin),
        }
    }

    /// Shortest axis-aligned gap to another box; zero when they touch or overlap.
    pub fn separation(&self, other: &BBox) -> f64 {
        let dx = (other.min.x - self.max.x).max(self.min.x - other.max.x).max(0.0);
        let dy = (other.min.y - self.max.y).max(self.min.y - other.max.y).max(0.0);
        (dx * dx + dy * dy).sqrt()
    }
}

/// A rectangle defined by lower-left and upper-right corners.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub layer_id: crate::LayerId,
    pub lower_left: Point,
    pub upper_right: Point,
}

impl Rect {
    pub fn new(layer_id: crate::LayerId, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            layer_id,
            lower_left: Point::new(x1.min(x2), y1.min(y2)),
            upper_right: Point::new(x1.max(x2), y1.max(y2)),
        }
    }

    /// Rectangle from lower-left corner plus width and height.
    pub fn sized(layer_id: crate::LayerId, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new(layer_id, x, y, x + w, y + h)
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.lower_left, self.upper_right)
    }

    pub fn width(&self) -> f64 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f64 {
        self.upper_right.y - self.lower_left.y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        self.bbox().contains_point(p)
    }
}

/// A polygon defined by a list of vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub layer_id: crate::LayerId,
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(layer_id: crate::LayerId, vertices: Vec<Point>) -> Self {
        Self { layer_id, vertices }
    }

    /// A regular polygon approximating a circle, counter-clockwise from 0 rad.
    pub fn circle(layer_id: crate::LayerId, center: Point, radius: f64, segments: usize) -> Self {
        let vertices = (0..segments)
            .map(|i| {
                let theta = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
                Point::new(
                    center.x + radius * theta.cos(),
                    center.y + radius * theta.sin(),
                )
            })
            .collect();
        Self { layer_id, vertices }
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }
}

/// A path (wire) defined by a centerline and width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub layer_id: crate::LayerId,
    pub points: Vec<Point>,
    pub width: f64,
}

impl Path {
    pub fn new(layer_id: crate::LayerId, points: Vec<Point>, width: f64) -> Self {
        Self {
            layer_id,
            points,
            width,
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        let half_w = self.width / 2.0;
        BBox::from_points(&self.points).map(|bb| bb.inflate(half_w))
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }
}

/// A text label (GDS TEXT element). `size` is the character height in
/// micrometers; the actual rendered extent depends on the mask writer's
/// font, so the bounding box is the anchor point alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub layer_id: crate::LayerId,
    pub origin: Point,
    pub string: String,
    pub size: f64,
}

impl Text {
    pub fn new(layer_id: crate::LayerId, origin: Point, string: &str, size: f64) -> Self {
        Self {
            layer_id,
            origin,
            string: string.to_string(),
            size,
        }
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(self.origin, self.origin)
    }
}

/// A geometric primitive in the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GeomPrimitive {
    Rect(Rect),
    Polygon(Polygon),
    Path(Path),
    Text(Text),
}

impl GeomPrimitive {
    pub fn bbox(&self) -> Option<BBox> {
        match self {
            GeomPrimitive::Rect(r) => Some(r.bbox()),
            GeomPrimitive::Polygon(p) => p.bbox(),
            GeomPrimitive::Path(p) => p.bbox(),
            GeomPrimitive::Text(t) => Some(t.bbox()),
        }
    }

    pub fn layer_id(&self) -> crate::LayerId {
        match self {
            GeomPrimitive::Rect(r) => r.layer_id,
            GeomPrimitive::Polygon(p) => p.layer_id,
            GeomPrimitive::Path(p) => p.layer_id,
            GeomPrimitive::Text(t) => t.layer_id,
        }
    }

    /// Translate all coordinates by (dx, dy).
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            GeomPrimitive::Rect(r) => {
                r.lower_left = r.lower_left.translate(dx, dy);
                r.upper_right = r.upper_right.translate(dx, dy);
            }
            GeomPrimitive::Polygon(p) => {
                for v in &mut p.vertices {
                    *v = v.translate(dx, dy);
                }
            }
            GeomPrimitive::Path(p) => {
                for v in &mut p.points {
                    *v = v.translate(dx, dy);
                }
            }
            GeomPrimitive::Text(t) => {
                t.origin = t.origin.translate(dx, dy);
            }
        }
    }

    /// Apply an instance transform to all coordinates, used when
    /// flattening cell references.
    pub fn transform(&mut self, t: &crate::cell::Transform) {
        match self {
            GeomPrimitive::Rect(r) => {
                let a = t.apply(&r.lower_left);
                let b = t.apply(&r.upper_right);
                *r = Rect::new(r.layer_id, a.x, a.y, b.x, b.y);
            }
            GeomPrimitive::Polygon(p) => {
                for v in &mut p.vertices {
                    *v = t.apply(v);
                }
            }
            GeomPrimitive::Path(p) => {
                for v in &mut p.points {
                    *v = t.apply(v);
                }
                p.width *= t.scale;
            }
            GeomPrimitive::Text(txt) => {
                txt.origin = t.apply(&txt.origin);
                txt.size *= t.scale;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_rect_normalizes_corners() {
        let r = Rect::new(0, 10.0, 5.0, 0.0, 0.0);
        assert!((r.lower_left.x - 0.0).abs() < 1e-10);
        assert!((r.upper_right.y - 5.0).abs() < 1e-10);
        assert!((r.area() - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_bbox_intersection_and_separation() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = BBox::new(Point::new(5.0, 5.0), Point::new(15.0, 15.0));
        let c = BBox::new(Point::new(20.0, 0.0), Point::new(30.0, 10.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!((a.separation(&b) - 0.0).abs() < 1e-10);
        assert!((a.separation(&c) - 10.0).abs() < 1e-10);
    }

    #[test]
    fn test_path_length_and_bbox() {
        let p = Path::new(
            1,
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 5.0),
            ],
            2.0,
        );
        assert!((p.length() - 15.0).abs() < 1e-10);
        let bb = p.bbox().unwrap();
        assert!((bb.min.x + 1.0).abs() < 1e-10);
        assert!((bb.max.y - 6.0).abs() < 1e-10);
    }

    #[test]
    fn test_transform_rotated_rect_renormalizes() {
        let t = crate::cell::Transform {
            offset: Point::new(100.0, 0.0),
            rotation: 90.0,
            ..Default::default()
        };
        let mut g = GeomPrimitive::Rect(Rect::new(1, 0.0, 0.0, 10.0, 4.0));
        g.transform(&t);
        let bb = g.bbox().unwrap();
        assert!((bb.min.x - 96.0).abs() < 1e-9);
        assert!((bb.min.y - 0.0).abs() < 1e-9);
        assert!((bb.max.x - 100.0).abs() < 1e-9);
        assert!((bb.max.y - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_circle_polygon() {
        let c = Polygon::circle(0, Point::new(0.0, 0.0), 100.0, 512);
        assert_eq!(c.vertex_count(), 512);
        for v in &c.vertices {
            let r = (v.x * v.x + v.y * v.y).sqrt();
            assert!((r - 100.0).abs() < 1e-9);
        }
    }
}
