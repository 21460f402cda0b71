use log::debug;

use crate::config::*;

/// Padding added around the triangle to get the size of the canvas.
pub const CANVAS_PADDING: f64 = 80.0;

/// Twice the signed area of the triangle (a, b, c).
fn twice_signed_area(a: &Point, b: &Point, c: &Point) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (c.x - a.x) * (b.y - a.y)
}

/// The barycentric coordinates of `point` with respect to the triangle.
///
/// Returns `None` if the triangle is degenerate.
pub fn barycentric(vertices: &[Point; 3], point: &Point) -> Option<[f64; 3]> {
    let [a, b, c] = vertices;
    let area = twice_signed_area(a, b, c);
    if area == 0.0 || !area.is_finite() {
        return None;
    }
    Some([
        twice_signed_area(point, b, c) / area,
        twice_signed_area(a, point, c) / area,
        twice_signed_area(a, b, point) / area,
    ])
}

/// True if the point is strictly inside the triangle.
///
/// Points on an edge or on a vertex (one barycentric weight exactly zero) are
/// rejected, and so is every point of a degenerate triangle.
pub fn contains_point(vertices: &[Point; 3], point: &Point) -> bool {
    match barycentric(vertices, point) {
        Some(weights) => weights.iter().all(|w| *w > 0.0),
        None => false,
    }
}

/// Maps the distance between a point and a vertex to a score.
///
/// A distance of 0 gives 10 and a distance of `max_distance` gives 1. The result is
/// rounded and clamped to [1, 10].
pub fn raw_score(point: &Point, vertex: &Point, max_distance: f64) -> Result<i32, ScoringError> {
    if !(max_distance.is_finite() && max_distance > 0.0) {
        return Err(ScoringError::InvalidReferenceDistance(max_distance));
    }
    if !point.is_finite() || !vertex.is_finite() {
        return Err(ScoringError::NonFinitePoint);
    }
    let distance = point.distance(vertex);
    let scaled = 1.0 + 9.0 * (1.0 - distance / max_distance);
    Ok((scaled.round() as i32).clamp(1, 10))
}

/// The triangle the participant clicks into.
///
/// Vertex `i` belongs to category `i`.
#[derive(PartialEq, Debug, Clone)]
pub struct Triangle {
    vertices: [Point; 3],
    max_distance: f64,
}

impl Triangle {
    /// Builds a triangle from its three vertices.
    ///
    /// The reference distance for scoring is the largest altitude, which is the
    /// height of an equilateral triangle.
    pub fn new(vertices: [Point; 3]) -> Result<Triangle, ScoringError> {
        if vertices.iter().any(|p| !p.is_finite()) {
            return Err(ScoringError::NonFinitePoint);
        }
        let [a, b, c] = &vertices;
        let area2 = twice_signed_area(a, b, c).abs();
        let shortest_side = a.distance(b).min(b.distance(c)).min(c.distance(a));
        if area2 == 0.0 || shortest_side == 0.0 {
            return Err(ScoringError::DegenerateTriangle);
        }
        let max_distance = area2 / shortest_side;
        debug!(
            "Triangle::new: vertices: {:?} max_distance: {:?}",
            vertices, max_distance
        );
        Ok(Triangle {
            vertices,
            max_distance,
        })
    }

    /// The equilateral triangle of the given side, centred in its canvas.
    ///
    /// Vertices are top, bottom left and bottom right, in this order.
    pub fn equilateral(side_length: f64) -> Result<Triangle, ScoringError> {
        if !(side_length.is_finite() && side_length > 0.0) {
            return Err(ScoringError::DegenerateTriangle);
        }
        let height = Triangle::height_for(side_length);
        let (width, canvas_height) = Triangle::canvas_size(side_length);
        let cx = width / 2.0;
        let cy = canvas_height / 2.0;
        Triangle::new([
            Point::new(cx, cy - height / 2.0),
            Point::new(cx - side_length / 2.0, cy + height / 2.0),
            Point::new(cx + side_length / 2.0, cy + height / 2.0),
        ])
    }

    pub fn height_for(side_length: f64) -> f64 {
        (3.0_f64).sqrt() / 2.0 * side_length
    }

    /// The size (width, height) of the canvas holding a triangle of this side.
    pub fn canvas_size(side_length: f64) -> (f64, f64) {
        (
            side_length + CANVAS_PADDING,
            Triangle::height_for(side_length) + CANVAS_PADDING,
        )
    }

    pub fn vertices(&self) -> &[Point; 3] {
        &self.vertices
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn centroid(&self) -> Point {
        let [a, b, c] = &self.vertices;
        Point::new((a.x + b.x + c.x) / 3.0, (a.y + b.y + c.y) / 3.0)
    }

    pub fn contains(&self, point: &Point) -> bool {
        contains_point(&self.vertices, point)
    }

    /// The raw score of each vertex for this point, in vertex order.
    pub fn raw_scores(&self, point: &Point) -> Result<[i32; 3], ScoringError> {
        let mut res = [0; 3];
        for (idx, vertex) in self.vertices.iter().enumerate() {
            res[idx] = raw_score(point, vertex, self.max_distance)?;
        }
        Ok(res)
    }

    /// Where the label of each category should be anchored.
    pub fn label_anchors(&self, categories: &Categories) -> Vec<(String, Point)> {
        categories
            .iter()
            .zip(self.vertices.iter())
            .map(|(c, v)| {
                let (dx, dy) = c.position.anchor_offset();
                (c.label.clone(), Point::new(v.x + dx, v.y + dy))
            })
            .collect()
    }
}
