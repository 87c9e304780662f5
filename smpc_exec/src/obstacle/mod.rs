//! # Obstacle preprocessing
//!
//! Obstacles are convex polygons given as an ordered ring of vertices. Before
//! they can be used by the chance constraints each edge is converted into a
//! half-plane `a . p = b`, where `a` is the unit normal pointing out of the
//! polygon. A point `p` is then outside the edge's half-plane when
//! `a . p - b > 0`, and inside the polygon when this is negative for every
//! edge.
//!
//! Preprocessing is purely geometric and deterministic, so the planner caches
//! the result until the obstacle set changes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use nalgebra::Vector2;
use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Edges shorter than this are considered degenerate.
const MIN_EDGE_LENGTH_M: f64 = 1e-9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An obstacle as supplied by the upstream estimators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Obstacle {
    /// Vertices of the polygon, in order around the ring. The ring closes
    /// implicitly from the last vertex back to the first.
    pub vertices_m: Vec<Vector2<f64>>,

    /// Maximum acceptable per-step probability of collision with this
    /// obstacle, must be in (0, 0.5).
    pub risk: f64,
}

/// A single edge of an obstacle converted into a half-plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ObstacleEdge {
    /// Unit normal to the edge, pointing out of the obstacle
    pub normal: Vector2<f64>,

    /// Offset of the edge line along the normal
    pub offset_m: f64,
}

/// An obstacle after preprocessing.
#[derive(Debug, Clone, Serialize)]
pub struct PreparedObstacle {
    pub vertices_m: Vec<Vector2<f64>>,

    /// One half-plane per edge, edge `i` joins vertex `i` and `i + 1`.
    pub edges: Vec<ObstacleEdge>,

    pub risk: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while preprocessing an obstacle polygon.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("An obstacle needs at least 3 vertices, found {0}")]
    TooFewVertices(usize),

    #[error("Obstacle vertex {0} is not finite")]
    NonFiniteVertex(usize),

    #[error("Obstacle edge {0} is degenerate (duplicate consecutive vertices)")]
    DegenerateEdge(usize),

    #[error("Obstacle has zero area")]
    ZeroArea,

    #[error("Obstacle is not convex at vertex {0}")]
    NotConvex(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ObstacleEdge {
    /// Signed distance of the point from the edge line, positive outside.
    pub fn signed_distance_m(&self, point_m: &Vector2<f64>) -> f64 {
        self.normal.dot(point_m) - self.offset_m
    }
}

impl PreparedObstacle {
    /// Returns true if the point is strictly inside the obstacle.
    pub fn contains(&self, point_m: &Vector2<f64>) -> bool {
        self.edges
            .iter()
            .all(|e| e.signed_distance_m(point_m) < 0.0)
    }

    /// Distance from the point to the closest point of the obstacle, zero if
    /// the point is inside.
    pub fn distance_m(&self, point_m: &Vector2<f64>) -> f64 {
        if self.contains(point_m) {
            return 0.0;
        }

        let num_verts = self.vertices_m.len();
        (0..num_verts)
            .map(|i| {
                seg_distance_m(
                    &self.vertices_m[i],
                    &self.vertices_m[(i + 1) % num_verts],
                    point_m,
                )
            })
            .fold(std::f64::INFINITY, f64::min)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert an obstacle polygon into its outward half-planes.
pub fn preprocess(obstacle: &Obstacle) -> Result<PreparedObstacle, GeometryError> {
    let verts = &obstacle.vertices_m;
    let num_verts = verts.len();

    if num_verts < 3 {
        return Err(GeometryError::TooFewVertices(num_verts));
    }

    if let Some(i) = verts
        .iter()
        .position(|v| !(v[0].is_finite() && v[1].is_finite()))
    {
        return Err(GeometryError::NonFiniteVertex(i));
    }

    // Twice the signed area (shoelace). Positive for anticlockwise rings.
    let area_2 = (0..num_verts)
        .map(|i| cross(&verts[i], &verts[(i + 1) % num_verts]))
        .sum::<f64>();

    if area_2.abs() < MIN_EDGE_LENGTH_M {
        return Err(GeometryError::ZeroArea);
    }
    let orientation = area_2.signum();

    let mut edges = Vec::with_capacity(num_verts);

    for i in 0..num_verts {
        let start = verts[i];
        let end = verts[(i + 1) % num_verts];
        let dir = end - start;
        let length_m = dir.norm();

        if length_m < MIN_EDGE_LENGTH_M {
            return Err(GeometryError::DegenerateEdge(i));
        }

        // Convexity: every turn must go the same way as the ring
        let next_dir = verts[(i + 2) % num_verts] - end;
        if cross(&dir, &next_dir) * orientation < -MIN_EDGE_LENGTH_M {
            return Err(GeometryError::NotConvex((i + 1) % num_verts));
        }

        // Rotating the direction by -90 degrees gives the right hand normal, which points out of
        // an anticlockwise ring. Flip it for clockwise rings.
        let normal = orientation * Vector2::new(dir[1], -dir[0]) / length_m;

        // Offset of the line through both endpoints
        let offset_m = 0.5 * (normal.dot(&start) + normal.dot(&end));

        edges.push(ObstacleEdge { normal, offset_m });
    }

    trace!("Preprocessed obstacle with {} edges: {:?}", num_verts, edges);

    Ok(PreparedObstacle {
        vertices_m: verts.clone(),
        edges,
        risk: obstacle.risk,
    })
}

/// Select the obstacles that should be constrained from the given position.
///
/// Returns the indices of at most `max_num` obstacles which are within
/// `view_distance_m` of the position, nearest first.
pub fn select_visible(
    obstacles: &[PreparedObstacle],
    position_m: &Vector2<f64>,
    view_distance_m: f64,
    max_num: usize,
) -> Vec<usize> {
    let mut visible: Vec<(NotNan<f64>, usize)> = obstacles
        .iter()
        .enumerate()
        .filter_map(|(i, o)| {
            let dist_m = NotNan::new(o.distance_m(position_m)).ok()?;
            if dist_m.into_inner() <= view_distance_m {
                Some((dist_m, i))
            } else {
                None
            }
        })
        .collect();

    visible.sort();
    visible.truncate(max_num);

    visible.into_iter().map(|(_, i)| i).collect()
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Z component of the cross product of two planar vectors.
fn cross(a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
    a[0] * b[1] - a[1] * b[0]
}

/// Distance from a point to the segment joining `start` and `end`.
fn seg_distance_m(start: &Vector2<f64>, end: &Vector2<f64>, point: &Vector2<f64>) -> f64 {
    let seg = end - start;
    let t = ((point - start).dot(&seg) / seg.norm_squared()).clamp(0.0, 1.0);

    (start + t * seg - point).norm()
}
