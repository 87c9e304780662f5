//! # Chance constraint tightening
//!
//! Converts the probabilistic collision bound for each obstacle edge into a
//! deterministic linear constraint on the nominal position:
//!
//! ```text
//! flag * (a . p - b) >= sqrt(2 a^T Sigma a) * erfinv(1 - 2 risk)
//! ```
//!
//! The flag records which side of each edge line the vehicle is meant to stay
//! on. It is decided per obstacle, per horizon step, from the linearisation
//! trajectory fixed at the start of the cycle, with a hysteresis which keeps
//! the previous cycle's flags when the linearisation point lies inside the
//! obstacle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use nalgebra::{Matrix2, Vector2};
use serde::{Deserialize, Serialize};
use statrs::function::erf::erf_inv;

use crate::loc::Pose;
use crate::obstacle::{ObstacleEdge, PreparedObstacle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Safety flags for a set of obstacles across the horizon.
///
/// Indexed as `[obstacle][step][edge]`, with steps `0..=N`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SafetyFlags {
    flags: Vec<Vec<Vec<SafetyFlag>>>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which side of an edge line the vehicle must remain on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyFlag {
    /// Stay on the outside of the edge (`a . p - b >= c`)
    Positive,

    /// Stay on the inside of the edge (`a . p - b <= -c`)
    Negative,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SafetyFlag {
    /// The flag for a signed edge distance. Zero counts as positive.
    pub fn from_distance(signed_dist_m: f64) -> Self {
        if signed_dist_m >= 0.0 {
            SafetyFlag::Positive
        } else {
            SafetyFlag::Negative
        }
    }

    pub fn sign(&self) -> f64 {
        match self {
            SafetyFlag::Positive => 1.0,
            SafetyFlag::Negative => -1.0,
        }
    }
}

impl SafetyFlags {
    /// Initialise the flags for a new obstacle set from the current pose.
    ///
    /// Every step of the horizon gets the flags of the current position.
    pub fn initialise(obstacles: &[PreparedObstacle], pose: &Pose, horizon: usize) -> Self {
        let flags = obstacles
            .iter()
            .map(|obs| vec![initial_flags(obs, &pose.position_m); horizon + 1])
            .collect();

        Self { flags }
    }

    /// Decide the flags for this cycle.
    ///
    /// Only the obstacles listed in `visible` are updated, all others keep
    /// their flags from the previous cycle. `lin_poses` must contain one pose
    /// for each step `0..=N`.
    pub fn decide(
        &self,
        obstacles: &[PreparedObstacle],
        visible: &[usize],
        lin_poses: &[Pose],
    ) -> Self {
        let mut next = self.clone();

        for &obs_idx in visible {
            let obs = &obstacles[obs_idx];

            for (step, pose) in lin_poses.iter().enumerate() {
                let prev = self.get(obs_idx, step);
                let decided = decide_flags(obs, &pose.position_m, prev);

                if prev.map_or(false, |p| p != decided.as_slice()) {
                    debug!(
                        "Obstacle {} step {} flags changed to {:?}",
                        obs_idx, step, decided
                    );
                }

                if let Some(step_flags) = next
                    .flags
                    .get_mut(obs_idx)
                    .and_then(|o| o.get_mut(step))
                {
                    *step_flags = decided;
                }
            }
        }

        next
    }

    /// Get the flags of every edge of an obstacle at the given step.
    pub fn get(&self, obstacle: usize, step: usize) -> Option<&[SafetyFlag]> {
        self.flags
            .get(obstacle)
            .and_then(|o| o.get(step))
            .map(|s| s.as_slice())
    }

    pub fn num_obstacles(&self) -> usize {
        self.flags.len()
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Compute the tightening margin for a single edge.
///
/// `risk` must already have been validated to lie in (0, 0.5). Does not
/// include the robot radius.
pub fn margin_m(edge: &ObstacleEdge, cov: &Matrix2<f64>, risk: f64) -> f64 {
    let mut var = (edge.normal.transpose() * cov * edge.normal)[(0, 0)];

    if var < 0.0 {
        warn!(
            "Negative variance along edge normal ({:.3e}), covariance is not PSD. Using zero.",
            var
        );
        var = 0.0;
    }

    (2.0 * var).sqrt() * erf_inv(1.0 - 2.0 * risk)
}

/// Raw flags of a point against every edge of an obstacle.
pub fn raw_flags(obstacle: &PreparedObstacle, point_m: &Vector2<f64>) -> Vec<SafetyFlag> {
    obstacle
        .edges
        .iter()
        .map(|e| SafetyFlag::from_distance(e.signed_distance_m(point_m)))
        .collect()
}

/// Decide the flags of an obstacle at a single step.
///
/// If the point is inside the obstacle (every edge negative) the previous
/// flags are kept. With no previous flags the initial inside rule is used.
pub fn decide_flags(
    obstacle: &PreparedObstacle,
    point_m: &Vector2<f64>,
    prev: Option<&[SafetyFlag]>,
) -> Vec<SafetyFlag> {
    let raw = raw_flags(obstacle, point_m);

    if raw.iter().all(|f| *f == SafetyFlag::Negative) {
        match prev {
            Some(p) if p.len() == raw.len() => p.to_vec(),
            _ => initial_flags(obstacle, point_m),
        }
    } else {
        raw
    }
}

/// Flags for a point with no history.
///
/// Outside the obstacle these are the raw flags. Inside, the least violated
/// edge is set positive and all others negative.
pub fn initial_flags(obstacle: &PreparedObstacle, point_m: &Vector2<f64>) -> Vec<SafetyFlag> {
    let mut flags = raw_flags(obstacle, point_m);

    if flags.iter().all(|f| *f == SafetyFlag::Negative) {
        let least_violated = obstacle
            .edges
            .iter()
            .map(|e| e.signed_distance_m(point_m))
            .enumerate()
            .fold((0, std::f64::NEG_INFINITY), |best, (i, d)| {
                if d > best.1 {
                    (i, d)
                } else {
                    best
                }
            })
            .0;

        warn!(
            "Position {:?} is inside an obstacle, escaping through edge {}",
            point_m, least_violated
        );

        flags[least_violated] = SafetyFlag::Positive;
    }

    flags
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::obstacle::{preprocess, Obstacle};
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn triangle() -> PreparedObstacle {
        preprocess(&Obstacle {
            vertices_m: vec![
                Vector2::new(5.0, 5.0),
                Vector2::new(6.0, 7.0),
                Vector2::new(7.0, 5.2),
            ],
            risk: 0.1,
        })
        .unwrap()
    }

    #[test]
    fn test_margin_monotonic_in_risk() {
        let edge = triangle().edges[0];
        let cov = Matrix2::new(0.04, 0.01, 0.01, 0.02);

        let risks = [0.45, 0.3, 0.2, 0.1, 0.05, 0.01, 0.001];
        let margins: Vec<f64> = risks.iter().map(|r| margin_m(&edge, &cov, *r)).collect();

        assert!(margins.iter().all(|m| *m >= 0.0));
        for pair in margins.windows(2) {
            assert!(pair[1] > pair[0], "margins not increasing: {:?}", margins);
        }
    }

    #[test]
    fn test_margin_value() {
        // Unit variance along the normal and risk 0.1 gives sqrt(2) * erfinv(0.8), the 90th
        // percentile of the standard normal.
        let edge = ObstacleEdge {
            normal: Vector2::new(1.0, 0.0),
            offset_m: 0.0,
        };
        let m = margin_m(&edge, &Matrix2::identity(), 0.1);
        assert!((m - 1.2815515655446004).abs() < 1e-6);
    }

    #[test]
    fn test_quad_form_non_negative() {
        let mut rng = StdRng::seed_from_u64(7);
        let edges = triangle().edges;

        for _ in 0..200 {
            let l = Matrix2::new(
                rng.gen_range(-2.0..2.0),
                0.0,
                rng.gen_range(-2.0..2.0),
                rng.gen_range(-2.0..2.0),
            );
            let cov = l * l.transpose();

            for e in edges.iter() {
                assert!((e.normal.transpose() * cov * e.normal)[(0, 0)] >= 0.0);
                assert!(margin_m(e, &cov, 0.2) >= 0.0);
            }
        }
    }

    #[test]
    fn test_raw_flags_zero_is_positive() {
        let square = preprocess(&Obstacle {
            vertices_m: vec![
                Vector2::new(0.0, 0.0),
                Vector2::new(1.0, 0.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(0.0, 1.0),
            ],
            risk: 0.1,
        })
        .unwrap();

        // On the bottom edge line
        let flags = raw_flags(&square, &Vector2::new(0.5, 0.0));
        assert_eq!(
            flags,
            vec![
                SafetyFlag::Positive,
                SafetyFlag::Negative,
                SafetyFlag::Negative,
                SafetyFlag::Negative
            ]
        );
    }

    #[test]
    fn test_hysteresis_keeps_previous() {
        let obs = triangle();
        let inside = Vector2::new(6.0, 5.7);

        let prev = vec![
            SafetyFlag::Negative,
            SafetyFlag::Positive,
            SafetyFlag::Negative,
        ];
        assert_eq!(decide_flags(&obs, &inside, Some(&prev)), prev);

        // Outside, fresh flags are computed regardless of history
        let outside = Vector2::new(6.0, 4.0);
        let fresh = decide_flags(&obs, &outside, Some(&prev));
        assert_eq!(fresh, raw_flags(&obs, &outside));
        assert_ne!(fresh, prev);
    }

    #[test]
    fn test_initial_flags_inside() {
        let obs = triangle();
        // Just above the bottom edge, which is therefore the least violated
        let inside = Vector2::new(6.0, 5.15);
        let flags = initial_flags(&obs, &inside);

        assert_eq!(
            flags.iter().filter(|f| **f == SafetyFlag::Positive).count(),
            1
        );
        assert_eq!(flags[2], SafetyFlag::Positive);
    }

    #[test]
    fn test_decide_only_visible() {
        let obstacles = vec![triangle(), triangle()];
        let start = Pose::new(6.0, 4.0, 0.0);
        let flags = SafetyFlags::initialise(&obstacles, &start, 2);

        // Move the linearisation to the other side of the triangle
        let lin = vec![Pose::new(6.0, 8.0, 0.0); 3];
        let next = flags.decide(&obstacles, &[1], &lin);

        assert_eq!(next.get(0, 1), flags.get(0, 1));
        assert_ne!(next.get(1, 1), flags.get(1, 1));
        assert_eq!(
            next.get(1, 1).unwrap(),
            raw_flags(&obstacles[1], &Vector2::new(6.0, 8.0)).as_slice()
        );
        assert_eq!(next.num_obstacles(), 2);
    }
}
