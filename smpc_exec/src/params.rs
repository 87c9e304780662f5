//! # Planner Executable Parameters
//!
//! Scenario parameters for the planner executable, and the configuration
//! error shared by every parameter validation in the crate.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use nalgebra::Matrix2;
use serde::Deserialize;

use crate::fusion::AgentEstimate;
use crate::loc::Pose;
use crate::obstacle::Obstacle;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters describing the simulated scenario run by the executable.
#[derive(Debug, Clone, Deserialize)]
pub struct ExecParams {
    /// Initial `[x, y, heading]` of the planning agent.
    pub start_pose: [f64; 3],

    /// Goal `[x, y, heading]`.
    pub goal_pose: [f64; 3],

    /// Positional covariance of the planning agent, used at every horizon
    /// step, row major.
    pub own_cov_m2: [f64; 4],

    /// Obstacles in the scenario.
    #[serde(default)]
    pub obstacles: Vec<Obstacle>,

    /// The cooperating agent, if there is one.
    #[serde(default)]
    pub other_agent: Option<OtherAgentParams>,
}

/// A cooperating agent moving at constant velocity.
#[derive(Debug, Clone, Deserialize)]
pub struct OtherAgentParams {
    /// Initial `[x, y, heading]`.
    pub start_pose: [f64; 3],

    /// Constant world frame velocity.
    pub vel_ms: [f64; 2],

    /// Positional covariance at every step, row major.
    pub cov_m2: [f64; 4],
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An infeasible or inconsistent configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("Risk must lie in (0, 0.5), found {0}")]
    InvalidRisk(f64),

    #[error("Lower bound of {name}[{index}] ({lower}) is above the upper bound ({upper})")]
    InvertedBounds {
        name: &'static str,
        index: usize,
        lower: f64,
        upper: f64,
    },

    #[error("The horizon must be at least 2 steps, found {0}")]
    HorizonTooShort(usize),

    #[error("{name} must be positive, found {value}")]
    NotPositive { name: &'static str, value: f64 },

    #[error("{name}[{index}] is out of range")]
    InvalidWeight { name: &'static str, index: usize },

    #[error("The relative measurement covariance is not symmetric positive semi-definite")]
    MeasCovNotPsd,

    #[error(
        "{name} limit {limit} m/s can never bind, the control bounds already cap it at {reach} m/s"
    )]
    LooseBodyLimit {
        name: &'static str,
        limit: f64,
        reach: f64,
    },
}

// ------------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// ------------------------------------------------------------------------------------------------

impl ExecParams {
    pub fn start(&self) -> Pose {
        Pose::new(self.start_pose[0], self.start_pose[1], self.start_pose[2])
    }

    pub fn goal(&self) -> Pose {
        Pose::new(self.goal_pose[0], self.goal_pose[1], self.goal_pose[2])
    }

    pub fn own_cov(&self) -> Matrix2<f64> {
        Matrix2::from_row_slice(&self.own_cov_m2)
    }
}

impl OtherAgentParams {
    /// Predict the agent's trajectory over a horizon starting at the given
    /// cycle.
    pub fn estimate(&self, cycle: usize, horizon: usize, timestep_s: f64) -> AgentEstimate {
        let cov = Matrix2::from_row_slice(&self.cov_m2);
        let poses = (0..=horizon)
            .map(|k| {
                let t_s = (cycle + k) as f64 * timestep_s;
                Pose::new(
                    self.start_pose[0] + self.vel_ms[0] * t_s,
                    self.start_pose[1] + self.vel_ms[1] * t_s,
                    self.start_pose[2],
                )
            })
            .collect();

        AgentEstimate {
            poses,
            covs: vec![cov; horizon + 1],
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check that a collision risk lies in the open interval (0, 0.5).
pub fn validate_risk(risk: f64) -> Result<(), ConfigError> {
    if risk > 0.0 && risk < 0.5 {
        Ok(())
    } else {
        Err(ConfigError::InvalidRisk(risk))
    }
}

/// Check that every lower bound is no greater than its upper bound.
pub fn validate_bounds(name: &'static str, lower: &[f64], upper: &[f64]) -> Result<(), ConfigError> {
    for (index, (l, u)) in lower.iter().zip(upper.iter()).enumerate() {
        if !(l <= u) {
            return Err(ConfigError::InvertedBounds {
                name,
                index,
                lower: *l,
                upper: *u,
            });
        }
    }

    Ok(())
}

/// Check that a scalar parameter is strictly positive.
pub fn validate_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_risk() {
        assert!(validate_risk(0.1).is_ok());
        assert!(validate_risk(0.4999).is_ok());
        assert_eq!(validate_risk(0.0), Err(ConfigError::InvalidRisk(0.0)));
        assert_eq!(validate_risk(0.5), Err(ConfigError::InvalidRisk(0.5)));
        assert!(validate_risk(std::f64::NAN).is_err());
    }

    #[test]
    fn test_validate_bounds() {
        assert!(validate_bounds("x", &[0.0, -1.0], &[0.0, 1.0]).is_ok());
        assert!(matches!(
            validate_bounds("x", &[0.0, 2.0], &[1.0, 1.0]),
            Err(ConfigError::InvertedBounds { index: 1, .. })
        ));
    }

    #[test]
    fn test_exec_params_from_toml() {
        let p: ExecParams = util::params::from_str(
            r#"
            start_pose = [4.0, 2.0, 0.0]
            goal_pose = [6.5, 4.6, 0.0]
            own_cov_m2 = [0.01, 0.0, 0.0, 0.01]

            [[obstacles]]
            vertices_m = [[5.0, 5.0], [6.0, 7.0], [7.0, 5.2]]
            risk = 0.1

            [other_agent]
            start_pose = [10.0, 0.0, 0.0]
            vel_ms = [-1.0, 0.0]
            cov_m2 = [0.1, 0.0, 0.0, 0.1]
            "#,
        )
        .unwrap();

        assert_eq!(p.obstacles.len(), 1);
        assert_eq!(p.obstacles[0].vertices_m[1][1], 7.0);
        assert_eq!(p.goal(), Pose::new(6.5, 4.6, 0.0));

        let est = p.other_agent.unwrap().estimate(2, 3, 0.5);
        assert_eq!(est.poses.len(), 4);
        assert_eq!(est.covs.len(), 4);
        assert!((est.poses[0].position_m[0] - 9.0).abs() < 1e-12);
        assert!((est.poses[3].position_m[0] - 7.5).abs() < 1e-12);
    }
}
