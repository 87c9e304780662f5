//! Parameters structure for cooperative fusion

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Matrix2;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the cooperative covariance fusion.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    /// Agents closer than this distance can exchange estimates.
    ///
    /// Units: meters
    pub max_comm_distance_m: f64,

    /// Covariance of the relative position measurement between the agents
    /// (R12), row major.
    ///
    /// Units: meters^2
    pub meas_cov_m2: [f64; 4],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// The relative measurement covariance as a matrix.
    pub fn meas_cov(&self) -> Matrix2<f64> {
        Matrix2::from_row_slice(&self.meas_cov_m2)
    }
}

impl Default for Params {
    fn default() -> Self {
        Self {
            max_comm_distance_m: 3.0,
            meas_cov_m2: [0.01, 0.0, 0.0, 0.01],
        }
    }
}
