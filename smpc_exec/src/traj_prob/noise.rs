//! Process noise sampling
//!
//! Noise is drawn once per cycle, when the problem is formulated, and enters
//! the dynamics constraints as a constant.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix2, Vector2, Vector3};
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::StandardNormal;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gaussian process noise generator with optional deterministic seeding.
#[derive(Debug, Clone)]
pub struct ProcessNoise {
    rng: StdRng,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ProcessNoise {
    /// Create a new generator.
    ///
    /// A seed of 0 uses entropy, any other seed gives reproducible samples.
    pub fn new(seed: u64) -> Self {
        let rng = if seed == 0 {
            StdRng::from_entropy()
        } else {
            StdRng::seed_from_u64(seed)
        };

        Self { rng }
    }

    /// Draw one `[x, y, heading]` sample with the given positional
    /// covariance and heading variance.
    pub fn sample(&mut self, pos_cov: &Matrix2<f64>, heading_var: f64) -> Vector3<f64> {
        let std_normal = Vector2::new(
            self.rng.sample::<f64, _>(StandardNormal),
            self.rng.sample::<f64, _>(StandardNormal),
        );
        let pos = sqrt_psd(pos_cov) * std_normal;

        let heading = if heading_var > 0.0 {
            heading_var.sqrt() * self.rng.sample::<f64, _>(StandardNormal)
        } else {
            0.0
        };

        Vector3::new(pos[0], pos[1], heading)
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Symmetric square root of a PSD matrix. Negative eigenvalues are clamped
/// to zero.
fn sqrt_psd(cov: &Matrix2<f64>) -> Matrix2<f64> {
    let eig = (0.5 * (cov + cov.transpose())).symmetric_eigen();
    let sqrt_vals = eig.eigenvalues.map(|v| v.max(0.0).sqrt());

    eig.eigenvectors * Matrix2::from_diagonal(&sqrt_vals) * eig.eigenvectors.transpose()
}
