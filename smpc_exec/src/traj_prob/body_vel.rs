//! Body frame velocity constraint
//!
//! The controls are world frame velocities, but the vehicle's limits apply
//! along and across its body. For each step `k`:
//!
//! ```text
//! lon_k =  vx_k cos(th_k) + vy_k sin(th_k)
//! lat_k = -vx_k sin(th_k) + vy_k cos(th_k)
//! ```
//!
//! Rows are ordered `[lon_0, lat_0, lon_1, lat_1, ...]`.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use super::VarLayout;
use crate::solver::{ConstraintFn, Triplet};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

pub(crate) struct BodyVelFn {
    pub layout: VarLayout,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConstraintFn for BodyVelFn {
    fn num_rows(&self) -> usize {
        2 * self.layout.horizon
    }

    fn eval(&self, z: &[f64]) -> Vec<f64> {
        let mut g = Vec::with_capacity(self.num_rows());

        for k in 0..self.layout.horizon {
            let (sin, cos) = z[self.layout.pose(k, 2)].sin_cos();
            let vx = z[self.layout.ctrl(k, 0)];
            let vy = z[self.layout.ctrl(k, 1)];

            g.push(vx * cos + vy * sin);
            g.push(-vx * sin + vy * cos);
        }

        g
    }

    fn jacobian(&self, z: &[f64]) -> Vec<Triplet> {
        let mut jac = Vec::with_capacity(6 * self.layout.horizon);

        for k in 0..self.layout.horizon {
            let th = self.layout.pose(k, 2);
            let vx_idx = self.layout.ctrl(k, 0);
            let vy_idx = self.layout.ctrl(k, 1);

            let (sin, cos) = z[th].sin_cos();
            let vx = z[vx_idx];
            let vy = z[vy_idx];

            let lon = 2 * k;
            jac.push((lon, vx_idx, cos));
            jac.push((lon, vy_idx, sin));
            jac.push((lon, th, -vx * sin + vy * cos));

            let lat = 2 * k + 1;
            jac.push((lat, vx_idx, -sin));
            jac.push((lat, vy_idx, cos));
            jac.push((lat, th, -vx * cos - vy * sin));
        }

        jac
    }
}
