//! Fixed-point solution of the discrete algebraic Riccati equation

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use nalgebra::DMatrix;

use super::{RiccatiSolver, SolveError, SolverParams};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Solves the DARE by iterating the Riccati recursion until it stops
/// changing:
///
/// ```text
/// P = Q + A^T P A - A^T P B (R + B^T P B)^-1 B^T P A
/// ```
///
/// Starting from `P = Q`. Converges for stabilisable `(A, B)` with `Q` PSD
/// and `R` positive definite.
#[derive(Debug, Clone)]
pub struct IterativeDare {
    pub max_iters: usize,
    pub tol: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl IterativeDare {
    pub fn new(params: &SolverParams) -> Self {
        Self {
            max_iters: params.riccati_max_iters,
            tol: params.riccati_tol,
        }
    }
}

impl RiccatiSolver for IterativeDare {
    fn solve(
        &self,
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        q: &DMatrix<f64>,
        r: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, SolveError> {
        let n = a.nrows();
        let m = b.ncols();

        if a.ncols() != n
            || b.nrows() != n
            || q.shape() != (n, n)
            || r.shape() != (m, m)
        {
            return Err(SolveError::InvalidProblem(format!(
                "inconsistent Riccati dimensions: A {:?}, B {:?}, Q {:?}, R {:?}",
                a.shape(),
                b.shape(),
                q.shape(),
                r.shape()
            )));
        }

        let at = a.transpose();
        let bt = b.transpose();
        let mut p = q.clone();

        for iter in 0..self.max_iters {
            let s = r + &bt * &p * b;
            let s_inv = s.try_inverse().ok_or(SolveError::SingularRiccati)?;

            let atpb = &at * &p * b;
            let next = q + &at * &p * a - &atpb * s_inv * atpb.transpose();

            let change = (&next - &p).amax();
            p = next;

            if change <= self.tol * p.amax().max(1.0) {
                debug!("Riccati iteration converged after {} iterations", iter + 1);
                return Ok(p);
            }
        }

        Err(SolveError::RiccatiNonConvergence {
            iters: self.max_iters,
        })
    }
}
