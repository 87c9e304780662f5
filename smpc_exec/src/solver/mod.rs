//! # Numerical solvers
//!
//! The planner treats the nonlinear program solver and the Riccati solver as
//! external capabilities, described here by the [`NlpSolver`] and
//! [`RiccatiSolver`] traits. One implementation of each is provided:
//!
//! - [`SqpSolver`] - sequential quadratic programming on top of OSQP.
//! - [`IterativeDare`] - fixed-point iteration of the discrete algebraic
//!   Riccati equation.
//!
//! Problems are expressed over a flat vector of decision variables `z`, with
//! a quadratic objective `0.5 z^T H z + f^T z` and any number of constraint
//! blocks `lower <= g(z) <= upper`.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod riccati;
mod sqp;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::DMatrix;

pub use params::Params as SolverParams;
pub use riccati::IterativeDare;
pub use sqp::SqpSolver;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single sparse matrix entry as `(row, column, value)`.
///
/// Entries with the same row and column are summed.
pub type Triplet = (usize, usize, f64);

/// A block of constraints `lower <= g(z) <= upper`.
pub struct ConstraintBlock {
    /// Name of the block, used in log messages.
    pub name: &'static str,

    pub func: Box<dyn ConstraintFn>,

    pub lower: Vec<f64>,

    pub upper: Vec<f64>,
}

/// A nonlinear program with a quadratic objective.
pub struct NlpProblem {
    pub num_vars: usize,

    /// Objective Hessian `H`, only the upper triangle is read.
    pub hessian: Vec<Triplet>,

    /// Objective linear term `f`.
    pub gradient: Vec<f64>,

    /// Constant term of the objective.
    pub constant: f64,

    /// Constraint blocks, rows are stacked in this order.
    pub constraints: Vec<ConstraintBlock>,
}

/// Linear constraint function `g(z) = A z`.
pub struct LinearFn {
    pub num_rows: usize,
    pub coeffs: Vec<Triplet>,
}

/// A solution returned by an [`NlpSolver`].
#[derive(Debug, Clone)]
pub struct Solution {
    pub z: Vec<f64>,

    pub objective: f64,

    /// Largest violation of any constraint at `z`.
    pub max_violation: f64,

    /// Number of outer iterations used.
    pub num_iters: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur in either solver.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SolveError {
    #[error("Problem is malformed: {0}")]
    InvalidProblem(String),

    #[error("Could not set up the QP subproblem: {0}")]
    QpSetup(String),

    #[error("QP subproblem {iter} failed with status {status}")]
    QpFailed { iter: usize, status: String },

    #[error(
        "Solver did not converge after {iters} iterations (max constraint violation {max_violation:.3e})"
    )]
    NonConvergence { iters: usize, max_violation: f64 },

    #[error("Singular matrix encountered in the Riccati iteration")]
    SingularRiccati,

    #[error("Riccati iteration did not converge after {iters} iterations")]
    RiccatiNonConvergence { iters: usize },
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A vector valued constraint function with a sparse Jacobian.
pub trait ConstraintFn {
    /// Number of rows of `g(z)`.
    fn num_rows(&self) -> usize;

    /// Evaluate `g(z)`.
    fn eval(&self, z: &[f64]) -> Vec<f64>;

    /// Jacobian of `g` at `z`, row indices local to this block.
    fn jacobian(&self, z: &[f64]) -> Vec<Triplet>;

    /// Whether `g` is linear, in which case the Jacobian is constant.
    fn is_linear(&self) -> bool {
        false
    }
}

/// Solves a nonlinear program.
pub trait NlpSolver {
    fn solve(
        &mut self,
        problem: &NlpProblem,
        warm_start: Option<&[f64]>,
    ) -> Result<Solution, SolveError>;
}

/// Solves the discrete algebraic Riccati equation for the infinite horizon
/// LQR cost matrix.
pub trait RiccatiSolver {
    fn solve(
        &self,
        a: &DMatrix<f64>,
        b: &DMatrix<f64>,
        q: &DMatrix<f64>,
        r: &DMatrix<f64>,
    ) -> Result<DMatrix<f64>, SolveError>;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ConstraintFn for LinearFn {
    fn num_rows(&self) -> usize {
        self.num_rows
    }

    fn eval(&self, z: &[f64]) -> Vec<f64> {
        let mut g = vec![0.0; self.num_rows];
        for &(r, c, v) in self.coeffs.iter() {
            g[r] += v * z[c];
        }
        g
    }

    fn jacobian(&self, _z: &[f64]) -> Vec<Triplet> {
        self.coeffs.clone()
    }

    fn is_linear(&self) -> bool {
        true
    }
}

impl ConstraintBlock {
    pub fn new(
        name: &'static str,
        func: Box<dyn ConstraintFn>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Self {
        Self {
            name,
            func,
            lower,
            upper,
        }
    }

    /// Amount by which each row of `g(z)` lies outside its bounds.
    pub fn violations(&self, z: &[f64]) -> Vec<f64> {
        self.func
            .eval(z)
            .iter()
            .zip(self.lower.iter().zip(self.upper.iter()))
            .map(|(g, (l, u))| (l - g).max(g - u).max(0.0))
            .collect()
    }
}

impl NlpProblem {
    /// Total number of constraint rows.
    pub fn num_cons(&self) -> usize {
        self.constraints.iter().map(|c| c.func.num_rows()).sum()
    }

    /// Evaluate the objective at `z`.
    pub fn objective(&self, z: &[f64]) -> f64 {
        let mut obj = self.constant;

        for &(r, c, v) in self.hessian.iter() {
            if r == c {
                obj += 0.5 * v * z[r] * z[c];
            } else if r < c {
                obj += v * z[r] * z[c];
            }
        }

        obj + self
            .gradient
            .iter()
            .zip(z.iter())
            .map(|(f, x)| f * x)
            .sum::<f64>()
    }

    /// Largest violation of any constraint at `z`.
    pub fn max_violation(&self, z: &[f64]) -> f64 {
        self.constraints
            .iter()
            .flat_map(|c| c.violations(z))
            .fold(0.0, f64::max)
    }

    /// Sum of the violations of every constraint at `z`.
    pub fn total_violation(&self, z: &[f64]) -> f64 {
        self.constraints
            .iter()
            .flat_map(|c| c.violations(z))
            .sum()
    }

    /// Check that all dimensions are consistent.
    pub fn validate(&self) -> Result<(), SolveError> {
        if self.gradient.len() != self.num_vars {
            return Err(SolveError::InvalidProblem(format!(
                "gradient has {} elements for {} variables",
                self.gradient.len(),
                self.num_vars
            )));
        }

        if self
            .hessian
            .iter()
            .any(|&(r, c, _)| r >= self.num_vars || c >= self.num_vars)
        {
            return Err(SolveError::InvalidProblem(
                "hessian entry out of range".into(),
            ));
        }

        for block in self.constraints.iter() {
            let rows = block.func.num_rows();
            if block.lower.len() != rows || block.upper.len() != rows {
                return Err(SolveError::InvalidProblem(format!(
                    "constraint block '{}' has {} rows but bounds of length {}/{}",
                    block.name,
                    rows,
                    block.lower.len(),
                    block.upper.len()
                )));
            }

            if block.lower.iter().zip(block.upper.iter()).any(|(l, u)| l > u) {
                return Err(SolveError::InvalidProblem(format!(
                    "constraint block '{}' has a lower bound above its upper bound",
                    block.name
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_objective_and_violation() {
        // 0.5 * (2 x^2 + 2 y^2) - 2 x + 1
        let prob = NlpProblem {
            num_vars: 2,
            hessian: vec![(0, 0, 2.0), (1, 1, 2.0)],
            gradient: vec![-2.0, 0.0],
            constant: 1.0,
            constraints: vec![ConstraintBlock::new(
                "sum",
                Box::new(LinearFn {
                    num_rows: 1,
                    coeffs: vec![(0, 0, 1.0), (0, 1, 1.0)],
                }),
                vec![1.0],
                vec![2.0],
            )],
        };

        assert!(prob.validate().is_ok());
        assert!((prob.objective(&[1.0, 0.0]) - 0.0).abs() < 1e-12);
        assert!((prob.max_violation(&[0.25, 0.25]) - 0.5).abs() < 1e-12);
        assert!((prob.total_violation(&[0.25, 0.25]) - 0.5).abs() < 1e-12);
        assert_eq!(prob.max_violation(&[1.0, 0.5]), 0.0);
        assert_eq!(prob.num_cons(), 1);
    }

    #[test]
    fn test_validate_bounds() {
        let prob = NlpProblem {
            num_vars: 1,
            hessian: vec![],
            gradient: vec![0.0],
            constant: 0.0,
            constraints: vec![ConstraintBlock::new(
                "bad",
                Box::new(LinearFn {
                    num_rows: 1,
                    coeffs: vec![(0, 0, 1.0)],
                }),
                vec![1.0],
                vec![0.0],
            )],
        };

        assert!(matches!(
            prob.validate(),
            Err(SolveError::InvalidProblem(_))
        ));
    }
}
