//! Parameters structure for the numerical solvers

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the NLP and Riccati solvers.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- SQP ----
    /// Maximum number of outer SQP iterations.
    pub max_sqp_iters: usize,

    /// The SQP iteration has converged when no variable moves by more than
    /// this between iterations.
    pub step_tol: f64,

    /// Maximum constraint violation accepted from an unconverged solve.
    pub feas_tol: f64,

    /// Initialise each QP from the previous iterate.
    pub warm_start: bool,

    /// Initial half width of the trust region on variables which appear in
    /// nonlinear constraints.
    pub trust_radius: f64,

    // ---- QP ----
    /// Maximum number of OSQP iterations per QP.
    pub max_qp_iters: u32,

    /// OSQP absolute tolerance.
    pub qp_eps_abs: f64,

    /// OSQP relative tolerance.
    pub qp_eps_rel: f64,

    // ---- RICCATI ----
    /// Maximum number of fixed-point iterations for the DARE.
    pub riccati_max_iters: usize,

    /// Convergence tolerance on the largest change of any element of the
    /// DARE solution.
    pub riccati_tol: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            max_sqp_iters: 20,
            step_tol: 1e-6,
            feas_tol: 1e-5,
            warm_start: true,
            trust_radius: 1.0,
            max_qp_iters: 20_000,
            qp_eps_abs: 1e-7,
            qp_eps_rel: 1e-7,
            riccati_max_iters: 10_000,
            riccati_tol: 1e-10,
        }
    }
}
