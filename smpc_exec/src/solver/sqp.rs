//! Sequential quadratic programming on top of OSQP
//!
//! Since the objective is already quadratic each SQP iteration only has to
//! linearise the constraints about the current iterate:
//!
//! ```text
//! lower - g(z_k) + J(z_k) z_k <= J(z_k) z <= upper - g(z_k) + J(z_k) z_k
//! ```
//!
//! and solve the resulting QP for a candidate iterate. The variables which
//! appear in nonlinear constraints are held inside a box trust region about
//! `z_k`. Candidates are accepted if they reduce the L1 merit function
//! `f(z) + mu * sum(violation)`, where `mu` tracks the largest QP multiplier.
//! Rejected candidates shrink the trust region.
//!
//! Problems whose constraints are all linear are solved with a single QP.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace, warn};
use osqp::{CscMatrix, Problem, Settings};
use std::borrow::Cow;

use super::{NlpProblem, NlpSolver, Solution, SolveError, SolverParams, Triplet};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// OSQP treats bounds beyond this magnitude as infinite.
const QP_INFINITY: f64 = 1e30;

/// Largest trust region radius.
const MAX_TRUST_RADIUS: f64 = 1e3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// SQP solver using OSQP for the quadratic subproblems.
#[derive(Debug, Clone)]
pub struct SqpSolver {
    params: SolverParams,
}

/// Box trust region on a subset of the variables.
struct TrustRegion<'a> {
    cols: &'a [usize],
    radius: f64,
}

/// Primal solution of a QP subproblem and its largest constraint multiplier.
struct QpResult {
    z: Vec<f64>,
    max_mult: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SqpSolver {
    pub fn new(params: SolverParams) -> Self {
        Self { params }
    }

    fn qp_settings(&self) -> Settings {
        Settings::default()
            .verbose(false)
            .eps_abs(self.params.qp_eps_abs)
            .eps_rel(self.params.qp_eps_rel)
            .max_iter(self.params.max_qp_iters)
            .polish(true)
            .warm_start(self.params.warm_start)
    }

    /// Solve the QP formed by linearising the constraints about `z_lin`.
    fn solve_qp(
        &self,
        problem: &NlpProblem,
        z_lin: &[f64],
        trust: Option<&TrustRegion>,
        iter: usize,
    ) -> Result<QpResult, SolveError> {
        let num_cons = problem.num_cons();
        let num_trust = trust.map_or(0, |t| t.cols.len());
        let mut a_triplets: Vec<Triplet> = Vec::new();
        let mut lower = Vec::with_capacity(num_cons + num_trust);
        let mut upper = Vec::with_capacity(num_cons + num_trust);
        let mut row_offset = 0;

        for block in problem.constraints.iter() {
            let jac = block.func.jacobian(z_lin);

            // J z_lin - g(z_lin) is zero for linear blocks
            let mut shift = vec![0.0; block.func.num_rows()];
            if !block.func.is_linear() {
                for &(r, c, v) in jac.iter() {
                    shift[r] += v * z_lin[c];
                }
                for (s, g) in shift.iter_mut().zip(block.func.eval(z_lin)) {
                    *s -= g;
                }
            }

            for (i, s) in shift.iter().enumerate() {
                lower.push((block.lower[i] + s).max(-QP_INFINITY));
                upper.push((block.upper[i] + s).min(QP_INFINITY));
            }

            a_triplets.extend(jac.into_iter().map(|(r, c, v)| (r + row_offset, c, v)));
            row_offset += block.func.num_rows();
        }

        if let Some(t) = trust {
            for (i, &c) in t.cols.iter().enumerate() {
                a_triplets.push((num_cons + i, c, 1.0));
                lower.push(z_lin[c] - t.radius);
                upper.push(z_lin[c] + t.radius);
            }
        }

        let p_mat = csc_from_triplets(problem.num_vars, problem.num_vars, &problem.hessian, true);
        let a_mat = csc_from_triplets(
            num_cons + num_trust,
            problem.num_vars,
            &a_triplets,
            false,
        );

        let mut qp = Problem::new(
            p_mat,
            &problem.gradient,
            a_mat,
            &lower,
            &upper,
            &self.qp_settings(),
        )
        .map_err(|e| SolveError::QpSetup(format!("{:?}", e)))?;

        if self.params.warm_start {
            qp.warm_start_x(z_lin);
        }

        let solution = match qp.solve() {
            osqp::Status::Solved(solution) => solution,
            osqp::Status::SolvedInaccurate(solution) => {
                warn!("QP subproblem {} only solved inaccurately", iter);
                solution
            }
            status => {
                return Err(SolveError::QpFailed {
                    iter,
                    status: status_name(&status),
                })
            }
        };

        Ok(QpResult {
            z: solution.x().to_vec(),
            max_mult: solution.y()[..num_cons]
                .iter()
                .fold(0.0, |m: f64, y| m.max(y.abs())),
        })
    }
}

impl NlpSolver for SqpSolver {
    fn solve(
        &mut self,
        problem: &NlpProblem,
        warm_start: Option<&[f64]>,
    ) -> Result<Solution, SolveError> {
        problem.validate()?;

        let mut z = match warm_start {
            Some(ws) if ws.len() == problem.num_vars => ws.to_vec(),
            Some(ws) => {
                return Err(SolveError::InvalidProblem(format!(
                    "warm start has {} elements for {} variables",
                    ws.len(),
                    problem.num_vars
                )))
            }
            None => vec![0.0; problem.num_vars],
        };

        // Linear problems need exactly one QP
        let trust_cols = nonlinear_cols(problem, &z);
        if trust_cols.is_empty() {
            let qp = self.solve_qp(problem, &z, None, 0)?;

            // Inaccurate QP solutions are only accepted when feasible
            let max_violation = problem.max_violation(&qp.z);
            if max_violation > self.params.feas_tol {
                return Err(SolveError::NonConvergence {
                    iters: 1,
                    max_violation,
                });
            }

            return Ok(self.solution(problem, qp.z, 1));
        }

        let mut radius = self.params.trust_radius;
        let mut merit_weight = 1.0;

        for iter in 0..self.params.max_sqp_iters {
            let trust = TrustRegion {
                cols: &trust_cols,
                radius,
            };

            let qp = match self.solve_qp(problem, &z, Some(&trust), iter) {
                Ok(q) => q,
                Err(SolveError::QpFailed { status, .. }) if radius < MAX_TRUST_RADIUS => {
                    // The linearisation may only be feasible further from the current iterate
                    debug!(
                        "SQP iteration {}: QP {} with trust radius {:.3e}, expanding",
                        iter, status, radius
                    );
                    radius = (4.0 * radius).min(MAX_TRUST_RADIUS);
                    continue;
                }
                Err(e) => return Err(e),
            };

            merit_weight = f64::max(merit_weight, 2.0 * qp.max_mult);

            let step = qp
                .z
                .iter()
                .zip(z.iter())
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f64::max);

            let merit = |x: &[f64]| problem.objective(x) + merit_weight * problem.total_violation(x);
            let current = merit(&z);
            let candidate = merit(&qp.z);

            if candidate <= current + 1e-12 * current.abs().max(1.0) {
                if step >= 0.9 * radius {
                    radius = (2.0 * radius).min(MAX_TRUST_RADIUS);
                }
                z = qp.z;
            } else {
                radius *= 0.5;
            }

            trace!(
                "SQP iteration {}: step {:.3e}, merit {:.6e} -> {:.6e}, radius {:.3e}",
                iter,
                step,
                current,
                candidate,
                radius
            );

            if step < self.params.step_tol || radius < self.params.step_tol {
                let max_violation = problem.max_violation(&z);
                if max_violation <= self.params.feas_tol {
                    debug!(
                        "SQP converged in {} iterations, max violation {:.3e}",
                        iter + 1,
                        max_violation
                    );
                    return Ok(self.solution(problem, z, iter + 1));
                }

                if radius < self.params.step_tol {
                    return Err(SolveError::NonConvergence {
                        iters: iter + 1,
                        max_violation,
                    });
                }
            }
        }

        // Accept an unconverged iterate only if it is feasible
        let max_violation = problem.max_violation(&z);
        if max_violation <= self.params.feas_tol {
            warn!(
                "SQP reached the iteration limit ({}) with a feasible iterate, accepting it",
                self.params.max_sqp_iters
            );
            Ok(self.solution(problem, z, self.params.max_sqp_iters))
        } else {
            Err(SolveError::NonConvergence {
                iters: self.params.max_sqp_iters,
                max_violation,
            })
        }
    }
}

impl SqpSolver {
    fn solution(&self, problem: &NlpProblem, z: Vec<f64>, num_iters: usize) -> Solution {
        Solution {
            objective: problem.objective(&z),
            max_violation: problem.max_violation(&z),
            num_iters,
            z,
        }
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Variables which appear in any nonlinear constraint, sorted.
fn nonlinear_cols(problem: &NlpProblem, z: &[f64]) -> Vec<usize> {
    let mut cols: Vec<usize> = problem
        .constraints
        .iter()
        .filter(|b| !b.func.is_linear())
        .flat_map(|b| b.func.jacobian(z).into_iter().map(|(_, c, _)| c))
        .collect();

    cols.sort_unstable();
    cols.dedup();
    cols
}

/// Build a CSC matrix from triplets, summing duplicates.
///
/// If `upper_only` is set entries below the diagonal are dropped, as OSQP
/// requires for the objective matrix.
fn csc_from_triplets(
    nrows: usize,
    ncols: usize,
    triplets: &[Triplet],
    upper_only: bool,
) -> CscMatrix<'static> {
    let mut sorted: Vec<Triplet> = triplets
        .iter()
        .copied()
        .filter(|&(r, c, _)| !upper_only || r <= c)
        .collect();
    sorted.sort_by(|a, b| (a.1, a.0).cmp(&(b.1, b.0)));

    let mut indptr = vec![0; ncols + 1];
    let mut indices: Vec<usize> = Vec::with_capacity(sorted.len());
    let mut data: Vec<f64> = Vec::with_capacity(sorted.len());
    let mut last: Option<(usize, usize)> = None;

    for (r, c, v) in sorted {
        if last == Some((r, c)) {
            if let Some(d) = data.last_mut() {
                *d += v;
            }
            continue;
        }

        indices.push(r);
        data.push(v);
        indptr[c + 1] += 1;
        last = Some((r, c));
    }

    // Convert per-column counts into offsets
    for c in 0..ncols {
        indptr[c + 1] += indptr[c];
    }

    CscMatrix {
        nrows,
        ncols,
        indptr: Cow::Owned(indptr),
        indices: Cow::Owned(indices),
        data: Cow::Owned(data),
    }
}

fn status_name(status: &osqp::Status) -> String {
    match status {
        osqp::Status::Solved(_) => "solved",
        osqp::Status::SolvedInaccurate(_) => "solved inaccurate",
        osqp::Status::MaxIterationsReached(_) => "max iterations reached",
        osqp::Status::TimeLimitReached(_) => "time limit reached",
        osqp::Status::PrimalInfeasible(_) => "primal infeasible",
        osqp::Status::DualInfeasible(_) => "dual infeasible",
        osqp::Status::NonConvex(_) => "non convex",
        _ => "unknown",
    }
    .into()
}
