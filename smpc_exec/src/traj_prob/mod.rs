//! # Trajectory problem
//!
//! Formulates one cycle's stochastic trajectory optimisation as a nonlinear
//! program and reads the optimal trajectory back out of its solution.
//!
//! The decision variables are stacked as
//!
//! ```text
//! z = [x_0, y_0, th_0, ..., x_N, y_N, th_N, vx_0, vy_0, w_0, ..., vx_N-1, vy_N-1, w_N-1]
//! ```
//!
//! and the constraint blocks are, in order:
//!
//! 1. The first pose equals the current pose.
//! 2. Box bounds on every pose and control.
//! 3. Fused dynamics for every interior step, with sampled process noise.
//! 4. Nominal dynamics for the terminal step.
//! 5. Body frame velocity limits.
//! 6. Tightened chance constraints on every visible obstacle edge.
//!
//! Everything except the body frame limits is linear in `z`, since the
//! fusion gains, safety flags and noise are all fixed before formulation.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod body_vel;
mod noise;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, trace};
use nalgebra::{Matrix2, Matrix3, Vector3};
use serde::Serialize;

use crate::chance::{self, SafetyFlag, SafetyFlags};
use crate::fusion::FusionStep;
use crate::loc::{Control, Pose};
use crate::obstacle::PreparedObstacle;
use crate::planner::PlannerParams;
use crate::solver::{
    ConstraintBlock, LinearFn, NlpProblem, NlpSolver, SolveError, Triplet,
};
use body_vel::BodyVelFn;
pub use noise::ProcessNoise;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Dimension of the state `[x, y, heading]`.
pub const STATE_DIM: usize = 3;

/// Dimension of the control `[vx, vy, omega]`.
pub const CTRL_DIM: usize = 3;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A planned trajectory of N+1 poses and N controls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trajectory {
    pub poses: Vec<Pose>,
    pub controls: Vec<Control>,
}

/// Index map from poses and controls into the decision vector.
#[derive(Debug, Clone, Copy)]
pub struct VarLayout {
    pub horizon: usize,
}

/// Everything needed to formulate one cycle's problem.
pub struct TrajProbInputs<'a> {
    /// The current pose estimate.
    pub current: &'a Pose,

    pub goal: &'a Pose,

    /// Linearisation (warm start) trajectory, fixed at cycle start.
    pub lin: &'a Trajectory,

    /// Fusion results for steps `0..N-1`.
    pub fusion_steps: &'a [FusionStep],

    /// Own positional covariance for steps `0..=N`.
    pub own_covs: &'a [Matrix2<f64>],

    /// Process noise for steps `0..N-1`.
    pub noise: &'a [Vector3<f64>],

    pub obstacles: &'a [PreparedObstacle],

    /// Indices of the obstacles to constrain.
    pub visible: &'a [usize],

    pub flags: &'a SafetyFlags,
}

/// A single tightened chance constraint, kept for reporting.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ChanceTerm {
    pub obstacle: usize,
    pub step: usize,
    pub edge: usize,
    pub flag: SafetyFlag,

    /// Tightening margin including the robot radius.
    pub margin_m: f64,
}

/// A formulated trajectory problem.
pub struct TrajProb {
    layout: VarLayout,
    problem: NlpProblem,

    /// The chance constraints in the problem, in row order.
    pub chance_terms: Vec<ChanceTerm>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while formulating or solving the trajectory problem.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TrajProbError {
    #[error("No optimal trajectory found: {0}")]
    NoOptimalTrajectory(#[from] SolveError),

    #[error("Expected {expected} elements in {name}, found {found}")]
    InputLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VarLayout {
    pub fn num_vars(&self) -> usize {
        STATE_DIM * (self.horizon + 1) + CTRL_DIM * self.horizon
    }

    /// Index of component `i` of pose `k`.
    pub fn pose(&self, k: usize, i: usize) -> usize {
        STATE_DIM * k + i
    }

    /// Index of component `i` of control `k`.
    pub fn ctrl(&self, k: usize, i: usize) -> usize {
        STATE_DIM * (self.horizon + 1) + CTRL_DIM * k + i
    }
}

impl Trajectory {
    /// A trajectory which holds the given pose with zero control.
    pub fn hold(pose: &Pose, horizon: usize) -> Self {
        Self {
            poses: vec![*pose; horizon + 1],
            controls: vec![Control::default(); horizon],
        }
    }

    pub fn horizon(&self) -> usize {
        self.controls.len()
    }

    /// Shift the trajectory forward by one step, repeating the last pose and
    /// control, and place the given pose at the start.
    pub fn shifted(&self, current: &Pose) -> Self {
        let mut poses: Vec<Pose> = self.poses.iter().skip(1).copied().collect();
        let mut controls: Vec<Control> = self.controls.iter().skip(1).copied().collect();

        if let Some(last) = poses.last().copied() {
            poses.push(last);
        }
        if let Some(last) = controls.last().copied() {
            controls.push(last);
        }

        if let Some(first) = poses.first_mut() {
            *first = *current;
        }

        Self { poses, controls }
    }

    /// Flatten into the decision vector.
    pub fn to_vars(&self) -> Vec<f64> {
        self.poses
            .iter()
            .flat_map(|p| p.state().iter().copied().collect::<Vec<_>>())
            .chain(
                self.controls
                    .iter()
                    .flat_map(|c| c.vector().iter().copied().collect::<Vec<_>>()),
            )
            .collect()
    }

    /// Read a trajectory back out of a decision vector.
    pub fn from_vars(z: &[f64], layout: &VarLayout) -> Self {
        let poses = (0..=layout.horizon)
            .map(|k| Pose::new(z[layout.pose(k, 0)], z[layout.pose(k, 1)], z[layout.pose(k, 2)]))
            .collect();
        let controls = (0..layout.horizon)
            .map(|k| Control::new(z[layout.ctrl(k, 0)], z[layout.ctrl(k, 1)], z[layout.ctrl(k, 2)]))
            .collect();

        Self { poses, controls }
    }
}

impl TrajProb {
    /// Formulate the problem for one cycle.
    ///
    /// `terminal_weight` is the terminal state weight P, found from the
    /// Riccati equation at planner construction.
    pub fn formulate(
        params: &PlannerParams,
        terminal_weight: &Matrix3<f64>,
        inputs: &TrajProbInputs,
    ) -> Result<Self, TrajProbError> {
        let horizon = params.horizon;
        let layout = VarLayout { horizon };

        check_len("linearisation poses", horizon + 1, inputs.lin.poses.len())?;
        check_len("linearisation controls", horizon, inputs.lin.controls.len())?;
        check_len("fusion steps", horizon - 1, inputs.fusion_steps.len())?;
        check_len("own covariances", horizon + 1, inputs.own_covs.len())?;
        check_len("process noise", horizon - 1, inputs.noise.len())?;

        let (hessian, gradient, constant) = objective(params, terminal_weight, inputs.goal, &layout);

        let mut constraints = vec![
            initial_pose(inputs.current, &layout),
            box_bounds(params, &layout),
            fused_dynamics(params, inputs, &layout),
            terminal_dynamics(params, &layout),
            ConstraintBlock::new(
                "body_vel",
                Box::new(BodyVelFn { layout }),
                [params.lon_vel_limits_ms[0], params.lat_vel_limits_ms[0]].repeat(horizon),
                [params.lon_vel_limits_ms[1], params.lat_vel_limits_ms[1]].repeat(horizon),
            ),
        ];

        let (chance_block, chance_terms) = chance_constraints(params, inputs, &layout);
        constraints.push(chance_block);

        debug!(
            "Formulated problem with {} variables and {} chance constraints",
            layout.num_vars(),
            chance_terms.len()
        );

        Ok(Self {
            layout,
            problem: NlpProblem {
                num_vars: layout.num_vars(),
                hessian,
                gradient,
                constant,
                constraints,
            },
            chance_terms,
        })
    }

    /// Solve the problem from the given warm start.
    pub fn solve(
        &self,
        solver: &mut dyn NlpSolver,
        warm_start: &Trajectory,
    ) -> Result<(Trajectory, f64), TrajProbError> {
        let ws = warm_start.to_vars();
        let solution = solver.solve(&self.problem, Some(&ws))?;

        trace!(
            "Solved in {} iterations, objective {:.6}, max violation {:.3e}",
            solution.num_iters,
            solution.objective,
            solution.max_violation
        );

        Ok((
            Trajectory::from_vars(&solution.z, &self.layout),
            solution.objective,
        ))
    }

    pub fn problem(&self) -> &NlpProblem {
        &self.problem
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn check_len(name: &'static str, expected: usize, found: usize) -> Result<(), TrajProbError> {
    if expected == found {
        Ok(())
    } else {
        Err(TrajProbError::InputLength {
            name,
            expected,
            found,
        })
    }
}

/// Objective in `0.5 z^T H z + f^T z + c` form.
fn objective(
    params: &PlannerParams,
    terminal_weight: &Matrix3<f64>,
    goal: &Pose,
    layout: &VarLayout,
) -> (Vec<Triplet>, Vec<f64>, f64) {
    let horizon = layout.horizon;
    let goal_state = goal.state();
    let q = params.state_weight_mat();
    let r = params.control_weight_mat();
    let g = params.terminal_control_weight_mat();

    let mut hessian = Vec::new();
    let mut gradient = vec![0.0; layout.num_vars()];
    let mut constant = 0.0;

    // (pose_k - goal)^T W (pose_k - goal)
    let mut add_state_cost = |k: usize, w: &Matrix3<f64>| {
        let lin = -2.0 * (w * goal_state);
        for i in 0..STATE_DIM {
            for j in 0..STATE_DIM {
                if w[(i, j)] != 0.0 {
                    hessian.push((layout.pose(k, i), layout.pose(k, j), 2.0 * w[(i, j)]));
                }
            }
            gradient[layout.pose(k, i)] += lin[i];
        }
        constant += (goal_state.transpose() * w * goal_state)[(0, 0)];
    };

    for k in 1..horizon {
        add_state_cost(k, &q);
    }
    add_state_cost(horizon, terminal_weight);

    // u_k^T W u_k
    for k in 0..horizon {
        let w = if k == horizon - 1 { &g } else { &r };
        for i in 0..CTRL_DIM {
            for j in 0..CTRL_DIM {
                if w[(i, j)] != 0.0 {
                    hessian.push((layout.ctrl(k, i), layout.ctrl(k, j), 2.0 * w[(i, j)]));
                }
            }
        }
    }

    (hessian, gradient, constant)
}

fn initial_pose(current: &Pose, layout: &VarLayout) -> ConstraintBlock {
    let state = current.state();

    ConstraintBlock::new(
        "initial_pose",
        Box::new(LinearFn {
            num_rows: STATE_DIM,
            coeffs: (0..STATE_DIM).map(|i| (i, layout.pose(0, i), 1.0)).collect(),
        }),
        state.iter().copied().collect(),
        state.iter().copied().collect(),
    )
}

fn box_bounds(params: &PlannerParams, layout: &VarLayout) -> ConstraintBlock {
    let num_vars = layout.num_vars();
    let num_pose_vars = STATE_DIM * (layout.horizon + 1);

    let lower = (0..num_vars)
        .map(|v| {
            if v < num_pose_vars {
                params.state_lower[v % STATE_DIM]
            } else {
                params.control_lower[(v - num_pose_vars) % CTRL_DIM]
            }
        })
        .collect();
    let upper = (0..num_vars)
        .map(|v| {
            if v < num_pose_vars {
                params.state_upper[v % STATE_DIM]
            } else {
                params.control_upper[(v - num_pose_vars) % CTRL_DIM]
            }
        })
        .collect();

    ConstraintBlock::new(
        "box_bounds",
        Box::new(LinearFn {
            num_rows: num_vars,
            coeffs: (0..num_vars).map(|v| (v, v, 1.0)).collect(),
        }),
        lower,
        upper,
    )
}

/// `pose[k+1] = (I - K)(pose[k] + dT u[k]) + K lin[k+1] + w` on position,
/// `th[k+1] = th[k] + dT w[k] + w_th` on heading.
fn fused_dynamics(
    params: &PlannerParams,
    inputs: &TrajProbInputs,
    layout: &VarLayout,
) -> ConstraintBlock {
    let dt = params.timestep_s;
    let num_rows = STATE_DIM * (layout.horizon - 1);
    let mut coeffs = Vec::new();
    let mut rhs = Vec::with_capacity(num_rows);

    for (k, step) in inputs.fusion_steps.iter().enumerate() {
        let blend = Matrix2::identity() - step.gain;
        let lin_next = inputs.lin.poses[k + 1].position_m;
        let fused_meas = step.gain * lin_next;
        let w = &inputs.noise[k];

        for j in 0..2 {
            let row = STATE_DIM * k + j;
            coeffs.push((row, layout.pose(k + 1, j), 1.0));

            for m in 0..2 {
                if blend[(j, m)] != 0.0 {
                    coeffs.push((row, layout.pose(k, m), -blend[(j, m)]));
                    coeffs.push((row, layout.ctrl(k, m), -dt * blend[(j, m)]));
                }
            }

            rhs.push(fused_meas[j] + w[j]);
        }

        let row = STATE_DIM * k + 2;
        coeffs.push((row, layout.pose(k + 1, 2), 1.0));
        coeffs.push((row, layout.pose(k, 2), -1.0));
        coeffs.push((row, layout.ctrl(k, 2), -dt));
        rhs.push(w[2]);
    }

    ConstraintBlock::new(
        "fused_dynamics",
        Box::new(LinearFn { num_rows, coeffs }),
        rhs.clone(),
        rhs,
    )
}

/// `pose[N] = pose[N-1] + dT u[N-1]`
fn terminal_dynamics(params: &PlannerParams, layout: &VarLayout) -> ConstraintBlock {
    let k = layout.horizon - 1;
    let mut coeffs = Vec::with_capacity(3 * STATE_DIM);

    for i in 0..STATE_DIM {
        coeffs.push((i, layout.pose(k + 1, i), 1.0));
        coeffs.push((i, layout.pose(k, i), -1.0));
        coeffs.push((i, layout.ctrl(k, i), -params.timestep_s));
    }

    ConstraintBlock::new(
        "terminal_dynamics",
        Box::new(LinearFn {
            num_rows: STATE_DIM,
            coeffs,
        }),
        vec![0.0; STATE_DIM],
        vec![0.0; STATE_DIM],
    )
}

/// `flag * (a . p_i - b) >= margin` for each visible obstacle edge and each
/// step `i` in `1..=N`.
fn chance_constraints(
    params: &PlannerParams,
    inputs: &TrajProbInputs,
    layout: &VarLayout,
) -> (ConstraintBlock, Vec<ChanceTerm>) {
    let horizon = layout.horizon;
    let mut coeffs = Vec::new();
    let mut lower = Vec::new();
    let mut terms = Vec::new();

    for &obs_idx in inputs.visible {
        let obs = &inputs.obstacles[obs_idx];

        for step in 1..=horizon {
            // Covariance of the step which produced this pose
            let cov = if step < horizon {
                &inputs.fusion_steps[step - 1].fused_cov
            } else {
                &inputs.own_covs[horizon]
            };

            let flags = match inputs.flags.get(obs_idx, step) {
                Some(f) => f,
                None => continue,
            };

            for (edge_idx, (edge, flag)) in obs.edges.iter().zip(flags.iter()).enumerate() {
                let margin_m = chance::margin_m(edge, cov, obs.risk) + params.robot_radius_m;
                let sign = flag.sign();
                let row = terms.len();

                coeffs.push((row, layout.pose(step, 0), sign * edge.normal[0]));
                coeffs.push((row, layout.pose(step, 1), sign * edge.normal[1]));
                lower.push(margin_m + sign * edge.offset_m);

                terms.push(ChanceTerm {
                    obstacle: obs_idx,
                    step,
                    edge: edge_idx,
                    flag: *flag,
                    margin_m,
                });
            }
        }
    }

    let num_rows = terms.len();
    (
        ConstraintBlock::new(
            "chance",
            Box::new(LinearFn { num_rows, coeffs }),
            lower,
            vec![std::f64::INFINITY; num_rows],
        ),
        terms,
    )
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::fusion::{ContactState, FusionContext};
    use crate::obstacle::{preprocess, Obstacle};
    use crate::solver::{SolverParams, SqpSolver};
    use nalgebra::Vector2;

    fn no_fusion(horizon: usize, cov: Matrix2<f64>) -> Vec<FusionStep> {
        vec![
            FusionStep {
                branch: ContactState::NoContact,
                gain: Matrix2::zeros(),
                fused_cov: cov,
                next: FusionContext::default(),
                num_singular_fallbacks: 0,
            };
            horizon - 1
        ]
    }

    #[test]
    fn test_layout_and_vars() {
        let layout = VarLayout { horizon: 3 };
        assert_eq!(layout.num_vars(), 21);
        assert_eq!(layout.pose(3, 2), 11);
        assert_eq!(layout.ctrl(0, 0), 12);
        assert_eq!(layout.ctrl(2, 2), 20);

        let mut traj = Trajectory::hold(&Pose::new(1.0, 2.0, 0.5), 3);
        traj.controls[1] = Control::new(0.1, 0.2, 0.3);
        let z = traj.to_vars();
        assert_eq!(z.len(), 21);
        assert_eq!(z[layout.ctrl(1, 2)], 0.3);
        assert_eq!(Trajectory::from_vars(&z, &layout), traj);
    }

    #[test]
    fn test_shifted() {
        let traj = Trajectory {
            poses: (0..4).map(|k| Pose::new(k as f64, 0.0, 0.0)).collect(),
            controls: (0..3).map(|k| Control::new(k as f64, 0.0, 0.0)).collect(),
        };

        let current = Pose::new(0.9, 0.1, 0.0);
        let shifted = traj.shifted(&current);

        assert_eq!(shifted.poses[0], current);
        assert_eq!(shifted.poses[1], traj.poses[2]);
        assert_eq!(shifted.poses[3], traj.poses[3]);
        assert_eq!(shifted.controls[0], traj.controls[1]);
        assert_eq!(shifted.controls[2], traj.controls[2]);
        assert_eq!(shifted.horizon(), 3);
    }

    #[test]
    fn test_nominal_solution_satisfies_dynamics() {
        let params = PlannerParams::default();
        let horizon = params.horizon;
        let current = Pose::new(0.0, 0.0, 0.0);
        let goal = Pose::new(1.0, 0.5, 0.2);
        let lin = Trajectory::hold(&current, horizon);
        let covs = vec![Matrix2::zeros(); horizon + 1];
        let steps = no_fusion(horizon, Matrix2::zeros());
        let noise = vec![Vector3::zeros(); horizon - 1];
        let flags = SafetyFlags::default();

        let inputs = TrajProbInputs {
            current: &current,
            goal: &goal,
            lin: &lin,
            fusion_steps: &steps,
            own_covs: &covs,
            noise: &noise,
            obstacles: &[],
            visible: &[],
            flags: &flags,
        };

        let prob = TrajProb::formulate(&params, &(Matrix3::identity() * 7.6), &inputs).unwrap();
        let mut solver = SqpSolver::new(SolverParams::default());
        let (traj, _) = prob.solve(&mut solver, &lin).unwrap();

        assert_eq!(traj.poses[0], current);
        for k in 0..horizon {
            let pred = traj.poses[k].state() + params.timestep_s * traj.controls[k].vector();
            assert!((traj.poses[k + 1].state() - pred).amax() < 1e-5);

            // Moving toward the goal on every axis
            assert!(traj.controls[k].vel_ms[0] > 0.0);
            assert!(traj.controls[k].vel_ms[1] > 0.0);
            assert!(traj.controls[k].rate_rads > 0.0);
            assert!(traj.controls[k].vel_ms[0] <= params.control_upper[0] + 1e-6);
        }
    }

    #[test]
    fn test_lateral_limit_binds_when_crabbing() {
        let params = PlannerParams::default();
        let horizon = params.horizon;
        let heading = std::f64::consts::FRAC_PI_4;
        let current = Pose::new(0.0, 0.0, heading);
        let goal = Pose::new(5.0, 0.0, heading);
        let lin = Trajectory::hold(&current, horizon);
        let covs = vec![Matrix2::zeros(); horizon + 1];
        let steps = no_fusion(horizon, Matrix2::zeros());
        let noise = vec![Vector3::zeros(); horizon - 1];
        let flags = SafetyFlags::default();

        let inputs = TrajProbInputs {
            current: &current,
            goal: &goal,
            lin: &lin,
            fusion_steps: &steps,
            own_covs: &covs,
            noise: &noise,
            obstacles: &[],
            visible: &[],
            flags: &flags,
        };

        let prob = TrajProb::formulate(&params, &(Matrix3::identity() * 7.6), &inputs).unwrap();
        let mut solver = SqpSolver::new(SolverParams::default());
        let (traj, _) = prob.solve(&mut solver, &lin).unwrap();

        // The world frame box alone would allow vx = 0.5, vy = 0, a lateral
        // speed of -0.5 sin(45 deg)
        let box_lat = -params.control_upper[0] * heading.sin();
        assert!(box_lat < params.lat_vel_limits_ms[0] - 0.1);

        let (lon, lat) = traj.controls[0].body_vel_ms(traj.poses[0].heading_rad);
        assert!(
            (lat - params.lat_vel_limits_ms[0]).abs() < 1e-4,
            "lateral velocity {} not at its bound",
            lat
        );
        assert!(lon <= params.lon_vel_limits_ms[1] + 1e-4);

        for k in 0..horizon {
            let (lon, lat) = traj.controls[k].body_vel_ms(traj.poses[k].heading_rad);
            assert!(lat >= params.lat_vel_limits_ms[0] - 1e-4);
            assert!(lat <= params.lat_vel_limits_ms[1] + 1e-4);
            assert!(lon >= params.lon_vel_limits_ms[0] - 1e-4);
            assert!(lon <= params.lon_vel_limits_ms[1] + 1e-4);
        }
    }

    #[test]
    fn test_chance_rows() {
        let params = PlannerParams::default();
        let horizon = params.horizon;
        let obs = vec![preprocess(&Obstacle {
            vertices_m: vec![
                Vector2::new(5.0, 5.0),
                Vector2::new(6.0, 7.0),
                Vector2::new(7.0, 5.2),
            ],
            risk: 0.1,
        })
        .unwrap()];

        let current = Pose::new(4.0, 2.0, 0.0);
        let lin = Trajectory::hold(&current, horizon);
        let cov = Matrix2::identity() * 0.01;
        let covs = vec![cov; horizon + 1];
        let steps = no_fusion(horizon, cov);
        let noise = vec![Vector3::zeros(); horizon - 1];
        let flags = SafetyFlags::initialise(&obs, &current, horizon);

        let inputs = TrajProbInputs {
            current: &current,
            goal: &current,
            lin: &lin,
            fusion_steps: &steps,
            own_covs: &covs,
            noise: &noise,
            obstacles: &obs,
            visible: &[0],
            flags: &flags,
        };

        let prob = TrajProb::formulate(&params, &Matrix3::identity(), &inputs).unwrap();

        assert_eq!(prob.chance_terms.len(), 3 * horizon);
        assert_eq!(prob.chance_terms[0].step, 1);
        assert!(prob.chance_terms.iter().all(|t| t.margin_m > 0.0));

        // Holding position is feasible against the obstacle
        assert!(prob.problem().constraints[5].violations(&lin.to_vars()).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_input_length_checked() {
        let params = PlannerParams::default();
        let current = Pose::default();
        let lin = Trajectory::hold(&current, params.horizon);
        let covs = vec![Matrix2::zeros(); params.horizon];
        let steps = no_fusion(params.horizon, Matrix2::zeros());
        let noise = vec![Vector3::zeros(); params.horizon - 1];
        let flags = SafetyFlags::default();

        let inputs = TrajProbInputs {
            current: &current,
            goal: &current,
            lin: &lin,
            fusion_steps: &steps,
            own_covs: &covs,
            noise: &noise,
            obstacles: &[],
            visible: &[],
            flags: &flags,
        };

        assert!(matches!(
            TrajProb::formulate(&params, &Matrix3::identity(), &inputs),
            Err(TrajProbError::InputLength {
                name: "own covariances",
                ..
            })
        ));
    }
}
