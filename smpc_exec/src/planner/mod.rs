//! # Planner
//!
//! The receding horizon cycle driver. Each call to [`Planner::step`]:
//!
//! 1. Builds the linearisation trajectory, either by shifting the previous
//!    solution forward one step or by holding the current pose.
//! 2. Selects the visible obstacles and decides their safety flags.
//! 3. Sweeps the cooperative fusion over the horizon from the committed
//!    fusion context.
//! 4. Samples process noise, formulates and solves the trajectory problem.
//! 5. Commits the solution, flags and fusion context, and outputs the first
//!    control and the next pose.
//!
//! If the solve fails the vehicle is commanded to hold position. The flags
//! and fusion context are left untouched, the warm start is discarded, and
//! the failure is counted so that [`run_to_goal`] can give up.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod vehicle;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info, warn};
use nalgebra::{DMatrix, Matrix2, Matrix3};
use serde::Serialize;

use crate::chance::SafetyFlags;
use crate::fusion::{AgentEstimate, ContactState, FusionContext};
use crate::loc::{Control, Pose};
use crate::obstacle::{self, GeometryError, Obstacle, PreparedObstacle};
use crate::params::{validate_risk, ConfigError};
use crate::solver::{IterativeDare, NlpSolver, RiccatiSolver, SolveError, SqpSolver};
use crate::traj_prob::{
    ChanceTerm, ProcessNoise, TrajProb, TrajProbError, TrajProbInputs, Trajectory,
};

pub use params::Params as PlannerParams;
pub use vehicle::{CommandedPoseVehicle, Vehicle};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The receding horizon planner and all state carried between cycles.
pub struct Planner {
    params: PlannerParams,

    /// Terminal state weight from the Riccati solve.
    terminal_weight: Matrix3<f64>,

    solver: Box<dyn NlpSolver>,
    noise: ProcessNoise,

    goal: Pose,
    current: Pose,

    obstacles: Vec<PreparedObstacle>,
    flags: SafetyFlags,

    fusion_ctx: FusionContext,

    warm_start: Option<Trajectory>,

    num_cycles: usize,
    num_consec_failures: usize,
}

/// Inputs supplied to the planner every cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleInputs {
    /// Own positional covariance for steps `0..=N`.
    pub own_covs: Vec<Matrix2<f64>>,

    /// The other agent's estimated trajectory, if there is one.
    pub other: Option<AgentEstimate>,
}

/// Output of one planning cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleOutput {
    /// Control to apply this cycle.
    pub control: Control,

    /// Pose the vehicle is expected to reach at the end of this cycle.
    pub commanded_pose: Pose,

    /// The full planned trajectory. Holds the current pose if the solve
    /// failed.
    pub trajectory: Trajectory,

    /// Safety flags used in this cycle.
    pub flags: SafetyFlags,

    /// Fusion branch taken at each interior step.
    pub contact_branches: Vec<ContactState>,

    /// Cross covariance after each interior step.
    pub cross_covs: Vec<Matrix2<f64>>,

    /// Chance constraints in this cycle's problem.
    pub chance_terms: Vec<ChanceTerm>,

    pub status: StatusReport,
}

/// Status report for one planning cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    pub cycle: usize,

    pub solve_failed: bool,

    pub num_consec_failures: usize,

    /// Number of singular fusion inverses replaced by zero.
    pub num_singular_fallbacks: usize,

    pub num_visible_obstacles: usize,

    pub num_chance_constraints: usize,

    /// Objective value, NaN if the solve failed.
    pub objective: f64,

    pub dist_to_goal_m: f64,
}

/// Summary of a completed run to the goal.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub num_cycles: usize,
    pub final_pose: Pose,
    pub history: Vec<CycleOutput>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur in the planner.
#[derive(Debug, thiserror::Error)]
pub enum PlannerError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid obstacle {0}: {1}")]
    Geometry(usize, GeometryError),

    #[error("Could not compute the terminal weight: {0}")]
    Riccati(SolveError),

    #[error("Trajectory problem error: {0}")]
    TrajProb(#[from] TrajProbError),

    #[error("Expected {expected} elements in {name}, found {found}")]
    InputLength {
        name: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Goal not reached within {0} cycles")]
    MaxCyclesReached(usize),

    #[error("Gave up after {0} consecutive failed solves")]
    TooManySolveFailures(usize),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Planner {
    /// Create a planner using the SQP and iterative Riccati solvers.
    pub fn new(params: PlannerParams, start: Pose, goal: Pose) -> Result<Self, PlannerError> {
        let solver = Box::new(SqpSolver::new(params.solver.clone()));
        let riccati = IterativeDare::new(&params.solver);

        Self::with_solvers(params, start, goal, solver, &riccati)
    }

    /// Create a planner with the given solvers.
    pub fn with_solvers(
        params: PlannerParams,
        start: Pose,
        goal: Pose,
        solver: Box<dyn NlpSolver>,
        riccati: &dyn RiccatiSolver,
    ) -> Result<Self, PlannerError> {
        params.validate()?;

        // Terminal weight from the unconstrained LQR of x+ = x + dT u
        let a = DMatrix::<f64>::identity(3, 3);
        let b = DMatrix::<f64>::identity(3, 3) * params.timestep_s;
        let q = DMatrix::from_iterator(3, 3, params.state_weight_mat().iter().copied());
        let r = DMatrix::from_iterator(3, 3, params.control_weight_mat().iter().copied());
        let p = riccati
            .solve(&a, &b, &q, &r)
            .map_err(PlannerError::Riccati)?;
        let terminal_weight = Matrix3::from_iterator(p.iter().copied());

        debug!("Terminal weight: {}", terminal_weight);

        Ok(Self {
            noise: ProcessNoise::new(params.noise_seed),
            params,
            terminal_weight,
            solver,
            goal,
            current: start,
            obstacles: Vec::new(),
            flags: SafetyFlags::default(),
            fusion_ctx: FusionContext::default(),
            warm_start: None,
            num_cycles: 0,
            num_consec_failures: 0,
        })
    }

    /// Replace the obstacle set.
    ///
    /// The obstacles are preprocessed and cached, and their safety flags are
    /// initialised from the current pose.
    pub fn set_obstacles(&mut self, obstacles: &[Obstacle]) -> Result<(), PlannerError> {
        let mut prepared = Vec::with_capacity(obstacles.len());

        for (i, obs) in obstacles.iter().enumerate() {
            validate_risk(obs.risk)?;
            prepared.push(obstacle::preprocess(obs).map_err(|e| PlannerError::Geometry(i, e))?);
        }

        self.flags = SafetyFlags::initialise(&prepared, &self.current, self.params.horizon);
        self.obstacles = prepared;

        info!("Obstacle set updated, {} obstacles", self.obstacles.len());

        Ok(())
    }

    /// Update the current pose estimate.
    pub fn set_current_pose(&mut self, pose: Pose) {
        self.current = pose;
    }

    pub fn current_pose(&self) -> Pose {
        self.current
    }

    pub fn goal(&self) -> Pose {
        self.goal
    }

    pub fn params(&self) -> &PlannerParams {
        &self.params
    }

    pub fn fusion_context(&self) -> &FusionContext {
        &self.fusion_ctx
    }

    pub fn flags(&self) -> &SafetyFlags {
        &self.flags
    }

    pub fn terminal_weight(&self) -> &Matrix3<f64> {
        &self.terminal_weight
    }

    /// Planar distance from the current pose to the goal.
    pub fn dist_to_goal_m(&self) -> f64 {
        self.current.distance_to(&self.goal)
    }

    /// Error between the current pose and the goal over the full
    /// `[x, y, heading]` state.
    pub fn goal_error(&self) -> f64 {
        (self.current.state() - self.goal.state()).norm()
    }

    /// True once both the position and the heading have settled on the goal.
    pub fn at_goal(&self) -> bool {
        self.goal_error() < self.params.goal_tolerance_m
    }

    /// Run one planning cycle.
    pub fn step(&mut self, inputs: &CycleInputs) -> Result<CycleOutput, PlannerError> {
        let horizon = self.params.horizon;
        inputs.check(horizon)?;

        let cycle = self.num_cycles;
        self.num_cycles += 1;

        // ---- LINEARISATION ----

        let lin = match self.warm_start {
            Some(ref ws) => ws.shifted(&self.current),
            None => Trajectory::hold(&self.current, horizon),
        };

        // ---- SAFETY FLAGS ----

        let visible = obstacle::select_visible(
            &self.obstacles,
            &self.current.position_m,
            self.params.view_distance_m,
            self.params.max_num_obstacles,
        );
        let flags = self.flags.decide(&self.obstacles, &visible, &lin.poses);

        // ---- FUSION ----

        let fusion_steps = self.fusion_ctx.sweep(
            &lin.poses,
            &inputs.own_covs,
            inputs.other.as_ref(),
            &self.params.fusion,
        );
        let num_singular_fallbacks = fusion_steps.iter().map(|s| s.num_singular_fallbacks).sum();

        // ---- NOISE ----

        let heading_var = self.params.heading_noise_var_rad2;
        let noise: Vec<_> = fusion_steps
            .iter()
            .map(|s| self.noise.sample(&s.fused_cov, heading_var))
            .collect();

        // ---- SOLVE ----

        let prob = TrajProb::formulate(
            &self.params,
            &self.terminal_weight,
            &TrajProbInputs {
                current: &self.current,
                goal: &self.goal,
                lin: &lin,
                fusion_steps: &fusion_steps,
                own_covs: &inputs.own_covs,
                noise: &noise,
                obstacles: &self.obstacles,
                visible: &visible,
                flags: &flags,
            },
        )?;

        let mut status = StatusReport {
            cycle,
            num_singular_fallbacks,
            num_visible_obstacles: visible.len(),
            num_chance_constraints: prob.chance_terms.len(),
            dist_to_goal_m: self.dist_to_goal_m(),
            ..Default::default()
        };

        let (trajectory, control, commanded_pose) = match prob.solve(self.solver.as_mut(), &lin) {
            Ok((traj, objective)) => {
                status.objective = objective;
                self.num_consec_failures = 0;

                // Commit the state for the step that will actually be executed
                self.flags = flags.clone();
                if let Some(first) = fusion_steps.first() {
                    self.fusion_ctx = first.next;
                }

                let control = traj.controls[0];
                let commanded = traj.poses[1];
                self.warm_start = Some(traj.clone());

                (traj, control, commanded)
            }
            Err(TrajProbError::NoOptimalTrajectory(e)) => {
                self.num_consec_failures += 1;
                warn!(
                    "Cycle {}: no optimal trajectory ({}), holding position ({} consecutive failures)",
                    cycle, e, self.num_consec_failures
                );

                status.solve_failed = true;
                status.objective = std::f64::NAN;
                self.warm_start = None;

                (
                    Trajectory::hold(&self.current, horizon),
                    Control::default(),
                    self.current,
                )
            }
            Err(e) => return Err(e.into()),
        };

        status.num_consec_failures = self.num_consec_failures;

        info!(
            "Cycle {}: control {:?}, distance to goal {:.4} m",
            cycle, control, status.dist_to_goal_m
        );

        Ok(CycleOutput {
            control,
            commanded_pose,
            trajectory,
            flags,
            contact_branches: fusion_steps.iter().map(|s| s.branch).collect(),
            cross_covs: fusion_steps.iter().map(|s| s.next.cross_cov).collect(),
            chance_terms: prob.chance_terms,
            status,
        })
    }
}

impl CycleInputs {
    /// Inputs with the same own covariance at every step and no other agent.
    pub fn constant(cov: Matrix2<f64>, horizon: usize) -> Self {
        Self {
            own_covs: vec![cov; horizon + 1],
            other: None,
        }
    }

    /// Build inputs from row major flattened covariances.
    pub fn from_flat(own_covs: &[[f64; 4]], other: Option<AgentEstimate>) -> Self {
        Self {
            own_covs: own_covs.iter().map(|c| Matrix2::from_row_slice(c)).collect(),
            other,
        }
    }

    fn check(&self, horizon: usize) -> Result<(), PlannerError> {
        let check = |name: &'static str, found: usize| {
            if found == horizon + 1 {
                Ok(())
            } else {
                Err(PlannerError::InputLength {
                    name,
                    expected: horizon + 1,
                    found,
                })
            }
        };

        check("own covariances", self.own_covs.len())?;
        if let Some(ref other) = self.other {
            check("other agent poses", other.poses.len())?;
            check("other agent covariances", other.covs.len())?;
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run the planner until the vehicle reaches the goal.
///
/// `source` supplies the inputs for each cycle given the cycle number and
/// the current pose. Fails if the goal is not reached within the configured
/// number of cycles or if too many consecutive solves fail.
pub fn run_to_goal<V, F>(
    planner: &mut Planner,
    vehicle: &mut V,
    mut source: F,
) -> Result<RunReport, PlannerError>
where
    V: Vehicle + ?Sized,
    F: FnMut(usize, &Pose) -> CycleInputs,
{
    let max_num_cycles = planner.params.max_num_cycles;
    let max_failures = planner.params.max_consec_solve_failures;
    let mut history = Vec::new();

    while !planner.at_goal() {
        if history.len() >= max_num_cycles {
            return Err(PlannerError::MaxCyclesReached(max_num_cycles));
        }

        let inputs = source(history.len(), &planner.current_pose());
        let output = planner.step(&inputs)?;

        if output.status.num_consec_failures >= max_failures {
            return Err(PlannerError::TooManySolveFailures(
                output.status.num_consec_failures,
            ));
        }

        let pose = vehicle.execute(&output);
        planner.set_current_pose(pose);
        history.push(output);
    }

    info!(
        "Goal reached after {} cycles, final pose {:?}",
        history.len(),
        planner.current_pose()
    );

    Ok(RunReport {
        num_cycles: history.len(),
        final_pose: planner.current_pose(),
        history,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::chance::SafetyFlag;
    use crate::solver::{NlpProblem, Solution};
    use nalgebra::Vector2;

    struct FailingSolver;

    impl NlpSolver for FailingSolver {
        fn solve(
            &mut self,
            _problem: &NlpProblem,
            _warm_start: Option<&[f64]>,
        ) -> Result<Solution, SolveError> {
            Err(SolveError::NonConvergence {
                iters: 1,
                max_violation: 1.0,
            })
        }
    }

    fn deterministic_params() -> PlannerParams {
        PlannerParams {
            heading_noise_var_rad2: 0.0,
            noise_seed: 1,
            ..PlannerParams::default()
        }
    }

    fn triangle() -> Obstacle {
        Obstacle {
            vertices_m: vec![
                Vector2::new(5.0, 5.0),
                Vector2::new(6.0, 7.0),
                Vector2::new(7.0, 5.2),
            ],
            risk: 0.1,
        }
    }

    #[test]
    fn test_single_robot_reaches_goal() {
        let params = deterministic_params();
        let horizon = params.horizon;
        let start = Pose::new(0.0, 0.0, 0.0);
        let goal = Pose::new(10.0, 0.0, 0.5);

        let mut planner = Planner::new(params, start, goal).unwrap();
        let mut vehicle = CommandedPoseVehicle::new(start);

        let report = run_to_goal(&mut planner, &mut vehicle, |_, _| {
            CycleInputs::constant(Matrix2::zeros(), horizon)
        })
        .unwrap();

        assert!(report.final_pose.distance_to(&goal) < 0.01);
        assert!((report.final_pose.heading_rad - goal.heading_rad).abs() < 0.01);
        assert!((report.final_pose.state() - goal.state()).norm() < 0.01);
        assert!(planner.at_goal());
        assert!(report.history.iter().all(|o| !o.status.solve_failed));

        // Distance to the goal never increases
        let mut prev_dist = start.distance_to(&goal);
        for out in report.history.iter() {
            let dist = out.commanded_pose.distance_to(&goal);
            assert!(dist <= prev_dist + 1e-6, "{} > {}", dist, prev_dist);
            prev_dist = dist;
        }
    }

    #[test]
    fn test_contact_sequence() {
        let mut params = deterministic_params();
        params.fusion.max_comm_distance_m = 1.45;
        let horizon = params.horizon;
        let start = Pose::new(0.0, 0.0, 0.0);

        let mut planner = Planner::new(params, start, start).unwrap();

        let cov = Matrix2::identity() * 0.01;
        let other = AgentEstimate {
            poses: (0..=horizon)
                .map(|k| Pose::new(2.5 - 0.2 * k as f64, 0.0, 0.0))
                .collect(),
            covs: vec![cov; horizon + 1],
        };
        let inputs = CycleInputs {
            own_covs: vec![cov; horizon + 1],
            other: Some(other),
        };

        let out = planner.step(&inputs).unwrap();

        let mut expected = vec![ContactState::NoContact; 6];
        expected.push(ContactState::FirstContact);
        expected.extend(vec![ContactState::SteadyContact; 2]);
        assert_eq!(out.contact_branches, expected);

        for k in 0..6 {
            assert_eq!(out.cross_covs[k], Matrix2::zeros());
        }
        assert_ne!(out.cross_covs[6], Matrix2::zeros());

        // Only step 0 is committed, and it was out of range
        assert_eq!(planner.fusion_context().contact, ContactState::NoContact);
        assert_eq!(planner.fusion_context().cross_cov, Matrix2::zeros());
    }

    #[test]
    fn test_contact_carried_across_cycles() {
        let params = deterministic_params();
        let horizon = params.horizon;
        let start = Pose::new(0.0, 0.0, 0.0);
        let mut planner = Planner::new(params, start, start).unwrap();

        let own_cov = Matrix2::identity() * 0.01;
        let inputs_with_other_at = |x_m: f64| CycleInputs {
            own_covs: vec![own_cov; horizon + 1],
            other: Some(AgentEstimate {
                poses: vec![Pose::new(x_m, 0.0, 0.0); horizon + 1],
                covs: vec![Matrix2::identity() * 0.02; horizon + 1],
            }),
        };

        // In range from step 0, so the first step's contact is committed
        let out = planner.step(&inputs_with_other_at(1.0)).unwrap();
        assert!(!out.status.solve_failed);
        assert_eq!(out.contact_branches[0], ContactState::FirstContact);
        assert!(out.contact_branches[1..]
            .iter()
            .all(|b| *b == ContactState::SteadyContact));
        assert_eq!(planner.fusion_context().contact, ContactState::SteadyContact);
        assert_ne!(planner.fusion_context().cross_cov, Matrix2::zeros());
        assert_eq!(planner.fusion_context().cross_cov, out.cross_covs[0]);
        planner.set_current_pose(out.commanded_pose);

        // The next cycle starts from the committed contact
        let out = planner.step(&inputs_with_other_at(1.0)).unwrap();
        assert!(!out.status.solve_failed);
        assert_eq!(out.contact_branches[0], ContactState::SteadyContact);
        assert_eq!(planner.fusion_context().contact, ContactState::SteadyContact);
        planner.set_current_pose(out.commanded_pose);
        let cross_cov = planner.fusion_context().cross_cov;
        assert_ne!(cross_cov, Matrix2::zeros());

        // Out of range the contact drops but the cross covariance persists
        let out = planner.step(&inputs_with_other_at(20.0)).unwrap();
        assert!(!out.status.solve_failed);
        assert!(out
            .contact_branches
            .iter()
            .all(|b| *b == ContactState::NoContact));
        assert_eq!(planner.fusion_context().contact, ContactState::NoContact);
        assert_eq!(planner.fusion_context().cross_cov, cross_cov);
    }

    #[test]
    fn test_position_alone_is_not_at_goal() {
        let goal = Pose::new(1.0, 1.0, 0.5);
        let mut planner =
            Planner::new(deterministic_params(), Pose::new(1.0, 1.0, 0.0), goal).unwrap();

        assert_eq!(planner.dist_to_goal_m(), 0.0);
        assert!((planner.goal_error() - 0.5).abs() < 1e-12);
        assert!(!planner.at_goal());

        planner.set_current_pose(Pose::new(1.0, 1.0, 0.495));
        assert!(planner.at_goal());
    }

    #[test]
    fn test_chance_constraints_hold_around_obstacle() {
        let mut params = deterministic_params();
        params.noise_seed = 7;
        let horizon = params.horizon;
        let start = Pose::new(4.0, 2.0, 0.0);
        let goal = Pose::new(6.5, 4.6, 0.0);
        let cov = Matrix2::identity() * 0.0025;

        let mut planner = Planner::new(params, start, goal).unwrap();
        planner.set_obstacles(&[triangle()]).unwrap();
        let obs = obstacle::preprocess(&triangle()).unwrap();

        // The lateral limit slows the diagonal approach at zero heading
        let mut num_solved = 0;
        for _ in 0..150 {
            let out = planner.step(&CycleInputs::constant(cov, horizon)).unwrap();
            if out.status.solve_failed {
                planner.set_current_pose(out.commanded_pose);
                continue;
            }
            num_solved += 1;

            assert_eq!(out.chance_terms.len(), 3 * horizon);
            for term in out.chance_terms.iter() {
                let edge = &obs.edges[term.edge];
                let p = out.trajectory.poses[term.step].position_m;
                let value = term.flag.sign() * edge.signed_distance_m(&p);
                assert!(
                    value >= term.margin_m - 1e-4,
                    "step {} edge {}: {} < {}",
                    term.step,
                    term.edge,
                    value,
                    term.margin_m
                );
            }

            planner.set_current_pose(out.commanded_pose);
        }

        assert!(num_solved >= 130);
        assert!(planner.dist_to_goal_m() < 1.0);
        assert!(!obs.contains(&planner.current_pose().position_m));
    }

    #[test]
    fn test_hold_position_on_failure() {
        let params = deterministic_params();
        let horizon = params.horizon;
        let start = Pose::new(1.0, 2.0, 0.3);
        let riccati = IterativeDare::new(&params.solver);

        let mut planner = Planner::with_solvers(
            params,
            start,
            Pose::new(5.0, 5.0, 0.0),
            Box::new(FailingSolver),
            &riccati,
        )
        .unwrap();
        planner.set_obstacles(&[triangle()]).unwrap();
        let flags_before = planner.flags().clone();

        let inputs = CycleInputs::constant(Matrix2::identity() * 0.01, horizon);
        let out = planner.step(&inputs).unwrap();

        assert!(out.status.solve_failed);
        assert!(out.status.objective.is_nan());
        assert_eq!(out.status.num_consec_failures, 1);
        assert_eq!(out.control, Control::default());
        assert_eq!(out.commanded_pose, start);
        assert_eq!(planner.flags(), &flags_before);
        assert_eq!(planner.fusion_context(), &FusionContext::default());

        let out = planner.step(&inputs).unwrap();
        assert_eq!(out.status.num_consec_failures, 2);

        // The run loop gives up once the failure limit is hit
        let mut vehicle = CommandedPoseVehicle::new(start);
        assert!(matches!(
            run_to_goal(&mut planner, &mut vehicle, |_, _| inputs.clone()),
            Err(PlannerError::TooManySolveFailures(_))
        ));
    }

    #[test]
    fn test_input_length_rejected() {
        let params = deterministic_params();
        let horizon = params.horizon;
        let mut planner = Planner::new(params, Pose::default(), Pose::default()).unwrap();

        let inputs = CycleInputs::constant(Matrix2::zeros(), horizon - 1);
        assert!(matches!(
            planner.step(&inputs),
            Err(PlannerError::InputLength {
                name: "own covariances",
                ..
            })
        ));

        let inputs = CycleInputs::from_flat(
            &vec![[0.0; 4]; horizon + 1],
            Some(AgentEstimate {
                poses: vec![Pose::default(); horizon],
                covs: vec![Matrix2::zeros(); horizon + 1],
            }),
        );
        assert!(matches!(
            planner.step(&inputs),
            Err(PlannerError::InputLength {
                name: "other agent poses",
                ..
            })
        ));
    }

    #[test]
    fn test_set_obstacles_errors() {
        let mut planner =
            Planner::new(deterministic_params(), Pose::default(), Pose::default()).unwrap();

        let mut risky = triangle();
        risky.risk = 0.6;
        assert!(matches!(
            planner.set_obstacles(&[triangle(), risky]),
            Err(PlannerError::Config(ConfigError::InvalidRisk(_)))
        ));

        let mut flat = triangle();
        flat.vertices_m.truncate(2);
        assert!(matches!(
            planner.set_obstacles(&[flat]),
            Err(PlannerError::Geometry(0, GeometryError::TooFewVertices(2)))
        ));
    }

    #[test]
    fn test_initial_flags_inside_obstacle() {
        let inside = Pose::new(6.0, 5.15, 0.0);
        let mut planner = Planner::new(deterministic_params(), inside, inside).unwrap();
        planner.set_obstacles(&[triangle()]).unwrap();

        for step in 0..=planner.params().horizon {
            let flags = planner.flags().get(0, step).unwrap();
            assert_eq!(
                flags,
                &[
                    SafetyFlag::Negative,
                    SafetyFlag::Negative,
                    SafetyFlag::Positive
                ]
            );
        }
    }

    #[test]
    fn test_terminal_weight() {
        let planner =
            Planner::new(deterministic_params(), Pose::default(), Pose::default()).unwrap();

        // Q = 1, R = 0.5, dT = 0.1 gives P^2 - P - 50 = 0 on the position axes
        let expected = 0.5 * (1.0 + 201f64.sqrt());
        assert!((planner.terminal_weight()[(0, 0)] - expected).abs() < 1e-6);
        assert!((planner.terminal_weight()[(1, 1)] - expected).abs() < 1e-6);
        assert!(planner.terminal_weight()[(0, 1)].abs() < 1e-9);
    }
}
