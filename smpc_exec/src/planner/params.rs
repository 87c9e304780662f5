//! Parameters structure for the Planner

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Matrix3, Vector3};
use serde::Deserialize;

use crate::fusion::FusionParams;
use crate::params::{validate_bounds, validate_positive, ConfigError};
use crate::solver::SolverParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the receding horizon planner.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {
    // ---- HORIZON ----
    /// Number of steps in the planning horizon (N).
    pub horizon: usize,

    /// Duration of one step.
    ///
    /// Units: seconds
    pub timestep_s: f64,

    // ---- LIMITS ----
    /// Lower bound on `[x, y, heading]`.
    ///
    /// Units: meters, meters, radians
    pub state_lower: [f64; 3],

    /// Upper bound on `[x, y, heading]`.
    ///
    /// Units: meters, meters, radians
    pub state_upper: [f64; 3],

    /// Lower bound on `[vx, vy, omega]`.
    ///
    /// Units: meters/second, meters/second, radians/second
    pub control_lower: [f64; 3],

    /// Upper bound on `[vx, vy, omega]`.
    ///
    /// Units: meters/second, meters/second, radians/second
    pub control_upper: [f64; 3],

    /// `[min, max]` velocity along the body X axis.
    ///
    /// Units: meters/second
    pub lon_vel_limits_ms: [f64; 2],

    /// `[min, max]` velocity along the body Y axis.
    ///
    /// Units: meters/second
    pub lat_vel_limits_ms: [f64; 2],

    // ---- COST ----
    /// Diagonal of the stage state weight Q.
    pub state_weights: [f64; 3],

    /// Diagonal of the stage control weight R.
    pub control_weights: [f64; 3],

    /// Diagonal of the terminal control weight G.
    pub terminal_control_weights: [f64; 3],

    // ---- OBSTACLES ----
    /// Radius of a circle enclosing the vehicle, added to every constraint
    /// margin.
    ///
    /// Units: meters
    pub robot_radius_m: f64,

    /// Obstacles further than this from the vehicle are not constrained.
    ///
    /// Units: meters
    pub view_distance_m: f64,

    /// Maximum number of obstacles constrained in one cycle.
    pub max_num_obstacles: usize,

    // ---- UNCERTAINTY ----
    /// Variance of the heading process noise.
    ///
    /// Units: radians^2
    pub heading_noise_var_rad2: f64,

    /// Seed for the process noise generator, zero to seed from entropy.
    pub noise_seed: u64,

    // ---- TERMINATION ----
    /// The goal is reached when the norm of the `[x, y, heading]` error
    /// drops below this.
    ///
    /// Units: meters (radians on the heading axis)
    pub goal_tolerance_m: f64,

    /// Maximum number of cycles before giving up on reaching the goal.
    pub max_num_cycles: usize,

    /// Maximum number of consecutive failed solves before giving up.
    pub max_consec_solve_failures: usize,

    // ---- SUBSYSTEMS ----
    pub fusion: FusionParams,

    pub solver: SolverParams,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Check that the parameters describe a feasible configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.horizon < 2 {
            return Err(ConfigError::HorizonTooShort(self.horizon));
        }

        validate_positive("timestep_s", self.timestep_s)?;
        validate_positive("goal_tolerance_m", self.goal_tolerance_m)?;
        validate_positive("max_comm_distance_m", self.fusion.max_comm_distance_m)?;
        validate_positive("view_distance_m", self.view_distance_m)?;
        validate_positive("max_num_cycles", self.max_num_cycles as f64)?;
        validate_positive(
            "max_consec_solve_failures",
            self.max_consec_solve_failures as f64,
        )?;
        validate_positive("max_sqp_iters", self.solver.max_sqp_iters as f64)?;
        validate_positive("step_tol", self.solver.step_tol)?;
        validate_positive("feas_tol", self.solver.feas_tol)?;
        validate_positive("trust_radius", self.solver.trust_radius)?;
        validate_positive("riccati_tol", self.solver.riccati_tol)?;

        if !(self.robot_radius_m >= 0.0) {
            return Err(ConfigError::NotPositive {
                name: "robot_radius_m",
                value: self.robot_radius_m,
            });
        }
        if !(self.heading_noise_var_rad2 >= 0.0) {
            return Err(ConfigError::NotPositive {
                name: "heading_noise_var_rad2",
                value: self.heading_noise_var_rad2,
            });
        }

        validate_bounds("state", &self.state_lower, &self.state_upper)?;
        validate_bounds("control", &self.control_lower, &self.control_upper)?;
        validate_bounds(
            "lon_vel",
            &self.lon_vel_limits_ms[..1],
            &self.lon_vel_limits_ms[1..],
        )?;
        validate_bounds(
            "lat_vel",
            &self.lat_vel_limits_ms[..1],
            &self.lat_vel_limits_ms[1..],
        )?;

        // The fastest body frame speed the world frame box allows, at any heading
        let max_abs = |i: usize| self.control_lower[i].abs().max(self.control_upper[i].abs());
        let reach = max_abs(0).hypot(max_abs(1));
        for (name, limits) in [
            ("lon_vel", &self.lon_vel_limits_ms),
            ("lat_vel", &self.lat_vel_limits_ms),
        ]
        .iter()
        {
            if let Some(limit) = limits.iter().copied().find(|l| l.abs() >= reach) {
                return Err(ConfigError::LooseBodyLimit { name: *name, limit, reach });
            }
        }

        for (name, weights) in [
            ("state_weights", &self.state_weights),
            ("control_weights", &self.control_weights),
            ("terminal_control_weights", &self.terminal_control_weights),
        ]
        .iter()
        {
            if let Some(index) = weights.iter().position(|w| !(*w >= 0.0)) {
                return Err(ConfigError::InvalidWeight { name: *name, index });
            }
        }

        // The Riccati solve needs a positive definite control weight
        for (i, w) in self.control_weights.iter().enumerate() {
            if *w <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    name: "control_weights",
                    index: i,
                });
            }
        }

        let r12 = self.fusion.meas_cov();
        if (r12 - r12.transpose()).amax() > 1e-12
            || r12.symmetric_eigenvalues().iter().any(|e| *e < -1e-12)
        {
            return Err(ConfigError::MeasCovNotPsd);
        }

        Ok(())
    }

    pub fn state_weight_mat(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::from(self.state_weights))
    }

    pub fn control_weight_mat(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::from(self.control_weights))
    }

    pub fn terminal_control_weight_mat(&self) -> Matrix3<f64> {
        Matrix3::from_diagonal(&Vector3::from(self.terminal_control_weights))
    }
}

impl Default for Params {
    /// Defaults for a small holonomic ground vehicle with a 10 step horizon.
    fn default() -> Self {
        let pi = std::f64::consts::PI;

        Self {
            horizon: 10,
            timestep_s: 0.1,
            state_lower: [-20.0, -20.0, -2.0 * pi],
            state_upper: [20.0, 20.0, 2.0 * pi],
            control_lower: [-0.5, -0.5, -0.1],
            control_upper: [0.5, 0.5, 0.1],
            lon_vel_limits_ms: [-0.3, 0.5],
            lat_vel_limits_ms: [-0.2, 0.2],
            state_weights: [1.0, 1.0, 1.0],
            control_weights: [0.5, 0.5, 0.05],
            terminal_control_weights: [0.5, 0.5, 10.0],
            robot_radius_m: 0.0,
            view_distance_m: 5.0,
            max_num_obstacles: 5,
            heading_noise_var_rad2: 1e-6,
            noise_seed: 1,
            goal_tolerance_m: 0.01,
            max_num_cycles: 2000,
            max_consec_solve_failures: 5,
            fusion: FusionParams::default(),
            solver: SolverParams::default(),
        }
    }
}
