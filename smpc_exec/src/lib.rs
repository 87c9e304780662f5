//! # Stochastic MPC library.
//!
//! Chance constrained receding horizon planning for a holonomic ground vehicle, with cooperative
//! covariance fusion between two agents. The executable and benchmarks access the planner
//! through this library.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Chance constraints - risk tightened obstacle margins and per-edge safety flags
pub mod chance;

/// Cooperative fusion - covariance updates from relative measurements between two agents
pub mod fusion;

/// Localisation types - poses and controls of the vehicle
pub mod loc;

/// Obstacles - convex polygon preprocessing and visibility selection
pub mod obstacle;

/// Executable parameters and shared configuration validation
pub mod params;

/// Planner - the receding horizon cycle driver
pub mod planner;

/// Numerical solvers - SQP over OSQP and the discrete algebraic Riccati equation
pub mod solver;

/// Trajectory problem - formulation of one cycle's nonlinear program
pub mod traj_prob;
