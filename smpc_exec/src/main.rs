//! Main planner executable entry point.
//!
//! # Architecture
//!
//! The executable runs a single planning scenario to completion:
//!
//!     - Load the planner and scenario parameters
//!     - Initialise the planner and its obstacle set
//!     - Main loop, until the goal is reached:
//!         - Predict the other agent's trajectory over the horizon
//!         - Run one planning cycle
//!         - Move the simulated vehicle to the commanded pose
//!         - Archive the cycle
//!     - Save the full cycle history
//!
//! A scenario file path may be given as the only argument, otherwise
//! `smpc_exec.toml` is loaded from the parameters directory.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{
    eyre::{eyre, WrapErr},
    Report,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::env;

// Internal
use smpc_lib::{
    fusion::ContactState,
    loc::Pose,
    params::ExecParams,
    planner::{self, CommandedPoseVehicle, CycleInputs, CycleOutput, Planner, PlannerParams, Vehicle},
};
use util::{
    archive::Archiver,
    logger::{logger_init, LevelFilter},
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Flat per-cycle archive record.
#[derive(Serialize)]
struct CycleRecord {
    time_s: f64,
    cycle: usize,
    x_m: f64,
    y_m: f64,
    heading_rad: f64,
    vx_ms: f64,
    vy_ms: f64,
    rate_rads: f64,
    contact: ContactState,
    solve_failed: bool,
    num_consec_failures: usize,
    num_singular_fallbacks: usize,
    num_visible_obstacles: usize,
    num_chance_constraints: usize,
    objective: f64,
    dist_to_goal_m: f64,
}

/// Simulated vehicle which archives every cycle it executes.
struct ArchivedVehicle {
    inner: CommandedPoseVehicle,
    archiver: Archiver,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Vehicle for ArchivedVehicle {
    fn execute(&mut self, output: &CycleOutput) -> Pose {
        let pose = self.inner.execute(output);

        let record = CycleRecord {
            time_s: session::get_elapsed_seconds(),
            cycle: output.status.cycle,
            x_m: pose.position_m[0],
            y_m: pose.position_m[1],
            heading_rad: pose.heading_rad,
            vx_ms: output.control.vel_ms[0],
            vy_ms: output.control.vel_ms[1],
            rate_rads: output.control.rate_rads,
            contact: output
                .contact_branches
                .first()
                .copied()
                .unwrap_or_default(),
            solve_failed: output.status.solve_failed,
            num_consec_failures: output.status.num_consec_failures,
            num_singular_fallbacks: output.status.num_singular_fallbacks,
            num_visible_obstacles: output.status.num_visible_obstacles,
            num_chance_constraints: output.status.num_chance_constraints,
            objective: output.status.objective,
            dist_to_goal_m: output.status.dist_to_goal_m,
        };

        if let Err(e) = self.archiver.serialise(record) {
            warn!("Could not archive cycle {}: {}", output.status.cycle, e);
        }

        pose
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {
    color_eyre::install()?;

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("smpc_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    info!("Stochastic MPC Planner Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let planner_params: PlannerParams =
        util::params::load("planner.toml").wrap_err("Could not load planner params")?;

    let args: Vec<String> = env::args().collect();
    debug!("CLI arguments: {:?}", args);

    let exec_params: ExecParams = match args.len() {
        1 => util::params::load("smpc_exec.toml").wrap_err("Could not load exec params")?,
        2 => {
            info!("Loading scenario from \"{}\"", &args[1]);
            util::params::load_path(&args[1]).wrap_err("Could not load the scenario")?
        }
        n => {
            return Err(eyre!(
                "Expected either zero or one argument, found {}",
                n - 1
            ))
        }
    };

    info!("Parameters loaded");

    // ---- INITIALISE PLANNER ----

    let horizon = planner_params.horizon;
    let timestep_s = planner_params.timestep_s;

    let mut planner = Planner::new(planner_params, exec_params.start(), exec_params.goal())
        .wrap_err("Failed to initialise the planner")?;
    planner
        .set_obstacles(&exec_params.obstacles)
        .wrap_err("Invalid obstacle set")?;

    info!(
        "Planner initialised, start {:?}, goal {:?}",
        exec_params.start(),
        exec_params.goal()
    );

    let mut vehicle = ArchivedVehicle {
        inner: CommandedPoseVehicle::new(exec_params.start()),
        archiver: Archiver::from_path(&session, "cycles.csv")
            .wrap_err("Failed to create the cycle archive")?,
    };

    // ---- MAIN LOOP ----

    info!("Beginning main loop\n");

    let own_cov = exec_params.own_cov();
    let other_agent = exec_params.other_agent.clone();

    let result = planner::run_to_goal(&mut planner, &mut vehicle, |cycle, _| {
        let mut inputs = CycleInputs::constant(own_cov, horizon);
        inputs.other = other_agent
            .as_ref()
            .map(|o| o.estimate(cycle, horizon, timestep_s));
        inputs
    });

    // ---- SHUTDOWN ----

    let report = match result {
        Ok(r) => r,
        Err(e) => {
            error!("Planning failed: {}", e);
            session.exit();
            return Err(e).wrap_err("The goal could not be reached");
        }
    };

    info!(
        "Goal reached in {} cycles ({:.2} s of motion), final pose {:?}",
        report.num_cycles,
        report.num_cycles as f64 * timestep_s,
        report.final_pose
    );

    session.save("history.json", report.history);

    session.exit();

    info!("End of execution");

    Ok(())
}
