//! Vehicle interface used by the planning loop

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;

use super::CycleOutput;
use crate::loc::Pose;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which can execute the planner's commands.
pub trait Vehicle {
    /// Execute the cycle's command and return the new pose estimate.
    fn execute(&mut self, output: &CycleOutput) -> Pose;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An ideal vehicle which always arrives exactly at the commanded pose.
#[derive(Debug, Clone)]
pub struct CommandedPoseVehicle {
    pub pose: Pose,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl CommandedPoseVehicle {
    pub fn new(pose: Pose) -> Self {
        Self { pose }
    }
}

impl Vehicle for CommandedPoseVehicle {
    fn execute(&mut self, output: &CycleOutput) -> Pose {
        trace!(
            "Vehicle moving from {:?} to {:?}",
            self.pose,
            output.commanded_pose
        );
        self.pose = output.commanded_pose;
        self.pose
    }
}
