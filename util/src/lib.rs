//! Utility library for the SMPC planner workspace

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod archive;
pub mod host;
pub mod logger;
pub mod params;
pub mod session;
pub mod time;
