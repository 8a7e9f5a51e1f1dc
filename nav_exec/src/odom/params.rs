//! Odometry parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the odometry integrator
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Period of the integration cycle.
    ///
    /// Units: milliseconds
    pub period_ms: u64,

    /// Number of consecutive failed encoder reads after which the integrator
    /// gives up.
    pub max_consec_read_errors: u64,

    /// If true every integrated pose is written to the session archive.
    pub archive_poses: bool,
}
