//! Motion control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the motion controller
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Wheel speed used when driving forwards.
    ///
    /// Units: degrees/second
    pub forward_speed_degs: f64,

    /// Wheel speed used when rotating in place.
    ///
    /// Units: degrees/second
    pub rotate_speed_degs: f64,

    /// Heading error below which a rotation is complete.
    ///
    /// Units: degrees
    pub heading_tolerance_deg: f64,

    /// Per-axis position error below which a point is reached.
    ///
    /// Units: centimeters
    pub position_tolerance_cm: f64,

    /// Deviation from the bearing to the target above which the robot stops
    /// and re-aims while driving to a point.
    ///
    /// Units: degrees
    pub heading_correction_deg: f64,

    /// Interval at which closed-loop primitives poll the pose.
    ///
    /// Units: milliseconds
    pub poll_interval_ms: u64,

    /// Time to wait after stopping a rotation before re-checking the heading.
    ///
    /// Units: milliseconds
    pub settle_ms: u64,
}
