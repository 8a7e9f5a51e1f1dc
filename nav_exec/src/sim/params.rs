//! Simulation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// Internal
use crate::pose::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the simulated robot and field, loaded from `sim.toml`.
///
/// The sensor mounting given here is the physical truth, the localisation
/// parameters hold the robot's own belief about it.
#[derive(Deserialize, Debug, Clone)]
pub struct Params {
    /// Start position along the wall on the robot's right in its corner.
    ///
    /// Units: centimeters
    pub start_x_cm: f64,

    /// Start position along the wall behind the robot in its corner.
    ///
    /// Units: centimeters
    pub start_y_cm: f64,

    /// Start heading relative to the wall on the robot's right.
    ///
    /// Units: degrees
    pub start_heading_deg: f64,

    /// Largest distance the range sensor reports.
    ///
    /// Units: centimeters
    pub range_max_cm: f64,

    /// Width of the grid lines.
    ///
    /// Units: centimeters
    pub line_width_cm: f64,

    /// Reflectance read over a grid line.
    ///
    /// Units: percent
    pub line_reflectance: f64,

    /// Reflectance read over bare floor.
    ///
    /// Units: percent
    pub floor_reflectance: f64,

    /// Lateral distance between the line sensors.
    ///
    /// Units: centimeters
    pub sensor_track_cm: f64,

    /// Distance the line sensors sit ahead of the wheel axle.
    ///
    /// Units: centimeters
    pub sensor_offset_cm: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {
    /// Start pose relative to the starting corner's walls.
    pub fn start_pose_local(&self) -> Pose {
        Pose::from_deg(self.start_x_cm, self.start_y_cm, self.start_heading_deg)
    }
}
