//! Physical geometry of the robot's drive train.
//!
//! All conversions between wheel rotation and body motion live here so that
//! odometry and motion control always agree on them.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drive train dimensions, loaded from `geometry.toml`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotGeometry {
    /// Radius of the drive wheels.
    ///
    /// Units: centimeters
    pub wheel_radius_cm: f64,

    /// Distance between the contact points of the two drive wheels.
    ///
    /// Units: centimeters
    pub wheel_base_cm: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RobotGeometry {
    /// Ground distance travelled by a wheel turning through the given angle.
    pub fn wheel_deg_to_cm(&self, wheel_deg: f64) -> f64 {
        PI * self.wheel_radius_cm * wheel_deg / 180.0
    }

    /// Wheel rotation needed to travel the given ground distance.
    pub fn cm_to_wheel_deg(&self, distance_cm: f64) -> f64 {
        180.0 * distance_cm / (PI * self.wheel_radius_cm)
    }

    /// Wheel rotation needed for each wheel, driven in opposite directions,
    /// to turn the robot in place by the given angle.
    pub fn turn_to_wheel_deg(&self, angle_deg: f64) -> f64 {
        self.cm_to_wheel_deg(PI * self.wheel_base_cm * angle_deg / 360.0)
    }
}
