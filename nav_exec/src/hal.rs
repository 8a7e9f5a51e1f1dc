//! # Hardware abstraction
//!
//! Traits describing the hardware the navigation software drives: the wheel
//! encoders, the drive motors, the ranging sensor and the two line sensors.
//! The physical robot and the simulator both implement these, so the
//! estimation and control code is written once against the traits.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cumulative rotation of each drive wheel.
///
/// Tallies are in degrees of wheel rotation and are never reset while the
/// robot runs.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderSnapshot {
    pub left_ticks: i64,
    pub right_ticks: i64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Mounting side of a sensor or wheel, as seen looking along the robot's
/// heading.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

/// Errors which can be raised by a hardware device.
#[derive(Debug, Error)]
pub enum HalError {
    #[error("The {0} is not connected")]
    NotConnected(&'static str),

    #[error("Could not read from the {device}: {reason}")]
    ReadFailed {
        device: &'static str,
        reason: String,
    },

    #[error("The {device} rejected the command: {reason}")]
    CommandRejected {
        device: &'static str,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Drive wheel rotation encoders.
pub trait Encoders {
    /// Read the current cumulative tallies of both wheels.
    fn read_ticks(&mut self) -> Result<EncoderSnapshot, HalError>;
}

/// The two drive motors of the robot.
///
/// Positive speeds drive the wheel forwards.
pub trait DriveMotors {
    /// Set continuous wheel speeds in degrees per second.
    ///
    /// Cancels any pending [`DriveMotors::rotate`] target.
    fn set_speeds(&mut self, left_degs: f64, right_degs: f64) -> Result<(), HalError>;

    /// Rotate each wheel by the given angle in degrees at the given speed,
    /// blocking until both wheels have finished.
    fn rotate(&mut self, left_deg: f64, right_deg: f64, speed_degs: f64)
        -> Result<(), HalError>;

    /// Stop both wheels.
    fn stop(&mut self) -> Result<(), HalError> {
        self.set_speeds(0.0, 0.0)
    }
}

/// A distance sensor pointing along the robot's heading.
pub trait RangeSensor {
    /// Fetch the distance to the nearest obstacle, in centimeters.
    fn fetch_range_cm(&mut self) -> Result<f64, HalError>;
}

/// A downward facing reflectance sensor.
pub trait LineSensor {
    /// Fetch the reflected light intensity in percent, dark surfaces give low
    /// values.
    fn fetch_reflectance(&mut self) -> Result<f64, HalError>;
}
