//! Localisation parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the rotational wall scan, loaded from `scan_loc.toml`.
#[derive(Deserialize, Debug, Clone)]
pub struct ScanParams {
    /// Which edge sequence to scan for.
    pub mode: ScanMode,

    /// Wheel speed while scanning, the wheels turn in opposite directions.
    ///
    /// Units: degrees/second
    pub rotate_speed_degs: f64,

    /// Distance at the centre of the wall detection band.
    ///
    /// Units: centimeters
    pub band_centre_cm: f64,

    /// Half width of the wall detection band.
    ///
    /// Units: centimeters
    pub bandwidth_cm: f64,

    /// Range readings above this are clamped to it.
    ///
    /// Units: centimeters
    pub max_range_cm: f64,

    /// Number of consecutive samples needed to confirm a wall or an absence
    /// of wall.
    pub confirm_samples: usize,

    /// Turn made before scanning if the robot starts facing a wall,
    /// counter-clockwise positive.
    ///
    /// Units: degrees
    pub pre_turn_deg: f64,

    /// Interval between range samples.
    ///
    /// Units: milliseconds
    pub poll_interval_ms: u64,

    /// Longest time to wait for any one edge before giving up. If not given
    /// the scan waits for each edge indefinitely.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub edge_timeout_ms: Option<u64>,
}

/// Parameters for the line crossing correction, loaded from `line_loc.toml`.
#[derive(Deserialize, Debug, Clone)]
pub struct LineParams {
    /// Reflectance below which a sensor is over a line.
    ///
    /// Units: percent
    pub black_line_threshold: f64,

    /// Lateral distance between the two line sensors.
    ///
    /// Units: centimeters
    pub sensor_track_cm: f64,

    /// Distance the line sensors sit ahead of the wheel axle.
    ///
    /// Units: centimeters
    pub sensor_offset_cm: f64,

    /// Wheel speed while searching for a line.
    ///
    /// Units: degrees/second
    pub forward_speed_degs: f64,

    /// Interval between line sensor samples.
    ///
    /// Units: milliseconds
    pub poll_interval_ms: u64,

    /// Longest time to drive looking for a line before giving up. If not
    /// given the robot drives until it finds one.
    ///
    /// Units: milliseconds
    #[serde(default)]
    pub line_timeout_ms: Option<u64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Edge sequence used by the rotational wall scan.
#[derive(Deserialize, Serialize, Debug, Copy, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    /// Start facing away from the walls and latch the angles at which each
    /// wall comes into view.
    FallingEdge,

    /// Start facing a wall and latch the angles at which each wall leaves
    /// view.
    RisingEdge,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "falling_edge" | "falling" => Ok(ScanMode::FallingEdge),
            "rising_edge" | "rising" => Ok(ScanMode::RisingEdge),
            _ => Err(format!(
                "Unknown scan mode \"{}\", expected falling_edge or rising_edge",
                s
            )),
        }
    }
}
