//! # Localisation module
//!
//! Localisation bootstraps and corrects the pose estimate against the field's
//! landmarks in two stages:
//!
//! 1. [`DistanceScanLocalizer`]: the robot rotates in place in its starting
//!    corner, latching the headings at which the two walls come into view of
//!    the range sensor. The bisector of the two gives the heading relative to
//!    the walls, the robot turns to face along the wall on its right and the
//!    corner becomes the origin.
//! 1. [`LineCrossingLocalizer`]: the robot drives forwards until both line
//!    sensors have crossed a grid line. The difference between the positions
//!    at which each sensor crossed gives the angle between the robot and the
//!    line, which is turned out before the robot advances onto the line. This
//!    is done once along each axis, leaving the robot on the grid intersection
//!    nearest the corner, where the supplied starting pose is applied.
//!
//! Both stages drive the robot through a
//! [`MotionController`](crate::nav::MotionController) and write their
//! corrections into its [`PoseStore`](crate::pose::PoseStore).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod edge;
pub mod line;
pub mod params;
pub mod scan;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::info;
use serde::Serialize;

// Internal
use crate::hal::{DriveMotors, HalError, LineSensor, RangeSensor};
use crate::nav::{MotionController, NavError};
use crate::pose::Pose;

pub use edge::{RangeClass, ScanSample, WallEdgeDetector};
pub use line::{LineCrossingLocalizer, LinePass, LineReport, TravelAxis};
pub use params::{LineParams, ScanMode, ScanParams};
pub use scan::{starting_angle_deg, DistanceScanLocalizer, ScanReport};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Runs both localisation stages in sequence.
pub struct Localization<R, L> {
    pub scan: DistanceScanLocalizer<R>,
    pub line: LineCrossingLocalizer<L>,
}

/// Outcome of a full localisation, saved to the session.
#[derive(Debug, Clone, Serialize)]
pub struct LocReport {
    pub scan: ScanReport,
    pub line: LineReport,

    /// Pose written to the store at the end of localisation
    pub final_pose: Pose,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during localisation.
#[derive(Debug, thiserror::Error)]
pub enum LocError {
    #[error("Sensor error: {0}")]
    SensorError(#[from] HalError),

    #[error("Motion error: {0}")]
    NavError(#[from] NavError),

    #[error("The {0:?} scan mode is not supported")]
    ModeNotSupported(ScanMode),

    #[error("No {0:?} edge was confirmed within {1} ms")]
    EdgeTimeout(RangeClass, u64),

    #[error("Both line sensors did not cross a line within {0} ms")]
    LineTimeout(u64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<R: RangeSensor, L: LineSensor> Localization<R, L> {
    pub fn new(scan: DistanceScanLocalizer<R>, line: LineCrossingLocalizer<L>) -> Self {
        Self { scan, line }
    }

    /// Run the wall scan then the line crossing correction.
    ///
    /// If `start` is given the final pose is expressed relative to it,
    /// otherwise the grid intersection nearest the corner is the origin.
    pub fn localize<M: DriveMotors>(
        &mut self,
        nav: &mut MotionController<M>,
        start: Option<Pose>,
    ) -> Result<LocReport, LocError> {
        info!("Localising, scan mode {:?}", self.scan.mode());

        let scan = self.scan.localize(nav)?;
        let line = self.line.localize(nav, start)?;

        let final_pose = nav.pose();

        info!("Localisation complete, pose {}", final_pose);

        Ok(LocReport {
            scan,
            line,
            final_pose,
        })
    }

    /// Square up on the next grid line ahead and snap the pose to it.
    pub fn correct_at_line<M: DriveMotors>(
        &mut self,
        nav: &mut MotionController<M>,
    ) -> Result<LinePass, LocError> {
        self.line.correct_at_line(nav)
    }
}
