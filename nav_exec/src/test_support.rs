//! Fakes shared by the unit tests.

use crate::{
    geometry::RobotGeometry,
    hal::{DriveMotors, HalError},
    nav::{self, MotionController},
    pose::{Pose, PoseStore},
};

pub const GEOM: RobotGeometry = RobotGeometry {
    wheel_radius_cm: 2.1,
    wheel_base_cm: 13.8,
};

/// Motor command recorded by [`RecordingMotors`].
#[derive(Debug, PartialEq)]
pub enum Cmd {
    Speeds(f64, f64),
    Rotate(f64, f64, f64),
}

/// Motors which record every command and move nothing.
#[derive(Default)]
pub struct RecordingMotors {
    pub cmds: Vec<Cmd>,
}

impl DriveMotors for RecordingMotors {
    fn set_speeds(&mut self, left_degs: f64, right_degs: f64) -> Result<(), HalError> {
        self.cmds.push(Cmd::Speeds(left_degs, right_degs));
        Ok(())
    }

    fn rotate(&mut self, left_deg: f64, right_deg: f64, speed_degs: f64) -> Result<(), HalError> {
        self.cmds.push(Cmd::Rotate(left_deg, right_deg, speed_degs));
        Ok(())
    }
}

pub fn nav_params() -> nav::Params {
    nav::Params {
        forward_speed_degs: 200.0,
        rotate_speed_degs: 100.0,
        heading_tolerance_deg: 1.0,
        position_tolerance_cm: 1.0,
        heading_correction_deg: 5.0,
        poll_interval_ms: 1,
        settle_ms: 0,
    }
}

/// A controller over recording motors, starting at `pose`.
pub fn recording_nav(pose: Pose) -> MotionController<RecordingMotors> {
    MotionController::new(
        nav_params(),
        GEOM,
        PoseStore::new(pose),
        RecordingMotors::default(),
    )
}
