//! Motion controller state and primitives

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};
use nalgebra::Vector2;
use std::thread;
use std::time::Duration;

// Internal
use super::Params;
use crate::geometry::RobotGeometry;
use crate::hal::{DriveMotors, HalError};
use crate::pose::{Pose, PoseStore};
use util::maths::{get_ang_dist_2pi, map_pi_to_2pi, wrap_360};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Drives the robot using the pose estimate held in a [`PoseStore`].
pub struct MotionController<M> {
    params: Params,

    geometry: RobotGeometry,

    store: PoseStore,

    motors: M,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur while controlling motion.
#[derive(Debug, thiserror::Error)]
pub enum NavError {
    #[error("Could not command the drive motors: {0}")]
    MotorError(#[from] HalError),

    #[error("Invalid {0} target: {1}")]
    InvalidTarget(&'static str, f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M: DriveMotors> MotionController<M> {
    /// Create a new controller driving `motors` from the pose in `store`.
    pub fn new(params: Params, geometry: RobotGeometry, store: PoseStore, motors: M) -> Self {
        Self {
            params,
            geometry,
            store,
            motors,
        }
    }

    /// The store this controller reads the pose from.
    pub fn store(&self) -> &PoseStore {
        &self.store
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn motors(&self) -> &M {
        &self.motors
    }

    /// Current pose estimate.
    pub fn pose(&self) -> Pose {
        self.store.get()
    }

    /// Command continuous wheel speeds, in degrees per second.
    pub fn set_speeds(&mut self, left_degs: f64, right_degs: f64) -> Result<(), NavError> {
        self.motors.set_speeds(left_degs, right_degs)?;
        Ok(())
    }

    /// Drive both wheels forwards at the given speed.
    pub fn forward(&mut self, speed_degs: f64) -> Result<(), NavError> {
        self.set_speeds(speed_degs, speed_degs)
    }

    pub fn stop(&mut self) -> Result<(), NavError> {
        self.motors.stop()?;
        Ok(())
    }

    /// Rotate in place to the given absolute heading in degrees, taking the
    /// shorter direction.
    ///
    /// Closed loop: the heading is polled until the error is within
    /// `heading_tolerance_deg`, the robot stopped, and after `settle_ms` the
    /// error checked again. Motion carried past the stop command which leaves
    /// the heading out of tolerance is corrected by another rotation.
    pub fn rotate_to(&mut self, target_deg: f64) -> Result<(), NavError> {
        check_finite("heading", target_deg)?;

        let target_deg = wrap_360(target_deg);
        let tol_deg = self.params.heading_tolerance_deg;
        let speed = self.params.rotate_speed_degs;

        debug!(
            "Rotating from {:.2} deg to {:.2} deg",
            self.pose().heading_deg(),
            target_deg
        );

        loop {
            // Last commanded direction of rotation, 1 for counter-clockwise,
            // -1 for clockwise
            let mut direction = 0.0;

            loop {
                let error_deg = heading_error_deg(self.pose().heading_deg(), target_deg);

                if error_deg.abs() <= tol_deg {
                    break;
                }

                let dir = error_deg.signum();
                if dir != direction {
                    self.set_speeds(-dir * speed, dir * speed)?;
                    direction = dir;
                }

                self.poll_sleep();
            }

            self.stop()?;
            thread::sleep(Duration::from_millis(self.params.settle_ms));

            let error_deg = heading_error_deg(self.pose().heading_deg(), target_deg);
            if error_deg.abs() <= tol_deg {
                trace!("Rotation complete, error {:.3} deg", error_deg);
                return Ok(());
            }

            debug!(
                "Heading error {:.3} deg after settling, correcting",
                error_deg
            );
        }
    }

    /// Turn in place by a relative angle in degrees, counter-clockwise
    /// positive.
    ///
    /// Open loop: both wheels are rotated by the angle computed from the
    /// robot's geometry, the pose is not consulted.
    pub fn turn_by(&mut self, angle_deg: f64) -> Result<(), NavError> {
        check_finite("turn", angle_deg)?;

        let wheel_deg = self.geometry.turn_to_wheel_deg(angle_deg);

        trace!("Turning by {:.2} deg ({:.1} deg of wheel)", angle_deg, wheel_deg);

        self.motors
            .rotate(-wheel_deg, wheel_deg, self.params.rotate_speed_degs)?;

        Ok(())
    }

    /// Drive straight by the given distance in centimeters, negative values
    /// reversing.
    ///
    /// Open loop: both wheels are rotated by the angle computed from the wheel
    /// radius, the pose is not consulted.
    pub fn drive_distance(&mut self, distance_cm: f64) -> Result<(), NavError> {
        check_finite("distance", distance_cm)?;

        let wheel_deg = self.geometry.cm_to_wheel_deg(distance_cm);

        trace!("Driving {:.2} cm ({:.1} deg of wheel)", distance_cm, wheel_deg);

        self.motors
            .rotate(wheel_deg, wheel_deg, self.params.forward_speed_degs)?;

        Ok(())
    }

    /// Drive to the given point in the field frame.
    ///
    /// The robot rotates to face the point, then drives forwards polling the
    /// pose until it is within `position_tolerance_cm` of the point on both
    /// axes. If the heading deviates from the bearing to the point by more
    /// than `heading_correction_deg`, which includes driving past the point,
    /// the robot stops and re-aims.
    pub fn drive_to(&mut self, x_cm: f64, y_cm: f64) -> Result<(), NavError> {
        check_finite("x", x_cm)?;
        check_finite("y", y_cm)?;

        let target = Vector2::new(x_cm, y_cm);

        debug!("Driving from {} to ({:.2} cm, {:.2} cm)", self.pose(), x_cm, y_cm);

        'aim: loop {
            let pose = self.pose();
            if self.within_tolerance(&pose, &target) {
                break;
            }

            self.rotate_to(bearing_deg(&pose.position(), &target))?;
            self.forward(self.params.forward_speed_degs)?;

            loop {
                self.poll_sleep();

                let pose = self.pose();
                if self.within_tolerance(&pose, &target) {
                    break 'aim;
                }

                let deviation_deg = heading_error_deg(
                    pose.heading_deg(),
                    bearing_deg(&pose.position(), &target),
                );
                if deviation_deg.abs() > self.params.heading_correction_deg {
                    debug!(
                        "Heading deviates from bearing by {:.2} deg, re-aiming",
                        deviation_deg
                    );
                    self.stop()?;
                    continue 'aim;
                }
            }
        }

        self.stop()?;

        trace!("Arrived at {}", self.pose());

        Ok(())
    }

    /// Drive through each point of the path in turn.
    pub fn drive_path(&mut self, waypoints: &[(f64, f64)]) -> Result<(), NavError> {
        for (i, &(x, y)) in waypoints.iter().enumerate() {
            info!(
                "Driving to waypoint {} of {}: ({:.2} cm, {:.2} cm)",
                i + 1,
                waypoints.len(),
                x,
                y
            );
            self.drive_to(x, y)?;
        }

        Ok(())
    }

    fn within_tolerance(&self, pose: &Pose, target: &Vector2<f64>) -> bool {
        let tol = self.params.position_tolerance_cm;

        (target[0] - pose.x_cm).abs() <= tol && (target[1] - pose.y_cm).abs() <= tol
    }

    fn poll_sleep(&self) {
        thread::sleep(Duration::from_millis(self.params.poll_interval_ms));
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Signed shortest rotation in degrees from `current_deg` to `target_deg`,
/// counter-clockwise positive, in the range [-180, 180].
pub fn heading_error_deg(current_deg: f64, target_deg: f64) -> f64 {
    get_ang_dist_2pi(current_deg.to_radians(), target_deg.to_radians()).to_degrees()
}

/// Heading in degrees, range [0, 360), pointing from `from` towards `to`.
pub fn bearing_deg(from: &Vector2<f64>, to: &Vector2<f64>) -> f64 {
    let d = to - from;

    wrap_360(map_pi_to_2pi(d[1].atan2(d[0])).to_degrees())
}

fn check_finite(what: &'static str, value: f64) -> Result<(), NavError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(NavError::InvalidTarget(what, value))
    }
}
