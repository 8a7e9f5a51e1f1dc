//! # Simulated robot
//!
//! A kinematic simulation of the robot in its field, implementing the
//! hardware traits. The drive base is integrated lazily: every access first
//! advances the model by the wall-clock time elapsed since the previous one,
//! so the simulated robot moves in real time without a thread of its own.
//!
//! The model is exact, the wheels never slip and the sensors are noiseless,
//! so the only errors left are those the estimation code itself introduces.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
mod world;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// Internal
use crate::field::Field;
use crate::geometry::RobotGeometry;
use crate::hal::{DriveMotors, EncoderSnapshot, Encoders, HalError, LineSensor, RangeSensor, Side};
use crate::pose::Pose;
pub use params::Params;
use world::SimWorld;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Interval at which a blocking rotation checks whether the wheels have
/// reached their targets.
const ROTATE_POLL_INTERVAL: Duration = Duration::from_millis(1);

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to the simulated robot.
///
/// Clones share the same simulated world, each device handle holds one.
#[derive(Clone)]
pub struct SimRobot {
    world: Arc<Mutex<SimWorld>>,
}

pub struct SimEncoders(SimRobot);

pub struct SimMotors(SimRobot);

pub struct SimRangeSensor(SimRobot);

pub struct SimLineSensor {
    robot: SimRobot,
    side: Side,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimRobot {
    /// Create a new simulation with the robot stationary at `start`, in the
    /// field frame.
    pub fn new(params: Params, field: Field, geometry: RobotGeometry, start: Pose) -> Self {
        Self {
            world: Arc::new(Mutex::new(SimWorld::new(params, field, geometry, start))),
        }
    }

    /// The true pose of the robot.
    pub fn true_pose(&self) -> Result<Pose, HalError> {
        self.with_world(|w| w.pose)
    }

    pub fn encoders(&self) -> SimEncoders {
        SimEncoders(self.clone())
    }

    pub fn motors(&self) -> SimMotors {
        SimMotors(self.clone())
    }

    pub fn range_sensor(&self) -> SimRangeSensor {
        SimRangeSensor(self.clone())
    }

    pub fn line_sensor(&self, side: Side) -> SimLineSensor {
        SimLineSensor {
            robot: self.clone(),
            side,
        }
    }

    /// Advance the world to now and then access it.
    fn with_world<T, F>(&self, f: F) -> Result<T, HalError>
    where
        F: FnOnce(&mut SimWorld) -> T,
    {
        let mut world = self
            .world
            .lock()
            .map_err(|_| HalError::NotConnected("simulator"))?;

        world.advance();

        Ok(f(&mut world))
    }
}

impl Encoders for SimEncoders {
    fn read_ticks(&mut self) -> Result<EncoderSnapshot, HalError> {
        self.0.with_world(|w| w.ticks())
    }
}

impl DriveMotors for SimMotors {
    fn set_speeds(&mut self, left_degs: f64, right_degs: f64) -> Result<(), HalError> {
        if !left_degs.is_finite() || !right_degs.is_finite() {
            return Err(HalError::CommandRejected {
                device: "drive motors",
                reason: format!("non-finite speeds ({}, {})", left_degs, right_degs),
            });
        }

        self.0.with_world(|w| {
            w.left.set_speed(left_degs);
            w.right.set_speed(right_degs);
        })
    }

    fn rotate(&mut self, left_deg: f64, right_deg: f64, speed_degs: f64) -> Result<(), HalError> {
        if !left_deg.is_finite() || !right_deg.is_finite() {
            return Err(HalError::CommandRejected {
                device: "drive motors",
                reason: format!("non-finite rotation ({}, {})", left_deg, right_deg),
            });
        }
        if !(speed_degs.is_finite() && speed_degs.abs() > 0.0) {
            return Err(HalError::CommandRejected {
                device: "drive motors",
                reason: format!("cannot rotate at {} deg/s", speed_degs),
            });
        }

        self.0.with_world(|w| {
            w.left.set_target(left_deg, speed_degs);
            w.right.set_target(right_deg, speed_degs);
        })?;

        loop {
            let done = self
                .0
                .with_world(|w| w.left.target_deg.is_none() && w.right.target_deg.is_none())?;

            if done {
                return Ok(());
            }

            thread::sleep(ROTATE_POLL_INTERVAL);
        }
    }
}

impl RangeSensor for SimRangeSensor {
    fn fetch_range_cm(&mut self) -> Result<f64, HalError> {
        self.0.with_world(|w| w.range_cm())
    }
}

impl LineSensor for SimLineSensor {
    fn fetch_reflectance(&mut self) -> Result<f64, HalError> {
        let side = self.side;
        self.robot.with_world(|w| w.reflectance(side))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    fn robot() -> SimRobot {
        SimRobot::new(
            Params {
                start_x_cm: 15.0,
                start_y_cm: 15.0,
                start_heading_deg: 45.0,
                range_max_cm: 255.0,
                line_width_cm: 1.0,
                line_reflectance: 20.0,
                floor_reflectance: 60.0,
                sensor_track_cm: 11.6,
                sensor_offset_cm: 5.35,
            },
            Field {
                tile_size_cm: 30.48,
                size_tiles: 12,
            },
            RobotGeometry {
                wheel_radius_cm: 2.1,
                wheel_base_cm: 13.8,
            },
            Pose::from_deg(50.0, 50.0, 0.0),
        )
    }

    #[test]
    fn test_blocking_rotate() {
        let robot = robot();
        let mut motors = robot.motors();

        motors.rotate(720.0, 720.0, 1440.0).unwrap();

        let ticks = robot.encoders().read_ticks().unwrap();
        assert_eq!(ticks.left_ticks, 720);
        assert_eq!(ticks.right_ticks, 720);

        let pose = robot.true_pose().unwrap();
        assert_relative_eq!(pose.x_cm, 50.0 + 4.0 * std::f64::consts::PI * 2.1, epsilon = 1e-6);
    }

    #[test]
    fn test_set_speeds_then_stop() {
        let robot = robot();
        let mut motors = robot.motors();

        motors.set_speeds(-300.0, 300.0).unwrap();
        thread::sleep(Duration::from_millis(20));
        motors.stop().unwrap();

        let heading = robot.true_pose().unwrap().heading_rad;
        assert!(heading > 0.0 && heading < 1.0);

        thread::sleep(Duration::from_millis(10));
        assert_eq!(robot.true_pose().unwrap().heading_rad, heading);
    }

    #[test]
    fn test_rejects_bad_commands() {
        let robot = robot();
        let mut motors = robot.motors();

        assert!(matches!(
            motors.rotate(90.0, 90.0, 0.0),
            Err(HalError::CommandRejected { .. })
        ));
        assert!(matches!(
            motors.set_speeds(f64::NAN, 0.0),
            Err(HalError::CommandRejected { .. })
        ));
    }

    #[test]
    fn test_sensors() {
        let robot = robot();

        // Facing +X from x = 50 the far wall is beyond range
        assert_eq!(robot.range_sensor().fetch_range_cm().unwrap(), 255.0);
        assert_eq!(robot.line_sensor(Side::Left).fetch_reflectance().unwrap(), 60.0);
    }
}
