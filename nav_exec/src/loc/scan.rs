//! Rotational wall scan
//!
//! Only the falling edge sequence is implemented. The rising edge sequence,
//! starting on a wall and latching the angles at which the walls leave view,
//! is accepted by the parameters but rejected at run time until its angle
//! conventions are established.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use super::{
    edge::{RangeClass, WallEdgeDetector},
    params::{ScanMode, ScanParams},
    LocError,
};
use crate::hal::{DriveMotors, RangeSensor};
use crate::nav::MotionController;
use crate::pose::Pose;
use util::maths::wrap_360;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Finds the robot's heading relative to the corner walls with a range
/// sensor.
pub struct DistanceScanLocalizer<R> {
    params: ScanParams,

    sensor: R,

    detector: WallEdgeDetector,
}

/// Angles measured by a scan, all in the odometry frame before correction
/// unless noted.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct ScanReport {
    pub mode: ScanMode,

    /// Heading at which the first wall was confirmed
    pub angle_a_deg: f64,

    /// Heading at which the second wall was confirmed
    pub angle_b_deg: f64,

    /// Offset from the odometry heading to the heading relative to the walls
    pub bisector_deg: f64,

    /// Heading after the correction, relative to the walls
    pub corrected_heading_deg: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<R: RangeSensor> DistanceScanLocalizer<R> {
    pub fn new(params: ScanParams, sensor: R) -> Self {
        let detector = WallEdgeDetector::from_params(&params);

        Self {
            params,
            sensor,
            detector,
        }
    }

    pub fn mode(&self) -> ScanMode {
        self.params.mode
    }

    /// Scan for the corner walls, then face along the wall on the robot's
    /// right and reset the pose to the corner origin with that heading.
    ///
    /// The motors are stopped if the scan fails part way.
    pub fn localize<M: DriveMotors>(
        &mut self,
        nav: &mut MotionController<M>,
    ) -> Result<ScanReport, LocError> {
        let res = match self.params.mode {
            ScanMode::FallingEdge => self.falling_edge(nav),
            ScanMode::RisingEdge => self.rising_edge(nav),
        };

        if res.is_err() {
            if let Err(e) = nav.stop() {
                warn!("Could not stop the motors after a failed scan: {}", e);
            }
        }

        res
    }

    fn falling_edge<M: DriveMotors>(
        &mut self,
        nav: &mut MotionController<M>,
    ) -> Result<ScanReport, LocError> {
        let speed = self.params.rotate_speed_degs;

        // The scan must start facing away from the walls
        let range_cm = self.sensor.fetch_range_cm()?;
        if self.detector.sees_wall(range_cm) {
            debug!("Facing a wall at {:.1} cm, turning away", range_cm);
            nav.turn_by(self.params.pre_turn_deg)?;
        }

        // Clockwise until the first wall comes into view
        nav.set_speeds(speed, -speed)?;
        self.wait_for(RangeClass::NoWall)?;
        self.wait_for(RangeClass::Wall)?;
        let angle_a_deg = nav.pose().heading_deg();
        nav.stop()?;

        debug!("First wall at {:.2} deg", angle_a_deg);

        // Back counter-clockwise, past the first wall, to the second
        nav.set_speeds(-speed, speed)?;
        self.wait_for(RangeClass::NoWall)?;
        self.wait_for(RangeClass::Wall)?;
        let angle_b_deg = nav.pose().heading_deg();
        nav.stop()?;

        debug!("Second wall at {:.2} deg", angle_b_deg);

        let bisector_deg = starting_angle_deg(angle_a_deg, angle_b_deg);

        // Face along the wall on the right, which is -bisector in the
        // odometry frame
        nav.rotate_to(wrap_360(-bisector_deg))?;

        // Read and reset under one lock
        let corrected_heading_deg = nav
            .store()
            .update(|p| *p = Pose::from_deg(0.0, 0.0, p.heading_deg() + bisector_deg))
            .heading_deg();

        info!(
            "Wall scan complete: A = {:.2} deg, B = {:.2} deg, offset {:.2} deg, heading now {:.2} deg",
            angle_a_deg, angle_b_deg, bisector_deg, corrected_heading_deg
        );

        Ok(ScanReport {
            mode: ScanMode::FallingEdge,
            angle_a_deg,
            angle_b_deg,
            bisector_deg,
            corrected_heading_deg,
        })
    }

    fn rising_edge<M: DriveMotors>(
        &mut self,
        _nav: &mut MotionController<M>,
    ) -> Result<ScanReport, LocError> {
        // TODO: implement once the sign of the latched angles relative to the
        // walls is established on the robot.
        warn!("Rising edge scan requested but it is not supported");

        Err(LocError::ModeNotSupported(ScanMode::RisingEdge))
    }

    /// Sample the range sensor until `class` is confirmed by fresh readings.
    fn wait_for(&mut self, class: RangeClass) -> Result<(), LocError> {
        let poll = Duration::from_millis(self.params.poll_interval_ms);
        let timeout = self.params.edge_timeout_ms;
        let start = Instant::now();

        self.detector.reset();

        loop {
            let sample = self.detector.push(self.sensor.fetch_range_cm()?);

            if self.detector.confirmed(class) {
                trace!("{:?} confirmed at {:.1} cm", class, sample.range_cm);
                return Ok(());
            }

            if let Some(ms) = timeout {
                if start.elapsed() > Duration::from_millis(ms) {
                    return Err(LocError::EdgeTimeout(class, ms));
                }
            }

            thread::sleep(poll);
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Offset in degrees from the odometry heading to the heading relative to the
/// walls, given the headings at which the first (clockwise) and second
/// (counter-clockwise) walls were confirmed.
///
/// The two angles are symmetric about the direction pointing diagonally out
/// of the corner, at 45 degrees relative to the walls. If `a_deg` is greater
/// than `b_deg` the sweep between them crossed zero and their mean points
/// into the corner instead, hence the extra half turn.
pub fn starting_angle_deg(a_deg: f64, b_deg: f64) -> f64 {
    let mean = 0.5 * (a_deg + b_deg);

    if a_deg <= b_deg {
        wrap_360(45.0 - mean)
    } else {
        wrap_360(225.0 - mean)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        hal::HalError,
        test_support::{recording_nav, Cmd, GEOM},
    };
    use approx::assert_relative_eq;

    #[test]
    fn test_starting_angle() {
        assert_relative_eq!(starting_angle_deg(30.0, 60.0), 0.0);
        assert_relative_eq!(starting_angle_deg(200.0, 100.0), 75.0);

        // Walls at -19.5 and 109.5 deg relative to the corner, for a range of
        // odometry offsets
        for &offset in [0.0, 37.0, 100.0, 181.0, 260.0, 359.0].iter() {
            let a = wrap_360(340.5 - offset);
            let b = wrap_360(109.5 - offset);

            assert_relative_eq!(
                wrap_360(starting_angle_deg(a, b) - offset + 0.5) - 0.5,
                0.0,
                epsilon = 1e-9
            );
        }
    }

    struct FixedRange(f64);

    impl RangeSensor for FixedRange {
        fn fetch_range_cm(&mut self) -> Result<f64, HalError> {
            Ok(self.0)
        }
    }

    fn params(mode: ScanMode) -> ScanParams {
        ScanParams {
            mode,
            rotate_speed_degs: 50.0,
            band_centre_cm: 50.0,
            bandwidth_cm: 5.0,
            max_range_cm: 60.0,
            confirm_samples: 3,
            pre_turn_deg: -45.0,
            poll_interval_ms: 1,
            edge_timeout_ms: Some(20),
        }
    }

    #[test]
    fn test_rising_edge_not_supported() {
        let mut loc = DistanceScanLocalizer::new(params(ScanMode::RisingEdge), FixedRange(255.0));

        assert!(matches!(
            loc.localize(&mut recording_nav(Pose::default())),
            Err(LocError::ModeNotSupported(ScanMode::RisingEdge))
        ));
    }

    #[test]
    fn test_no_wall_times_out() {
        // The robot never turns, so the open field is all it ever sees
        let mut loc = DistanceScanLocalizer::new(params(ScanMode::FallingEdge), FixedRange(255.0));

        assert!(matches!(
            loc.localize(&mut recording_nav(Pose::default())),
            Err(LocError::EdgeTimeout(RangeClass::Wall, 20))
        ));
    }

    #[test]
    fn test_turns_away_from_wall_then_scans_clockwise() {
        let mut loc = DistanceScanLocalizer::new(params(ScanMode::FallingEdge), FixedRange(20.0));
        let mut nav = recording_nav(Pose::default());

        assert!(matches!(
            loc.localize(&mut nav),
            Err(LocError::EdgeTimeout(RangeClass::NoWall, 20))
        ));

        let w = GEOM.turn_to_wheel_deg(45.0);
        assert_eq!(
            nav.motors().cmds,
            vec![
                Cmd::Rotate(w, -w, 100.0),
                Cmd::Speeds(50.0, -50.0),
                Cmd::Speeds(0.0, 0.0)
            ]
        );
    }

    #[test]
    fn test_sensor_error_propagates() {
        struct Unplugged;

        impl RangeSensor for Unplugged {
            fn fetch_range_cm(&mut self) -> Result<f64, HalError> {
                Err(HalError::NotConnected("range sensor"))
            }
        }

        let mut loc = DistanceScanLocalizer::new(params(ScanMode::FallingEdge), Unplugged);

        assert!(matches!(
            loc.localize(&mut recording_nav(Pose::default())),
            Err(LocError::SensorError(HalError::NotConnected(_)))
        ));
    }
}
