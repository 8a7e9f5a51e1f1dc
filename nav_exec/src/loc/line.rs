//! Line crossing correction
//!
//! The two line sensors sit `sensor_offset_cm` ahead of the wheel axle,
//! `sensor_track_cm` apart. Driving across a grid line at an angle `a` to its
//! normal, the centre of the robot has moved `track * sin(a)` further along
//! the travel axis when the trailing sensor crosses than when the leading one
//! did, so
//!
//! ```text
//! a = asin(direction * (left - right) / track)
//! ```
//!
//! where `left` and `right` are the axis coordinates recorded at each
//! crossing and `direction` is +1 when travelling towards increasing
//! coordinates. Once `a` is turned out the robot is perpendicular to the line
//! with its centre `offset * cos(a) - track / 2 * |sin(a)|` short of it, less
//! however far it coasted past the second crossing.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use serde::Serialize;
use std::thread;
use std::time::{Duration, Instant};

// Internal
use super::{params::LineParams, LocError};
use crate::field::Field;
use crate::hal::{DriveMotors, LineSensor};
use crate::nav::MotionController;
use crate::pose::{Pose, PoseMask};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Squares the robot up on grid lines with a pair of line sensors.
pub struct LineCrossingLocalizer<L> {
    params: LineParams,

    field: Field,

    left: L,

    right: L,
}

/// Measurements from squaring up on one line.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct LinePass {
    pub axis: TravelAxis,

    /// Centre coordinate along the axis when the left sensor crossed
    pub left_cross_cm: f64,

    /// Centre coordinate along the axis when the right sensor crossed
    pub right_cross_cm: f64,

    /// Angle between the heading and the line normal, counter-clockwise
    /// positive
    pub angle_error_deg: f64,

    /// Distance travelled past the second crossing before stopping
    pub overshoot_cm: f64,

    /// Distance driven after squaring up to put the centre on the line
    pub advance_cm: f64,
}

/// Outcome of the full line crossing localisation.
#[derive(Debug, Clone, Serialize)]
pub struct LineReport {
    pub x_pass: LinePass,
    pub y_pass: LinePass,

    /// Pose of the grid intersection the result is relative to, if any
    pub start_pose: Option<Pose>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The field axis the robot travels along while crossing a line.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum TravelAxis {
    X,
    Y,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl TravelAxis {
    /// The axis closest to the given heading.
    pub fn nearest(heading_rad: f64) -> Self {
        if heading_rad.cos().abs() >= heading_rad.sin().abs() {
            TravelAxis::X
        } else {
            TravelAxis::Y
        }
    }

    /// Coordinate of the pose along this axis.
    pub fn coord(&self, pose: &Pose) -> f64 {
        match self {
            TravelAxis::X => pose.x_cm,
            TravelAxis::Y => pose.y_cm,
        }
    }

    /// +1 if the heading points towards increasing coordinates along this
    /// axis, -1 otherwise.
    pub fn direction(&self, heading_rad: f64) -> f64 {
        let component = match self {
            TravelAxis::X => heading_rad.cos(),
            TravelAxis::Y => heading_rad.sin(),
        };

        if component >= 0.0 {
            1.0
        } else {
            -1.0
        }
    }

    pub fn mask(&self) -> PoseMask {
        match self {
            TravelAxis::X => PoseMask::X,
            TravelAxis::Y => PoseMask::Y,
        }
    }
}

impl<L: LineSensor> LineCrossingLocalizer<L> {
    pub fn new(params: LineParams, field: Field, left: L, right: L) -> Self {
        Self {
            params,
            field,
            left,
            right,
        }
    }

    /// Square up on the grid intersection ahead of the robot, which must be
    /// facing along the X axis with a line ahead on each axis.
    ///
    /// The X line is crossed first, then the robot turns to 90 degrees and
    /// crosses the Y line. The intersection becomes the origin, or the pose
    /// `start` if one is given, and the robot finishes facing along X.
    pub fn localize<M: DriveMotors>(
        &mut self,
        nav: &mut MotionController<M>,
        start: Option<Pose>,
    ) -> Result<LineReport, LocError> {
        nav.rotate_to(0.0)?;
        let x_pass = self.square_on_line(nav, TravelAxis::X)?;
        nav.store()
            .set(Pose::new(0.0, 0.0, 0.0), PoseMask::X | PoseMask::HEADING);

        nav.rotate_to(90.0)?;
        let y_pass = self.square_on_line(nav, TravelAxis::Y)?;
        nav.store().set(
            Pose::from_deg(0.0, 0.0, 90.0),
            PoseMask::Y | PoseMask::HEADING,
        );

        nav.rotate_to(0.0)?;

        // Keep whatever residual the final rotation left
        let pose = nav.store().update(|p| {
            if let Some(s) = start {
                *p = s.compose(p);
            }
        });

        info!("Line localisation complete, pose {}", pose);

        Ok(LineReport {
            x_pass,
            y_pass,
            start_pose: start,
        })
    }

    /// Drive forwards to the next grid line, square up on it, and snap the
    /// heading to the nearest multiple of 90 degrees and the travel coordinate
    /// to the line. The other coordinate is left as it was.
    pub fn correct_at_line<M: DriveMotors>(
        &mut self,
        nav: &mut MotionController<M>,
    ) -> Result<LinePass, LocError> {
        let pose = nav.pose();
        let axis = TravelAxis::nearest(pose.heading_rad);
        let heading_deg = (pose.heading_deg() / 90.0).round() * 90.0;

        let pass = self.square_on_line(nav, axis)?;

        let line_cm = self.field.nearest_line_cm(axis.coord(&nav.pose()));
        let mut snapped = Pose::from_deg(0.0, 0.0, heading_deg);
        match axis {
            TravelAxis::X => snapped.x_cm = line_cm,
            TravelAxis::Y => snapped.y_cm = line_cm,
        }
        nav.store().set(snapped, axis.mask() | PoseMask::HEADING);

        info!(
            "Corrected on line {:?} = {:.2} cm, heading {:.0} deg (was {})",
            axis, line_cm, heading_deg, pose
        );

        Ok(pass)
    }

    /// Drive forwards until both sensors have crossed a line, then turn
    /// perpendicular to it and advance until the centre of the robot is on
    /// it.
    fn square_on_line<M: DriveMotors>(
        &mut self,
        nav: &mut MotionController<M>,
        axis: TravelAxis,
    ) -> Result<LinePass, LocError> {
        let direction = axis.direction(nav.pose().heading_rad);

        nav.forward(self.params.forward_speed_degs)?;
        let crossings = self.find_crossings(nav, axis);
        nav.stop()?;
        let (left_cross_cm, right_cross_cm) = crossings?;

        thread::sleep(Duration::from_millis(nav.params().settle_ms));

        let angle_rad = line_angle_error_rad(
            left_cross_cm,
            right_cross_cm,
            self.params.sensor_track_cm,
            direction,
        );

        let later_cm = if direction > 0.0 {
            left_cross_cm.max(right_cross_cm)
        } else {
            left_cross_cm.min(right_cross_cm)
        };
        let overshoot_cm = (axis.coord(&nav.pose()) - later_cm) * direction;

        let advance_cm = advance_distance_cm(
            self.params.sensor_offset_cm,
            self.params.sensor_track_cm,
            angle_rad,
        ) - overshoot_cm;

        debug!(
            "Line on {:?}: L = {:.2} cm, R = {:.2} cm, angle {:.2} deg, overshoot {:.2} cm",
            axis,
            left_cross_cm,
            right_cross_cm,
            angle_rad.to_degrees(),
            overshoot_cm
        );

        nav.turn_by(-angle_rad.to_degrees())?;
        nav.drive_distance(advance_cm)?;

        Ok(LinePass {
            axis,
            left_cross_cm,
            right_cross_cm,
            angle_error_deg: angle_rad.to_degrees(),
            overshoot_cm,
            advance_cm,
        })
    }

    /// Sample both sensors, recording the axis coordinate at which each first
    /// reads dark, until both have.
    fn find_crossings<M: DriveMotors>(
        &mut self,
        nav: &MotionController<M>,
        axis: TravelAxis,
    ) -> Result<(f64, f64), LocError> {
        let poll = Duration::from_millis(self.params.poll_interval_ms);
        let timeout = self.params.line_timeout_ms;
        let threshold = self.params.black_line_threshold;
        let start = Instant::now();

        let mut left = None;
        let mut right = None;

        loop {
            // Both sensors are sampled every cycle so their readings stay in
            // step
            let left_dark = self.left.fetch_reflectance()? < threshold;
            let right_dark = self.right.fetch_reflectance()? < threshold;
            let coord = axis.coord(&nav.pose());

            if left.is_none() && left_dark {
                debug!("Left sensor crossed at {:.2} cm", coord);
                left = Some(coord);
            }
            if right.is_none() && right_dark {
                debug!("Right sensor crossed at {:.2} cm", coord);
                right = Some(coord);
            }

            if let (Some(l), Some(r)) = (left, right) {
                return Ok((l, r));
            }

            if let Some(ms) = timeout {
                if start.elapsed() > Duration::from_millis(ms) {
                    return Err(LocError::LineTimeout(ms));
                }
            }

            thread::sleep(poll);
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Angle between the heading and the normal of a line, counter-clockwise
/// positive, from the axis coordinates at which each sensor crossed it.
///
/// Differences larger than the track cannot come from a straight crossing and
/// are clamped to a right angle.
pub fn line_angle_error_rad(left_cm: f64, right_cm: f64, track_cm: f64, direction: f64) -> f64 {
    let ratio = direction * (left_cm - right_cm) / track_cm;

    if ratio.abs() > 1.0 {
        warn!(
            "Line crossing skew of {:.2} cm exceeds the sensor track, clamping",
            left_cm - right_cm
        );
    }

    ratio.max(-1.0).min(1.0).asin()
}

/// Distance from the centre of a robot squared up on a line to the line, when
/// it was stopped at the trailing sensor's crossing with angle error
/// `angle_rad`.
pub fn advance_distance_cm(offset_cm: f64, track_cm: f64, angle_rad: f64) -> f64 {
    offset_cm * angle_rad.cos() - 0.5 * track_cm * angle_rad.sin().abs()
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::hal::HalError;
    use crate::pose::PoseStore;
    use crate::test_support::{recording_nav, Cmd, GEOM};
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    const TRACK: f64 = 11.6;
    const OFFSET: f64 = 5.35;

    /// A line sensor which reads dark once the robot's X coordinate reaches
    /// `line_x_cm`. Each read moves the robot forwards by `step_cm`.
    struct TrackSensor {
        store: PoseStore,
        line_x_cm: f64,
        step_cm: f64,
    }

    impl LineSensor for TrackSensor {
        fn fetch_reflectance(&mut self) -> Result<f64, HalError> {
            let step = self.step_cm;
            let pose = self.store.update(|p| p.x_cm += step);

            Ok(if pose.x_cm >= self.line_x_cm { 10.0 } else { 60.0 })
        }
    }

    fn params() -> LineParams {
        LineParams {
            black_line_threshold: 40.0,
            sensor_track_cm: TRACK,
            sensor_offset_cm: OFFSET,
            forward_speed_degs: 150.0,
            poll_interval_ms: 0,
            line_timeout_ms: Some(1000),
        }
    }

    const FIELD: Field = Field {
        tile_size_cm: 30.48,
        size_tiles: 12,
    };

    #[test]
    fn test_angle_error() {
        assert_eq!(line_angle_error_rad(10.0, 10.0, TRACK, 1.0), 0.0);

        // Left crossing later travelling +X means the robot is turned
        // counter-clockwise
        let a = line_angle_error_rad(11.0, 10.0, TRACK, 1.0);
        assert_relative_eq!(a, (1.0 / TRACK).asin());

        // The sign flips travelling -X
        assert_relative_eq!(line_angle_error_rad(11.0, 10.0, TRACK, -1.0), -a);

        // 2 cm apart across the 11.6 cm track
        let a = line_angle_error_rad(12.0, 10.0, TRACK, 1.0);
        assert_relative_eq!(a.to_degrees(), 9.928, epsilon = 1e-3);

        assert_relative_eq!(line_angle_error_rad(30.0, 10.0, TRACK, 1.0), FRAC_PI_2);
    }

    #[test]
    fn test_angle_error_geometry() {
        // Sensors at (offset, +-track/2) in the body frame, crossing the line
        // x = 50 at a heading of eps
        let eps = 0.1_f64;
        let left = 50.0 - OFFSET * eps.cos() + 0.5 * TRACK * eps.sin();
        let right = 50.0 - OFFSET * eps.cos() - 0.5 * TRACK * eps.sin();
        assert_relative_eq!(line_angle_error_rad(left, right, TRACK, 1.0), eps, epsilon = 1e-12);

        // Once squared up the centre is advance_distance short of the line
        let stop = left.max(right);
        assert_relative_eq!(
            stop + advance_distance_cm(OFFSET, TRACK, eps),
            50.0,
            epsilon = 1e-12
        );

        // Same crossing travelling -X, heading pi + eps
        let left = 50.0 + OFFSET * eps.cos() - 0.5 * TRACK * eps.sin();
        let right = 50.0 + OFFSET * eps.cos() + 0.5 * TRACK * eps.sin();
        assert_relative_eq!(line_angle_error_rad(left, right, TRACK, -1.0), eps, epsilon = 1e-12);
    }

    #[test]
    fn test_advance_distance() {
        assert_relative_eq!(advance_distance_cm(OFFSET, TRACK, 0.0), OFFSET);
        assert_relative_eq!(
            advance_distance_cm(OFFSET, TRACK, -0.2),
            advance_distance_cm(OFFSET, TRACK, 0.2)
        );
        assert!(advance_distance_cm(OFFSET, TRACK, 0.2) < OFFSET);
    }

    #[test]
    fn test_travel_axis() {
        assert_eq!(TravelAxis::nearest(0.1), TravelAxis::X);
        assert_eq!(TravelAxis::nearest(PI), TravelAxis::X);
        assert_eq!(TravelAxis::nearest(FRAC_PI_2 - 0.2), TravelAxis::Y);
        assert_eq!(TravelAxis::nearest(1.5 * PI), TravelAxis::Y);

        assert_eq!(TravelAxis::X.direction(PI), -1.0);
        assert_eq!(TravelAxis::Y.direction(FRAC_PI_2), 1.0);
        assert_eq!(TravelAxis::Y.direction(1.5 * PI), -1.0);
    }

    #[test]
    fn test_square_on_skewed_line() {
        let mut nav = recording_nav(Pose::default());

        // The left sensor moves the robot, so the left crosses at x = 5 and the
        // right at x = 6
        let left = TrackSensor {
            store: nav.store().clone(),
            line_x_cm: 5.0,
            step_cm: 0.25,
        };
        let right = TrackSensor {
            store: nav.store().clone(),
            line_x_cm: 6.0,
            step_cm: 0.0,
        };
        let mut loc = LineCrossingLocalizer::new(params(), FIELD, left, right);

        let pass = loc.square_on_line(&mut nav, TravelAxis::X).unwrap();

        let angle = (-1.0 / TRACK).asin();
        assert_eq!(pass.left_cross_cm, 5.0);
        assert_eq!(pass.right_cross_cm, 6.0);
        assert_relative_eq!(pass.angle_error_deg, angle.to_degrees());
        assert_eq!(pass.overshoot_cm, 0.0);
        assert_relative_eq!(pass.advance_cm, advance_distance_cm(OFFSET, TRACK, angle));

        let w_turn = GEOM.turn_to_wheel_deg(-angle.to_degrees());
        let w_drive = GEOM.cm_to_wheel_deg(pass.advance_cm);
        assert_eq!(
            nav.motors().cmds,
            vec![
                Cmd::Speeds(150.0, 150.0),
                Cmd::Speeds(0.0, 0.0),
                Cmd::Rotate(-w_turn, w_turn, 100.0),
                Cmd::Rotate(w_drive, w_drive, 200.0),
            ]
        );
    }

    #[test]
    fn test_correct_at_line_snaps_pose() {
        let mut nav = recording_nav(Pose::from_deg(57.0, 44.0, 2.5));

        // The line at x = 60.96 is read when the centre is at 61, both
        // sensors together
        let left = TrackSensor {
            store: nav.store().clone(),
            line_x_cm: 61.0,
            step_cm: 0.5,
        };
        let right = TrackSensor {
            store: nav.store().clone(),
            line_x_cm: 61.0,
            step_cm: 0.0,
        };
        let mut loc = LineCrossingLocalizer::new(params(), FIELD, left, right);

        let pass = loc.correct_at_line(&mut nav).unwrap();
        assert_eq!(pass.axis, TravelAxis::X);
        assert_eq!(pass.angle_error_deg, 0.0);

        let p = nav.pose();
        assert_relative_eq!(p.x_cm, 60.96, epsilon = 1e-9);
        assert_eq!(p.y_cm, 44.0);
        assert_eq!(p.heading_rad, 0.0);
    }

    #[test]
    fn test_line_timeout() {
        let mut nav = recording_nav(Pose::default());
        let sensor = |x| TrackSensor {
            store: nav.store().clone(),
            line_x_cm: x,
            step_cm: 0.0,
        };
        let (left, right) = (sensor(1.0), sensor(1.0));

        let mut p = params();
        p.poll_interval_ms = 1;
        p.line_timeout_ms = Some(10);
        let mut loc = LineCrossingLocalizer::new(p, FIELD, left, right);

        assert!(matches!(
            loc.localize(&mut nav, None),
            Err(LocError::LineTimeout(10))
        ));

        // The robot was stopped after the failed search
        assert_eq!(nav.motors().cmds.last(), Some(&Cmd::Speeds(0.0, 0.0)));
    }
}
