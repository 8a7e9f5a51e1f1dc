//! Kinematic model of the robot on the field

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation2, Vector2};
use std::time::Instant;

// Internal
use super::Params;
use crate::field::Field;
use crate::geometry::RobotGeometry;
use crate::hal::{EncoderSnapshot, Side};
use crate::pose::Pose;
use util::maths::wrap_2pi;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Longest time integrated in one step of the model.
///
/// Units: seconds
const MAX_STEP_S: f64 = 0.001;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The simulated robot and its surroundings.
pub(super) struct SimWorld {
    params: Params,
    field: Field,
    geometry: RobotGeometry,

    /// True pose of the robot in the field frame
    pub(super) pose: Pose,

    pub(super) left: Wheel,
    pub(super) right: Wheel,

    last_update: Instant,
}

#[derive(Debug, Default, Clone)]
pub(super) struct Wheel {
    /// Cumulative rotation
    pub(super) angle_deg: f64,

    pub(super) speed_degs: f64,

    /// Angle at which the wheel stops, if rotating to a target
    pub(super) target_deg: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimWorld {
    pub(super) fn new(params: Params, field: Field, geometry: RobotGeometry, pose: Pose) -> Self {
        Self {
            params,
            field,
            geometry,
            pose,
            left: Wheel::default(),
            right: Wheel::default(),
            last_update: Instant::now(),
        }
    }

    /// Bring the model up to the current time.
    pub(super) fn advance(&mut self) {
        let now = Instant::now();
        let dt_s = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        self.step(dt_s);
    }

    /// Integrate the model over `dt_s` seconds.
    pub(super) fn step(&mut self, dt_s: f64) {
        if self.left.is_stopped() && self.right.is_stopped() {
            return;
        }

        let num_steps = (dt_s / MAX_STEP_S).ceil().max(1.0) as usize;
        let h = dt_s / num_steps as f64;

        for _ in 0..num_steps {
            let left_cm = self.geometry.wheel_deg_to_cm(self.left.advance(h));
            let right_cm = self.geometry.wheel_deg_to_cm(self.right.advance(h));

            let translation_cm = 0.5 * (left_cm + right_cm);
            let rotation_rad = (right_cm - left_cm) / self.geometry.wheel_base_cm;
            let mid_heading = self.pose.heading_rad + 0.5 * rotation_rad;

            self.pose.x_cm += translation_cm * mid_heading.cos();
            self.pose.y_cm += translation_cm * mid_heading.sin();
            self.pose.heading_rad = wrap_2pi(self.pose.heading_rad + rotation_rad);
        }
    }

    pub(super) fn ticks(&self) -> EncoderSnapshot {
        EncoderSnapshot {
            left_ticks: self.left.angle_deg.round() as i64,
            right_ticks: self.right.angle_deg.round() as i64,
        }
    }

    /// Distance along the heading to the nearest wall, clamped to the
    /// sensor's maximum range.
    pub(super) fn range_cm(&self) -> f64 {
        let size = self.field.size_cm();
        let (x, y) = (self.pose.x_cm, self.pose.y_cm);
        let (c, s) = (self.pose.heading_rad.cos(), self.pose.heading_rad.sin());

        let mut range = self.params.range_max_cm;

        // Distance to the wall ahead along each axis, if the heading points
        // towards one
        let candidates = [
            if c > 1e-9 { Some((size - x) / c) } else { None },
            if c < -1e-9 { Some(-x / c) } else { None },
            if s > 1e-9 { Some((size - y) / s) } else { None },
            if s < -1e-9 { Some(-y / s) } else { None },
        ];
        for d in candidates.iter().flatten() {
            range = range.min(*d);
        }

        range.max(0.0)
    }

    /// Reflectance under the line sensor on the given side.
    pub(super) fn reflectance(&self, side: Side) -> f64 {
        let p = self.sensor_position(side);

        if self.on_line(p[0]) || self.on_line(p[1]) {
            self.params.line_reflectance
        } else {
            self.params.floor_reflectance
        }
    }

    /// Field position of the line sensor on the given side.
    pub(super) fn sensor_position(&self, side: Side) -> Vector2<f64> {
        let lateral = match side {
            Side::Left => 0.5 * self.params.sensor_track_cm,
            Side::Right => -0.5 * self.params.sensor_track_cm,
        };

        self.pose.position()
            + Rotation2::new(self.pose.heading_rad)
                * Vector2::new(self.params.sensor_offset_cm, lateral)
    }

    /// Whether a coordinate lies on one of the interior grid lines.
    fn on_line(&self, coord_cm: f64) -> bool {
        let tile = self.field.tile_size_cm;
        let index = (coord_cm / tile)
            .round()
            .max(1.0)
            .min(self.field.size_tiles as f64 - 1.0);

        (coord_cm - index * tile).abs() <= 0.5 * self.params.line_width_cm
    }
}

impl Wheel {
    fn is_stopped(&self) -> bool {
        self.speed_degs == 0.0
    }

    /// Spin continuously at the given speed.
    pub(super) fn set_speed(&mut self, speed_degs: f64) {
        self.speed_degs = speed_degs;
        self.target_deg = None;
    }

    /// Rotate by `delta_deg` at `speed_degs`, then stop.
    pub(super) fn set_target(&mut self, delta_deg: f64, speed_degs: f64) {
        if delta_deg == 0.0 {
            self.set_speed(0.0);
        } else {
            self.speed_degs = speed_degs.abs() * delta_deg.signum();
            self.target_deg = Some(self.angle_deg + delta_deg);
        }
    }

    /// Advance the wheel by `h` seconds, returning the rotation made.
    fn advance(&mut self, h: f64) -> f64 {
        let mut delta = self.speed_degs * h;

        if let Some(target) = self.target_deg {
            let remaining = target - self.angle_deg;
            if delta.abs() >= remaining.abs() {
                delta = remaining;
                self.speed_degs = 0.0;
                self.target_deg = None;
            }
        }

        self.angle_deg += delta;

        delta
    }
}
