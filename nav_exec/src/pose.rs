//! # Pose module
//!
//! Provides the robot's pose and the [`PoseStore`], the single lock-guarded
//! owner of the pose estimate. The odometry thread writes into the store every
//! cycle while the mission thread (localisation and motion control) reads it
//! and occasionally overwrites it, so every access goes through one mutex and
//! a reader never sees fields from two different updates.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Rotation2, Vector2};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// Internal
use crate::hal::EncoderSnapshot;
use util::maths::wrap_2pi;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and heading) of the robot in the field frame.
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Pose {
    /// Position along the field X axis.
    ///
    /// Units: centimeters
    pub x_cm: f64,

    /// Position along the field Y axis.
    ///
    /// Units: centimeters
    pub y_cm: f64,

    /// Heading, the angle to the positive X axis, counter-clockwise positive.
    ///
    /// Units: radians, range [0, 2pi)
    pub heading_rad: f64,
}

/// Selects which fields of a [`Pose`] are written by [`PoseStore::set`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PoseMask {
    pub x: bool,
    pub y: bool,
    pub heading: bool,
}

/// Thread-safe handle to the robot's pose and encoder baseline.
///
/// Cloning the handle shares the same underlying pose.
#[derive(Clone, Default)]
pub struct PoseStore {
    inner: Arc<Mutex<PoseState>>,
}

#[derive(Default)]
struct PoseState {
    pose: Pose,
    ticks: EncoderSnapshot,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a new pose, wrapping the heading into [0, 2pi).
    pub fn new(x_cm: f64, y_cm: f64, heading_rad: f64) -> Self {
        Self {
            x_cm,
            y_cm,
            heading_rad: wrap_2pi(heading_rad),
        }
    }

    /// Create a new pose with the heading given in degrees.
    pub fn from_deg(x_cm: f64, y_cm: f64, heading_deg: f64) -> Self {
        Self::new(x_cm, y_cm, heading_deg.to_radians())
    }

    /// Heading in degrees, range [0, 360).
    pub fn heading_deg(&self) -> f64 {
        self.heading_rad.to_degrees()
    }

    /// The 2D position vector.
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x_cm, self.y_cm)
    }

    /// Express a pose given relative to this one in the frame this pose is
    /// expressed in.
    pub fn compose(&self, local: &Pose) -> Pose {
        let pos = self.position() + Rotation2::new(self.heading_rad) * local.position();

        Pose::new(pos[0], pos[1], self.heading_rad + local.heading_rad)
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({:.2} cm, {:.2} cm, {:.2} deg)",
            self.x_cm,
            self.y_cm,
            self.heading_deg()
        )
    }
}

impl PoseMask {
    pub const NONE: PoseMask = PoseMask {
        x: false,
        y: false,
        heading: false,
    };
    pub const ALL: PoseMask = PoseMask {
        x: true,
        y: true,
        heading: true,
    };
    pub const X: PoseMask = PoseMask {
        x: true,
        ..PoseMask::NONE
    };
    pub const Y: PoseMask = PoseMask {
        y: true,
        ..PoseMask::NONE
    };
    pub const HEADING: PoseMask = PoseMask {
        heading: true,
        ..PoseMask::NONE
    };
}

impl BitOr for PoseMask {
    type Output = PoseMask;

    fn bitor(self, rhs: Self) -> Self::Output {
        PoseMask {
            x: self.x || rhs.x,
            y: self.y || rhs.y,
            heading: self.heading || rhs.heading,
        }
    }
}

impl PoseStore {
    /// Create a new store holding the given pose.
    pub fn new(pose: Pose) -> Self {
        Self {
            inner: Arc::new(Mutex::new(PoseState {
                pose: Pose::new(pose.x_cm, pose.y_cm, pose.heading_rad),
                ticks: EncoderSnapshot::default(),
            })),
        }
    }

    /// Get a consistent snapshot of the pose.
    pub fn get(&self) -> Pose {
        self.lock().pose
    }

    /// Overwrite the fields of the pose selected by `mask`, leaving the others
    /// untouched.
    pub fn set(&self, pose: Pose, mask: PoseMask) {
        let mut state = self.lock();

        if mask.x {
            state.pose.x_cm = pose.x_cm;
        }
        if mask.y {
            state.pose.y_cm = pose.y_cm;
        }
        if mask.heading {
            state.pose.heading_rad = wrap_2pi(pose.heading_rad);
        }
    }

    /// Modify the pose under the lock, returning the updated pose.
    ///
    /// The heading is wrapped after `f` returns, so `f` may leave it out of
    /// range.
    pub fn update<F>(&self, f: F) -> Pose
    where
        F: FnOnce(&mut Pose),
    {
        let mut state = self.lock();

        f(&mut state.pose);
        state.pose.heading_rad = wrap_2pi(state.pose.heading_rad);

        state.pose
    }

    /// The encoder tallies recorded by the last odometry cycle.
    pub fn ticks(&self) -> EncoderSnapshot {
        self.lock().ticks
    }

    /// Record new encoder tallies as the baseline for the next cycle.
    pub fn set_ticks(&self, ticks: EncoderSnapshot) {
        self.lock().ticks = ticks;
    }

    fn lock(&self) -> MutexGuard<'_, PoseState> {
        // Every write replaces whole fields, so a poisoned state is still
        // consistent and can be recovered.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};
    use std::thread;
    use util::maths::get_ang_dist_2pi;

    #[test]
    fn test_new_wraps_heading() {
        let p = Pose::new(0.0, 0.0, -FRAC_PI_2);
        assert_relative_eq!(p.heading_rad, 1.5 * PI);

        let p = Pose::new(0.0, 0.0, TAU);
        assert_eq!(p.heading_rad, 0.0);

        let p = Pose::from_deg(1.0, 2.0, 450.0);
        assert_relative_eq!(p.heading_deg(), 90.0, epsilon = 1e-9);
    }

    #[test]
    fn test_set_masked() {
        let store = PoseStore::new(Pose::new(1.0, 2.0, 0.5));

        store.set(Pose::new(10.0, 20.0, 1.0), PoseMask::X | PoseMask::HEADING);

        let p = store.get();
        assert_eq!(p.x_cm, 10.0);
        assert_eq!(p.y_cm, 2.0);
        assert_eq!(p.heading_rad, 1.0);

        store.set(Pose::new(-5.0, -6.0, 3.0), PoseMask::NONE);
        assert_eq!(store.get(), p);
    }

    #[test]
    fn test_set_wraps_heading() {
        let store = PoseStore::default();

        let mut raw = Pose::default();
        raw.heading_rad = -PI;
        store.set(raw, PoseMask::HEADING);

        assert_relative_eq!(store.get().heading_rad, PI);
    }

    #[test]
    fn test_update_wraps_heading() {
        let store = PoseStore::new(Pose::new(0.0, 0.0, TAU - 0.1));

        let p = store.update(|p| p.heading_rad += 0.2);

        assert_relative_eq!(p.heading_rad, 0.1, epsilon = 1e-12);
    }

    /// Small increments carried across zero never leave the range or jump by
    /// more than the increment.
    #[test]
    fn test_update_across_zero() {
        let store = PoseStore::new(Pose::new(0.0, 0.0, TAU - 0.05));
        let mut prev = store.get().heading_rad;

        for _ in 0..100 {
            let cur = store.update(|p| p.heading_rad += 0.001).heading_rad;

            assert!(cur >= 0.0 && cur < TAU, "heading {} out of range", cur);
            assert!(get_ang_dist_2pi(prev, cur).abs() <= 0.001 + 1e-9);
            prev = cur;
        }

        assert_relative_eq!(prev, 0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_compose() {
        let corner = Pose::from_deg(100.0, 50.0, 90.0);
        let local = Pose::from_deg(10.0, 0.0, 10.0);

        let p = corner.compose(&local);

        assert_relative_eq!(p.x_cm, 100.0, epsilon = 1e-9);
        assert_relative_eq!(p.y_cm, 60.0, epsilon = 1e-9);
        assert_relative_eq!(p.heading_deg(), 100.0, epsilon = 1e-9);
    }

    /// A writer keeps all three fields equal, a reader must never see them
    /// differ.
    #[test]
    fn test_no_torn_reads() {
        let store = PoseStore::default();

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for i in 0..20_000 {
                    let v = (i % 600) as f64 * 0.01;
                    store.set(Pose::new(v, v, v), PoseMask::ALL);
                }
            })
        };

        for _ in 0..20_000 {
            let p = store.get();
            assert_eq!(p.x_cm, p.y_cm);
            assert_eq!(p.x_cm, p.heading_rad);
        }

        writer.join().unwrap();
    }

    /// Read-modify-write through `update` loses no increments between
    /// writers.
    #[test]
    fn test_concurrent_updates() {
        let store = PoseStore::default();

        let writers: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        store.update(|p| p.x_cm += 1.0);
                    }
                })
            })
            .collect();

        for w in writers {
            w.join().unwrap();
        }

        assert_eq!(store.get().x_cm, 20_000.0);
    }
}
