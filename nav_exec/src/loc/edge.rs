//! Debounced wall edge detection for the rotational scan.
//!
//! Each range reading is clamped to the maximum range and turned into an error
//! against the band centre, `error = band_centre - range`, so a nearby wall
//! gives a large positive error. A classification is only confirmed once
//! `confirm_samples` consecutive readings agree:
//!
//! - [`RangeClass::NoWall`] when every error is at most the bandwidth,
//! - [`RangeClass::Wall`] when every error is at least the bandwidth.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use std::collections::VecDeque;

use super::params::ScanParams;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One filtered range reading.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct ScanSample {
    /// Reading after clamping to the maximum range
    pub range_cm: f64,

    /// Band centre minus the clamped reading
    pub error_cm: f64,
}

/// Confirms wall and no-wall states from a stream of range readings.
#[derive(Debug, Clone)]
pub struct WallEdgeDetector {
    band_centre_cm: f64,
    bandwidth_cm: f64,
    max_range_cm: f64,
    confirm_samples: usize,

    window: VecDeque<ScanSample>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum RangeClass {
    Wall,
    NoWall,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl WallEdgeDetector {
    pub fn new(
        band_centre_cm: f64,
        bandwidth_cm: f64,
        max_range_cm: f64,
        confirm_samples: usize,
    ) -> Self {
        let confirm_samples = confirm_samples.max(1);

        Self {
            band_centre_cm,
            bandwidth_cm,
            max_range_cm,
            confirm_samples,
            window: VecDeque::with_capacity(confirm_samples),
        }
    }

    pub fn from_params(params: &ScanParams) -> Self {
        Self::new(
            params.band_centre_cm,
            params.bandwidth_cm,
            params.max_range_cm,
            params.confirm_samples,
        )
    }

    /// Clamp a reading and compute its error against the band centre.
    pub fn filter(&self, range_cm: f64) -> ScanSample {
        let range_cm = if range_cm.is_nan() {
            self.max_range_cm
        } else {
            range_cm.max(0.0).min(self.max_range_cm)
        };

        ScanSample {
            range_cm,
            error_cm: self.band_centre_cm - range_cm,
        }
    }

    /// Add a reading to the window, dropping the oldest once it is full.
    pub fn push(&mut self, range_cm: f64) -> ScanSample {
        let sample = self.filter(range_cm);

        if self.window.len() == self.confirm_samples {
            self.window.pop_front();
        }
        self.window.push_back(sample);

        sample
    }

    /// True if the window is full and every sample in it agrees with `class`.
    pub fn confirmed(&self, class: RangeClass) -> bool {
        if self.window.len() < self.confirm_samples {
            return false;
        }

        let bw = self.bandwidth_cm;
        self.window.iter().all(|s| match class {
            RangeClass::Wall => s.error_cm >= bw,
            RangeClass::NoWall => s.error_cm <= bw,
        })
    }

    /// Whether a single reading, without debouncing, shows a wall.
    pub fn sees_wall(&self, range_cm: f64) -> bool {
        self.filter(range_cm).error_cm > self.bandwidth_cm
    }

    /// Forget all samples, so the next confirmation uses only fresh readings.
    pub fn reset(&mut self) {
        self.window.clear();
    }
}
