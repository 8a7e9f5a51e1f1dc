//! Odometry integrator state

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use serde::Serialize;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

// Internal
use super::Params;
use crate::geometry::RobotGeometry;
use crate::hal::{EncoderSnapshot, Encoders, HalError};
use crate::pose::{Pose, PoseStore};
use util::{
    archive::Archiver,
    maths::wrap_2pi,
    session::{self, Session},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Integrates wheel encoder increments into the shared pose.
pub struct OdometryIntegrator<E> {
    geometry: RobotGeometry,

    store: PoseStore,

    encoders: E,

    /// Optional archive of every integrated pose
    arch: Option<Archiver>,

    report: StatusReport,
}

/// Monitoring quantities for one integration cycle.
#[derive(Debug, Default, Copy, Clone, Serialize)]
pub struct StatusReport {
    /// Ground distance covered by the left wheel this cycle
    pub left_dist_cm: f64,

    /// Ground distance covered by the right wheel this cycle
    pub right_dist_cm: f64,

    /// Distance covered by the robot's centre this cycle
    pub translation_cm: f64,

    /// Change in heading this cycle, counter-clockwise positive
    pub rotation_rad: f64,
}

/// Handle to an integrator running in a background thread.
///
/// Dropping the handle stops the thread.
pub struct OdomHandle {
    bg_run: Arc<AtomicBool>,
    num_cycles: Arc<AtomicU64>,
    jh: Option<JoinHandle<Result<(), OdomError>>>,
}

/// Row of the pose archive.
#[derive(Serialize)]
struct PoseRecord {
    time_s: f64,
    x_cm: f64,
    y_cm: f64,
    heading_rad: f64,
    left_ticks: i64,
    right_ticks: i64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Potential errors that can occur during odometry.
#[derive(Debug, thiserror::Error)]
pub enum OdomError {
    #[error("Could not read the encoders: {0}")]
    EncoderError(#[from] HalError),

    #[error("Encoder reads failed {0} times in a row, odometry stopped")]
    ReadErrorLimit(u64),

    #[error("Could not create the pose archive: {0}")]
    ArchiveError(String),

    #[error("The odometry thread panicked")]
    ThreadPanicked,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<E: Encoders> OdometryIntegrator<E> {
    /// Create a new integrator writing into the given store.
    pub fn new(store: PoseStore, encoders: E, geometry: RobotGeometry) -> Self {
        Self {
            geometry,
            store,
            encoders,
            arch: None,
            report: StatusReport::default(),
        }
    }

    /// Archive every integrated pose into the given session-relative path.
    pub fn with_archive<P: AsRef<Path>>(
        mut self,
        session: &Session,
        path: P,
    ) -> Result<Self, OdomError> {
        self.arch = Some(
            Archiver::from_path(session, path)
                .map_err(|e| OdomError::ArchiveError(e.to_string()))?,
        );

        Ok(self)
    }

    /// Initialise the integrator.
    ///
    /// The current encoder tallies become the baseline, so motion before this
    /// call is not integrated.
    pub fn init(&mut self) -> Result<(), OdomError> {
        let ticks = self.encoders.read_ticks()?;
        self.store.set_ticks(ticks);

        debug!(
            "Odometry baseline set to L = {}, R = {}",
            ticks.left_ticks, ticks.right_ticks
        );

        Ok(())
    }

    /// Process one integration cycle.
    ///
    /// Processing involves:
    ///  1. Reading the encoder tallies and differencing them against the
    ///     previous cycle's.
    ///  1. Converting the differences into wheel distances.
    ///  1. Advancing the pose in the store.
    ///  1. Recording the new tallies as the next baseline.
    pub fn proc(&mut self) -> Result<(Pose, StatusReport), OdomError> {
        let ticks = self.encoders.read_ticks()?;
        let prev = self.store.ticks();

        let left_dist_cm = self
            .geometry
            .wheel_deg_to_cm((ticks.left_ticks - prev.left_ticks) as f64);
        let right_dist_cm = self
            .geometry
            .wheel_deg_to_cm((ticks.right_ticks - prev.right_ticks) as f64);

        let geometry = self.geometry;
        let mut report = StatusReport::default();
        let pose = self.store.update(|pose| {
            report = integrate(pose, left_dist_cm, right_dist_cm, &geometry);
        });
        self.store.set_ticks(ticks);
        self.report = report;

        if let Some(ref mut arch) = self.arch {
            let record = PoseRecord {
                time_s: session::get_elapsed_seconds(),
                x_cm: pose.x_cm,
                y_cm: pose.y_cm,
                heading_rad: pose.heading_rad,
                left_ticks: ticks.left_ticks,
                right_ticks: ticks.right_ticks,
            };
            if let Err(e) = arch.serialise(record) {
                warn!("Could not archive odometry pose: {}", e);
            }
        }

        Ok((pose, self.report))
    }
}

impl<E: Encoders + Send + 'static> OdometryIntegrator<E> {
    /// Initialise the integrator and run it in a background thread, one cycle
    /// every `params.period_ms`.
    pub fn spawn(mut self, params: &Params) -> Result<OdomHandle, OdomError> {
        self.init()?;

        let bg_run = Arc::new(AtomicBool::new(true));
        let num_cycles = Arc::new(AtomicU64::new(0));

        let bg_run_clone = bg_run.clone();
        let num_cycles_clone = num_cycles.clone();
        let period = Duration::from_millis(params.period_ms);
        let max_errors = params.max_consec_read_errors;

        let jh = Some(thread::spawn(move || {
            bg_thread(self, period, max_errors, bg_run_clone, num_cycles_clone)
        }));

        info!("Odometry started with a {} ms period", params.period_ms);

        Ok(OdomHandle {
            bg_run,
            num_cycles,
            jh,
        })
    }
}

impl OdomHandle {
    /// Number of cycles run so far.
    pub fn num_cycles(&self) -> u64 {
        self.num_cycles.load(Ordering::Relaxed)
    }

    /// Stop the background thread, returning the error which ended it early
    /// if there was one.
    pub fn stop(mut self) -> Result<(), OdomError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), OdomError> {
        self.bg_run.store(false, Ordering::Relaxed);

        match self.jh.take() {
            Some(jh) => {
                let res = jh.join().map_err(|_| OdomError::ThreadPanicked)?;
                info!("Odometry stopped after {} cycles", self.num_cycles());
                res
            }
            None => Ok(()),
        }
    }
}

impl Drop for OdomHandle {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!("Odometry exited with an error: {}", e);
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Advance `pose` by the given wheel distances.
///
/// The position is advanced along the heading held before this increment's
/// rotation is applied. The resulting heading is wrapped into [0, 2pi).
pub fn integrate(
    pose: &mut Pose,
    left_dist_cm: f64,
    right_dist_cm: f64,
    geometry: &RobotGeometry,
) -> StatusReport {
    let translation_cm = 0.5 * (left_dist_cm + right_dist_cm);
    let rotation_rad = (right_dist_cm - left_dist_cm) / geometry.wheel_base_cm;

    pose.x_cm += translation_cm * pose.heading_rad.cos();
    pose.y_cm += translation_cm * pose.heading_rad.sin();
    pose.heading_rad = wrap_2pi(pose.heading_rad + rotation_rad);

    StatusReport {
        left_dist_cm,
        right_dist_cm,
        translation_cm,
        rotation_rad,
    }
}

/// Background thread running the integrator at a fixed period.
fn bg_thread<E: Encoders>(
    mut odom: OdometryIntegrator<E>,
    period: Duration,
    max_errors: u64,
    run: Arc<AtomicBool>,
    num_cycles: Arc<AtomicU64>,
) -> Result<(), OdomError> {
    let mut consec_errors = 0;

    while run.load(Ordering::Relaxed) {
        let cycle_start = Instant::now();

        match odom.proc() {
            Ok((pose, report)) => {
                consec_errors = 0;
                trace!(
                    "Odometry: {} (dT = {:.3} cm, dH = {:.4} rad)",
                    pose,
                    report.translation_cm,
                    report.rotation_rad
                );
            }
            Err(e) => {
                consec_errors += 1;
                warn!(
                    "Odometry cycle failed ({} in a row): {}",
                    consec_errors, e
                );

                if consec_errors >= max_errors {
                    error!("Too many consecutive encoder errors, stopping odometry");
                    return Err(OdomError::ReadErrorLimit(consec_errors));
                }
            }
        }

        num_cycles.fetch_add(1, Ordering::Relaxed);

        // Sleep for the rest of the period, an overrun is not made up for
        match period.checked_sub(cycle_start.elapsed()) {
            Some(d) => thread::sleep(d),
            None => trace!("Odometry cycle overran its {:?} period", period),
        }
    }

    Ok(())
}
