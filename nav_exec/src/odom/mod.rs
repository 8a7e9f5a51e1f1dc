//! # Odometry module
//!
//! Odometry dead-reckons the robot's pose from the wheel encoders. Each cycle
//! the integrator reads the cumulative wheel tallies, converts the change
//! since the previous cycle into the distance travelled by each wheel, and
//! advances the pose held in the [`PoseStore`](crate::pose::PoseStore):
//!
//! - the translation is the mean of the two wheel distances,
//! - the rotation is the difference of the wheel distances over the wheel
//!   base,
//! - the position is advanced along the heading held before the cycle's
//!   rotation is applied.
//!
//! The integrator runs in its own thread at a fixed period. A slow cycle is
//! not caught up on, the next cycle simply integrates a larger increment.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::Params;
pub use state::*;
