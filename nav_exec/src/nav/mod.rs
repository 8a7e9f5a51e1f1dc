//! # Motion control module
//!
//! The [`MotionController`] turns the pose estimate in the
//! [`PoseStore`](crate::pose::PoseStore) into drive motor commands. It
//! provides closed-loop primitives which poll the estimate (rotating to an
//! absolute heading, driving to a point) and open-loop primitives which
//! command a fixed wheel rotation (turning by a relative angle, driving a set
//! distance).
//!
//! Headings are in degrees at this interface, counter-clockwise positive from
//! the field X axis. A positive turn drives the left wheel backwards and the
//! right wheel forwards.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controller;
pub mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use controller::*;
pub use params::Params;
