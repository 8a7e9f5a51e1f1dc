//! # Navigation library.
//!
//! Pose estimation, localisation and motion control for a two-wheeled
//! differential drive robot on a tiled field. The executable and the
//! integration tests build on the items defined here.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Field model - tile grid, walls and starting corners
pub mod field;

/// Drive train geometry - conversions between wheel rotation and body motion
pub mod geometry;

/// Hardware abstraction - encoder, motor and sensor traits
pub mod hal;

/// Localisation module - wall scan and line crossing corrections of the pose
pub mod loc;

/// Motion control module - rotate, turn and drive primitives
pub mod nav;

/// Odometry module - dead reckoning from the wheel encoders
pub mod odom;

/// Pose module - the pose and the store shared between threads
pub mod pose;

/// Simulated robot - kinematic model implementing the hardware traits
pub mod sim;

#[cfg(test)]
mod test_support;
