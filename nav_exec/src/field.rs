//! # Field model
//!
//! The field is a square of `size_tiles` by `size_tiles` tiles, surrounded by
//! walls, with a dark line along every tile boundary. The field frame has its
//! origin at the corner between the bottom and left walls, X along the bottom
//! wall and Y along the left wall.
//!
//! The robot starts in one of the four corner tiles, numbered
//! counter-clockwise from the origin. Each corner has a reference pose on the
//! grid intersection nearest to it, facing along the wall on its right.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// Internal
use crate::pose::Pose;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Field dimensions, loaded from `field.toml`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Side length of one tile.
    ///
    /// Units: centimeters
    pub tile_size_cm: f64,

    /// Number of tiles along each side of the field.
    pub size_tiles: u32,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The four starting corners, counter-clockwise from the field origin.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Corner {
    One,
    Two,
    Three,
    Four,
}

#[derive(Debug, thiserror::Error)]
pub enum FieldError {
    #[error("Corner must be between 1 and 4, got {0}")]
    InvalidCorner(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Field {
    /// Side length of the field.
    pub fn size_cm(&self) -> f64 {
        self.tile_size_cm * self.size_tiles as f64
    }

    /// Coordinate of the grid line `tile` tiles in from the first interior
    /// line, so tile 0 is the line one tile away from the wall.
    pub fn tile_to_cm(&self, tile: i32) -> f64 {
        tile as f64 * self.tile_size_cm + self.tile_size_cm
    }

    /// Coordinate of the grid line nearest to `coord_cm`, including the walls.
    pub fn nearest_line_cm(&self, coord_cm: f64) -> f64 {
        let index = (coord_cm / self.tile_size_cm)
            .round()
            .max(0.0)
            .min(self.size_tiles as f64);

        index * self.tile_size_cm
    }

    /// The pose of the corner's walls: at the corner itself, facing along the
    /// wall on the robot's right when it sits in the corner tile.
    pub fn corner_origin(&self, corner: Corner) -> Pose {
        let s = self.size_cm();

        match corner {
            Corner::One => Pose::from_deg(0.0, 0.0, 0.0),
            Corner::Two => Pose::from_deg(s, 0.0, 90.0),
            Corner::Three => Pose::from_deg(s, s, 180.0),
            Corner::Four => Pose::from_deg(0.0, s, 270.0),
        }
    }

    /// Reference pose of a starting corner: on the grid intersection one tile
    /// in from both walls, with the corner's heading.
    pub fn corner_pose(&self, corner: Corner) -> Pose {
        let t = self.tile_size_cm;

        self.corner_origin(corner).compose(&Pose::new(t, t, 0.0))
    }
}

impl Corner {
    /// Corner from its 1-based index.
    pub fn from_index(index: u8) -> Result<Self, FieldError> {
        match index {
            1 => Ok(Corner::One),
            2 => Ok(Corner::Two),
            3 => Ok(Corner::Three),
            4 => Ok(Corner::Four),
            i => Err(FieldError::InvalidCorner(i.to_string())),
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Corner::One => 1,
            Corner::Two => 2,
            Corner::Three => 3,
            Corner::Four => 4,
        }
    }
}

impl FromStr for Corner {
    type Err = FieldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let index = s
            .trim()
            .parse::<u8>()
            .map_err(|_| FieldError::InvalidCorner(s.to_string()))?;

        Corner::from_index(index)
    }
}

impl fmt::Display for Corner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "corner {}", self.index())
    }
}
