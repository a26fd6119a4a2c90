//! The six cube faces
//!
//! The same six names serve as *labels* (what is painted on a face) and as
//! *positions* (where on the cube a face currently sits).

use serde::{Deserialize, Serialize};

/// One of the six cube faces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Face {
    Top,
    Bottom,
    Left,
    Right,
    Front,
    Back,
}

/// A face used as the symbol painted on the cube
pub type Label = Face;

/// A face used as a fixed place on the cube
pub type Position = Face;

impl Face {
    /// All faces in index order
    pub const ALL: [Face; 6] = [
        Face::Top,
        Face::Bottom,
        Face::Left,
        Face::Right,
        Face::Front,
        Face::Back,
    ];

    /// Stable index (0-5) used for table lookups
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Face::Top => 0,
            Face::Bottom => 1,
            Face::Left => 2,
            Face::Right => 3,
            Face::Front => 4,
            Face::Back => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// The face on the other side of the cube
    pub const fn opposite(self) -> Self {
        match self {
            Face::Top => Face::Bottom,
            Face::Bottom => Face::Top,
            Face::Left => Face::Right,
            Face::Right => Face::Left,
            Face::Front => Face::Back,
            Face::Back => Face::Front,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Face::Top => "TOP",
            Face::Bottom => "BOTTOM",
            Face::Left => "LEFT",
            Face::Right => "RIGHT",
            Face::Front => "FRONT",
            Face::Back => "BACK",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "top" | "t" | "up" => Some(Face::Top),
            "bottom" | "b" | "down" => Some(Face::Bottom),
            "left" | "l" => Some(Face::Left),
            "right" | "r" => Some(Face::Right),
            "front" | "f" => Some(Face::Front),
            "back" | "k" => Some(Face::Back),
            _ => None,
        }
    }
}

impl std::fmt::Display for Face {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
