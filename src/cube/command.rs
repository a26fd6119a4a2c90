//! Tilt commands
//!
//! Each command is a quarter turn: it rotates the labels on four positions
//! around a four-cycle and leaves the remaining two positions alone.

use serde::{Deserialize, Serialize};

use super::face::{Face, Position};

/// One tilt of the cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    Left,
    Right,
    Front,
    Back,
}

/// `(destination, source)` pairs: after the command, `destination` holds the
/// label that was on `source`.
type Cycle = [(Position, Position); 4];

const LEFT_CYCLE: Cycle = [
    (Face::Top, Face::Right),
    (Face::Right, Face::Bottom),
    (Face::Bottom, Face::Left),
    (Face::Left, Face::Top),
];

const RIGHT_CYCLE: Cycle = [
    (Face::Top, Face::Left),
    (Face::Left, Face::Bottom),
    (Face::Bottom, Face::Right),
    (Face::Right, Face::Top),
];

const FRONT_CYCLE: Cycle = [
    (Face::Front, Face::Top),
    (Face::Top, Face::Back),
    (Face::Back, Face::Bottom),
    (Face::Bottom, Face::Front),
];

const BACK_CYCLE: Cycle = [
    (Face::Top, Face::Front),
    (Face::Back, Face::Top),
    (Face::Bottom, Face::Back),
    (Face::Front, Face::Bottom),
];

impl Command {
    pub const ALL: [Command; 4] = [Command::Left, Command::Right, Command::Front, Command::Back];

    #[inline]
    pub const fn index(self) -> usize {
        match self {
            Command::Left => 0,
            Command::Right => 1,
            Command::Front => 2,
            Command::Back => 3,
        }
    }

    /// The command that undoes this one
    pub const fn inverse(self) -> Self {
        match self {
            Command::Left => Command::Right,
            Command::Right => Command::Left,
            Command::Front => Command::Back,
            Command::Back => Command::Front,
        }
    }

    /// Label moves performed by this command
    pub(crate) fn cycle(self) -> &'static Cycle {
        match self {
            Command::Left => &LEFT_CYCLE,
            Command::Right => &RIGHT_CYCLE,
            Command::Front => &FRONT_CYCLE,
            Command::Back => &BACK_CYCLE,
        }
    }

    /// The two positions this command never touches
    pub const fn fixed_positions(self) -> [Position; 2] {
        match self {
            Command::Left | Command::Right => [Face::Front, Face::Back],
            Command::Front | Command::Back => [Face::Left, Face::Right],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Command::Left => "LEFT",
            Command::Right => "RIGHT",
            Command::Front => "FRONT",
            Command::Back => "BACK",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "left" | "l" => Some(Command::Left),
            "right" | "r" => Some(Command::Right),
            "front" | "f" => Some(Command::Front),
            "back" | "b" => Some(Command::Back),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
