//! Orientation algebra
//!
//! Pure and total: no randomness, no timing, no failure cases.
//! - `face`: the six labels / positions
//! - `command`: the four tilt commands and their four-cycles
//! - `state`: `CubeState`, `apply`, `locate`, `resolve`

pub mod command;
pub mod face;
pub mod state;

pub use command::Command;
pub use face::{Face, Label, Position};
pub use state::{CubeState, ROTATION_GROUP_ORDER, apply, locate, reachable_states, resolve};
