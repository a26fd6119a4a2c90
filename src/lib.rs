//! Cube Tilt - spatial-reasoning assessment engine
//!
//! A labeled cube is tilted by a short command sequence; the player reports
//! where the tracked face ended up.
//!
//! Core modules:
//! - `cube`: Orientation algebra (pure permutation logic)
//! - `generator`: Constrained random question generation
//! - `session`: Timer-driven exam and practice state machines
//! - `scheduler`: Virtual-clock timer queue owned by each session
//! - `tier`: Entitlement bundles that clamp session parameters
//! - `settings`: Player-adjustable session settings
//! - `telemetry`: Session summaries pushed to an external sink
//! - `tuning`: Data-driven timing and phase table

pub mod cube;
pub mod error;
pub mod generator;
pub mod scheduler;
pub mod session;
pub mod settings;
pub mod telemetry;
pub mod tier;
pub mod tuning;

pub use cube::{Command, CubeState, Face, Label, Position, resolve};
pub use error::{Error, Result};
pub use generator::Question;
pub use session::{ExamSession, PracticeSession, SessionEnd};
pub use settings::SessionSettings;
pub use telemetry::{SessionRecord, TelemetrySink};
pub use tier::{EntitlementOracle, Tier, TierBundle};
