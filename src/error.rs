//! Crate-level error type
//!
//! Wraps the per-module errors surfaced by the public API.

use thiserror::Error;

use crate::telemetry::TelemetryError;
use crate::tier::TierError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("tier configuration: {0}")]
    Tier(#[from] TierError),
    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
