//! Session settings
//!
//! Command count and display speed, clamped by the active tier. Changes only
//! take effect at a round boundary; see `PendingSettings`.

use serde::{Deserialize, Serialize};

use crate::tier::TierBundle;

/// Player-adjustable session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Commands per exam question
    pub command_count: usize,
    /// How long each command is displayed (ms)
    pub command_speed_ms: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_bundle(&TierBundle::default())
    }
}

impl SessionSettings {
    /// The tier's default settings
    pub fn from_bundle(bundle: &TierBundle) -> Self {
        Self {
            command_count: bundle.command_count,
            command_speed_ms: bundle.command_speed_ms,
        }
    }

    /// Clamp into the tier's allowance
    pub fn clamp_to(self, bundle: &TierBundle) -> Self {
        let count = bundle.command_count_control();
        let speed = bundle.command_speed_control();
        Self {
            command_count: self.command_count.clamp(count.min, count.max),
            command_speed_ms: self.command_speed_ms.clamp(speed.min, speed.max),
        }
    }

    /// True when nothing would change under `clamp_to`
    pub fn within(&self, bundle: &TierBundle) -> bool {
        self.clamp_to(bundle) == *self
    }
}

/// Settings waiting for the next round boundary
#[derive(Debug, Clone, Copy, Default)]
pub struct PendingSettings {
    pending: Option<SessionSettings>,
}

impl PendingSettings {
    /// Queue a change; a later request replaces an earlier one
    pub fn request(&mut self, settings: SessionSettings) {
        self.pending = Some(settings);
    }

    pub fn peek(&self) -> Option<SessionSettings> {
        self.pending
    }

    /// Take the queued change at a round boundary
    pub fn take(&mut self) -> Option<SessionSettings> {
        self.pending.take()
    }
}
