//! Entitlement tiers
//!
//! The tier bundle is consumed, never owned, by the sessions: it clamps the
//! command count, command speed, session length, and which practice phases
//! are reachable.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tuning::PHASE_COUNT;

/// Longest session cap accepted from configuration (one year)
pub const MAX_SESSION_CAP_SECS: u64 = 365 * 24 * 60 * 60;

/// Subscription level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Guest,
    Free,
    Premium,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Guest, Tier::Free, Tier::Premium];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Guest => "Guest",
            Tier::Free => "Free",
            Tier::Premium => "Premium",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "guest" => Some(Tier::Guest),
            "free" => Some(Tier::Free),
            "premium" | "pro" | "paid" => Some(Tier::Premium),
            _ => None,
        }
    }

    /// Built-in parameter bundle for this tier
    pub fn bundle(&self) -> TierBundle {
        match self {
            Tier::Guest => TierBundle {
                tier: Tier::Guest,
                command_count: 3,
                command_count_range: (3, 3),
                command_speed_ms: 2000,
                command_speed_range_ms: (2000, 2000),
                session_duration_cap_secs: 120,
                phase_quotas: [3, 3, 0, 0],
            },
            Tier::Free => TierBundle {
                tier: Tier::Free,
                command_count: 3,
                command_count_range: (3, 3),
                command_speed_ms: 2000,
                command_speed_range_ms: (2000, 2000),
                session_duration_cap_secs: 120,
                phase_quotas: [5, 5, 5, 0],
            },
            Tier::Premium => TierBundle {
                tier: Tier::Premium,
                command_count: 3,
                command_count_range: (1, 10),
                command_speed_ms: 1500,
                command_speed_range_ms: (500, 3000),
                session_duration_cap_secs: 0,
                phase_quotas: [10, 10, 10, 10],
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TierError {
    #[error("{tier:?}: command count range {min}..={max} is empty or starts at zero")]
    CountRange { tier: Tier, min: usize, max: usize },
    #[error("{tier:?}: command speed range {min}..={max} ms is empty or starts at zero")]
    SpeedRange { tier: Tier, min: u64, max: u64 },
    #[error("{tier:?}: default {field} {value} lies outside the allowed range")]
    DefaultOutOfRange {
        tier: Tier,
        field: &'static str,
        value: u64,
    },
    #[error("{tier:?}: session cap of {secs}s exceeds the {max}s limit")]
    SessionCap { tier: Tier, secs: u64, max: u64 },
    #[error("{tier:?}: phase {phase} has a quota but an earlier phase is locked")]
    UnreachablePhase { tier: Tier, phase: u8 },
}

/// An allowance for one user-facing control
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Control<T> {
    pub min: T,
    pub max: T,
    /// False when the tier pins the value; the control must be disabled
    pub enabled: bool,
}

impl<T: PartialOrd + Copy> Control<T> {
    pub fn allows(&self, value: T) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Parameters granted by a tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierBundle {
    pub tier: Tier,
    /// Default exam command count
    pub command_count: usize,
    /// Inclusive allowed command counts
    pub command_count_range: (usize, usize),
    /// Default per-command display time (ms)
    pub command_speed_ms: u64,
    /// Inclusive allowed per-command display times (ms)
    pub command_speed_range_ms: (u64, u64),
    /// Wall-clock session limit in seconds (0 = unlimited)
    pub session_duration_cap_secs: u64,
    /// Practice questions per phase (0 = inaccessible)
    pub phase_quotas: [u32; PHASE_COUNT],
}

impl Default for TierBundle {
    fn default() -> Self {
        Tier::Guest.bundle()
    }
}

impl TierBundle {
    /// Practice quota for a 1-based phase (0 for unknown phases)
    pub fn quota_for_phase(&self, phase: u8) -> u32 {
        match phase {
            1..=4 => self.phase_quotas[usize::from(phase) - 1],
            _ => 0,
        }
    }

    /// Session limit in milliseconds, `None` when unlimited
    pub fn session_cap_ms(&self) -> Option<u64> {
        let secs = self.session_duration_cap_secs;
        (secs > 0).then(|| secs.saturating_mul(1000))
    }

    pub fn command_count_control(&self) -> Control<usize> {
        let (min, max) = self.command_count_range;
        Control {
            min,
            max,
            enabled: min < max,
        }
    }

    pub fn command_speed_control(&self) -> Control<u64> {
        let (min, max) = self.command_speed_range_ms;
        Control {
            min,
            max,
            enabled: min < max,
        }
    }

    /// Check the bundle is internally consistent
    pub fn validate(&self) -> Result<(), TierError> {
        let tier = self.tier;
        let (cmin, cmax) = self.command_count_range;
        if cmin == 0 || cmin > cmax {
            return Err(TierError::CountRange {
                tier,
                min: cmin,
                max: cmax,
            });
        }
        let (smin, smax) = self.command_speed_range_ms;
        if smin == 0 || smin > smax {
            return Err(TierError::SpeedRange {
                tier,
                min: smin,
                max: smax,
            });
        }
        if !self.command_count_control().allows(self.command_count) {
            return Err(TierError::DefaultOutOfRange {
                tier,
                field: "command count",
                value: self.command_count as u64,
            });
        }
        if !self.command_speed_control().allows(self.command_speed_ms) {
            return Err(TierError::DefaultOutOfRange {
                tier,
                field: "command speed",
                value: self.command_speed_ms,
            });
        }
        if self.session_duration_cap_secs > MAX_SESSION_CAP_SECS {
            return Err(TierError::SessionCap {
                tier,
                secs: self.session_duration_cap_secs,
                max: MAX_SESSION_CAP_SECS,
            });
        }
        // Phases are strictly sequential, so a locked phase locks all later ones
        let mut locked = false;
        for (i, &quota) in self.phase_quotas.iter().enumerate() {
            if quota == 0 {
                locked = true;
            } else if locked {
                return Err(TierError::UnreachablePhase {
                    tier,
                    phase: i as u8 + 1,
                });
            }
        }
        Ok(())
    }
}

/// Synchronous, side-effect-free source of the active tier bundle
pub trait EntitlementOracle {
    fn bundle(&self) -> TierBundle;
}

impl EntitlementOracle for TierBundle {
    fn bundle(&self) -> TierBundle {
        self.clone()
    }
}

impl EntitlementOracle for Tier {
    fn bundle(&self) -> TierBundle {
        Tier::bundle(self)
    }
}

/// Tier bundles loaded from configuration, falling back to the built-ins
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TierTable {
    pub tiers: Vec<TierBundle>,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            tiers: Tier::ALL.iter().map(Tier::bundle).collect(),
        }
    }
}

impl TierTable {
    /// Parse and validate a JSON tier table
    pub fn from_json(json: &str) -> crate::Result<Self> {
        let table: TierTable = serde_json::from_str(json)?;
        for bundle in &table.tiers {
            bundle.validate()?;
        }
        log::info!("Loaded {} tier bundles", table.tiers.len());
        Ok(table)
    }

    pub fn load(path: impl AsRef<Path>) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Bundle for `tier`; built-in preset if the table has none
    pub fn get(&self, tier: Tier) -> TierBundle {
        self.tiers
            .iter()
            .find(|b| b.tier == tier)
            .cloned()
            .unwrap_or_else(|| tier.bundle())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_bundles_validate() {
        for tier in Tier::ALL {
            assert_eq!(tier.bundle().validate(), Ok(()));
        }
    }

    #[test]
    fn test_guest_bundle_is_mini_exam() {
        let b = Tier::Guest.bundle();
        assert_eq!(b.command_count, 3);
        assert_eq!(b.command_speed_ms, 2000);
        assert_eq!(b.session_cap_ms(), Some(120_000));
        assert!(!b.command_count_control().enabled);
        assert!(!b.command_speed_control().enabled);
        assert_eq!(b.quota_for_phase(3), 0);
    }

    #[test]
    fn test_premium_is_unlimited() {
        let b = Tier::Premium.bundle();
        assert_eq!(b.session_cap_ms(), None);
        assert!(b.command_count_control().enabled);
        assert!(b.command_count_control().allows(10));
        assert!(!b.command_count_control().allows(11));
        assert_eq!(b.quota_for_phase(4), 10);
        assert_eq!(b.quota_for_phase(0), 0);
        assert_eq!(b.quota_for_phase(5), 0);
    }

    #[test]
    fn test_validate_rejects_gap_in_quotas() {
        let mut b = Tier::Free.bundle();
        b.phase_quotas = [5, 0, 5, 0];
        assert_eq!(
            b.validate(),
            Err(TierError::UnreachablePhase {
                tier: Tier::Free,
                phase: 3
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_defaults() {
        let mut b = Tier::Premium.bundle();
        b.command_count = 0;
        assert!(matches!(b.validate(), Err(TierError::DefaultOutOfRange { .. })));

        let mut b = Tier::Premium.bundle();
        b.command_speed_range_ms = (0, 100);
        assert!(matches!(b.validate(), Err(TierError::SpeedRange { .. })));
    }

    #[test]
    fn test_table_from_json_overrides_and_falls_back() {
        let json = r#"{"tiers":[{
            "tier":"free",
            "command_count":4,
            "command_count_range":[2,6],
            "command_speed_ms":1800,
            "command_speed_range_ms":[1000,2000],
            "session_duration_cap_secs":300,
            "phase_quotas":[4,4,4,4]
        }]}"#;
        let table = TierTable::from_json(json).unwrap();
        assert_eq!(table.get(Tier::Free).command_count, 4);
        assert_eq!(table.get(Tier::Premium), Tier::Premium.bundle());
    }

    #[test]
    fn test_table_from_json_validates() {
        let json = r#"{"tiers":[{
            "tier":"guest",
            "command_count":3,
            "command_count_range":[0,6],
            "command_speed_ms":1800,
            "command_speed_range_ms":[1000,2000],
            "session_duration_cap_secs":0,
            "phase_quotas":[1,1,1,1]
        }]}"#;
        assert!(matches!(
            TierTable::from_json(json),
            Err(crate::Error::Tier(TierError::CountRange { .. }))
        ));
    }

    #[test]
    fn test_table_from_json_rejects_huge_session_cap() {
        let json = r#"{"tiers":[{
            "tier":"free",
            "command_count":3,
            "command_count_range":[3,3],
            "command_speed_ms":2000,
            "command_speed_range_ms":[2000,2000],
            "session_duration_cap_secs":18446744073709551615,
            "phase_quotas":[5,5,5,0]
        }]}"#;
        assert!(matches!(
            TierTable::from_json(json),
            Err(crate::Error::Tier(TierError::SessionCap { .. }))
        ));
    }

    #[test]
    fn test_session_cap_ms_saturates() {
        let mut b = Tier::Free.bundle();
        b.session_duration_cap_secs = u64::MAX;
        assert_eq!(b.session_cap_ms(), Some(u64::MAX));

        b.session_duration_cap_secs = MAX_SESSION_CAP_SECS;
        assert_eq!(b.validate(), Ok(()));
        assert_eq!(b.session_cap_ms(), Some(MAX_SESSION_CAP_SECS * 1000));
    }
}
