//! Data-driven balance
//!
//! Timing constants and the practice phase table. The four practice phases are
//! one parameterized engine; everything that differs between them lives here.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// How long the tracked label is shown before commands start (ms)
pub const TARGET_DISPLAY_MS: u64 = 2000;
/// Dwell on a correct answer before the next round starts (ms)
pub const FEEDBACK_DWELL_MS: u64 = 1500;
/// Points awarded per correct answer
pub const POINTS_PER_CORRECT: u64 = 10;
/// Reaction-time samples kept for the rolling mean
pub const REACTION_WINDOW: usize = 50;
/// Rejection-sampling bound before the generator accepts a repeat
pub const MAX_GENERATION_ATTEMPTS: u32 = 32;
/// Number of practice phases
pub const PHASE_COUNT: usize = 4;

/// How many commands a practice question gets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    /// Always this many
    Exactly(usize),
    /// `first` for the opening `percent`% of the phase quota, `then` after
    Split {
        first: usize,
        then: usize,
        percent: u32,
    },
    /// Uniformly one of the listed counts
    OneOf(&'static [usize]),
}

impl CountPolicy {
    /// Command count for the `index`-th (0-based) question of a phase of size `quota`
    pub fn count_for<R: Rng + ?Sized>(&self, rng: &mut R, index: u32, quota: u32) -> usize {
        match *self {
            CountPolicy::Exactly(n) => n,
            CountPolicy::Split {
                first,
                then,
                percent,
            } => {
                // index < ceil(quota * percent / 100)
                if u64::from(index) * 100 < u64::from(quota) * u64::from(percent) {
                    first
                } else {
                    then
                }
            }
            CountPolicy::OneOf(choices) => {
                debug_assert!(!choices.is_empty());
                choices[rng.random_range(0..choices.len())]
            }
        }
    }

    /// Smallest count this policy can produce
    pub fn min(&self) -> usize {
        match *self {
            CountPolicy::Exactly(n) => n,
            CountPolicy::Split { first, then, .. } => first.min(then),
            CountPolicy::OneOf(choices) => choices.iter().copied().min().unwrap_or(1),
        }
    }

    /// Largest count this policy can produce
    pub fn max(&self) -> usize {
        match *self {
            CountPolicy::Exactly(n) => n,
            CountPolicy::Split { first, then, .. } => first.max(then),
            CountPolicy::OneOf(choices) => choices.iter().copied().max().unwrap_or(1),
        }
    }
}

/// Visual assistance for the per-step before/after illustrations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssistPolicy {
    /// Every step illustrated
    Full,
    /// Between `min` and `max` steps blurred (capped at the step count)
    Blur { min: usize, max: usize },
    /// No illustrations at all
    Hidden,
}

impl AssistPolicy {
    /// Which of `steps` illustrations are blurred for one question
    pub fn blur_mask<R: Rng + ?Sized>(&self, rng: &mut R, steps: usize) -> Vec<bool> {
        let mut mask = vec![false; steps];
        if let AssistPolicy::Blur { min, max } = *self {
            let amount = rng.random_range(min..=max.max(min)).min(steps);
            for i in rand::seq::index::sample(rng, steps, amount) {
                mask[i] = true;
            }
        }
        mask
    }

    /// True when the policy shows no illustrations at all
    pub fn is_hidden(&self) -> bool {
        matches!(self, AssistPolicy::Hidden)
    }
}

/// One row of the practice phase table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseSpec {
    /// Ordinal 1-4
    pub phase: u8,
    pub count: CountPolicy,
    /// How long each command is displayed (ms)
    pub per_command_ms: u64,
    pub assist: AssistPolicy,
}

pub static PHASES: [PhaseSpec; PHASE_COUNT] = [
    PhaseSpec {
        phase: 1,
        count: CountPolicy::Exactly(1),
        per_command_ms: 3000,
        assist: AssistPolicy::Full,
    },
    PhaseSpec {
        phase: 2,
        count: CountPolicy::Split {
            first: 2,
            then: 3,
            percent: 60,
        },
        per_command_ms: 2500,
        assist: AssistPolicy::Blur { min: 1, max: 1 },
    },
    PhaseSpec {
        phase: 3,
        count: CountPolicy::OneOf(&[4, 5]),
        per_command_ms: 2000,
        assist: AssistPolicy::Blur { min: 2, max: 3 },
    },
    PhaseSpec {
        phase: 4,
        count: CountPolicy::OneOf(&[6, 7, 8]),
        per_command_ms: 1500,
        assist: AssistPolicy::Hidden,
    },
];

/// Table row for a 1-based phase ordinal
pub fn phase_spec(phase: u8) -> Option<&'static PhaseSpec> {
    PHASES.iter().find(|p| p.phase == phase)
}
