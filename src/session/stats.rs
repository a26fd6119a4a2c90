//! Score, accuracy, and reaction-time tracking

use std::collections::VecDeque;

use crate::tuning::{POINTS_PER_CORRECT, REACTION_WINDOW};

#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    pub score: u64,
    pub correct: u32,
    pub wrong: u32,
    /// Most recent reaction times (ms), oldest first
    reaction_ms: VecDeque<u64>,
    mean_reaction_ms: f64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one answer and recompute the aggregates
    pub fn record_answer(&mut self, correct: bool, reaction_ms: u64) {
        if correct {
            self.correct += 1;
            self.score += POINTS_PER_CORRECT;
        } else {
            self.wrong += 1;
        }

        self.reaction_ms.push_back(reaction_ms);
        if self.reaction_ms.len() > REACTION_WINDOW {
            self.reaction_ms.pop_front();
        }
        let total: u64 = self.reaction_ms.iter().sum();
        self.mean_reaction_ms = total as f64 / self.reaction_ms.len() as f64;
    }

    pub fn answered(&self) -> u32 {
        self.correct + self.wrong
    }

    /// Fraction correct (0.0-1.0), 0 before the first answer
    pub fn accuracy(&self) -> f64 {
        match self.answered() {
            0 => 0.0,
            n => f64::from(self.correct) / f64::from(n),
        }
    }

    /// Mean over the rolling window (ms), 0 before the first answer
    pub fn mean_reaction_ms(&self) -> f64 {
        self.mean_reaction_ms
    }

    pub fn reaction_samples(&self) -> impl Iterator<Item = u64> + '_ {
        self.reaction_ms.iter().copied()
    }
}
