//! Question generation
//!
//! Builds randomized command sequences under the fairness constraints of each
//! mode and computes the ground-truth answer through `cube::resolve`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::cube::{Command, Face, Label, Position, resolve};
use crate::tuning::{MAX_GENERATION_ATTEMPTS, PhaseSpec};

/// One round's puzzle. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    tracked: Label,
    commands: Vec<Command>,
    answer: Position,
}

impl Question {
    pub fn new(tracked: Label, commands: Vec<Command>) -> Self {
        debug_assert!(!commands.is_empty(), "question with no commands");
        let answer = resolve(&commands, tracked);
        Self {
            tracked,
            commands,
            answer,
        }
    }

    pub fn tracked(&self) -> Label {
        self.tracked
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn answer(&self) -> Position {
        self.answer
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Same tracked label and same command sequence
    pub fn same_puzzle(&self, other: &Question) -> bool {
        self.tracked == other.tracked && self.commands == other.commands
    }
}

fn random_label<R: Rng + ?Sized>(rng: &mut R) -> Label {
    Face::ALL[rng.random_range(0..Face::ALL.len())]
}

fn random_command<R: Rng + ?Sized>(rng: &mut R) -> Command {
    Command::ALL[rng.random_range(0..Command::ALL.len())]
}

/// Exam sequence of `count` commands, never repeating a command back to back
pub fn exam_commands<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<Command> {
    let mut commands: Vec<Command> = Vec::with_capacity(count);
    for _ in 0..count {
        let next = match commands.last() {
            Some(&prev) => {
                // Pick among the three commands that differ from the previous one
                let others: Vec<Command> =
                    Command::ALL.into_iter().filter(|&c| c != prev).collect();
                others[rng.random_range(0..others.len())]
            }
            None => random_command(rng),
        };
        commands.push(next);
    }
    commands
}

/// Exam question: uniform tracked label plus a no-adjacent-repeat sequence
pub fn exam_question<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Question {
    debug_assert!(count > 0, "exam command count must be positive");
    let tracked = random_label(rng);
    Question::new(tracked, exam_commands(rng, count.max(1)))
}

/// Practice question for the `index`-th slot of a phase.
///
/// Rejects a puzzle identical to `last` and retries, accepting whatever comes
/// out once `MAX_GENERATION_ATTEMPTS` is exhausted.
pub fn practice_question<R: Rng + ?Sized>(
    rng: &mut R,
    spec: &PhaseSpec,
    index: u32,
    quota: u32,
    last: Option<&Question>,
) -> Question {
    let count = spec.count.count_for(rng, index, quota).max(1);
    let mut attempt = 0;
    loop {
        let tracked = random_label(rng);
        let commands: Vec<Command> = (0..count).map(|_| random_command(rng)).collect();
        let question = Question::new(tracked, commands);

        attempt += 1;
        match last {
            Some(prev) if question.same_puzzle(prev) => {
                if attempt >= MAX_GENERATION_ATTEMPTS {
                    log::warn!(
                        "Phase {} generator accepted a repeat after {} attempts",
                        spec.phase,
                        attempt
                    );
                    return question;
                }
            }
            _ => return question,
        }
    }
}
