//! Session state machines
//!
//! Both engines share the same single-question loop shape and are driven the
//! same way: the caller feeds inputs stamped with the current time, and any
//! timers that came due by then fire first, in order.
//!
//! # Components
//! - `exam.rs`: timed exam with score and reaction-time telemetry
//! - `practice.rs`: four escalating phases with visual assist and results
//! - `stats.rs`: counters shared by both

pub mod exam;
pub mod practice;
pub mod stats;

pub use exam::{ExamInput, ExamPhase, ExamSession};
pub use practice::{
    Illustration, PhaseSummary, PracticeInput, PracticeResults, PracticeSession, PracticeStage,
    Visibility,
};
pub use stats::SessionStats;

use serde::{Deserialize, Serialize};

use crate::telemetry::{SessionRecord, TelemetrySink, deliver};

/// Why a session stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEnd {
    /// Every reachable round or phase was played
    Completed,
    /// The tier's wall-clock cap elapsed
    TimeLimit,
    /// The user left
    Exited,
}

/// Result of one accepted answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub chosen: crate::cube::Position,
    pub expected: crate::cube::Position,
    pub correct: bool,
    pub reaction_ms: u64,
}

/// Callback run when the user abandons a session
pub type ExitHook = Box<dyn FnMut()>;

/// External collaborators a session reports to
pub(crate) struct Collaborators {
    telemetry: Box<dyn TelemetrySink>,
    on_exit: Option<ExitHook>,
    flushed: bool,
}

impl Collaborators {
    pub(crate) fn new(telemetry: Box<dyn TelemetrySink>) -> Self {
        Self {
            telemetry,
            on_exit: None,
            flushed: false,
        }
    }

    pub(crate) fn set_exit_hook(&mut self, hook: ExitHook) {
        self.on_exit = Some(hook);
    }

    /// Push the summary once; later calls are ignored
    pub(crate) fn flush(&mut self, record: &SessionRecord) {
        if std::mem::replace(&mut self.flushed, true) {
            return;
        }
        deliver(self.telemetry.as_mut(), record);
    }

    pub(crate) fn flushed(&self) -> bool {
        self.flushed
    }

    pub(crate) fn notify_exit(&mut self) {
        if let Some(hook) = self.on_exit.as_mut() {
            hook();
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("on_exit", &self.on_exit.is_some())
            .field("flushed", &self.flushed)
            .finish()
    }
}
