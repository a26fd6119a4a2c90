//! Exam session
//!
//! Cyclic per round: show the tracked label, play the commands one at a time,
//! take exactly one answer, show feedback. Runs until the user exits or the
//! tier's wall-clock cap elapses (mid-round if necessary).

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{AnswerOutcome, Collaborators, SessionEnd, SessionStats};
use crate::cube::{Command, Label, Position};
use crate::generator::{Question, exam_question};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::settings::{PendingSettings, SessionSettings};
use crate::telemetry::{SessionMode, SessionRecord, TelemetrySink};
use crate::tier::{Control, EntitlementOracle, TierBundle};
use crate::tuning::{FEEDBACK_DWELL_MS, TARGET_DISPLAY_MS};

/// Where the exam is in its round loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamPhase {
    /// Created, not started
    Ready,
    /// Tracked label on screen
    ShowingTarget,
    /// Command `step` on screen
    ShowingCommands { step: usize },
    /// Six answer buttons enabled
    WaitingAnswer,
    Feedback { chosen: Position, correct: bool },
    Finished(SessionEnd),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExamTimer {
    TargetShown,
    CommandShown,
    FeedbackDwell,
    SessionCap,
}

/// Inputs accepted by `ExamSession::handle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamInput {
    Start,
    /// Clock advanced; fire whatever came due
    Tick,
    Answer(Position),
    /// Move past feedback (required after a wrong answer)
    Continue,
    Exit,
}

#[derive(Debug)]
pub struct ExamSession {
    bundle: TierBundle,
    settings: SessionSettings,
    pending: PendingSettings,
    seed: u64,
    rng: Pcg32,
    scheduler: Scheduler<ExamTimer>,
    phase: ExamPhase,
    question: Option<Question>,
    round: u32,
    stats: SessionStats,
    started_at_ms: Option<u64>,
    ended_at_ms: Option<u64>,
    reaction_start_ms: Option<u64>,
    feedback_timer: Option<TimerHandle>,
    last_outcome: Option<AnswerOutcome>,
    collaborators: Collaborators,
}

impl ExamSession {
    /// Create a session; `settings` are clamped to the oracle's tier
    pub fn new(
        oracle: &dyn EntitlementOracle,
        settings: SessionSettings,
        seed: u64,
        telemetry: Box<dyn TelemetrySink>,
    ) -> Self {
        let bundle = oracle.bundle();
        debug_assert!(bundle.validate().is_ok(), "inconsistent tier bundle: {bundle:?}");
        Self {
            settings: settings.clamp_to(&bundle),
            bundle,
            pending: PendingSettings::default(),
            seed,
            rng: Pcg32::seed_from_u64(seed),
            scheduler: Scheduler::new(),
            phase: ExamPhase::Ready,
            question: None,
            round: 0,
            stats: SessionStats::new(),
            started_at_ms: None,
            ended_at_ms: None,
            reaction_start_ms: None,
            feedback_timer: None,
            last_outcome: None,
            collaborators: Collaborators::new(telemetry),
        }
    }

    pub fn with_exit_hook(mut self, hook: impl FnMut() + 'static) -> Self {
        self.collaborators.set_exit_hook(Box::new(hook));
        self
    }

    /// Feed one input at time `now_ms`.
    ///
    /// Timers due at or before `now_ms` fire first. Returns false when the
    /// input was not valid in the current phase and was ignored.
    pub fn handle(&mut self, input: ExamInput, now_ms: u64) -> bool {
        if self.is_finished() {
            log::debug!("Exam finished, ignoring {input:?}");
            return false;
        }
        self.fire_due(now_ms);
        if self.is_finished() {
            return false;
        }

        match input {
            ExamInput::Start => self.start(now_ms),
            ExamInput::Tick => true,
            ExamInput::Answer(position) => self.answer(position, now_ms).is_some(),
            ExamInput::Continue => self.continue_round(now_ms),
            ExamInput::Exit => {
                self.exit(now_ms);
                true
            }
        }
    }

    /// Queue new settings for the next round boundary.
    ///
    /// Returns the settings as clamped by the tier.
    pub fn request_settings(&mut self, settings: SessionSettings) -> SessionSettings {
        let clamped = settings.clamp_to(&self.bundle);
        if clamped != settings {
            log::debug!("Settings {settings:?} clamped to {clamped:?} by {:?}", self.bundle.tier);
        }
        match self.phase {
            ExamPhase::Ready => self.settings = clamped,
            ExamPhase::Finished(_) => {}
            _ => self.pending.request(clamped),
        }
        clamped
    }

    fn start(&mut self, now_ms: u64) -> bool {
        if self.phase != ExamPhase::Ready {
            log::debug!("Exam already started");
            return false;
        }
        self.started_at_ms = Some(now_ms);
        if let Some(cap) = self.bundle.session_cap_ms() {
            self.scheduler.schedule(now_ms.saturating_add(cap), ExamTimer::SessionCap);
        }
        log::info!(
            "Exam started: tier={:?} seed={} commands={} speed={}ms",
            self.bundle.tier,
            self.seed,
            self.settings.command_count,
            self.settings.command_speed_ms
        );
        self.begin_round(now_ms);
        true
    }

    fn begin_round(&mut self, now_ms: u64) {
        if let Some(settings) = self.pending.take() {
            self.settings = settings.clamp_to(&self.bundle);
            log::info!("Settings applied at round boundary: {:?}", self.settings);
        }
        self.round += 1;
        self.question = Some(exam_question(&mut self.rng, self.settings.command_count));
        self.reaction_start_ms = None;
        self.last_outcome = None;
        self.set_phase(ExamPhase::ShowingTarget);
        self.scheduler
            .schedule(now_ms + TARGET_DISPLAY_MS, ExamTimer::TargetShown);
    }

    fn fire_due(&mut self, now_ms: u64) {
        while let Some(fired) = self.scheduler.pop_due(now_ms) {
            self.on_timer(fired.payload, fired.at_ms);
            if self.is_finished() {
                break;
            }
        }
    }

    fn on_timer(&mut self, timer: ExamTimer, at_ms: u64) {
        match (timer, self.phase) {
            (ExamTimer::SessionCap, _) => self.finish(SessionEnd::TimeLimit, at_ms),
            (ExamTimer::TargetShown, ExamPhase::ShowingTarget) => {
                self.set_phase(ExamPhase::ShowingCommands { step: 0 });
                self.scheduler
                    .schedule(at_ms + self.settings.command_speed_ms, ExamTimer::CommandShown);
            }
            (ExamTimer::CommandShown, ExamPhase::ShowingCommands { step }) => {
                let len = self.question.as_ref().map_or(0, Question::len);
                if step + 1 < len {
                    self.set_phase(ExamPhase::ShowingCommands { step: step + 1 });
                    self.scheduler
                        .schedule(at_ms + self.settings.command_speed_ms, ExamTimer::CommandShown);
                } else {
                    // Reaction clock starts when the last command leaves the screen
                    self.reaction_start_ms = Some(at_ms);
                    self.set_phase(ExamPhase::WaitingAnswer);
                }
            }
            (ExamTimer::FeedbackDwell, ExamPhase::Feedback { .. }) => {
                self.feedback_timer = None;
                self.begin_round(at_ms);
            }
            (timer, phase) => log::debug!("Stale {timer:?} in {phase:?}"),
        }
    }

    fn answer(&mut self, chosen: Position, now_ms: u64) -> Option<AnswerOutcome> {
        if self.phase != ExamPhase::WaitingAnswer {
            log::debug!("Answer {chosen} ignored in {:?}", self.phase);
            return None;
        }
        let expected = self.question.as_ref()?.answer();
        let correct = chosen == expected;
        let reaction_ms = now_ms.saturating_sub(self.reaction_start_ms.unwrap_or(now_ms));
        self.stats.record_answer(correct, reaction_ms);

        let outcome = AnswerOutcome {
            chosen,
            expected,
            correct,
            reaction_ms,
        };
        self.last_outcome = Some(outcome);
        self.set_phase(ExamPhase::Feedback { chosen, correct });
        if correct {
            self.feedback_timer = Some(
                self.scheduler
                    .schedule(now_ms + FEEDBACK_DWELL_MS, ExamTimer::FeedbackDwell),
            );
        }
        Some(outcome)
    }

    fn continue_round(&mut self, now_ms: u64) -> bool {
        if !matches!(self.phase, ExamPhase::Feedback { .. }) {
            log::debug!("Continue ignored in {:?}", self.phase);
            return false;
        }
        if let Some(handle) = self.feedback_timer.take() {
            self.scheduler.cancel(handle);
        }
        self.begin_round(now_ms);
        true
    }

    fn exit(&mut self, now_ms: u64) {
        self.finish(SessionEnd::Exited, now_ms);
        self.collaborators.notify_exit();
    }

    fn finish(&mut self, reason: SessionEnd, at_ms: u64) {
        let cancelled = self.scheduler.cancel_all();
        self.feedback_timer = None;
        self.ended_at_ms = Some(at_ms);
        self.set_phase(ExamPhase::Finished(reason));
        log::info!(
            "Exam ended ({reason:?}) after {} rounds: score={} cancelled_timers={}",
            self.round,
            self.stats.score,
            cancelled
        );
        let record = self.record();
        self.collaborators.flush(&record);
    }

    fn set_phase(&mut self, phase: ExamPhase) {
        log::debug!("Exam round {}: {:?} -> {:?}", self.round, self.phase, phase);
        self.phase = phase;
    }

    /// Summary as it would be pushed to telemetry right now
    pub fn record(&self) -> SessionRecord {
        let duration_ms = match (self.started_at_ms, self.ended_at_ms) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        };
        SessionRecord {
            mode: SessionMode::Exam,
            score: self.stats.score,
            duration_seconds: duration_ms as f64 / 1000.0,
            round_count: self.stats.answered(),
            correct_count: self.stats.correct,
            wrong_count: self.stats.wrong,
            avg_reaction_time_ms: self.stats.mean_reaction_ms(),
            settings: self.settings,
        }
    }

    pub fn phase(&self) -> ExamPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, ExamPhase::Finished(_))
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn tracked_label(&self) -> Option<Label> {
        self.question.as_ref().map(Question::tracked)
    }

    /// Command currently on screen
    pub fn visible_command(&self) -> Option<Command> {
        match self.phase {
            ExamPhase::ShowingCommands { step } => {
                self.question.as_ref().and_then(|q| q.commands().get(step).copied())
            }
            _ => None,
        }
    }

    pub fn answer_enabled(&self) -> bool {
        self.phase == ExamPhase::WaitingAnswer
    }

    pub fn last_outcome(&self) -> Option<AnswerOutcome> {
        self.last_outcome
    }

    /// 1-based index of the current round (0 before start)
    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    pub fn pending_settings(&self) -> Option<SessionSettings> {
        self.pending.peek()
    }

    pub fn bundle(&self) -> &TierBundle {
        &self.bundle
    }

    /// Command-count and speed controls; disabled ones must not be interactive
    pub fn controls(&self) -> (Control<usize>, Control<u64>) {
        (
            self.bundle.command_count_control(),
            self.bundle.command_speed_control(),
        )
    }

    /// When the next timer fires, if any
    pub fn next_deadline(&self) -> Option<u64> {
        self.scheduler.next_deadline()
    }

    pub fn pending_timers(&self) -> usize {
        self.scheduler.len()
    }

    pub fn telemetry_flushed(&self) -> bool {
        self.collaborators.flushed()
    }
}
