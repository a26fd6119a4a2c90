//! Practice session
//!
//! Four escalating phases over the same single-question loop as the exam:
//! START (tracked label, user acknowledges) -> COMMAND (one step at a time,
//! each with a before/after illustration that may be blurred) -> QUESTION ->
//! FEEDBACK. The last question of a phase either opens the next phase or, when
//! the tier locks it, lands on RESULTS.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::{AnswerOutcome, Collaborators, SessionEnd, SessionStats};
use crate::cube::{Command, CubeState, Label, Position};
use crate::generator::{Question, practice_question};
use crate::scheduler::{Scheduler, TimerHandle};
use crate::settings::SessionSettings;
use crate::telemetry::{SessionMode, SessionRecord, TelemetrySink};
use crate::tier::{EntitlementOracle, TierBundle};
use crate::tuning::{FEEDBACK_DWELL_MS, PHASE_COUNT, PhaseSpec, phase_spec};

/// Where the practice session is in its question loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeStage {
    /// Created, not started
    Ready,
    /// Tracked label shown, waiting for acknowledgement
    Start,
    /// Command `step` on screen
    Command { step: usize },
    /// Six answer buttons enabled
    Question,
    Feedback { chosen: Position, correct: bool },
    /// Terminal summary screen
    Results,
    /// User left
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PracticeTimer {
    StepShown,
    FeedbackDwell,
    SessionCap,
}

/// Inputs accepted by `PracticeSession::handle`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PracticeInput {
    Start,
    /// Clock advanced; fire whatever came due
    Tick,
    /// Dismiss the START screen
    Acknowledge,
    Answer(Position),
    Continue,
    Exit,
}

/// How a step illustration is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Shown,
    Blurred,
    /// The phase shows no illustrations
    Hidden,
}

/// Before/after view of one command step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Illustration {
    pub step: usize,
    pub command: Command,
    pub before: CubeState,
    pub after: CubeState,
    pub visibility: Visibility,
}

/// Accuracy for one phase
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseSummary {
    pub phase: u8,
    pub correct: u32,
    pub wrong: u32,
}

impl PhaseSummary {
    pub fn answered(&self) -> u32 {
        self.correct + self.wrong
    }

    pub fn accuracy(&self) -> f64 {
        match self.answered() {
            0 => 0.0,
            n => f64::from(self.correct) / f64::from(n),
        }
    }
}

/// Contents of the RESULTS screen
#[derive(Debug, Clone, PartialEq)]
pub struct PracticeResults {
    pub end: SessionEnd,
    pub phases: Vec<PhaseSummary>,
    /// Command that most often closed a wrongly answered question
    pub most_missed: Option<Command>,
    /// Phases the tier did not grant
    pub locked_phases: Vec<u8>,
    pub score: u64,
    pub avg_reaction_time_ms: f64,
}

#[derive(Debug)]
pub struct PracticeSession {
    bundle: TierBundle,
    seed: u64,
    rng: Pcg32,
    scheduler: Scheduler<PracticeTimer>,
    stage: PracticeStage,
    phase: u8,
    /// 0-based question index within the current phase
    index: u32,
    /// Current question; also the anti-repetition reference for the next one
    question: Option<Question>,
    blurred: Vec<bool>,
    stats: SessionStats,
    tally: PhaseSummary,
    completed_phases: Vec<PhaseSummary>,
    missed: [u32; 4],
    started_at_ms: Option<u64>,
    ended_at_ms: Option<u64>,
    reaction_start_ms: Option<u64>,
    feedback_timer: Option<TimerHandle>,
    last_outcome: Option<AnswerOutcome>,
    end: Option<SessionEnd>,
    collaborators: Collaborators,
}

impl PracticeSession {
    pub fn new(oracle: &dyn EntitlementOracle, seed: u64, telemetry: Box<dyn TelemetrySink>) -> Self {
        let bundle = oracle.bundle();
        debug_assert!(bundle.validate().is_ok(), "inconsistent tier bundle: {bundle:?}");
        Self {
            bundle,
            seed,
            rng: Pcg32::seed_from_u64(seed),
            scheduler: Scheduler::new(),
            stage: PracticeStage::Ready,
            phase: 1,
            index: 0,
            question: None,
            blurred: Vec::new(),
            stats: SessionStats::new(),
            tally: PhaseSummary {
                phase: 1,
                correct: 0,
                wrong: 0,
            },
            completed_phases: Vec::new(),
            missed: [0; 4],
            started_at_ms: None,
            ended_at_ms: None,
            reaction_start_ms: None,
            feedback_timer: None,
            last_outcome: None,
            end: None,
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
    /// input was not valid in the current stage and was ignored.
    pub fn handle(&mut self, input: PracticeInput, now_ms: u64) -> bool {
        if self.is_over() {
            log::debug!("Practice over, ignoring {input:?}");
            return false;
        }
        self.fire_due(now_ms);
        if self.is_over() {
            return false;
        }

        match input {
            PracticeInput::Start => self.start(now_ms),
            PracticeInput::Tick => true,
            PracticeInput::Acknowledge => self.acknowledge(now_ms),
            PracticeInput::Answer(position) => self.answer(position, now_ms).is_some(),
            PracticeInput::Continue => self.continue_question(now_ms),
            PracticeInput::Exit => {
                self.exit(now_ms);
                true
            }
        }
    }

    fn spec(&self) -> &'static PhaseSpec {
        // phase is only ever set to a table ordinal
        phase_spec(self.phase).unwrap_or(&crate::tuning::PHASES[0])
    }

    fn start(&mut self, now_ms: u64) -> bool {
        if self.stage != PracticeStage::Ready {
            log::debug!("Practice already started");
            return false;
        }
        self.started_at_ms = Some(now_ms);
        if let Some(cap) = self.bundle.session_cap_ms() {
            self.scheduler.schedule(now_ms.saturating_add(cap), PracticeTimer::SessionCap);
        }
        log::info!(
            "Practice started: tier={:?} seed={} quotas={:?}",
            self.bundle.tier,
            self.seed,
            self.bundle.phase_quotas
        );
        if self.bundle.quota_for_phase(1) == 0 {
            self.show_results(SessionEnd::Completed, now_ms);
        } else {
            self.begin_question();
        }
        true
    }

    fn begin_question(&mut self) {
        let spec = self.spec();
        let quota = self.bundle.quota_for_phase(self.phase);
        let question =
            practice_question(&mut self.rng, spec, self.index, quota, self.question.as_ref());
        self.blurred = spec.assist.blur_mask(&mut self.rng, question.len());
        self.question = Some(question);
        self.reaction_start_ms = None;
        self.last_outcome = None;
        self.set_stage(PracticeStage::Start);
    }

    fn acknowledge(&mut self, now_ms: u64) -> bool {
        if self.stage != PracticeStage::Start {
            log::debug!("Acknowledge ignored in {:?}", self.stage);
            return false;
        }
        let step_ms = self.spec().per_command_ms;
        self.set_stage(PracticeStage::Command { step: 0 });
        self.scheduler.schedule(now_ms + step_ms, PracticeTimer::StepShown);
        true
    }

    fn fire_due(&mut self, now_ms: u64) {
        while let Some(fired) = self.scheduler.pop_due(now_ms) {
            self.on_timer(fired.payload, fired.at_ms);
            if self.is_over() {
                break;
            }
        }
    }

    fn on_timer(&mut self, timer: PracticeTimer, at_ms: u64) {
        match (timer, self.stage) {
            (PracticeTimer::SessionCap, _) => self.show_results(SessionEnd::TimeLimit, at_ms),
            (PracticeTimer::StepShown, PracticeStage::Command { step }) => {
                let len = self.question.as_ref().map_or(0, Question::len);
                if step + 1 < len {
                    let step_ms = self.spec().per_command_ms;
                    self.set_stage(PracticeStage::Command { step: step + 1 });
                    self.scheduler.schedule(at_ms + step_ms, PracticeTimer::StepShown);
                } else {
                    self.reaction_start_ms = Some(at_ms);
                    self.set_stage(PracticeStage::Question);
                }
            }
            (PracticeTimer::FeedbackDwell, PracticeStage::Feedback { .. }) => {
                self.feedback_timer = None;
                self.next_question(at_ms);
            }
            (timer, stage) => log::debug!("Stale {timer:?} in {stage:?}"),
        }
    }

    fn answer(&mut self, chosen: Position, now_ms: u64) -> Option<AnswerOutcome> {
        if self.stage != PracticeStage::Question {
            log::debug!("Answer {chosen} ignored in {:?}", self.stage);
            return None;
        }
        let question = self.question.as_ref()?;
        let expected = question.answer();
        let last_command = question.commands().last().copied();
        let correct = chosen == expected;
        let reaction_ms = now_ms.saturating_sub(self.reaction_start_ms.unwrap_or(now_ms));

        self.stats.record_answer(correct, reaction_ms);
        if correct {
            self.tally.correct += 1;
        } else {
            self.tally.wrong += 1;
            if let Some(command) = last_command {
                self.missed[command.index()] += 1;
            }
        }

        let outcome = AnswerOutcome {
            chosen,
            expected,
            correct,
            reaction_ms,
        };
        self.last_outcome = Some(outcome);
        self.set_stage(PracticeStage::Feedback { chosen, correct });
        if correct {
            self.feedback_timer = Some(
                self.scheduler
                    .schedule(now_ms + FEEDBACK_DWELL_MS, PracticeTimer::FeedbackDwell),
            );
        }
        Some(outcome)
    }

    fn continue_question(&mut self, now_ms: u64) -> bool {
        if !matches!(self.stage, PracticeStage::Feedback { .. }) {
            log::debug!("Continue ignored in {:?}", self.stage);
            return false;
        }
        if let Some(handle) = self.feedback_timer.take() {
            self.scheduler.cancel(handle);
        }
        self.next_question(now_ms);
        true
    }

    fn next_question(&mut self, now_ms: u64) {
        self.index += 1;
        if self.index < self.bundle.quota_for_phase(self.phase) {
            self.begin_question();
            return;
        }

        // Phase complete
        self.completed_phases.push(self.tally);
        let next = self.phase + 1;
        if usize::from(next) <= PHASE_COUNT && self.bundle.quota_for_phase(next) > 0 {
            log::info!(
                "Practice phase {} complete ({}/{} correct), entering phase {}",
                self.phase,
                self.tally.correct,
                self.tally.answered(),
                next
            );
            self.phase = next;
            self.index = 0;
            self.tally = PhaseSummary {
                phase: next,
                correct: 0,
                wrong: 0,
            };
            self.begin_question();
        } else {
            self.tally = PhaseSummary {
                phase: self.phase,
                correct: 0,
                wrong: 0,
            };
            self.show_results(SessionEnd::Completed, now_ms);
        }
    }

    fn show_results(&mut self, end: SessionEnd, at_ms: u64) {
        if self.tally.answered() > 0 {
            // Cut short mid-phase; keep what was played
            self.completed_phases.push(self.tally);
            self.tally.correct = 0;
            self.tally.wrong = 0;
        }
        self.teardown(end, at_ms);
        self.set_stage(PracticeStage::Results);
    }

    fn exit(&mut self, now_ms: u64) {
        self.teardown(SessionEnd::Exited, now_ms);
        self.set_stage(PracticeStage::Closed);
        self.collaborators.notify_exit();
    }

    fn teardown(&mut self, end: SessionEnd, at_ms: u64) {
        let cancelled = self.scheduler.cancel_all();
        self.feedback_timer = None;
        self.ended_at_ms = Some(at_ms);
        self.end = Some(end);
        log::info!(
            "Practice ended ({end:?}) in phase {}: score={} cancelled_timers={}",
            self.phase,
            self.stats.score,
            cancelled
        );
        let record = self.record();
        self.collaborators.flush(&record);
    }

    fn set_stage(&mut self, stage: PracticeStage) {
        log::debug!(
            "Practice phase {} q{}: {:?} -> {:?}",
            self.phase,
            self.index + 1,
            self.stage,
            stage
        );
        self.stage = stage;
    }

    /// Summary as it would be pushed to telemetry right now
    pub fn record(&self) -> SessionRecord {
        let duration_ms = match (self.started_at_ms, self.ended_at_ms) {
            (Some(start), Some(end)) => end.saturating_sub(start),
            _ => 0,
        };
        SessionRecord {
            mode: SessionMode::Practice,
            score: self.stats.score,
            duration_seconds: duration_ms as f64 / 1000.0,
            round_count: self.stats.answered(),
            correct_count: self.stats.correct,
            wrong_count: self.stats.wrong,
            avg_reaction_time_ms: self.stats.mean_reaction_ms(),
            // Practice pacing comes from the phase table; the record carries the tier defaults
            settings: SessionSettings::from_bundle(&self.bundle),
        }
    }

    /// RESULTS screen contents; `None` until the session reaches it
    pub fn results(&self) -> Option<PracticeResults> {
        if self.stage != PracticeStage::Results {
            return None;
        }
        Some(PracticeResults {
            end: self.end.unwrap_or(SessionEnd::Completed),
            phases: self.completed_phases.clone(),
            most_missed: self.most_missed(),
            locked_phases: (1..=PHASE_COUNT as u8)
                .filter(|&p| self.bundle.quota_for_phase(p) == 0)
                .collect(),
            score: self.stats.score,
            avg_reaction_time_ms: self.stats.mean_reaction_ms(),
        })
    }

    /// Command that most often closed a missed question (first in command order on ties)
    pub fn most_missed(&self) -> Option<Command> {
        let mut best: Option<(Command, u32)> = None;
        for command in Command::ALL {
            let count = self.missed[command.index()];
            if count > 0 && best.is_none_or(|(_, most)| count > most) {
                best = Some((command, count));
            }
        }
        best.map(|(command, _)| command)
    }

    /// Illustrations for every step of the current question.
    ///
    /// Everything is revealed while showing feedback for a wrong answer.
    pub fn illustrations(&self) -> Vec<Illustration> {
        let Some(question) = self.question.as_ref() else {
            return Vec::new();
        };
        let reveal_all = matches!(self.stage, PracticeStage::Feedback { correct: false, .. });
        let hidden = self.spec().assist.is_hidden();

        let mut before = CubeState::IDENTITY;
        question
            .commands()
            .iter()
            .enumerate()
            .map(|(step, &command)| {
                let after = before.apply(command);
                let visibility = if reveal_all {
                    Visibility::Shown
                } else if hidden {
                    Visibility::Hidden
                } else if self.blurred.get(step).copied().unwrap_or(false) {
                    Visibility::Blurred
                } else {
                    Visibility::Shown
                };
                let illustration = Illustration {
                    step,
                    command,
                    before,
                    after,
                    visibility,
                };
                before = after;
                illustration
            })
            .collect()
    }

    /// Illustration for the command currently on screen
    pub fn current_illustration(&self) -> Option<Illustration> {
        match self.stage {
            PracticeStage::Command { step } => self.illustrations().get(step).copied(),
            _ => None,
        }
    }

    pub fn stage(&self) -> PracticeStage {
        self.stage
    }

    /// 1-based phase ordinal
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// 0-based question index within the phase
    pub fn question_index(&self) -> u32 {
        self.index
    }

    pub fn phase_quota(&self) -> u32 {
        self.bundle.quota_for_phase(self.phase)
    }

    pub fn question(&self) -> Option<&Question> {
        self.question.as_ref()
    }

    pub fn tracked_label(&self) -> Option<Label> {
        self.question.as_ref().map(Question::tracked)
    }

    pub fn visible_command(&self) -> Option<Command> {
        self.current_illustration().map(|i| i.command)
    }

    pub fn answer_enabled(&self) -> bool {
        self.stage == PracticeStage::Question
    }

    pub fn last_outcome(&self) -> Option<AnswerOutcome> {
        self.last_outcome
    }

    /// Tally for the phase in progress
    pub fn phase_tally(&self) -> PhaseSummary {
        self.tally
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn bundle(&self) -> &TierBundle {
        &self.bundle
    }

    /// True on RESULTS or after the user left
    pub fn is_over(&self) -> bool {
        matches!(self.stage, PracticeStage::Results | PracticeStage::Closed)
    }

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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{MemorySink, TelemetryError};
    use crate::tier::{MAX_SESSION_CAP_SECS, Tier};
    use crate::tuning::PHASES;
    use std::cell::Cell;
    use std::rc::Rc;

    fn session(bundle: &TierBundle, seed: u64) -> (PracticeSession, MemorySink) {
        let sink = MemorySink::new();
        let session = PracticeSession::new(bundle, seed, Box::new(sink.clone()));
        (session, sink)
    }

    /// Play one question from START, answering correctly or not.
    /// Returns the time after feedback has been dismissed.
    fn play_question(s: &mut PracticeSession, now: u64, correct: bool) -> u64 {
        assert_eq!(s.stage(), PracticeStage::Start);
        assert!(s.handle(PracticeInput::Acknowledge, now));
        let len = s.question().unwrap().len() as u64;
        let open = now + len * s.spec().per_command_ms;
        s.handle(PracticeInput::Tick, open);
        assert!(s.answer_enabled());

        let expected = s.question().unwrap().answer();
        let choice = if correct { expected } else { expected.opposite() };
        assert!(s.handle(PracticeInput::Answer(choice), open + 200));
        s.handle(PracticeInput::Continue, open + 200);
        open + 200
    }

    #[test]
    fn test_question_loop_stages() {
        let (mut s, _) = session(&Tier::Premium.bundle(), 1);
        assert!(s.handle(PracticeInput::Start, 0));
        assert_eq!(s.stage(), PracticeStage::Start);
        assert_eq!(s.question().unwrap().len(), 1);

        // START waits for the user, not a timer
        s.handle(PracticeInput::Tick, 60_000);
        assert_eq!(s.stage(), PracticeStage::Start);
        assert!(!s.handle(PracticeInput::Answer(crate::cube::Face::Top), 60_000));

        s.handle(PracticeInput::Acknowledge, 60_000);
        assert_eq!(s.stage(), PracticeStage::Command { step: 0 });
        assert_eq!(s.visible_command(), Some(s.question().unwrap().commands()[0]));

        s.handle(PracticeInput::Tick, 60_000 + PHASES[0].per_command_ms);
        assert_eq!(s.stage(), PracticeStage::Question);

        let expected = s.question().unwrap().answer();
        s.handle(PracticeInput::Answer(expected), 63_500);
        assert_eq!(s.last_outcome().unwrap().reaction_ms, 500);
        assert!(matches!(s.stage(), PracticeStage::Feedback { correct: true, .. }));

        s.handle(PracticeInput::Tick, 63_500 + FEEDBACK_DWELL_MS);
        assert_eq!(s.stage(), PracticeStage::Start);
        assert_eq!(s.question_index(), 1);
    }

    #[test]
    fn test_phases_advance_and_reset_tallies() {
        let (mut s, sink) = session(&Tier::Premium.bundle(), 2);
        s.handle(PracticeInput::Start, 0);
        let mut now = 0;
        for phase in 1..=4u8 {
            assert_eq!(s.phase(), phase);
            assert_eq!(s.phase_tally().answered(), 0);
            for i in 0..10 {
                now = play_question(&mut s, now, i % 2 == 0);
            }
        }

        assert_eq!(s.stage(), PracticeStage::Results);
        let results = s.results().unwrap();
        assert_eq!(results.end, SessionEnd::Completed);
        assert_eq!(results.phases.len(), 4);
        for (i, summary) in results.phases.iter().enumerate() {
            assert_eq!(summary.phase as usize, i + 1);
            assert_eq!(summary.correct, 5);
            assert_eq!(summary.wrong, 5);
            assert!((summary.accuracy() - 0.5).abs() < f64::EPSILON);
        }
        assert!(results.locked_phases.is_empty());
        assert!(results.most_missed.is_some());
        assert_eq!(results.score, 200);

        assert_eq!(sink.len(), 1);
        let record = sink.last().unwrap();
        assert_eq!(record.round_count, 40);
        assert_eq!(record.mode, SessionMode::Practice);
        // Not the phase 4 pacing the run finished on
        assert_eq!(record.settings, SessionSettings::from_bundle(&Tier::Premium.bundle()));
        assert_eq!(record.settings.command_count, 3);
        assert_eq!(record.settings.command_speed_ms, 1500);
    }

    #[test]
    fn test_command_counts_per_phase() {
        let (mut s, _) = session(&Tier::Premium.bundle(), 3);
        s.handle(PracticeInput::Start, 0);
        let mut now = 0;
        let mut counts: Vec<(u8, usize)> = Vec::new();
        while !s.is_over() {
            counts.push((s.phase(), s.question().unwrap().len()));
            now = play_question(&mut s, now, true);
            now += FEEDBACK_DWELL_MS;
        }
        let phase2: Vec<usize> = counts.iter().filter(|c| c.0 == 2).map(|c| c.1).collect();
        assert_eq!(phase2, vec![2, 2, 2, 2, 2, 2, 3, 3, 3, 3]);
        assert!(counts.iter().filter(|c| c.0 == 1).all(|c| c.1 == 1));
        assert!(counts.iter().filter(|c| c.0 == 3).all(|c| (4..=5).contains(&c.1)));
        assert!(counts.iter().filter(|c| c.0 == 4).all(|c| (6..=8).contains(&c.1)));
    }

    #[test]
    fn test_locked_phase_lands_on_results() {
        let mut bundle = Tier::Guest.bundle();
        bundle.session_duration_cap_secs = 0;
        let (mut s, sink) = session(&bundle, 4);
        s.handle(PracticeInput::Start, 0);
        let mut now = 0;
        for _ in 0..6 {
            now = play_question(&mut s, now, false);
        }
        let results = s.results().unwrap();
        assert_eq!(results.end, SessionEnd::Completed);
        assert_eq!(results.phases.len(), 2);
        assert_eq!(results.locked_phases, vec![3, 4]);
        assert_eq!(results.score, 0);
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(sink.len(), 1);
        assert!(!s.handle(PracticeInput::Start, now));
    }

    #[test]
    fn test_no_phase_one_quota_goes_straight_to_results() {
        let mut bundle = Tier::Guest.bundle();
        bundle.phase_quotas = [0, 0, 0, 0];
        let (mut s, sink) = session(&bundle, 5);
        s.handle(PracticeInput::Start, 0);
        let results = s.results().unwrap();
        assert!(results.phases.is_empty());
        assert_eq!(results.locked_phases, vec![1, 2, 3, 4]);
        assert_eq!(results.most_missed, None);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_time_cap_shows_partial_results() {
        let (mut s, sink) = session(&Tier::Guest.bundle(), 6);
        s.handle(PracticeInput::Start, 0);
        let now = play_question(&mut s, 0, true);
        s.handle(PracticeInput::Tick, now + 200_000);
        assert_eq!(s.stage(), PracticeStage::Results);

        let results = s.results().unwrap();
        assert_eq!(results.end, SessionEnd::TimeLimit);
        assert_eq!(results.phases.len(), 1);
        assert_eq!(results.phases[0].correct, 1);
        assert_eq!(sink.last().unwrap().duration_seconds, 120.0);
    }

    #[test]
    fn test_most_missed_counts_final_command() {
        let (mut s, _) = session(&Tier::Premium.bundle(), 7);
        s.handle(PracticeInput::Start, 0);
        let mut now = 0;
        let mut expected = [0u32; 4];
        for _ in 0..10 {
            let last = *s.question().unwrap().commands().last().unwrap();
            expected[last.index()] += 1;
            now = play_question(&mut s, now, false);
        }
        let max = *expected.iter().max().unwrap();
        let want = Command::ALL
            .into_iter()
            .find(|c| expected[c.index()] == max)
            .unwrap();
        assert_eq!(s.most_missed(), Some(want));
    }

    #[test]
    fn test_anti_repetition_across_phase_boundary() {
        let (mut s, _) = session(&Tier::Premium.bundle(), 8);
        s.handle(PracticeInput::Start, 0);
        let mut now = 0;
        let mut previous: Option<Question> = None;
        while !s.is_over() {
            let current = s.question().unwrap().clone();
            if let Some(prev) = &previous {
                assert!(!current.same_puzzle(prev));
            }
            previous = Some(current);
            now = play_question(&mut s, now, true);
        }
    }

    #[test]
    fn test_illustrations_follow_assist_policy() {
        let (mut s, _) = session(&Tier::Premium.bundle(), 9);
        s.handle(PracticeInput::Start, 0);
        let mut now = 0;

        // Phase 1: everything shown
        let ills = s.illustrations();
        assert!(ills.iter().all(|i| i.visibility == Visibility::Shown));
        assert_eq!(ills[0].before, CubeState::IDENTITY);

        for _ in 0..10 {
            now = play_question(&mut s, now, true);
        }
        assert_eq!(s.phase(), 2);
        let ills = s.illustrations();
        let blurred = ills.iter().filter(|i| i.visibility == Visibility::Blurred).count();
        assert_eq!(blurred, 1);
        // Steps chain: each step starts where the previous ended
        for pair in ills.windows(2) {
            assert_eq!(pair[0].after, pair[1].before);
        }
        let final_state = ills.last().unwrap().after;
        let q = s.question().unwrap();
        assert_eq!(final_state.locate(q.tracked()), q.answer());

        for _ in 0..20 {
            now = play_question(&mut s, now, true);
        }
        assert_eq!(s.phase(), 4);
        assert!(s.illustrations().iter().all(|i| i.visibility == Visibility::Hidden));

        // A wrong answer reveals every step during feedback
        s.handle(PracticeInput::Acknowledge, now);
        let len = s.question().unwrap().len() as u64;
        let open = now + len * PHASES[3].per_command_ms;
        s.handle(PracticeInput::Tick, open);
        let wrong = s.question().unwrap().answer().opposite();
        s.handle(PracticeInput::Answer(wrong), open);
        assert!(s.illustrations().iter().all(|i| i.visibility == Visibility::Shown));
    }

    #[test]
    fn test_exit_tears_down_before_hook() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let sink = MemorySink::new();
        let bundle = Tier::Premium.bundle();
        let observed = sink.clone();
        let mut s = PracticeSession::new(&bundle, 10, Box::new(sink.clone()))
            .with_exit_hook(move || {
                // Teardown has already flushed the record by the time the hook runs
                assert_eq!(observed.len(), 1);
                assert_eq!(observed.last().map(|r| r.duration_seconds), Some(1.0));
                seen.set(seen.get() + 1);
            });

        s.handle(PracticeInput::Start, 0);
        s.handle(PracticeInput::Acknowledge, 0);
        assert_eq!(s.pending_timers(), 1);

        s.handle(PracticeInput::Exit, 1000);
        assert_eq!(s.stage(), PracticeStage::Closed);
        assert_eq!(s.pending_timers(), 0);
        assert_eq!(calls.get(), 1);
        assert_eq!(sink.len(), 1);
        assert!(s.results().is_none());
        assert!(!s.handle(PracticeInput::Tick, 100_000));
    }

    struct OfflineSink;

    impl TelemetrySink for OfflineSink {
        fn record(&mut self, _record: &SessionRecord) -> Result<(), TelemetryError> {
            Err(TelemetryError::Unavailable("offline".into()))
        }
    }

    #[test]
    fn test_failing_sink_does_not_block_teardown() {
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        let bundle = Tier::Guest.bundle();
        let mut s = PracticeSession::new(&bundle, 11, Box::new(OfflineSink))
            .with_exit_hook(move || seen.set(seen.get() + 1));
        s.handle(PracticeInput::Start, 0);
        s.handle(PracticeInput::Acknowledge, 0);
        s.handle(PracticeInput::Exit, 1000);
        assert_eq!(s.stage(), PracticeStage::Closed);
        assert_eq!(s.pending_timers(), 0);
        assert!(s.telemetry_flushed());
        assert_eq!(calls.get(), 1);

        // Cap path still lands on RESULTS
        let mut s = PracticeSession::new(&bundle, 12, Box::new(OfflineSink));
        s.handle(PracticeInput::Start, 0);
        let now = play_question(&mut s, 0, true);
        s.handle(PracticeInput::Tick, now + 200_000);
        assert_eq!(s.stage(), PracticeStage::Results);
        assert_eq!(s.results().unwrap().end, SessionEnd::TimeLimit);
        assert_eq!(s.pending_timers(), 0);
        assert!(s.telemetry_flushed());
    }

    #[test]
    fn test_largest_session_cap_starts_late_without_overflow() {
        let mut bundle = Tier::Guest.bundle();
        bundle.session_duration_cap_secs = MAX_SESSION_CAP_SECS;
        assert_eq!(bundle.validate(), Ok(()));
        let (mut s, _) = session(&bundle, 13);

        assert!(s.handle(PracticeInput::Start, 5000));
        assert_eq!(s.stage(), PracticeStage::Start);
        assert_eq!(s.next_deadline(), Some(5000 + MAX_SESSION_CAP_SECS * 1000));

        s.handle(PracticeInput::Tick, u64::MAX);
        assert_eq!(s.results().unwrap().end, SessionEnd::TimeLimit);
    }
}
