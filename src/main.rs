//! Cube Tilt entry point
//!
//! Terminal driver: feeds wall-clock time into a session, prints what the
//! screen would show, and reads answers from stdin.

#[cfg(not(target_arch = "wasm32"))]
mod terminal {
    use std::fs::OpenOptions;
    use std::io::{self, BufRead, Write};
    use std::path::PathBuf;
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
    use std::time::{Duration, Instant};

    use clap::{Parser, Subcommand};

    use cube_tilt::session::exam::{ExamInput, ExamPhase};
    use cube_tilt::session::practice::{PracticeInput, PracticeStage, Visibility};
    use cube_tilt::telemetry::{JsonLinesSink, LogSink};
    use cube_tilt::tier::TierTable;
    use cube_tilt::{
        ExamSession, Face, PracticeSession, SessionSettings, TelemetrySink, Tier, TierBundle,
    };

    const ANSWER_PROMPT: &str = "Where is it now? [top/bottom/left/right/front/back, q] ";
    const CONTINUE_PROMPT: &str = "Enter to continue, q to quit ";

    #[derive(Debug, Parser)]
    #[command(name = "cube-tilt", version, about = "Track a cube face through a sequence of tilts")]
    struct Cli {
        #[command(subcommand)]
        mode: Mode,

        /// Entitlement tier (guest, free, premium)
        #[arg(long, global = true, default_value = "guest", value_parser = parse_tier)]
        tier: Tier,

        /// RNG seed (defaults to the current time)
        #[arg(long, global = true)]
        seed: Option<u64>,

        /// JSON tier table overriding the built-in bundles
        #[arg(long, global = true)]
        tiers: Option<PathBuf>,

        /// Append the session record as a JSON line to this file
        #[arg(long, global = true)]
        record: Option<PathBuf>,
    }

    #[derive(Debug, Subcommand)]
    enum Mode {
        /// Timed exam: score as many rounds as possible
        Exam {
            /// Commands per question (clamped by the tier)
            #[arg(long)]
            commands: Option<usize>,
            /// Milliseconds each command stays on screen (clamped by the tier)
            #[arg(long)]
            speed_ms: Option<u64>,
        },
        /// Four-phase guided practice
        Practice,
    }

    fn parse_tier(s: &str) -> Result<Tier, String> {
        Tier::from_str(s).ok_or_else(|| format!("unknown tier '{s}'"))
    }

    /// Wall clock in ms since the driver started
    struct Clock(Instant);

    impl Clock {
        fn now(&self) -> u64 {
            self.0.elapsed().as_millis() as u64
        }

        /// Time left until `deadline`, in small slices so ticks keep flowing
        fn slice_until(&self, deadline: Option<u64>) -> Duration {
            let now = self.now();
            Duration::from_millis(deadline.map_or(50, |d| d.saturating_sub(now).clamp(1, 50)))
        }

        fn wait_until(&self, deadline: Option<u64>) {
            std::thread::sleep(self.slice_until(deadline));
        }
    }

    enum Reply {
        Face(Face),
        Enter,
        Quit,
    }

    impl Reply {
        fn parse(line: &str) -> Self {
            let line = line.trim();
            if line.eq_ignore_ascii_case("q") || line.eq_ignore_ascii_case("quit") {
                return Reply::Quit;
            }
            Face::from_str(line).map_or(Reply::Enter, Reply::Face)
        }
    }

    /// Stdin lines read on a helper thread so the session clock never blocks on the user
    struct Input(Receiver<String>);

    impl Input {
        fn spawn() -> Self {
            let (tx, rx) = mpsc::channel();
            std::thread::spawn(move || {
                for line in io::stdin().lock().lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                log::debug!("Stdin closed");
            });
            Self(rx)
        }

        /// Next reply, or `None` if nothing arrived within `timeout`. A closed stdin quits.
        fn next(&self, timeout: Duration) -> Option<Reply> {
            match self.0.recv_timeout(timeout) {
                Ok(line) => Some(Reply::parse(&line)),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => Some(Reply::Quit),
            }
        }
    }

    fn prompt(text: &str) -> io::Result<()> {
        print!("{text}");
        io::stdout().flush()
    }

    fn telemetry(cli: &Cli) -> cube_tilt::Result<Box<dyn TelemetrySink>> {
        match &cli.record {
            Some(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Ok(Box::new(JsonLinesSink::new(file)))
            }
            None => Ok(Box::new(LogSink)),
        }
    }

    fn run_exam(
        bundle: &TierBundle,
        settings: SessionSettings,
        seed: u64,
        sink: Box<dyn TelemetrySink>,
    ) -> cube_tilt::Result<()> {
        let clock = Clock(Instant::now());
        let input = Input::spawn();
        let mut session = ExamSession::new(bundle, settings, seed, sink)
            .with_exit_hook(|| println!("\nExam abandoned."));
        session.handle(ExamInput::Start, clock.now());

        let mut shown = None;
        loop {
            session.handle(ExamInput::Tick, clock.now());
            let phase = session.phase();
            let changed = shown != Some(phase);
            shown = Some(phase);

            if changed {
                match phase {
                    ExamPhase::ShowingTarget => {
                        if let Some(label) = session.tracked_label() {
                            println!("\nRound {}: follow the {label} face", session.round());
                        }
                    }
                    ExamPhase::ShowingCommands { step } => {
                        if let Some(cmd) = session.visible_command() {
                            println!("  tilt {}: {cmd}", step + 1);
                        }
                    }
                    ExamPhase::WaitingAnswer => prompt(ANSWER_PROMPT)?,
                    ExamPhase::Feedback { correct, .. } => {
                        if let Some(outcome) = session.last_outcome() {
                            if correct {
                                println!(
                                    "Correct! ({} ms) score={}",
                                    outcome.reaction_ms,
                                    session.stats().score
                                );
                            } else {
                                println!("Wrong, it was {}.", outcome.expected);
                                prompt(CONTINUE_PROMPT)?;
                            }
                        }
                    }
                    ExamPhase::Finished(reason) => {
                        let stats = session.stats();
                        println!(
                            "\nExam over ({reason:?}): score {} | {} correct, {} wrong | avg {:.0} ms",
                            stats.score,
                            stats.correct,
                            stats.wrong,
                            stats.mean_reaction_ms()
                        );
                        return Ok(());
                    }
                    ExamPhase::Ready => {}
                }
            }

            let awaiting = matches!(
                phase,
                ExamPhase::WaitingAnswer | ExamPhase::Feedback { correct: false, .. }
            );
            if !awaiting {
                clock.wait_until(session.next_deadline());
                continue;
            }
            // The prompt is abandoned if the session cap fires first
            let Some(reply) = input.next(clock.slice_until(session.next_deadline())) else {
                continue;
            };
            let now = clock.now();
            match (phase, reply) {
                (_, Reply::Quit) => {
                    session.handle(ExamInput::Exit, now);
                }
                (ExamPhase::WaitingAnswer, Reply::Face(face)) => {
                    session.handle(ExamInput::Answer(face), now);
                }
                (ExamPhase::WaitingAnswer, Reply::Enter) => prompt(ANSWER_PROMPT)?,
                _ => {
                    session.handle(ExamInput::Continue, now);
                }
            }
        }
    }

    fn run_practice(bundle: &TierBundle, seed: u64, sink: Box<dyn TelemetrySink>) -> cube_tilt::Result<()> {
        let clock = Clock(Instant::now());
        let input = Input::spawn();
        let mut session = PracticeSession::new(bundle, seed, sink)
            .with_exit_hook(|| println!("\nPractice abandoned."));
        session.handle(PracticeInput::Start, clock.now());

        let mut shown = None;
        loop {
            session.handle(PracticeInput::Tick, clock.now());
            let stage = session.stage();
            let changed = shown != Some(stage);
            shown = Some(stage);

            if changed {
                match stage {
                    PracticeStage::Start => {
                        if let Some(label) = session.tracked_label() {
                            println!(
                                "\nPhase {} question {}/{}: follow the {label} face",
                                session.phase(),
                                session.question_index() + 1,
                                session.phase_quota()
                            );
                        }
                        prompt("Enter to begin, q to quit ")?;
                    }
                    PracticeStage::Command { step } => {
                        if let Some(ill) = session.current_illustration() {
                            let view = match ill.visibility {
                                Visibility::Shown => format!(
                                    "TOP {} -> {}, FRONT {} -> {}",
                                    ill.before.label_at(Face::Top),
                                    ill.after.label_at(Face::Top),
                                    ill.before.label_at(Face::Front),
                                    ill.after.label_at(Face::Front)
                                ),
                                Visibility::Blurred => "(blurred)".to_string(),
                                Visibility::Hidden => String::new(),
                            };
                            println!("  tilt {}: {} {view}", step + 1, ill.command);
                        }
                    }
                    PracticeStage::Question => prompt(ANSWER_PROMPT)?,
                    PracticeStage::Feedback { correct: true, .. } => println!("Correct!"),
                    PracticeStage::Feedback { correct: false, .. } => {
                        if let Some(outcome) = session.last_outcome() {
                            println!("Wrong, it was {}. Replay:", outcome.expected);
                            let tracked = session.tracked_label().unwrap_or(Face::Top);
                            for ill in session.illustrations() {
                                println!(
                                    "  {} {}: {tracked} face now at {}",
                                    ill.step + 1,
                                    ill.command,
                                    ill.after.locate(tracked)
                                );
                            }
                        }
                        prompt(CONTINUE_PROMPT)?;
                    }
                    PracticeStage::Results => {
                        if let Some(results) = session.results() {
                            println!("\nResults ({:?}): score {}", results.end, results.score);
                            for p in &results.phases {
                                println!(
                                    "  phase {}: {}/{} ({:.0}%)",
                                    p.phase,
                                    p.correct,
                                    p.answered(),
                                    p.accuracy() * 100.0
                                );
                            }
                            if let Some(cmd) = results.most_missed {
                                println!("  most missed command: {cmd}");
                            }
                            if !results.locked_phases.is_empty() {
                                println!("  locked phases: {:?}", results.locked_phases);
                            }
                        }
                        return Ok(());
                    }
                    PracticeStage::Closed => return Ok(()),
                    PracticeStage::Ready => {}
                }
            }

            let awaiting = matches!(
                stage,
                PracticeStage::Start
                    | PracticeStage::Question
                    | PracticeStage::Feedback { correct: false, .. }
            );
            if !awaiting {
                clock.wait_until(session.next_deadline());
                continue;
            }
            let Some(reply) = input.next(clock.slice_until(session.next_deadline())) else {
                continue;
            };
            let now = clock.now();
            match (stage, reply) {
                (_, Reply::Quit) => {
                    session.handle(PracticeInput::Exit, now);
                }
                (PracticeStage::Start, _) => {
                    session.handle(PracticeInput::Acknowledge, now);
                }
                (PracticeStage::Question, Reply::Face(face)) => {
                    session.handle(PracticeInput::Answer(face), now);
                }
                (PracticeStage::Question, Reply::Enter) => prompt(ANSWER_PROMPT)?,
                _ => {
                    session.handle(PracticeInput::Continue, now);
                }
            }
        }
    }

    pub fn run() -> cube_tilt::Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
        let cli = Cli::parse();

        let bundle = match &cli.tiers {
            Some(path) => TierTable::load(path)?.get(cli.tier),
            None => cli.tier.bundle(),
        };
        bundle.validate()?;

        let seed = cli.seed.unwrap_or_else(|| {
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .map(|d| d.as_nanos() as u64)
                .unwrap_or(0)
        });
        log::info!("Cube Tilt starting: tier={} seed={}", bundle.tier.as_str(), seed);

        let sink = telemetry(&cli)?;
        match cli.mode {
            Mode::Exam { commands, speed_ms } => {
                let defaults = SessionSettings::from_bundle(&bundle);
                let settings = SessionSettings {
                    command_count: commands.unwrap_or(defaults.command_count),
                    command_speed_ms: speed_ms.unwrap_or(defaults.command_speed_ms),
                };
                if !settings.within(&bundle) {
                    log::warn!("Requested settings exceed the {} tier and were clamped", bundle.tier.as_str());
                }
                run_exam(&bundle, settings, seed, sink)
            }
            Mode::Practice => run_practice(&bundle, seed, sink),
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_input_times_out_without_blocking() {
            let (tx, rx) = mpsc::channel::<String>();
            let input = Input(rx);
            let started = Instant::now();
            assert!(input.next(Duration::from_millis(20)).is_none());
            assert!(started.elapsed() < Duration::from_secs(1));

            tx.send(" Front \n".to_string()).unwrap();
            assert!(matches!(input.next(Duration::from_millis(20)), Some(Reply::Face(Face::Front))));
            tx.send(String::new()).unwrap();
            assert!(matches!(input.next(Duration::from_millis(20)), Some(Reply::Enter)));
            tx.send("q".to_string()).unwrap();
            assert!(matches!(input.next(Duration::from_millis(20)), Some(Reply::Quit)));
        }

        #[test]
        fn test_closed_stdin_quits() {
            let (tx, rx) = mpsc::channel::<String>();
            tx.send("left".to_string()).unwrap();
            drop(tx);
            let input = Input(rx);
            // Queued lines are still delivered before the disconnect
            assert!(matches!(input.next(Duration::from_millis(20)), Some(Reply::Face(Face::Left))));
            assert!(matches!(input.next(Duration::from_millis(20)), Some(Reply::Quit)));
        }

        #[test]
        fn test_slice_until_is_bounded_by_deadline() {
            let clock = Clock(Instant::now());
            assert_eq!(clock.slice_until(None), Duration::from_millis(50));
            assert_eq!(clock.slice_until(Some(0)), Duration::from_millis(1));
            assert!(clock.slice_until(Some(u64::MAX)) <= Duration::from_millis(50));
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    if let Err(e) = terminal::run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // The library is driven by the host page on the web
}
