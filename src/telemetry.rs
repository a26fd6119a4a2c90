//! Session telemetry
//!
//! One `SessionRecord` per finished or abandoned session, pushed to an
//! external sink. Delivery is fire-and-forget: sessions log a failed push and
//! carry on with teardown.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::settings::SessionSettings;

/// Which engine produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    Exam,
    Practice,
}

/// Summary pushed at session end
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub mode: SessionMode,
    pub score: u64,
    pub duration_seconds: f64,
    pub round_count: u32,
    pub correct_count: u32,
    pub wrong_count: u32,
    pub avg_reaction_time_ms: f64,
    pub settings: SessionSettings,
}

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to serialize session record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write session record: {0}")]
    Io(#[from] std::io::Error),
    #[error("sink unavailable: {0}")]
    Unavailable(String),
}

/// Outbound collaborator receiving session summaries
pub trait TelemetrySink {
    fn record(&mut self, record: &SessionRecord) -> Result<(), TelemetryError>;
}

/// Collects records in memory. Clones share the same list.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Rc<RefCell<Vec<SessionRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<SessionRecord> {
        self.records.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn last(&self) -> Option<SessionRecord> {
        self.records.borrow().last().cloned()
    }
}

impl TelemetrySink for MemorySink {
    fn record(&mut self, record: &SessionRecord) -> Result<(), TelemetryError> {
        self.records.borrow_mut().push(record.clone());
        Ok(())
    }
}

/// Writes each record to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn record(&mut self, record: &SessionRecord) -> Result<(), TelemetryError> {
        log::info!(
            "{:?} session: score={} rounds={} correct={} wrong={} avg_rt={:.0}ms duration={:.1}s",
            record.mode,
            record.score,
            record.round_count,
            record.correct_count,
            record.wrong_count,
            record.avg_reaction_time_ms,
            record.duration_seconds
        );
        Ok(())
    }
}

/// Appends one JSON object per line to a writer
#[derive(Debug)]
pub struct JsonLinesSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> TelemetrySink for JsonLinesSink<W> {
    fn record(&mut self, record: &SessionRecord) -> Result<(), TelemetryError> {
        let line = serde_json::to_string(record)?;
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Push `record` to `sink`, logging instead of failing
pub(crate) fn deliver(sink: &mut dyn TelemetrySink, record: &SessionRecord) {
    if let Err(e) = sink.record(record) {
        log::warn!("Telemetry sink rejected session record: {e}");
    }
}
