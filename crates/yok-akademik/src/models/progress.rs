//! Structured progress records emitted by extraction runs.
//!
//! An extraction process writes one JSON object per stdout line; the
//! orchestrator reads them back with [`ProgressRecord::parse_line`].

use std::io::Write;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Which extraction run produced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Profiles,
    Collaborators,
}

/// Severity of a progress record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Classify a free-text line by its `[TAG]`; untagged lines are `Info`.
    #[must_use]
    pub fn from_tagged_line(line: &str) -> Self {
        if line.contains("[ERROR]") {
            Self::Error
        } else if line.contains("[WARNING]") {
            Self::Warning
        } else if line.contains("[DEBUG]") {
            Self::Debug
        } else {
            Self::Info
        }
    }
}

/// One progress report of an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    /// Format version.
    pub v: u8,
    pub phase: RunPhase,
    pub level: LogLevel,
    pub message: String,
    /// Records collected so far, when the message is about progress.
    #[serde(default)]
    pub count: Option<usize>,
}

impl ProgressRecord {
    /// Current format version.
    pub const VERSION: u8 = 1;

    #[must_use]
    pub fn new(phase: RunPhase, level: LogLevel, message: impl Into<String>) -> Self {
        Self { v: Self::VERSION, phase, level, message: message.into(), count: None }
    }

    /// Attach a record count.
    #[must_use]
    pub const fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    /// Parse one stdout line of an extraction process.
    ///
    /// Lines that are not progress records (library output, panics) are kept
    /// as messages and classified by their `[TAG]` prefix.
    #[must_use]
    pub fn parse_line(phase: RunPhase, line: &str) -> Self {
        match serde_json::from_str::<Self>(line) {
            Ok(record) => record,
            Err(_) => Self::new(phase, LogLevel::from_tagged_line(line), line.trim()),
        }
    }
}

/// Destination for the progress records of a run.
pub trait ProgressSink: Send + Sync {
    fn report(&self, record: ProgressRecord);
}

/// Writes each record as a JSON line on stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl ProgressSink for StdoutSink {
    fn report(&self, record: ProgressRecord) {
        let Ok(line) = serde_json::to_string(&record) else {
            return;
        };
        let mut stdout = std::io::stdout().lock();
        // Orchestrator went away; nothing left to tell.
        let _ = writeln!(stdout, "{line}").and_then(|()| stdout.flush());
    }
}

impl ProgressSink for mpsc::UnboundedSender<ProgressRecord> {
    fn report(&self, record: ProgressRecord) {
        let _ = self.send(record);
    }
}

impl ProgressSink for () {
    fn report(&self, _record: ProgressRecord) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_line_format() {
        let record = ProgressRecord::new(RunPhase::Profiles, LogLevel::Info, "page 1").with_count(20);
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(
            line,
            r#"{"v":1,"phase":"profiles","level":"info","message":"page 1","count":20}"#
        );
    }

    #[test]
    fn test_parse_structured_line() {
        let line = r#"{"v":1,"phase":"collaborators","level":"warning","message":"x","count":null}"#;
        let record = ProgressRecord::parse_line(RunPhase::Profiles, line);
        assert_eq!(record.phase, RunPhase::Collaborators);
        assert_eq!(record.level, LogLevel::Warning);
        assert_eq!(record.count, None);
    }

    #[test]
    fn test_parse_tagged_text_line() {
        let record = ProgressRecord::parse_line(RunPhase::Profiles, "[ERROR] chrome crashed  ");
        assert_eq!(record.level, LogLevel::Error);
        assert_eq!(record.message, "[ERROR] chrome crashed");

        let record = ProgressRecord::parse_line(RunPhase::Profiles, "plain output");
        assert_eq!(record.level, LogLevel::Info);
    }

    #[test]
    fn test_channel_sink() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        tx.report(ProgressRecord::new(RunPhase::Profiles, LogLevel::Debug, "hello"));
        assert_eq!(rx.try_recv().unwrap().message, "hello");
    }
}
