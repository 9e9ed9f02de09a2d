//! Append-only transcript and error logs
//!
//! One line per record, timestamped. The error sink flushes on every write;
//! the transcript sink is buffered and flushed at termination. Both flushes
//! are guaranteed on every exit path of the session loop.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

use crate::Result;

/// What a log record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// A recognized phrase or conversation turn
    Transcript,
    /// A failure
    Error,
}

/// A single write-once log line
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub kind: RecordKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// A record stamped now
    #[must_use]
    pub fn now(kind: RecordKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    fn format_line(&self) -> String {
        format!(
            "[{}] {}",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.text
        )
    }
}

/// A single append-only file sink
struct LogSink {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogSink {
    fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    fn append(&mut self, record: &LogRecord) {
        if let Err(e) = writeln!(self.writer, "{}", record.format_line()) {
            tracing::error!(path = %self.path.display(), error = %e, "log write failed");
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.writer.flush()
    }
}

/// The session's two persisted outputs
pub struct Logbook {
    transcript: LogSink,
    errors: LogSink,
}

impl Logbook {
    /// Open (or create) both log files in append mode
    ///
    /// # Errors
    ///
    /// Returns error if either file cannot be opened.
    pub fn open(transcript_path: &Path, error_path: &Path) -> Result<Self> {
        Ok(Self {
            transcript: LogSink::open(transcript_path)?,
            errors: LogSink::open(error_path)?,
        })
    }

    /// Append a transcript line (buffered until the next flush)
    pub fn transcript(&mut self, text: &str) {
        self.transcript
            .append(&LogRecord::now(RecordKind::Transcript, text));
    }

    /// Append an error line and flush it immediately
    pub fn error(&mut self, text: &str) {
        self.errors.append(&LogRecord::now(RecordKind::Error, text));
        if let Err(e) = self.errors.flush() {
            tracing::error!(error = %e, "error log flush failed");
        }
    }

    /// Flush both sinks
    ///
    /// # Errors
    ///
    /// Returns error if either flush fails.
    pub fn flush(&mut self) -> Result<()> {
        self.transcript.flush()?;
        self.errors.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn transcript_lines_appear_after_flush() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("transcript.log");
        let errors = dir.path().join("error.log");

        let mut logbook = Logbook::open(&transcript, &errors).unwrap();
        logbook.transcript("what's the weather");
        logbook.transcript("It's sunny.");
        logbook.flush().unwrap();

        let lines = read_lines(&transcript);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("what's the weather"));
        assert!(lines[1].ends_with("It's sunny."));
        assert!(read_lines(&errors).is_empty());
    }

    #[test]
    fn error_lines_flushed_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("transcript.log");
        let errors = dir.path().join("error.log");

        let mut logbook = Logbook::open(&transcript, &errors).unwrap();
        logbook.error("transient engine error: timeout");

        // No explicit flush: the error sink flushes on write.
        let lines = read_lines(&errors);
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("transient engine error"));
    }

    #[test]
    fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("transcript.log");
        let errors = dir.path().join("error.log");

        {
            let mut logbook = Logbook::open(&transcript, &errors).unwrap();
            logbook.transcript("first session");
            logbook.flush().unwrap();
        }
        {
            let mut logbook = Logbook::open(&transcript, &errors).unwrap();
            logbook.transcript("second session");
            logbook.flush().unwrap();
        }

        assert_eq!(read_lines(&transcript).len(), 2);
    }

    #[test]
    fn record_line_format() {
        let record = LogRecord::now(RecordKind::Transcript, "hello");
        let line = record.format_line();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] hello"));
    }
}
