//! Structured export log.
//!
//! Recoverable problems never abort a build. They are accumulated here,
//! tagged by severity, and handed back to the caller with the build result.
//! Each entry is also forwarded to `tracing` so a subscriber sees it live.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a log entry, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

#[derive(Debug, Default, Clone)]
pub struct ExportLog {
    entries: Vec<LogEntry>,
}

impl ExportLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Info, title.into(), message.into());
    }

    pub fn warning(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Warning, title.into(), message.into());
    }

    pub fn error(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Error, title.into(), message.into());
    }

    pub fn fatal(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.push(Severity::Fatal, title.into(), message.into());
    }

    fn push(&mut self, severity: Severity, title: String, message: String) {
        match severity {
            Severity::Info => tracing::info!(%title, "{message}"),
            Severity::Warning => tracing::warn!(%title, "{message}"),
            Severity::Error | Severity::Fatal => tracing::error!(%severity, %title, "{message}"),
        }
        self.entries.push(LogEntry {
            severity,
            title,
            message,
        });
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Entries at or above `threshold`.
    pub fn visible(&self, threshold: Severity) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.severity >= threshold)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries.iter().filter(|e| e.severity == severity).count()
    }

    pub fn summary(&self) -> LogSummary {
        LogSummary {
            info: self.count(Severity::Info),
            warnings: self.count(Severity::Warning),
            errors: self.count(Severity::Error),
            fatal: self.count(Severity::Fatal),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-severity counts for the end-of-build summary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LogSummary {
    pub info: usize,
    pub warnings: usize,
    pub errors: usize,
    pub fatal: usize,
}

impl fmt::Display for LogSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.warnings == 0 && self.errors == 0 && self.fatal == 0 {
            return write!(f, "no problems");
        }
        let plural = |n: usize, word: &str| {
            if n == 1 {
                format!("{n} {word}")
            } else {
                format!("{n} {word}s")
            }
        };
        let mut parts = vec![plural(self.warnings, "warning"), plural(self.errors, "error")];
        if self.fatal > 0 {
            parts.push(format!("{} fatal", self.fatal));
        }
        write!(f, "{}", parts.join(", "))
    }
}
