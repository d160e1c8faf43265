//! Shared, bounded log history
//!
//! The sink is the one resource shared between a running orchestration and
//! whatever displays its output, so every access goes through a mutex.

use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::constants::log_sink::{MAX_LINES, PRUNE_BATCH};

/// Display class of a log line, derived from its markers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warning,
    Exec,
    Debug,
    Response,
    Info,
}

impl LogLevel {
    /// Classify a line by the first marker it carries
    pub fn classify(line: &str) -> Self {
        if line.contains("[ERROR]") || line.contains("ERROR:") {
            LogLevel::Error
        } else if line.contains("[WARN]") || line.contains("WARNING:") {
            LogLevel::Warning
        } else if line.contains("[EXEC]") {
            LogLevel::Exec
        } else if line.contains("DEBUG") {
            LogLevel::Debug
        } else if line.contains("Response:") || line.contains("Status") {
            LogLevel::Response
        } else {
            LogLevel::Info
        }
    }
}

/// Thread-safe log history that prunes its oldest lines past a threshold
#[derive(Debug)]
pub struct LogSink {
    lines: Mutex<VecDeque<String>>,
    max_lines: usize,
    prune_batch: usize,
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    pub fn new() -> Self {
        Self::with_limits(MAX_LINES, PRUNE_BATCH)
    }

    /// Create a sink with custom retention
    ///
    /// A prune batch of zero is raised to one so pruning always makes progress.
    pub fn with_limits(max_lines: usize, prune_batch: usize) -> Self {
        Self {
            lines: Mutex::new(VecDeque::new()),
            max_lines,
            prune_batch: prune_batch.max(1),
        }
    }

    /// Append one line, pruning the oldest batch if the cap is exceeded
    pub fn append(&self, line: impl Into<String>) {
        let mut lines = self.lines.lock();
        lines.push_back(line.into());
        if lines.len() > self.max_lines {
            let excess = self.prune_batch.min(lines.len());
            lines.drain(..excess);
        }
    }

    /// Copy of every retained line, oldest first
    pub fn snapshot(&self) -> Vec<String> {
        self.lines.lock().iter().cloned().collect()
    }

    /// Retained lines containing `query`, ignoring case
    pub fn filtered(&self, query: &str) -> Vec<String> {
        if query.is_empty() {
            return self.snapshot();
        }
        let needle = query.to_lowercase();
        self.lines
            .lock()
            .iter()
            .filter(|line| line.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.lock().is_empty()
    }
}
