use std::collections::VecDeque;

use chrono::{Local, NaiveDateTime};
use sevlog_core::{Severity, format_line};

/// A message as it was recorded, before any line splitting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub timestamp: NaiveDateTime,
    pub severity: Severity,
    pub pid: u32,
    pub source: String,
    pub message: String,
}

impl HistoryEntry {
    pub fn now(severity: Severity, source: &str, message: String) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            severity,
            pid: std::process::id(),
            source: source.to_string(),
            message,
        }
    }

    pub fn formatted(&self) -> String {
        format_line(
            &self.timestamp,
            self.severity,
            self.pid,
            &self.source,
            &self.message,
        )
    }
}

/// Bounded FIFO of the most recent entries. Never holds more than `capacity`.
#[derive(Debug, Clone)]
pub(crate) struct HistoryBuffer {
    entries: VecDeque<HistoryEntry>,
    capacity: usize,
}

impl HistoryBuffer {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub(crate) fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    /// Oldest first, one formatted entry per line.
    pub(crate) fn render(&self) -> String {
        self.entries
            .iter()
            .map(HistoryEntry::formatted)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
