//! # sevlog
//! Leveled logger with the eight syslog severities, a rolling history of recent
//! messages and a debug toggle operators can flip at runtime.
//!
//! ## Usage
//! ```toml
//! // Cargo.toml
//! ...
//! [dependencies]
//! sevlog = "0.1.0"
//! ```
//!
//! ```rust
//! use sevlog::Loggers;
//!
//! let loggers = Loggers::new();
//! loggers.log.configure_sink("stderr");
//! loggers.log.warning("supervisor init", "started");
//! // below the WARNING threshold: not written, but kept in the history
//! loggers.log.debug("proxy 12", "connection accepted");
//! assert_eq!(loggers.log.entries().len(), 2);
//! ```
//!
//! ## Destinations
//! `configure_sink` takes the destination as a string:
//! `print` (bare text on stdout), `stdout`, `stderr`, an empty string for the
//! local syslog daemon, `host:<name>` for a remote syslog host, or a file path
//! rotated at 5 MiB with 5 backups.
//!
//! ```rust
//! use sevlog::LogEngine;
//!
//! let engine = LogEngine::new();
//! engine.configure_sink("/tmp/sevlog_doc_proxy.log");
//! engine.error("proxy 3", "upstream refused\nretrying");
//! engine.flush();
//! let content = std::fs::read_to_string("/tmp/sevlog_doc_proxy.log").unwrap();
//! assert!(content.ends_with("retrying\n"));
//! ```
//!
//! ## Debug toggle
//! ```rust
//! use sevlog::{LogEngine, Severity};
//!
//! let engine = LogEngine::new();
//! engine.toggle(); // everything down to DEBUG is written
//! assert_eq!(engine.level(), Severity::Debug);
//! engine.toggle(); // back to exactly where it was
//! assert_eq!(engine.level(), Severity::Warning);
//! ```

mod engine;
mod facade;
mod history;

use std::sync::Arc;

pub use engine::{ErrorTrap, LogEngine, SUPERVISOR, source_tag};
pub use history::HistoryEntry;
pub use sevlog_core::{
    ConsoleStream, Destination, LazyFormat, LogWriter, Record, Severity, Sink, SinkError,
    hex_string, single_line,
};

/// The two engines of a process: general logging and usage statistics.
///
/// Build it once at startup and hand clones of the `Arc`s to whoever logs.
/// The engines share nothing: levels, histories and sinks are independent.
#[derive(Clone)]
pub struct Loggers {
    pub log: Arc<LogEngine>,
    pub usage: Arc<LogEngine>,
}

impl Loggers {
    pub fn new() -> Self {
        Self {
            log: Arc::new(LogEngine::new()),
            usage: Arc::new(LogEngine::new()),
        }
    }
}

impl Default for Loggers {
    fn default() -> Self {
        Self::new()
    }
}

#[test]
fn test_loggers_are_independent() {
    let loggers = Loggers::new();
    loggers.log.set_debug_mode();
    loggers.log.debug("proxy", "general");
    loggers.usage.toggle();

    assert_eq!(loggers.usage.level(), Severity::Debug);
    assert!(loggers.usage.is_overridden());
    assert!(!loggers.log.is_overridden());
    assert_eq!(loggers.log.entries().len(), 1);
    assert!(loggers.usage.entries().is_empty());

    let shared = loggers.clone();
    shared.usage.info("usage", "counted");
    assert_eq!(loggers.usage.entries().len(), 1);
}
