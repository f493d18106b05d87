use std::sync::Arc;

use log::{LevelFilter, Log, SetLoggerError};
use sevlog_core::Severity;

use crate::engine::LogEngine;

/// Routes `log` macros into an engine: the target becomes the source.
struct FacadeBridge {
    engine: Arc<LogEngine>,
}

impl Log for FacadeBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        Severity::from(metadata.level()).passes(self.engine.level())
    }

    fn log(&self, record: &log::Record) {
        // not gated on `enabled`: filtered records may still be recorded in history
        self.engine
            .log(record.level().into(), record.target(), record.args());
    }

    fn flush(&self) {
        self.engine.flush();
    }
}

impl LogEngine {
    /// Registers `engine` as the global `log` backend.
    ///
    /// The `log` max level is opened fully so the engine's own threshold and
    /// toggle decide what is written. Fails if a backend is already set.
    pub fn install_facade(engine: Arc<LogEngine>) -> Result<(), SetLoggerError> {
        log::set_boxed_logger(Box::new(FacadeBridge { engine }))?;
        log::set_max_level(LevelFilter::Trace);
        Ok(())
    }
}

#[test]
fn test_facade_routes_into_engine() {
    let engine = Arc::new(LogEngine::with_capacity(20));
    LogEngine::install_facade(engine.clone()).unwrap();
    assert!(LogEngine::install_facade(engine.clone()).is_err());

    log::warn!(target: "proxy", "via facade {}", 1);
    log::trace!(target: "resolver", "first trace");
    log::trace!(target: "resolver", "second trace");

    let entries = engine.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].source, "proxy");
    assert_eq!(entries[0].severity, Severity::Warning);
    assert_eq!(entries[0].message, "via facade 1");
    assert_eq!(entries[1].severity, Severity::Debug);
    assert_eq!(entries[1].message, "first trace");

    assert!(log::log_enabled!(target: "proxy", log::Level::Error));
    assert!(!log::log_enabled!(target: "proxy", log::Level::Info));
}
