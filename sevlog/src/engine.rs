use std::{
    collections::HashMap,
    fmt,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicU8, AtomicU64, Ordering},
    },
};

use sevlog_core::{
    Destination, LogWriter, NullWriter, Record, SEVLOG_CONFIG, Severity, Sink,
};

use crate::history::{HistoryBuffer, HistoryEntry};

/// Source under which the engine reports its own configuration problems.
pub const SUPERVISOR: &str = "supervisor";

/// Called when an error-or-worse message arrives while a trap is set.
pub type ErrorTrap = Arc<dyn Fn(Severity, &str) + Send + Sync>;

/// Threshold and suppression map saved while the debug override is on.
#[derive(Debug, Clone)]
struct ToggleState {
    level: Severity,
    status: HashMap<String, bool>,
}

/// Everything guarded by the history lock.
struct Recorder {
    history: HistoryBuffer,
    status: HashMap<String, bool>,
    toggle: Option<ToggleState>,
}

impl Recorder {
    fn is_recorded(&self, tag: &str) -> bool {
        self.status.get(tag).copied().unwrap_or(false)
    }
}

/// A leveled logger with a rolling history and a debug toggle.
///
/// Every call records into the history buffer according to the recording
/// rule, then writes each line of the message to the sink when the severity
/// passes the current threshold. The engine never panics on its own behalf:
/// sink construction errors are logged, and sink write errors are counted.
pub struct LogEngine {
    level: AtomicU8,
    recorder: Mutex<Recorder>,
    writer: Mutex<Box<dyn LogWriter>>,
    error_trap: RwLock<Option<ErrorTrap>>,
    write_failures: AtomicU64,
}

impl Default for LogEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// First whitespace-delimited token of a source, used for suppression.
pub fn source_tag(source: &str) -> &str {
    source.split_whitespace().next().unwrap_or("")
}

impl LogEngine {
    /// An engine at WARNING with no sink and the configured history size.
    pub fn new() -> Self {
        Self::with_capacity(SEVLOG_CONFIG.HISTORY_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            level: AtomicU8::new(Severity::Warning.as_u8()),
            recorder: Mutex::new(Recorder {
                history: HistoryBuffer::new(capacity),
                status: HashMap::new(),
                toggle: None,
            }),
            writer: Mutex::new(Box::new(NullWriter)),
            error_trap: RwLock::new(None),
            write_failures: AtomicU64::new(0),
        }
    }

    pub fn level(&self) -> Severity {
        Severity::from_u8(self.level.load(Ordering::Relaxed)).unwrap_or(Severity::Debug)
    }

    pub fn set_level(&self, level: Severity) {
        self.level.store(level.as_u8(), Ordering::Relaxed);
    }

    pub fn set_debug_mode(&self) {
        self.set_level(Severity::Debug);
    }

    /// Selects the sink from a destination string.
    ///
    /// | destination | sink |
    /// |---|---|
    /// | `print` | bare message text on stdout |
    /// | `stdout`, `stderr` | formatted lines on that stream |
    /// | empty | local syslog socket, else `localhost:514` |
    /// | `host:<name>` | syslog at `<name>:514` |
    /// | anything else | file rotated at 5 MiB, 5 backups |
    ///
    /// A sink that cannot be built is reported as an error from
    /// `supervisor` and the current sink is kept.
    pub fn configure_sink(&self, destination: &str) {
        match Sink::open(&Destination::parse(destination)) {
            Ok(sink) => self.set_writer(sink),
            Err(e) => self.error(SUPERVISOR, format!("could not use SYSLOG {e}")),
        }
    }

    /// Installs any writer as the sink, flushing and dropping the previous one.
    pub fn set_writer<W: LogWriter + 'static>(&self, writer: W) {
        let mut current = lock(&self.writer);
        let _ = current.flush();
        *current = Box::new(writer);
    }

    pub fn flush(&self) {
        if lock(&self.writer).flush().is_err() {
            self.write_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of sink writes or flushes that failed since creation.
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    /// Sets or clears the error trap. While set, an error-or-worse message
    /// raises the threshold to EMERGENCY before the trap runs.
    pub fn set_error_trap(&self, trap: Option<ErrorTrap>) {
        *self.error_trap.write().unwrap_or_else(PoisonError::into_inner) = trap;
    }

    /// Flips between normal operation and the debug override.
    ///
    /// Entering saves the threshold and suppression map, lowers the threshold
    /// to DEBUG and marks every known source as recorded. Leaving restores
    /// exactly what was saved.
    pub fn toggle(&self) {
        let mut recorder = lock(&self.recorder);
        match recorder.toggle.take() {
            Some(saved) => {
                recorder.status = saved.status;
                self.set_level(saved.level);
            }
            None => {
                let saved = ToggleState {
                    level: self.level(),
                    status: recorder.status.clone(),
                };
                recorder.status.values_mut().for_each(|seen| *seen = true);
                recorder.toggle = Some(saved);
                self.set_level(Severity::Debug);
            }
        }
    }

    pub fn is_overridden(&self) -> bool {
        lock(&self.recorder).toggle.is_some()
    }

    /// The suppression map as it currently stands.
    pub fn suppression(&self) -> HashMap<String, bool> {
        lock(&self.recorder).status.clone()
    }

    /// The history buffer, formatted, oldest first.
    pub fn history(&self) -> String {
        lock(&self.recorder).history.render()
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        lock(&self.recorder).history.entries().cloned().collect()
    }

    pub fn history_capacity(&self) -> usize {
        lock(&self.recorder).history.capacity()
    }

    fn spring_trap(&self, severity: Severity, source: &str) {
        let trap = self
            .error_trap
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(trap) = trap {
            self.set_level(Severity::Emergency);
            trap(severity, source);
        }
    }

    /// Records and emits `message` from `source` at `severity`.
    ///
    /// The message is rendered at most once, and not at all when it is
    /// neither recorded nor emitted.
    pub fn log(&self, severity: Severity, source: &str, message: impl fmt::Display) {
        if severity <= Severity::Error {
            self.spring_trap(severity, source);
        }

        let passes = severity.passes(self.level());
        let tag = source_tag(source);
        if !passes && lock(&self.recorder).is_recorded(tag) {
            return;
        }

        let text = message.to_string();
        let entry = HistoryEntry::now(severity, source, text);
        let timestamp = entry.timestamp;
        let pid = entry.pid;
        {
            let mut recorder = lock(&self.recorder);
            // re-checked: another thread may have recorded this tag meanwhile
            if passes || !recorder.is_recorded(tag) {
                recorder.history.push(entry.clone());
                recorder.status.insert(tag.to_string(), true);
            }
        }

        if !passes {
            return;
        }
        let mut writer = lock(&self.writer);
        for line in entry.message.split('\n') {
            let record = Record {
                timestamp,
                severity,
                pid,
                source,
                line,
            };
            if writer.write(&record).is_err() {
                self.write_failures.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn emergency(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Emergency, source, message)
    }

    pub fn alert(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Alert, source, message)
    }

    pub fn critical(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Critical, source, message)
    }

    pub fn error(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Error, source, message)
    }

    pub fn warning(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Warning, source, message)
    }

    pub fn notice(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Notice, source, message)
    }

    pub fn info(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Info, source, message)
    }

    pub fn debug(&self, source: &str, message: impl fmt::Display) {
        self.log(Severity::Debug, source, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sevlog_core::{LazyFormat, Printer};
    use std::{
        fs, io,
        path::PathBuf,
        sync::atomic::AtomicUsize,
        thread,
    };

    /// Keeps every record it is given.
    #[derive(Clone, Default)]
    struct Capture(Arc<Mutex<Vec<(Severity, String, String)>>>);

    impl Capture {
        fn lines(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|(_, _, l)| l.clone()).collect()
        }
        fn formatted(&self) -> Vec<String> {
            self.0.lock().unwrap().iter().map(|(_, f, _)| f.clone()).collect()
        }
        fn severities(&self) -> Vec<Severity> {
            self.0.lock().unwrap().iter().map(|(s, _, _)| *s).collect()
        }
    }

    impl LogWriter for Capture {
        fn write(&mut self, record: &Record<'_>) -> io::Result<()> {
            self.0.lock().unwrap().push((
                record.severity,
                record.formatted(),
                record.line.to_string(),
            ));
            Ok(())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Failing;

    impl LogWriter for Failing {
        fn write(&mut self, _: &Record<'_>) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
        }
    }

    fn engine() -> (LogEngine, Capture) {
        let engine = LogEngine::with_capacity(20);
        let capture = Capture::default();
        engine.set_writer(capture.clone());
        (engine, capture)
    }

    fn messages(engine: &LogEngine) -> Vec<String> {
        engine.entries().into_iter().map(|e| e.message).collect()
    }

    #[test]
    fn test_defaults() {
        let engine = LogEngine::new();
        assert_eq!(engine.level(), Severity::Warning);
        assert!(!engine.is_overridden());
        assert_eq!(engine.history(), "");
        // no sink configured yet: nothing to write to, nothing breaks
        engine.emergency("supervisor", "early");
        assert_eq!(engine.write_failures(), 0);
    }

    #[test]
    fn test_source_tag() {
        assert_eq!(source_tag("proxy 12"), "proxy");
        assert_eq!(source_tag("  supervisor init"), "supervisor");
        assert_eq!(source_tag("manager"), "manager");
        assert_eq!(source_tag(""), "");
    }

    #[test]
    fn test_level_filtering() {
        let (engine, capture) = engine();
        engine.info("proxy 1", "hidden");
        engine.warning("proxy 1", "shown");
        engine.critical("proxy 1", "shown too");
        assert_eq!(capture.lines(), ["shown", "shown too"]);
        assert_eq!(
            capture.severities(),
            [Severity::Warning, Severity::Critical]
        );

        engine.set_debug_mode();
        assert_eq!(engine.level(), Severity::Debug);
        engine.debug("proxy 1", "now visible");
        assert_eq!(capture.lines().last().unwrap(), "now visible");

        engine.set_level(Severity::Emergency);
        engine.alert("proxy 1", "silenced");
        assert_eq!(capture.lines().len(), 3);
    }

    #[test]
    fn test_filtered_first_occurrence_is_recorded() {
        let (engine, capture) = engine();
        engine.debug("client 4", "first");
        engine.debug("client 5", "second");
        engine.info("client 6", "third");
        assert!(capture.lines().is_empty());
        assert_eq!(messages(&engine), ["first"]);
        assert_eq!(engine.suppression().get("client"), Some(&true));
    }

    #[test]
    fn test_emitted_messages_are_recorded_once() {
        let (engine, capture) = engine();
        engine.warning("proxy", "one");
        engine.warning("proxy", "two");
        engine.info("proxy", "filtered");
        assert_eq!(capture.lines(), ["one", "two"]);
        assert_eq!(messages(&engine), ["one", "two"]);
    }

    #[test]
    fn test_multi_line_message() {
        let (engine, capture) = engine();
        engine.error("proxy 3", "line one\nline two\nline three");
        assert_eq!(capture.lines(), ["line one", "line two", "line three"]);
        assert_eq!(messages(&engine), ["line one\nline two\nline three"]);

        let formatted = capture.formatted();
        assert!(formatted.iter().all(|l| l.contains(" ERROR     ")));
        assert!(formatted[1].ends_with(" proxy 3       line two"));
    }

    #[test]
    fn test_multi_line_filtered_message() {
        let (engine, capture) = engine();
        engine.debug("worker", "a\nb\nc");
        assert!(capture.lines().is_empty());
        assert_eq!(messages(&engine), ["a\nb\nc"]);
    }

    #[test]
    fn test_history_keeps_last_entries_in_order() {
        let (engine, _) = engine();
        for i in 0..45 {
            engine.error(&format!("source{i}"), format!("message {i}"));
        }
        let expected: Vec<String> = (25..45).map(|i| format!("message {i}")).collect();
        assert_eq!(messages(&engine), expected);

        let history = engine.history();
        assert_eq!(history.lines().count(), 20);
        assert!(history.lines().next().unwrap().ends_with("message 25"));
        assert!(history.lines().last().unwrap().ends_with("message 44"));
    }

    #[test]
    fn test_history_format() {
        let (engine, _) = engine();
        engine.warning("supervisor", "started");
        let line = engine.history();
        let pid = std::process::id();
        assert!(line.ends_with(&format!(" WARNING   {pid:<6} supervisor    started")));
        // `Dow, DD Mon YYYY HH:MM:SS` is 25 columns
        assert_eq!(&line[3..5], ", ");
        assert_eq!(line.as_bytes()[25], b' ');
    }

    #[test]
    fn test_toggle_round_trip() {
        let (engine, capture) = engine();
        engine.set_level(Severity::Notice);
        engine.debug("proxy 1", "seen once");
        engine.warning("manager", "emitted");
        let level = engine.level();
        let status = engine.suppression();

        engine.toggle();
        assert!(engine.is_overridden());
        assert_eq!(engine.level(), Severity::Debug);
        assert!(engine.suppression().values().all(|seen| *seen));
        engine.debug("proxy 2", "debug while overridden");
        engine.debug("redirector", "new source");
        assert_eq!(
            &capture.lines()[1..],
            ["debug while overridden", "new source"]
        );

        engine.toggle();
        assert!(!engine.is_overridden());
        assert_eq!(engine.level(), level);
        assert_eq!(engine.suppression(), status);
        assert!(!engine.suppression().contains_key("redirector"));
    }

    #[test]
    fn test_toggle_from_emergency_level() {
        let (engine, _) = engine();
        engine.set_level(Severity::Emergency);
        engine.toggle();
        assert_eq!(engine.level(), Severity::Debug);
        engine.toggle();
        assert_eq!(engine.level(), Severity::Emergency);
        assert!(!engine.is_overridden());
    }

    #[test]
    fn test_lazy_message_not_rendered_when_suppressed() {
        static RENDERED: AtomicUsize = AtomicUsize::new(0);
        fn counting(message: &str) -> String {
            RENDERED.fetch_add(1, Ordering::SeqCst);
            message.to_uppercase()
        }

        let (engine, _) = engine();
        engine.debug("proxy", LazyFormat::new("", counting, "first"));
        engine.debug("proxy", LazyFormat::new("", counting, "second"));
        engine.debug("proxy", LazyFormat::new("", counting, "third"));
        assert_eq!(RENDERED.load(Ordering::SeqCst), 1);
        assert_eq!(messages(&engine), ["FIRST"]);
    }

    #[test]
    fn test_write_failures_are_counted() {
        let engine = LogEngine::with_capacity(20);
        engine.set_writer(Failing);
        engine.error("proxy", "a\nb");
        engine.flush();
        assert_eq!(engine.write_failures(), 3);
        assert_eq!(messages(&engine), ["a\nb"]);
        // the history lock is still usable
        engine.error("proxy", "c");
        assert_eq!(engine.entries().len(), 2);
    }

    #[test]
    fn test_error_trap_escalates_threshold() {
        let (engine, capture) = engine();
        let sprung = Arc::new(AtomicUsize::new(0));
        let counter = sprung.clone();
        engine.set_error_trap(Some(Arc::new(move |severity: Severity, source: &str| {
            assert_eq!(severity, Severity::Error);
            assert_eq!(source, "proxy");
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        engine.warning("proxy", "not a trigger");
        assert_eq!(sprung.load(Ordering::SeqCst), 0);
        engine.error("proxy", "trigger");
        assert_eq!(sprung.load(Ordering::SeqCst), 1);
        assert_eq!(engine.level(), Severity::Emergency);
        assert_eq!(capture.lines(), ["not a trigger"]);

        engine.set_error_trap(None);
        engine.set_level(Severity::Warning);
        engine.error("proxy", "no trap");
        assert_eq!(sprung.load(Ordering::SeqCst), 1);
        assert_eq!(capture.lines().last().unwrap(), "no trap");
    }

    #[test]
    fn test_configure_print_sink() {
        let engine = LogEngine::with_capacity(20);
        engine.configure_sink("print");
        for _ in 0..3 {
            engine.warning("supervisor", "raw text only");
        }
        assert_eq!(engine.write_failures(), 0);
    }

    /// Shared byte buffer, so the test can read what a `Printer` wrote.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_printer_emits_bare_message_text() {
        let engine = LogEngine::with_capacity(20);
        let out = SharedBuf::default();
        engine.set_writer(Printer::to(out.clone()));

        engine.warning("supervisor init", "a\nb");
        engine.info("supervisor init", "filtered");
        assert_eq!(out.0.lock().unwrap().as_slice(), b"a\nb\n");
        assert_eq!(engine.entries().len(), 1);
    }

    #[test]
    fn test_configure_file_sink() {
        let dir = PathBuf::from("/tmp/sevlog_test_engine_file");
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("proxy.log");

        let engine = LogEngine::with_capacity(20);
        engine.configure_sink(path.to_str().unwrap());
        engine.warning("proxy 9", "to disk\nsecond line");
        engine.info("proxy 9", "filtered");
        engine.flush();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with(" proxy 9       to disk"));
        assert!(lines[1].ends_with(" proxy 9       second line"));
    }

    #[test]
    fn test_configure_failure_is_logged_not_raised() {
        let (engine, capture) = engine();
        engine.configure_sink("/tmp/sevlog_test_no_such_dir/nested/proxy.log");
        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("could not use SYSLOG "));
        assert_eq!(capture.severities(), [Severity::Error]);
        let entries = engine.entries();
        assert_eq!(entries[0].source, SUPERVISOR);
        // the previous sink stays installed
        engine.warning("proxy", "still captured");
        assert_eq!(capture.lines().last().unwrap(), "still captured");
    }

    #[test]
    fn test_concurrent_recording() {
        let engine = Arc::new(LogEngine::with_capacity(20));
        let capture = Capture::default();
        engine.set_writer(capture.clone());
        let threads = 8;
        let per_thread = 50;
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for i in 0..per_thread {
                        engine.warning(&format!("worker{t}"), format!("{t}-{i}"));
                        engine.debug(&format!("quiet{t}"), "filtered");
                        assert!(engine.entries().len() <= 20);
                        let _ = engine.history();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(engine.entries().len(), 20);
        assert_eq!(capture.lines().len(), threads * per_thread);
        assert_eq!(engine.history().lines().count(), 20);
    }

    #[test]
    fn test_concurrent_toggle_and_emission() {
        let engine = Arc::new(LogEngine::with_capacity(20));
        let togglers: Vec<_> = (0..2)
            .map(|_| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        engine.toggle();
                    }
                })
            })
            .collect();
        let emitters: Vec<_> = (0..4)
            .map(|t| {
                let engine = engine.clone();
                thread::spawn(move || {
                    for i in 0..100 {
                        engine.info(&format!("source{t} {i}"), "busy");
                    }
                })
            })
            .collect();
        for handle in togglers.into_iter().chain(emitters) {
            handle.join().unwrap();
        }
        // an even number of toggles overall leaves the engine where it started
        assert!(!engine.is_overridden());
        assert_eq!(engine.level(), Severity::Warning);
        assert!(engine.entries().len() <= 20);
    }
}
