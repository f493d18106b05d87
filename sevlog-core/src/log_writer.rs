use std::io::{self, Write};

use chrono::{Local, NaiveDateTime};
use colored::{ColoredString, Colorize};

use crate::{severity::Severity, utils::format_line};

/// One line handed to a writer, with everything needed to render it.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    pub timestamp: NaiveDateTime,
    pub severity: Severity,
    pub pid: u32,
    pub source: &'a str,
    pub line: &'a str,
}

impl<'a> Record<'a> {
    /// Stamps a line with the current local time and process id.
    pub fn now(severity: Severity, source: &'a str, line: &'a str) -> Self {
        Self {
            timestamp: Local::now().naive_local(),
            severity,
            // looked up per record, the process may have forked since start
            pid: std::process::id(),
            source,
            line,
        }
    }

    pub fn formatted(&self) -> String {
        format_line(
            &self.timestamp,
            self.severity,
            self.pid,
            self.source,
            self.line,
        )
    }
}

/// Capability set of a log destination.
///
/// Implementors only provide [`write`](LogWriter::write) and
/// [`flush`](LogWriter::flush); the per-severity methods are built on top.
///
/// The per-severity methods are for driving a writer directly. Each one stamps
/// a fresh [`Record::now`]; the engine builds its records itself so that every
/// line of a message carries the timestamp of its history entry.
pub trait LogWriter: Send {
    fn write(&mut self, record: &Record<'_>) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;

    fn emergency(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Emergency, source, line))
    }
    fn alert(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Alert, source, line))
    }
    fn critical(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Critical, source, line))
    }
    fn error(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Error, source, line))
    }
    fn warning(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Warning, source, line))
    }
    fn notice(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Notice, source, line))
    }
    fn info(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Info, source, line))
    }
    fn debug(&mut self, source: &str, line: &str) -> io::Result<()> {
        self.write(&Record::now(Severity::Debug, source, line))
    }
}

impl<W: LogWriter + ?Sized> LogWriter for Box<W> {
    fn write(&mut self, record: &Record<'_>) -> io::Result<()> {
        (**self).write(record)
    }
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Writes the bare message text, without any metadata. Stdout unless built
/// with [`Printer::to`].
#[derive(Debug)]
pub struct Printer<W: Write + Send = io::Stdout> {
    out: W,
}

impl Default for Printer {
    fn default() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send> Printer<W> {
    pub fn to(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send> LogWriter for Printer<W> {
    fn write(&mut self, record: &Record<'_>) -> io::Result<()> {
        writeln!(self.out, "{}", record.line)?;
        self.out.flush()
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleStream {
    Stdout,
    Stderr,
}

/// Writes fully formatted lines to stdout or stderr.
#[derive(Debug)]
pub struct Console {
    stream: ConsoleStream,
    color: bool,
}

impl Console {
    pub fn new(stream: ConsoleStream) -> Self {
        Self {
            stream,
            color: false,
        }
    }

    pub fn with_color(self, color: bool) -> Self {
        Self { color, ..self }
    }

    fn render(&self, record: &Record<'_>) -> String {
        let line = record.formatted();
        if self.color {
            colorize(record.severity, &line).to_string()
        } else {
            line
        }
    }
}

fn colorize(severity: Severity, line: &str) -> ColoredString {
    match severity {
        Severity::Emergency | Severity::Alert => line.red().bold(),
        Severity::Critical | Severity::Error => line.red(),
        Severity::Warning => line.yellow(),
        Severity::Notice => line.cyan(),
        Severity::Info => line.green(),
        Severity::Debug => line.blue(),
    }
}

impl LogWriter for Console {
    fn write(&mut self, record: &Record<'_>) -> io::Result<()> {
        let line = self.render(record);
        match self.stream {
            ConsoleStream::Stdout => writeln!(io::stdout().lock(), "{line}"),
            ConsoleStream::Stderr => writeln!(io::stderr().lock(), "{line}"),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.stream {
            ConsoleStream::Stdout => io::stdout().flush(),
            ConsoleStream::Stderr => io::stderr().flush(),
        }
    }
}

/// Discards everything. Installed until a real sink is configured.
#[derive(Default, Debug)]
pub struct NullWriter;

impl LogWriter for NullWriter {
    fn write(&mut self, _: &Record<'_>) -> io::Result<()> {
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
