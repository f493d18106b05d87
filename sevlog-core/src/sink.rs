use std::{
    fmt, io,
    path::{Path, PathBuf},
};

use crate::{
    config::SEVLOG_CONFIG,
    log_rotation::{RotatingFile, SizeRotationConfig},
    log_writer::{Console, ConsoleStream, LogWriter, NullWriter, Printer, Record},
    syslog::{self, SyslogWriter},
};

/// Where log lines go, parsed once from the destination string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// `print`: bare message text on stdout.
    Print,
    /// `stdout` / `stderr`: formatted lines on a console stream.
    Console(ConsoleStream),
    /// empty string: the local syslog socket, else UDP to localhost.
    LocalSyslog,
    /// `host:<name>`: UDP syslog to a remote host.
    RemoteSyslog(String),
    /// anything else: a size-rotated file.
    File(PathBuf),
}

impl Destination {
    pub fn parse(value: &str) -> Self {
        match value {
            "print" => return Destination::Print,
            "stdout" => return Destination::Console(ConsoleStream::Stdout),
            "stderr" => return Destination::Console(ConsoleStream::Stderr),
            "" => return Destination::LocalSyslog,
            _ => {}
        }
        match value.get(..5) {
            Some(prefix) if prefix.eq_ignore_ascii_case("host:") => {
                Destination::RemoteSyslog(value[5..].trim().to_string())
            }
            _ => Destination::File(PathBuf::from(value)),
        }
    }
}

impl From<&str> for Destination {
    fn from(value: &str) -> Self {
        Destination::parse(value)
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Print => f.write_str("print"),
            Destination::Console(ConsoleStream::Stdout) => f.write_str("stdout"),
            Destination::Console(ConsoleStream::Stderr) => f.write_str("stderr"),
            Destination::LocalSyslog => f.write_str("local syslog"),
            Destination::RemoteSyslog(host) => write!(f, "host:{host}"),
            Destination::File(path) => write!(f, "{}", path.display()),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("{destination}: {source}")]
    Io {
        destination: String,
        #[source]
        source: io::Error,
    },
    #[error("cannot resolve syslog host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },
}

/// The closed set of log destinations.
pub enum Sink {
    Null(NullWriter),
    Print(Printer),
    Console(Console),
    Syslog(SyslogWriter),
    File(RotatingFile),
}

impl Default for Sink {
    fn default() -> Self {
        Sink::Null(NullWriter)
    }
}

impl Sink {
    /// Builds the writer for `destination`, connecting or opening as needed.
    pub fn open(destination: &Destination) -> Result<Self, SinkError> {
        let io_error = |source: io::Error| SinkError::Io {
            destination: destination.to_string(),
            source,
        };
        match destination {
            Destination::Print => Ok(Sink::Print(Printer::default())),
            Destination::Console(stream) => Ok(Sink::Console(
                Console::new(*stream).with_color(SEVLOG_CONFIG.COLOR),
            )),
            Destination::LocalSyslog => {
                Sink::open_local(syslog::local_socket_path().as_deref())
            }
            Destination::RemoteSyslog(host) => remote_syslog(host),
            Destination::File(path) => RotatingFile::new(SizeRotationConfig::with_defaults(path))
                .map(Sink::File)
                .map_err(io_error),
        }
    }

    /// Syslog through the daemon socket at `path`, or UDP to the fallback host
    /// when there is none.
    pub fn open_local(path: Option<&Path>) -> Result<Self, SinkError> {
        match path {
            #[cfg(unix)]
            Some(path) => SyslogWriter::unix(path)
                .map(Sink::Syslog)
                .map_err(|source| SinkError::Io {
                    destination: path.display().to_string(),
                    source,
                }),
            _ => remote_syslog(syslog::FALLBACK_HOST),
        }
    }

    #[cfg(test)]
    fn kind(&self) -> &'static str {
        match self {
            Sink::Null(_) => "null",
            Sink::Print(_) => "print",
            Sink::Console(_) => "console",
            Sink::Syslog(_) => "syslog",
            Sink::File(_) => "file",
        }
    }
}

fn remote_syslog(host: &str) -> Result<Sink, SinkError> {
    let addrs = syslog::resolve(host, SEVLOG_CONFIG.SYSLOG_PORT).map_err(|source| {
        SinkError::Resolve {
            host: host.to_string(),
            source,
        }
    })?;
    SyslogWriter::udp(&addrs)
        .map(Sink::Syslog)
        .map_err(|source| SinkError::Io {
            destination: format!("host:{host}"),
            source,
        })
}

impl LogWriter for Sink {
    fn write(&mut self, record: &Record<'_>) -> io::Result<()> {
        match self {
            Sink::Null(w) => w.write(record),
            Sink::Print(w) => w.write(record),
            Sink::Console(w) => w.write(record),
            Sink::Syslog(w) => w.write(record),
            Sink::File(w) => w.write(record),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Null(w) => w.flush(),
            Sink::Print(w) => w.flush(),
            Sink::Console(w) => w.flush(),
            Sink::Syslog(w) => w.flush(),
            Sink::File(w) => w.flush(),
        }
    }
}
