//! # sevlog-core
//! Core utilities for sevlog - severities, the line format and the log sinks.

mod config;
mod log_rotation;
mod log_writer;
mod severity;
mod sink;
pub mod syslog;
mod utils;

pub use config::{SEVLOG_CONFIG, SevLogConfig};
pub use log_rotation::{RotatingFile, SizeRotationConfig, backup_path};
pub use log_writer::{Console, ConsoleStream, LogWriter, NullWriter, Printer, Record};
pub use severity::{ParseSeverityError, Severity};
pub use sink::{Destination, Sink, SinkError};
pub use syslog::SyslogWriter;
pub use utils::{LazyFormat, TIMESTAMP_FORMAT, format_line, hex_string, single_line};
