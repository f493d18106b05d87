use std::fmt;

use chrono::NaiveDateTime;

use crate::severity::Severity;

/// Timestamp layout of every formatted line, e.g. `Mon, 01 Jan 2024 00:00:00`.
pub const TIMESTAMP_FORMAT: &str = "%a, %d %b %Y %H:%M:%S";

/// Renders one log line in the fixed columnar layout:
/// `<timestamp> <SEVERITY:-9> <PID:-6> <SOURCE:-13> <line>`.
/// Columns are left-justified and never truncated.
pub fn format_line(
    timestamp: &NaiveDateTime,
    severity: Severity,
    pid: u32,
    source: &str,
    line: &str,
) -> String {
    let time = timestamp.format(TIMESTAMP_FORMAT);
    format!("{time} {severity:<9} {pid:<6} {source:<13} {line}")
}

/// Lists the bytes of `value` as hex literals: `['0x47', '0x45']`.
pub fn hex_string(value: &[u8]) -> String {
    let items: Vec<String> = value.iter().map(|b| format!("'{b:#x}'")).collect();
    format!("[{}]", items.join(", "))
}

/// Brackets `value` and makes CRLF pairs visible so a protocol exchange fits on one line.
pub fn single_line(value: &str) -> String {
    format!("[{}]", value.replace("\r\n", "\\r\\n"))
}

/// A message whose (possibly costly) rendering is deferred until it is displayed.
///
/// The engine only displays a message when it records or emits it, so a
/// filtered debug message built with `LazyFormat` never pays for `format`.
pub struct LazyFormat {
    prefix: String,
    format: Option<fn(&str) -> String>,
    message: String,
}

impl LazyFormat {
    pub fn new(
        prefix: impl Into<String>,
        format: fn(&str) -> String,
        message: impl Into<String>,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            format: Some(format),
            message: message.into(),
        }
    }

    pub fn plain(prefix: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            format: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for LazyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix)?;
        match self.format {
            Some(format) => f.write_str(&format(&self.message)),
            None => f.write_str(&self.message),
        }
    }
}
