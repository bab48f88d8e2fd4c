//! Request-scoped error stack and the access/error log.
//!
//! Every failure raised while a request is handled is appended to an
//! [`ErrorStack`] owned by the request scope. The stack never overwrites:
//! the first record is what the caller sees, the full list goes to the
//! access log when the request completes.
//!
//! ```text
//! 0 {uid} [{date}] [{request} {signal} {exp} {pass} {tpass} {path} {file} {format} {archive} {device} {server}]
//! 1 {uid} [{date}] {kind} {code} [{location}] [{message}]
//! ```
//!
//! # Example
//!
//! ```
//! use uda_core::error::UdaError;
//! use uda_core::error_stack::ErrorStack;
//!
//! let mut stack = ErrorStack::new();
//! let err = stack.record("parse", UdaError::MissingRequest);
//! assert_eq!(stack.len(), 1);
//! assert_eq!(stack.first().unwrap().code, err.code());
//! ```

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::UdaError;
use crate::protocol::STRING_LENGTH;
use crate::request::RequestDescriptor;
use crate::strings::truncate_bytes;

/// Tracing target used for access log lines.
pub const ACCESS_LOG_TARGET: &str = "uda::access";

/// Origin of an error record. Wire values are stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// OS-level failure; the message carries the OS description.
    System = 1,
    /// Validation or logic failure raised by this crate.
    Code = 2,
    /// Failure reported by a downstream reader plugin.
    Plugin = 3,
}

impl ErrorKind {
    /// Wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Decode a wire value; anything unknown is treated as a code error.
    pub fn from_i32(value: i32) -> Self {
        match value {
            1 => ErrorKind::System,
            3 => ErrorKind::Plugin,
            _ => ErrorKind::Code,
        }
    }
}

/// One entry on the error stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub location: String,
    pub code: i32,
    pub message: String,
}

impl ErrorRecord {
    /// Create a record.
    ///
    /// System records get the OS description of `code` appended to the
    /// message (or used as the message when it is empty). Location and
    /// message are cut to [`STRING_LENGTH`] bytes so the record always fits
    /// a server state block.
    pub fn new(kind: ErrorKind, location: &str, code: i32, message: &str) -> Self {
        let message = if kind == ErrorKind::System && code != 0 {
            let os = std::io::Error::from_raw_os_error(code).to_string();
            if message.is_empty() {
                os
            } else {
                format!("{}; {}", message, os)
            }
        } else {
            message.to_string()
        };

        Self {
            kind,
            location: truncate_bytes(location, STRING_LENGTH).to_string(),
            code,
            message: truncate_bytes(&message, STRING_LENGTH).to_string(),
        }
    }
}

/// Ordered, append-only list of error records for one request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorStack {
    records: Vec<ErrorRecord>,
}

impl ErrorStack {
    /// Create an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn add(&mut self, kind: ErrorKind, location: &str, code: i32, message: &str) {
        let record = ErrorRecord::new(kind, location, code, message);
        tracing::debug!(
            location = %record.location,
            code = record.code,
            "error recorded: {}",
            record.message
        );
        self.records.push(record);
    }

    /// Append a pre-built record unchanged.
    pub fn push(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }

    /// Record `err` against `location` and hand it back for propagation.
    ///
    /// ```ignore
    /// let subset = parse_subset(text).map_err(|e| stack.record("extract_subset", e))?;
    /// ```
    pub fn record(&mut self, location: &str, err: UdaError) -> UdaError {
        let message = match &err {
            // The OS description is appended by ErrorRecord::new.
            UdaError::Io(e) if e.raw_os_error().is_some() => String::new(),
            other => other.to_string(),
        };
        self.add(err.kind(), location, err.code(), &message);
        err
    }

    /// Append every record of `other`, preserving order.
    pub fn extend(&mut self, other: ErrorStack) {
        self.records.extend(other.records);
    }

    /// First record, which drives client-visible behaviour.
    pub fn first(&self) -> Option<&ErrorRecord> {
        self.records.first()
    }

    /// All records in insertion order.
    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Check if no errors were recorded.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Copy the records out and clear the stack.
    pub fn drain(&mut self) -> Vec<ErrorRecord> {
        std::mem::take(&mut self.records)
    }

    /// Render the access log lines for a finished request.
    pub fn log_lines(&self, uid: &str, date: &str, request: &RequestDescriptor) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.records.len() + 1);
        lines.push(format!(
            "0 {} [{}] [{} {} {} {} {} {} {} {} {} {} {}]",
            uid,
            date,
            request.request.id(),
            request.signal,
            request.exp_number,
            request.pass,
            request.tpass,
            request.path,
            request.file,
            request.format,
            request.archive,
            request.device_name,
            request.server
        ));
        for record in &self.records {
            lines.push(format!(
                "1 {} [{}] {} {} [{}] [{}]",
                uid,
                date,
                record.kind.as_i32(),
                record.code,
                record.location,
                record.message
            ));
        }
        lines
    }

    /// Emit the access log for a finished request and drain the stack.
    ///
    /// Lines go to the [`ACCESS_LOG_TARGET`] tracing target. The drained
    /// records are returned so the caller can forward them to the client.
    pub fn log_request(&mut self, uid: &str, request: &RequestDescriptor) -> Vec<ErrorRecord> {
        let date = Local::now().format("%Y-%m-%dT%H:%M:%S").to_string();
        for line in self.log_lines(uid, &date, request) {
            tracing::info!(target: ACCESS_LOG_TARGET, "{}", line);
        }
        self.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::RequestKind;

    #[test]
    fn test_append_preserves_order() {
        let mut stack = ErrorStack::new();
        stack.add(ErrorKind::Code, "a", 1, "first");
        stack.add(ErrorKind::Plugin, "b", 2, "second");

        assert_eq!(stack.len(), 2);
        assert_eq!(stack.first().unwrap().message, "first");
        assert_eq!(stack.records()[1].kind, ErrorKind::Plugin);
    }

    #[test]
    fn test_system_error_appends_os_description() {
        let record = ErrorRecord::new(ErrorKind::System, "open", 2, "cannot open");
        assert!(record.message.starts_with("cannot open; "));
        assert!(record.message.len() > "cannot open; ".len());

        let bare = ErrorRecord::new(ErrorKind::System, "open", 2, "");
        assert!(!bare.message.is_empty());
        assert!(!bare.message.starts_with(';'));
    }

    #[test]
    fn test_record_returns_error() {
        let mut stack = ErrorStack::new();
        let err = stack.record("parse_subset", UdaError::Syntax("bad stride".into()));
        assert!(matches!(err, UdaError::Syntax(_)));
        let first = stack.first().unwrap();
        assert_eq!(first.location, "parse_subset");
        assert_eq!(first.code, 999);
        assert!(first.message.contains("bad stride"));
    }

    #[test]
    fn test_drain_clears() {
        let mut stack = ErrorStack::new();
        stack.add(ErrorKind::Code, "x", 1, "m");
        let drained = stack.drain();
        assert_eq!(drained.len(), 1);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_extend() {
        let mut a = ErrorStack::new();
        a.add(ErrorKind::Code, "a", 1, "a");
        let mut b = ErrorStack::new();
        b.add(ErrorKind::Code, "b", 2, "b");
        a.extend(b);
        assert_eq!(a.len(), 2);
        assert_eq!(a.records()[1].location, "b");
    }

    #[test]
    fn test_log_lines_format() {
        let mut stack = ErrorStack::new();
        stack.add(ErrorKind::Code, "parse", 999, "Syntax error");

        let mut request = RequestDescriptor::default();
        request.request = RequestKind::Generic;
        request.signal = "ip".to_string();
        request.exp_number = 12345;

        let lines = stack.log_lines("jdoe", "2024-01-01T00:00:00", &request);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("0 jdoe [2024-01-01T00:00:00] [1 ip 12345 -1"));
        assert_eq!(
            lines[1],
            "1 jdoe [2024-01-01T00:00:00] 2 999 [parse] [Syntax error]"
        );
    }

    #[test]
    fn test_log_request_drains() {
        let mut stack = ErrorStack::new();
        stack.add(ErrorKind::Code, "parse", 999, "oops");
        let records = stack.log_request("jdoe", &RequestDescriptor::default());
        assert_eq!(records.len(), 1);
        assert!(stack.is_empty());
    }
}
