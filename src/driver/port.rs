//! Command transport abstraction.
//!
//! The emulator speaks a line protocol: one command in, zero or more
//! response lines out, then a literal `ok` terminator. [`CommandPort`]
//! isolates that dialogue behind a trait so the driver logic in
//! [`emulator`](super::emulator) can run against the real subprocess or a
//! scripted double in tests.

// Rust guideline compliant 2026-01

use crate::errors::DriverError;
use crate::screen::status::line_is_error;

/// The response lines of one command, terminator stripped.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Response {
    /// Response lines in arrival order. By protocol the last line, when
    /// present, is the status line.
    pub lines: Vec<String>,
}

impl Response {
    /// A response with the given lines.
    #[must_use]
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// The status line: the last response line, when any arrived.
    #[must_use]
    pub fn status(&self) -> Option<&str> {
        self.lines.last().map(|s| s.trim_end())
    }

    /// The first `data:` line, when any arrived.
    #[must_use]
    pub fn first_data_line(&self) -> Option<&str> {
        self.lines
            .iter()
            .map(|s| s.trim_end())
            .find(|l| l.trim_start().starts_with("data:"))
    }

    /// True when any line signals an emulator error.
    #[must_use]
    pub fn has_error(&self) -> bool {
        self.lines.iter().any(|l| line_is_error(l))
    }
}

/// A serialized command dialogue with one emulator instance.
///
/// Implementations own the process (or its stand-in) and its lifecycle;
/// callers own the serialization — the driver wraps its port in a mutex and
/// holds it for each full round trip.
pub trait CommandPort: Send {
    /// Spawn (or re-spawn) the emulator and wire its pipes.
    fn start(&mut self) -> Result<(), DriverError>;

    /// Send one command line and collect its response.
    fn execute(&mut self, command: &str) -> Result<Response, DriverError>;

    /// Close pipes and reap the process. Safe to call repeatedly.
    fn close(&mut self);

    /// True while the process is running and stdin is open.
    fn is_alive(&mut self) -> bool;

    /// Recent stderr output for enriching transport errors.
    fn stderr_tail(&self) -> String {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_is_last_line() {
        let resp = Response::new(vec![
            "data: 41 42".to_string(),
            "U F U C(h) I 4 24 80 0 0 0x0 0.000".to_string(),
        ]);
        assert_eq!(resp.status(), Some("U F U C(h) I 4 24 80 0 0 0x0 0.000"));
        assert_eq!(resp.first_data_line(), Some("data: 41 42"));
    }

    #[test]
    fn test_empty_response() {
        let resp = Response::default();
        assert_eq!(resp.status(), None);
        assert_eq!(resp.first_data_line(), None);
        assert!(!resp.has_error());
    }

    #[test]
    fn test_error_detection() {
        let by_status = Response::new(vec!["E F U C(h) I 4 24 80 0 0 0x0 0.000".to_string()]);
        assert!(by_status.has_error());

        let by_line = Response::new(vec![
            "error: nothing to do".to_string(),
            "U F U C(h) I 4 24 80 0 0 0x0 0.000".to_string(),
        ]);
        assert!(by_line.has_error());

        let clean = Response::new(vec!["U F U C(h) I 4 24 80 0 0 0x0 0.000".to_string()]);
        assert!(!clean.has_error());
    }
}
