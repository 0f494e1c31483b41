//! Status line parsing.
//!
//! Every emulator response ends with a one-line status record of exactly
//! twelve space-separated fields:
//!
//! ```text
//! U F U C(127.0.0.1) I 4 43 80 6 17 0x0 0.013
//! ```
//!
//! keyboard-state, formatting, field-protection, connection, mode, model
//! number, rows, cols, cursor-row, cursor-col, window-id, execution-time.
//! The parser accepts a line as valid iff this shape matches; trailing
//! tokens beyond the canonical twelve are tolerated and ignored.

// Rust guideline compliant 2026-01

/// Keyboard state reported in the first status field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyboardState {
    /// `U` — input accepted.
    Unlocked,
    /// `L` — locked, waiting for the host.
    Locked,
    /// `E` — locked by an operator error.
    Error,
}

impl KeyboardState {
    /// True unless the keyboard accepts input.
    #[must_use]
    pub fn is_locked(self) -> bool {
        !matches!(self, KeyboardState::Unlocked)
    }
}

/// Connection state reported in the fourth status field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Connection {
    /// `C(host)` — connected to the named host.
    Host(String),
    /// `N` — not connected.
    None,
}

/// A parsed emulator status line.
#[derive(Clone, Debug, PartialEq)]
pub struct StatusLine {
    /// Keyboard state.
    pub keyboard: KeyboardState,
    /// `F` when the host sent field definitions, `U` otherwise.
    pub formatted: bool,
    /// `P` when the current field is protected.
    pub field_protected: bool,
    /// Host connection state.
    pub connection: Connection,
    /// Emulator mode character (`I`/`L`/`C`/`N`).
    pub mode: char,
    /// Terminal model token as reported (`4`, `3279-2-E`, …).
    pub model: String,
    /// Reported screen rows.
    pub rows: usize,
    /// Reported screen columns.
    pub cols: usize,
    /// Cursor row, 0-based.
    pub cursor_row: usize,
    /// Cursor column, 0-based.
    pub cursor_col: usize,
    /// Execution time of the last command in seconds, when reported.
    pub execution_time: Option<f64>,
}

impl StatusLine {
    /// Parse a status line, returning `None` when the twelve-field shape
    /// does not match.
    #[must_use]
    pub fn parse(line: &str) -> Option<Self> {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 12 {
            return None;
        }

        let keyboard = match fields[0] {
            "U" => KeyboardState::Unlocked,
            "L" => KeyboardState::Locked,
            "E" => KeyboardState::Error,
            _ => return None,
        };
        let formatted = match fields[1] {
            "F" => true,
            "U" => false,
            _ => return None,
        };
        let field_protected = match fields[2] {
            "P" => true,
            "U" => false,
            _ => return None,
        };
        let connection = if fields[3] == "N" {
            Connection::None
        } else if let Some(host) = fields[3].strip_prefix("C(").and_then(|s| s.strip_suffix(')')) {
            Connection::Host(host.to_string())
        } else {
            return None;
        };
        let mode = match fields[4] {
            "I" | "L" | "C" | "N" => fields[4].chars().next()?,
            _ => return None,
        };
        // Model tokens vary (bare number or long form); resolution to
        // concrete dimensions happens in the decoder, which keeps reported
        // dimensions for models it does not recognize.
        let model = fields[5];
        if model.is_empty() {
            return None;
        }

        let rows = fields[6].parse().ok()?;
        let cols = fields[7].parse().ok()?;
        let cursor_row = fields[8].parse().ok()?;
        let cursor_col = fields[9].parse().ok()?;

        if fields[10] != "0x0" {
            return None;
        }
        let execution_time = if fields[11] == "-" {
            None
        } else {
            Some(fields[11].parse().ok()?)
        };

        Some(Self {
            keyboard,
            formatted,
            field_protected,
            connection,
            mode,
            model: model.to_string(),
            rows,
            cols,
            cursor_row,
            cursor_col,
            execution_time,
        })
    }

    /// True when the connection field says there is no host.
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.connection == Connection::None
    }
}

/// True iff the status line reports an unlocked keyboard.
#[must_use]
pub fn keyboard_unlocked(line: &str) -> bool {
    line.starts_with("U ")
}

/// True iff a response line signals an emulator error: an `E `-prefixed
/// status line or any line that begins (case-insensitively) with `error`.
#[must_use]
pub fn line_is_error(line: &str) -> bool {
    line.starts_with("E ") || line.trim().to_lowercase().starts_with("error")
}

/// Canonical dimensions (rows, cols) for a terminal model token.
///
/// Accepts bare model numbers (`2`–`5`) as well as long forms such as
/// `3279-2` and `3279-2-E`. Unknown models return `None` and the caller
/// keeps whatever dimensions were reported.
#[must_use]
pub fn model_dimensions(model: &str) -> Option<(usize, usize)> {
    let number: u32 = if let Ok(n) = model.parse() {
        n
    } else {
        model
            .split('-')
            .skip(1)
            .find_map(|segment| segment.parse().ok())?
    };
    match number {
        2 => Some((24, 80)),
        3 => Some((32, 80)),
        4 => Some((43, 80)),
        5 => Some((27, 132)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONNECTED: &str = "U F U C(127.0.0.1) I 4 24 80 6 17 0x0 0.013";

    #[test]
    fn test_parse_connected_status() {
        let status = StatusLine::parse(CONNECTED).expect("valid status");
        assert_eq!(status.keyboard, KeyboardState::Unlocked);
        assert!(status.formatted);
        assert!(!status.field_protected);
        assert_eq!(status.connection, Connection::Host("127.0.0.1".into()));
        assert_eq!(status.mode, 'I');
        assert_eq!(status.model, "4");
        assert_eq!((status.rows, status.cols), (24, 80));
        assert_eq!((status.cursor_row, status.cursor_col), (6, 17));
        assert_eq!(status.execution_time, Some(0.013));
    }

    #[test]
    fn test_parse_disconnected_status() {
        let status = StatusLine::parse("L U U N N 2 24 80 0 0 0x0 -").expect("valid status");
        assert!(status.is_disconnected());
        assert_eq!(status.keyboard, KeyboardState::Locked);
        assert!(!status.formatted);
        assert_eq!(status.execution_time, None);
    }

    #[test]
    fn test_parse_tolerates_trailing_tokens() {
        let status = StatusLine::parse("U F U C(host) I 2 24 80 0 0 0x0 0.1 extra junk");
        assert!(status.is_some());
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(StatusLine::parse("").is_none());
        assert!(StatusLine::parse("U F U").is_none());
        assert!(StatusLine::parse("X F U C(h) I 2 24 80 0 0 0x0 0.0").is_none());
        assert!(StatusLine::parse("U F U C(h) I 2 24 eighty 0 0 0x0 0.0").is_none());
        assert!(StatusLine::parse("U F U C(h) I 2 24 80 0 0 0x1 0.0").is_none());
        assert!(StatusLine::parse("U F U C(h) Z 2 24 80 0 0 0x0 0.0").is_none());
        assert!(StatusLine::parse("U F U Connected I 2 24 80 0 0 0x0 0.0").is_none());
    }

    #[test]
    fn test_error_keyboard_state_parses() {
        let status = StatusLine::parse("E F U C(h) I 2 24 80 0 0 0x0 0.0").expect("valid");
        assert!(status.keyboard.is_locked());
    }

    #[test]
    fn test_keyboard_unlocked_predicate() {
        assert!(keyboard_unlocked(CONNECTED));
        assert!(!keyboard_unlocked("L F U C(h) I 2 24 80 0 0 0x0 0.0"));
        assert!(!keyboard_unlocked("E F U C(h) I 2 24 80 0 0 0x0 0.0"));
    }

    #[test]
    fn test_line_is_error_predicate() {
        assert!(line_is_error("E F U C(h) I 2 24 80 0 0 0x0 0.0"));
        assert!(line_is_error("error: nothing to do"));
        assert!(line_is_error("  Error in command"));
        assert!(!line_is_error(CONNECTED));
        assert!(!line_is_error("data: 41 42"));
    }

    #[test]
    fn test_model_dimensions() {
        assert_eq!(model_dimensions("2"), Some((24, 80)));
        assert_eq!(model_dimensions("3"), Some((32, 80)));
        assert_eq!(model_dimensions("4"), Some((43, 80)));
        assert_eq!(model_dimensions("5"), Some((27, 132)));
        assert_eq!(model_dimensions("3279-2"), Some((24, 80)));
        assert_eq!(model_dimensions("3279-2-E"), Some((24, 80)));
        assert_eq!(model_dimensions("3278-5"), Some((27, 132)));
        assert_eq!(model_dimensions("9"), None);
        assert_eq!(model_dimensions("vt100"), None);
    }
}
