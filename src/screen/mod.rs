//! 3270 screen model.
//!
//! A [`Screen`] is the decoded form of one emulator buffer dump: a
//! rectangular character grid, an ordered list of [`Field`]s with their
//! 3270 attributes, the cursor position, and the raw status line. Screens
//! are immutable in shape — each buffer read produces a fresh value — while
//! field values and `changed` flags mutate between reads as form input is
//! applied.
//!
//! # Field geometry
//!
//! Fields are oriented regions in the screen's 1-D scan order: left to
//! right, wrapping to column 0 of the next row. A field may span multiple
//! rows. `start` names the first typable cell (the cell after the
//! field-attribute byte); the attribute cell itself renders as a blank and
//! is included in the extracted value, which is how 3270 operators see it.
//!
//! # Change-detection hash
//!
//! [`Screen::hash`] fingerprints the visible text, cursor, and field count
//! into a short stable string. The chaos engine compares consecutive hashes
//! to decide whether an AID key actually moved the application anywhere.

// Rust guideline compliant 2026-01

pub mod decode;
pub mod status;

use std::sync::OnceLock;

use sha2::{Digest, Sha256};

use self::status::StatusLine;

/// Field-code bit: field is protected (no user input).
pub const FIELD_PROTECTED: u8 = 0x20;
/// Field-code bit: field accepts numeric input only.
pub const FIELD_NUMERIC: u8 = 0x10;
/// Field-code mask for the two display-mode bits.
pub const FIELD_DISPLAY_MASK: u8 = 0x0C;

/// How a field's content is rendered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    /// Normal intensity.
    Normal,
    /// Highlighted / bright.
    Intensified,
    /// Non-display (passwords).
    Hidden,
}

/// One 3270 field: an oriented region of the screen with its attributes.
#[derive(Clone, Debug)]
pub struct Field {
    /// First typable column.
    pub start_x: usize,
    /// First typable row.
    pub start_y: usize,
    /// Last column, inclusive.
    pub end_x: usize,
    /// Last row, inclusive.
    pub end_y: usize,
    /// Raw 3270 field attribute byte (protected/numeric/display bits).
    pub field_code: u8,
    /// Color attribute byte (0x00 default, 0xF1–0xF7).
    pub color: u8,
    /// Extended highlight byte (0x00 default, 0x80 blink, 0xF2 reverse,
    /// 0xF4 underscore).
    pub extended_highlight: u8,
    /// The cursor sits inside this field.
    pub focused: bool,
    /// The value differs from what the host last sent.
    pub changed: bool,
    value: OnceLock<String>,
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        // The lazy value cache is derived state, not part of field identity.
        self.start_x == other.start_x
            && self.start_y == other.start_y
            && self.end_x == other.end_x
            && self.end_y == other.end_y
            && self.field_code == other.field_code
            && self.color == other.color
            && self.extended_highlight == other.extended_highlight
            && self.focused == other.focused
            && self.changed == other.changed
    }
}

impl Field {
    /// A field with the given geometry and attribute bytes.
    #[must_use]
    pub fn new(
        start_x: usize,
        start_y: usize,
        end_x: usize,
        end_y: usize,
        field_code: u8,
        color: u8,
        extended_highlight: u8,
    ) -> Self {
        Self {
            start_x,
            start_y,
            end_x,
            end_y,
            field_code,
            color,
            extended_highlight,
            focused: false,
            changed: false,
            value: OnceLock::new(),
        }
    }

    /// True when the user cannot type into this field.
    #[must_use]
    pub fn is_protected(&self) -> bool {
        self.field_code & FIELD_PROTECTED != 0
    }

    /// True when the field accepts digits only.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        self.field_code & FIELD_NUMERIC != 0
    }

    /// Rendering mode from the display bits.
    #[must_use]
    pub fn display_mode(&self) -> DisplayMode {
        match self.field_code & FIELD_DISPLAY_MASK {
            0x08 => DisplayMode::Intensified,
            0x0C => DisplayMode::Hidden,
            _ => DisplayMode::Normal,
        }
    }

    /// True for non-display (password) fields.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.display_mode() == DisplayMode::Hidden
    }

    /// True for intensified fields.
    #[must_use]
    pub fn is_intensified(&self) -> bool {
        self.display_mode() == DisplayMode::Intensified
    }

    /// Number of rows the field spans.
    #[must_use]
    pub fn height(&self) -> usize {
        self.end_y.saturating_sub(self.start_y) + 1
    }

    /// True when the field wraps across rows.
    #[must_use]
    pub fn is_multiline(&self) -> bool {
        self.end_y > self.start_y
    }

    /// Typable cell count: the single-row width, or the wrap-aware span
    /// for multi-row fields.
    #[must_use]
    pub fn capacity(&self, screen_width: usize) -> usize {
        if self.end_y == self.start_y {
            self.end_x.saturating_sub(self.start_x) + 1
        } else {
            let first = screen_width.saturating_sub(self.start_x);
            let middle = (self.end_y - self.start_y).saturating_sub(1) * screen_width;
            first + middle + self.end_x + 1
        }
    }

    /// The region the value is extracted from: the field plus the blank
    /// attribute cell immediately before `start` in scan order.
    fn value_region(&self, screen: &Screen) -> (usize, usize, usize, usize) {
        if self.start_x > 0 {
            (self.start_x - 1, self.start_y, self.end_x, self.end_y)
        } else if self.start_y > 0 {
            (
                screen.width().saturating_sub(1),
                self.start_y - 1,
                self.end_x,
                self.end_y,
            )
        } else {
            (self.start_x, self.start_y, self.end_x, self.end_y)
        }
    }

    /// The field's text, extracted lazily from the screen and cached.
    #[must_use]
    pub fn value(&self, screen: &Screen) -> &str {
        self.value.get_or_init(|| {
            let (sx, sy, ex, ey) = self.value_region(screen);
            screen.substring(sx, sy, ex, ey)
        })
    }

    /// The value split into lines at row-wrap boundaries.
    #[must_use]
    pub fn value_lines(&self, screen: &Screen) -> Vec<String> {
        self.value(screen).split('\n').map(str::to_string).collect()
    }

    /// Replace the cached value directly. `changed` is managed by
    /// [`Screen::set_field_value`], which knows the previous value.
    pub(crate) fn store_value(&mut self, value: String) {
        self.value = OnceLock::from(value);
    }

    /// Scan-order position of the first typable cell.
    fn start_pos(&self, width: usize) -> usize {
        self.start_y * width + self.start_x
    }

    /// Scan-order position of the last cell.
    fn end_pos(&self, width: usize) -> usize {
        self.end_y * width + self.end_x
    }
}

/// A decoded 3270 screen.
#[derive(Clone, Debug, PartialEq)]
pub struct Screen {
    pub(crate) buffer: Vec<Vec<char>>,
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) fields: Vec<Field>,
    pub(crate) cursor_x: usize,
    pub(crate) cursor_y: usize,
    pub(crate) formatted: bool,
    pub(crate) status: String,
}

impl Screen {
    /// An empty formatted screen of the given size, all cells NUL.
    #[must_use]
    pub fn blank(rows: usize, cols: usize) -> Self {
        Self {
            buffer: vec![vec!['\0'; cols]; rows],
            width: cols,
            height: rows,
            fields: Vec::new(),
            cursor_x: 0,
            cursor_y: 0,
            formatted: true,
            status: String::new(),
        }
    }

    /// Screen width in columns.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Screen height in rows.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Cursor position as 0-based (column, row).
    #[must_use]
    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_x, self.cursor_y)
    }

    /// True when the host sent field definitions for this screen.
    #[must_use]
    pub fn is_formatted(&self) -> bool {
        self.formatted
    }

    /// The raw status line this screen was decoded with.
    #[must_use]
    pub fn status_raw(&self) -> &str {
        &self.status
    }

    /// Fields in data-stream order.
    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Character at (x, y); NUL outside the buffer.
    #[must_use]
    pub fn char_at(&self, x: usize, y: usize) -> char {
        if x >= self.width {
            return '\0';
        }
        self.buffer
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or('\0')
    }

    /// Overwrite one cell, padding the row with NULs when it is shorter
    /// than the target column. Out-of-bounds writes are dropped.
    pub(crate) fn set_char(&mut self, x: usize, y: usize, ch: char) {
        if x >= self.width || y >= self.height {
            return;
        }
        let row = &mut self.buffer[y];
        if row.len() <= x {
            row.resize(x + 1, '\0');
        }
        row[x] = ch;
    }

    /// Extract the region from (sx, sy) to (ex, ey) inclusive, traversing
    /// the 1-D scan order and inserting '\n' at every row boundary that
    /// remains inside the region.
    #[must_use]
    pub fn substring(&self, sx: usize, sy: usize, ex: usize, ey: usize) -> String {
        if (sy, sx) > (ey, ex) {
            return String::new();
        }
        let mut out = String::new();
        for y in sy..=ey {
            if y > sy {
                out.push('\n');
            }
            let from = if y == sy { sx } else { 0 };
            let to = if y == ey {
                ex
            } else {
                self.width.saturating_sub(1)
            };
            for x in from..=to {
                out.push(self.char_at(x, y));
            }
        }
        out
    }

    /// The whole grid joined row-by-row with '\n'.
    #[must_use]
    pub fn text(&self) -> String {
        let mut out = String::with_capacity(self.height * (self.width + 1));
        for (y, row) in self.buffer.iter().enumerate() {
            if y > 0 {
                out.push('\n');
            }
            out.extend(row.iter());
        }
        out
    }

    /// Index of the first unprotected field whose region contains (x, y).
    pub(crate) fn input_field_index_at(&self, x: usize, y: usize) -> Option<usize> {
        if x >= self.width {
            return None;
        }
        let pos = y * self.width + x;
        self.fields.iter().position(|f| {
            !f.is_protected() && f.start_pos(self.width) <= pos && pos <= f.end_pos(self.width)
        })
    }

    /// First unprotected field whose region contains (x, y).
    #[must_use]
    pub fn input_field_at(&self, x: usize, y: usize) -> Option<&Field> {
        self.input_field_index_at(x, y).map(|i| &self.fields[i])
    }

    /// Update the field at `index` with user input.
    ///
    /// Marks the field `changed` only when the new value actually differs
    /// from the current one, so untouched form fields are not re-typed on
    /// submit. Returns whether the field changed.
    pub fn set_field_value(&mut self, index: usize, value: &str) -> bool {
        let Some(current) = self.fields.get(index).map(|f| f.value(self).to_string()) else {
            return false;
        };
        let differs = current != value;
        let field = &mut self.fields[index];
        field.store_value(value.to_string());
        if differs {
            field.changed = true;
        }
        differs
    }

    /// Keyboard lock state from the stored status line, when parseable.
    #[must_use]
    pub fn status_keyboard_locked(&self) -> Option<bool> {
        StatusLine::parse(&self.status).map(|s| s.keyboard.is_locked())
    }

    /// Terminal model token from the stored status line, when parseable.
    #[must_use]
    pub fn status_model(&self) -> Option<String> {
        StatusLine::parse(&self.status).map(|s| s.model)
    }

    /// Reported (rows, cols) from the stored status line, when parseable.
    #[must_use]
    pub fn status_dimensions(&self) -> Option<(usize, usize)> {
        StatusLine::parse(&self.status).map(|s| (s.rows, s.cols))
    }

    /// Reported cursor (row, col) from the stored status line.
    #[must_use]
    pub fn status_cursor(&self) -> Option<(usize, usize)> {
        StatusLine::parse(&self.status).map(|s| (s.cursor_row, s.cursor_col))
    }

    /// Short stable fingerprint of this screen.
    ///
    /// SHA-256 over the visible text, cursor position, and field count,
    /// truncated to 16 hex characters. Two screens with the same fingerprint
    /// are treated as the same application state.
    #[must_use]
    pub fn hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.text().as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{},{}", self.cursor_x, self.cursor_y).as_bytes());
        hasher.update(b"|");
        hasher.update(self.fields.len().to_string().as_bytes());
        let digest = hasher.finalize();
        let mut out = String::with_capacity(16);
        for byte in digest.iter().take(8) {
            out.push_str(&format!("{byte:02x}"));
        }
        out
    }
}
