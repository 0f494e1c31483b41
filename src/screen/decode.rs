//! Screen decoding.
//!
//! Turns the emulator's `readbuffer ascii` output — `data:` lines of
//! whitespace-separated tokens plus a trailing status line — into a
//! [`Screen`]. The decoder is a pure function over its input: it keeps no
//! state between calls, which lets captured dumps be replayed in tests and
//! fuzzing without a live emulator.
//!
//! # Token forms
//!
//! - `SF(c0=60,41=f4,42=f2)` — Start-Field order with attribute key/value
//!   pairs (`c0` field code, `41` extended highlight, `42` color), values in
//!   two-digit hex. Missing or unparseable values reset the attribute to 0;
//!   attributes are never inherited from the previous field.
//! - `SA(...)` — Set-Attribute order, discarded before field assembly.
//! - `41` — a character cell, two hex digits, already EBCDIC-translated by
//!   the emulator; stored as the raw byte value.
//! - Anything else is dropped. A dropped token shortens its row, which can
//!   misalign hand-edited dumps; the decoder logs each drop at debug level.

// Rust guideline compliant 2026-01

use crate::errors::DriverError;
use crate::screen::status::{model_dimensions, StatusLine};
use crate::screen::{Field, Screen};

/// A cell-producing token from a `data:` line.
#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    /// Start-Field order: closes the open field and opens a new one.
    StartField {
        /// Field code byte (`c0`), 0 when absent or unparseable.
        field_code: u8,
        /// Extended highlight byte (`41`).
        highlight: u8,
        /// Color byte (`42`).
        color: u8,
    },
    /// One character cell.
    Char(char),
}

/// Parse one whitespace-delimited token. `None` for Set-Attribute orders
/// (discarded by design) and for garbage (dropped).
fn parse_token(raw: &str) -> Option<Token> {
    if let Some(inner) = raw.strip_prefix("SF(").and_then(|s| s.strip_suffix(')')) {
        let mut field_code = 0u8;
        let mut highlight = 0u8;
        let mut color = 0u8;
        for pair in inner.split(',') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            // Unparseable values reset to 0; attribute bytes are never
            // inherited from the previous field.
            let byte = u8::from_str_radix(value.trim(), 16).unwrap_or(0);
            match key.trim() {
                "c0" => field_code = byte,
                "41" => highlight = byte,
                "42" => color = byte,
                _ => {}
            }
        }
        return Some(Token::StartField {
            field_code,
            highlight,
            color,
        });
    }
    if raw.starts_with("SA(") && raw.ends_with(')') {
        return None;
    }
    if raw.len() == 2 {
        if let Ok(byte) = u8::from_str_radix(raw, 16) {
            return Some(Token::Char(char::from(byte)));
        }
    }
    log::debug!("[decode] dropping unrecognized token {raw:?}");
    None
}

/// Tokenize one `data:` payload.
fn tokenize(line: &str) -> Vec<Token> {
    line.split_whitespace().filter_map(parse_token).collect()
}

/// The field currently being assembled.
#[derive(Clone, Copy, Debug)]
struct OpenField {
    start_x: usize,
    start_y: usize,
    field_code: u8,
    color: u8,
    highlight: u8,
}

impl OpenField {
    fn close(self, end_x: usize, end_y: usize, fields: &mut Vec<Field>) {
        // Zero-cell regions (adjacent Start-Field orders, or a Start-Field
        // opening the very first cell) produce nothing.
        if (self.start_y, self.start_x) > (end_y, end_x) {
            return;
        }
        fields.push(Field::new(
            self.start_x,
            self.start_y,
            end_x,
            end_y,
            self.field_code,
            self.color,
            self.highlight,
        ));
    }
}

/// Decode raw response lines (data lines in any position, status line last
/// by convention, `ok` terminators tolerated) into a [`Screen`].
pub fn decode_response(lines: &[String]) -> Result<Screen, DriverError> {
    let mut data: Vec<&str> = Vec::new();
    let mut status: Option<&str> = None;
    for line in lines {
        let trimmed = line.trim();
        if let Some(payload) = trimmed.strip_prefix("data:") {
            data.push(payload);
        } else if trimmed == "ok" || trimmed.is_empty() {
            continue;
        } else if StatusLine::parse(trimmed).is_some() {
            status = Some(trimmed);
        } else {
            log::debug!("[decode] ignoring unrecognized response line {trimmed:?}");
        }
    }
    decode(&data, status)
}

/// Decode a captured dump file (the mock driver's input format).
pub fn decode_dump(contents: &str) -> Result<Screen, DriverError> {
    let lines: Vec<String> = contents.lines().map(str::to_string).collect();
    decode_response(&lines)
}

/// Decode tokenized buffer lines plus an optional status line.
///
/// Stateless: the same input always produces the same [`Screen`].
pub fn decode(data_lines: &[&str], status: Option<&str>) -> Result<Screen, DriverError> {
    let parsed_status = status.and_then(StatusLine::parse);
    let formatted = parsed_status.as_ref().map_or(true, |s| s.formatted);
    let model_dims = parsed_status
        .as_ref()
        .and_then(|s| model_dimensions(&s.model));

    // Resolved dimensions: what the status reports, clamped downward to the
    // model's limits when the model is recognized. These drive single-line
    // expansion and the final clamp; an unknown model keeps the reported
    // dimensions and disables the final clamp.
    let resolved = parsed_status.as_ref().map(|s| {
        let (rows, cols) = (s.rows, s.cols);
        match model_dims {
            Some((model_rows, model_cols)) => (rows.min(model_rows), cols.min(model_cols)),
            None => (rows, cols),
        }
    });

    let mut token_rows: Vec<Vec<Token>> = data_lines.iter().map(|l| tokenize(l)).collect();
    token_rows = expand_single_line(token_rows, resolved);

    if !formatted {
        return decode_unformatted(&token_rows, parsed_status.as_ref(), status);
    }

    let mut buffer: Vec<Vec<char>> = Vec::with_capacity(token_rows.len());
    let mut fields: Vec<Field> = Vec::new();
    let mut open = OpenField {
        start_x: 0,
        start_y: 0,
        field_code: 0,
        color: 0,
        highlight: 0,
    };

    for (y, tokens) in token_rows.iter().enumerate() {
        let mut row: Vec<char> = Vec::with_capacity(tokens.len());
        for token in tokens {
            match *token {
                Token::Char(ch) => row.push(ch),
                Token::StartField {
                    field_code,
                    highlight,
                    color,
                } => {
                    let col = row.len();
                    // The attribute cell displays as a blank.
                    row.push(' ');

                    if col > 0 {
                        open.close(col - 1, y, &mut fields);
                    } else if y > 0 {
                        // Start-Field at column 0: the open field ended on
                        // the previous row.
                        let prev_width = buffer[y - 1].len();
                        open.close(prev_width.saturating_sub(1), y - 1, &mut fields);
                    }
                    // A Start-Field opening the screen's first cell closes
                    // nothing.

                    open = OpenField {
                        start_x: col + 1,
                        start_y: y,
                        field_code,
                        color,
                        highlight,
                    };
                }
            }
        }
        // A field opened by the row's last token begins on the next row.
        if open.start_y == y && open.start_x == row.len() {
            open.start_x = 0;
            open.start_y = y + 1;
        }
        buffer.push(row);
    }

    // Content dimensions, clamped downward when the model is known.
    let mut width = buffer.iter().map(Vec::len).max().unwrap_or(0);
    let mut height = buffer.len();
    if let (Some(_), Some((rows, cols))) = (model_dims, resolved) {
        width = width.min(cols);
        height = height.min(rows);
    }
    buffer.truncate(height);
    for row in &mut buffer {
        row.truncate(width);
    }

    // The last field runs to the bottom-right corner.
    if width > 0 && height > 0 {
        open.close(width - 1, height - 1, &mut fields);
    }
    clamp_fields(&mut fields, width, height);

    let (cursor_row, cursor_col) = parsed_status
        .as_ref()
        .map_or((0, 0), |s| (s.cursor_row, s.cursor_col));

    let mut screen = Screen {
        buffer,
        width,
        height,
        fields,
        cursor_x: cursor_col,
        cursor_y: cursor_row,
        formatted: true,
        status: status.unwrap_or("").to_string(),
    };
    if let Some(index) = screen.input_field_index_at(screen.cursor_x, screen.cursor_y) {
        screen.fields[index].focused = true;
    }
    Ok(screen)
}

/// Some emulator configurations dump the whole screen as a single `data:`
/// line, sometimes with the full page repeated. When the token count lines
/// up with the reported geometry, split it into rows; when it holds N
/// identical page blocks, keep one.
fn expand_single_line(
    token_rows: Vec<Vec<Token>>,
    reported: Option<(usize, usize)>,
) -> Vec<Vec<Token>> {
    let Some((rows, cols)) = reported else {
        return token_rows;
    };
    if token_rows.len() != 1 || rows == 0 || cols == 0 {
        return token_rows;
    }
    let total = token_rows[0].len();
    if total < cols || total % cols != 0 {
        return token_rows;
    }

    let split: Vec<Vec<Token>> = token_rows[0].chunks(cols).map(<[Token]>::to_vec).collect();
    let total_rows = split.len();
    if total_rows == rows {
        return split;
    }
    if total_rows % rows == 0 {
        let blocks: Vec<&[Vec<Token>]> = split.chunks(rows).collect();
        if blocks.iter().all(|b| *b == blocks[0]) {
            return blocks[0].to_vec();
        }
    }
    token_rows
}

/// Unformatted screens carry no field information; any Start-Field order in
/// the dump contradicts the status line and is surfaced as a decode error.
fn decode_unformatted(
    token_rows: &[Vec<Token>],
    parsed_status: Option<&StatusLine>,
    status: Option<&str>,
) -> Result<Screen, DriverError> {
    let mut buffer: Vec<Vec<char>> = Vec::with_capacity(token_rows.len());
    for tokens in token_rows {
        let mut row = Vec::with_capacity(tokens.len());
        for token in tokens {
            match token {
                Token::Char(ch) => row.push(*ch),
                Token::StartField { .. } => {
                    return Err(DriverError::Decode(
                        "field information in an unformatted screen".to_string(),
                    ));
                }
            }
        }
        buffer.push(row);
    }

    let width = buffer.iter().map(Vec::len).max().unwrap_or(0);
    let height = buffer.len();
    let (cursor_row, cursor_col) = parsed_status.map_or((0, 0), |s| (s.cursor_row, s.cursor_col));
    Ok(Screen {
        buffer,
        width,
        height,
        fields: Vec::new(),
        cursor_x: cursor_col,
        cursor_y: cursor_row,
        formatted: false,
        status: status.unwrap_or("").to_string(),
    })
}

/// Pull field regions back inside the clamped dimensions and drop any field
/// the clamp pushed off the screen entirely.
fn clamp_fields(fields: &mut Vec<Field>, width: usize, height: usize) {
    if width == 0 || height == 0 {
        fields.clear();
        return;
    }
    fields.retain_mut(|f| {
        // A start pushed past the clamped width belongs to the next row,
        // same as the decoder's own wrap rule.
        if f.start_x >= width {
            f.start_x = 0;
            f.start_y += 1;
        }
        if f.start_y >= height {
            return false;
        }
        if f.end_y >= height {
            f.end_y = height - 1;
            f.end_x = width - 1;
        }
        if f.end_x >= width {
            f.end_x = width - 1;
        }
        (f.start_y, f.start_x) <= (f.end_y, f.end_x)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL4_STATUS: &str = "U F U C(127.0.0.1) I 4 24 80 0 0 0x0 0.000";
    const MODEL2_STATUS: &str = "U F P C(localhost) I 2 24 80 0 0 0x0 0.000";

    #[test]
    fn test_protected_field_and_attribute_reset() {
        let screen = decode(&["SF(c0=60) 41 42 SF(c0=GG) 43 44"], Some(MODEL4_STATUS))
            .expect("decode");

        assert_eq!(screen.fields().len(), 2);

        let first = &screen.fields()[0];
        assert_eq!(first.field_code, 0x60);
        assert!(first.is_protected());
        assert_eq!(first.value(&screen), " AB");

        // GG is not hex: the field code resets to 0 instead of inheriting
        // the protected bit.
        let second = &screen.fields()[1];
        assert_eq!(second.field_code, 0x00);
        assert!(!second.is_protected());
        assert_eq!(second.value(&screen), " CD");
    }

    #[test]
    fn test_model_2_width_clamp() {
        let line = ["42"; 100].join(" ");
        let screen = decode(&[line.as_str()], Some(MODEL2_STATUS)).expect("decode");

        assert_eq!(screen.width(), 80);
        assert_eq!(screen.height(), 1);
        let row: String = (0..80).map(|x| screen.char_at(x, 0)).collect();
        assert_eq!(row, "B".repeat(80));
    }

    #[test]
    fn test_single_line_expansion() {
        let status = "U F P C(localhost) I 2 3 4 0 0 0x0 0.000";
        let screen = decode(
            &["00 01 02 03 04 05 06 07 08 09 0A 0B"],
            Some(status),
        )
        .expect("decode");

        assert_eq!(screen.height(), 3);
        assert_eq!(screen.width(), 4);
        for (i, (x, y)) in (0..3).flat_map(|y| (0..4).map(move |x| (x, y))).enumerate() {
            assert_eq!(screen.char_at(x, y), char::from(i as u8));
        }
    }

    #[test]
    fn test_repeated_page_blocks_collapse() {
        let status = "U F P C(h) I 2 2 3 0 0 0x0 0.000";
        // Two identical 2x3 pages on one line.
        let screen = decode(&["41 42 43 44 45 46 41 42 43 44 45 46"], Some(status))
            .expect("decode");
        assert_eq!(screen.height(), 2);
        assert_eq!(screen.width(), 3);
        assert_eq!(screen.text(), "ABC\nDEF");
    }

    #[test]
    fn test_differing_page_blocks_fall_through() {
        let status = "U F P C(h) I 2 2 3 0 0 0x0 0.000";
        // 12 tokens = 4 rows = 2 blocks, but the blocks differ: the line is
        // left intact and decodes as one (clamped) row.
        let screen = decode(&["41 42 43 44 45 46 47 48 49 4A 4B 4C"], Some(status))
            .expect("decode");
        assert_eq!(screen.height(), 1);
        assert_eq!(screen.width(), 3);
    }

    #[test]
    fn test_invalid_hex_token_drops_one_column() {
        let screen = decode(&["41 ZZ 42"], None).expect("decode");
        assert_eq!(screen.width(), 2);
        assert_eq!(screen.text(), "AB");
    }

    #[test]
    fn test_set_attribute_tokens_are_discarded() {
        let screen = decode(&["41 SA(41=f4) 42"], None).expect("decode");
        assert_eq!(screen.text(), "AB");
        // SA never opens a field; only the terminal whole-screen field
        // exists.
        assert_eq!(screen.fields().len(), 1);
    }

    #[test]
    fn test_sf_attribute_parsing() {
        let screen = decode(&["SF(c0=60,41=f4,42=f2) 41"], Some(MODEL4_STATUS)).expect("decode");
        let field = &screen.fields()[0];
        assert_eq!(field.field_code, 0x60);
        assert_eq!(field.extended_highlight, 0xF4);
        assert_eq!(field.color, 0xF2);

        // Absent keys reset to default rather than inheriting.
        let screen = decode(&["SF(c0=60,42=f2) 41 SF(c0=40) 42"], Some(MODEL4_STATUS))
            .expect("decode");
        let second = &screen.fields()[1];
        assert_eq!(second.color, 0);
        assert_eq!(second.extended_highlight, 0);
    }

    #[test]
    fn test_sf_at_column_zero_rolls_back_to_previous_row() {
        let screen = decode(&["41 42", "SF(c0=60) 43"], None).expect("decode");
        // The screen-opening field (before any SF) covers all of row 0.
        let first = &screen.fields()[0];
        assert_eq!((first.start_x, first.start_y), (0, 0));
        assert_eq!((first.end_x, first.end_y), (1, 0));

        let second = &screen.fields()[1];
        assert_eq!((second.start_x, second.start_y), (1, 1));
        assert!(second.is_protected());
    }

    #[test]
    fn test_field_opened_by_last_token_wraps_to_next_row() {
        let screen = decode(&["41 SF(c0=00)", "42 43"], None).expect("decode");
        // Field 0 is the leading region, field 1 starts at (0, 1).
        let wrapped = &screen.fields()[1];
        assert_eq!((wrapped.start_x, wrapped.start_y), (0, 1));
        assert_eq!((wrapped.end_x, wrapped.end_y), (1, 1));
    }

    #[test]
    fn test_unformatted_screen_has_no_fields() {
        let status = "U U U C(h) I 2 24 80 0 0 0x0 0.000";
        let screen = decode(&["48 49"], Some(status)).expect("decode");
        assert!(!screen.is_formatted());
        assert!(screen.fields().is_empty());
        assert_eq!(screen.text(), "HI");
    }

    #[test]
    fn test_unformatted_screen_with_sf_is_a_decode_error() {
        let status = "U U U C(h) I 2 24 80 0 0 0x0 0.000";
        let err = decode(&["SF(c0=60) 41"], Some(status)).expect_err("decode error");
        assert!(matches!(err, DriverError::Decode(_)));
    }

    #[test]
    fn test_missing_status_assumes_formatted() {
        let screen = decode(&["41 42"], None).expect("decode");
        assert!(screen.is_formatted());
        assert_eq!(screen.width(), 2);
        assert_eq!(screen.height(), 1);
    }

    #[test]
    fn test_unknown_model_preserves_reported_dimensions() {
        let status = "U F P C(h) I 9 2 3 0 0 0x0 0.000";
        let screen = decode(&["41 42 43 44 45 46"], Some(status)).expect("decode");
        // Unknown model: the 2x3 report still drives expansion, and no
        // model clamp applies.
        assert_eq!(screen.height(), 2);
        assert_eq!(screen.width(), 3);
    }

    #[test]
    fn test_cursor_focus_marks_first_unprotected_field() {
        let status = "U F U C(h) I 4 24 80 0 5 0x0 0.000";
        let screen = decode(&["SF(c0=60) 41 42 SF(c0=00) 43 44"], Some(status)).expect("decode");
        assert!(!screen.fields()[0].focused);
        assert!(screen.fields()[1].focused);
    }

    #[test]
    fn test_decode_is_idempotent() {
        let data = ["SF(c0=60) 41 42 SF(c0=08,42=f1) 43 44 45"];
        let a = decode(&data, Some(MODEL4_STATUS)).expect("decode");
        let b = decode(&data, Some(MODEL4_STATUS)).expect("decode");
        assert_eq!(a, b);
        assert_eq!(a.text(), b.text());
        assert_eq!(a.fields(), b.fields());
    }

    #[test]
    fn test_decode_response_splits_data_and_status() {
        let lines = vec![
            "data: 41 42".to_string(),
            MODEL2_STATUS.to_string(),
            "ok".to_string(),
        ];
        let screen = decode_response(&lines).expect("decode");
        assert_eq!(screen.text(), "AB");
        assert_eq!(screen.status_raw(), MODEL2_STATUS);
        assert_eq!(screen.status_dimensions(), Some((24, 80)));
    }
}
