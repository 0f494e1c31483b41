//! Key-name normalization.
//!
//! Browsers, workflow files, and the chaos engine all refer to 3270 keys in
//! slightly different spellings (`pf7`, `PF(7)`, `F7`, …). These pure
//! functions translate anything reasonable into the canonical emulator key
//! name, the bare spec used by the `Key(…)` fallback command, and the
//! workflow step type.

// Rust guideline compliant 2026-01

use crate::workflow::StepType;

/// Simple key names and the variants they normalize from.
///
/// Order matters only for readability; lookup is by lowercased input.
const SIMPLE_KEYS: &[(&str, &str)] = &[
    ("enter", "Enter"),
    ("tab", "Tab"),
    ("backtab", "BackTab"),
    ("back_tab", "BackTab"),
    ("clear", "Clear"),
    ("reset", "Reset"),
    ("eraseeof", "EraseEOF"),
    ("erase_eof", "EraseEOF"),
    ("eraseinput", "EraseInput"),
    ("erase_input", "EraseInput"),
    ("dup", "Dup"),
    ("fieldmark", "FieldMark"),
    ("field_mark", "FieldMark"),
    ("sysreq", "SysReq"),
    ("sys_req", "SysReq"),
    ("attn", "Attn"),
    ("newline", "Newline"),
    ("new_line", "Newline"),
    ("backspace", "BackSpace"),
    ("back_space", "BackSpace"),
    ("delete", "Delete"),
    ("insert", "Insert"),
    ("home", "Home"),
    ("up", "Up"),
    ("down", "Down"),
    ("left", "Left"),
    ("right", "Right"),
];

/// Parse a PF-key number out of `PFn`, `PF(n)`, or `Fn` (1–24).
fn pf_number(lower: &str) -> Option<u8> {
    let digits = if let Some(rest) = lower.strip_prefix("pf") {
        rest.strip_prefix('(')
            .and_then(|r| r.strip_suffix(')'))
            .unwrap_or(rest)
    } else if let Some(rest) = lower.strip_prefix('f') {
        rest
    } else {
        return None;
    };
    let n: u8 = digits.parse().ok()?;
    (1..=24).contains(&n).then_some(n)
}

/// Parse a PA-key number out of `PAn` or `PA(n)` (1–3).
fn pa_number(lower: &str) -> Option<u8> {
    let rest = lower.strip_prefix("pa")?;
    let digits = rest
        .strip_prefix('(')
        .and_then(|r| r.strip_suffix(')'))
        .unwrap_or(rest);
    let n: u8 = digits.parse().ok()?;
    (1..=3).contains(&n).then_some(n)
}

/// Normalize a user-visible key name to the canonical emulator key name.
///
/// Empty input means Enter (a bare form submit). Unrecognized input passes
/// through trimmed, so new emulator actions work without a table change.
#[must_use]
pub fn normalize_key(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return "Enter".to_string();
    }
    let lower = trimmed.to_lowercase();

    for (variant, canonical) in SIMPLE_KEYS {
        if lower == *variant {
            return (*canonical).to_string();
        }
    }
    if let Some(n) = pf_number(&lower) {
        return format!("PF({n})");
    }
    if let Some(n) = pa_number(&lower) {
        return format!("PA({n})");
    }
    trimmed.to_string()
}

/// Normalize to the bare spec form used by the `Key(…)` fallback command.
///
/// Identical to [`normalize_key`] except PF/PA keys come out as `PF7` /
/// `PA2` rather than the parenthesized action form.
#[must_use]
pub fn key_to_key_spec(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return "Enter".to_string();
    }
    let lower = trimmed.to_lowercase();

    for (variant, canonical) in SIMPLE_KEYS {
        if lower == *variant {
            return (*canonical).to_string();
        }
    }
    if let Some(n) = pf_number(&lower) {
        return format!("PF{n}");
    }
    if let Some(n) = pa_number(&lower) {
        return format!("PA{n}");
    }
    trimmed.to_string()
}

/// Map an AID (or Tab) key to its workflow step type, if it has one.
#[must_use]
pub fn aid_key_to_step_type(input: &str) -> Option<StepType> {
    let normalized = normalize_key(input);
    match normalized.as_str() {
        "Enter" => Some(StepType::PressEnter),
        "Clear" => Some(StepType::PressClear),
        "Tab" => Some(StepType::PressTab),
        _ => {
            let lower = normalized.to_lowercase();
            if let Some(n) = pf_number(&lower) {
                return Some(StepType::PressPf(n));
            }
            if let Some(n) = pa_number(&lower) {
                return Some(StepType::PressPa(n));
            }
            None
        }
    }
}

/// True if the key is an attention identifier: a key that submits the
/// screen to the host and elicits a response.
#[must_use]
pub fn is_aid_key(input: &str) -> bool {
    let upper = input.trim().to_uppercase();
    upper == "ENTER"
        || upper.starts_with("PF")
        || upper.starts_with("PA")
        || upper == "CLEAR"
        || upper == "SYSREQ"
        || upper == "ATTN"
}
