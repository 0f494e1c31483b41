//! Emulator drivers.
//!
//! A [`TerminalDriver`] owns one 3270 terminal conversation: it can bring
//! the connection up and down, read the current screen, press keys, and
//! type into fields. Two implementations exist:
//!
//! - [`EmulatorDriver`] drives a real line-mode emulator subprocess through
//!   a [`CommandPort`].
//! - [`MockDriver`] replays a captured dump in memory for tests and records
//!   every command it is asked to issue.
//!
//! All operations take `&self`; each implementation serializes command
//! execution internally so a driver can sit behind an `Arc` shared by a
//! session and a chaos engine.

// Rust guideline compliant 2026-01

pub mod emulator;
pub mod mock;
pub mod port;
pub mod subprocess;

pub use emulator::EmulatorDriver;
pub use mock::MockDriver;
pub use port::{CommandPort, Response};
pub use subprocess::SubprocessPort;

use crate::errors::DriverError;
use crate::screen::Screen;

/// The operation set shared by all driver implementations.
pub trait TerminalDriver: Send + Sync {
    /// Bring up the emulator conversation and wait until it is ready.
    fn start(&self) -> Result<(), DriverError>;

    /// Tear the conversation down. Safe to call repeatedly.
    fn stop(&self);

    /// True while the conversation can accept commands.
    fn is_connected(&self) -> bool;

    /// Read the emulator's buffer and decode it into a fresh screen.
    fn update_screen(&self) -> Result<Screen, DriverError>;

    /// The most recently decoded screen.
    fn screen(&self) -> Screen;

    /// Press a key by canonical emulator name.
    fn send_key(&self, key: &str) -> Result<(), DriverError>;

    /// Position the cursor at 0-based (row, col).
    fn move_cursor(&self, row: usize, col: usize) -> Result<(), DriverError>;

    /// Type `text` starting at 0-based (row, col).
    fn write_string_at(&self, row: usize, col: usize, text: &str) -> Result<(), DriverError>;

    /// Type every changed unprotected field back to the host.
    fn submit_screen(&self) -> Result<(), DriverError>;

    /// Overwrite an unformatted screen cell-by-cell where `text` differs
    /// from the current buffer.
    fn submit_unformatted(&self, text: &str) -> Result<(), DriverError>;
}

/// Reject key names that could smuggle extra commands into the emulator's
/// line protocol. Checked before any I/O.
pub(crate) fn validate_key(key: &str) -> Result<(), DriverError> {
    if key
        .chars()
        .any(|c| matches!(c, '\n' | '\r' | '\t' | ';'))
    {
        return Err(DriverError::Security(format!(
            "key {key:?} contains a forbidden character"
        )));
    }
    Ok(())
}

/// Wire command for a single typed character.
pub(crate) fn key_command(ch: char) -> String {
    format!("key(0x{:x})", u32::from(ch))
}

/// Wire command for a cursor move to 0-based (row, col).
pub(crate) fn movecursor_command(row: usize, col: usize) -> String {
    format!("movecursor({row}, {col})")
}
