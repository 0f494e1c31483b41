//! Error types shared by the driver, decoder, and chaos engine.
//!
//! Every failure the core can surface is one of the variants below so that
//! callers (HTTP handlers, the chaos loop, the CLI) can route on kind:
//! transport problems may be retried with a reconnect, protocol errors are
//! shown to the user, security rejections are logged for audit.

// Rust guideline compliant 2026-01

use thiserror::Error;

/// Errors produced by the emulator driver and its collaborators.
#[derive(Debug, Error)]
pub enum DriverError {
    /// The subprocess failed to spawn, a pipe broke, a read timed out, or
    /// the response ended before the `ok` terminator.
    #[error("emulator transport failure: {0}")]
    Transport(String),

    /// The emulator answered with an error status ("E " prefix) or an
    /// `error` response line.
    #[error("emulator reported an error: {0}")]
    Protocol(String),

    /// The status line says the host connection is gone ("N").
    #[error("host connection lost: {0}")]
    Disconnected(String),

    /// `Wait(Unlock, …)` returned and the keyboard is still locked.
    #[error("keyboard did not unlock within {0} seconds")]
    KeyboardLockTimeout(u64),

    /// An operation was given arguments the driver cannot act on, such as
    /// out-of-range coordinates or a malformed workflow step.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A key name carried characters that could smuggle extra commands into
    /// the emulator's line protocol. Rejected before any I/O; kept distinct
    /// from [`DriverError::Validation`] so it can be audited separately.
    #[error("rejected key input: {0}")]
    Security(String),

    /// The buffer dump contained field information although the status line
    /// declared the screen unformatted. The previous screen is kept.
    #[error("screen decode failed: {0}")]
    Decode(String),

    /// The chaos engine was asked to start or resume while already running
    /// or without a connected driver.
    #[error("chaos engine precondition failed: {0}")]
    ChaosPrecondition(String),
}

impl DriverError {
    /// True for errors that indicate the connection or subprocess itself is
    /// gone, where the driver's one-shot reconnect policy applies.
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        match self {
            DriverError::Disconnected(_) => true,
            DriverError::Transport(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("not connected")
                    || msg.contains("terminated")
                    || msg.contains("broken pipe")
                    || msg.contains("timed out")
                    || msg.contains("stdin closed")
            }
            _ => false,
        }
    }
}
