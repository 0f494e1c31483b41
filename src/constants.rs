//! Application-wide constants for greenscreen.
//!
//! This module centralizes magic numbers shared across the driver and
//! decoder so they stay discoverable. Constants are grouped by domain
//! with documentation explaining their purpose.
//!
//! # Categories
//!
//! - **Transport**: subprocess command round-trip limits
//! - **Readiness**: startup and keyboard-lock polling
//! - **Model**: 3270 terminal model fallbacks

use std::time::Duration;

// ============================================================================
// Transport
// ============================================================================

/// Maximum time to wait for a single response line from the emulator.
///
/// A healthy emulator answers within milliseconds; fifteen seconds means the
/// child is wedged or its pipe is gone. On expiry the subprocess is killed
/// and stdin closed so later commands fail cleanly instead of hanging.
pub const COMMAND_READ_TIMEOUT: Duration = Duration::from_secs(15);

/// Bytes of child stderr retained for enriching transport errors.
pub const STDERR_TAIL_LIMIT: usize = 4096;

// ============================================================================
// Readiness & keyboard lock
// ============================================================================

/// Attempts made while polling a freshly spawned emulator for readiness.
///
/// Combined with [`READY_POLL_INTERVAL`] this gives the child roughly five
/// seconds to negotiate the host connection and report "U F".
pub const READY_POLL_ATTEMPTS: u32 = 50;

/// Delay between readiness polls.
pub const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Attempts made re-reading the buffer while the keyboard is locked.
pub const LOCKED_BUFFER_RETRIES: u32 = 50;

/// Delay between locked-buffer re-reads.
pub const LOCKED_BUFFER_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Seconds passed to the emulator's `Wait(Unlock, …)` command after an AID
/// key leaves the keyboard locked.
pub const UNLOCK_WAIT_SECS: u64 = 10;

// ============================================================================
// Model
// ============================================================================

/// Rows of the fallback terminal model (3278/3279 model 2).
pub const DEFAULT_MODEL_ROWS: usize = 24;

/// Columns of the fallback terminal model.
pub const DEFAULT_MODEL_COLS: usize = 80;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_values_are_reasonable() {
        // The command timeout must comfortably exceed the unlock wait so a
        // Wait(Unlock, 10) round trip cannot be killed by its own transport.
        assert!(COMMAND_READ_TIMEOUT > Duration::from_secs(UNLOCK_WAIT_SECS));

        // Readiness polling should span roughly five seconds.
        let ready_span = READY_POLL_INTERVAL * READY_POLL_ATTEMPTS;
        assert!(ready_span >= Duration::from_secs(4));
        assert!(ready_span <= Duration::from_secs(10));
    }

    #[test]
    fn test_default_model_is_24x80() {
        assert_eq!(DEFAULT_MODEL_ROWS, 24);
        assert_eq!(DEFAULT_MODEL_COLS, 80);
    }
}
