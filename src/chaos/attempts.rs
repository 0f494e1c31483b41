//! Attempt records and the bounded attempt ring.
//!
//! Every chaos iteration produces an [`Attempt`]: what was typed where,
//! which AID key was pressed, and whether the screen moved. Only the most
//! recent attempts are retained — a day-long run must not grow its log
//! without bound — so they live in a fixed-capacity FIFO ring that evicts
//! the oldest entry on overflow.

// Rust guideline compliant 2026-01

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum attempts retained in the ring.
pub const ATTEMPT_RING_CAPACITY: usize = 40;

/// One field write inside an attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldWrite {
    /// Row, 1-based.
    pub row: usize,
    /// Column, 1-based.
    pub col: usize,
    /// Characters written.
    pub length: usize,
    /// The written text.
    pub value: String,
    /// Whether the driver accepted the write.
    pub success: bool,
    /// Driver error, when the write failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One chaos iteration's record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    /// 1-based iteration number.
    pub seq: u64,
    /// When the iteration started.
    pub timestamp: DateTime<Utc>,
    /// Screen fingerprint before the AID key.
    pub from_hash: String,
    /// Screen fingerprint after the AID key; empty when the re-read failed.
    pub to_hash: String,
    /// The AID key pressed.
    pub aid_key: String,
    /// Field writes performed this iteration.
    pub writes: Vec<FieldWrite>,
    /// Whether the screen fingerprint changed.
    pub transitioned: bool,
    /// The error that ended the run, when this was the final iteration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Attempt {
    /// A fresh attempt at the start of an iteration.
    #[must_use]
    pub fn begin(seq: u64, from_hash: String) -> Self {
        Self {
            seq,
            timestamp: Utc::now(),
            from_hash,
            to_hash: String::new(),
            aid_key: String::new(),
            writes: Vec::new(),
            transitioned: false,
            error: None,
        }
    }
}

/// Fixed-capacity FIFO of recent attempts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttemptRing {
    buf: VecDeque<Attempt>,
}

impl AttemptRing {
    /// An empty ring.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an attempt, evicting the oldest when full.
    pub fn push(&mut self, attempt: Attempt) {
        if self.buf.len() == ATTEMPT_RING_CAPACITY {
            self.buf.pop_front();
        }
        self.buf.push_back(attempt);
    }

    /// Snapshot of the retained attempts, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Attempt> {
        self.buf.iter().cloned().collect()
    }

    /// Number of retained attempts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
