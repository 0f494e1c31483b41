//! Chaos run snapshots.
//!
//! A [`ChaosSnapshot`] is a deep, serializable copy of everything a run has
//! accumulated, taken under the engine mutex so callers always observe a
//! consistent view. Snapshots feed the web layer's run browser and seed
//! [`resume`](super::ChaosEngine::resume).

// Rust guideline compliant 2026-01

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::chaos::attempts::Attempt;
use crate::chaos::mindmap::MindMap;
use crate::chaos::Transition;
use crate::workflow::WorkflowStep;

/// A persisted view of one chaos run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChaosSnapshot {
    /// Identifier of the saved run.
    pub run_id: Uuid,
    /// Target host.
    pub host: String,
    /// Target port.
    pub port: u16,
    /// When the run started.
    pub started_at: Option<DateTime<Utc>>,
    /// When the run stopped, when it has.
    pub stopped_at: Option<DateTime<Utc>>,
    /// Iterations completed.
    pub steps_run: u64,
    /// Every screen fingerprint seen.
    pub screen_hashes: BTreeSet<String>,
    /// Every distinct value typed into a field.
    pub unique_inputs: BTreeSet<String>,
    /// How often each AID key was pressed.
    pub aid_counts: BTreeMap<String, u64>,
    /// Observed transitions in order.
    pub transitions: Vec<Transition>,
    /// The replayable step list.
    pub steps: Vec<WorkflowStep>,
    /// Retained recent attempts.
    pub attempts: Vec<Attempt>,
    /// The exploration graph.
    pub mind_map: MindMap,
    /// Error that ended the run, when one did.
    pub last_error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snapshot = ChaosSnapshot {
            run_id: Uuid::new_v4(),
            host: "h".to_string(),
            port: 23,
            started_at: Some(Utc::now()),
            stopped_at: None,
            steps_run: 7,
            screen_hashes: ["a", "b"].into_iter().map(String::from).collect(),
            unique_inputs: ["x"].into_iter().map(String::from).collect(),
            aid_counts: [("Enter".to_string(), 7u64)].into_iter().collect(),
            transitions: vec![],
            steps: vec![],
            attempts: vec![Attempt::begin(1, "a".to_string())],
            mind_map: MindMap::new(),
            last_error: None,
        };
        let json = serde_json::to_string_pretty(&snapshot).expect("serialize");
        let back: ChaosSnapshot = serde_json::from_str(&json).expect("parse");
        assert_eq!(back, snapshot);
    }
}
