//! Mind-map of explored screens.
//!
//! A derived graph keyed by screen fingerprint: which screens the explorer
//! has seen, when it first saw them, and which AID keys led where. The map
//! is rebuildable from the attempt log, so a resumed run can reconstruct
//! its topology even when only attempts were persisted.

// Rust guideline compliant 2026-01

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::chaos::attempts::Attempt;

/// Characters of screen text kept as a node's signature.
const SIGNATURE_LIMIT: usize = 40;

/// One outgoing edge: an AID key observed to move from one screen to
/// another, with how often it did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindMapEdge {
    /// Destination screen fingerprint.
    pub to_hash: String,
    /// The AID key that made the move.
    pub aid_key: String,
    /// How many times this edge was taken.
    pub count: u64,
}

/// One explored screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MindMapNode {
    /// When the explorer first landed here.
    pub first_seen: DateTime<Utc>,
    /// Compact text signature (first non-blank screen line, truncated).
    pub signature: String,
    /// Outgoing transitions.
    pub transitions: Vec<MindMapEdge>,
}

/// The exploration graph, keyed by screen fingerprint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MindMap {
    nodes: BTreeMap<String, MindMapNode>,
}

/// First non-blank line of the screen text, trimmed and truncated.
fn signature_of(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && l.chars().any(|c| c != '\0'))
        .map(|l| l.chars().take(SIGNATURE_LIMIT).collect())
        .unwrap_or_default()
}

impl MindMap {
    /// An empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that a screen was observed, creating its node on first sight.
    pub fn observe(&mut self, hash: &str, screen_text: &str) {
        if hash.is_empty() {
            return;
        }
        self.nodes.entry(hash.to_string()).or_insert_with(|| MindMapNode {
            first_seen: Utc::now(),
            signature: signature_of(screen_text),
            transitions: Vec::new(),
        });
    }

    /// Record a transition out of `from_hash`, bumping an existing edge or
    /// creating a new one. Both endpoints are created if unseen.
    pub fn record_transition(&mut self, from_hash: &str, to_hash: &str, aid_key: &str) {
        if from_hash.is_empty() || to_hash.is_empty() {
            return;
        }
        self.observe(from_hash, "");
        self.observe(to_hash, "");
        let node = self
            .nodes
            .get_mut(from_hash)
            .expect("from node observed above");
        if let Some(edge) = node
            .transitions
            .iter_mut()
            .find(|e| e.to_hash == to_hash && e.aid_key == aid_key)
        {
            edge.count += 1;
        } else {
            node.transitions.push(MindMapEdge {
                to_hash: to_hash.to_string(),
                aid_key: aid_key.to_string(),
                count: 1,
            });
        }
    }

    /// Rebuild a map from an attempt log. Signatures are unavailable in
    /// attempts and come back empty.
    #[must_use]
    pub fn rebuild_from_attempts(attempts: &[Attempt]) -> Self {
        let mut map = Self::new();
        for attempt in attempts {
            map.observe(&attempt.from_hash, "");
            if attempt.transitioned {
                map.record_transition(&attempt.from_hash, &attempt.to_hash, &attempt.aid_key);
            }
        }
        map
    }

    /// The node for a fingerprint, when seen.
    #[must_use]
    pub fn node(&self, hash: &str) -> Option<&MindMapNode> {
        self.nodes.get(hash)
    }

    /// All nodes, keyed by fingerprint.
    #[must_use]
    pub fn nodes(&self) -> &BTreeMap<String, MindMapNode> {
        &self.nodes
    }

    /// Number of distinct screens seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True when no screens were seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_creates_node_once() {
        let mut map = MindMap::new();
        map.observe("aaaa", "  WELCOME TO CICS  \nrest");
        map.observe("aaaa", "different text later");
        assert_eq!(map.len(), 1);
        assert_eq!(map.node("aaaa").expect("node").signature, "WELCOME TO CICS");
    }

    #[test]
    fn test_signature_skips_blank_and_nul_lines() {
        assert_eq!(signature_of("\n   \n\u{0}\u{0}\u{0}\n  LOGON  \n"), "LOGON");
        assert_eq!(signature_of(""), "");
        let long = "X".repeat(100);
        assert_eq!(signature_of(&long).len(), SIGNATURE_LIMIT);
    }

    #[test]
    fn test_record_transition_counts_repeats() {
        let mut map = MindMap::new();
        map.record_transition("a", "b", "Enter");
        map.record_transition("a", "b", "Enter");
        map.record_transition("a", "b", "PF(3)");
        map.record_transition("a", "c", "Enter");

        let node = map.node("a").expect("node");
        assert_eq!(node.transitions.len(), 3);
        let enter_b = node
            .transitions
            .iter()
            .find(|e| e.to_hash == "b" && e.aid_key == "Enter")
            .expect("edge");
        assert_eq!(enter_b.count, 2);
        assert!(map.node("b").is_some());
        assert!(map.node("c").is_some());
    }

    #[test]
    fn test_empty_hashes_are_ignored() {
        let mut map = MindMap::new();
        map.observe("", "text");
        map.record_transition("", "b", "Enter");
        map.record_transition("a", "", "Enter");
        assert!(map.is_empty());
    }

    #[test]
    fn test_rebuild_from_attempts() {
        let mut first = Attempt::begin(1, "a".to_string());
        first.to_hash = "b".to_string();
        first.aid_key = "Enter".to_string();
        first.transitioned = true;
        let mut second = Attempt::begin(2, "b".to_string());
        second.to_hash = "b".to_string();
        second.aid_key = "PF(3)".to_string();

        let map = MindMap::rebuild_from_attempts(&[first, second]);
        assert_eq!(map.len(), 2);
        assert_eq!(map.node("a").expect("node").transitions.len(), 1);
        assert!(map.node("b").expect("node").transitions.is_empty());
    }
}
