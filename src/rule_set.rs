// Rule set model, JSON parsing, and atomic snapshot publication.
//
// A RuleSet is the full, ordered collection of rules for one redirect plus
// that redirect's default destination. Evaluators only ever see immutable
// snapshots; edits clone the current snapshot, modify the clone, and swap
// it in atomically, so an in-flight evaluation never observes a
// half-updated rule list.

use crate::rule::{Rule, RuleId};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use thiserror::Error;

// ============================================================================
// RULE SET
// ============================================================================

/// The validated, ordered collection of rules for one redirect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Identifier of the redirect this set belongs to.
    pub id: String,
    /// Destination used when no rule matches or a probabilistic rule
    /// falls through.
    pub default_url: String,
    /// Rules in insertion order. Evaluation order is by ascending
    /// priority with insertion order breaking ties.
    #[serde(default)]
    pub rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(id: impl Into<String>, default_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            default_url: default_url.into(),
            rules: Vec::new(),
        }
    }

    /// Appends a rule, preserving insertion order for tie-breaking.
    pub fn add_rule(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    /// Looks up a rule by id.
    pub fn get_rule(&self, rule_id: &RuleId) -> Option<&Rule> {
        self.rules.iter().find(|r| &r.id == rule_id)
    }

    /// Looks up a rule by id, mutably.
    pub fn get_rule_mut(&mut self, rule_id: &RuleId) -> Option<&mut Rule> {
        self.rules.iter_mut().find(|r| &r.id == rule_id)
    }

    /// Removes a rule by id, returning it if present.
    pub fn remove_rule(&mut self, rule_id: &RuleId) -> Option<Rule> {
        let pos = self.rules.iter().position(|r| &r.id == rule_id)?;
        Some(self.rules.remove(pos))
    }

    /// Rules ordered for evaluation: ascending priority, stable on ties.
    pub fn rules_by_priority(&self) -> Vec<&Rule> {
        let mut ordered: Vec<&Rule> = self.rules.iter().collect();
        ordered.sort_by_key(|r| r.priority);
        ordered
    }

    /// Rules whose status is active (ignores schedule windows).
    pub fn active_rules(&self) -> Vec<&Rule> {
        self.rules.iter().filter(|r| r.status.is_active()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

// ============================================================================
// PARSER
// ============================================================================

/// JSON parsing and serialization for rule sets.
pub struct RuleSetParser;

impl RuleSetParser {
    /// Parse a rule set from a JSON string.
    pub fn from_json(json: &str) -> Result<RuleSet, ParseError> {
        serde_json::from_str(json).map_err(|e| ParseError::JsonParseError(e.to_string()))
    }

    /// Parse a rule set from JSON bytes.
    pub fn from_json_bytes(bytes: &[u8]) -> Result<RuleSet, ParseError> {
        serde_json::from_slice(bytes).map_err(|e| ParseError::JsonParseError(e.to_string()))
    }

    /// Serialize a rule set to a pretty JSON string.
    pub fn to_json(rule_set: &RuleSet) -> Result<String, ParseError> {
        serde_json::to_string_pretty(rule_set)
            .map_err(|e| ParseError::SerializationError(e.to_string()))
    }

    /// Serialize a rule set to JSON bytes.
    pub fn to_json_bytes(rule_set: &RuleSet) -> Result<Vec<u8>, ParseError> {
        serde_json::to_vec_pretty(rule_set)
            .map_err(|e| ParseError::SerializationError(e.to_string()))
    }
}

/// Parse errors.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// ============================================================================
// SNAPSHOT STORE
// ============================================================================

/// Copy-on-write publication point for rule set snapshots.
///
/// Readers grab an `Arc` and evaluate against it without holding any lock;
/// writers clone the current snapshot, apply their edit, and swap the
/// pointer atomically. Concurrent evaluations keep whatever snapshot they
/// started with.
pub struct RuleSetStore {
    current: RwLock<Arc<RuleSet>>,
}

impl RuleSetStore {
    pub fn new(rule_set: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rule_set)),
        }
    }

    /// Returns the current snapshot. Cheap: clones an `Arc`, not the set.
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.current.read().unwrap())
    }

    /// Replaces the current snapshot wholesale.
    pub fn publish(&self, rule_set: RuleSet) {
        *self.current.write().unwrap() = Arc::new(rule_set);
    }

    /// Clones the current snapshot, applies an edit, and publishes the
    /// result. Returns the new snapshot.
    pub fn update(&self, edit: impl FnOnce(&mut RuleSet)) -> Arc<RuleSet> {
        let mut guard = self.current.write().unwrap();
        let mut next = (**guard).clone();
        edit(&mut next);
        let next = Arc::new(next);
        *guard = Arc::clone(&next);
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RuleAction;
    use crate::rule::RuleStatus;

    fn redirect(url: &str) -> RuleAction {
        RuleAction::Redirect {
            url: url.to_string(),
        }
    }

    fn sample_set() -> RuleSet {
        let mut set = RuleSet::new("rs-1", "https://default.example");
        set.add_rule(Rule::builder(redirect("https://a.example")).priority(2).build());
        set.add_rule(Rule::builder(redirect("https://b.example")).priority(1).build());
        set.add_rule(
            Rule::builder(redirect("https://c.example"))
                .priority(1)
                .status(RuleStatus::Inactive)
                .build(),
        );
        set
    }

    #[test]
    fn priority_ordering_is_stable() {
        let set = sample_set();
        let ordered = set.rules_by_priority();
        // Both priority-1 rules come first, in insertion order.
        assert_eq!(ordered[0].priority, 1);
        assert_eq!(ordered[1].priority, 1);
        assert_eq!(ordered[2].priority, 2);
        assert_eq!(ordered[0].id, set.rules[1].id);
        assert_eq!(ordered[1].id, set.rules[2].id);
    }

    #[test]
    fn crud_helpers() {
        let mut set = sample_set();
        let id = set.rules[0].id;
        assert!(set.get_rule(&id).is_some());
        let removed = set.remove_rule(&id).unwrap();
        assert_eq!(removed.id, id);
        assert!(set.get_rule(&id).is_none());
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn json_round_trip() {
        let set = sample_set();
        let json = RuleSetParser::to_json(&set).unwrap();
        let back = RuleSetParser::from_json(&json).unwrap();
        assert_eq!(set, back);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!(RuleSetParser::from_json("not json").is_err());
    }

    #[test]
    fn store_snapshots_are_isolated_from_updates() {
        let store = RuleSetStore::new(sample_set());
        let before = store.snapshot();
        store.update(|set| {
            set.add_rule(Rule::new(redirect("https://new.example")));
        });
        let after = store.snapshot();
        // The snapshot taken before the update is untouched.
        assert_eq!(before.len(), 3);
        assert_eq!(after.len(), 4);
    }

    #[test]
    fn publish_swaps_wholesale() {
        let store = RuleSetStore::new(sample_set());
        store.publish(RuleSet::new("rs-2", "https://other.example"));
        let snap = store.snapshot();
        assert_eq!(snap.id, "rs-2");
        assert!(snap.is_empty());
    }
}
