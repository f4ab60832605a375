// Rule definition and lifecycle.
//
// A rule is a prioritized, conditionally-activated redirect policy: its
// conditions decide whether it applies to a visitor, its status and
// optional schedule window decide whether it is eligible at all, and its
// action decides where a matched visitor goes.

use crate::action::RuleAction;
use crate::condition::{Condition, ConditionLogic};
use crate::attribute::VisitorAttributes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RULE ID
// ============================================================================

/// Unique identifier for a rule.
///
/// A UUID v4 that stays stable across edits, so hit counts recorded by the
/// analytics collaborator keep pointing at the same rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RuleId(Uuid);

impl RuleId {
    /// Create a new random rule id.
    pub fn new() -> Self {
        RuleId(Uuid::new_v4())
    }

    /// Returns the underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for RuleId {
    fn from(uuid: Uuid) -> Self {
        RuleId(uuid)
    }
}

impl std::fmt::Display for RuleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// RULE STATUS
// ============================================================================

/// Lifecycle status of a rule. Only `active` rules are eligible for
/// evaluation; `draft` rules are visible to the authoring UI but never
/// served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleStatus {
    Active,
    Inactive,
    Draft,
}

impl RuleStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, RuleStatus::Active)
    }
}

impl Default for RuleStatus {
    fn default() -> Self {
        RuleStatus::Draft
    }
}

impl std::fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleStatus::Active => write!(f, "active"),
            RuleStatus::Inactive => write!(f, "inactive"),
            RuleStatus::Draft => write!(f, "draft"),
        }
    }
}

// ============================================================================
// RULE
// ============================================================================

/// A prioritized, conditionally-activated redirect policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    /// Stable identifier (persists across edits).
    pub id: RuleId,
    /// Evaluation priority. Lower evaluates first; ties keep the rule
    /// set's insertion order.
    pub priority: i32,
    /// Lifecycle status.
    pub status: RuleStatus,
    /// Conditions combined by `condition_logic`. Empty means the rule
    /// matches unconditionally (catch-all).
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// AND/OR combinator over the conditions.
    #[serde(default)]
    pub condition_logic: ConditionLogic,
    /// What happens when the rule matches.
    pub action: RuleAction,
    /// Optional start of the active window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    /// Optional end of the active window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    /// Hit count maintained by the external analytics collaborator. The
    /// engine never increments this; it only reports what fired.
    #[serde(default)]
    pub hit_count: u64,
}

impl Rule {
    /// Creates an active rule with default priority and no schedule.
    pub fn new(action: RuleAction) -> Self {
        Self {
            id: RuleId::new(),
            priority: 100,
            status: RuleStatus::Active,
            conditions: Vec::new(),
            condition_logic: ConditionLogic::And,
            action,
            start_date: None,
            end_date: None,
            hit_count: 0,
        }
    }

    /// Creates a builder for finer-grained construction.
    pub fn builder(action: RuleAction) -> RuleBuilder {
        RuleBuilder::new(action)
    }

    /// Scheduler gate: is this rule eligible at `now`?
    ///
    /// False if the status is not active, if `start_date` is set and `now`
    /// is before it, or if `end_date` is set and `now` is after it.
    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        if !self.status.is_active() {
            return false;
        }
        if let Some(start) = self.start_date {
            if now < start {
                return false;
            }
        }
        if let Some(end) = self.end_date {
            if now > end {
                return false;
            }
        }
        true
    }

    /// Combines this rule's conditions against a visitor snapshot.
    pub fn matches(&self, attrs: &VisitorAttributes) -> bool {
        self.condition_logic.combine(&self.conditions, attrs)
    }

    /// True if the rule has no conditions and matches every visitor.
    pub fn is_catch_all(&self) -> bool {
        self.conditions.is_empty()
    }
}

// ============================================================================
// RULE BUILDER
// ============================================================================

/// Builder for `Rule`.
#[derive(Debug)]
pub struct RuleBuilder {
    rule: Rule,
}

impl RuleBuilder {
    pub fn new(action: RuleAction) -> Self {
        Self {
            rule: Rule::new(action),
        }
    }

    pub fn id(mut self, id: RuleId) -> Self {
        self.rule.id = id;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.rule.priority = priority;
        self
    }

    pub fn status(mut self, status: RuleStatus) -> Self {
        self.rule.status = status;
        self
    }

    pub fn condition(mut self, condition: Condition) -> Self {
        self.rule.conditions.push(condition);
        self
    }

    pub fn conditions(mut self, conditions: impl IntoIterator<Item = Condition>) -> Self {
        self.rule.conditions.extend(conditions);
        self
    }

    pub fn logic(mut self, logic: ConditionLogic) -> Self {
        self.rule.condition_logic = logic;
        self
    }

    pub fn start_date(mut self, start: DateTime<Utc>) -> Self {
        self.rule.start_date = Some(start);
        self
    }

    pub fn end_date(mut self, end: DateTime<Utc>) -> Self {
        self.rule.end_date = Some(end);
        self
    }

    pub fn build(self) -> Rule {
        self.rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::AttributeKey;
    use crate::condition::ConditionValue;
    use crate::operator::Operator;
    use chrono::Duration;

    fn redirect() -> RuleAction {
        RuleAction::Redirect {
            url: "https://x.example".to_string(),
        }
    }

    #[test]
    fn active_rule_without_schedule_is_eligible() {
        let rule = Rule::new(redirect());
        assert!(rule.is_eligible(Utc::now()));
    }

    #[test]
    fn inactive_and_draft_rules_are_never_eligible() {
        let now = Utc::now();
        let inactive = Rule::builder(redirect()).status(RuleStatus::Inactive).build();
        let draft = Rule::builder(redirect()).status(RuleStatus::Draft).build();
        assert!(!inactive.is_eligible(now));
        assert!(!draft.is_eligible(now));
    }

    #[test]
    fn future_start_date_blocks_eligibility() {
        let now = Utc::now();
        let rule = Rule::builder(redirect())
            .start_date(now + Duration::hours(1))
            .build();
        assert!(!rule.is_eligible(now));
        assert!(rule.is_eligible(now + Duration::hours(2)));
    }

    #[test]
    fn past_end_date_blocks_eligibility() {
        let now = Utc::now();
        let rule = Rule::builder(redirect())
            .end_date(now - Duration::hours(1))
            .build();
        assert!(!rule.is_eligible(now));
    }

    #[test]
    fn inside_window_is_eligible() {
        let now = Utc::now();
        let rule = Rule::builder(redirect())
            .start_date(now - Duration::hours(1))
            .end_date(now + Duration::hours(1))
            .build();
        assert!(rule.is_eligible(now));
    }

    #[test]
    fn catch_all_matches_anything() {
        let rule = Rule::new(redirect());
        assert!(rule.is_catch_all());
        assert!(rule.matches(&VisitorAttributes::new()));
    }

    #[test]
    fn conditions_gate_matching() {
        let rule = Rule::builder(redirect())
            .condition(Condition::new(
                AttributeKey::Country,
                Operator::Equals,
                Some(ConditionValue::single("US")),
            ))
            .build();
        let us = VisitorAttributes::builder().country("US").build();
        let fr = VisitorAttributes::builder().country("FR").build();
        assert!(rule.matches(&us));
        assert!(!rule.matches(&fr));
    }

    #[test]
    fn rule_json_round_trip() {
        let rule = Rule::builder(redirect())
            .priority(5)
            .condition(Condition::new(
                AttributeKey::DeviceType,
                Operator::Equals,
                Some(ConditionValue::single("mobile")),
            ))
            .logic(ConditionLogic::Or)
            .build();
        let json = serde_json::to_string(&rule).unwrap();
        let back: Rule = serde_json::from_str(&json).unwrap();
        assert_eq!(rule, back);
    }
}
