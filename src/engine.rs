// The decision pipeline: match a rule, resolve its action, apply the
// default destination. This is the one entry point both production
// evaluation and the rule tester go through, so a dry run can never
// diverge from what traffic actually sees.

use crate::action::ActionKind;
use crate::attribute::VisitorAttributes;
use crate::matcher::match_rule;
use crate::resolver::resolve;
use crate::rule::RuleId;
use crate::rule_set::RuleSet;
use crate::splitter::TrafficSplitter;
use chrono::{DateTime, Utc};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;

// ============================================================================
// DECISION
// ============================================================================

/// The resolution result handed to collaborators.
///
/// The analytics pipeline uses `matched_rule_id` to increment hit counts;
/// the Rule Tester UI renders this exact shape verbatim. `final_url`
/// always names a concrete destination: the default one is already applied
/// when no rule matched or a probabilistic rule fell through.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Decision {
    /// The rule that fired, or `None` if no rule matched.
    pub matched_rule_id: Option<RuleId>,
    /// Kind of action the matched rule carried.
    pub action: Option<ActionKind>,
    /// Where the visitor goes.
    pub final_url: String,
    /// Chosen A/B variant name, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Configured rollout percentage, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

// ============================================================================
// DECISION ENGINE
// ============================================================================

/// Pure decision function over immutable snapshots.
///
/// No shared mutable state and no I/O: safe to call from arbitrarily many
/// threads against the same rule set snapshot.
#[derive(Debug, Clone, Default)]
pub struct DecisionEngine {
    splitter: TrafficSplitter,
}

impl DecisionEngine {
    pub fn new() -> Self {
        Self {
            splitter: TrafficSplitter::new(),
        }
    }

    /// Decides the destination for one visitor.
    pub fn decide(
        &self,
        rule_set: &RuleSet,
        attrs: &VisitorAttributes,
        now: DateTime<Utc>,
    ) -> Decision {
        match match_rule(rule_set, attrs, now) {
            Some(rule) => {
                let resolution = resolve(rule, attrs, &self.splitter);
                log::debug!(
                    "rule {} fired ({}), url={:?}",
                    resolution.rule_id,
                    resolution.action,
                    resolution.url
                );
                Decision {
                    matched_rule_id: Some(resolution.rule_id),
                    action: Some(resolution.action),
                    final_url: resolution
                        .url
                        .unwrap_or_else(|| rule_set.default_url.clone()),
                    variant: resolution.variant,
                    percentage: resolution.percentage,
                }
            }
            None => Decision {
                matched_rule_id: None,
                action: None,
                final_url: rule_set.default_url.clone(),
                variant: None,
                percentage: None,
            },
        }
    }
}

// ============================================================================
// RULE TESTER
// ============================================================================

/// Dry-run harness for the rule-authoring UI.
///
/// Runs the exact same matcher/resolver path as production; the only
/// differences are that the attributes are synthetic and the output is
/// never fed to hit counting.
#[derive(Debug, Clone, Default)]
pub struct RuleTester {
    engine: DecisionEngine,
}

impl RuleTester {
    pub fn new() -> Self {
        Self {
            engine: DecisionEngine::new(),
        }
    }

    /// Evaluates a synthetic visitor against the rule set.
    pub fn dry_run(
        &self,
        rule_set: &RuleSet,
        attrs: &VisitorAttributes,
        now: DateTime<Utc>,
    ) -> Decision {
        self.engine.decide(rule_set, attrs, now)
    }

    /// Like `dry_run`, but mints a random visitor identity when the author
    /// did not pin one, so repeated tester runs exercise different
    /// splitter buckets instead of always landing in the same one.
    pub fn dry_run_random_visitor(
        &self,
        rule_set: &RuleSet,
        attrs: &VisitorAttributes,
        now: DateTime<Utc>,
    ) -> Decision {
        if attrs.visitor_id.is_some() {
            return self.engine.decide(rule_set, attrs, now);
        }
        let mut synthetic = attrs.clone();
        let id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        synthetic.visitor_id = Some(format!("test-{}", id));
        self.engine.decide(rule_set, &synthetic, now)
    }
}
