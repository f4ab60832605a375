// Action resolution: turn a matched rule's action into a destination.
//
// The resolver is the only place that pattern-matches `RuleAction`, so a
// new action kind fails to compile until it is handled here. Probabilistic
// actions consult the traffic splitter; a fall-through (`url: None`) still
// carries the rule id because the rule *matched* for hit-counting
// purposes, only the destination differs.

use crate::action::{ActionKind, RuleAction};
use crate::attribute::VisitorAttributes;
use crate::rule::{Rule, RuleId};
use crate::splitter::{compute_visitor_key, TrafficSplitter, WeightedBucket};
use serde::Serialize;

/// Outcome of resolving one matched rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    /// Which rule fired.
    pub rule_id: RuleId,
    /// Which kind of action it carried.
    pub action: ActionKind,
    /// Destination, or `None` to fall through to the redirect's default
    /// destination.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Chosen A/B variant name, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Configured rollout percentage, when applicable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
}

/// Resolves a matched rule's action for this visitor.
pub fn resolve(rule: &Rule, attrs: &VisitorAttributes, splitter: &TrafficSplitter) -> Resolution {
    match &rule.action {
        RuleAction::Redirect { url } => Resolution {
            rule_id: rule.id,
            action: ActionKind::Redirect,
            url: Some(url.clone()),
            variant: None,
            percentage: None,
        },
        RuleAction::PercentageRedirect { url, percentage } => {
            let key = compute_visitor_key(attrs, &rule.id);
            let buckets = [
                WeightedBucket::new("redirect", *percentage),
                WeightedBucket::new("default", 100.0 - *percentage),
            ];
            let chosen = splitter.split(&key, &buckets);
            Resolution {
                rule_id: rule.id,
                action: ActionKind::PercentageRedirect,
                url: match chosen {
                    Some(0) => Some(url.clone()),
                    _ => None,
                },
                variant: None,
                percentage: Some(*percentage),
            }
        }
        RuleAction::AbTest { variants } => {
            let key = compute_visitor_key(attrs, &rule.id);
            let buckets: Vec<WeightedBucket> = variants
                .iter()
                .map(|v| WeightedBucket::new(v.name.clone(), v.percentage))
                .collect();
            match splitter.split(&key, &buckets) {
                Some(index) => {
                    let variant = &variants[index];
                    Resolution {
                        rule_id: rule.id,
                        action: ActionKind::AbTest,
                        url: Some(variant.url.clone()),
                        variant: Some(variant.name.clone()),
                        percentage: Some(variant.percentage),
                    }
                }
                // Residual control bucket: the rule fired but the visitor
                // stays on the default destination.
                None => Resolution {
                    rule_id: rule.id,
                    action: ActionKind::AbTest,
                    url: None,
                    variant: None,
                    percentage: None,
                },
            }
        }
    }
}
