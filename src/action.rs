// The action component of a rule: what happens to the visitor once the
// rule matches. Actions are an explicit tagged union with exhaustive
// matching in the resolver, so adding a new action kind is a compile-time
// checked change.

use serde::{Deserialize, Serialize};

// ============================================================================
// ACTION KIND
// ============================================================================

/// Names the three action kinds. Carried in resolution output so the
/// analytics collaborator can tell which kind of rule fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Redirect,
    PercentageRedirect,
    AbTest,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Redirect => "redirect",
            ActionKind::PercentageRedirect => "percentage_redirect",
            ActionKind::AbTest => "ab_test",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// ACTION
// ============================================================================

/// One variant of an A/B test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Variant name reported back for analytics ("A", "B", ...).
    pub name: String,
    /// Share of matched visitors, 0-100.
    pub percentage: f64,
    /// Destination for visitors assigned to this variant.
    pub url: String,
}

impl Variant {
    pub fn new(name: impl Into<String>, percentage: f64, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            percentage,
            url: url.into(),
        }
    }
}

/// What happens when a rule matches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleAction {
    /// Unconditional destination.
    Redirect { url: String },
    /// Redirect with probability `percentage/100`; otherwise the visitor
    /// falls through to the redirect's default destination.
    PercentageRedirect { url: String, percentage: f64 },
    /// Partition matched visitors across variants. Weights should sum to
    /// 100; anything left over is an intentional residual control group
    /// that falls through to the default destination.
    AbTest { variants: Vec<Variant> },
}

impl RuleAction {
    /// Returns which kind of action this is.
    pub fn kind(&self) -> ActionKind {
        match self {
            RuleAction::Redirect { .. } => ActionKind::Redirect,
            RuleAction::PercentageRedirect { .. } => ActionKind::PercentageRedirect,
            RuleAction::AbTest { .. } => ActionKind::AbTest,
        }
    }

    /// Returns true if resolving this action consults the traffic splitter.
    pub fn is_probabilistic(&self) -> bool {
        matches!(
            self,
            RuleAction::PercentageRedirect { .. } | RuleAction::AbTest { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_union_json() {
        let json = r#"{"type": "percentage_redirect", "url": "https://b.example", "percentage": 25}"#;
        let action: RuleAction = serde_json::from_str(json).unwrap();
        assert_eq!(
            action,
            RuleAction::PercentageRedirect {
                url: "https://b.example".to_string(),
                percentage: 25.0
            }
        );
        assert_eq!(action.kind(), ActionKind::PercentageRedirect);
        assert!(action.is_probabilistic());
    }

    #[test]
    fn ab_test_json() {
        let json = r#"{
            "type": "ab_test",
            "variants": [
                {"name": "A", "percentage": 50, "url": "https://a.example"},
                {"name": "B", "percentage": 50, "url": "https://b.example"}
            ]
        }"#;
        let action: RuleAction = serde_json::from_str(json).unwrap();
        assert_eq!(action.kind(), ActionKind::AbTest);
        match action {
            RuleAction::AbTest { variants } => {
                assert_eq!(variants.len(), 2);
                assert_eq!(variants[0].name, "A");
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn plain_redirect_is_not_probabilistic() {
        let action = RuleAction::Redirect {
            url: "https://x.example".to_string(),
        };
        assert!(!action.is_probabilistic());
        assert_eq!(action.kind().name(), "redirect");
    }
}
