// Rule matching: pick the first rule that applies to a visitor.
//
// Candidates are ordered by ascending priority (insertion order breaks
// ties; the matcher never re-orders beyond that), gated by status and
// schedule window, and tested through the logic combinator. No match means
// "use the redirect's default destination".

use crate::attribute::VisitorAttributes;
use crate::rule::Rule;
use crate::rule_set::RuleSet;
use chrono::{DateTime, Utc};

/// Returns the first eligible, matching rule for this visitor, or `None`
/// if the default destination should be used.
pub fn match_rule<'a>(
    rule_set: &'a RuleSet,
    attrs: &VisitorAttributes,
    now: DateTime<Utc>,
) -> Option<&'a Rule> {
    rule_set
        .rules_by_priority()
        .into_iter()
        .find(|rule| rule.is_eligible(now) && rule.matches(attrs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::RuleAction;
    use crate::attribute::AttributeKey;
    use crate::condition::{Condition, ConditionValue};
    use crate::operator::Operator;
    use crate::rule::RuleStatus;
    use chrono::Duration;

    fn redirect(url: &str) -> RuleAction {
        RuleAction::Redirect {
            url: url.to_string(),
        }
    }

    fn country_is(code: &str) -> Condition {
        Condition::new(
            AttributeKey::Country,
            Operator::Equals,
            Some(ConditionValue::single(code)),
        )
    }

    #[test]
    fn lowest_priority_wins() {
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(Rule::builder(redirect("https://late.example")).priority(10).build());
        set.add_rule(Rule::builder(redirect("https://early.example")).priority(1).build());

        let hit = match_rule(&set, &VisitorAttributes::new(), Utc::now()).unwrap();
        assert_eq!(hit.id, set.rules[1].id);
    }

    #[test]
    fn ineligible_rules_are_skipped() {
        // Rules at priorities [1, 2, 3]; rule 1 inactive, rule 2 matches.
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(
            Rule::builder(redirect("https://one.example"))
                .priority(1)
                .status(RuleStatus::Inactive)
                .build(),
        );
        set.add_rule(Rule::builder(redirect("https://two.example")).priority(2).build());
        set.add_rule(Rule::builder(redirect("https://three.example")).priority(3).build());

        let hit = match_rule(&set, &VisitorAttributes::new(), Utc::now()).unwrap();
        assert_eq!(hit.id, set.rules[1].id, "must pick rule 2, never rule 3");
    }

    #[test]
    fn scheduled_out_rules_are_skipped() {
        let now = Utc::now();
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(
            Rule::builder(redirect("https://future.example"))
                .priority(1)
                .start_date(now + Duration::days(1))
                .build(),
        );
        set.add_rule(Rule::builder(redirect("https://live.example")).priority(2).build());

        let hit = match_rule(&set, &VisitorAttributes::new(), now).unwrap();
        assert_eq!(hit.id, set.rules[1].id);
    }

    #[test]
    fn conditions_filter_candidates() {
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(
            Rule::builder(redirect("https://fr.example"))
                .priority(1)
                .condition(country_is("FR"))
                .build(),
        );
        set.add_rule(
            Rule::builder(redirect("https://us.example"))
                .priority(2)
                .condition(country_is("US"))
                .build(),
        );

        let us = VisitorAttributes::builder().country("US").build();
        let hit = match_rule(&set, &us, Utc::now()).unwrap();
        assert_eq!(hit.id, set.rules[1].id);

        let de = VisitorAttributes::builder().country("DE").build();
        assert!(match_rule(&set, &de, Utc::now()).is_none());
    }

    #[test]
    fn tie_keeps_insertion_order() {
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(Rule::builder(redirect("https://first.example")).priority(5).build());
        set.add_rule(Rule::builder(redirect("https://second.example")).priority(5).build());

        let hit = match_rule(&set, &VisitorAttributes::new(), Utc::now()).unwrap();
        assert_eq!(hit.id, set.rules[0].id);
    }

    #[test]
    fn empty_set_matches_nothing() {
        let set = RuleSet::new("rs", "https://default.example");
        assert!(match_rule(&set, &VisitorAttributes::new(), Utc::now()).is_none());
    }
}
