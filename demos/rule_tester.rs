// demos/rule_tester.rs
//
// Dry-running a rule set the way the authoring UI's "Test rule" button
// does: same matcher/resolver path as production, synthetic attributes,
// output never fed to hit counting.

use redirect_engine::{
    AttributeKey, Condition, ConditionValue, Operator, Rule, RuleAction, RuleSet, RuleTester,
    VisitorAttributes,
};
use chrono::Utc;

fn main() {
    let mut set = RuleSet::new("promo", "https://example.com/");
    set.add_rule(
        Rule::builder(RuleAction::PercentageRedirect {
            url: "https://example.com/beta".to_string(),
            percentage: 25.0,
        })
        .priority(1)
        .condition(Condition::new(
            AttributeKey::Country,
            Operator::In,
            Some(ConditionValue::list(["US", "CA"])),
        ))
        .build(),
    );

    let tester = RuleTester::new();
    let now = Utc::now();
    let synthetic = VisitorAttributes::builder().country("US").build();

    // Each run mints a fresh visitor identity, so repeated tests exercise
    // both sides of the 25% rollout.
    let mut redirected = 0;
    let runs = 20;
    for _ in 0..runs {
        let decision = tester.dry_run_random_visitor(&set, &synthetic, now);
        if decision.final_url.ends_with("/beta") {
            redirected += 1;
        }
    }
    println!("{}/{} test runs hit the rollout destination", redirected, runs);

    // A visitor outside the condition never matches.
    let out_of_scope = VisitorAttributes::builder().country("DE").build();
    let decision = tester.dry_run(&set, &out_of_scope, now);
    assert_eq!(decision.matched_rule_id, None);
    println!("DE visitor -> {}", decision.final_url);
}
