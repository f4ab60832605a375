// demos/decision_flow.rs
//
// End-to-end walkthrough: author a rule set, validate it, publish a
// snapshot, and decide destinations for a few visitors.

use redirect_engine::{
    ActionKind, AttributeKey, Condition, ConditionLogic, ConditionValue, DecisionEngine, Operator,
    Rule, RuleAction, RuleSet, RuleSetStore, RuleSetValidator, Variant, VisitorAttributes,
};
use chrono::Utc;

fn main() {
    println!("=== Redirect Decision Flow ===\n");

    // --- Author a rule set ---------------------------------------------
    let mut set = RuleSet::new("landing-page", "https://example.com/");

    // Mobile US visitors go to the mobile landing page.
    set.add_rule(
        Rule::builder(RuleAction::Redirect {
            url: "https://m.example.com/us".to_string(),
        })
        .priority(1)
        .condition(Condition::new(
            AttributeKey::Country,
            Operator::Equals,
            Some(ConditionValue::single("US")),
        ))
        .condition(Condition::new(
            AttributeKey::DeviceType,
            Operator::Equals,
            Some(ConditionValue::single("mobile")),
        ))
        .logic(ConditionLogic::And)
        .build(),
    );

    // Everyone else enters a 50/50 A/B test.
    set.add_rule(
        Rule::builder(RuleAction::AbTest {
            variants: vec![
                Variant::new("A", 50.0, "https://example.com/a"),
                Variant::new("B", 50.0, "https://example.com/b"),
            ],
        })
        .priority(10)
        .build(),
    );

    // --- Validate before publishing ------------------------------------
    let result = RuleSetValidator::new().validate(&set);
    println!("valid: {}", result.valid);
    for issue in result.issues() {
        println!("  {} -> {}", issue.field, issue.message);
    }

    // --- Publish an immutable snapshot ---------------------------------
    let store = RuleSetStore::new(set);
    let snapshot = store.snapshot();

    // --- Decide for a few visitors -------------------------------------
    let engine = DecisionEngine::new();
    let now = Utc::now();

    let mobile_us = VisitorAttributes::builder()
        .country("US")
        .device_type("mobile")
        .visitor_id("visitor-1")
        .build();
    let decision = engine.decide(&snapshot, &mobile_us, now);
    println!("\nmobile US visitor -> {}", decision.final_url);
    assert_eq!(decision.action, Some(ActionKind::Redirect));

    let desktop_fr = VisitorAttributes::builder()
        .country("FR")
        .device_type("desktop")
        .visitor_id("visitor-2")
        .build();
    let decision = engine.decide(&snapshot, &desktop_fr, now);
    println!(
        "desktop FR visitor -> {} (variant {:?})",
        decision.final_url, decision.variant
    );

    // The same visitor always sees the same variant.
    let again = engine.decide(&snapshot, &desktop_fr, now);
    assert_eq!(decision, again);
    println!("\n=== Done ===");
}
