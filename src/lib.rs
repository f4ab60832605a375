// Rule-based redirect decision engine.
//
// Given an immutable rule set snapshot and an immutable visitor attribute
// snapshot, decide which rule applies and which destination the visitor
// should receive, with deterministic traffic splitting for percentage
// rollouts and A/B tests. This crate is a library boundary only: no HTTP
// wiring, persistence, or authentication.

pub mod attribute;
pub mod operator;
pub mod condition;
pub mod action;
pub mod rule;
pub mod splitter;
pub mod matcher;
pub mod resolver;
pub mod validator;
pub mod rule_set;
pub mod engine;

pub use attribute::{
    AttributeCategory, AttributeKey, AttributeValue, ValueType, VisitorAttributes,
    VisitorAttributesBuilder,
};

pub use operator::{Operator, ValueShape};

pub use condition::{Condition, ConditionLogic, ConditionValue, ScalarValue};

pub use action::{ActionKind, RuleAction, Variant};

pub use rule::{Rule, RuleBuilder, RuleId, RuleStatus};

pub use splitter::{compute_visitor_key, TrafficSplitter, WeightedBucket};

pub use matcher::match_rule;

pub use resolver::{resolve, Resolution};

pub use validator::{
    RuleSetValidator, ValidationError, ValidationIssue, ValidationResult, ValidationWarning,
};

pub use rule_set::{ParseError, RuleSet, RuleSetParser, RuleSetStore};

pub use engine::{Decision, DecisionEngine, RuleTester};
