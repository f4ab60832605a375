// Authoring-time validation of rule sets.
//
// Runs before persistence (and defensively before evaluation in untrusted
// contexts) so that malformed rules never reach the hot path. Failures are
// reported as a full list rather than first-error-wins; the caller decides
// whether to block the save. Warnings flag intentional-looking but
// noteworthy configurations (residual control groups, shared priorities).

use crate::action::RuleAction;
use crate::operator::{Operator, ValueShape};
use crate::rule::Rule;
use crate::rule_set::RuleSet;
use ipnet::IpNet;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

// ============================================================================
// VALIDATION RESULT
// ============================================================================

/// Validation outcome with detailed errors and warnings.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: ValidationWarning) {
        self.warnings.push(warning);
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Flattens errors and warnings into `{field, message}` pairs for the
    /// rule-authoring UI.
    pub fn issues(&self) -> Vec<ValidationIssue> {
        let errors = self.errors.iter().map(|e| ValidationIssue {
            field: e.field(),
            message: e.to_string(),
        });
        let warnings = self.warnings.iter().map(|w| ValidationIssue {
            field: w.field(),
            message: w.message(),
        });
        errors.chain(warnings).collect()
    }
}

/// One reportable problem, addressed to a field path like
/// `rules[2].conditions[0].operator`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

// ============================================================================
// ERRORS AND WARNINGS
// ============================================================================

/// Validation error types. `rule` is the index of the offending rule
/// within the set; `condition` the index of the offending condition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Duplicate rule ID: {rule_id}")]
    DuplicateRuleId { rule: usize, rule_id: String },

    #[error("Operator '{operator}' is not supported by attribute '{attribute}'")]
    OperatorNotSupported {
        rule: usize,
        condition: usize,
        attribute: String,
        operator: Operator,
    },

    #[error("Operator '{operator}' expects a {expected} value")]
    ValueShapeMismatch {
        rule: usize,
        condition: usize,
        operator: Operator,
        expected: ValueShape,
    },

    #[error("query_param conditions must name a parameter")]
    MissingParam { rule: usize, condition: usize },

    #[error("Only query_param conditions may carry a parameter")]
    UnexpectedParam { rule: usize, condition: usize },

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegex {
        rule: usize,
        condition: usize,
        pattern: String,
        reason: String,
    },

    #[error("Invalid CIDR '{value}'")]
    InvalidCidr {
        rule: usize,
        condition: usize,
        value: String,
    },

    #[error("ab_test must declare at least one variant")]
    EmptyVariants { rule: usize },

    #[error("Variant '{name}' has negative weight {weight}")]
    NegativeVariantWeight {
        rule: usize,
        name: String,
        weight: f64,
    },

    #[error("Variant weights sum to {total}, which exceeds 100")]
    VariantWeightsOverAllocated { rule: usize, total: f64 },

    #[error("Percentage {percentage} is outside 0-100")]
    PercentageOutOfRange { rule: usize, percentage: f64 },

    #[error("start_date is after end_date")]
    InvalidSchedule { rule: usize },

    #[error("Default destination URL cannot be empty")]
    EmptyDefaultUrl,
}

impl ValidationError {
    /// Field path the authoring UI should attach this error to.
    pub fn field(&self) -> String {
        match self {
            ValidationError::DuplicateRuleId { rule, .. } => format!("rules[{}].id", rule),
            ValidationError::OperatorNotSupported { rule, condition, .. } => {
                format!("rules[{}].conditions[{}].operator", rule, condition)
            }
            ValidationError::ValueShapeMismatch { rule, condition, .. } => {
                format!("rules[{}].conditions[{}].value", rule, condition)
            }
            ValidationError::MissingParam { rule, condition }
            | ValidationError::UnexpectedParam { rule, condition } => {
                format!("rules[{}].conditions[{}].param", rule, condition)
            }
            ValidationError::InvalidRegex { rule, condition, .. }
            | ValidationError::InvalidCidr { rule, condition, .. } => {
                format!("rules[{}].conditions[{}].value", rule, condition)
            }
            ValidationError::EmptyVariants { rule }
            | ValidationError::VariantWeightsOverAllocated { rule, .. } => {
                format!("rules[{}].action.variants", rule)
            }
            ValidationError::NegativeVariantWeight { rule, .. } => {
                format!("rules[{}].action.variants", rule)
            }
            ValidationError::PercentageOutOfRange { rule, .. } => {
                format!("rules[{}].action.percentage", rule)
            }
            ValidationError::InvalidSchedule { rule } => format!("rules[{}].start_date", rule),
            ValidationError::EmptyDefaultUrl => "default_url".to_string(),
        }
    }
}

/// Validation warning types.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationWarning {
    /// Variant weights sum to under 100: the remainder is an implicit
    /// residual bucket falling through to the default destination. Legal,
    /// and sometimes intentional (control group), but worth surfacing.
    VariantWeightsUnderAllocated { rule: usize, total: f64 },

    /// Two rules share a priority; evaluation order between them falls
    /// back to insertion order.
    SharedPriority {
        rule_id1: String,
        rule_id2: String,
        priority: i32,
    },
}

impl ValidationWarning {
    pub fn field(&self) -> String {
        match self {
            ValidationWarning::VariantWeightsUnderAllocated { rule, .. } => {
                format!("rules[{}].action.variants", rule)
            }
            ValidationWarning::SharedPriority { .. } => "rules".to_string(),
        }
    }

    pub fn message(&self) -> String {
        match self {
            ValidationWarning::VariantWeightsUnderAllocated { total, .. } => format!(
                "Variant weights sum to {}; the remaining {}% falls through to the default destination",
                total,
                100.0 - total
            ),
            ValidationWarning::SharedPriority {
                rule_id1,
                rule_id2,
                priority,
            } => format!(
                "Rules {} and {} share priority {}; insertion order decides between them",
                rule_id1, rule_id2, priority
            ),
        }
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

/// Validates a rule set before it is persisted or evaluated.
pub struct RuleSetValidator;

impl RuleSetValidator {
    pub fn new() -> Self {
        Self
    }

    /// Full validation pass over a rule set.
    pub fn validate(&self, rule_set: &RuleSet) -> ValidationResult {
        let mut result = ValidationResult::valid();

        if rule_set.default_url.trim().is_empty() {
            result.add_error(ValidationError::EmptyDefaultUrl);
        }

        self.check_unique_ids(rule_set, &mut result);
        self.check_shared_priorities(rule_set, &mut result);

        for (index, rule) in rule_set.rules.iter().enumerate() {
            self.validate_conditions(index, rule, &mut result);
            self.validate_action(index, rule, &mut result);
            self.validate_schedule(index, rule, &mut result);
        }

        result
    }

    fn check_unique_ids(&self, rule_set: &RuleSet, result: &mut ValidationResult) {
        let mut seen = HashSet::new();
        for (index, rule) in rule_set.rules.iter().enumerate() {
            if !seen.insert(rule.id) {
                result.add_error(ValidationError::DuplicateRuleId {
                    rule: index,
                    rule_id: rule.id.to_string(),
                });
            }
        }
    }

    fn check_shared_priorities(&self, rule_set: &RuleSet, result: &mut ValidationResult) {
        let mut by_priority: HashMap<i32, Vec<&Rule>> = HashMap::new();
        for rule in &rule_set.rules {
            by_priority.entry(rule.priority).or_default().push(rule);
        }
        for (priority, rules) in by_priority {
            if rules.len() > 1 {
                result.add_warning(ValidationWarning::SharedPriority {
                    rule_id1: rules[0].id.to_string(),
                    rule_id2: rules[1].id.to_string(),
                    priority,
                });
            }
        }
    }

    fn validate_conditions(&self, index: usize, rule: &Rule, result: &mut ValidationResult) {
        for (cidx, condition) in rule.conditions.iter().enumerate() {
            // Operator/attribute pairing comes straight from the registry.
            if !condition.attribute.supports(condition.operator) {
                result.add_error(ValidationError::OperatorNotSupported {
                    rule: index,
                    condition: cidx,
                    attribute: condition.attribute.name().to_string(),
                    operator: condition.operator,
                });
            }

            // Value shape must match what the operator expects.
            let shape = condition.operator.value_shape();
            let shape_ok = match (&condition.value, shape) {
                (None, ValueShape::None) => true,
                (None, _) => false,
                (Some(_), ValueShape::None) => false,
                (Some(value), shape) => value.conforms_to(shape),
            };
            if !shape_ok {
                result.add_error(ValidationError::ValueShapeMismatch {
                    rule: index,
                    condition: cidx,
                    operator: condition.operator,
                    expected: shape,
                });
            }

            // param present iff the attribute needs one.
            let has_param = condition.param.as_deref().is_some_and(|p| !p.is_empty());
            if condition.attribute.requires_param() && !has_param {
                result.add_error(ValidationError::MissingParam {
                    rule: index,
                    condition: cidx,
                });
            }
            if !condition.attribute.requires_param() && condition.param.is_some() {
                result.add_error(ValidationError::UnexpectedParam {
                    rule: index,
                    condition: cidx,
                });
            }

            // Regex and CIDR values must compile/parse here, never at
            // evaluation time.
            if condition.operator == Operator::Regex {
                if let Some(pattern) = condition
                    .value
                    .as_ref()
                    .and_then(|v| v.as_scalar())
                    .and_then(|s| s.as_text())
                {
                    if let Err(e) = Regex::new(pattern) {
                        result.add_error(ValidationError::InvalidRegex {
                            rule: index,
                            condition: cidx,
                            pattern: pattern.to_string(),
                            reason: e.to_string(),
                        });
                    }
                }
            }
            if condition.operator == Operator::IpRange {
                if let Some(value) = condition
                    .value
                    .as_ref()
                    .and_then(|v| v.as_scalar())
                    .and_then(|s| s.as_text())
                {
                    if value.parse::<IpNet>().is_err() {
                        result.add_error(ValidationError::InvalidCidr {
                            rule: index,
                            condition: cidx,
                            value: value.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn validate_action(&self, index: usize, rule: &Rule, result: &mut ValidationResult) {
        match &rule.action {
            RuleAction::Redirect { .. } => {}
            RuleAction::PercentageRedirect { percentage, .. } => {
                if !(0.0..=100.0).contains(percentage) {
                    result.add_error(ValidationError::PercentageOutOfRange {
                        rule: index,
                        percentage: *percentage,
                    });
                }
            }
            RuleAction::AbTest { variants } => {
                if variants.is_empty() {
                    result.add_error(ValidationError::EmptyVariants { rule: index });
                    return;
                }
                let mut total = 0.0;
                for variant in variants {
                    if variant.percentage < 0.0 {
                        result.add_error(ValidationError::NegativeVariantWeight {
                            rule: index,
                            name: variant.name.clone(),
                            weight: variant.percentage,
                        });
                    } else {
                        total += variant.percentage;
                    }
                }
                if total > 100.0 {
                    result.add_error(ValidationError::VariantWeightsOverAllocated {
                        rule: index,
                        total,
                    });
                } else if total < 100.0 {
                    result.add_warning(ValidationWarning::VariantWeightsUnderAllocated {
                        rule: index,
                        total,
                    });
                }
            }
        }
    }

    fn validate_schedule(&self, index: usize, rule: &Rule, result: &mut ValidationResult) {
        if let (Some(start), Some(end)) = (rule.start_date, rule.end_date) {
            if start > end {
                result.add_error(ValidationError::InvalidSchedule { rule: index });
            }
        }
    }
}

impl Default for RuleSetValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Variant;
    use crate::attribute::AttributeKey;
    use crate::condition::{Condition, ConditionValue};
    use chrono::{Duration, Utc};

    fn redirect(url: &str) -> RuleAction {
        RuleAction::Redirect {
            url: url.to_string(),
        }
    }

    fn set_with(rule: Rule) -> RuleSet {
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(rule);
        set
    }

    fn validate(set: &RuleSet) -> ValidationResult {
        RuleSetValidator::new().validate(set)
    }

    #[test]
    fn clean_set_passes() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::Country,
                Operator::Equals,
                Some(ConditionValue::single("US")),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(result.valid, "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn rejects_unsupported_operator() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::Country,
                Operator::GreaterThan,
                Some(ConditionValue::single(5.0)),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(!result.valid);
        assert!(matches!(
            result.errors[0],
            ValidationError::OperatorNotSupported { .. }
        ));
    }

    #[test]
    fn rejects_value_shape_mismatch() {
        // `in` needs an array, not a scalar.
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::Country,
                Operator::In,
                Some(ConditionValue::single("US")),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::ValueShapeMismatch { .. })));
    }

    #[test]
    fn rejects_value_on_existence_check() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::Country,
                Operator::Exists,
                Some(ConditionValue::single("US")),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(!result.valid);
    }

    #[test]
    fn rejects_bad_between_range() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::HourOfDay,
                Operator::Between,
                Some(ConditionValue::list([9.0, 12.0, 17.0])),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::ValueShapeMismatch { .. })));
    }

    #[test]
    fn query_param_needs_param() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::QueryParam,
                Operator::Equals,
                Some(ConditionValue::single("newsletter")),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::MissingParam { .. })));
    }

    #[test]
    fn param_on_other_attribute_is_rejected() {
        let mut condition = Condition::new(
            AttributeKey::Country,
            Operator::Equals,
            Some(ConditionValue::single("US")),
        );
        condition.param = Some("utm_source".to_string());
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(condition)
            .build();
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::UnexpectedParam { .. })));
    }

    #[test]
    fn invalid_regex_is_an_authoring_error() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::UrlPath,
                Operator::Regex,
                Some(ConditionValue::single("[unclosed")),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidRegex { .. })));
    }

    #[test]
    fn invalid_cidr_is_rejected() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::IpAddress,
                Operator::IpRange,
                Some(ConditionValue::single("999.0.0.0/8")),
            ))
            .build();
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidCidr { .. })));
    }

    #[test]
    fn duplicate_rule_ids_are_rejected() {
        let rule = Rule::new(redirect("https://x.example"));
        let mut twin = rule.clone();
        twin.priority = 50;
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(rule);
        set.add_rule(twin);
        let result = validate(&set);
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::DuplicateRuleId { .. })));
    }

    #[test]
    fn over_allocated_variants_are_an_error() {
        let rule = Rule::new(RuleAction::AbTest {
            variants: vec![
                Variant::new("A", 70.0, "https://a.example"),
                Variant::new("B", 60.0, "https://b.example"),
            ],
        });
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::VariantWeightsOverAllocated { .. })));
    }

    #[test]
    fn under_allocated_variants_are_a_warning_not_an_error() {
        let rule = Rule::new(RuleAction::AbTest {
            variants: vec![
                Variant::new("A", 40.0, "https://a.example"),
                Variant::new("B", 40.0, "https://b.example"),
            ],
        });
        let result = validate(&set_with(rule));
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ValidationWarning::VariantWeightsUnderAllocated { .. })));
    }

    #[test]
    fn negative_variant_weight_is_rejected() {
        let rule = Rule::new(RuleAction::AbTest {
            variants: vec![Variant::new("A", -5.0, "https://a.example")],
        });
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::NegativeVariantWeight { .. })));
    }

    #[test]
    fn percentage_out_of_range_is_rejected() {
        let rule = Rule::new(RuleAction::PercentageRedirect {
            url: "https://x.example".to_string(),
            percentage: 130.0,
        });
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::PercentageOutOfRange { .. })));
    }

    #[test]
    fn inverted_schedule_is_rejected() {
        let now = Utc::now();
        let rule = Rule::builder(redirect("https://x.example"))
            .start_date(now)
            .end_date(now - Duration::days(1))
            .build();
        let result = validate(&set_with(rule));
        assert!(result
            .errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidSchedule { .. })));
    }

    #[test]
    fn empty_default_url_is_rejected() {
        let set = RuleSet::new("rs", "  ");
        let result = validate(&set);
        assert!(result.errors.contains(&ValidationError::EmptyDefaultUrl));
    }

    #[test]
    fn shared_priorities_warn() {
        let mut set = RuleSet::new("rs", "https://default.example");
        set.add_rule(Rule::builder(redirect("https://a.example")).priority(7).build());
        set.add_rule(Rule::builder(redirect("https://b.example")).priority(7).build());
        let result = validate(&set);
        assert!(result.valid);
        assert!(result
            .warnings
            .iter()
            .any(|w| matches!(w, ValidationWarning::SharedPriority { .. })));
    }

    #[test]
    fn issues_carry_field_paths() {
        let rule = Rule::builder(redirect("https://x.example"))
            .condition(Condition::new(
                AttributeKey::QueryParam,
                Operator::Equals,
                Some(ConditionValue::single("x")),
            ))
            .build();
        let result = validate(&set_with(rule));
        let issues = result.issues();
        assert!(issues
            .iter()
            .any(|i| i.field == "rules[0].conditions[0].param"));
    }
}
