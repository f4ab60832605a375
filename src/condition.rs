// Condition evaluation against a visitor attribute snapshot.
//
// Evaluation is deliberately infallible: a missing attribute, a type
// mismatch, or a pattern that fails to compile all degrade to `false`
// instead of erroring, so one malformed condition can never take down
// redirect serving. Malformed conditions are the validator's problem at
// authoring time, not the hot path's.

use crate::attribute::{AttributeKey, AttributeValue, VisitorAttributes};
use crate::operator::{Operator, ValueShape};
use ipnet::IpNet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

// ============================================================================
// CONDITION VALUES
// ============================================================================

/// A single scalar authored into a condition.
///
/// Untagged: JSON numbers become `Number`, JSON strings become `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Number(f64),
    Text(String),
}

impl ScalarValue {
    /// Returns the scalar as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(s) => Some(s),
            ScalarValue::Number(_) => None,
        }
    }

    /// Returns the scalar as a number, coercing numeric text.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScalarValue::Number(n) => Some(*n),
            ScalarValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl From<&str> for ScalarValue {
    fn from(s: &str) -> Self {
        ScalarValue::Text(s.to_string())
    }
}

impl From<f64> for ScalarValue {
    fn from(n: f64) -> Self {
        ScalarValue::Number(n)
    }
}

/// The value carried by a condition: a scalar or a list of scalars.
///
/// Range operators (`between`) read a two-element numeric list; the
/// validator enforces that shape at authoring time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Single(ScalarValue),
    Many(Vec<ScalarValue>),
}

impl ConditionValue {
    pub fn single(v: impl Into<ScalarValue>) -> Self {
        ConditionValue::Single(v.into())
    }

    pub fn list<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ScalarValue>,
    {
        ConditionValue::Many(values.into_iter().map(Into::into).collect())
    }

    pub fn range(min: f64, max: f64) -> Self {
        ConditionValue::Many(vec![ScalarValue::Number(min), ScalarValue::Number(max)])
    }

    pub fn as_scalar(&self) -> Option<&ScalarValue> {
        match self {
            ConditionValue::Single(s) => Some(s),
            ConditionValue::Many(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ScalarValue]> {
        match self {
            ConditionValue::Many(list) => Some(list),
            ConditionValue::Single(_) => None,
        }
    }

    /// Interprets the value as an inclusive `[min, max]` bound.
    pub fn as_range(&self) -> Option<(f64, f64)> {
        let list = self.as_list()?;
        if list.len() != 2 {
            return None;
        }
        Some((list[0].as_number()?, list[1].as_number()?))
    }

    /// Checks whether this value conforms to the given shape.
    pub fn conforms_to(&self, shape: ValueShape) -> bool {
        match shape {
            ValueShape::None => false, // a shape-None operator carries no value at all
            ValueShape::Single => self.as_scalar().is_some(),
            ValueShape::Array => self.as_list().is_some_and(|l| !l.is_empty()),
            ValueShape::Range => self.as_range().is_some(),
        }
    }
}

// ============================================================================
// CONDITION
// ============================================================================

/// One attribute/operator/value test within a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// Which visitor attribute to test.
    pub attribute: AttributeKey,
    /// How to compare it.
    pub operator: Operator,
    /// The authored comparison value. Absent for existence checks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ConditionValue>,
    /// Query parameter name. Present iff `attribute == query_param`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl Condition {
    pub fn new(attribute: AttributeKey, operator: Operator, value: Option<ConditionValue>) -> Self {
        Self {
            attribute,
            operator,
            value,
            param: None,
        }
    }

    /// Condition on a named query parameter.
    pub fn on_query_param(
        param: impl Into<String>,
        operator: Operator,
        value: Option<ConditionValue>,
    ) -> Self {
        Self {
            attribute: AttributeKey::QueryParam,
            operator,
            value,
            param: Some(param.into()),
        }
    }

    /// Evaluates this condition against a visitor snapshot.
    ///
    /// Never errors. A missing attribute value is a non-match for every
    /// operator except `not_exists`; type mismatches evaluate to `false`.
    pub fn evaluate(&self, attrs: &VisitorAttributes) -> bool {
        let actual = attrs.resolve(self.attribute, self.param.as_deref());

        // Existence checks are meaningful without a resolved value.
        match self.operator {
            Operator::Exists => return actual.is_some(),
            Operator::NotExists => return actual.is_none(),
            _ => {}
        }

        let actual = match actual {
            Some(v) => v,
            None => return false,
        };
        let value = match &self.value {
            Some(v) => v,
            None => return false,
        };

        match self.operator {
            Operator::Equals => Self::scalar_eq(&actual, value),
            Operator::NotEquals => value.as_scalar().is_some() && !Self::scalar_eq(&actual, value),
            Operator::Contains => Self::text_test(&actual, value, |s, sub| s.contains(sub)),
            Operator::NotContains => {
                Self::both_text(&actual, value) && !Self::text_test(&actual, value, |s, sub| s.contains(sub))
            }
            Operator::StartsWith => Self::text_test(&actual, value, |s, p| s.starts_with(p)),
            Operator::EndsWith => Self::text_test(&actual, value, |s, p| s.ends_with(p)),
            Operator::In => Self::in_list(&actual, value),
            Operator::NotIn => value.as_list().is_some() && !Self::in_list(&actual, value),
            Operator::GreaterThan => Self::numeric_test(&actual, value, |a, b| a > b),
            Operator::LessThan => Self::numeric_test(&actual, value, |a, b| a < b),
            Operator::GreaterEqual => Self::numeric_test(&actual, value, |a, b| a >= b),
            Operator::LessEqual => Self::numeric_test(&actual, value, |a, b| a <= b),
            Operator::Between => Self::between(&actual, value),
            Operator::Regex => Self::regex_match(&actual, value),
            Operator::IpRange => Self::ip_range(&actual, value),
            Operator::Exists | Operator::NotExists => unreachable!(),
        }
    }

    /// Exact match for text, epsilon equality for numbers. Numeric text is
    /// coerced so `hour_of_day equals "14"` behaves the same as `14`.
    fn scalar_eq(actual: &AttributeValue, value: &ConditionValue) -> bool {
        let expected = match value.as_scalar() {
            Some(s) => s,
            None => return false,
        };
        Self::eq_one(actual, expected)
    }

    fn eq_one(actual: &AttributeValue, expected: &ScalarValue) -> bool {
        match (actual, expected) {
            (AttributeValue::Text(a), ScalarValue::Text(b)) => a == b,
            _ => match (actual.as_number(), expected.as_number()) {
                (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
                _ => false,
            },
        }
    }

    fn both_text(actual: &AttributeValue, value: &ConditionValue) -> bool {
        actual.as_text().is_some() && value.as_scalar().and_then(ScalarValue::as_text).is_some()
    }

    /// Substring tests apply to text attributes only; anything else is a
    /// non-match.
    fn text_test(
        actual: &AttributeValue,
        value: &ConditionValue,
        test: impl Fn(&str, &str) -> bool,
    ) -> bool {
        let s = match actual.as_text() {
            Some(s) => s,
            None => return false,
        };
        let expected = match value.as_scalar().and_then(ScalarValue::as_text) {
            Some(e) => e,
            None => return false,
        };
        test(s, expected)
    }

    fn in_list(actual: &AttributeValue, value: &ConditionValue) -> bool {
        match value.as_list() {
            Some(list) => list.iter().any(|item| Self::eq_one(actual, item)),
            None => false,
        }
    }

    fn numeric_test(
        actual: &AttributeValue,
        value: &ConditionValue,
        cmp: impl Fn(f64, f64) -> bool,
    ) -> bool {
        let a = match actual.as_number() {
            Some(n) => n,
            None => return false,
        };
        let b = match value.as_scalar().and_then(ScalarValue::as_number) {
            Some(n) => n,
            None => return false,
        };
        cmp(a, b)
    }

    /// Inclusive `[min, max]` check.
    fn between(actual: &AttributeValue, value: &ConditionValue) -> bool {
        let n = match actual.as_number() {
            Some(n) => n,
            None => return false,
        };
        match value.as_range() {
            Some((min, max)) => n >= min && n <= max,
            None => false,
        }
    }

    /// Invalid patterns are an authoring-time error; at evaluation time
    /// they simply never match.
    fn regex_match(actual: &AttributeValue, value: &ConditionValue) -> bool {
        let s = match actual.as_text() {
            Some(s) => s,
            None => return false,
        };
        let pattern = match value.as_scalar().and_then(ScalarValue::as_text) {
            Some(p) => p,
            None => return false,
        };
        match Regex::new(pattern) {
            Ok(re) => re.is_match(s),
            Err(_) => false,
        }
    }

    /// CIDR containment against `ip_address`.
    fn ip_range(actual: &AttributeValue, value: &ConditionValue) -> bool {
        let ip: IpAddr = match actual.as_text().and_then(|s| s.parse().ok()) {
            Some(ip) => ip,
            None => return false,
        };
        let net: IpNet = match value
            .as_scalar()
            .and_then(ScalarValue::as_text)
            .and_then(|s| s.parse().ok())
        {
            Some(net) => net,
            None => return false,
        };
        net.contains(&ip)
    }
}

// ============================================================================
// LOGIC COMBINATOR
// ============================================================================

/// AND/OR combinator over a rule's conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionLogic {
    And,
    Or,
}

impl Default for ConditionLogic {
    fn default() -> Self {
        ConditionLogic::And
    }
}

impl ConditionLogic {
    /// Combines the outcomes of all conditions into one boolean.
    ///
    /// An empty condition list is an unconditional match (catch-all rule).
    /// Short-circuits: AND stops at the first false, OR at the first true.
    pub fn combine(&self, conditions: &[Condition], attrs: &VisitorAttributes) -> bool {
        if conditions.is_empty() {
            return true;
        }
        match self {
            ConditionLogic::And => conditions.iter().all(|c| c.evaluate(attrs)),
            ConditionLogic::Or => conditions.iter().any(|c| c.evaluate(attrs)),
        }
    }
}

impl std::fmt::Display for ConditionLogic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionLogic::And => write!(f, "AND"),
            ConditionLogic::Or => write!(f, "OR"),
        }
    }
}
