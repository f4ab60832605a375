// Static catalog of comparison operators.
//
// Every operator declares the shape of value it expects. That shape is the
// single source of truth consumed by both the condition evaluator and the
// rule set validator, so the authoring UI and the engine can never disagree
// about what a well-formed condition looks like.

use serde::{Deserialize, Serialize};

// ============================================================================
// VALUE SHAPE
// ============================================================================

/// Shape of the value a condition must carry for a given operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueShape {
    /// No value at all (existence checks).
    None,
    /// A single scalar (string or number).
    Single,
    /// An array of scalars (set membership).
    Array,
    /// A two-element numeric bound `[min, max]`.
    Range,
}

impl std::fmt::Display for ValueShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueShape::None => write!(f, "none"),
            ValueShape::Single => write!(f, "single"),
            ValueShape::Array => write!(f, "array"),
            ValueShape::Range => write!(f, "range"),
        }
    }
}

// ============================================================================
// OPERATOR
// ============================================================================

/// Comparison operators available to rule conditions.
///
/// Which operators are allowed for a given attribute is defined by the
/// attribute registry (`AttributeKey::supported_operators`), not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    StartsWith,
    EndsWith,
    In,
    NotIn,
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Between,
    Exists,
    NotExists,
    Regex,
    IpRange,
}

impl Operator {
    /// Returns the shape of value this operator expects.
    pub fn value_shape(&self) -> ValueShape {
        match self {
            Operator::Exists | Operator::NotExists => ValueShape::None,
            Operator::Equals
            | Operator::NotEquals
            | Operator::Contains
            | Operator::NotContains
            | Operator::StartsWith
            | Operator::EndsWith
            | Operator::GreaterThan
            | Operator::LessThan
            | Operator::GreaterEqual
            | Operator::LessEqual
            | Operator::Regex
            | Operator::IpRange => ValueShape::Single,
            Operator::In | Operator::NotIn => ValueShape::Array,
            Operator::Between => ValueShape::Range,
        }
    }

    /// Returns the wire name of this operator as a string.
    pub fn name(&self) -> &'static str {
        match self {
            Operator::Equals => "equals",
            Operator::NotEquals => "not_equals",
            Operator::Contains => "contains",
            Operator::NotContains => "not_contains",
            Operator::StartsWith => "starts_with",
            Operator::EndsWith => "ends_with",
            Operator::In => "in",
            Operator::NotIn => "not_in",
            Operator::GreaterThan => "greater_than",
            Operator::LessThan => "less_than",
            Operator::GreaterEqual => "greater_equal",
            Operator::LessEqual => "less_equal",
            Operator::Between => "between",
            Operator::Exists => "exists",
            Operator::NotExists => "not_exists",
            Operator::Regex => "regex",
            Operator::IpRange => "ip_range",
        }
    }

    /// Returns true if this operator is an existence check that is
    /// meaningful even when the attribute is absent from the snapshot.
    pub fn is_existence_check(&self) -> bool {
        matches!(self, Operator::Exists | Operator::NotExists)
    }

    /// Returns true if this operator compares numerically.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Operator::GreaterThan
                | Operator::LessThan
                | Operator::GreaterEqual
                | Operator::LessEqual
                | Operator::Between
        )
    }
}

impl std::fmt::Display for Operator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
