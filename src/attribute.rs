// Static registry of evaluable visitor attributes and the request-scoped
// snapshot they are resolved from.
//
// The registry is the single source of truth for which operators each
// attribute supports and what value type it carries. Both the condition
// evaluator and the rule set validator consult it, so the authoring UI can
// restrict operator choices without duplicating compatibility rules.

use crate::operator::Operator;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// ATTRIBUTE KEY - THE REGISTRY
// ============================================================================

/// A named, typed fact about a visitor request.
///
/// Attributes are immutable and defined once; an unknown key simply does
/// not deserialize. `QueryParam` is the only parameterized attribute: a
/// condition on it must also carry the parameter name to look up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKey {
    Country,
    Region,
    City,
    DeviceType,
    DeviceBrand,
    DeviceModel,
    BrowserName,
    BrowserVersion,
    OsName,
    OsVersion,
    Referrer,
    ReferrerDomain,
    HourOfDay,
    DayOfWeek,
    Language,
    UrlPath,
    QueryParam,
    UserAgent,
    IpAddress,
}

/// Value type an attribute resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    String,
    Number,
}

/// Grouping for the authoring UI. Not semantically load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeCategory {
    Geo,
    Device,
    Browser,
    Time,
    Request,
    Network,
}

// Operator sets shared by attributes of the same value type. Kept as
// statics so `supported_operators` can hand out a slice without allocating.
const STRING_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::Contains,
    Operator::NotContains,
    Operator::StartsWith,
    Operator::EndsWith,
    Operator::In,
    Operator::NotIn,
    Operator::Regex,
    Operator::Exists,
    Operator::NotExists,
];

const NUMBER_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::GreaterThan,
    Operator::LessThan,
    Operator::GreaterEqual,
    Operator::LessEqual,
    Operator::Between,
    Operator::In,
    Operator::NotIn,
    Operator::Exists,
    Operator::NotExists,
];

const IP_OPERATORS: &[Operator] = &[
    Operator::Equals,
    Operator::NotEquals,
    Operator::In,
    Operator::NotIn,
    Operator::IpRange,
    Operator::Exists,
    Operator::NotExists,
];

impl AttributeKey {
    /// All registered attributes, in UI display order.
    pub fn all() -> &'static [AttributeKey] {
        &[
            AttributeKey::Country,
            AttributeKey::Region,
            AttributeKey::City,
            AttributeKey::DeviceType,
            AttributeKey::DeviceBrand,
            AttributeKey::DeviceModel,
            AttributeKey::BrowserName,
            AttributeKey::BrowserVersion,
            AttributeKey::OsName,
            AttributeKey::OsVersion,
            AttributeKey::Referrer,
            AttributeKey::ReferrerDomain,
            AttributeKey::HourOfDay,
            AttributeKey::DayOfWeek,
            AttributeKey::Language,
            AttributeKey::UrlPath,
            AttributeKey::QueryParam,
            AttributeKey::UserAgent,
            AttributeKey::IpAddress,
        ]
    }

    /// Returns the value type this attribute resolves to.
    pub fn value_type(&self) -> ValueType {
        match self {
            AttributeKey::HourOfDay | AttributeKey::DayOfWeek => ValueType::Number,
            _ => ValueType::String,
        }
    }

    /// Returns the UI grouping category.
    pub fn category(&self) -> AttributeCategory {
        match self {
            AttributeKey::Country | AttributeKey::Region | AttributeKey::City => {
                AttributeCategory::Geo
            }
            AttributeKey::DeviceType | AttributeKey::DeviceBrand | AttributeKey::DeviceModel => {
                AttributeCategory::Device
            }
            AttributeKey::BrowserName
            | AttributeKey::BrowserVersion
            | AttributeKey::OsName
            | AttributeKey::OsVersion
            | AttributeKey::UserAgent => AttributeCategory::Browser,
            AttributeKey::HourOfDay | AttributeKey::DayOfWeek => AttributeCategory::Time,
            AttributeKey::Referrer
            | AttributeKey::ReferrerDomain
            | AttributeKey::Language
            | AttributeKey::UrlPath
            | AttributeKey::QueryParam => AttributeCategory::Request,
            AttributeKey::IpAddress => AttributeCategory::Network,
        }
    }

    /// Returns the set of operators this attribute supports.
    pub fn supported_operators(&self) -> &'static [Operator] {
        match self {
            AttributeKey::IpAddress => IP_OPERATORS,
            key if key.value_type() == ValueType::Number => NUMBER_OPERATORS,
            _ => STRING_OPERATORS,
        }
    }

    /// Returns true if this operator is allowed for this attribute.
    pub fn supports(&self, operator: Operator) -> bool {
        self.supported_operators().contains(&operator)
    }

    /// Returns true if conditions on this attribute must carry a parameter
    /// name. Only `query_param` does.
    pub fn requires_param(&self) -> bool {
        matches!(self, AttributeKey::QueryParam)
    }

    /// Returns the wire name of this attribute.
    pub fn name(&self) -> &'static str {
        match self {
            AttributeKey::Country => "country",
            AttributeKey::Region => "region",
            AttributeKey::City => "city",
            AttributeKey::DeviceType => "device_type",
            AttributeKey::DeviceBrand => "device_brand",
            AttributeKey::DeviceModel => "device_model",
            AttributeKey::BrowserName => "browser_name",
            AttributeKey::BrowserVersion => "browser_version",
            AttributeKey::OsName => "os_name",
            AttributeKey::OsVersion => "os_version",
            AttributeKey::Referrer => "referrer",
            AttributeKey::ReferrerDomain => "referrer_domain",
            AttributeKey::HourOfDay => "hour_of_day",
            AttributeKey::DayOfWeek => "day_of_week",
            AttributeKey::Language => "language",
            AttributeKey::UrlPath => "url_path",
            AttributeKey::QueryParam => "query_param",
            AttributeKey::UserAgent => "user_agent",
            AttributeKey::IpAddress => "ip_address",
        }
    }
}

impl std::fmt::Display for AttributeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// ============================================================================
// ATTRIBUTE VALUE
// ============================================================================

/// A resolved attribute value at evaluation time.
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Number(f64),
}

impl AttributeValue {
    /// Returns the value as text, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(s) => Some(s),
            AttributeValue::Number(_) => None,
        }
    }

    /// Returns the value as a number. Text that parses cleanly as a number
    /// is coerced, so a condition authored against `hour_of_day` still
    /// works if the upstream layer stringified it.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

// ============================================================================
// VISITOR ATTRIBUTES - THE REQUEST SNAPSHOT
// ============================================================================

/// The read-only, request-scoped snapshot evaluated against conditions.
///
/// Assembled once per request by the request-handling layer (geo/device/UA
/// parsing is out of scope; the engine trusts whatever is handed to it) and
/// never mutated. Absent fields are simply `None` and evaluate as
/// non-matches for everything except `not_exists`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitorAttributes {
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub device_brand: Option<String>,
    pub device_model: Option<String>,
    pub browser_name: Option<String>,
    pub browser_version: Option<String>,
    pub os_name: Option<String>,
    pub os_version: Option<String>,
    pub referrer: Option<String>,
    pub referrer_domain: Option<String>,
    /// Hour of day, 0-23.
    pub hour_of_day: Option<u8>,
    /// Day of week, 0-6.
    pub day_of_week: Option<u8>,
    pub language: Option<String>,
    pub url_path: Option<String>,
    #[serde(default)]
    pub query_params: HashMap<String, String>,
    pub user_agent: Option<String>,
    pub ip_address: Option<String>,
    /// Optional stable visitor identity (cookie/session id) supplied by the
    /// upstream layer. When present it takes precedence over IP+UA as the
    /// traffic splitter key, so rollout assignment survives IP churn.
    pub visitor_id: Option<String>,
}

impl VisitorAttributes {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for step-by-step construction.
    pub fn builder() -> VisitorAttributesBuilder {
        VisitorAttributesBuilder::default()
    }

    /// Resolves the current value of an attribute from this snapshot.
    ///
    /// For `query_param`, `param` names the query parameter to look up; a
    /// missing param yields `None`. An empty string is still a present
    /// value (distinct from absent).
    pub fn resolve(&self, key: AttributeKey, param: Option<&str>) -> Option<AttributeValue> {
        let text = |v: &Option<String>| v.clone().map(AttributeValue::Text);
        match key {
            AttributeKey::Country => text(&self.country),
            AttributeKey::Region => text(&self.region),
            AttributeKey::City => text(&self.city),
            AttributeKey::DeviceType => text(&self.device_type),
            AttributeKey::DeviceBrand => text(&self.device_brand),
            AttributeKey::DeviceModel => text(&self.device_model),
            AttributeKey::BrowserName => text(&self.browser_name),
            AttributeKey::BrowserVersion => text(&self.browser_version),
            AttributeKey::OsName => text(&self.os_name),
            AttributeKey::OsVersion => text(&self.os_version),
            AttributeKey::Referrer => text(&self.referrer),
            AttributeKey::ReferrerDomain => text(&self.referrer_domain),
            AttributeKey::HourOfDay => self.hour_of_day.map(|h| AttributeValue::Number(h as f64)),
            AttributeKey::DayOfWeek => self.day_of_week.map(|d| AttributeValue::Number(d as f64)),
            AttributeKey::Language => text(&self.language),
            AttributeKey::UrlPath => text(&self.url_path),
            AttributeKey::QueryParam => param
                .and_then(|p| self.query_params.get(p))
                .map(|v| AttributeValue::Text(v.clone())),
            AttributeKey::UserAgent => text(&self.user_agent),
            AttributeKey::IpAddress => text(&self.ip_address),
        }
    }
}

/// Builder for `VisitorAttributes`.
#[derive(Debug, Default)]
pub struct VisitorAttributesBuilder {
    inner: VisitorAttributes,
}

impl VisitorAttributesBuilder {
    pub fn country(mut self, v: impl Into<String>) -> Self {
        self.inner.country = Some(v.into());
        self
    }
    pub fn region(mut self, v: impl Into<String>) -> Self {
        self.inner.region = Some(v.into());
        self
    }
    pub fn city(mut self, v: impl Into<String>) -> Self {
        self.inner.city = Some(v.into());
        self
    }
    pub fn device_type(mut self, v: impl Into<String>) -> Self {
        self.inner.device_type = Some(v.into());
        self
    }
    pub fn device_brand(mut self, v: impl Into<String>) -> Self {
        self.inner.device_brand = Some(v.into());
        self
    }
    pub fn device_model(mut self, v: impl Into<String>) -> Self {
        self.inner.device_model = Some(v.into());
        self
    }
    pub fn browser_name(mut self, v: impl Into<String>) -> Self {
        self.inner.browser_name = Some(v.into());
        self
    }
    pub fn browser_version(mut self, v: impl Into<String>) -> Self {
        self.inner.browser_version = Some(v.into());
        self
    }
    pub fn os_name(mut self, v: impl Into<String>) -> Self {
        self.inner.os_name = Some(v.into());
        self
    }
    pub fn os_version(mut self, v: impl Into<String>) -> Self {
        self.inner.os_version = Some(v.into());
        self
    }
    pub fn referrer(mut self, v: impl Into<String>) -> Self {
        self.inner.referrer = Some(v.into());
        self
    }
    pub fn referrer_domain(mut self, v: impl Into<String>) -> Self {
        self.inner.referrer_domain = Some(v.into());
        self
    }
    pub fn hour_of_day(mut self, v: u8) -> Self {
        self.inner.hour_of_day = Some(v);
        self
    }
    pub fn day_of_week(mut self, v: u8) -> Self {
        self.inner.day_of_week = Some(v);
        self
    }
    pub fn language(mut self, v: impl Into<String>) -> Self {
        self.inner.language = Some(v.into());
        self
    }
    pub fn url_path(mut self, v: impl Into<String>) -> Self {
        self.inner.url_path = Some(v.into());
        self
    }
    pub fn query_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inner.query_params.insert(name.into(), value.into());
        self
    }
    pub fn user_agent(mut self, v: impl Into<String>) -> Self {
        self.inner.user_agent = Some(v.into());
        self
    }
    pub fn ip_address(mut self, v: impl Into<String>) -> Self {
        self.inner.ip_address = Some(v.into());
        self
    }
    pub fn visitor_id(mut self, v: impl Into<String>) -> Self {
        self.inner.visitor_id = Some(v.into());
        self
    }

    pub fn build(self) -> VisitorAttributes {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_operator_pairings() {
        assert!(AttributeKey::Country.supports(Operator::Equals));
        assert!(AttributeKey::Country.supports(Operator::Regex));
        assert!(!AttributeKey::Country.supports(Operator::GreaterThan));
        assert!(AttributeKey::HourOfDay.supports(Operator::Between));
        assert!(!AttributeKey::HourOfDay.supports(Operator::Contains));
        assert!(AttributeKey::IpAddress.supports(Operator::IpRange));
        assert!(!AttributeKey::Country.supports(Operator::IpRange));
    }

    #[test]
    fn only_query_param_requires_param() {
        for key in AttributeKey::all() {
            assert_eq!(key.requires_param(), *key == AttributeKey::QueryParam);
        }
    }

    #[test]
    fn value_types() {
        assert_eq!(AttributeKey::HourOfDay.value_type(), ValueType::Number);
        assert_eq!(AttributeKey::DayOfWeek.value_type(), ValueType::Number);
        assert_eq!(AttributeKey::Country.value_type(), ValueType::String);
    }

    #[test]
    fn resolve_basic_fields() {
        let attrs = VisitorAttributes::builder()
            .country("US")
            .hour_of_day(14)
            .build();
        assert_eq!(
            attrs.resolve(AttributeKey::Country, None),
            Some(AttributeValue::Text("US".to_string()))
        );
        assert_eq!(
            attrs.resolve(AttributeKey::HourOfDay, None),
            Some(AttributeValue::Number(14.0))
        );
        assert_eq!(attrs.resolve(AttributeKey::City, None), None);
    }

    #[test]
    fn resolve_query_param() {
        let attrs = VisitorAttributes::builder()
            .query_param("utm_source", "newsletter")
            .query_param("empty", "")
            .build();
        assert_eq!(
            attrs.resolve(AttributeKey::QueryParam, Some("utm_source")),
            Some(AttributeValue::Text("newsletter".to_string()))
        );
        // Empty string is present, not absent.
        assert_eq!(
            attrs.resolve(AttributeKey::QueryParam, Some("empty")),
            Some(AttributeValue::Text(String::new()))
        );
        assert_eq!(attrs.resolve(AttributeKey::QueryParam, Some("missing")), None);
        assert_eq!(attrs.resolve(AttributeKey::QueryParam, None), None);
    }

    #[test]
    fn number_coercion_from_text() {
        assert_eq!(AttributeValue::Text("12".to_string()).as_number(), Some(12.0));
        assert_eq!(AttributeValue::Text("mobile".to_string()).as_number(), None);
        assert_eq!(AttributeValue::Number(3.5).as_number(), Some(3.5));
    }

    #[test]
    fn serde_wire_names() {
        let key: AttributeKey = serde_json::from_str("\"device_type\"").unwrap();
        assert_eq!(key, AttributeKey::DeviceType);
        assert_eq!(serde_json::to_string(&AttributeKey::QueryParam).unwrap(), "\"query_param\"");
    }
}
