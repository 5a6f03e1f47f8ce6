//! Attribute-type descriptors
//!
//! Every resource type publishes a [`ResourceSchema`]. The descriptor is the
//! single source for the orchestrator's schema call, for configuration
//! validation, for immutability checks during Update and for the
//! per-attribute drift merge.

use super::value::is_unknown_json;
use crate::api::error::{Phase, ProviderError};
use serde::Serialize;
use serde_json::Value;

/// Which value wins when observed state is written back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftPolicy {
    /// Mutable fields: plan when known, else prior (Read takes the API)
    PlanWins,
    /// Identifiers: never replaced once recorded
    PriorWins,
    /// Server-computed fields: the API echo when present
    ApiEcho,
    /// Fields the API does not echo: plan when known, else prior
    PlanOrPrior,
}

/// Leaf and composite attribute types
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttrType {
    String,
    Bool,
    Int64,
    Enum {
        values: Vec<&'static str>,
        /// Alternative spellings, positionally mapped onto `values`
        #[serde(skip_serializing_if = "Vec::is_empty")]
        aliases: Vec<&'static str>,
    },
    List { element: Box<AttrType> },
    /// Unordered list; compared with set equality
    Set { element: Box<AttrType> },
    Object { attributes: Vec<Attribute> },
}

impl AttrType {
    pub fn enumeration(values: &[&'static str]) -> Self {
        Self::Enum {
            values: values.to_vec(),
            aliases: Vec::new(),
        }
    }

    pub fn enumeration_with_aliases(values: &[&'static str], aliases: &[&'static str]) -> Self {
        Self::Enum {
            values: values.to_vec(),
            aliases: aliases.to_vec(),
        }
    }

    /// Wire spelling of an enum member, if `value` names one
    pub fn canonical_member(&self, value: &str) -> Option<&'static str> {
        match self {
            Self::Enum { values, aliases } => super::translate::canonical(value, values, aliases),
            _ => None,
        }
    }

    pub fn list(element: AttrType) -> Self {
        Self::List {
            element: Box::new(element),
        }
    }

    pub fn set(element: AttrType) -> Self {
        Self::Set {
            element: Box::new(element),
        }
    }

    pub fn object(attributes: Vec<Attribute>) -> Self {
        Self::Object { attributes }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, Self::List { .. } | Self::Set { .. })
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::String => "a string",
            Self::Bool => "a boolean",
            Self::Int64 => "an integer",
            Self::Enum { .. } => "one of the allowed values",
            Self::List { .. } | Self::Set { .. } => "a list",
            Self::Object { .. } => "an object",
        }
    }
}

/// Whether the user, the API, or both supply the value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Required,
    Optional,
    Computed,
    OptionalComputed,
}

/// One attribute of a resource or nested object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: AttrType,
    pub requirement: Requirement,
    pub sensitive: bool,
    /// Changing it requires replacement; Update rejects a change
    pub immutable: bool,
    pub drift: DriftPolicy,
    pub description: &'static str,
}

impl Attribute {
    pub fn new(name: &'static str, ty: AttrType) -> Self {
        Self {
            name,
            ty,
            requirement: Requirement::Optional,
            sensitive: false,
            immutable: false,
            drift: DriftPolicy::PlanWins,
            description: "",
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, AttrType::String)
    }

    pub fn bool(name: &'static str) -> Self {
        Self::new(name, AttrType::Bool)
    }

    pub fn int64(name: &'static str) -> Self {
        Self::new(name, AttrType::Int64)
    }

    pub fn enumeration(name: &'static str, values: &[&'static str]) -> Self {
        Self::new(name, AttrType::enumeration(values))
    }

    pub fn object(name: &'static str, attributes: Vec<Attribute>) -> Self {
        Self::new(name, AttrType::object(attributes))
    }

    /// Opaque id allocated by the API
    pub fn id() -> Self {
        Self::string("id")
            .computed()
            .policy(DriftPolicy::PriorWins)
            .describe("Identifier allocated by the API")
    }

    /// Canonical URI of the resource
    pub fn uri() -> Self {
        Self::string("uri")
            .computed()
            .policy(DriftPolicy::PriorWins)
            .describe("Canonical URI of the resource")
    }

    pub fn name() -> Self {
        Self::string("name").required().describe("Resource name")
    }

    pub fn location() -> Self {
        Self::string("location")
            .required()
            .immutable()
            .policy(DriftPolicy::PlanOrPrior)
            .describe("Region tag, e.g. ITBG-Bergamo")
    }

    pub fn tags() -> Self {
        Self::new("tags", AttrType::set(AttrType::String)).describe("Free-form tags")
    }

    /// Short id of the parent a resource lives under
    pub fn parent(name: &'static str) -> Self {
        Self::string(name)
            .required()
            .immutable()
            .policy(DriftPolicy::PriorWins)
    }

    /// Backend lifecycle state
    pub fn status() -> Self {
        Self::string("status")
            .computed()
            .policy(DriftPolicy::ApiEcho)
            .describe("Last state reported by the API")
    }

    /// Canonical URI (or short id) of another resource
    pub fn uri_ref(name: &'static str) -> Self {
        Self::string(name).policy(DriftPolicy::PlanOrPrior)
    }

    /// Billed per hour, month or year; the API picks a default when unset
    pub fn billing_period() -> Self {
        use super::translate::{BILLING_PERIODS, BILLING_PERIOD_ALIASES};
        Self::new(
            "billing_period",
            AttrType::enumeration_with_aliases(BILLING_PERIODS, BILLING_PERIOD_ALIASES),
        )
        .optional_computed()
        .immutable()
            .policy(DriftPolicy::PlanOrPrior)
            .describe("Billing period")
    }

    pub fn required(mut self) -> Self {
        self.requirement = Requirement::Required;
        self
    }

    pub fn computed(mut self) -> Self {
        self.requirement = Requirement::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.requirement = Requirement::OptionalComputed;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    pub fn policy(mut self, drift: DriftPolicy) -> Self {
        self.drift = drift;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// Descriptor of one resource type
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceSchema {
    pub type_name: String,
    pub version: u32,
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl ResourceSchema {
    pub fn new(type_name: impl Into<String>, description: &'static str) -> Self {
        Self {
            type_name: type_name.into(),
            version: 0,
            description,
            attributes: Vec::new(),
        }
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Check a declared configuration against the descriptor
    pub fn validate(&self, config: &Value) -> Vec<ProviderError> {
        let mut errors = Vec::new();
        match config.as_object() {
            Some(map) => validate_object(&self.attributes, map, "", &mut errors),
            None => errors.push(ProviderError::validation(
                Phase::Validate,
                "Invalid configuration",
                format!("{} configuration must be an object", self.type_name),
            )),
        }
        errors
    }
}

fn path_of(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

fn validate_object(
    attributes: &[Attribute],
    map: &serde_json::Map<String, Value>,
    prefix: &str,
    errors: &mut Vec<ProviderError>,
) {
    for key in map.keys() {
        if !attributes.iter().any(|a| a.name == key) {
            errors.push(
                ProviderError::validation(
                    Phase::Validate,
                    "Unsupported attribute",
                    format!("'{}' is not expected here", path_of(prefix, key)),
                )
                .with_attribute(path_of(prefix, key)),
            );
        }
    }

    for attr in attributes {
        let path = path_of(prefix, attr.name);
        let value = map.get(attr.name).filter(|v| !v.is_null());
        match (attr.requirement, value) {
            (Requirement::Required, None) => errors.push(
                ProviderError::validation(
                    Phase::Validate,
                    "Missing required attribute",
                    format!("'{}' is required", path),
                )
                .with_attribute(path.clone()),
            ),
            (Requirement::Computed, Some(v)) if !is_unknown_json(v) => errors.push(
                ProviderError::validation(
                    Phase::Validate,
                    "Computed attribute set",
                    format!("'{}' is computed by the API and cannot be configured", path),
                )
                .with_attribute(path.clone()),
            ),
            (_, Some(v)) if !is_unknown_json(v) => validate_value(&attr.ty, v, &path, errors),
            _ => {}
        }
    }
}

fn validate_value(ty: &AttrType, value: &Value, path: &str, errors: &mut Vec<ProviderError>) {
    let mismatch = |errors: &mut Vec<ProviderError>| {
        errors.push(
            ProviderError::validation(
                Phase::Validate,
                "Invalid attribute type",
                format!("'{}' must be {}", path, ty.describe()),
            )
            .with_attribute(path.to_string()),
        )
    };
    match ty {
        AttrType::String if !value.is_string() => mismatch(errors),
        AttrType::Bool if !value.is_boolean() => mismatch(errors),
        AttrType::Int64 if value.as_i64().is_none() => mismatch(errors),
        AttrType::Enum { values, .. } => match value.as_str() {
            Some(s) if ty.canonical_member(s).is_some() => {}
            Some(s) => errors.push(
                ProviderError::validation(
                    Phase::Validate,
                    "Invalid attribute value",
                    format!("'{}' must be one of {}, got '{}'", path, values.join(", "), s),
                )
                .with_attribute(path.to_string()),
            ),
            None => mismatch(errors),
        },
        AttrType::List { element } | AttrType::Set { element } => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    if !is_unknown_json(item) {
                        validate_value(element, item, &format!("{}[{}]", path, i), errors);
                    }
                }
            }
            None => mismatch(errors),
        },
        AttrType::Object { attributes } => match value.as_object() {
            Some(map) => validate_object(attributes, map, path, errors),
            None => mismatch(errors),
        },
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("arubacloud_test", "test")
            .attribute(Attribute::id())
            .attribute(Attribute::name())
            .attribute(Attribute::tags())
            .attribute(Attribute::enumeration("type", &["Basic", "Advanced"]))
            .attribute(Attribute::object(
                "network",
                vec![Attribute::string("address").required(), Attribute::bool("dhcp")],
            ))
    }

    #[test]
    fn test_valid_config_has_no_errors() {
        let errs = schema().validate(&json!({
            "name": "n",
            "tags": ["a"],
            "type": "advanced",
            "network": {"address": "10.0.0.0/24", "dhcp": true}
        }));
        assert!(errs.is_empty(), "{:?}", errs);
    }

    #[test]
    fn test_missing_required_and_unknown_keys() {
        let errs = schema().validate(&json!({"color": "blue"}));
        let attrs: Vec<_> = errs.iter().filter_map(|e| e.attribute.clone()).collect();
        assert!(attrs.contains(&"name".to_string()));
        assert!(attrs.contains(&"color".to_string()));
    }

    #[test]
    fn test_nested_paths_are_reported() {
        let errs = schema().validate(&json!({"name": "n", "network": {"dhcp": "yes"}}));
        let attrs: Vec<_> = errs.iter().filter_map(|e| e.attribute.clone()).collect();
        assert!(attrs.contains(&"network.address".to_string()));
        assert!(attrs.contains(&"network.dhcp".to_string()));
    }

    #[test]
    fn test_enum_membership() {
        let errs = schema().validate(&json!({"name": "n", "type": "Huge"}));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].detail.contains("Basic, Advanced"));
    }

    #[test]
    fn test_enum_aliases_are_accepted() {
        let schema = ResourceSchema::new("arubacloud_test", "test")
            .attribute(Attribute::name())
            .attribute(Attribute::billing_period());
        assert!(schema.validate(&json!({"name": "n", "billing_period": "monthly"})).is_empty());
        let errs = schema.validate(&json!({"name": "n", "billing_period": "weekly"}));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].detail.contains("Hour, Month, Year"));
    }

    #[test]
    fn test_computed_attribute_cannot_be_configured() {
        let errs = schema().validate(&json!({"name": "n", "id": "abc"}));
        assert_eq!(errs.len(), 1);
        assert_eq!(errs[0].attribute.as_deref(), Some("id"));

        let errs = schema().validate(&json!({"name": "n", "id": {"$unknown": true}}));
        assert!(errs.is_empty());
    }
}
