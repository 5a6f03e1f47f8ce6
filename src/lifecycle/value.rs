//! Tri-state attribute values
//!
//! Declared configuration distinguishes "not set" ([`Attr::Null`]) from
//! "computed later" ([`Attr::Unknown`]) from a concrete value. Prior and
//! observed values are never unknown.
//!
//! On the protocol wire `Null` is JSON `null` (or an absent key), `Unknown`
//! is the sentinel object `{"$unknown": true}`, and `Known(v)` is `v`.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Key of the unknown-value sentinel object
pub const UNKNOWN_KEY: &str = "$unknown";

/// A nullable, unknown-aware attribute value
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Attr<T> {
    #[default]
    Null,
    Unknown,
    Known(T),
}

impl<T> Attr<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    pub fn as_ref(&self) -> Attr<&T> {
        match self {
            Self::Null => Attr::Null,
            Self::Unknown => Attr::Unknown,
            Self::Known(v) => Attr::Known(v),
        }
    }

    /// The value when known
    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attr<U> {
        match self {
            Self::Null => Attr::Null,
            Self::Unknown => Attr::Unknown,
            Self::Known(v) => Attr::Known(f(v)),
        }
    }

    /// `self` when known, otherwise `other`
    pub fn or(self, other: Attr<T>) -> Attr<T> {
        match self {
            Self::Known(_) => self,
            _ => other,
        }
    }

    /// Unknown collapses to null; used when writing durable state
    pub fn resolved(self) -> Attr<T> {
        match self {
            Self::Unknown => Self::Null,
            other => other,
        }
    }
}

impl<T> From<Option<T>> for Attr<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Self::Known(v),
            None => Self::Null,
        }
    }
}

impl From<&str> for Attr<String> {
    fn from(value: &str) -> Self {
        Self::Known(value.to_string())
    }
}

impl Attr<String> {
    pub fn as_deref(&self) -> Option<&str> {
        self.value().map(String::as_str)
    }

    /// Known and non-empty
    pub fn non_empty(&self) -> Option<&str> {
        self.as_deref().filter(|s| !s.is_empty())
    }
}

/// Whether a raw JSON value is the unknown sentinel
pub fn is_unknown_json(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.len() == 1 && m.get(UNKNOWN_KEY) == Some(&Value::Bool(true)))
}

/// The unknown sentinel
pub fn unknown_json() -> Value {
    let mut map = serde_json::Map::new();
    map.insert(UNKNOWN_KEY.to_string(), Value::Bool(true));
    Value::Object(map)
}

impl<T: Serialize> Serialize for Attr<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => unknown_json().serialize(serializer),
            Self::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for Attr<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Self::Null);
        }
        if is_unknown_json(&raw) {
            return Ok(Self::Unknown);
        }
        T::deserialize(raw).map(Self::Known).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize, PartialEq)]
    struct Sample {
        #[serde(default)]
        name: Attr<String>,
        #[serde(default)]
        size: Attr<i64>,
        #[serde(default)]
        tags: Attr<Vec<String>>,
    }

    #[test]
    fn test_decode_three_states() {
        let s: Sample = serde_json::from_value(json!({
            "name": "p1",
            "size": {"$unknown": true}
        }))
        .unwrap();
        assert_eq!(s.name, Attr::Known("p1".to_string()));
        assert_eq!(s.size, Attr::Unknown);
        assert_eq!(s.tags, Attr::Null);
    }

    #[test]
    fn test_encode_three_states() {
        let s = Sample {
            name: "p1".into(),
            size: Attr::Unknown,
            tags: Attr::Null,
        };
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            json!({"name": "p1", "size": {"$unknown": true}, "tags": null})
        );
    }

    #[test]
    fn test_type_errors_are_reported() {
        let res: Result<Sample, _> = serde_json::from_value(json!({"size": "big"}));
        assert!(res.is_err());
    }

    #[test]
    fn test_or_and_resolved() {
        let plan: Attr<i64> = Attr::Unknown;
        assert_eq!(plan.clone().or(Attr::Known(3)), Attr::Known(3));
        assert_eq!(plan.resolved(), Attr::Null);
        assert_eq!(Attr::Known(1).or(Attr::Known(2)), Attr::Known(1));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(Attr::from("").non_empty(), None);
        assert_eq!(Attr::from("x").non_empty(), Some("x"));
    }
}
