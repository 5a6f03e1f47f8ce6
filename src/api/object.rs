//! Wire shape shared by top-level resources

use crate::lifecycle::readiness::Readiness;
use crate::lifecycle::value::Attr;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl Metadata {
    /// Request metadata; null and unknown values are left out
    pub fn request(name: &Attr<String>, location: &Attr<String>, tags: &Attr<Vec<String>>) -> Self {
        Self {
            name: name.value().cloned(),
            location: location.value().map(|value| Location {
                value: value.clone(),
            }),
            tags: tags.value().cloned(),
            ..Default::default()
        }
    }

    /// Overwrite the mutable metadata with planned values, keeping the rest
    pub fn apply(&mut self, name: &Attr<String>, tags: &Attr<Vec<String>>) {
        if let Some(name) = name.value() {
            self.name = Some(name.clone());
        }
        if let Some(tags) = tags.value() {
            self.tags = Some(tags.clone());
        }
    }

    pub fn location(&self) -> Option<String> {
        self.location.as_ref().map(|l| l.value.clone())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

/// `{ metadata, properties, status }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiObject<P> {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub properties: P,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
}

impl<P> ApiObject<P> {
    pub fn new(metadata: Metadata, properties: P) -> Self {
        Self {
            metadata,
            properties,
            status: None,
        }
    }

    pub fn state(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.state.as_deref())
    }

    /// Strip server-owned parts before the object is sent back in a PUT
    pub fn into_request(mut self) -> Self {
        self.status = None;
        self.metadata.id = None;
        self.metadata.uri = None;
        self
    }
}

/// What the reconciler needs to know about any wire payload
pub trait WireObject: Serialize + DeserializeOwned + Clone + Debug + Send + Sync + 'static {
    /// Identifier allocated by the API
    fn id(&self) -> Option<&str>;

    /// Canonical URI echoed by the API
    fn uri(&self) -> Option<&str> {
        None
    }

    /// Readable without a state field means active
    fn readiness(&self) -> Readiness {
        Readiness::active()
    }
}

impl<P> WireObject for ApiObject<P>
where
    P: Serialize + DeserializeOwned + Clone + Debug + Default + Send + Sync + 'static,
{
    fn id(&self) -> Option<&str> {
        self.metadata.id.as_deref()
    }

    fn uri(&self) -> Option<&str> {
        self.metadata.uri.as_deref()
    }

    fn readiness(&self) -> Readiness {
        match &self.status {
            Some(status) => Readiness::from_state(status.state.as_deref())
                .with_failure_reason(status.failure_reason.clone()),
            None => Readiness::active(),
        }
    }
}
