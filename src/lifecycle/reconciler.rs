//! Reconciler
//!
//! The per-resource state machine shared by every adapter. An [`Adapter`]
//! supplies the typed model, the wire shape and the request builders; the
//! [`Reconciler`] sequences the REST calls, readiness waits, deletion
//! retries and the drift merge that produces durable state.

use super::drift::{check_immutable, reconcile, Inputs};
use super::readiness::{Readiness, ReadinessStatus, Verdict};
use super::retry::{delete_with_retry, Presence};
use super::schema::ResourceSchema;
use super::scope::Scope;
use super::uri::ResourceKind;
use super::value::is_unknown_json;
use super::waiter::{wait_until, Missing};
use crate::api::client::Client;
use crate::api::envelope::Response;
use crate::api::error::{ErrorKind, Phase, ProviderError};
use crate::api::object::{ApiObject, WireObject};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Context of one lifecycle operation
#[derive(Debug, Clone)]
pub struct Operation<'a> {
    pub client: &'a Client,
    pub scope: Scope,
}

impl<'a> Operation<'a> {
    pub fn new(client: &'a Client, scope: Scope) -> Self {
        Self { client, scope }
    }

    pub fn phase(&self) -> Phase {
        self.scope.phase()
    }

    /// Canonical URI of a referenced resource.
    ///
    /// A value starting with `/` is taken verbatim. A short id is promoted
    /// and the referenced resource is read, waiting until it is active; a
    /// missing resource is a validation error on `attribute`.
    pub async fn reference(
        &self,
        kind: ResourceKind,
        parents: &[&str],
        id_or_uri: &str,
        attribute: &str,
    ) -> Result<String, ProviderError> {
        if id_or_uri.starts_with('/') {
            return Ok(id_or_uri.to_string());
        }
        let phase = self.phase();
        let uri = kind
            .canonicalize(parents, id_or_uri)
            .map_err(|e| e.in_phase(phase).with_attribute(attribute))?;

        let resp: Response<ApiObject<Value>> = self.client.get(&self.scope, &uri).await?;
        if resp.is_not_found() {
            return Err(ProviderError::validation(
                phase,
                "Referenced resource not found",
                format!("{} '{}' does not exist", kind, id_or_uri),
            )
            .with_attribute(attribute));
        }
        let mut found = resp.into_data(phase)?;
        if found.readiness().verdict != Verdict::Active {
            tracing::debug!(reference = %uri, "waiting for referenced {} to become active", kind);
            found = self
                .wait_active(kind, &uri, Missing::Gone, |w: &ApiObject<Value>| w.readiness())
                .await?;
        }
        Ok(found.metadata.uri.unwrap_or(uri))
    }

    /// Read `uri` until `readiness` reports active
    pub async fn wait_active<W, R>(
        &self,
        kind: ResourceKind,
        uri: &str,
        missing: Missing,
        readiness: R,
    ) -> Result<W, ProviderError>
    where
        W: WireObject,
        R: Fn(&W) -> Readiness,
    {
        let (client, scope, readiness) = (self.client, &self.scope, &readiness);
        let phase = scope.phase();
        wait_until(scope, client.poll_policy(), kind.label(), missing, move || async move {
            let wire: W = client.get(scope, uri).await?.into_data(phase)?;
            Ok((readiness(&wire), wire))
        })
        .await
    }
}

/// Per-resource wiring between the declared model and the REST surface
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Declared, prior and observed view of the resource
    type Model: Serialize + DeserializeOwned + Default + Debug + Send + Sync;
    /// Request and response payload
    type Wire: WireObject;

    const KIND: ResourceKind;

    fn schema(&self) -> ResourceSchema;

    /// Rules the descriptor cannot express (variants, exclusive fields)
    fn validate(&self, _model: &Self::Model) -> Vec<ProviderError> {
        Vec::new()
    }

    /// Assemble the create body; references are resolved here
    async fn create_request(
        &self,
        op: &Operation<'_>,
        plan: &Self::Model,
    ) -> Result<Self::Wire, ProviderError>;

    /// Rebuild the full PUT body from the current object and the plan
    async fn update_request(
        &self,
        op: &Operation<'_>,
        plan: &Self::Model,
        current: Self::Wire,
    ) -> Result<Self::Wire, ProviderError>;

    /// API view of the resource. Parent ids and fields the API does not
    /// echo stay null.
    fn observe(&self, wire: &Self::Wire) -> Self::Model;

    fn readiness(&self, wire: &Self::Wire) -> Readiness {
        wire.readiness()
    }

    /// Id of a freshly created resource; children identified by name take
    /// it from the request when the API answers without a body
    fn created_id(&self, request: &Self::Wire, created: Option<&Self::Wire>) -> Option<String> {
        created
            .and_then(WireObject::id)
            .or_else(|| request.id())
            .map(str::to_string)
    }
}

/// Object-safe view of a reconciler over JSON values, used by dispatch
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    fn schema(&self) -> ResourceSchema;

    /// Check a declared configuration
    fn validate(&self, config: &Value) -> Vec<ProviderError>;

    async fn create(&self, op: &Operation<'_>, plan: &Value) -> Result<Value, ProviderError>;

    /// `None` when the resource is gone and must leave durable state
    async fn read(&self, op: &Operation<'_>, prior: &Value) -> Result<Option<Value>, ProviderError>;

    async fn update(
        &self,
        op: &Operation<'_>,
        plan: &Value,
        prior: &Value,
    ) -> Result<Value, ProviderError>;

    async fn delete(&self, op: &Operation<'_>, prior: &Value) -> Result<(), ProviderError>;

    async fn import(&self, op: &Operation<'_>, id: &str) -> Result<Value, ProviderError>;
}

/// Where a resource lives
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    id: String,
    parents: Vec<String>,
    uri: String,
}

/// Known, non-empty string attribute of a JSON object
fn known_str<'v>(value: &'v Value, name: &str) -> Option<&'v str> {
    value
        .get(name)
        .filter(|v| !is_unknown_json(v))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
}

/// Generic lifecycle state machine for one adapter
#[derive(Debug, Default)]
pub struct Reconciler<A> {
    adapter: A,
}

impl<A: Adapter> Reconciler<A> {
    pub fn new(adapter: A) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    fn decode(&self, value: &Value, phase: Phase) -> Result<A::Model, ProviderError> {
        serde_json::from_value(value.clone()).map_err(|e| {
            ProviderError::validation(
                phase,
                "Invalid attribute value",
                format!("{}: {}", A::KIND.type_name(), e),
            )
        })
    }

    fn check_rules(&self, model: &A::Model, phase: Phase) -> Result<(), ProviderError> {
        match self.adapter.validate(model).into_iter().next() {
            Some(err) => Err(err.in_phase(phase)),
            None => Ok(()),
        }
    }

    /// Parent ids a create needs, taken from the plan
    fn required_parents(&self, plan: &Value, phase: Phase) -> Result<Vec<String>, ProviderError> {
        A::KIND
            .parent_attributes()
            .iter()
            .map(|name| {
                known_str(plan, name).map(str::to_string).ok_or_else(|| {
                    ProviderError::validation(
                        phase,
                        "Missing parent identifier",
                        format!("'{}' is required to create a {}", name, A::KIND),
                    )
                    .with_attribute(*name)
                })
            })
            .collect()
    }

    /// Identity recorded in durable state. Parent ids missing from state are
    /// recovered from a recorded canonical URI.
    fn identity(&self, state: &Value, phase: Phase) -> Result<Identity, ProviderError> {
        let kind = A::KIND;
        let id_attr = kind.id_attribute();
        let id = known_str(state, id_attr).ok_or_else(|| {
            ProviderError::validation(
                phase,
                "Missing identifier",
                format!("durable state of this {} has no '{}'", kind, id_attr),
            )
            .with_attribute(id_attr)
        })?;

        let recorded_uri = known_str(state, "uri").filter(|u| u.starts_with('/'));
        let parsed = recorded_uri.and_then(|u| kind.parse(u));

        let mut parents = Vec::new();
        for (i, name) in kind.parent_attributes().iter().enumerate() {
            let parent = known_str(state, name)
                .map(str::to_string)
                .or_else(|| parsed.as_ref().and_then(|(p, _)| p.get(i).cloned()))
                .ok_or_else(|| {
                    ProviderError::validation(
                        phase,
                        "Missing parent identifier",
                        format!("durable state has no '{}' and no URI to recover it from", name),
                    )
                    .with_attribute(*name)
                })?;
            parents.push(parent);
        }

        let uri = match recorded_uri {
            Some(uri) => uri.to_string(),
            None => {
                let refs: Vec<&str> = parents.iter().map(String::as_str).collect();
                kind.canonicalize(&refs, id).map_err(|e| e.in_phase(phase))?
            }
        };

        Ok(Identity {
            id: id.to_string(),
            parents,
            uri,
        })
    }

    /// Observed JSON, with identity filled in where the wire has none
    fn api_view(
        &self,
        wire: &A::Wire,
        identity: &Identity,
        phase: Phase,
    ) -> Result<Value, ProviderError> {
        let mut api = serde_json::to_value(self.adapter.observe(wire)).map_err(|e| {
            let detail = e.to_string();
            ProviderError::new(ErrorKind::Unknown, phase, "Cannot encode observed state", detail)
        })?;
        if let Value::Object(map) = &mut api {
            let names = A::KIND.parent_attributes().iter().copied();
            let values = identity.parents.iter();
            let id = std::iter::once((A::KIND.id_attribute(), &identity.id));
            for (name, value) in names.zip(values).chain(id) {
                let slot = map.entry(name.to_string()).or_insert(Value::Null);
                if slot.is_null() {
                    *slot = Value::String(value.clone());
                }
            }
        }
        Ok(api)
    }

    async fn wait_ready(
        &self,
        op: &Operation<'_>,
        uri: &str,
        missing: Missing,
    ) -> Result<A::Wire, ProviderError> {
        let adapter = &self.adapter;
        op.wait_active(A::KIND, uri, missing, |wire: &A::Wire| adapter.readiness(wire))
            .await
    }

    async fn fetch(
        &self,
        op: &Operation<'_>,
        uri: &str,
    ) -> Result<Response<A::Wire>, ProviderError> {
        op.client.get(&op.scope, uri).await
    }
}

#[async_trait]
impl<A: Adapter> ResourceHandler for Reconciler<A> {
    fn kind(&self) -> ResourceKind {
        A::KIND
    }

    fn schema(&self) -> ResourceSchema {
        self.adapter.schema()
    }

    fn validate(&self, config: &Value) -> Vec<ProviderError> {
        let mut errors = self.adapter.schema().validate(config);
        if errors.is_empty() {
            // Lists may still hold unknown elements at this point
            if let Ok(model) = serde_json::from_value::<A::Model>(config.clone()) {
                errors.extend(
                    self.adapter
                        .validate(&model)
                        .into_iter()
                        .map(|e| e.in_phase(Phase::Validate)),
                );
            }
        }
        errors
    }

    async fn create(&self, op: &Operation<'_>, plan: &Value) -> Result<Value, ProviderError> {
        let kind = A::KIND;
        let phase = op.phase();
        let type_name = kind.type_name();

        let parents = self.required_parents(plan, phase)?;
        let model = self.decode(plan, phase)?;
        self.check_rules(&model, phase)?;

        let parent_refs: Vec<&str> = parents.iter().map(String::as_str).collect();
        let collection = kind.collection(&parent_refs).map_err(|e| e.in_phase(phase))?;
        let request = self.adapter.create_request(op, &model).await?;

        tracing::trace!(
            resource_type = %type_name,
            operation = "create",
            collection = %collection,
            "submitting create"
        );
        let created: Option<A::Wire> = op
            .client
            .post(&op.scope, &collection, &request)
            .await?
            .into_result(phase)?;

        let id = self
            .adapter
            .created_id(&request, created.as_ref())
            .ok_or_else(|| {
                ProviderError::new(
                    ErrorKind::Unknown,
                    phase,
                    "Missing identifier",
                    format!("the API accepted the {} but returned no id", kind),
                )
            })?;
        let echoed_uri = created.as_ref().and_then(WireObject::uri).map(str::to_string);
        let uri = match &echoed_uri {
            Some(uri) => uri.clone(),
            None => kind.canonicalize(&parent_refs, &id).map_err(|e| e.in_phase(phase))?,
        };
        tracing::trace!(
            resource_type = %type_name,
            resource_id = %id,
            operation = "create",
            uri = %uri,
            uri_echoed = echoed_uri.is_some(),
            "create accepted, waiting for readiness"
        );

        self.wait_ready(op, &uri, Missing::Pending).await?;

        // Authoritative values come from a read after the resource is active
        let current = self.fetch(op, &uri).await?.into_data(phase)?;
        let identity = Identity { id, parents, uri };
        let api = self.api_view(&current, &identity, phase)?;
        let state = reconcile(
            &self.adapter.schema(),
            Inputs {
                plan: Some(plan),
                prior: None,
                api: &api,
            },
        );

        tracing::trace!(
            resource_type = %type_name,
            resource_id = %identity.id,
            operation = "create",
            "resource created"
        );
        Ok(state)
    }

    async fn read(
        &self,
        op: &Operation<'_>,
        prior: &Value,
    ) -> Result<Option<Value>, ProviderError> {
        let kind = A::KIND;
        let phase = op.phase();
        let type_name = kind.type_name();

        if known_str(prior, kind.id_attribute()).is_none() {
            tracing::trace!(resource_type = %type_name, operation = "read", "no id recorded yet");
            return Ok(Some(prior.clone()));
        }
        let identity = self.identity(prior, phase)?;

        let resp = self.fetch(op, &identity.uri).await?;
        if resp.is_not_found() {
            tracing::trace!(
                resource_type = %type_name,
                resource_id = %identity.id,
                operation = "read",
                "resource is gone, dropping from state"
            );
            return Ok(None);
        }
        let current = resp.into_data(phase)?;
        let api = self.api_view(&current, &identity, phase)?;
        let state = reconcile(
            &self.adapter.schema(),
            Inputs {
                plan: None,
                prior: Some(prior),
                api: &api,
            },
        );

        tracing::trace!(
            resource_type = %type_name,
            resource_id = %identity.id,
            operation = "read",
            state = %self.adapter.readiness(&current).describe(),
            "resource read"
        );
        Ok(Some(state))
    }

    async fn update(
        &self,
        op: &Operation<'_>,
        plan: &Value,
        prior: &Value,
    ) -> Result<Value, ProviderError> {
        let kind = A::KIND;
        let phase = op.phase();
        let type_name = kind.type_name();
        let schema = self.adapter.schema();

        // Ids come strictly from prior state
        let identity = self.identity(prior, phase).map_err(|e| {
            let detail = format!("durable state looks corrupted: {}", e.detail);
            ProviderError { detail, ..e }
        })?;
        check_immutable(&schema, plan, prior).map_err(|e| e.in_phase(phase))?;
        let model = self.decode(plan, phase)?;
        self.check_rules(&model, phase)?;

        let current = self.fetch(op, &identity.uri).await?.into_data(phase)?;
        let readiness = self.adapter.readiness(&current);
        if readiness.status == ReadinessStatus::Creating {
            return Err(ProviderError::conflict(
                phase,
                "Resource is not ready",
                format!(
                    "cannot update {} '{}' during creation (state {})",
                    kind,
                    identity.id,
                    readiness.describe()
                ),
            )
            .with_context("state", readiness.describe()));
        }

        let request = self.adapter.update_request(op, &model, current).await?;
        tracing::trace!(
            resource_type = %type_name,
            resource_id = %identity.id,
            operation = "update",
            uri = %identity.uri,
            "submitting update"
        );
        let echoed: Option<A::Wire> = op
            .client
            .put(&op.scope, &identity.uri, &request)
            .await?
            .into_result(phase)?;

        // Re-read once for the fields the echo does not carry
        let refreshed = self.wait_ready(op, &identity.uri, Missing::Gone).await?;
        let api = self.api_view(&refreshed, &identity, phase)?;
        let state = reconcile(
            &schema,
            Inputs {
                plan: Some(plan),
                prior: Some(prior),
                api: &api,
            },
        );

        tracing::trace!(
            resource_type = %type_name,
            resource_id = %identity.id,
            operation = "update",
            echoed = echoed.is_some(),
            "resource updated"
        );
        Ok(state)
    }

    async fn delete(&self, op: &Operation<'_>, prior: &Value) -> Result<(), ProviderError> {
        let kind = A::KIND;
        let phase = op.phase();
        let type_name = kind.type_name();

        if known_str(prior, kind.id_attribute()).is_none() {
            tracing::trace!(
                resource_type = %type_name,
                operation = "delete",
                "no id recorded, nothing to delete"
            );
            return Ok(());
        }
        let identity = self.identity(prior, phase)?;

        tracing::trace!(
            resource_type = %type_name,
            resource_id = %identity.id,
            operation = "delete",
            uri = %identity.uri,
            "deleting"
        );
        let (client, scope, adapter) = (op.client, &op.scope, &self.adapter);
        let uri = identity.uri.as_str();
        delete_with_retry(
            scope,
            client.poll_policy(),
            kind.label(),
            move || client.delete(scope, uri),
            move || async move {
                let resp: Response<A::Wire> = client.get(scope, uri).await?;
                if resp.is_not_found() {
                    return Ok(Presence::Gone);
                }
                let wire = resp.into_data(phase)?;
                Ok(match adapter.readiness(&wire).status {
                    ReadinessStatus::Gone => Presence::Gone,
                    _ => Presence::Present,
                })
            },
        )
        .await?;

        tracing::trace!(
            resource_type = %type_name,
            resource_id = %identity.id,
            operation = "delete",
            "resource deleted"
        );
        Ok(())
    }

    async fn import(&self, op: &Operation<'_>, id: &str) -> Result<Value, ProviderError> {
        let kind = A::KIND;
        let phase = op.phase();
        let names = kind.parent_attributes();

        let (parents, short, uri) = if id.starts_with('/') {
            let (parents, short) = kind.parse(id).ok_or_else(|| {
                ProviderError::validation(
                    phase,
                    "Invalid import id",
                    format!("'{}' is not a {} URI", id, kind),
                )
            })?;
            (parents, short, Some(id.to_string()))
        } else {
            let parts: Vec<&str> = id.split('/').collect();
            if parts.len() != names.len() + 1 || parts.iter().any(|p| p.is_empty()) {
                let mut expected: Vec<&str> = names.to_vec();
                expected.push(kind.id_attribute());
                return Err(ProviderError::validation(
                    phase,
                    "Invalid import id",
                    format!(
                        "expected '{}' or a canonical URI, got '{}'",
                        expected.join("/"),
                        id
                    ),
                ));
            }
            let (parents, last) = parts.split_at(names.len());
            (
                parents.iter().map(|p| p.to_string()).collect(),
                last.concat(),
                None,
            )
        };

        let mut prior = Map::new();
        for (name, value) in names.iter().zip(parents) {
            prior.insert(name.to_string(), Value::String(value));
        }
        prior.insert(kind.id_attribute().to_string(), Value::String(short.clone()));
        if let Some(uri) = uri {
            prior.insert("uri".to_string(), Value::String(uri));
        }

        tracing::trace!(
            resource_type = %kind.type_name(),
            resource_id = %short,
            operation = "import",
            "importing"
        );
        match self.read(op, &Value::Object(prior)).await? {
            Some(state) => Ok(state),
            None => Err(ProviderError::new(
                ErrorKind::NotFound,
                phase,
                "Cannot import",
                format!("{} '{}' does not exist", kind, id),
            )),
        }
    }
}
