//! Plugin surface spoken to the orchestrator
//!
//! Newline-delimited JSON over stdin/stdout. Every request carries a numeric
//! `id` that its response echoes; requests run as independent tasks, so
//! responses may arrive out of order. `cancel` aborts one in-flight request,
//! `stop` (or EOF on stdin) cancels all of them and returns once they have
//! drained.

use crate::api::client::Client;
use crate::api::error::{ErrorKind, Phase, ProviderError};
use crate::config::{self, ProviderConfig};
use crate::lifecycle::{Operation, ResourceHandler};
use crate::resource;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

/// One line read from the orchestrator
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: Params,
}

/// Union of the parameters every method takes
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Params {
    pub type_name: Option<String>,
    pub config: Value,
    pub plan: Value,
    pub state: Value,
    pub prior: Value,
    pub id: Option<String>,
    pub target: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub summary: String,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl From<&ProviderError> for Diagnostic {
    fn from(err: &ProviderError) -> Self {
        let mut detail = err.detail.clone();
        for cause in err.cause_chain() {
            detail.push_str(": ");
            detail.push_str(&cause);
        }
        Self {
            severity: Severity::Error,
            summary: err.to_string(),
            detail,
            attribute: err.attribute.clone(),
        }
    }
}

/// One line written back to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Response {
    fn ok(id: u64, result: Value) -> Self {
        Self {
            id: Some(id),
            result: Some(result),
            diagnostics: Vec::new(),
        }
    }

    fn failed(id: Option<u64>, err: &ProviderError) -> Self {
        Self {
            id,
            result: None,
            diagnostics: vec![Diagnostic::from(err)],
        }
    }
}

/// Request dispatcher; holds the Client Bundle once `configure` has run
#[derive(Debug, Default)]
pub struct Server {
    client: RwLock<Option<Arc<Client>>>,
    inflight: Mutex<HashMap<u64, CancellationToken>>,
    shutdown: CancellationToken,
}

impl Server {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve requests until `stop` or EOF, then drain in-flight work
    pub async fn serve<R, W>(self: Arc<Self>, reader: R, writer: W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<Response>();
        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_vec(&response)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut tasks = JoinSet::new();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let request: Request = match serde_json::from_str(&line) {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!("Malformed request: {}", e);
                    let err = ProviderError::validation(
                        Phase::Configure,
                        "Malformed request",
                        e.to_string(),
                    );
                    let _ = tx.send(Response::failed(None, &err));
                    continue;
                }
            };

            match request.method.as_str() {
                "stop" => {
                    tracing::info!("stop requested");
                    let _ = tx.send(Response::ok(request.id, json!({})));
                    break;
                }
                "cancel" => {
                    let cancelled = request.params.target.is_some_and(|t| self.cancel(t));
                    let _ = tx.send(Response::ok(request.id, json!({ "cancelled": cancelled })));
                }
                _ => {
                    let token = self.register(request.id);
                    let server = Arc::clone(&self);
                    let tx = tx.clone();
                    let span = tracing::debug_span!(
                        "request",
                        id = request.id,
                        method = %request.method,
                        trace_id = %Uuid::new_v4()
                    );
                    tasks.spawn(
                        async move {
                            let id = request.id;
                            let response = server.dispatch(request, token).await;
                            server.unregister(id);
                            let _ = tx.send(response);
                        }
                        .instrument(span),
                    );
                }
            }

            while let Some(done) = tasks.try_join_next() {
                if let Err(e) = done {
                    tracing::error!("Request task failed: {}", e);
                }
            }
        }

        tracing::debug!(in_flight = tasks.len(), "shutting down");
        self.shutdown.cancel();
        while let Some(done) = tasks.join_next().await {
            if let Err(e) = done {
                tracing::error!("Request task failed: {}", e);
            }
        }
        drop(tx);
        writer_task.await??;
        Ok(())
    }

    fn register(&self, id: u64) -> CancellationToken {
        let token = self.shutdown.child_token();
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.insert(id, token.clone());
        }
        token
    }

    fn unregister(&self, id: u64) {
        if let Ok(mut inflight) = self.inflight.lock() {
            inflight.remove(&id);
        }
    }

    /// Cancel one in-flight request; false if it already finished
    pub fn cancel(&self, id: u64) -> bool {
        let token = self
            .inflight
            .lock()
            .ok()
            .and_then(|inflight| inflight.get(&id).cloned());
        match token {
            Some(token) => {
                tracing::debug!(target_id = id, "cancelling request");
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Run one request to completion
    pub async fn dispatch(&self, request: Request, cancel: CancellationToken) -> Response {
        let id = request.id;
        match self.handle(&request.method, request.params, cancel).await {
            Ok((result, errors)) => Response {
                id: Some(id),
                result: Some(result),
                diagnostics: errors.iter().map(Diagnostic::from).collect(),
            },
            Err(err) => {
                tracing::warn!(
                    kind = %err.kind,
                    phase = %err.phase,
                    context = ?err.context,
                    "{}",
                    err
                );
                Response::failed(Some(id), &err)
            }
        }
    }

    async fn handle(
        &self,
        method: &str,
        params: Params,
        cancel: CancellationToken,
    ) -> Result<(Value, Vec<ProviderError>), ProviderError> {
        match method {
            "get_metadata" => Ok((
                json!({
                    "provider": crate::PROVIDER_NAME,
                    "version": crate::VERSION,
                    "resource_types": resource::get_all_type_names(),
                }),
                Vec::new(),
            )),
            "get_schema" => {
                let mut types = Map::new();
                for (kind, handler) in resource::get_registry() {
                    types.insert(kind.type_name(), to_json(&handler.schema(), Phase::Validate)?);
                }
                let provider = to_json(&config::schema(), Phase::Configure)?;
                Ok((
                    json!({ "provider": provider, "resource_types": types }),
                    Vec::new(),
                ))
            }
            "configure" => {
                let config = ProviderConfig::from_value(params.config)?;
                let client = Client::from_config(&config)?;
                if let Ok(mut slot) = self.client.write() {
                    *slot = Some(Arc::new(client));
                }
                tracing::info!("provider configured");
                Ok((json!({}), Vec::new()))
            }
            "validate" => {
                let handler = handler(&params, Phase::Validate)?;
                let errors = handler.validate(&params.config);
                Ok((json!({}), errors))
            }
            "create" => {
                let handler = handler(&params, Phase::Create)?;
                let client = self.client(Phase::Create)?;
                let op = Operation::new(&client, client.scope(cancel, Phase::Create));
                let state = handler.create(&op, &params.plan).await?;
                Ok((json!({ "state": state }), Vec::new()))
            }
            "read" => {
                let handler = handler(&params, Phase::Read)?;
                let client = self.client(Phase::Read)?;
                let op = Operation::new(&client, client.scope(cancel, Phase::Read));
                let state = handler.read(&op, &params.state).await?;
                Ok((json!({ "state": state }), Vec::new()))
            }
            "update" => {
                let handler = handler(&params, Phase::Update)?;
                let client = self.client(Phase::Update)?;
                let op = Operation::new(&client, client.scope(cancel, Phase::Update));
                let state = handler.update(&op, &params.plan, &params.prior).await?;
                Ok((json!({ "state": state }), Vec::new()))
            }
            "delete" => {
                let handler = handler(&params, Phase::Delete)?;
                let client = self.client(Phase::Delete)?;
                let op = Operation::new(&client, client.scope(cancel, Phase::Delete));
                handler.delete(&op, &params.state).await?;
                Ok((json!({}), Vec::new()))
            }
            "import" => {
                let handler = handler(&params, Phase::Import)?;
                let client = self.client(Phase::Import)?;
                let id = params.id.as_deref().unwrap_or_default();
                let op = Operation::new(&client, client.scope(cancel, Phase::Import));
                let state = handler.import(&op, id).await?;
                Ok((json!({ "state": state }), Vec::new()))
            }
            other => Err(ProviderError::new(
                ErrorKind::Validation,
                Phase::Configure,
                "Unknown method",
                format!("'{}' is not a provider method", other),
            )),
        }
    }

    fn client(&self, phase: Phase) -> Result<Arc<Client>, ProviderError> {
        self.client
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .ok_or_else(|| {
                ProviderError::validation(
                    phase,
                    "Provider not configured",
                    "configure must succeed before any resource operation",
                )
            })
    }
}

fn handler(params: &Params, phase: Phase) -> Result<&'static dyn ResourceHandler, ProviderError> {
    let type_name = params.type_name.as_deref().unwrap_or_default();
    resource::get_handler(type_name).ok_or_else(|| {
        ProviderError::validation(
            phase,
            "Unknown resource type",
            format!("'{}' is not an Aruba Cloud resource type", type_name),
        )
    })
}

fn to_json<T: Serialize>(value: &T, phase: Phase) -> Result<Value, ProviderError> {
    serde_json::to_value(value).map_err(|e| {
        ProviderError::new(ErrorKind::Unknown, phase, "Cannot encode schema", e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};

    async fn run(input: &str) -> Vec<Value> {
        let server = Arc::new(Server::new());
        let (writer, mut reader) = tokio::io::duplex(64 * 1024);
        server
            .serve(BufReader::new(input.as_bytes()), writer)
            .await
            .unwrap();

        let mut output = String::new();
        reader.read_to_string(&mut output).await.unwrap();
        output
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    fn by_id(responses: &[Value], id: u64) -> &Value {
        responses.iter().find(|r| r["id"] == id).unwrap()
    }

    #[tokio::test]
    async fn test_metadata_lists_resource_types() {
        let out = run("{\"id\":1,\"method\":\"get_metadata\"}\n").await;
        let types = out[0]["result"]["resource_types"].as_array().unwrap();
        assert_eq!(types.len(), 24);
        assert!(types.contains(&json!("arubacloud_elastic_ip")));
        assert_eq!(out[0]["result"]["provider"], "arubacloud");
    }

    #[tokio::test]
    async fn test_lifecycle_before_configure_is_rejected() {
        let out = run(concat!(
            "{\"id\":7,\"method\":\"read\",",
            "\"params\":{\"type_name\":\"arubacloud_vpc\",\"state\":{\"id\":\"V\"}}}\n",
        ))
        .await;
        let diag = &by_id(&out, 7)["diagnostics"][0];
        assert_eq!(diag["severity"], "error");
        assert!(diag["summary"].as_str().unwrap().starts_with("read: Provider not configured"));
    }

    #[tokio::test]
    async fn test_validate_reports_attribute_paths() {
        let out = run(concat!(
            "{\"id\":2,\"method\":\"validate\",\"params\":{\"type_name\":\"arubacloud_subnet\",",
            "\"config\":{\"project_id\":\"P\",\"vpc_id\":\"V\",\"name\":\"s\",",
            "\"location\":\"l\",\"type\":\"Advanced\"}}}\n",
            "{\"id\":3,\"method\":\"stop\"}\n",
        ))
        .await;
        let resp = by_id(&out, 2);
        assert_eq!(resp["diagnostics"][0]["attribute"], "network.address");
        assert_eq!(resp["result"], json!({}));
    }

    #[tokio::test]
    async fn test_malformed_line_gets_null_id() {
        let out = run("not json\n{\"id\":4,\"method\":\"nope\"}\n").await;
        assert!(out.iter().any(|r| r["id"].is_null()));
        let unknown = by_id(&out, 4);
        assert!(unknown["diagnostics"][0]["summary"]
            .as_str()
            .unwrap()
            .contains("Unknown method"));
    }

    #[tokio::test]
    async fn test_configure_requires_credentials() {
        let out = run("{\"id\":5,\"method\":\"configure\",\"params\":{\"config\":{}}}\n").await;
        let diag = &by_id(&out, 5)["diagnostics"][0];
        assert_eq!(diag["attribute"], "api_key");
        assert!(diag["summary"].as_str().unwrap().starts_with("configure:"));
    }

    #[test]
    fn test_cancel_unknown_request() {
        assert!(!Server::new().cancel(99));
    }
}
