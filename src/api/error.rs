//! Error taxonomy
//!
//! Every failure that leaves the provider is a [`ProviderError`]. The kind is
//! derived from the HTTP status (or the local condition that produced it) and
//! decides whether the readiness and deletion loops retry.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Classification of a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Network or transport-layer failure
    Transport,
    /// 4xx other than 404/409, or a locally detected configuration error
    Validation,
    /// 409, an `error` readiness state, or an update during creation
    Conflict,
    /// 404
    NotFound,
    /// 5xx (and 429 throttling)
    Server,
    /// 401/403
    Permission,
    /// Per-operation deadline expired
    Timeout,
    /// The orchestrator cancelled the operation
    Cancelled,
    Unknown,
}

impl ErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => Self::Permission,
            404 => Self::NotFound,
            409 => Self::Conflict,
            // Throttling is transient; the backend asks us to come back later
            429 => Self::Server,
            400..=499 => Self::Validation,
            500..=599 => Self::Server,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Validation => "validation",
            Self::Conflict => "conflict",
            Self::NotFound => "not-found",
            Self::Server => "server",
            Self::Permission => "permission",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown",
        }
    }

    /// Kinds the Delete-with-Retry loop keeps trying on
    pub fn is_delete_retryable(&self) -> bool {
        matches!(self, Self::Transport | Self::Conflict | Self::Server)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical phase of the operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Configure,
    Validate,
    Create,
    Read,
    Update,
    Delete,
    Import,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configure => "configure",
            Self::Validate => "validate",
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Import => "import",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// RFC 7807 problem document returned by the API on failure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub problem_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldError>,
}

/// Per-field validation failure inside a problem document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiError {
    /// Detail line including any per-field messages
    pub fn full_detail(&self) -> String {
        let mut detail = self.detail.clone().unwrap_or_default();
        let fields: Vec<String> = self
            .errors
            .iter()
            .filter_map(|e| match (&e.field, &e.message) {
                (Some(f), Some(m)) => Some(format!("{}: {}", f, m)),
                (None, Some(m)) => Some(m.clone()),
                (Some(f), None) => Some(f.clone()),
                (None, None) => None,
            })
            .collect();
        if !fields.is_empty() {
            if !detail.is_empty() {
                detail.push_str("; ");
            }
            detail.push_str(&fields.join("; "));
        }
        detail
    }
}

/// The single error type surfaced to the orchestrator
#[derive(Debug, Error)]
#[error("{phase}: {title} - {detail}")]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub phase: Phase,
    pub title: String,
    pub detail: String,
    /// Attribute the diagnostic points at, if any
    pub attribute: Option<String>,
    /// Structured context carried to the log sink
    pub context: BTreeMap<String, String>,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl ProviderError {
    pub fn new(
        kind: ErrorKind,
        phase: Phase,
        title: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            phase,
            title: title.into(),
            detail: detail.into(),
            attribute: None,
            context: BTreeMap::new(),
            source: None,
        }
    }

    pub fn validation(phase: Phase, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, phase, title, detail)
    }

    pub fn conflict(phase: Phase, title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, phase, title, detail)
    }

    pub fn timeout(phase: Phase, detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, phase, "Operation timed out", detail)
    }

    pub fn cancelled(phase: Phase) -> Self {
        Self::new(
            ErrorKind::Cancelled,
            phase,
            "Operation cancelled",
            "the orchestrator cancelled the operation",
        )
    }

    /// Transport failure; the kind is always part of the rendered title
    pub fn transport(
        phase: Phase,
        detail: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::new(ErrorKind::Transport, phase, "Transport error", detail).with_source(source)
    }

    /// Build from an API problem document and the HTTP status it came with
    pub fn from_api(phase: Phase, status: u16, api: &ApiError) -> Self {
        let kind = ErrorKind::from_status(status);
        let title = api
            .title
            .clone()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title(status));
        let mut detail = api.full_detail();
        if detail.is_empty() {
            detail = format!("HTTP {}", status);
        }
        let mut err = Self::new(kind, phase, title, detail).with_context("status", status);
        if let Some(instance) = &api.instance {
            err = err.with_context("instance", instance);
        }
        if let Some(field) = api.errors.iter().find_map(|e| e.field.clone()) {
            err.attribute = Some(field);
        }
        err
    }

    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Re-tag the error with the phase of the operation that surfaced it
    pub fn in_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    /// Cause chain rendered for the diagnostic detail
    pub fn cause_chain(&self) -> Vec<String> {
        let mut causes = Vec::new();
        let mut current: Option<&(dyn std::error::Error + 'static)> =
            std::error::Error::source(self);
        while let Some(cause) = current {
            causes.push(cause.to_string());
            current = cause.source();
        }
        causes
    }
}

fn default_title(status: u16) -> String {
    match ErrorKind::from_status(status) {
        ErrorKind::Permission => "Permission denied".to_string(),
        ErrorKind::NotFound => "Resource not found".to_string(),
        ErrorKind::Conflict => "Resource conflict".to_string(),
        ErrorKind::Validation => "Invalid request".to_string(),
        ErrorKind::Server if status == 429 => "Rate limit exceeded".to_string(),
        ErrorKind::Server => "Service unavailable".to_string(),
        _ => format!("Unexpected HTTP status {}", status),
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_is_total_over_status() {
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Permission);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Permission);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::NotFound);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(422), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::Server);
        assert_eq!(ErrorKind::from_status(302), ErrorKind::Unknown);
    }

    #[test]
    fn test_rendered_message_shape() {
        let api = ApiError {
            title: Some("Bad Request".to_string()),
            detail: Some("name is too long".to_string()),
            ..Default::default()
        };
        let err = ProviderError::from_api(Phase::Create, 400, &api);
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.to_string(), "create: Bad Request - name is too long");
        assert_eq!(err.context.get("status").map(String::as_str), Some("400"));
    }

    #[test]
    fn test_field_errors_are_folded_into_detail() {
        let api = ApiError {
            title: Some("Validation failed".to_string()),
            errors: vec![FieldError {
                field: Some("properties.cidr".to_string()),
                message: Some("must be a valid CIDR".to_string()),
            }],
            ..Default::default()
        };
        let err = ProviderError::from_api(Phase::Update, 422, &api);
        assert_eq!(
            err.to_string(),
            "update: Validation failed - properties.cidr: must be a valid CIDR"
        );
        assert_eq!(err.attribute.as_deref(), Some("properties.cidr"));
    }

    #[test]
    fn test_missing_title_uses_status_default() {
        let err = ProviderError::from_api(Phase::Delete, 409, &ApiError::default());
        assert_eq!(err.to_string(), "delete: Resource conflict - HTTP 409");
    }

    #[test]
    fn test_transport_keeps_kind_and_cause() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = ProviderError::transport(Phase::Read, "GET /projects/p1 failed", io);
        assert_eq!(err.kind, ErrorKind::Transport);
        assert!(err.to_string().starts_with("read: Transport error - "));
        assert_eq!(err.cause_chain(), vec!["reset by peer".to_string()]);
    }

    #[test]
    fn test_delete_retry_classes() {
        assert!(ErrorKind::Transport.is_delete_retryable());
        assert!(ErrorKind::Conflict.is_delete_retryable());
        assert!(ErrorKind::Server.is_delete_retryable());
        assert!(!ErrorKind::Validation.is_delete_retryable());
        assert!(!ErrorKind::Permission.is_delete_retryable());
        assert!(!ErrorKind::NotFound.is_delete_retryable());
    }
}
