//! HTTP utilities for Aruba Cloud REST API calls

use super::envelope::Response;
use super::error::{ApiError, Phase, ProviderError};
use crate::lifecycle::scope::Scope;
use reqwest::{Client, Method};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
pub fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut cut = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| c.is_control(), "")
}

/// HTTP client wrapper for Aruba Cloud API calls
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self, ProviderError> {
        let client = Client::builder()
            .user_agent(concat!("arubacloud-provider/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ProviderError::transport(Phase::Configure, "failed to create HTTP client", e)
            })?;

        Ok(Self { client })
    }

    /// Underlying reqwest client (shared with the token exchange)
    pub fn inner(&self) -> &Client {
        &self.client
    }

    /// Make a GET request
    pub async fn get(
        &self,
        scope: &Scope,
        url: &str,
        token: &str,
    ) -> Result<Response<Value>, ProviderError> {
        self.send(scope, Method::GET, url, token, None).await
    }

    /// Make a POST request with a JSON body
    pub async fn post(
        &self,
        scope: &Scope,
        url: &str,
        token: &str,
        body: &Value,
    ) -> Result<Response<Value>, ProviderError> {
        self.send(scope, Method::POST, url, token, Some(body)).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(
        &self,
        scope: &Scope,
        url: &str,
        token: &str,
        body: &Value,
    ) -> Result<Response<Value>, ProviderError> {
        self.send(scope, Method::PUT, url, token, Some(body)).await
    }

    /// Make a DELETE request
    pub async fn delete(
        &self,
        scope: &Scope,
        url: &str,
        token: &str,
    ) -> Result<Response<Value>, ProviderError> {
        self.send(scope, Method::DELETE, url, token, None).await
    }

    /// Send one request and wrap the reply in an envelope.
    ///
    /// Only transport failures, cancellation and the deadline return `Err`;
    /// every HTTP status, including 4xx/5xx, comes back as a [`Response`].
    async fn send(
        &self,
        scope: &Scope,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Response<Value>, ProviderError> {
        let phase = scope.phase();
        tracing::debug!(%method, url, "sending request");

        let mut request = self.client.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let what = format!("{} {}", method, url);
        let response = scope
            .run(&what, request.send())
            .await?
            .map_err(|e| ProviderError::transport(phase, format!("{} failed", what), e))?;

        let status = response.status();
        let text = scope
            .run(&what, response.text())
            .await?
            .map_err(|e| {
                let detail = format!("failed to read response body of {}", what);
                ProviderError::transport(phase, detail, e)
            })?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::warn!(status = status.as_u16(), body = %sanitize_for_log(&text), "API error");
            return Ok(Response::failed(status.as_u16(), parse_problem(status, &text)));
        }

        tracing::trace!(status = status.as_u16(), body = %sanitize_for_log(&text), "API response");

        // Handle empty response
        if text.trim().is_empty() {
            return Ok(Response::ok(status.as_u16(), None));
        }

        let data: Value = serde_json::from_str(&text).map_err(|e| {
            ProviderError::new(
                super::error::ErrorKind::Unknown,
                phase,
                "Malformed response",
                format!("{} returned a body that is not JSON", what),
            )
            .with_source(e)
        })?;

        Ok(Response::ok(status.as_u16(), Some(data)))
    }
}

/// Decode a problem document, falling back to the reason phrase
fn parse_problem(status: reqwest::StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ApiError>(body) {
        Ok(api) if api.title.is_some() || api.detail.is_some() || !api.errors.is_empty() => api,
        _ => ApiError {
            title: status.canonical_reason().map(str::to_string),
            status: Some(status.as_u16()),
            detail: if body.trim().is_empty() {
                None
            } else {
                Some(sanitize_for_log(body))
            },
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.ends_with("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc"), "abc");
    }

    #[test]
    fn test_parse_problem_document() {
        let api = parse_problem(
            reqwest::StatusCode::CONFLICT,
            r#"{"title":"Conflict","detail":"resource is in use","status":409}"#,
        );
        assert_eq!(api.title.as_deref(), Some("Conflict"));
        assert_eq!(api.detail.as_deref(), Some("resource is in use"));
    }

    #[test]
    fn test_parse_problem_falls_back_to_reason_phrase() {
        let api = parse_problem(reqwest::StatusCode::BAD_GATEWAY, "<html>upstream</html>");
        assert_eq!(api.title.as_deref(), Some("Bad Gateway"));
        assert_eq!(api.detail.as_deref(), Some("<html>upstream</html>"));
    }
}
