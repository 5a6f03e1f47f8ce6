//! Aruba Cloud Client
//!
//! Process-wide client bundle: credentials, transport, endpoint, and the
//! per-resource timeout and polling bounds. Built once by `configure` and
//! shared read-only by every adapter.

use super::auth::Credentials;
use super::envelope::Response;
use super::error::{ErrorKind, Phase, ProviderError};
use super::http::HttpClient;
use crate::config::ProviderConfig;
use crate::lifecycle::scope::Scope;
use crate::lifecycle::waiter::PollPolicy;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Main Aruba Cloud client
#[derive(Debug, Clone)]
pub struct Client {
    credentials: Credentials,
    http: HttpClient,
    base_url: String,
    api_version: String,
    resource_timeout: Duration,
    poll: PollPolicy,
}

impl Client {
    /// Build the bundle from validated provider configuration
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        let http = HttpClient::new()?;

        let credentials = match config.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => Credentials::from_token(http.inner().clone(), token),
            None => Credentials::client_credentials(
                http.inner().clone(),
                config.effective_token_issuer_url(),
                config.api_key.clone().unwrap_or_default(),
                config.api_secret.clone().unwrap_or_default(),
            ),
        };

        let client = Self {
            credentials,
            http,
            base_url: config.effective_base_url(),
            api_version: config.effective_api_version(),
            resource_timeout: config.effective_resource_timeout()?,
            poll: config.effective_poll_policy(),
        };
        tracing::debug!(
            base_url = %client.base_url,
            api_version = %client.api_version,
            timeout_secs = client.resource_timeout.as_secs(),
            "client configured"
        );
        Ok(client)
    }

    pub fn resource_timeout(&self) -> Duration {
        self.resource_timeout
    }

    pub fn poll_policy(&self) -> &PollPolicy {
        &self.poll
    }

    /// Scope for one lifecycle operation, bounded by the resource timeout
    pub fn scope(&self, cancel: CancellationToken, phase: Phase) -> Scope {
        Scope::new(cancel, self.resource_timeout, phase)
    }

    /// Absolute URL of a canonical URI, with the API version attached
    pub fn url(&self, uri: &str) -> String {
        let sep = if uri.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}api-version={}",
            self.base_url,
            uri,
            sep,
            urlencoding::encode(&self.api_version)
        )
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        scope: &Scope,
        uri: &str,
    ) -> Result<Response<T>, ProviderError> {
        let url = self.url(uri);
        let resp = self
            .authorized(scope, |token| {
                let url = &url;
                async move { self.http.get(scope, url, &token).await }
            })
            .await?;
        decode(resp, scope.phase(), uri)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        scope: &Scope,
        uri: &str,
        body: &B,
    ) -> Result<Response<T>, ProviderError> {
        let url = self.url(uri);
        let body = encode(body, scope.phase())?;
        let resp = self
            .authorized(scope, |token| {
                let (url, body) = (&url, &body);
                async move { self.http.post(scope, url, &token, body).await }
            })
            .await?;
        decode(resp, scope.phase(), uri)
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        scope: &Scope,
        uri: &str,
        body: &B,
    ) -> Result<Response<T>, ProviderError> {
        let url = self.url(uri);
        let body = encode(body, scope.phase())?;
        let resp = self
            .authorized(scope, |token| {
                let (url, body) = (&url, &body);
                async move { self.http.put(scope, url, &token, body).await }
            })
            .await?;
        decode(resp, scope.phase(), uri)
    }

    pub async fn delete(&self, scope: &Scope, uri: &str) -> Result<Response<Value>, ProviderError> {
        let url = self.url(uri);
        self.authorized(scope, |token| {
            let url = &url;
            async move { self.http.delete(scope, url, &token).await }
        })
        .await
    }

    /// Attach a bearer token; a 401 with exchangeable credentials refreshes
    /// the token once
    async fn authorized<F, Fut>(
        &self,
        scope: &Scope,
        send: F,
    ) -> Result<Response<Value>, ProviderError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Response<Value>, ProviderError>>,
    {
        let token = self.credentials.get_token(scope).await?;
        let resp = send(token).await?;
        if resp.status == 401 && self.credentials.is_refreshable() {
            tracing::debug!("bearer token rejected, refreshing");
            self.credentials.invalidate().await;
            let token = self.credentials.get_token(scope).await?;
            return send(token).await;
        }
        Ok(resp)
    }
}

fn encode<B: Serialize>(body: &B, phase: Phase) -> Result<Value, ProviderError> {
    serde_json::to_value(body).map_err(|e| {
        ProviderError::new(ErrorKind::Unknown, phase, "Invalid request body", e.to_string())
    })
}

fn decode<T: DeserializeOwned>(
    resp: Response<Value>,
    phase: Phase,
    uri: &str,
) -> Result<Response<T>, ProviderError> {
    let Response {
        data,
        error,
        status,
    } = resp;
    let data = data
        .map(serde_json::from_value::<T>)
        .transpose()
        .map_err(|e| {
            ProviderError::new(
                ErrorKind::Unknown,
                phase,
                "Malformed response",
                format!("unexpected payload from {}: {}", uri, e),
            )
            .with_source(e)
        })?;
    Ok(Response {
        data,
        error,
        status,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> Client {
        let config = ProviderConfig::from_value(json!({
            "token": "t",
            "base_url": "https://api.example.test/",
            "api_version": "1.1"
        }))
        .unwrap();
        Client::from_config(&config).unwrap()
    }

    #[test]
    fn test_url_carries_api_version() {
        let c = client();
        assert_eq!(c.url("/projects/P1"), "https://api.example.test/projects/P1?api-version=1.1");
        assert_eq!(
            c.url("/projects?filter=x"),
            "https://api.example.test/projects?filter=x&api-version=1.1"
        );
    }

    #[test]
    fn test_missing_credentials_fail_configure() {
        let config = ProviderConfig::from_value(json!({"api_key": "k"})).unwrap();
        let err = Client::from_config(&config).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(err.phase, Phase::Configure);
    }

    #[test]
    fn test_decode_reports_malformed_payload() {
        let resp = Response::ok(200, Some(json!({"n": "not a number"})));
        #[derive(Debug, serde::Deserialize)]
        struct Shape {
            #[allow(dead_code)]
            n: u32,
        }
        let err = decode::<Shape>(resp, Phase::Read, "/projects/P1").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unknown);
        assert!(err.detail.contains("/projects/P1"));
    }
}
