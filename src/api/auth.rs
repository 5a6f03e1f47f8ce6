//! Aruba Cloud Authentication
//!
//! Handles authentication using OAuth2 client credentials (API key + secret)
//! or a pre-issued bearer token.

use super::error::{ErrorKind, Phase, ProviderError};
use crate::lifecycle::scope::Scope;
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Token expiry buffer - refresh tokens this much before they actually expire
/// This prevents using tokens that are about to expire during a request
const TOKEN_EXPIRY_BUFFER: Duration = Duration::from_secs(60);

/// Default token TTL if the issuer does not say (conservative: 5 minutes)
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(5 * 60);

/// Where bearer tokens come from
#[derive(Clone)]
enum TokenSource {
    Static(String),
    ClientCredentials {
        issuer_url: String,
        client_id: String,
        client_secret: String,
    },
}

/// Credentials holder with token caching
#[derive(Clone)]
pub struct Credentials {
    source: TokenSource,
    http: reqwest::Client,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: Instant,
}

impl CachedToken {
    /// Check if this cached token is still valid
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print secrets
        let kind = match self.source {
            TokenSource::Static(_) => "static",
            TokenSource::ClientCredentials { .. } => "client_credentials",
        };
        f.debug_struct("Credentials").field("source", &kind).finish()
    }
}

impl Credentials {
    /// Credentials that always present the same bearer token
    pub fn from_token(http: reqwest::Client, token: impl Into<String>) -> Self {
        Self {
            source: TokenSource::Static(token.into()),
            http,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Credentials exchanged for tokens at `issuer_url`
    pub fn client_credentials(
        http: reqwest::Client,
        issuer_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            source: TokenSource::ClientCredentials {
                issuer_url: issuer_url.into(),
                client_id: client_id.into(),
                client_secret: client_secret.into(),
            },
            http,
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    /// Security: Checks token expiry before returning cached token
    pub async fn get_token(&self, scope: &Scope) -> Result<String, ProviderError> {
        let (issuer_url, client_id, client_secret) = match &self.source {
            TokenSource::Static(token) => return Ok(token.clone()),
            TokenSource::ClientCredentials {
                issuer_url,
                client_id,
                client_secret,
            } => (issuer_url, client_id, client_secret),
        };

        // Check cache first - but only return if token is still valid
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let phase = scope.phase();
        let request = self.http.post(issuer_url).form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
        ]);
        let response = scope
            .run("token exchange", request.send())
            .await?
            .map_err(|e| ProviderError::transport(phase, "token exchange failed", e))?;

        let status = response.status();
        if !status.is_success() {
            // The issuer body may echo the client id; do not log it
            let kind = match ErrorKind::from_status(status.as_u16()) {
                ErrorKind::Validation => ErrorKind::Permission,
                other => other,
            };
            return Err(ProviderError::new(
                kind,
                phase,
                "Authentication failed",
                format!(
                    "token issuer answered HTTP {}; check api_key and api_secret",
                    status.as_u16()
                ),
            ));
        }

        let token: TokenResponse = scope
            .run("token exchange", response.json::<TokenResponse>())
            .await?
            .map_err(|e| {
                ProviderError::transport(phase, "token issuer returned an unreadable body", e)
            })?;

        let ttl = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        let expires_at = Instant::now() + ttl.saturating_sub(TOKEN_EXPIRY_BUFFER);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.access_token.clone(),
                expires_at,
            });
        }

        tracing::debug!(
            "New token cached, expires in ~{} seconds",
            ttl.saturating_sub(TOKEN_EXPIRY_BUFFER).as_secs()
        );

        Ok(token.access_token)
    }

    /// Whether a rejected token can be replaced by a fresh exchange
    pub fn is_refreshable(&self) -> bool {
        matches!(self.source, TokenSource::ClientCredentials { .. })
    }

    /// Force the next call to fetch a fresh token
    pub async fn invalidate(&self) {
        let mut cache = self.token_cache.write().await;
        *cache = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_static_token_is_returned_verbatim() {
        let creds = Credentials::from_token(reqwest::Client::new(), "abc");
        let scope = Scope::new(CancellationToken::new(), Duration::from_secs(1), Phase::Read);
        assert_eq!(creds.get_token(&scope).await.unwrap(), "abc");
    }

    #[test]
    fn test_debug_hides_secrets() {
        let creds = Credentials::client_credentials(
            reqwest::Client::new(),
            "https://issuer.invalid/token",
            "id",
            "very-secret",
        );
        let printed = format!("{:?}", creds);
        assert!(!printed.contains("very-secret"));
        assert!(printed.contains("client_credentials"));
    }
}
