//! Configuration Management
//!
//! Provider-level settings handed over by the orchestrator's `configure`
//! call. Every field is optional on the wire; the `effective_*` accessors
//! apply defaults.

use crate::api::error::{Phase, ProviderError};
use crate::lifecycle::schema::{Attribute, ResourceSchema};
use crate::lifecycle::waiter::PollPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.arubacloud.com";
pub const DEFAULT_TOKEN_ISSUER_URL: &str =
    "https://login.aruba.it/auth/realms/cmp-new-apikey/protocol/openid-connect/token";
pub const DEFAULT_API_VERSION: &str = "1.0";
pub const DEFAULT_RESOURCE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_POLL_INITIAL_MS: u64 = 2_000;
const DEFAULT_POLL_MAX_MS: u64 = 30_000;

/// A duration given either as integer seconds or as `"90s"`, `"10m"`, `"1h"`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationSetting {
    Seconds(u64),
    Text(String),
}

impl DurationSetting {
    pub fn to_duration(&self) -> Result<Duration, ProviderError> {
        match self {
            Self::Seconds(secs) => Ok(Duration::from_secs(*secs)),
            Self::Text(text) => parse_duration(text),
        }
    }
}

/// Parse `"<n>[s|m|h]"`; a bare number is seconds
pub fn parse_duration(text: &str) -> Result<Duration, ProviderError> {
    let text = text.trim();
    let invalid = || {
        ProviderError::validation(
            Phase::Configure,
            "Invalid duration",
            format!("'{}' is not a duration like 90s, 10m or 1h", text),
        )
        .with_attribute("resource_timeout")
    };
    let (digits, unit) = match text.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => text.split_at(idx),
        None => (text, "s"),
    };
    let value: u64 = digits.parse().map_err(|_| invalid())?;
    let secs = match unit {
        "s" => value,
        "m" => value * 60,
        "h" => value * 3600,
        _ => return Err(invalid()),
    };
    if secs == 0 {
        return Err(invalid());
    }
    Ok(Duration::from_secs(secs))
}

fn check_url(attribute: &str, value: &str) -> Result<(), ProviderError> {
    let invalid = |detail: String| {
        ProviderError::validation(Phase::Configure, "Invalid endpoint", detail)
            .with_attribute(attribute)
    };
    let parsed =
        Url::parse(value).map_err(|e| invalid(format!("'{}' is not a URL: {}", value, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("'{}' uses unsupported scheme '{}'", value, other))),
    }
}

/// Descriptor of the provider configuration block, published by `get_schema`
pub fn schema() -> ResourceSchema {
    ResourceSchema::new(crate::PROVIDER_NAME, "Aruba Cloud provider configuration")
        .attribute(Attribute::string("api_key").describe("OAuth2 client id"))
        .attribute(Attribute::string("api_secret").sensitive().describe("OAuth2 client secret"))
        .attribute(Attribute::string("token").sensitive().describe("Pre-issued bearer token"))
        .attribute(Attribute::string("base_url").describe("REST endpoint"))
        .attribute(Attribute::string("token_issuer_url").describe("OAuth2 token endpoint"))
        .attribute(
            Attribute::string("api_version").describe("Value of the api-version query parameter"),
        )
        .attribute(
            Attribute::string("resource_timeout").describe("Per-operation deadline, e.g. 10m"),
        )
        .attribute(Attribute::int64("poll_initial_interval_ms"))
        .attribute(Attribute::int64("poll_max_interval_ms"))
}

/// Provider configuration
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    /// OAuth2 client id
    #[serde(default)]
    pub api_key: Option<String>,
    /// OAuth2 client secret
    #[serde(default)]
    pub api_secret: Option<String>,
    /// Pre-issued bearer token; skips the OAuth2 exchange
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token_issuer_url: Option<String>,
    #[serde(default)]
    pub api_version: Option<String>,
    /// Per-resource operation timeout
    #[serde(default)]
    pub resource_timeout: Option<DurationSetting>,
    #[serde(default)]
    pub poll_initial_interval_ms: Option<u64>,
    #[serde(default)]
    pub poll_max_interval_ms: Option<u64>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key)
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("resource_timeout", &self.resource_timeout)
            .finish()
    }
}

impl ProviderConfig {
    /// Decode the orchestrator's configuration object
    pub fn from_value(value: serde_json::Value) -> Result<Self, ProviderError> {
        serde_json::from_value(value).map_err(|e| {
            ProviderError::validation(
                Phase::Configure,
                "Invalid provider configuration",
                e.to_string(),
            )
        })
    }

    /// Check that enough credentials are present to talk to the API
    pub fn validate(&self) -> Result<(), ProviderError> {
        self.effective_resource_timeout()?;
        check_url("base_url", &self.effective_base_url())?;
        check_url("token_issuer_url", &self.effective_token_issuer_url())?;
        let has_token = self.token.as_deref().is_some_and(|t| !t.is_empty());
        if has_token {
            return Ok(());
        }
        let missing = |attr: &str| {
            ProviderError::validation(
                Phase::Configure,
                "Missing credentials",
                format!("'{}' is required unless 'token' is set", attr),
            )
            .with_attribute(attr)
        };
        if self.api_key.as_deref().map_or(true, str::is_empty) {
            return Err(missing("api_key"));
        }
        if self.api_secret.as_deref().map_or(true, str::is_empty) {
            return Err(missing("api_secret"));
        }
        Ok(())
    }

    /// Get effective REST endpoint (config > default), without trailing slash
    pub fn effective_base_url(&self) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn effective_token_issuer_url(&self) -> String {
        self.token_issuer_url
            .clone()
            .unwrap_or_else(|| DEFAULT_TOKEN_ISSUER_URL.to_string())
    }

    pub fn effective_api_version(&self) -> String {
        self.api_version
            .clone()
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string())
    }

    pub fn effective_resource_timeout(&self) -> Result<Duration, ProviderError> {
        match &self.resource_timeout {
            Some(setting) => setting.to_duration(),
            None => Ok(DEFAULT_RESOURCE_TIMEOUT),
        }
    }

    pub fn effective_poll_policy(&self) -> PollPolicy {
        let initial = self.poll_initial_interval_ms.unwrap_or(DEFAULT_POLL_INITIAL_MS);
        let max = self.poll_max_interval_ms.unwrap_or(DEFAULT_POLL_MAX_MS).max(initial);
        PollPolicy::new(Duration::from_millis(initial), Duration::from_millis(max))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_apply() {
        let cfg = ProviderConfig::from_value(json!({"token": "t"})).unwrap();
        assert_eq!(cfg.effective_base_url(), DEFAULT_BASE_URL);
        assert_eq!(cfg.effective_api_version(), "1.0");
        assert_eq!(cfg.effective_resource_timeout().unwrap(), DEFAULT_RESOURCE_TIMEOUT);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_timeout_accepts_seconds_and_text() {
        let cfg =
            ProviderConfig::from_value(json!({"token": "t", "resource_timeout": 90})).unwrap();
        assert_eq!(cfg.effective_resource_timeout().unwrap(), Duration::from_secs(90));

        let cfg =
            ProviderConfig::from_value(json!({"token": "t", "resource_timeout": "15m"})).unwrap();
        assert_eq!(cfg.effective_resource_timeout().unwrap(), Duration::from_secs(900));
    }

    #[test]
    fn test_bad_duration_is_validation_error() {
        assert!(parse_duration("ten minutes").is_err());
        assert!(parse_duration("5d").is_err());
        assert!(parse_duration("0s").is_err());
        assert_eq!(parse_duration("2h").unwrap(), Duration::from_secs(7200));
        assert_eq!(parse_duration("45").unwrap(), Duration::from_secs(45));
    }

    #[test]
    fn test_missing_secret_is_reported() {
        let cfg = ProviderConfig::from_value(json!({"api_key": "id"})).unwrap();
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.attribute.as_deref(), Some("api_secret"));
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = json!({"token": "t", "base_url": "http://localhost:8080/"});
        let cfg = ProviderConfig::from_value(config).unwrap();
        assert_eq!(cfg.effective_base_url(), "http://localhost:8080");
    }

    #[test]
    fn test_endpoint_must_be_http() {
        let config = json!({"token": "t", "base_url": "ftp://api.example"});
        let cfg = ProviderConfig::from_value(config).unwrap();
        assert_eq!(cfg.validate().unwrap_err().attribute.as_deref(), Some("base_url"));

        let cfg =
            ProviderConfig::from_value(json!({"token": "t", "base_url": "not a url"})).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_schema_marks_secrets() {
        let schema = schema();
        assert!(schema.get("api_secret").unwrap().sensitive);
        assert!(!schema.get("base_url").unwrap().sensitive);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let cfg =
            ProviderConfig::from_value(json!({"api_key": "id", "api_secret": "hunter2"})).unwrap();
        assert!(!format!("{:?}", cfg).contains("hunter2"));
    }
}
