//! Readiness status of a remote resource

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessStatus {
    Creating,
    Active,
    Error,
    Gone,
    Unknown,
}

/// What the waiter does with a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pending,
    Active,
    Failed,
}

impl ReadinessStatus {
    /// Map a backend `status.state` string; `None` means the resource has no
    /// state field, and a readable resource without one is active
    pub fn from_state(state: Option<&str>) -> Self {
        let Some(state) = state else {
            return Self::Active;
        };
        match state.to_ascii_lowercase().as_str() {
            "increation" | "creating" | "provisioning" | "pending" | "updating" | "deleting"
            | "inupdate" | "indeletion" => Self::Creating,
            "active" | "running" | "available" | "ready" | "used" | "notused" | "attached"
            | "detached" | "completed" | "enabled" | "disabled" | "stopped" => Self::Active,
            "error" | "failed" | "failure" => Self::Error,
            "deleted" => Self::Gone,
            _ => Self::Unknown,
        }
    }

    /// Default decision rule; adapters may override per resource
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::Active => Verdict::Active,
            Self::Error | Self::Gone => Verdict::Failed,
            Self::Creating | Self::Unknown => Verdict::Pending,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::Active => "active",
            Self::Error => "error",
            Self::Gone => "gone",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ReadinessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One readiness observation: the classified status plus the raw state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Readiness {
    pub status: ReadinessStatus,
    pub verdict: Verdict,
    /// Raw backend state, kept for diagnostics
    pub state: Option<String>,
    pub failure_reason: Option<String>,
}

impl Readiness {
    pub fn from_state(state: Option<&str>) -> Self {
        let status = ReadinessStatus::from_state(state);
        Self {
            status,
            verdict: status.verdict(),
            state: state.map(str::to_string),
            failure_reason: None,
        }
    }

    pub fn active() -> Self {
        Self::from_state(None)
    }

    pub fn with_failure_reason(mut self, reason: Option<String>) -> Self {
        self.failure_reason = reason;
        self
    }

    pub fn describe(&self) -> String {
        let state = self.state.as_deref().unwrap_or(self.status.as_str());
        match &self.failure_reason {
            Some(reason) => format!("{} ({})", state, reason),
            None => state.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_mapping() {
        assert_eq!(ReadinessStatus::from_state(Some("InCreation")), ReadinessStatus::Creating);
        assert_eq!(ReadinessStatus::from_state(Some("Active")), ReadinessStatus::Active);
        assert_eq!(ReadinessStatus::from_state(Some("ACTIVE")), ReadinessStatus::Active);
        assert_eq!(ReadinessStatus::from_state(Some("NotUsed")), ReadinessStatus::Active);
        assert_eq!(ReadinessStatus::from_state(Some("Failed")), ReadinessStatus::Error);
        assert_eq!(ReadinessStatus::from_state(Some("Rebooting")), ReadinessStatus::Unknown);
        assert_eq!(ReadinessStatus::from_state(None), ReadinessStatus::Active);
    }

    #[test]
    fn test_verdicts() {
        assert_eq!(ReadinessStatus::Creating.verdict(), Verdict::Pending);
        assert_eq!(ReadinessStatus::Unknown.verdict(), Verdict::Pending);
        assert_eq!(ReadinessStatus::Active.verdict(), Verdict::Active);
        assert_eq!(ReadinessStatus::Error.verdict(), Verdict::Failed);
    }

    #[test]
    fn test_describe_includes_failure_reason() {
        let r = Readiness::from_state(Some("Error"))
            .with_failure_reason(Some("quota exceeded".into()));
        assert_eq!(r.describe(), "Error (quota exceeded)");
    }
}
