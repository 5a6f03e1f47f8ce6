//! Cancellable operation scope
//!
//! Every suspension point in the core (REST calls, readiness sleeps, delete
//! retries) races the scope's cancellation token and its deadline.

use crate::api::error::{Phase, ProviderError};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Scope of a single lifecycle operation
#[derive(Debug, Clone)]
pub struct Scope {
    cancel: CancellationToken,
    deadline: Instant,
    phase: Phase,
}

impl Scope {
    /// Derive a scope from the orchestrator's token, bounded by `timeout`
    pub fn new(cancel: CancellationToken, timeout: Duration, phase: Phase) -> Self {
        Self {
            cancel,
            deadline: Instant::now() + timeout,
            phase,
        }
    }

    /// Same cancellation and deadline, different phase
    pub fn with_phase(&self, phase: Phase) -> Self {
        Self {
            cancel: self.cancel.clone(),
            deadline: self.deadline,
            phase,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Fail fast if the scope is already over
    pub fn check(&self) -> Result<(), ProviderError> {
        if self.cancel.is_cancelled() {
            return Err(ProviderError::cancelled(self.phase));
        }
        if Instant::now() >= self.deadline {
            return Err(ProviderError::timeout(
                self.phase,
                "the per-resource timeout expired",
            ));
        }
        Ok(())
    }

    /// Run `fut` unless cancellation or the deadline fires first
    pub async fn run<F, T>(&self, what: &str, fut: F) -> Result<T, ProviderError>
    where
        F: Future<Output = T>,
    {
        self.check()?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::cancelled(self.phase)),
            _ = tokio::time::sleep_until(self.deadline) => Err(ProviderError::timeout(
                self.phase,
                format!("the per-resource timeout expired while waiting for {}", what),
            )),
            out = fut => Ok(out),
        }
    }

    /// Sleep for `interval`, clipped to the deadline; observes cancellation
    pub async fn sleep(&self, interval: Duration) -> Result<(), ProviderError> {
        self.check()?;
        let wake = std::cmp::min(Instant::now() + interval, self.deadline);
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProviderError::cancelled(self.phase)),
            _ = tokio::time::sleep_until(wake) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorKind;

    #[tokio::test]
    async fn test_run_completes_inside_deadline() {
        let scope = Scope::new(CancellationToken::new(), Duration::from_secs(5), Phase::Read);
        let out = tokio_test::assert_ok!(scope.run("value", async { 7 }).await);
        assert_eq!(out, 7);
        tokio_test::assert_ok!(scope.check());
    }

    #[tokio::test]
    async fn test_run_observes_cancellation() {
        let token = CancellationToken::new();
        let scope = Scope::new(token.clone(), Duration::from_secs(5), Phase::Create);
        token.cancel();
        let err = scope
            .run("never", std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_observes_deadline() {
        let scope = Scope::new(CancellationToken::new(), Duration::from_millis(50), Phase::Delete);
        let err = scope
            .run("never", std::future::pending::<()>())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert_eq!(err.phase, Phase::Delete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_is_clipped_to_deadline() {
        let scope = Scope::new(CancellationToken::new(), Duration::from_millis(100), Phase::Create);
        let started = Instant::now();
        scope.sleep(Duration::from_secs(60)).await.unwrap();
        assert!(started.elapsed() <= Duration::from_millis(100));
        assert_eq!(scope.check().unwrap_err().kind, ErrorKind::Timeout);
    }
}
