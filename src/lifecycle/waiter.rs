//! Readiness Waiter
//!
//! Polls an adapter-supplied probe with bounded exponential backoff until the
//! resource reaches a terminal state, the deadline fires, or the scope is
//! cancelled.

use super::readiness::{Readiness, Verdict};
use super::scope::Scope;
use crate::api::error::{ErrorKind, ProviderError};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;

/// Backoff bounds shared by the waiter and Delete-with-Retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub initial_interval: Duration,
    pub max_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(2), Duration::from_secs(30))
    }
}

impl PollPolicy {
    pub fn new(initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            initial_interval,
            max_interval: max_interval.max(initial_interval),
        }
    }

    /// Jittered exponential backoff; the scope deadline bounds total time
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_interval,
            initial_interval: self.initial_interval,
            randomization_factor: 0.5,
            multiplier: 2.0,
            max_interval: self.max_interval,
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }
}

/// How a 404 from the probe is read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Missing {
    /// The backend may not have published a new resource yet
    Pending,
    /// The resource was observed before; 404 means it is gone
    Gone,
}

/// Whether an error seen while waiting means "not yet"
fn is_pending_error(kind: ErrorKind, missing: Missing) -> bool {
    match kind {
        ErrorKind::Transport | ErrorKind::Server => true,
        ErrorKind::NotFound => missing == Missing::Pending,
        _ => false,
    }
}

/// Block until `probe` reports a newly created resource as active.
///
/// Returns the last successful probe output. A `failed` verdict becomes a
/// `conflict` error naming the last observed state; the deadline becomes a
/// `timeout` error; cancellation propagates immediately.
pub async fn wait_until_active<T, F, Fut>(
    scope: &Scope,
    policy: &PollPolicy,
    what: &str,
    probe: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(Readiness, T), ProviderError>>,
{
    wait_until(scope, policy, what, Missing::Pending, probe).await
}

/// Like [`wait_until_active`], with the reading of a 404 chosen by the caller
pub async fn wait_until<T, F, Fut>(
    scope: &Scope,
    policy: &PollPolicy,
    what: &str,
    missing: Missing,
    mut probe: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(Readiness, T), ProviderError>>,
{
    let mut backoff = policy.backoff();
    let mut last_state = String::from("not yet observed");
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        let outcome = match probe().await {
            Ok(out) => Ok(out),
            Err(err) if matches!(err.kind, ErrorKind::Cancelled | ErrorKind::Timeout) => {
                return Err(with_last_state(err, &last_state));
            }
            Err(err) => Err(err),
        };

        match outcome {
            Ok((readiness, value)) => {
                last_state = readiness.describe();
                tracing::trace!(what, attempt, state = %last_state, "readiness tick");
                match readiness.verdict {
                    Verdict::Active => return Ok(value),
                    Verdict::Failed => {
                        return Err(ProviderError::conflict(
                            scope.phase(),
                            "Resource entered a failed state",
                            format!("{} reported state {}", what, last_state),
                        )
                        .with_context("state", &last_state));
                    }
                    Verdict::Pending => backoff.reset(),
                }
            }
            Err(err) if is_pending_error(err.kind, missing) => {
                tracing::debug!(
                    what,
                    attempt,
                    kind = %err.kind,
                    error = %err,
                    "readiness probe failed, retrying"
                );
                last_state = format!("unavailable ({})", err.kind);
            }
            Err(err) => return Err(err),
        }

        let interval = backoff.next_backoff().unwrap_or(policy.max_interval);
        if let Err(err) = scope.sleep(interval).await {
            return Err(with_last_state(err, &last_state));
        }
        if let Err(err) = scope.check() {
            return Err(with_last_state(err, &last_state));
        }
    }
}

fn with_last_state(err: ProviderError, last_state: &str) -> ProviderError {
    if err.kind == ErrorKind::Timeout {
        let detail = format!("{}; last observed state: {}", err.detail, last_state);
        ProviderError {
            detail,
            ..err
        }
        .with_context("state", last_state)
    } else {
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::Phase;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    fn fast() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), Duration::from_millis(5))
    }

    fn scope(timeout: Duration) -> Scope {
        Scope::new(CancellationToken::new(), timeout, Phase::Create)
    }

    #[tokio::test]
    async fn test_waits_through_creating_states() {
        let states = ["InCreation", "InCreation", "Active"];
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let out = wait_until_active(&scope(Duration::from_secs(5)), &fast(), "eip", move || {
            let n = c.fetch_add(1, Ordering::SeqCst) as usize;
            async move { Ok((Readiness::from_state(Some(states[n])), n)) }
        })
        .await
        .unwrap();
        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_failed_state_is_conflict() {
        let err = wait_until_active(&scope(Duration::from_secs(5)), &fast(), "vpc", || async {
            Ok((Readiness::from_state(Some("Failed")), ()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert!(err.detail.contains("Failed"));
    }

    #[tokio::test]
    async fn test_not_found_during_create_is_pending() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        wait_until_active(&scope(Duration::from_secs(5)), &fast(), "server", move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ProviderError::new(ErrorKind::NotFound, Phase::Create, "Not Found", "404"))
                } else {
                    Ok((Readiness::active(), ()))
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_not_found_after_creation_is_terminal() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let scope = Scope::new(CancellationToken::new(), Duration::from_secs(60), Phase::Update);
        let err = wait_until(&scope, &fast(), "server", Missing::Gone, move || {
            c.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(Readiness, ()), _>(ProviderError::new(
                    ErrorKind::NotFound,
                    Phase::Update,
                    "Not Found",
                    "404",
                ))
            }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permission_error_is_terminal() {
        let err = wait_until_active(&scope(Duration::from_secs(5)), &fast(), "kms", || async {
            Err::<(Readiness, ()), _>(ProviderError::new(
                ErrorKind::Permission,
                Phase::Create,
                "Forbidden",
                "no access",
            ))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permission);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_reports_last_state() {
        let scope = scope(Duration::from_secs(3));
        let err = wait_until_active(&scope, &PollPolicy::default(), "dbaas", || async {
            Ok((Readiness::from_state(Some("InCreation")), ()))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.detail.contains("InCreation"));
    }

    #[tokio::test]
    async fn test_cancellation_propagates() {
        let token = CancellationToken::new();
        let scope = Scope::new(token.clone(), Duration::from_secs(60), Phase::Create);
        let trigger = token.clone();
        let err = wait_until_active(&scope, &PollPolicy::default(), "kaas", move || {
            trigger.cancel();
            async { Ok((Readiness::from_state(Some("InCreation")), ())) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Cancelled);
    }

    #[test]
    fn test_backoff_is_bounded() {
        let policy = PollPolicy::new(Duration::from_millis(100), Duration::from_millis(400));
        let mut b = policy.backoff();
        for _ in 0..20 {
            let next = b.next_backoff().unwrap();
            // randomization may push up to 1.5x the capped interval
            assert!(next <= Duration::from_millis(600));
        }
    }
}
