//! Delete-with-Retry
//!
//! Issues the remote delete until the backend reports the resource gone.
//! `not-found` is success; transport, conflict and server failures are
//! retried with backoff until the deadline; validation and permission
//! failures are surfaced immediately.

use super::scope::Scope;
use super::waiter::PollPolicy;
use crate::api::envelope::Response;
use crate::api::error::{ErrorKind, ProviderError};
use backoff::backoff::Backoff;
use serde_json::Value;
use std::future::Future;

/// Outcome of one existence check after the delete was accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Gone,
    Present,
}

/// Delete until gone.
///
/// `delete` issues one DELETE call. After the API accepts the deletion,
/// `exists` is polled until it reports [`Presence::Gone`].
pub async fn delete_with_retry<D, DFut, E, EFut>(
    scope: &Scope,
    policy: &PollPolicy,
    what: &str,
    mut delete: D,
    mut exists: E,
) -> Result<(), ProviderError>
where
    D: FnMut() -> DFut,
    DFut: Future<Output = Result<Response<Value>, ProviderError>>,
    E: FnMut() -> EFut,
    EFut: Future<Output = Result<Presence, ProviderError>>,
{
    let phase = scope.phase();
    let mut backoff = policy.backoff();
    let mut attempt: u32 = 0;
    let mut accepted = false;

    loop {
        attempt += 1;

        if !accepted {
            let failure = match delete().await {
                Ok(resp) if resp.is_not_found() => {
                    tracing::trace!(what, attempt, "delete converged on not-found");
                    return Ok(());
                }
                Ok(resp) => match resp.to_error(phase) {
                    None => {
                        tracing::trace!(what, attempt, status = resp.status, "delete accepted");
                        accepted = true;
                        None
                    }
                    Some(err) => Some(err),
                },
                Err(err) => Some(err),
            };

            if let Some(err) = failure {
                if !err.kind.is_delete_retryable() {
                    return Err(err);
                }
                tracing::debug!(
                    what,
                    attempt,
                    kind = %err.kind,
                    error = %err,
                    "delete failed, retrying"
                );
                sleep_or_fail(scope, &mut backoff, policy, err).await?;
                continue;
            }
        }

        match exists().await {
            Ok(Presence::Gone) => {
                tracing::trace!(what, attempt, "resource is gone");
                return Ok(());
            }
            Ok(Presence::Present) => {
                tracing::trace!(what, attempt, "resource still present after delete");
            }
            Err(err) if err.kind.is_delete_retryable() => {
                tracing::debug!(
                    what,
                    attempt,
                    kind = %err.kind,
                    "existence check failed, retrying"
                );
            }
            Err(err) => return Err(err),
        }

        let interval = backoff.next_backoff().unwrap_or(policy.max_interval);
        scope.sleep(interval).await.map_err(|e| annotate(e, what))?;
        scope.check().map_err(|e| annotate(e, what))?;
    }
}

async fn sleep_or_fail(
    scope: &Scope,
    backoff: &mut backoff::ExponentialBackoff,
    policy: &PollPolicy,
    last: ProviderError,
) -> Result<(), ProviderError> {
    let interval = backoff.next_backoff().unwrap_or(policy.max_interval);
    let outcome = async {
        scope.sleep(interval).await?;
        scope.check()
    }
    .await;
    outcome.map_err(|err| {
        if err.kind == ErrorKind::Timeout {
            // Surface what kept failing rather than a bare timeout
            let detail = format!("{}; last error: {}", err.detail, last);
            ProviderError { detail, ..err }.with_source(last)
        } else {
            err
        }
    })
}

fn annotate(err: ProviderError, what: &str) -> ProviderError {
    err.with_context("resource", what)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::{ApiError, Phase};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn fast() -> PollPolicy {
        PollPolicy::new(Duration::from_millis(1), Duration::from_millis(5))
    }

    fn scope(timeout: Duration) -> Scope {
        Scope::new(CancellationToken::new(), timeout, Phase::Delete)
    }

    fn status(code: u16) -> Response<Value> {
        if (200..300).contains(&code) {
            Response::ok(code, None)
        } else {
            Response::failed(code, ApiError::default())
        }
    }

    #[tokio::test]
    async fn test_conflicts_then_not_found() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        delete_with_retry(
            &scope(Duration::from_secs(5)),
            &fast(),
            "vpc",
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move { Ok(status(if n < 3 { 409 } else { 404 })) }
            },
            || async { Ok(Presence::Present) },
        )
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_accepted_then_polls_until_gone() {
        let probes = Arc::new(AtomicU32::new(0));
        let p = probes.clone();
        delete_with_retry(
            &scope(Duration::from_secs(5)),
            &fast(),
            "subnet",
            || async { Ok(status(202)) },
            move || {
                let n = p.fetch_add(1, Ordering::SeqCst);
                async move { Ok(if n < 2 { Presence::Present } else { Presence::Gone }) }
            },
        )
        .await
        .unwrap();
        assert_eq!(probes.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permission_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let err = delete_with_retry(
            &scope(Duration::from_secs(5)),
            &fast(),
            "kms",
            move || {
                c.fetch_add(1, Ordering::SeqCst);
                async { Ok(status(403)) }
            },
            || async { Ok(Presence::Present) },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Permission);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_surfaces_last_error() {
        let err = delete_with_retry(
            &scope(Duration::from_secs(2)),
            &PollPolicy::default(),
            "dbaas",
            || async { Ok(status(409)) },
            || async { Ok(Presence::Present) },
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Timeout);
        assert!(err.detail.contains("last error"));
    }

    #[tokio::test]
    async fn test_transport_errors_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        delete_with_retry(
            &scope(Duration::from_secs(5)),
            &fast(),
            "eip",
            move || {
                let n = c.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(ProviderError::new(
                            ErrorKind::Transport,
                            Phase::Delete,
                            "Transport error",
                            "reset",
                        ))
                    } else {
                        Ok(status(404))
                    }
                }
            },
            || async { Ok(Presence::Present) },
        )
        .await
        .unwrap();
    }
}
