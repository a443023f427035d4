// src/store/retry.rs

use std::{future::Future, time::Duration};

use super::StoreError;

/// Outcome of one optimistic attempt.
#[derive(Debug)]
pub enum Txn<E> {
    /// The document changed underneath us; worth another attempt.
    Conflict(StoreError),
    /// Any other failure; returned to the caller as-is.
    Abort(E),
}

impl<E: From<StoreError>> From<StoreError> for Txn<E> {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::VersionConflict { .. } => Txn::Conflict(err),
            other => Txn::Abort(E::from(other)),
        }
    }
}

/// Bounded linear backoff: attempt `n` failing waits `step * n`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub step: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            step: Duration::from_millis(50),
        }
    }
}

/// Runs `op` until it succeeds, aborts, or has conflicted `max_attempts` times.
///
/// `op` receives the 1-based attempt number. The last conflict is converted
/// into `E` when the budget runs out.
pub async fn retry_on_conflict<T, E, F, Fut>(policy: RetryPolicy, mut op: F) -> Result<T, E>
where
    E: From<StoreError>,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, Txn<E>>>,
{
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(Txn::Abort(err)) => return Err(err),
            Err(Txn::Conflict(err)) if attempt >= policy.max_attempts => {
                tracing::error!("Giving up after {} conflicting attempts: {}", attempt, err);
                return Err(E::from(err));
            }
            Err(Txn::Conflict(err)) => {
                tracing::warn!("{} (attempt {}), retrying", err, attempt);
                tokio::time::sleep(policy.step * attempt).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collection;

    fn conflict() -> StoreError {
        StoreError::VersionConflict {
            collection: Collection::Users,
            id: "u1".to_string(),
        }
    }

    fn fast() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            step: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn succeeds_after_transient_conflicts() {
        let mut calls = 0;
        let result: Result<u32, StoreError> = retry_on_conflict(fast(), |attempt| {
            calls += 1;
            async move {
                if attempt < 3 {
                    Err(Txn::Conflict(conflict()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let mut calls = 0;
        let result: Result<(), StoreError> = retry_on_conflict(fast(), |_| {
            calls += 1;
            async { Err(Txn::Conflict(conflict())) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::VersionConflict { .. })));
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn abort_is_not_retried() {
        let mut calls = 0;
        let result: Result<(), StoreError> = retry_on_conflict(fast(), |_| {
            calls += 1;
            async { Err(Txn::Abort(StoreError::Backend("down".to_string()))) }
        })
        .await;

        assert!(matches!(result, Err(StoreError::Backend(_))));
        assert_eq!(calls, 1);
    }

    #[test]
    fn store_errors_classify_into_txn() {
        let txn: Txn<StoreError> = conflict().into();
        assert!(matches!(txn, Txn::Conflict(_)));

        let txn: Txn<StoreError> = StoreError::Backend("x".to_string()).into();
        assert!(matches!(txn, Txn::Abort(StoreError::Backend(_))));
    }
}
