// Copyright (c) 2026 Northlake Labs
// SPDX-License-Identifier: Apache-2.0

//! Retry and Polling Primitives
//!
//! One reusable, cancellable, timeout-bounded wait shared by the HTTP
//! gateway, promotion verification and the identity provisioner. There are
//! no other polling loops in the engine.
//!
//! Backoff is full-jitter exponential: the sleep before attempt `n` is drawn
//! uniformly from `0..=min(max_delay, base_delay * 2^(n-1))`. A
//! server-provided `Retry-After` takes precedence over the computed delay.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::EngineError;

// ============================================================================
// Policies
// ============================================================================

/// Bounded-retry policy for transiently failing calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Full-jitter delay before the next attempt, `attempt` counting from 1.
    fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let cap = self
            .base_delay
            .saturating_mul(1u32 << exp)
            .min(self.max_delay);
        let millis = cap.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(0..=millis))
    }
}

/// Time budget for polling a long-running operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PollBudget {
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for PollBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(600),
            interval: Duration::from_secs(5),
        }
    }
}

// ============================================================================
// Fault classification
// ============================================================================

/// Outcome classification for one attempt of a retriable call.
#[derive(Debug)]
pub enum Fault {
    /// Worth retrying: rate limit, 5xx, transport error.
    Transient {
        reason: String,
        retry_after: Option<Duration>,
    },
    /// Not worth retrying; surfaced unchanged.
    Fatal(EngineError),
}

impl Fault {
    pub fn transient(reason: impl Into<String>) -> Self {
        Fault::Transient {
            reason: reason.into(),
            retry_after: None,
        }
    }
}

// ============================================================================
// Primitives
// ============================================================================

/// Run `op` until it succeeds, fails fatally, is cancelled, or the attempt
/// budget is exhausted (then [`EngineError::RemoteUnavailable`]).
pub async fn retry_with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Fault>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(Fault::Fatal(err)) => return Err(err),
            Err(Fault::Transient {
                reason,
                retry_after,
            }) => {
                if attempt >= policy.max_attempts {
                    warn!(label, attempts = attempt, %reason, "retry budget exhausted");
                    return Err(EngineError::RemoteUnavailable {
                        attempts: attempt,
                        reason,
                    });
                }
                let delay = retry_after.unwrap_or_else(|| policy.delay_for(attempt));
                debug!(label, attempt, delay_ms = delay.as_millis() as u64, %reason, "transient fault, backing off");
                tokio::select! {
                    _ = cancel.cancelled() => return Err(EngineError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Poll `poll` until it yields a value, the budget expires
/// ([`EngineError::OperationTimedOut`]), or the token is cancelled.
///
/// `Ok(None)` means "not terminal yet"; errors from `poll` pass through
/// unchanged. Suspension between polls is cooperative, never busy-waiting.
pub async fn poll_until<T, F, Fut>(
    budget: &PollBudget,
    cancel: &CancellationToken,
    operation: &str,
    mut poll: F,
) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>, EngineError>>,
{
    let deadline = tokio::time::Instant::now() + budget.timeout;
    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if let Some(value) = poll().await? {
            return Ok(value);
        }
        if tokio::time::Instant::now() + budget.interval >= deadline {
            return Err(EngineError::OperationTimedOut {
                operation: operation.to_string(),
                timeout: budget.timeout,
            });
        }
        tokio::select! {
            _ = cancel.cancelled() => return Err(EngineError::Cancelled),
            _ = tokio::time::sleep(budget.interval) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    #[tokio::test]
    async fn retry_recovers_from_transient_faults() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let result = retry_with_backoff(&fast_policy(5), &token, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Fault::transient("503"))
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_exhaustion_surfaces_remote_unavailable() {
        let token = CancellationToken::new();
        let result: Result<(), _> = retry_with_backoff(&fast_policy(3), &token, "test", || async {
            Err(Fault::transient("429"))
        })
        .await;
        match result.unwrap_err() {
            EngineError::RemoteUnavailable { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn fatal_faults_short_circuit() {
        let calls = AtomicU32::new(0);
        let token = CancellationToken::new();
        let result: Result<(), _> = retry_with_backoff(&fast_policy(5), &token, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(Fault::Fatal(EngineError::RemoteRejected {
                    status: 404,
                    message: "missing".into(),
                }))
            }
        })
        .await;
        assert!(matches!(
            result.unwrap_err(),
            EngineError::RemoteRejected { status: 404, .. }
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn poll_until_times_out() {
        let budget = PollBudget {
            timeout: Duration::from_millis(10),
            interval: Duration::from_millis(2),
        };
        let token = CancellationToken::new();
        let result: Result<(), _> =
            poll_until(&budget, &token, "attach identity", || async { Ok(None) }).await;
        match result.unwrap_err() {
            EngineError::OperationTimedOut { operation, .. } => {
                assert_eq!(operation, "attach identity");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn poll_until_returns_first_terminal_value() {
        let calls = AtomicU32::new(0);
        let budget = PollBudget {
            timeout: Duration::from_secs(1),
            interval: Duration::from_millis(1),
        };
        let token = CancellationToken::new();
        let value = poll_until(&budget, &token, "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok((n >= 2).then_some("done")) }
        })
        .await
        .unwrap();
        assert_eq!(value, "done");
    }

    #[tokio::test]
    async fn cancellation_aborts_the_wait() {
        let token = CancellationToken::new();
        token.cancel();
        let budget = PollBudget::default();
        let result: Result<(), _> = poll_until(&budget, &token, "op", || async { Ok(None) }).await;
        assert!(matches!(result.unwrap_err(), EngineError::Cancelled));
    }
}
