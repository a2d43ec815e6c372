use tracing::{info, warn};

use super::{Backend, BackendError};
use crate::core::retry::retry;

/// Health checks exhausted.
#[derive(Debug)]
pub struct HealthFailure {
    pub attempts: u32,
    pub last: BackendError,
}

/// Checks the backend, restarting it before each retry. Succeeds on the first
/// healthy check; fails with the last error once the policy is exhausted.
pub async fn ensure_healthy<B: Backend>(backend: &B) -> Result<(), HealthFailure> {
    let policy = backend.retry_policy();
    let mut attempts = 0;
    let result = retry(
        &policy,
        |attempt| {
            attempts = attempt;
            async move {
                if attempt > 1 {
                    info!(attempt, "restarting backend before health check");
                    backend.restart().await?;
                }
                backend.health().await
            }
        },
        |err: &BackendError| {
            warn!(error = %err, "backend health check failed");
            true
        },
    )
    .await;

    result.map_err(|last| HealthFailure { attempts, last })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::retry::RetryPolicy;
    use std::{
        sync::atomic::{AtomicU32, Ordering},
        time::Duration,
    };

    /// Fails the first `failures` checks, then reports healthy.
    struct FlakyBackend {
        failures: u32,
        checks: AtomicU32,
        restarts: AtomicU32,
    }

    impl FlakyBackend {
        fn new(failures: u32) -> Self {
            Self {
                failures,
                checks: AtomicU32::new(0),
                restarts: AtomicU32::new(0),
            }
        }
    }

    impl Backend for FlakyBackend {
        async fn health(&self) -> Result<(), BackendError> {
            let n = self.checks.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(BackendError::Unhealthy(format!("check {}", n + 1)))
            } else {
                Ok(())
            }
        }

        async fn restart(&self) -> Result<(), BackendError> {
            self.restarts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn retry_policy(&self) -> RetryPolicy {
            RetryPolicy::fixed(3, Duration::from_secs(2))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_backend_needs_no_restart() {
        let backend = FlakyBackend::new(0);
        ensure_healthy(&backend).await.unwrap();
        assert_eq!(backend.checks.load(Ordering::SeqCst), 1);
        assert_eq!(backend.restarts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_on_third_attempt_after_two_restarts() {
        let backend = FlakyBackend::new(2);
        let started = tokio::time::Instant::now();

        ensure_healthy(&backend).await.unwrap();

        assert_eq!(backend.checks.load(Ordering::SeqCst), 3);
        assert_eq!(backend.restarts.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_three_attempts() {
        let backend = FlakyBackend::new(u32::MAX);

        let failure = ensure_healthy(&backend).await.unwrap_err();

        assert_eq!(failure.attempts, 3);
        assert!(matches!(failure.last, BackendError::Unhealthy(ref msg) if msg == "check 3"));
        assert_eq!(backend.checks.load(Ordering::SeqCst), 3);
    }
}
