//! Supervision of the external detection backend.

mod health;
mod readiness;
mod supervisor;

use std::{future::Future, process::ExitStatus, time::Duration};

use thiserror::Error;

pub use health::{HealthFailure, ensure_healthy};
pub use readiness::{OutputLog, ReadinessWatcher, ReadyMatcher, marker_matcher};
pub use supervisor::BackendSupervisor;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Failed to spawn backend `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Backend exited before it was ready ({status}). Output:\n{output}")]
    ExitedEarly { status: ExitStatus, output: String },
    #[error("Backend output closed before it was ready. Output:\n{output}")]
    OutputClosed { output: String },
    #[error("Backend was not ready after {0:?}")]
    StartupTimeout(Duration),
    #[error("Backend health check failed: {0}")]
    Unhealthy(String),
    #[error("Failed to stop backend: {0}")]
    Stop(#[source] std::io::Error),
}

impl BackendError {
    /// Startup failures that should terminate the application.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            BackendError::Spawn { .. }
                | BackendError::ExitedEarly { .. }
                | BackendError::OutputClosed { .. }
                | BackendError::StartupTimeout(_)
        )
    }
}

/// Operations the dispatcher needs from a running backend.
pub trait Backend: Send + Sync {
    /// One health check with a bounded timeout.
    fn health(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
    /// Terminate and start the backend again.
    fn restart(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
    /// Terminate the backend for good.
    fn stop(&self) -> impl Future<Output = Result<(), BackendError>> + Send;
    /// Attempt bound and delay used by [`ensure_healthy`].
    fn retry_policy(&self) -> crate::core::retry::RetryPolicy;
}
