use std::{future::Future, sync::Arc};

use tokio::runtime::Handle;

use crate::{dialogs::NativeDialogs, shell::Shell};

pub type AppShell = Shell<NativeDialogs>;

/// Shared by every screen. Shell operations run on the runtime that owns the
/// backend process, not on the GUI executor.
#[derive(Debug, Clone)]
pub struct AppState {
    pub shell: Arc<AppShell>,
    pub dev_mode: bool,
    runtime: Handle,
}

impl AppState {
    pub fn new(shell: Arc<AppShell>, runtime: Handle, dev_mode: bool) -> Self {
        Self {
            shell,
            dev_mode,
            runtime,
        }
    }

    /// Runs `f(shell)` on the backend runtime; a panicking task becomes an error.
    pub fn run<F, Fut, T>(&self, f: F) -> impl Future<Output = Result<T, String>> + Send + 'static
    where
        F: FnOnce(Arc<AppShell>) -> Fut,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
        T: Send + 'static,
    {
        let task = self.runtime.spawn(f(self.shell.clone()));
        async move {
            task.await
                .unwrap_or_else(|err| Err(format!("Background task failed: {err}")))
        }
    }

    pub fn spawn_blocking<F, T>(
        &self,
        f: F,
    ) -> impl Future<Output = Result<T, String>> + Send + 'static
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let task = self.runtime.spawn_blocking(f);
        async move { task.await.map_err(|err| format!("Background task failed: {err}")) }
    }
}
