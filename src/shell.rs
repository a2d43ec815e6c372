//! Application lifecycle: owns the backend supervisor, the dispatcher, the
//! settings store and the dialogs, and exposes the operations the UI calls.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use tracing::{info, warn};

use crate::{
    config::{ShellConfig, default_results_path},
    core::{
        backend::{Backend, BackendError, BackendSupervisor},
        detection::{BatchResult, DetectError, DetectionClient, DetectionResult, Dispatcher},
        store::{LAST_RESULTS_KEY, SettingsRepository, SettingsStore},
    },
    dialogs::FileDialogs,
};

pub struct Shell<D, B = BackendSupervisor> {
    dialogs: D,
    dispatcher: Dispatcher<B>,
    store: SettingsStore,
    results_default: PathBuf,
}

impl<D, B> std::fmt::Debug for Shell<D, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Shell")
            .field("dispatcher", &self.dispatcher)
            .field("store", &self.store)
            .finish()
    }
}

impl<D: FileDialogs> Shell<D, BackendSupervisor> {
    /// Opens the settings store and starts the backend. A backend that cannot
    /// start is a fatal error.
    pub async fn init(config: &ShellConfig, dialogs: D) -> anyhow::Result<Self> {
        let store = SettingsStore::open(&config.store_path).await?;

        let supervisor = Arc::new(BackendSupervisor::new(config.backend.clone()));
        supervisor
            .start()
            .await
            .context("Detection backend failed to start")?;

        let client = DetectionClient::new(config.backend.detect_url(), config.detect_timeout);
        info!(url = %config.backend.base_url, "shell initialised");
        Ok(Self::new(dialogs, Dispatcher::new(client, supervisor), store))
    }

    /// Recent backend output, newest last.
    pub fn backend_output(&self) -> Vec<String> {
        self.dispatcher.backend().output().snapshot()
    }
}

impl<D: FileDialogs, B: Backend + 'static> Shell<D, B> {
    pub fn new(dialogs: D, dispatcher: Dispatcher<B>, store: SettingsStore) -> Self {
        Self {
            dialogs,
            dispatcher,
            store,
            results_default: default_results_path(),
        }
    }

    /// Overrides where the save dialog starts.
    pub fn with_results_default(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_default = path.into();
        self
    }

    pub fn dialogs(&self) -> &D {
        &self.dialogs
    }

    pub fn store(&self) -> &SettingsStore {
        &self.store
    }

    pub async fn select_files(&self) -> Vec<PathBuf> {
        let files = self.dialogs.pick_images().await;
        info!(count = files.len(), "files selected");
        files
    }

    pub async fn select_file(&self) -> Option<PathBuf> {
        self.dialogs.pick_image().await
    }

    pub async fn detect(&self, path: &Path) -> Result<DetectionResult, DetectError> {
        self.dispatcher.detect(path).await
    }

    pub async fn detect_batch(&self, paths: &[PathBuf]) -> Result<BatchResult, DetectError> {
        self.dispatcher.detect_batch(paths).await
    }

    /// Asks where to save; when confirmed, records the batch under
    /// [`LAST_RESULTS_KEY`], exports it as JSON to the chosen path and returns
    /// that path. Cancelling leaves the store untouched.
    pub async fn save_results(&self, results: &BatchResult) -> anyhow::Result<Option<PathBuf>> {
        let Some(path) = self
            .dialogs
            .save_results_path(self.results_default.clone())
            .await
        else {
            info!("save cancelled");
            return Ok(None);
        };

        self.store.set_json(LAST_RESULTS_KEY, results).await?;
        let json = serde_json::to_string_pretty(results)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write results to {:?}", path))?;
        info!(?path, entries = results.len(), "results saved");
        Ok(Some(path))
    }

    /// The batch recorded by the last successful save.
    pub async fn last_results(&self) -> anyhow::Result<Option<BatchResult>> {
        self.store.get_json(LAST_RESULTS_KEY).await
    }

    /// Stops the backend and closes the store. The store is closed even when
    /// the backend refuses to stop.
    pub async fn shutdown(&self) -> anyhow::Result<()> {
        let stopped = self.dispatcher.backend().stop().await;
        self.store.close().await;
        if let Err(err) = stopped {
            warn!(error = %err, "backend did not stop cleanly");
            return Err(err.into());
        }
        info!("shell shut down");
        Ok(())
    }
}

/// True when `err` was caused by the backend failing to start, as opposed to
/// the settings store or the configuration.
pub fn is_backend_startup_failure(err: &anyhow::Error) -> bool {
    err.chain()
        .filter_map(|cause| cause.downcast_ref::<BackendError>())
        .any(BackendError::is_fatal)
}
