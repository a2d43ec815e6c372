use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use tokio::{sync::Mutex, task::JoinSet};
use tracing::{error, info, instrument, warn};

use super::{
    BatchEntry, BatchResult, DetectError, DetectionClient, DetectionResult, FileOutcome,
    encode_data_url,
};
use crate::core::backend::{Backend, ensure_healthy};

/// Validates image files, keeps the backend healthy, and sends detections.
pub struct Dispatcher<B> {
    client: DetectionClient,
    backend: Arc<B>,
    /// Held while checking health so concurrent detections restart the
    /// backend at most once per outage.
    health_gate: Arc<Mutex<()>>,
}

impl<B> Clone for Dispatcher<B> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            backend: self.backend.clone(),
            health_gate: self.health_gate.clone(),
        }
    }
}

impl<B> std::fmt::Debug for Dispatcher<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("detect_url", &self.client.detect_url())
            .finish()
    }
}

impl<B: Backend + 'static> Dispatcher<B> {
    pub fn new(client: DetectionClient, backend: Arc<B>) -> Self {
        Self {
            client,
            backend,
            health_gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Detects tumors in one image file.
    ///
    /// The file must exist and be non-empty; otherwise this fails before the
    /// backend is contacted.
    #[instrument(skip(self, path), fields(path = %path.display()))]
    pub async fn detect(&self, path: &Path) -> Result<DetectionResult, DetectError> {
        let bytes = match read_image(path).await {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(error = %err, "rejected image");
                return Err(err);
            }
        };
        {
            let _gate = self.health_gate.lock().await;
            ensure_healthy(self.backend.as_ref()).await?;
        }

        let data_url = encode_data_url(&bytes);
        let result = self.client.detect(&data_url).await;
        match &result {
            Ok(r) => info!(
                has_tumor = r.has_tumor,
                confidence = r.confidence,
                detections = r.detections.len(),
                "detection finished"
            ),
            Err(err) => error!(error = %err, "detection failed"),
        }
        result
    }

    /// Runs one detection per path concurrently and returns the outcomes in
    /// input order. A failing file does not affect the others.
    pub async fn detect_batch(&self, paths: &[PathBuf]) -> Result<BatchResult, DetectError> {
        if paths.is_empty() {
            return Err(DetectError::NoFilesSelected);
        }
        info!(files = paths.len(), "starting batch detection");

        let mut tasks = JoinSet::new();
        for (index, path) in paths.iter().cloned().enumerate() {
            let this = self.clone();
            tasks.spawn(async move {
                let outcome = this.detect(&path).await;
                (index, outcome)
            });
        }

        let mut outcomes: Vec<Option<FileOutcome>> = vec![None; paths.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(result))) => outcomes[index] = Some(FileOutcome::Detected(result)),
                Ok((index, Err(err))) => {
                    outcomes[index] = Some(FileOutcome::Failed { error: err.to_string() })
                }
                Err(err) => error!(error = %err, "detection task aborted"),
            }
        }

        let entries = paths
            .iter()
            .zip(outcomes)
            .map(|(path, outcome)| BatchEntry {
                path: path.clone(),
                outcome: outcome.unwrap_or_else(|| FileOutcome::Failed {
                    error: "Detection task aborted".to_string(),
                }),
            })
            .collect();
        Ok(BatchResult { entries })
    }
}

async fn read_image(path: &Path) -> Result<Vec<u8>, DetectError> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(DetectError::FileNotFound(path.to_path_buf()));
        }
        Err(source) => {
            return Err(DetectError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_file() {
        return Err(DetectError::NotAFile(path.to_path_buf()));
    }
    if metadata.len() == 0 {
        return Err(DetectError::EmptyFile(path.to_path_buf()));
    }
    tokio::fs::read(path).await.map_err(|source| DetectError::Read {
        path: path.to_path_buf(),
        source,
    })
}
