mod client;
mod dispatcher;
mod model;

use std::path::PathBuf;

use thiserror::Error;

use crate::core::backend::{BackendError, HealthFailure};

pub use client::{DetectionClient, encode_data_url};
pub use dispatcher::Dispatcher;
pub use model::{
    BatchEntry, BatchResult, BoundingBox, Detection, DetectionResult, FileOutcome, RelativeBox,
};

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("No files selected")]
    NoFilesSelected,
    #[error("Image file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),
    #[error("Image file is empty: {0}")]
    EmptyFile(PathBuf),
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Detection backend unavailable after {attempts} attempts: {last}")]
    BackendUnavailable {
        attempts: u32,
        #[source]
        last: BackendError,
    },
    #[error("Detection failed ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Invalid detection result: {0}")]
    MalformedResponse(String),
    #[error("Request to detection backend failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DetectError {
    /// Errors caused by the user's selection rather than the backend.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            DetectError::NoFilesSelected
                | DetectError::FileNotFound(_)
                | DetectError::NotAFile(_)
                | DetectError::EmptyFile(_)
        )
    }

    /// Text shown to the user. Selection problems are shown as they are;
    /// anything else is reported as a failed detection.
    pub fn user_message(&self) -> String {
        if self.is_user_error() {
            self.to_string()
        } else {
            format!("Error during detection: {self}")
        }
    }
}

impl From<HealthFailure> for DetectError {
    fn from(failure: HealthFailure) -> Self {
        DetectError::BackendUnavailable {
            attempts: failure.attempts,
            last: failure.last,
        }
    }
}
