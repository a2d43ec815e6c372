pub mod config;
pub mod core;
pub mod dialogs;
pub mod overlay;
pub mod shell;

pub use config::{BackendConfig, ShellConfig};
pub use crate::core::backend::{Backend, BackendError, BackendSupervisor};
pub use crate::core::detection::{
    BatchEntry, BatchResult, BoundingBox, DetectError, Detection, DetectionResult, Dispatcher,
    FileOutcome,
};
pub use shell::Shell;

#[cfg(feature = "gui")]
pub mod gui;
