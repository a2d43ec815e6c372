#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from tumorscan for tests
pub use tumorscan::{
    BatchEntry, BatchResult, BoundingBox, DetectError, Detection, DetectionResult, FileOutcome,
    core::store::{LAST_RESULTS_KEY, SettingsRepository, SettingsStore},
};
