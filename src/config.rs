//! Runtime configuration.
//!
//! Defaults match the bundled Flask backend (`python server.py` on port 5000).
//! Every field can be overridden with a `TUMORSCAN_*` environment variable.

use std::{path::PathBuf, str::FromStr, time::Duration};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::retry::RetryPolicy;

pub const ENV_PREFIX: &str = "TUMORSCAN_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    pub base_url: String,
    /// Output substring that marks the backend as ready.
    pub ready_marker: String,
    #[serde(with = "secs")]
    pub startup_timeout: Duration,
    #[serde(with = "secs")]
    pub health_timeout: Duration,
    pub health_attempts: u32,
    #[serde(with = "secs")]
    pub retry_delay: Duration,
    /// Number of backend output lines kept for diagnostics.
    pub output_tail: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "python".to_string(),
            args: vec!["server.py".to_string()],
            working_dir: None,
            base_url: "http://localhost:5000".to_string(),
            ready_marker: "Running on".to_string(),
            startup_timeout: Duration::from_secs(120),
            health_timeout: Duration::from_secs(5),
            health_attempts: 3,
            retry_delay: Duration::from_secs(2),
            output_tail: 50,
        }
    }
}

impl BackendConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.health_attempts, self.retry_delay)
    }

    pub fn health_url(&self) -> String {
        format!("{}/api/health", self.base_url.trim_end_matches('/'))
    }

    pub fn detect_url(&self) -> String {
        format!("{}/api/detect", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShellConfig {
    pub backend: BackendConfig,
    #[serde(with = "secs")]
    pub detect_timeout: Duration,
    pub store_path: PathBuf,
    /// Show the developer panel on launch.
    pub dev_mode: bool,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            detect_timeout: Duration::from_secs(60),
            store_path: default_store_path(),
            dev_mode: false,
        }
    }
}

impl ShellConfig {
    /// Defaults overridden by `TUMORSCAN_*` variables from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ShellConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();
        let backend = &mut config.backend;

        if let Some(program) = var("BACKEND_PROGRAM") {
            backend.program = program;
        }
        if let Some(args) = var("BACKEND_ARGS") {
            backend.args = args.split_whitespace().map(str::to_string).collect();
        }
        if let Some(dir) = var("BACKEND_DIR") {
            backend.working_dir = Some(PathBuf::from(dir));
        }
        if let Some(url) = var("BACKEND_URL") {
            backend.base_url = url;
        }
        if let Some(marker) = var("READY_MARKER") {
            backend.ready_marker = marker;
        }
        if let Some(v) = var("STARTUP_TIMEOUT_SECS") {
            backend.startup_timeout = Duration::from_secs(parse("STARTUP_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("HEALTH_TIMEOUT_SECS") {
            backend.health_timeout = Duration::from_secs(parse("HEALTH_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = var("HEALTH_ATTEMPTS") {
            backend.health_attempts = parse("HEALTH_ATTEMPTS", &v)?;
            anyhow::ensure!(
                backend.health_attempts > 0,
                "{ENV_PREFIX}HEALTH_ATTEMPTS must be at least 1"
            );
        }
        if let Some(v) = var("RETRY_DELAY_SECS") {
            backend.retry_delay = Duration::from_secs(parse("RETRY_DELAY_SECS", &v)?);
        }
        if let Some(v) = var("DETECT_TIMEOUT_SECS") {
            config.detect_timeout = Duration::from_secs(parse("DETECT_TIMEOUT_SECS", &v)?);
        }
        if let Some(path) = var("STORE_PATH") {
            config.store_path = PathBuf::from(path);
        }
        Ok(config)
    }
}

fn parse<T>(name: &str, value: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {ENV_PREFIX}{name}: {value:?}"))
}

pub fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tumorscan")
        .join("settings.db")
}

/// Where the save dialog starts.
pub fn default_results_path() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default()
        .join("detection-results.json")
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
