use std::{
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use image::{ImageBuffer, Rgb};
use tempfile::NamedTempFile;
use tumorscan::{
    Backend, BackendError, Dispatcher, Shell,
    core::{detection::DetectionClient, retry::RetryPolicy, store::SettingsStore},
    dialogs::FileDialogs,
};

/// Creates a 100x100 red test image and returns the temp file.
/// The file will be automatically cleaned up when dropped.
pub fn create_test_image() -> NamedTempFile {
    let img = ImageBuffer::from_fn(100, 100, |_, _| Rgb([255u8, 0u8, 0u8]));
    let file = tempfile::Builder::new()
        .suffix(".png")
        .tempfile()
        .expect("Failed to create temp image file");
    img.save_with_format(file.path(), image::ImageFormat::Png)
        .expect("Failed to save test image");
    file
}

/// Writes `contents` to `name` inside `dir` and returns the path.
pub fn write_scan(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("Failed to write scan file");
    path
}

/// Backend double: reports healthy after `failures` failed checks and counts
/// every check and restart.
pub struct MockBackend {
    failures: u32,
    down_until_restart: bool,
    restart_delay: Duration,
    fail_stop: bool,
    policy: RetryPolicy,
    pub checks: AtomicU32,
    pub restarts: AtomicU32,
    pub stops: AtomicU32,
}

impl MockBackend {
    pub fn healthy() -> Self {
        Self::failing(0)
    }

    pub fn failing(failures: u32) -> Self {
        Self {
            failures,
            down_until_restart: false,
            restart_delay: Duration::ZERO,
            fail_stop: false,
            policy: RetryPolicy::fixed(3, Duration::from_millis(10)),
            checks: AtomicU32::new(0),
            restarts: AtomicU32::new(0),
            stops: AtomicU32::new(0),
        }
    }

    /// Refuses every check until the first restart completes. Restarts take
    /// `restart_delay`.
    pub fn down_until_restart(restart_delay: Duration) -> Self {
        Self {
            down_until_restart: true,
            restart_delay,
            ..Self::healthy()
        }
    }

    /// Healthy, but `stop` fails.
    pub fn stubborn() -> Self {
        Self {
            fail_stop: true,
            ..Self::healthy()
        }
    }

    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl Backend for MockBackend {
    async fn health(&self) -> Result<(), BackendError> {
        let n = self.checks.fetch_add(1, Ordering::SeqCst);
        if self.down_until_restart && self.restarts() == 0 {
            return Err(BackendError::Unhealthy("connection refused".to_string()));
        }
        if n < self.failures {
            Err(BackendError::Unhealthy(format!("check {} refused", n + 1)))
        } else {
            Ok(())
        }
    }

    async fn restart(&self) -> Result<(), BackendError> {
        tokio::time::sleep(self.restart_delay).await;
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), BackendError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.fail_stop {
            return Err(BackendError::Stop(std::io::Error::other("kill refused")));
        }
        Ok(())
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }
}

pub fn make_dispatcher(detect_url: String, backend: Arc<MockBackend>) -> Dispatcher<MockBackend> {
    Dispatcher::new(DetectionClient::new(detect_url, Duration::from_secs(5)), backend)
}

/// Dialog double with scripted answers.
#[derive(Default)]
pub struct MockDialogs {
    pub images: Vec<PathBuf>,
    pub save_to: Option<PathBuf>,
    pub save_defaults: Mutex<Vec<PathBuf>>,
}

impl FileDialogs for MockDialogs {
    async fn pick_images(&self) -> Vec<PathBuf> {
        self.images.clone()
    }

    async fn pick_image(&self) -> Option<PathBuf> {
        self.images.first().cloned()
    }

    async fn save_results_path(&self, default_path: PathBuf) -> Option<PathBuf> {
        self.save_defaults.lock().unwrap().push(default_path);
        self.save_to.clone()
    }
}

/// Opens a settings store in a fresh temp directory.
/// Returns both the store and the temp directory (which must be kept alive).
pub async fn create_test_store() -> (SettingsStore, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let store = SettingsStore::open(dir.path().join("settings.db"))
        .await
        .expect("Failed to open test store");
    (store, dir)
}

pub async fn create_test_shell(
    dialogs: MockDialogs,
    detect_url: String,
) -> (Shell<MockDialogs, MockBackend>, Arc<MockBackend>, tempfile::TempDir) {
    create_test_shell_with(dialogs, detect_url, MockBackend::healthy()).await
}

pub async fn create_test_shell_with(
    dialogs: MockDialogs,
    detect_url: String,
    backend: MockBackend,
) -> (Shell<MockDialogs, MockBackend>, Arc<MockBackend>, tempfile::TempDir) {
    let backend = Arc::new(backend);
    let (store, dir) = create_test_store().await;
    let shell = Shell::new(dialogs, make_dispatcher(detect_url, backend.clone()), store)
        .with_results_default(dir.path().join("detection-results.json"));
    (shell, backend, dir)
}
