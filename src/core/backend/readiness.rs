use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use tokio::sync::oneshot;

/// Predicate deciding whether an output line means the backend is ready.
pub type ReadyMatcher = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Matcher firing on any line containing `marker`.
pub fn marker_matcher(marker: impl Into<String>) -> ReadyMatcher {
    let marker = marker.into();
    Arc::new(move |line: &str| line.contains(&marker))
}

/// Scans backend output and resolves a one-shot readiness signal the first
/// time the matcher accepts a line. Shared by the stdout and stderr readers.
pub struct ReadinessWatcher {
    matcher: ReadyMatcher,
    signal: Mutex<Option<oneshot::Sender<String>>>,
}

impl ReadinessWatcher {
    pub fn new(matcher: ReadyMatcher) -> (Arc<Self>, oneshot::Receiver<String>) {
        let (tx, rx) = oneshot::channel();
        let watcher = Arc::new(Self {
            matcher,
            signal: Mutex::new(Some(tx)),
        });
        (watcher, rx)
    }

    /// Returns true only for the line that fired the signal.
    pub fn observe(&self, line: &str) -> bool {
        let Ok(mut signal) = self.signal.lock() else {
            return false;
        };
        if signal.is_none() || !(self.matcher)(line) {
            return false;
        }
        match signal.take() {
            Some(tx) => {
                // Receiver gone means nobody waits for readiness any more.
                let _ = tx.send(line.to_string());
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        self.signal.lock().map(|s| s.is_none()).unwrap_or(true)
    }
}

/// Bounded tail of the backend's combined output.
#[derive(Debug, Clone)]
pub struct OutputLog {
    lines: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl OutputLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    pub fn push(&self, line: impl Into<String>) {
        if self.capacity == 0 {
            return;
        }
        if let Ok(mut lines) = self.lines.lock() {
            while lines.len() >= self.capacity {
                lines.pop_front();
            }
            lines.push_back(line.into());
        }
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.lines
            .lock()
            .map(|lines| lines.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Last `n` lines joined with newlines, for error messages.
    pub fn tail(&self, n: usize) -> String {
        let lines = self.snapshot();
        let skip = lines.len().saturating_sub(n);
        lines[skip..].join("\n")
    }

    pub fn clear(&self) {
        if let Ok(mut lines) = self.lines.lock() {
            lines.clear();
        }
    }
}
