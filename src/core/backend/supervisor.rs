use std::{process::Stdio, sync::Arc};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::{Child, Command},
    sync::Mutex,
    task::JoinHandle,
    time::timeout,
};
use tracing::{debug, error, info, warn};

use super::{
    Backend, BackendError,
    readiness::{OutputLog, ReadinessWatcher, ReadyMatcher, marker_matcher},
};
use crate::{config::BackendConfig, core::retry::RetryPolicy};

struct RunningBackend {
    child: Child,
    /// Process group led by the child; forked servers live in it too.
    group: Option<u32>,
    readers: Vec<JoinHandle<()>>,
}

/// Owns the backend child process. Only one instance runs at a time; start,
/// stop and restart are serialized through an async mutex.
pub struct BackendSupervisor {
    config: BackendConfig,
    matcher: ReadyMatcher,
    http: reqwest::Client,
    output: OutputLog,
    running: Mutex<Option<RunningBackend>>,
}

impl std::fmt::Debug for BackendSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendSupervisor")
            .field("program", &self.config.program)
            .field("args", &self.config.args)
            .field("base_url", &self.config.base_url)
            .finish()
    }
}

impl BackendSupervisor {
    pub fn new(config: BackendConfig) -> Self {
        let matcher = marker_matcher(config.ready_marker.clone());
        Self::with_matcher(config, matcher)
    }

    pub fn with_matcher(config: BackendConfig, matcher: ReadyMatcher) -> Self {
        let output = OutputLog::new(config.output_tail);
        Self {
            config,
            matcher,
            http: reqwest::Client::new(),
            output,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Recent combined stdout/stderr lines of the backend.
    pub fn output(&self) -> &OutputLog {
        &self.output
    }

    pub async fn is_running(&self) -> bool {
        let mut running = self.running.lock().await;
        match running.as_mut() {
            Some(backend) => matches!(backend.child.try_wait(), Ok(None)),
            None => false,
        }
    }

    /// Spawns the backend and waits for its readiness signal. No-op when a
    /// live backend is already running.
    pub async fn start(&self) -> Result<(), BackendError> {
        let mut running = self.running.lock().await;
        if let Some(backend) = running.as_mut() {
            if matches!(backend.child.try_wait(), Ok(None)) {
                debug!("backend already running");
                return Ok(());
            }
            if let Some(old) = running.take() {
                abort_readers(old.readers);
            }
        }
        *running = Some(self.spawn_and_wait().await?);
        Ok(())
    }

    /// Kills the backend if one is running and waits for it to exit.
    pub async fn stop(&self) -> Result<(), BackendError> {
        let mut running = self.running.lock().await;
        Self::stop_locked(&mut running).await
    }

    pub async fn restart(&self) -> Result<(), BackendError> {
        let mut running = self.running.lock().await;
        Self::stop_locked(&mut running).await?;
        *running = Some(self.spawn_and_wait().await?);
        Ok(())
    }

    async fn stop_locked(running: &mut Option<RunningBackend>) -> Result<(), BackendError> {
        let Some(mut backend) = running.take() else {
            return Ok(());
        };
        let pid = backend.child.id();
        kill_process_group(backend.group);
        if matches!(backend.child.try_wait(), Ok(None)) {
            backend.child.kill().await.map_err(BackendError::Stop)?;
            info!(?pid, "backend stopped");
        } else {
            debug!(?pid, "backend had already exited");
        }
        abort_readers(backend.readers);
        Ok(())
    }

    async fn spawn_and_wait(&self) -> Result<RunningBackend, BackendError> {
        let config = &self.config;
        let mut command = Command::new(&config.program);
        command
            .args(&config.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &config.working_dir {
            command.current_dir(dir);
        }
        #[cfg(unix)]
        command.process_group(0);

        info!(program = %config.program, args = ?config.args, "starting backend");
        let mut child = command.spawn().map_err(|source| BackendError::Spawn {
            program: config.program.clone(),
            source,
        })?;
        let group = child.id();

        self.output.clear();
        let (watcher, ready) = ReadinessWatcher::new(self.matcher.clone());
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(self.spawn_reader("stdout", stdout, watcher.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(self.spawn_reader("stderr", stderr, watcher.clone()));
        }
        drop(watcher);

        let outcome = timeout(config.startup_timeout, async {
            tokio::select! {
                line = ready => match line {
                    Ok(line) => Ok(line),
                    // Both readers finished without a match; the process is
                    // gone or has closed its output.
                    Err(_) => match child.wait().await {
                        Ok(status) => Err(BackendError::ExitedEarly {
                            status,
                            output: self.output.tail(20),
                        }),
                        Err(_) => Err(BackendError::OutputClosed {
                            output: self.output.tail(20),
                        }),
                    },
                },
                status = child.wait() => match status {
                    Ok(status) => Err(BackendError::ExitedEarly {
                        status,
                        output: self.output.tail(20),
                    }),
                    Err(_) => Err(BackendError::OutputClosed {
                        output: self.output.tail(20),
                    }),
                },
            }
        })
        .await;

        match outcome {
            Ok(Ok(line)) => {
                info!(pid = ?child.id(), ready_line = %line, "backend ready");
                Ok(RunningBackend {
                    child,
                    group,
                    readers,
                })
            }
            Ok(Err(err)) => {
                error!(error = %err, "backend failed to start");
                kill_process_group(group);
                abort_readers(readers);
                Err(err)
            }
            Err(_) => {
                error!(timeout = ?config.startup_timeout, "backend startup timed out");
                kill_process_group(group);
                if let Err(err) = child.kill().await {
                    warn!(error = %err, "failed to kill backend after startup timeout");
                }
                abort_readers(readers);
                Err(BackendError::StartupTimeout(config.startup_timeout))
            }
        }
    }

    fn spawn_reader<R>(
        &self,
        stream: &'static str,
        reader: R,
        watcher: Arc<ReadinessWatcher>,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let output = self.output.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        debug!(target: "tumorscan::backend_output", stream, "{line}");
                        output.push(line.clone());
                        watcher.observe(&line);
                    }
                    Ok(None) => break,
                    Err(err) => {
                        warn!(stream, error = %err, "failed to read backend output");
                        break;
                    }
                }
            }
        })
    }
}

/// Kills every process in the backend's group, including servers it forked.
#[cfg(unix)]
fn kill_process_group(group: Option<u32>) {
    use nix::{
        errno::Errno,
        sys::signal::{Signal, killpg},
        unistd::Pid,
    };

    let Some(group) = group.and_then(|id| i32::try_from(id).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(group), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(err) => warn!(group, error = %err, "failed to kill backend process group"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_group: Option<u32>) {}

fn abort_readers(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        reader.abort();
    }
}

impl Backend for BackendSupervisor {
    async fn health(&self) -> Result<(), BackendError> {
        let url = self.config.health_url();
        let response = self
            .http
            .get(&url)
            .timeout(self.config.health_timeout)
            .send()
            .await
            .map_err(|err| BackendError::Unhealthy(format!("GET {url}: {err}")))?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(BackendError::Unhealthy(format!("GET {url} returned {status}")))
        }
    }

    async fn restart(&self) -> Result<(), BackendError> {
        BackendSupervisor::restart(self).await
    }

    async fn stop(&self) -> Result<(), BackendError> {
        BackendSupervisor::stop(self).await
    }

    fn retry_policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }
}
