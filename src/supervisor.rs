use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::error::{HistoryError, SyncError};
use crate::log_history::{LogHistory, DEFAULT_LOG_HISTORY_CAPACITY};
use crate::script_discovery::{resolve_interpreter, ScriptLocator};
use crate::sync_events::{
    SyncEvent, SyncEventSink, SyncLogLine, SyncStartedEvent, SyncStoppedEvent, SyncStream,
};

pub const TOKEN_ENV: &str = "GITHUB_TOKEN";
pub const ASSISTANT_KEY_ENV: &str = "AUTOSYNC_ASSISTANT_KEY";
pub const DEFAULT_DEBOUNCE_SECONDS: u32 = 10;
pub const MIN_DEBOUNCE_SECONDS: u32 = 1;
pub const MAX_DEBOUNCE_SECONDS: u32 = 3600;
pub const MAX_LINE_BYTES: usize = 64 * 1024;
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(500);

pub fn clamp_debounce_seconds(value: u32) -> u32 {
    value.clamp(MIN_DEBOUNCE_SECONDS, MAX_DEBOUNCE_SECONDS)
}

/// Inputs for one sync session. Secrets never reach the child's argv.
#[derive(Clone)]
pub struct SyncConfig {
    pub project_directory: PathBuf,
    pub credential_token: String,
    pub assistant_key: Option<String>,
    pub debounce_seconds: Option<u32>,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncConfig")
            .field("project_directory", &self.project_directory)
            .field("credential_token", &"<redacted>")
            .field(
                "assistant_key",
                &self.assistant_key.as_ref().map(|_| "<redacted>"),
            )
            .field("debounce_seconds", &self.debounce_seconds)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SupervisorOptions {
    pub interpreter: String,
    pub locator: ScriptLocator,
    pub log_capacity: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            interpreter: resolve_interpreter(None),
            locator: ScriptLocator::new(crate::script_discovery::default_search_bases())
                .with_override(crate::script_discovery::script_override_from_env()),
            log_capacity: DEFAULT_LOG_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_directory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
}

struct ActiveSync {
    session_id: String,
    pid: Option<u32>,
    project_directory: PathBuf,
    script_path: PathBuf,
    started_at: String,
    stop_tx: Option<oneshot::Sender<()>>,
}

impl ActiveSync {
    fn status(&self) -> SyncStatus {
        SyncStatus {
            running: true,
            session_id: Some(self.session_id.clone()),
            pid: self.pid,
            project_directory: Some(self.project_directory.display().to_string()),
            script_path: Some(self.script_path.display().to_string()),
            started_at: Some(self.started_at.clone()),
        }
    }
}

type ActiveSlot = Arc<Mutex<Option<ActiveSync>>>;
type RollbackSlot = Arc<Mutex<Option<PathBuf>>>;

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Owns the lifecycle of at most one sync child process.
pub struct SyncSupervisor {
    options: Mutex<SupervisorOptions>,
    active: ActiveSlot,
    rollback: RollbackSlot,
    logs: Arc<Mutex<LogHistory>>,
    sink: Arc<dyn SyncEventSink>,
}

/// Reservation for one rollback. Dropping it lets sessions start again.
#[derive(Debug)]
pub struct RollbackLease {
    slot: RollbackSlot,
}

impl Drop for RollbackLease {
    fn drop(&mut self) {
        *lock_or_recover(&self.slot) = None;
    }
}

impl SyncSupervisor {
    pub fn new(options: SupervisorOptions, sink: Arc<dyn SyncEventSink>) -> Self {
        let logs = LogHistory::with_capacity(options.log_capacity);
        Self {
            options: Mutex::new(options),
            active: Arc::new(Mutex::new(None)),
            rollback: Arc::new(Mutex::new(None)),
            logs: Arc::new(Mutex::new(logs)),
            sink,
        }
    }

    /// Replaces interpreter and discovery settings for later sessions.
    pub fn configure(&self, options: SupervisorOptions) {
        *lock_or_recover(&self.options) = options;
    }

    /// Spawns the sync script and returns once the child exists. Output is
    /// relayed on the current Tokio runtime.
    pub fn start(&self, config: SyncConfig) -> Result<SyncStatus, SyncError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let options = lock_or_recover(&self.options).clone();

        let mut active = lock_or_recover(&self.active);
        if let Some(existing) = active.as_ref() {
            tracing::warn!(
                event = "sync.start.rejected",
                session_id = %existing.session_id,
                "sync already running"
            );
            return Err(SyncError::AlreadyRunning {
                session_id: existing.session_id.clone(),
            });
        }

        if let Some(scope) = lock_or_recover(&self.rollback).as_ref() {
            if paths_overlap(scope, &config.project_directory) {
                return Err(SyncError::RollbackInProgress(scope.clone()));
            }
        }

        let script_path = options.locator.locate(&config.project_directory)?;
        if !config.project_directory.is_dir() {
            return Err(SyncError::InvalidProjectDirectory(
                config.project_directory.clone(),
            ));
        }
        let token = config.credential_token.trim();
        if token.is_empty() {
            return Err(SyncError::MissingToken);
        }
        let debounce_seconds =
            clamp_debounce_seconds(config.debounce_seconds.unwrap_or(DEFAULT_DEBOUNCE_SECONDS));

        let mut command = Command::new(&options.interpreter);
        command
            .arg(&script_path)
            .arg("--debounce-seconds")
            .arg(debounce_seconds.to_string())
            .current_dir(&config.project_directory)
            .env(TOKEN_ENV, token)
            .env("PYTHONUNBUFFERED", "1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(key) = config
            .assistant_key
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
        {
            command.env(ASSISTANT_KEY_ENV, key);
        }

        let mut child = {
            let _guard = runtime.enter();
            command.spawn().map_err(|source| {
                tracing::error!(
                    event = "sync.start.spawn_error",
                    interpreter = %options.interpreter,
                    script = %script_path.display(),
                    error = %source
                );
                SyncError::SpawnError {
                    program: options.interpreter.clone(),
                    source,
                }
            })?
        };

        let session_id = Uuid::new_v4().to_string();
        let pid = child.id();
        let started_at = crate::now_iso();
        let (stop_tx, stop_rx) = oneshot::channel();

        let entry = ActiveSync {
            session_id: session_id.clone(),
            pid,
            project_directory: config.project_directory.clone(),
            script_path: script_path.clone(),
            started_at: started_at.clone(),
            stop_tx: Some(stop_tx),
        };
        let status = entry.status();
        *active = Some(entry);
        drop(active);

        tracing::info!(
            event = "sync.session.started",
            session_id = %session_id,
            pid = ?pid,
            project_directory = %config.project_directory.display(),
            script = %script_path.display(),
            debounce_seconds
        );
        self.sink.emit(SyncEvent::Started(SyncStartedEvent {
            session_id: session_id.clone(),
            pid,
            project_directory: config.project_directory.display().to_string(),
            script_path: script_path.display().to_string(),
            started_at,
        }));

        let relay = RelayContext {
            session_id,
            active: self.active.clone(),
            logs: self.logs.clone(),
            sink: self.sink.clone(),
        };
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        runtime.spawn(relay.run(child, stdout, stderr, stop_rx));

        Ok(status)
    }

    /// Signals the child to terminate and clears the handle immediately.
    pub fn stop(&self) -> Result<(), SyncError> {
        let Some(mut entry) = lock_or_recover(&self.active).take() else {
            return Err(SyncError::NotRunning);
        };

        if let Some(stop_tx) = entry.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        tracing::info!(
            event = "sync.session.stop_requested",
            session_id = %entry.session_id,
            pid = ?entry.pid
        );
        Ok(())
    }

    pub fn status(&self) -> SyncStatus {
        lock_or_recover(&self.active)
            .as_ref()
            .map(ActiveSync::status)
            .unwrap_or_default()
    }

    pub fn is_running(&self) -> bool {
        lock_or_recover(&self.active).is_some()
    }

    pub fn active_directory(&self) -> Option<PathBuf> {
        lock_or_recover(&self.active)
            .as_ref()
            .map(|entry| entry.project_directory.clone())
    }

    /// Reserves `scope` for a rollback. Refused while a session syncs a
    /// directory inside, above or equal to `scope`, and while another rollback
    /// holds the reservation. `start` honors the reservation in turn.
    pub fn begin_rollback(&self, scope: &Path) -> Result<RollbackLease, HistoryError> {
        let active = lock_or_recover(&self.active);
        if let Some(entry) = active.as_ref() {
            if paths_overlap(&entry.project_directory, scope) {
                return Err(HistoryError::SyncActive(entry.project_directory.clone()));
            }
        }

        let mut rollback = lock_or_recover(&self.rollback);
        if let Some(existing) = rollback.as_ref() {
            return Err(HistoryError::RollbackInProgress(existing.clone()));
        }
        *rollback = Some(scope.to_path_buf());
        Ok(RollbackLease {
            slot: self.rollback.clone(),
        })
    }

    pub fn recent_logs(&self) -> Vec<SyncLogLine> {
        lock_or_recover(&self.logs).snapshot()
    }

    pub fn clear_logs(&self) {
        lock_or_recover(&self.logs).clear();
    }
}

impl Drop for SyncSupervisor {
    fn drop(&mut self) {
        if let Some(mut entry) = lock_or_recover(&self.active).take() {
            if let Some(stop_tx) = entry.stop_tx.take() {
                let _ = stop_tx.send(());
            }
        }
    }
}

/// Killed children report no line; on Windows a kill still yields code 1.
fn synthetic_exit_line(exit_code: Option<i32>, stopped_by_user: bool) -> Option<String> {
    if stopped_by_user {
        return None;
    }
    exit_code
        .filter(|code| *code != 0)
        .map(|code| format!("[ERROR] Process exited with code {code}"))
}

/// True when one path equals or contains the other, compared canonically.
fn paths_overlap(left: &Path, right: &Path) -> bool {
    let left = left.canonicalize().unwrap_or_else(|_| left.to_path_buf());
    let right = right.canonicalize().unwrap_or_else(|_| right.to_path_buf());
    left.starts_with(&right) || right.starts_with(&left)
}

struct RelayContext {
    session_id: String,
    active: ActiveSlot,
    logs: Arc<Mutex<LogHistory>>,
    sink: Arc<dyn SyncEventSink>,
}

impl RelayContext {
    async fn run<O, E>(
        self,
        mut child: Child,
        stdout: Option<O>,
        stderr: Option<E>,
        mut stop_rx: oneshot::Receiver<()>,
    ) where
        O: AsyncRead + Unpin + Send + 'static,
        E: AsyncRead + Unpin + Send + 'static,
    {
        let (lines_tx, mut lines_rx) = mpsc::unbounded_channel();
        let mut readers = Vec::new();
        if let Some(stdout) = stdout {
            readers.push(spawn_line_reader(stdout, SyncStream::Stdout, lines_tx.clone()));
        }
        if let Some(stderr) = stderr {
            readers.push(spawn_line_reader(stderr, SyncStream::Stderr, lines_tx.clone()));
        }
        drop(lines_tx);

        // The child can exit while a grandchild still holds its pipes, so exit
        // is watched alongside the output instead of after it.
        let mut lines_open = true;
        let exited = loop {
            tokio::select! {
                received = lines_rx.recv(), if lines_open => match received {
                    Some((stream, line)) => self.publish(stream, line),
                    None => lines_open = false,
                },
                result = child.wait() => break Some(result),
                // A dropped sender also means the handle is gone.
                _ = &mut stop_rx => break None,
            }
        };

        let stopped_by_user = exited.is_none();
        let wait_result = match exited {
            Some(result) => {
                self.drain_lines(&mut lines_rx).await;
                result
            }
            None => {
                self.kill(&mut child);
                child.wait().await
            }
        };
        for reader in &readers {
            reader.abort();
        }

        let exit_code = match wait_result {
            Ok(status) => status.code(),
            Err(error) => {
                tracing::warn!(
                    event = "sync.session.wait_error",
                    session_id = %self.session_id,
                    error = %error
                );
                None
            }
        };

        self.release_handle();

        if let Some(line) = synthetic_exit_line(exit_code, stopped_by_user) {
            self.publish(SyncStream::Supervisor, line);
        }

        tracing::info!(
            event = "sync.session.exited",
            session_id = %self.session_id,
            exit_code = ?exit_code,
            stopped_by_user
        );
        self.sink.emit(SyncEvent::Stopped(SyncStoppedEvent {
            session_id: self.session_id.clone(),
            exit_code,
            stopped_by_user,
        }));
    }

    /// Publishes output still in flight after exit. Gives up after
    /// `OUTPUT_DRAIN_GRACE` when something else keeps the pipes open.
    async fn drain_lines(&self, lines_rx: &mut mpsc::UnboundedReceiver<(SyncStream, String)>) {
        let drain = async {
            while let Some((stream, line)) = lines_rx.recv().await {
                self.publish(stream, line);
            }
        };
        if tokio::time::timeout(OUTPUT_DRAIN_GRACE, drain).await.is_err() {
            tracing::debug!(
                event = "sync.session.drain_timeout",
                session_id = %self.session_id
            );
        }
    }

    fn kill(&self, child: &mut Child) {
        if let Err(error) = child.start_kill() {
            tracing::warn!(
                event = "sync.session.kill_error",
                session_id = %self.session_id,
                error = %error
            );
        }
    }

    fn publish(&self, stream: SyncStream, line: String) {
        let entry = SyncLogLine::new(&self.session_id, stream, line);
        tracing::debug!(
            event = "sync.session.line",
            session_id = %self.session_id,
            category = entry.category.as_str(),
            line = %entry.line
        );
        lock_or_recover(&self.logs).push(entry.clone());
        self.sink.emit(SyncEvent::Log(entry));
    }

    fn release_handle(&self) {
        let mut active = lock_or_recover(&self.active);
        let owns_slot = active
            .as_ref()
            .map(|entry| entry.session_id == self.session_id)
            .unwrap_or(false);
        if owns_slot {
            *active = None;
        }
    }
}

fn spawn_line_reader<R>(
    reader: R,
    stream: SyncStream,
    lines_tx: mpsc::UnboundedSender<(SyncStream, String)>,
) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            // Longer lines are relayed in `MAX_LINE_BYTES` pieces.
            let mut limited = (&mut reader).take(MAX_LINE_BYTES as u64);
            match limited.read_until(b'\n', &mut buffer).await {
                Ok(0) => break,
                Ok(_) => {
                    while matches!(buffer.last(), Some(b'\n' | b'\r')) {
                        buffer.pop();
                    }
                    let line = String::from_utf8_lossy(&buffer).to_string();
                    if lines_tx.send((stream, line)).is_err() {
                        break;
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        event = "sync.session.read_error",
                        stream = ?stream,
                        error = %error
                    );
                    break;
                }
            }
        }
    })
}
