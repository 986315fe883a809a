//! Starting extraction runs on behalf of a session.
//!
//! The coordinator never waits on a run. A [`Launcher`] starts one in the
//! background and reports back through [`RunEvents`]: progress records while
//! it runs, snapshot changes when it writes in-process, and its exit.

use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

use super::watcher::WatchedFile;
use super::Message;
use crate::config::Config;
use crate::error::{DispatchError, DispatchResult};
use crate::models::{ProgressRecord, ProgressSink, RunPhase, SessionId};

/// One extraction run to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunRequest {
    /// Search `name` and collect profiles.
    Profiles { session_id: SessionId, name: String },
    /// Scan the collaboration graph of `profile_url`.
    Collaborators { session_id: SessionId, name: String, profile_url: String },
}

impl RunRequest {
    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        match self {
            Self::Profiles { .. } => RunPhase::Profiles,
            Self::Collaborators { .. } => RunPhase::Collaborators,
        }
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        match self {
            Self::Profiles { session_id, .. } | Self::Collaborators { session_id, .. } => session_id,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunExit {
    /// Exit code; `None` when killed by a signal or never started.
    pub code: Option<i32>,
    /// Collected diagnostic output.
    pub stderr: String,
}

impl RunExit {
    #[must_use]
    pub fn success() -> Self {
        Self { code: Some(0), stderr: String::new() }
    }

    #[must_use]
    pub fn failure(code: i32, stderr: impl Into<String>) -> Self {
        Self { code: Some(code), stderr: stderr.into() }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    /// Exit code for messages; `-1` when there is none.
    #[must_use]
    pub fn code_or_signal(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

/// Back channel from a run to the coordinator.
#[derive(Debug, Clone)]
pub struct RunEvents {
    session_id: SessionId,
    phase: RunPhase,
    tx: mpsc::UnboundedSender<Message>,
}

impl RunEvents {
    pub(super) fn new(session_id: SessionId, phase: RunPhase, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { session_id, phase, tx }
    }

    #[must_use]
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    #[must_use]
    pub const fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Forward one progress record.
    pub fn progress(&self, record: ProgressRecord) {
        let _ = self.tx.send(Message::Progress {
            session_id: self.session_id.clone(),
            phase: self.phase,
            record,
        });
    }

    /// Report that a session file was written.
    pub fn file_changed(&self, file: WatchedFile) {
        let _ = self.tx.send(Message::File { session_id: self.session_id.clone(), file });
    }

    /// Report the end of the run. Must be the last call.
    pub fn exited(&self, exit: RunExit) {
        let _ = self.tx.send(Message::Exited {
            session_id: self.session_id.clone(),
            phase: self.phase,
            exit,
        });
    }
}

impl ProgressSink for RunEvents {
    fn report(&self, record: ProgressRecord) {
        self.progress(record);
    }
}

/// Starts extraction runs without blocking the caller.
#[async_trait::async_trait]
pub trait Launcher: Send + Sync {
    /// Start `run` in the background.
    ///
    /// An `Err` means nothing was started and `events` will never fire.
    async fn launch(&self, run: RunRequest, events: RunEvents) -> DispatchResult<()>;
}

/// Runs each extraction as a child process of this binary.
///
/// The child prints progress records on stdout and writes its snapshots to
/// the shared sessions directory.
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    program: PathBuf,
    sessions_dir: PathBuf,
    chrome_bin: Option<PathBuf>,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, config: &Config) -> Self {
        Self {
            program: program.into(),
            sessions_dir: config.sessions_dir.clone(),
            chrome_bin: config.chrome_bin.clone(),
        }
    }

    /// Launcher that re-invokes the running executable.
    pub fn current(config: &Config) -> DispatchResult<Self> {
        let program = std::env::current_exe()
            .map_err(|e| DispatchError::launch("extraction process", e.to_string()))?;
        Ok(Self::new(program, config))
    }

    /// Command-line arguments for `run`.
    #[must_use]
    pub fn args(&self, run: &RunRequest) -> Vec<String> {
        let mut args = vec!["--sessions-dir".to_string(), self.sessions_dir.display().to_string()];
        if let Some(chrome) = &self.chrome_bin {
            args.push("--chrome-bin".to_string());
            args.push(chrome.display().to_string());
        }
        match run {
            RunRequest::Profiles { session_id, name } => {
                args.extend(["profiles".to_string(), name.clone(), session_id.to_string()]);
            }
            RunRequest::Collaborators { session_id, name, profile_url } => {
                args.extend([
                    "collaborators".to_string(),
                    name.clone(),
                    session_id.to_string(),
                    "--profile-url".to_string(),
                    profile_url.clone(),
                ]);
            }
        }
        args
    }
}

#[async_trait::async_trait]
impl Launcher for ProcessLauncher {
    async fn launch(&self, run: RunRequest, events: RunEvents) -> DispatchResult<()> {
        let phase = run.phase();
        let what = match phase {
            RunPhase::Profiles => "profile extraction",
            RunPhase::Collaborators => "collaborator extraction",
        };

        let mut child = Command::new(&self.program)
            .args(self.args(&run))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DispatchError::launch(what, e.to_string()))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        tracing::info!(session_id = %run.session_id(), pid = ?child.id(), run = what, "Extraction started");

        tokio::spawn(async move {
            let progress = events.clone();
            let stdout_task = tokio::spawn(async move {
                let Some(stdout) = stdout else { return };
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.trim().is_empty() {
                        continue;
                    }
                    progress.progress(ProgressRecord::parse_line(phase, &line));
                }
            });
            let stderr_task = tokio::spawn(async move {
                let mut collected = String::new();
                if let Some(mut stderr) = stderr {
                    let _ = stderr.read_to_string(&mut collected).await;
                }
                collected
            });

            let status = child.wait().await;
            let _ = stdout_task.await;
            let stderr = stderr_task.await.unwrap_or_default();

            let exit = match status {
                Ok(status) => RunExit { code: status.code(), stderr },
                Err(e) => RunExit { code: None, stderr: e.to_string() },
            };
            tracing::info!(
                session_id = %events.session_id(),
                code = ?exit.code,
                "Extraction exited"
            );
            events.exited(exit);
        });

        Ok(())
    }
}
