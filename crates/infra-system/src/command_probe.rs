// Command probe: runs a local command, exit code 0 means healthy
// reason: tokio process management, nix for SIGTERM-before-SIGKILL on unix
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use vigil_core::application::constants::GRACEFUL_KILL_TIMEOUT;
use vigil_core::domain::{Outcome, ProbeError};
use vigil_core::port::Probe;

/// Maximum number of stderr bytes carried into the outcome
const STDERR_TAIL_BYTES: usize = 512;

/// Runs a command and maps its exit status to health
///
/// The child only sees environment variables named in the allowlist.
/// On cancellation the child receives SIGTERM, then SIGKILL after the
/// grace period.
pub struct CommandProbe {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    env_allowlist: Vec<String>,
    working_dir: Option<PathBuf>,
    grace: Duration,
}

impl CommandProbe {
    /// Create a command probe
    ///
    /// # Example
    /// ```ignore
    /// let probe = CommandProbe::new("pg_isready", vec!["-h".into(), "db".into()])
    ///     .with_env_allowlist(vec!["PATH".to_string()]);
    /// ```
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            env: HashMap::new(),
            env_allowlist: Vec::new(),
            working_dir: None,
            grace: GRACEFUL_KILL_TIMEOUT,
        }
    }

    pub fn with_env(mut self, env: HashMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_env_allowlist(mut self, allowlist: Vec<String>) -> Self {
        self.env_allowlist = allowlist;
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Filter configured and inherited environment to the allowlist
    fn filter_env(&self) -> HashMap<String, String> {
        let inherited = std::env::vars().filter(|(k, _)| self.env_allowlist.contains(k));
        let configured = self
            .env
            .iter()
            .filter(|(k, _)| self.env_allowlist.contains(k))
            .map(|(k, v)| (k.clone(), v.clone()));

        inherited.chain(configured).collect()
    }

    fn spawn(&self) -> Result<Child, ProbeError> {
        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .env_clear()
            .envs(self.filter_env())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        command
            .spawn()
            .map_err(|e| ProbeError::Command(format!("spawn '{}' failed: {}", self.command, e)))
    }

    /// SIGTERM, then SIGKILL once the grace period elapses
    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                use nix::sys::signal::{kill, Signal};
                use nix::unistd::Pid;

                info!(pid = pid, command = %self.command, "Sending SIGTERM to cancelled probe command");
                if let Err(e) = kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
                    debug!(pid = pid, error = %e, "SIGTERM failed, process likely gone");
                }

                if let Ok(Ok(status)) = tokio::time::timeout(self.grace, child.wait()).await {
                    debug!(pid = pid, status = %status, "Command exited after SIGTERM");
                    return;
                }
                warn!(pid = pid, command = %self.command, "Command ignored SIGTERM, sending SIGKILL");
            }
        }

        if let Err(e) = child.kill().await {
            debug!(command = %self.command, error = %e, "Kill failed, process likely gone");
        }
    }
}

/// Drain the reader, keeping only the last `STDERR_TAIL_BYTES` in memory
async fn read_tail<R: AsyncRead + Unpin>(reader: Option<R>) -> std::io::Result<String> {
    let mut tail: VecDeque<u8> = VecDeque::with_capacity(STDERR_TAIL_BYTES);
    if let Some(mut reader) = reader {
        let mut chunk = [0u8; 1024];
        loop {
            let n = reader.read(&mut chunk).await?;
            if n == 0 {
                break;
            }
            tail.extend(&chunk[..n]);
            let excess = tail.len().saturating_sub(STDERR_TAIL_BYTES);
            tail.drain(..excess);
        }
    }
    let bytes: Vec<u8> = tail.into_iter().collect();
    Ok(String::from_utf8_lossy(&bytes).trim().to_string())
}

#[async_trait]
impl Probe for CommandProbe {
    async fn evaluate(&self, cancel: CancellationToken) -> Result<Outcome, ProbeError> {
        if cancel.is_cancelled() {
            return Err(ProbeError::Cancelled);
        }

        let mut child = self.spawn()?;
        let stderr = child.stderr.take();

        let completed = {
            let run = async {
                let stderr_tail = read_tail(stderr).await?;
                let status = child.wait().await?;
                Ok::<_, std::io::Error>((status, stderr_tail))
            };

            tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                result = run => Some(result),
            }
        };

        let (status, stderr_tail) = match completed {
            Some(result) => result?,
            None => {
                self.terminate(&mut child).await;
                return Err(ProbeError::Cancelled);
            }
        };

        debug!(command = %self.command, status = %status, "Probe command finished");

        let outcome = if status.success() {
            Outcome::healthy(format!("'{}' exited successfully", self.command))
        } else {
            let description = match status.code() {
                Some(code) => format!("'{}' exited with code {}", self.command, code),
                None => format!("'{}' terminated by signal", self.command),
            };
            Outcome::unhealthy(description)
        };

        let outcome = match status.code() {
            Some(code) => outcome.with_data("exit_code", code),
            None => outcome,
        };

        Ok(if stderr_tail.is_empty() {
            outcome
        } else {
            outcome.with_data("stderr", stderr_tail)
        })
    }
}
