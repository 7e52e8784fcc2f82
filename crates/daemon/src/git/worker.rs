use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use aide_common::types::GitSnapshot;
use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::capability::DirectoryCapability;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GitWorkerError {
    #[error("failed to run `{command}`: {message}")]
    SpawnFailed { command: String, message: String },

    #[error("`{command}` failed with code {code:?}: {stderr}")]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` timed out after {seconds}s")]
    TimedOut { command: String, seconds: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> io::Result<CommandResult>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandExecutor;

#[async_trait]
impl CommandExecutor for ProcessCommandExecutor {
    async fn execute(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
    ) -> io::Result<CommandResult> {
        // Dropping the future on timeout must not leave the child running.
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await?;
        Ok(CommandResult {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

const BRANCH_ARGS: [&str; 3] = ["rev-parse", "--abbrev-ref", "HEAD"];
const REMOTE_ARGS: [&str; 3] = ["config", "--get", "remote.origin.url"];

/// Captures the one-shot git summary stored on a workspace record.
#[derive(Debug, Clone)]
pub struct GitInspector<E = ProcessCommandExecutor> {
    executor: E,
    timeout: Duration,
}

impl GitInspector<ProcessCommandExecutor> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            executor: ProcessCommandExecutor,
            timeout,
        }
    }
}

impl<E: CommandExecutor> GitInspector<E> {
    pub fn with_executor(executor: E, timeout: Duration) -> Self {
        Self { executor, timeout }
    }

    /// Branch and origin remote of a root known to contain `.git`.
    ///
    /// Runs git when the capability exposes a local path, and falls back to
    /// reading `.git/HEAD` and `.git/config` through the capability for
    /// anything the commands could not answer.
    pub async fn snapshot(&self, root: &dyn DirectoryCapability) -> GitSnapshot {
        let (mut branch, mut remote) = (None, None);

        if let Some(path) = root.local_path() {
            branch = self.run_value(path, &BRANCH_ARGS).await;
            remote = self.run_value(path, &REMOTE_ARGS).await;
        }

        if branch.is_none() || remote.is_none() {
            if let Ok(git_dir) = root.directory(".git", false).await {
                if branch.is_none() {
                    let head = read_text(git_dir.as_ref(), "HEAD").await;
                    branch = head.as_deref().and_then(parse_head);
                }
                if remote.is_none() {
                    let config = read_text(git_dir.as_ref(), "config").await;
                    remote = config.as_deref().and_then(parse_remote_url);
                }
            }
        }

        GitSnapshot {
            enabled: true,
            branch,
            remote,
        }
    }

    async fn run_value(&self, cwd: &Path, args: &[&str]) -> Option<String> {
        let args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
        match self.run(cwd, args).await {
            Ok(stdout) => {
                let value = stdout.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
            Err(error) => {
                debug!(cwd = %cwd.display(), error = %error, "git query failed");
                None
            }
        }
    }

    async fn run(&self, cwd: &Path, args: Vec<String>) -> Result<String, GitWorkerError> {
        let command = format!("git {}", args.join(" "));
        let result = tokio::time::timeout(self.timeout, self.executor.execute("git", &args, cwd))
            .await
            .map_err(|_| GitWorkerError::TimedOut {
                command: command.clone(),
                seconds: self.timeout.as_secs(),
            })?
            .map_err(|error| GitWorkerError::SpawnFailed {
                command: command.clone(),
                message: error.to_string(),
            })?;

        if result.success {
            return Ok(result.stdout);
        }

        let stderr = if result.stderr.trim().is_empty() {
            result.stdout
        } else {
            result.stderr
        };
        Err(GitWorkerError::CommandFailed {
            command,
            code: result.code,
            stderr,
        })
    }
}

async fn read_text(dir: &dyn DirectoryCapability, name: &str) -> Option<String> {
    let raw = dir.read_file(name).await.ok()?;
    String::from_utf8(raw).ok()
}

/// Branch named by a `.git/HEAD` symbolic ref; `None` when detached.
pub fn parse_head(raw: &str) -> Option<String> {
    raw.lines()
        .next()?
        .trim()
        .strip_prefix("ref: refs/heads/")
        .map(str::trim)
        .filter(|branch| !branch.is_empty())
        .map(ToOwned::to_owned)
}

/// First `url = ...` value in a `.git/config`.
pub fn parse_remote_url(raw: &str) -> Option<String> {
    raw.lines().find_map(|line| {
        let (key, value) = line.trim().split_once('=')?;
        if key.trim() != "url" {
            return None;
        }
        Some(value.trim().to_string()).filter(|url| !url.is_empty())
    })
}
