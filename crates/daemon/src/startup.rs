// Daemon startup: PID file, Unix socket creation, readiness signaling.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::net::UnixListener;
use tracing::info;

use crate::config::global_dir;
use crate::security::{create_private_dir_all, ensure_owner_only_file};

/// Socket path: ~/.ai-ide/daemon.sock
const SOCKET_NAME: &str = "daemon.sock";
/// PID file: ~/.ai-ide/daemon.pid (diagnostics only)
const PID_FILE_NAME: &str = "daemon.pid";

/// Resolved paths for daemon runtime files.
#[derive(Debug, Clone)]
pub struct DaemonPaths {
    pub base_dir: PathBuf,
    pub socket_path: PathBuf,
    pub pid_path: PathBuf,
}

impl DaemonPaths {
    /// Resolve paths under `~/.ai-ide/`, creating the directory.
    pub fn resolve() -> Result<Self> {
        let base_dir = global_dir().context("could not determine home directory")?;
        Self::under(base_dir)
    }

    pub fn under(base_dir: PathBuf) -> Result<Self> {
        create_private_dir_all(&base_dir)
            .with_context(|| format!("failed to create `{}`", base_dir.display()))?;
        Ok(Self {
            socket_path: base_dir.join(SOCKET_NAME),
            pid_path: base_dir.join(PID_FILE_NAME),
            base_dir,
        })
    }
}

/// Write the current process PID.
pub fn write_pid_file(path: &Path) -> Result<()> {
    let pid = std::process::id();
    let mut file = fs::File::create(path).context("failed to create PID file")?;
    write!(file, "{pid}").context("failed to write PID")?;
    ensure_owner_only_file(path).context("failed to restrict PID file permissions")?;
    info!(pid, path = %path.display(), "wrote PID file");
    Ok(())
}

/// Remove the PID file on shutdown.
pub fn remove_pid_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(error = %e, "failed to remove PID file");
        }
    }
}

/// Remove a stale socket file and bind a new Unix listener.
/// The daemon signals readiness by accepting connections on this socket.
pub async fn bind_socket(path: &Path) -> Result<UnixListener> {
    if path.exists() {
        fs::remove_file(path).context("failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(path).context("failed to bind Unix socket")?;
    ensure_owner_only_file(path).context("failed to restrict socket permissions")?;
    info!(path = %path.display(), "daemon socket ready");
    Ok(listener)
}

/// True when something accepts connections on the socket.
pub async fn is_daemon_running(socket_path: &Path) -> bool {
    tokio::net::UnixStream::connect(socket_path).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_paths(tmp: &TempDir) -> DaemonPaths {
        DaemonPaths::under(tmp.path().join("state")).unwrap()
    }

    #[test]
    fn test_write_and_read_pid_file() {
        let tmp = TempDir::new().unwrap();
        let paths = setup_test_paths(&tmp);

        write_pid_file(&paths.pid_path).unwrap();

        let contents = fs::read_to_string(&paths.pid_path).unwrap();
        let pid: u32 = contents.parse().unwrap();
        assert_eq!(pid, std::process::id());
    }

    #[test]
    fn test_remove_pid_file() {
        let tmp = TempDir::new().unwrap();
        let paths = setup_test_paths(&tmp);

        write_pid_file(&paths.pid_path).unwrap();
        assert!(paths.pid_path.exists());

        remove_pid_file(&paths.pid_path);
        assert!(!paths.pid_path.exists());
    }

    #[test]
    fn test_remove_nonexistent_pid_file() {
        let tmp = TempDir::new().unwrap();
        let paths = setup_test_paths(&tmp);
        remove_pid_file(&paths.pid_path);
    }

    #[test]
    fn test_paths_live_under_base_dir() {
        let tmp = TempDir::new().unwrap();
        let paths = setup_test_paths(&tmp);
        assert!(paths.base_dir.is_dir());
        assert_eq!(paths.socket_path, paths.base_dir.join("daemon.sock"));
        assert_eq!(paths.pid_path, paths.base_dir.join("daemon.pid"));
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let tmp = TempDir::new().unwrap();
        let paths = setup_test_paths(&tmp);

        let first = match bind_socket(&paths.socket_path).await {
            Ok(listener) => listener,
            Err(error) => {
                eprintln!("skipping unix socket test: {error:#}");
                return;
            }
        };
        drop(first);

        let _second = bind_socket(&paths.socket_path).await.unwrap();
        assert!(paths.socket_path.exists());
        assert!(is_daemon_running(&paths.socket_path).await);
    }

    #[tokio::test]
    async fn test_is_daemon_running_false() {
        let tmp = TempDir::new().unwrap();
        let socket_path = tmp.path().join("nonexistent.sock");
        assert!(!is_daemon_running(&socket_path).await);
    }
}
