use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::broadcast;
use tracing::info;

use crate::config::{global_config_path, GlobalConfig};
use crate::registry::{RegistryOptions, WorkspaceRegistry};
use crate::rpc::methods::RpcServerState;
use crate::rpc::unix::serve_unix_until_shutdown;
use crate::startup::{
    bind_socket, is_daemon_running, remove_pid_file, write_pid_file, DaemonPaths,
};

/// Run the daemon until `daemon.shutdown` or Ctrl-C, using
/// `~/.ai-ide/config.toml` and `~/.ai-ide/` for state.
pub async fn run_standalone() -> Result<()> {
    let paths = DaemonPaths::resolve()?;
    let config = GlobalConfig::load();
    let home = dirs::home_dir().context("could not determine home directory")?;
    if let Some(path) = global_config_path() {
        info!(path = %path.display(), "configuration resolved");
    }
    let options = RegistryOptions::from_config(&config, &paths.base_dir, &home);
    run_standalone_with(paths, options).await
}

pub async fn run_standalone_with(paths: DaemonPaths, options: RegistryOptions) -> Result<()> {
    if is_daemon_running(&paths.socket_path).await {
        return Err(anyhow!(
            "another daemon is already listening on `{}`",
            paths.socket_path.display()
        ));
    }

    let registry = WorkspaceRegistry::open(options).context("failed to open workspace registry")?;
    let listener = bind_socket(&paths.socket_path).await?;
    write_pid_file(&paths.pid_path)?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(4);
    let state = RpcServerState::new(Arc::new(registry)).with_shutdown_notifier(shutdown_tx.clone());
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = ctrl_c_tx.send(());
    });

    info!(socket_path = %paths.socket_path.display(), "standalone daemon started");
    let result = serve_unix_until_shutdown(listener, state, shutdown_rx).await;
    cleanup_paths(&paths.pid_path, &paths.socket_path);
    info!("standalone daemon stopped");
    result.context("standalone daemon exited with error")
}

fn cleanup_paths(pid_path: &Path, socket_path: &Path) {
    remove_pid_file(pid_path);
    let _ = std::fs::remove_file(socket_path);
}
