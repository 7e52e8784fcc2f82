// CLI subcommand dispatch.

use std::future::Future;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Subcommand;
use serde::Serialize;

use crate::output::{self, OutputFormat};

pub mod create;
pub mod delete;
pub mod files;
pub mod import;
pub mod list;
pub mod open;
pub mod rename;

#[derive(Subcommand)]
pub enum Command {
    /// List workspaces, resolving directory access
    List(list::ListArgs),
    /// Create a new skeleton project and register it
    Create(create::CreateArgs),
    /// Register an existing directory
    Import(import::ImportArgs),
    /// Resolve access to one workspace for this daemon session
    Open(open::OpenArgs),
    /// Forget a workspace (its directory is left untouched)
    Delete(delete::DeleteArgs),
    /// Rename or re-describe a workspace
    Rename(rename::RenameArgs),
    /// Work with files inside an open workspace
    Files(files::FilesArgs),
}

pub fn run(cmd: Command) -> anyhow::Result<()> {
    match cmd {
        Command::List(args) => list::run(args),
        Command::Create(args) => create::run(args),
        Command::Import(args) => import::run(args),
        Command::Open(args) => open::run(args),
        Command::Delete(args) => delete::run(args),
        Command::Rename(args) => rename::run(args),
        Command::Files(args) => files::run(args),
    }
}

/// Drive one command's async work to completion on a private runtime.
pub(crate) fn block_on<F, T>(future: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?
        .block_on(future)
}

/// Print a command result, or its mapped error, in the selected format.
pub(crate) fn finish<T, F>(
    format: OutputFormat,
    result: anyhow::Result<T>,
    human_fn: F,
) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match result {
        Ok(value) => {
            output::print_output(format, &value, human_fn)?;
            Ok(())
        }
        Err(error) => {
            output::print_anyhow_error(format, &error);
            Err(error)
        }
    }
}

/// The daemon resolves paths in its own working directory, so send absolute ones.
pub(crate) fn absolutize(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join(path))
}
