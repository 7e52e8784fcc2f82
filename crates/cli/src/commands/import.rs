// `aide import`: register an existing directory.

use std::path::PathBuf;

use aide_common::types::WorkspaceRecord;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct ImportArgs {
    /// Directory to grant and register.
    path: PathBuf,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResult {
    pub workspace: WorkspaceRecord,
    pub created: bool,
}

pub fn run(args: ImportArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(call_import(&args));
    super::finish(format, result, format_human)
}

async fn call_import(args: &ImportArgs) -> anyhow::Result<ImportResult> {
    let path = super::absolutize(&args.path)?;
    let client = DaemonClient::default();
    client.call("workspace.import", json!({ "path": path })).await
}

fn format_human(result: &ImportResult) -> String {
    let workspace = &result.workspace;
    let verb = if result.created { "Imported" } else { "Already registered:" };
    let mut lines = vec![format!("{verb} {} ({})", workspace.name, workspace.id)];
    lines.push(format!("  type: {}", workspace.project_type.as_str()));
    if let Some(git) = &workspace.git {
        if let Some(branch) = &git.branch {
            lines.push(format!("  branch: {branch}"));
        }
    }
    lines.join("\n")
}
