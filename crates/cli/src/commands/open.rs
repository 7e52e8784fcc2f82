// `aide open`: resolve directory access for one workspace.

use std::path::PathBuf;

use aide_common::types::WorkspaceRecord;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::exit_code::RpcError;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Workspace id.
    workspace_id: String,
    /// Folder to grant if the daemon no longer holds access.
    #[arg(long)]
    grant: Option<PathBuf>,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenResult {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub workspace: Option<WorkspaceRecord>,
}

pub fn run(args: OpenArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = match super::block_on(call_open(&args)) {
        Ok(result) => result,
        Err(error) => {
            output::print_anyhow_error(format, &error);
            return Err(error);
        }
    };

    output::print_output(format, &result, format_human)?;
    match outcome_error(&result) {
        Some(error) => Err(anyhow::Error::new(error)),
        None => Ok(()),
    }
}

async fn call_open(args: &OpenArgs) -> anyhow::Result<OpenResult> {
    let grant = args.grant.as_deref().map(super::absolutize).transpose()?;
    let client = DaemonClient::default();
    let params = json!({ "workspace_id": args.workspace_id, "grant": grant });
    client.call("workspace.open", params).await
}

/// A workspace that did not open still exits non-zero.
fn outcome_error(result: &OpenResult) -> Option<RpcError> {
    let reason = result.reason.clone().unwrap_or_default();
    let code = match (result.status.as_str(), reason.as_str()) {
        ("opened", _) => return None,
        ("unresolved", "denied") => "PERMISSION_DENIED",
        ("unresolved", "aborted") => "ABORTED",
        ("unresolved", _) => "INTERNAL_ERROR",
        ("removed", "mismatch") => "MISMATCH",
        ("removed", "unreachable") => "UNREACHABLE",
        ("removed", "corrupt") => "CORRUPT",
        _ => "NOT_FOUND",
    };
    Some(RpcError {
        code: code.to_string(),
        message: format!("workspace was not opened ({})", reason.replace('_', " ")),
        action: None,
    })
}

fn format_human(result: &OpenResult) -> String {
    match (&result.workspace, result.status.as_str()) {
        (Some(workspace), _) => {
            let WorkspaceRecord { id, name, path, .. } = workspace;
            format!("Opened {name} ({id})\n  path: {path}")
        }
        (None, "unresolved") => {
            let reason = result.reason.as_deref().unwrap_or("unknown");
            let reason = reason.replace('_', " ");
            format!(
                "Workspace not opened ({reason}). Retry with --grant <folder>."
            )
        }
        (None, _) => {
            let reason = result.reason.as_deref().unwrap_or("missing record");
            let reason = reason.replace('_', " ");
            format!(
                "Workspace removed ({reason}). Import the folder again to use it."
            )
        }
    }
}
