// `aide create`: create a skeleton project and register it.

use aide_common::types::WorkspaceRecord;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Display name of the new workspace.
    name: String,
    /// Optional free-form description.
    #[arg(long)]
    description: Option<String>,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateResult {
    pub workspace: WorkspaceRecord,
}

pub fn run(args: CreateArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(call_create(&args));
    super::finish(format, result, format_human)
}

async fn call_create(args: &CreateArgs) -> anyhow::Result<CreateResult> {
    let client = DaemonClient::default();
    let params = json!({ "name": args.name, "description": args.description });
    client.call("workspace.create", params).await
}

fn format_human(result: &CreateResult) -> String {
    let workspace = &result.workspace;
    format!(
        "Created workspace {} ({})\n  path: {}",
        workspace.name, workspace.id, workspace.path
    )
}
