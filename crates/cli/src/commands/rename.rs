// `aide rename`: change a workspace's name or description.

use aide_common::types::WorkspaceRecord;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct RenameArgs {
    /// Workspace id.
    workspace_id: String,
    /// New display name.
    name: Option<String>,
    /// New description; pass an empty string to clear it.
    #[arg(long)]
    description: Option<String>,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameResult {
    pub workspace: WorkspaceRecord,
}

pub fn run(args: RenameArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(call_rename(&args));
    super::finish(format, result, format_human)
}

async fn call_rename(args: &RenameArgs) -> anyhow::Result<RenameResult> {
    if args.name.is_none() && args.description.is_none() {
        anyhow::bail!("nothing to change: pass a new name or --description");
    }
    let client = DaemonClient::default();
    client.call("workspace.update", update_params(args)).await
}

fn update_params(args: &RenameArgs) -> Value {
    let mut params = Map::new();
    params.insert("workspace_id".into(), json!(args.workspace_id));
    if let Some(name) = &args.name {
        params.insert("name".into(), json!(name));
    }
    if let Some(description) = &args.description {
        params.insert("description".into(), json!(description));
    }
    Value::Object(params)
}

fn format_human(result: &RenameResult) -> String {
    let workspace = &result.workspace;
    let (name, id) = (&workspace.name, &workspace.id);
    match &workspace.description {
        Some(description) => format!("Updated {name} ({id}): {description}"),
        None => format!("Updated {name} ({id})"),
    }
}
