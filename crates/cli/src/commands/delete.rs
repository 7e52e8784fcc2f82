// `aide delete`: forget a workspace.

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Workspace id.
    workspace_id: String,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResult {
    pub ok: bool,
    pub existed: bool,
}

pub fn run(args: DeleteArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(call_delete(&args));
    let id = args.workspace_id.clone();
    super::finish(format, result, move |result| format_human(&id, result))
}

async fn call_delete(args: &DeleteArgs) -> anyhow::Result<DeleteResult> {
    let client = DaemonClient::default();
    let params = json!({ "workspace_id": args.workspace_id });
    client.call("workspace.delete", params).await
}

fn format_human(id: &str, result: &DeleteResult) -> String {
    if result.existed {
        format!("Deleted workspace {id}. Its directory was not touched.")
    } else {
        format!("Workspace {id} was not registered.")
    }
}
