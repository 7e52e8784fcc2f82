// `aide list`: reconcile and list workspaces.
//
// Workspaces whose directory access could not be confirmed come back as
// `pending`. With `--interactive` the user is asked for each folder on stdin
// and the pass is resumed with those answers.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use aide_common::types::WorkspaceSummary;
use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Grant a remembered workspace its folder (repeatable).
    #[arg(long = "grant", value_name = "ID=PATH", value_parser = parse_grant)]
    grants: Vec<(String, PathBuf)>,
    /// Ask on stdin for the folder of every workspace that needs access.
    #[arg(long, short)]
    interactive: bool,
    /// Force JSON output.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResult {
    pub status: String,
    #[serde(default)]
    pub workspaces: Vec<WorkspaceSummary>,
    #[serde(default)]
    pub pending: Vec<PendingEntry>,
    #[serde(default)]
    pub removed: Vec<RemovedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingEntry {
    pub id: String,
    pub name: String,
    pub path: String,
    pub reason: String,
    #[serde(default)]
    pub guidance: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemovedEntry {
    pub id: String,
    pub reason: String,
}

/// Answers gathered for one resumed pass.
#[derive(Debug, Default, PartialEq, Eq)]
struct Answers {
    grants: BTreeMap<String, PathBuf>,
    denied: BTreeSet<String>,
}

pub fn run(args: ListArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let result = super::block_on(call_list(&args));
    if let Ok(listing) = &result {
        warn_if_access_lost(format, listing);
    }
    super::finish(format, result, format_human)
}

async fn call_list(args: &ListArgs) -> anyhow::Result<ListResult> {
    let client = DaemonClient::default();
    let mut answers = Answers::default();
    for (id, path) in &args.grants {
        answers.grants.insert(id.clone(), super::absolutize(path)?);
    }

    let first = list_with(&client, &answers).await?;
    if !args.interactive || first.pending.is_empty() {
        return Ok(first);
    }

    let prompted = {
        let mut input = io::stdin().lock();
        let mut prompt = io::stderr().lock();
        collect_answers(&first.pending, &mut input, &mut prompt)
            .context("failed to read folder answers")?
    };
    if prompted.grants.is_empty() && prompted.denied.is_empty() {
        return Ok(first);
    }
    for (id, path) in prompted.grants {
        answers.grants.insert(id, super::absolutize(&path)?);
    }
    answers.denied.extend(prompted.denied);

    let mut resumed = list_with(&client, &answers).await?;
    // Removals from the first pass are not repeated by the second.
    let mut removed = first.removed;
    removed.append(&mut resumed.removed);
    resumed.removed = removed;
    Ok(resumed)
}

async fn list_with(client: &DaemonClient, answers: &Answers) -> anyhow::Result<ListResult> {
    let params = json!({ "grants": answers.grants, "denied": answers.denied });
    client.call("workspace.list", params).await
}

/// Ask for each pending workspace's folder. An empty answer skips it and
/// `-` refuses access.
fn collect_answers<R, W>(
    pending: &[PendingEntry],
    input: &mut R,
    prompt: &mut W,
) -> io::Result<Answers>
where
    R: BufRead,
    W: Write,
{
    let mut answers = Answers::default();
    for entry in pending {
        if !entry.guidance.is_empty() {
            writeln!(prompt, "{}", entry.guidance)?;
        }
        write!(
            prompt,
            "Folder for workspace '{}' ({}), last at {} [enter to skip, - to deny]: ",
            entry.name, entry.id, entry.path
        )?;
        prompt.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        match line.trim() {
            "" => {}
            "-" => {
                answers.denied.insert(entry.id.clone());
            }
            path => {
                answers.grants.insert(entry.id.clone(), PathBuf::from(path));
            }
        }
    }
    Ok(answers)
}

fn parse_grant(raw: &str) -> Result<(String, PathBuf), String> {
    match raw.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok((id.to_string(), PathBuf::from(path)))
        }
        _ => Err(format!("expected ID=PATH, got `{raw}`")),
    }
}

const ACCESS_LOST: &str = concat!(
    "Access to every workspace was lost. ",
    "Run `aide list --interactive` to grant folders again."
);

fn format_human(result: &ListResult) -> String {
    let mut lines = Vec::new();
    match result.status.as_str() {
        "empty" => lines.push("No workspaces registered.".to_string()),
        "all_access_lost" => lines.push(ACCESS_LOST.to_string()),
        _ => lines.push(format!("{} workspace(s)", result.workspaces.len())),
    }

    for workspace in &result.workspaces {
        let branch = workspace
            .git
            .as_ref()
            .and_then(|git| git.branch.as_deref())
            .map(|branch| format!(" on {branch}"))
            .unwrap_or_default();
        lines.push(format!(
            "  {}  {} [{}]{}  {}",
            workspace.id,
            workspace.name,
            workspace.project_type.as_str(),
            branch,
            workspace.path
        ));
    }

    if !result.pending.is_empty() {
        let count = result.pending.len();
        lines.push(format!("{count} workspace(s) need access:"));
        for entry in &result.pending {
            let reason = entry.reason.replace('_', " ");
            lines.push(format!("  {}  {} ({reason})", entry.id, entry.name));
        }
    }

    if !result.removed.is_empty() {
        lines.push(format!("{} workspace(s) removed:", result.removed.len()));
        for entry in &result.removed {
            let reason = entry.reason.replace('_', " ");
            lines.push(format!("  {}  ({reason})", entry.id));
        }
    }

    lines.join("\n")
}

/// Surface an `all_access_lost` listing as a warning on stderr too.
fn warn_if_access_lost(format: OutputFormat, result: &ListResult) {
    if result.status == "all_access_lost" {
        output::print_warning(
            format,
            "ALL_ACCESS_LOST",
            "no workspace directory is currently accessible",
        );
    }
}
