// `aide files`: file operations inside an open workspace.

use std::io::{self, Read, Write};

use aide_common::types::{EntryKind, FileNode};
use anyhow::Context;
use clap::{Args, Subcommand};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::client::DaemonClient;
use crate::output::OutputFormat;

#[derive(Debug, Args)]
pub struct FilesArgs {
    #[command(subcommand)]
    command: FilesCommand,
    /// Force JSON output.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum FilesCommand {
    /// Show the workspace tree
    Ls { workspace_id: String },
    /// Print a file
    Cat { workspace_id: String, path: String },
    /// Write a file, creating parent directories (reads stdin without --content)
    Write {
        workspace_id: String,
        path: String,
        #[arg(long)]
        content: Option<String>,
    },
    /// Create a directory and any missing parents
    Mkdir { workspace_id: String, path: String },
    /// Remove a file or directory tree
    Rm { workspace_id: String, path: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeResult {
    pub tree: Vec<FileNode>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadResult {
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResult {
    pub ok: bool,
    pub bytes_written: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResult {
    pub ok: bool,
}

pub fn run(args: FilesArgs) -> anyhow::Result<()> {
    let format = OutputFormat::detect(args.json);
    let client = DaemonClient::default();
    match args.command {
        FilesCommand::Ls { workspace_id } => {
            let params = json!({ "workspace_id": workspace_id });
            let result: anyhow::Result<TreeResult> =
                super::block_on(client.call("files.list", params));
            super::finish(format, result, |result| render_tree(&result.tree))
        }
        FilesCommand::Cat { workspace_id, path } => {
            let params = json!({ "workspace_id": workspace_id, "path": path });
            let result: anyhow::Result<ReadResult> =
                super::block_on(client.call("files.read", params));
            match (format, result) {
                // Print contents verbatim, without a trailing newline of our own.
                (OutputFormat::Human, Ok(result)) => {
                    let mut out = io::stdout().lock();
                    out.write_all(result.content.as_bytes())?;
                    out.flush()?;
                    Ok(())
                }
                (format, result) => {
                    super::finish(format, result, |result| result.content.clone())
                }
            }
        }
        FilesCommand::Write {
            workspace_id,
            path,
            content,
        } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin().context("failed to read file contents from stdin")?,
            };
            let params = json!({ "workspace_id": workspace_id, "path": path, "content": content });
            let result: anyhow::Result<WriteResult> =
                super::block_on(client.call("files.write", params));
            super::finish(format, result, |result| {
                format!("Wrote {} byte(s) to {path}", result.bytes_written)
            })
        }
        FilesCommand::Mkdir { workspace_id, path } => {
            let params = json!({ "workspace_id": workspace_id, "path": path });
            let result: anyhow::Result<AckResult> =
                super::block_on(client.call("files.mkdir", params));
            super::finish(format, result, |_| format!("Created {path}/"))
        }
        FilesCommand::Rm { workspace_id, path } => {
            let params = json!({ "workspace_id": workspace_id, "path": path });
            let result: anyhow::Result<AckResult> =
                super::block_on(client.call("files.delete", params));
            super::finish(format, result, |_| format!("Removed {path}"))
        }
    }
}

fn read_stdin() -> io::Result<String> {
    let mut content = String::new();
    io::stdin().read_to_string(&mut content)?;
    Ok(content)
}

fn render_tree(tree: &[FileNode]) -> String {
    if tree.is_empty() {
        return "(empty)".to_string();
    }
    let mut lines = Vec::new();
    push_nodes(tree, 0, &mut lines);
    lines.join("\n")
}

fn push_nodes(nodes: &[FileNode], depth: usize, lines: &mut Vec<String>) {
    for node in nodes {
        let suffix = match node.kind {
            EntryKind::Directory => "/",
            EntryKind::File => "",
        };
        lines.push(format!("{}{}{suffix}", "  ".repeat(depth), node.name));
        if let Some(children) = &node.children {
            push_nodes(children, depth + 1, lines);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(path: &str) -> FileNode {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        FileNode {
            name,
            path: path.into(),
            kind: EntryKind::File,
            children: None,
        }
    }

    #[test]
    fn render_tree_indents_children() {
        let tree = vec![
            FileNode {
                name: "src".into(),
                path: "src".into(),
                kind: EntryKind::Directory,
                children: Some(vec![file("src/main.rs")]),
            },
            file("README.md"),
        ];
        assert_eq!(render_tree(&tree), "src/\n  main.rs\nREADME.md");
    }

    #[test]
    fn render_tree_marks_empty_workspace() {
        assert_eq!(render_tree(&[]), "(empty)");
    }
}
