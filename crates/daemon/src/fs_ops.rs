// Capability-backed file operations. Paths are `/`-delimited and resolved
// segment by segment from the capability root.

use std::future::Future;
use std::pin::Pin;

use aide_common::path::{split_parent, split_segments};
use aide_common::types::{EntryKind, FileNode};

use crate::capability::{CapabilityError, DirectoryCapability, SharedCapability};
use crate::error::RegistryError;

/// Recursive listing of the whole tree, directories first, then by name.
pub async fn list_tree(
    workspace_id: &str,
    root: &dyn DirectoryCapability,
) -> Result<Vec<FileNode>, RegistryError> {
    walk(root, String::new())
        .await
        .map_err(|error| RegistryError::from_capability(workspace_id, error))
}

fn walk<'a>(
    dir: &'a dyn DirectoryCapability,
    prefix: String,
) -> Pin<Box<dyn Future<Output = Result<Vec<FileNode>, CapabilityError>> + Send + 'a>> {
    Box::pin(async move {
        let mut nodes = Vec::new();
        for entry in dir.entries().await? {
            let path = if prefix.is_empty() {
                entry.name.clone()
            } else {
                format!("{prefix}/{}", entry.name)
            };
            let children = match entry.kind {
                EntryKind::Directory => {
                    let child = dir.directory(&entry.name, false).await?;
                    Some(walk(child.as_ref(), path.clone()).await?)
                }
                EntryKind::File => None,
            };
            nodes.push(FileNode {
                name: entry.name,
                path,
                kind: entry.kind,
                children,
            });
        }
        nodes.sort_by(|a, b| {
            let rank = |kind: EntryKind| matches!(kind, EntryKind::File);
            rank(a.kind)
                .cmp(&rank(b.kind))
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(nodes)
    })
}

pub async fn read_file(
    workspace_id: &str,
    root: &SharedCapability,
    path: &str,
) -> Result<Vec<u8>, RegistryError> {
    let (parents, name) = split_parent(path)?;
    let dir = descend(workspace_id, root, &parents, false, path).await?;
    dir.read_file(&name)
        .await
        .map_err(|error| not_found_as_path(workspace_id, error, path))
}

/// Create-if-missing write; missing parent directories are created.
pub async fn write_file(
    workspace_id: &str,
    root: &SharedCapability,
    path: &str,
    contents: &[u8],
) -> Result<(), RegistryError> {
    let (parents, name) = split_parent(path)?;
    let dir = descend(workspace_id, root, &parents, true, path).await?;
    dir.write_file(&name, contents)
        .await
        .map_err(|error| RegistryError::from_capability(workspace_id, error))
}

/// Recursive, create-if-missing directory creation.
pub async fn mkdir(
    workspace_id: &str,
    root: &SharedCapability,
    path: &str,
) -> Result<(), RegistryError> {
    let segments = split_segments(path)?;
    descend(workspace_id, root, &segments, true, path)
        .await
        .map(|_| ())
}

/// Remove a file or a directory tree. Intermediate segments must exist.
pub async fn remove(
    workspace_id: &str,
    root: &SharedCapability,
    path: &str,
) -> Result<(), RegistryError> {
    let (parents, name) = split_parent(path)?;
    let dir = descend(workspace_id, root, &parents, false, path).await?;
    dir.remove_entry(&name, true)
        .await
        .map_err(|error| not_found_as_path(workspace_id, error, path))
}

async fn descend(
    workspace_id: &str,
    root: &SharedCapability,
    segments: &[String],
    create: bool,
    full_path: &str,
) -> Result<SharedCapability, RegistryError> {
    let mut current = root.clone();
    for segment in segments {
        current = current
            .directory(segment, create)
            .await
            .map_err(|error| not_found_as_path(workspace_id, error, full_path))?;
    }
    Ok(current)
}

// Report the requested path rather than the single missing segment.
fn not_found_as_path(workspace_id: &str, error: CapabilityError, path: &str) -> RegistryError {
    match error {
        CapabilityError::NotFound(_) => RegistryError::entry_not_found(path),
        other => RegistryError::from_capability(workspace_id, other),
    }
}
