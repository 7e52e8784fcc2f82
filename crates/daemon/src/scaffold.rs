// Skeleton projects for `createWorkspace` and the in-tree `.ai-ide/workspace.json`.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use aide_common::types::{GitSnapshot, ProjectType, WorkspaceRecord, WorkspaceSettings};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::capability::{FsDirectoryCapability, SharedCapability};
use crate::error::RegistryError;
use crate::fs_ops;

pub const CONFIG_PATH: &str = ".ai-ide/workspace.json";

const SKELETON_DIRS: &[&str] = &["src", "public"];
const GITIGNORE: &str = "node_modules\n.next\n.env\n.env.local\n";

/// Workspace metadata mirrored into the project directory itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceConfig {
    pub name: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    #[serde(default)]
    pub project_files: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSnapshot>,
    pub settings: WorkspaceSettings,
    #[serde(default)]
    pub recent_files: Vec<String>,
}

impl From<&WorkspaceRecord> for WorkspaceConfig {
    fn from(record: &WorkspaceRecord) -> Self {
        Self {
            name: record.name.clone(),
            created: record.created,
            modified: record.modified,
            last_accessed: record.last_accessed,
            project_type: record.project_type,
            project_files: record.project_files.clone(),
            git: record.git.clone(),
            settings: record.settings.clone(),
            recent_files: Vec::new(),
        }
    }
}

/// Write the config file unless one exists. Returns whether it was written.
pub async fn write_workspace_config(
    root: &SharedCapability,
    record: &WorkspaceRecord,
) -> Result<bool, RegistryError> {
    match fs_ops::read_file(&record.id, root, CONFIG_PATH).await {
        Ok(_) => return Ok(false),
        Err(RegistryError::NotFound(_)) => {}
        Err(error) => return Err(error),
    }
    let encoded = serde_json::to_vec_pretty(&WorkspaceConfig::from(record))?;
    fs_ops::write_file(&record.id, root, CONFIG_PATH, &encoded).await?;
    debug!(workspace_id = %record.id, "workspace config written");
    Ok(true)
}

/// `None` when the file is absent or unreadable as a config.
pub async fn read_workspace_config(
    workspace_id: &str,
    root: &SharedCapability,
) -> Result<Option<WorkspaceConfig>, RegistryError> {
    let raw = match fs_ops::read_file(workspace_id, root, CONFIG_PATH).await {
        Ok(raw) => raw,
        Err(RegistryError::NotFound(_)) => return Ok(None),
        Err(error) => return Err(error),
    };
    match serde_json::from_slice(&raw) {
        Ok(config) => Ok(Some(config)),
        Err(error) => {
            warn!(workspace_id = %workspace_id, error = %error, "workspace config is unreadable");
            Ok(None)
        }
    }
}

/// Create `{projects_dir}/{id}` with a starter layout and open a capability on it.
pub async fn create_skeleton(
    projects_dir: &Path,
    id: &str,
    name: &str,
) -> Result<SharedCapability, RegistryError> {
    let dir = projects_dir.join(id);
    tokio::fs::create_dir_all(&dir).await.map_err(|source| {
        let context = format!("failed to create project directory for `{name}`");
        RegistryError::io(context, source)
    })?;
    let root: SharedCapability = Arc::new(
        FsDirectoryCapability::open(&dir)
            .await
            .map_err(|error| RegistryError::from_capability(id, error))?,
    );

    for sub in SKELETON_DIRS {
        fs_ops::mkdir(id, &root, sub).await?;
    }
    let readme = format!("# {name}\n\nWelcome to your new workspace!");
    fs_ops::write_file(id, &root, "README.md", readme.as_bytes()).await?;
    fs_ops::write_file(id, &root, ".gitignore", GITIGNORE.as_bytes()).await?;
    Ok(root)
}
