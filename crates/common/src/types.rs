// Core domain types shared across all aide crates.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Detected project kind of a workspace root.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ProjectType {
    Nodejs,
    NodejsEsm,
    Rust,
    Go,
    Python,
    #[default]
    Unknown,
}

impl ProjectType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nodejs => "nodejs",
            Self::NodejsEsm => "nodejs-esm",
            Self::Rust => "rust",
            Self::Go => "go",
            Self::Python => "python",
            Self::Unknown => "unknown",
        }
    }

    /// Lenient parse used when repairing records; unrecognized values map to `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "nodejs" => Self::Nodejs,
            "nodejs-esm" => Self::NodejsEsm,
            "rust" => Self::Rust,
            "go" => Self::Go,
            "python" => Self::Python,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Git summary captured once at registration time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitSnapshot {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote: Option<String>,
}

/// Default exclude globs applied to every new workspace.
pub const DEFAULT_EXCLUDE_PATTERNS: &[&str] = &[
    "**/node_modules/**",
    "**/dist/**",
    "**/build/**",
    "**/.git/**",
    "**/target/**",
];

/// Per-workspace editor preferences.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    pub format_on_save: bool,
    pub indent_size: u8,
    pub theme: String,
    pub language: String,
    pub exclude_patterns: BTreeSet<String>,
}

impl WorkspaceSettings {
    /// Defaults derived from the detected project type.
    pub fn defaults_for(project_type: ProjectType) -> Self {
        Self {
            format_on_save: true,
            indent_size: if project_type == ProjectType::Python {
                4
            } else {
                2
            },
            theme: "dark".to_string(),
            language: match project_type {
                ProjectType::Unknown => "plaintext".to_string(),
                other => other.as_str().to_string(),
            },
            exclude_patterns: DEFAULT_EXCLUDE_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
        }
    }
}

impl Default for WorkspaceSettings {
    fn default() -> Self {
        Self::defaults_for(ProjectType::Unknown)
    }
}

/// Durable, server-owned workspace metadata. One JSON document per id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceRecord {
    pub id: String,
    pub path: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    pub project_files: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSnapshot>,
    pub settings: WorkspaceSettings,
}

/// Kind of a filesystem entry reachable through a capability.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// Capability-free descriptor remembered in the client-local index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HandleDescriptor {
    pub name: String,
    pub kind: EntryKind,
    /// Epoch milliseconds of the last successful validation.
    pub timestamp: i64,
}

impl HandleDescriptor {
    pub fn directory(name: impl Into<String>, validated_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            kind: EntryKind::Directory,
            timestamp: validated_at.timestamp_millis(),
        }
    }
}

/// Collaborator-facing projection of a resolved workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSummary {
    pub id: String,
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub project_type: ProjectType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<GitSnapshot>,
    pub settings: WorkspaceSettings,
    pub last_accessed: DateTime<Utc>,
}

impl From<&WorkspaceRecord> for WorkspaceSummary {
    fn from(record: &WorkspaceRecord) -> Self {
        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            path: record.path.clone(),
            project_type: record.project_type,
            git: record.git.clone(),
            settings: record.settings.clone(),
            last_accessed: record.last_accessed,
        }
    }
}

/// One node of a capability-backed directory tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileNode {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<FileNode>>,
}
