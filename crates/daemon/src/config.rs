// Local configuration for the daemon.
//
// Global config: `~/.ai-ide/config.toml`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::security::{create_private_dir_all, ensure_owner_only_file};

/// Root directory for aide global state: `~/.ai-ide/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".ai-ide"))
}

/// Path to the global config file: `~/.ai-ide/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

// ── Global config ──────────────────────────────────────────────────

/// Global daemon configuration at `~/.ai-ide/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct GlobalConfig {
    pub registry: RegistryConfig,
    pub validation: ValidationConfig,
    pub import: ImportConfig,
}

impl GlobalConfig {
    /// Load from `~/.ai-ide/config.toml`. Returns defaults if the file
    /// doesn't exist or can't be parsed.
    pub fn load() -> Self {
        global_config_path()
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            create_private_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents)
            .and_then(|_| ensure_owner_only_file(path))
            .map_err(ConfigError::Io)
    }

    /// Concrete store locations. Unset paths default under `state_dir`;
    /// relative path hints resolve against `home` unless overridden.
    pub fn registry_paths(&self, state_dir: &Path, home: &Path) -> RegistryPaths {
        let registry = &self.registry;
        RegistryPaths {
            records_dir: registry
                .records_dir
                .clone()
                .unwrap_or_else(|| state_dir.join("workspaces")),
            local_index_path: registry
                .local_index_path
                .clone()
                .unwrap_or_else(|| state_dir.join("local").join("workspace_handles.json")),
            projects_dir: registry
                .projects_dir
                .clone()
                .unwrap_or_else(|| state_dir.join("projects")),
            relative_base: registry
                .relative_base
                .clone()
                .unwrap_or_else(|| home.to_path_buf()),
        }
    }
}

/// Where the registry keeps its stores.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// One JSON record per workspace (default `~/.ai-ide/workspaces`).
    pub records_dir: Option<PathBuf>,
    /// Client-local handle index (default `~/.ai-ide/local/workspace_handles.json`).
    pub local_index_path: Option<PathBuf>,
    /// Parent of server-generated skeleton projects (default `~/.ai-ide/projects`).
    pub projects_dir: Option<PathBuf>,
    /// Base for relative path hints (default: home directory).
    pub relative_base: Option<PathBuf>,
}

/// Ceilings for non-interactive validation work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationConfig {
    /// Per-workspace permission check during reconciliation.
    pub timeout_secs: u64,
    /// Each spawned git command.
    pub git_timeout_secs: u64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            git_timeout_secs: 30,
        }
    }
}

impl ValidationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    /// Write `.ai-ide/workspace.json` into imported directories.
    pub write_workspace_config: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            write_workspace_config: true,
        }
    }
}

/// Resolved store locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryPaths {
    pub records_dir: PathBuf,
    pub local_index_path: PathBuf,
    pub projects_dir: PathBuf,
    pub relative_base: PathBuf,
}

impl RegistryPaths {
    /// Every store under one directory. Used by tests and embedders.
    pub fn under(root: &Path) -> Self {
        GlobalConfig::default().registry_paths(root, root)
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
