// Directory capabilities: scoped, non-serializable access to a directory tree,
// obtainable only through a provider grant.

pub mod fs;
pub mod provider;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use aide_common::types::EntryKind;
use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use fs::{FsDirectoryCapability, PermissionGate};
pub use provider::{GrantProvider, NonInteractive};

#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("`{0}` was not found")]
    NotFound(String),

    /// The directory the capability is rooted at no longer exists.
    #[error("capability root no longer exists")]
    RootMissing,

    #[error("permission has not been granted")]
    PermissionDenied,

    #[error("`{0}` is not the expected kind of entry")]
    TypeMismatch(String),

    #[error("`{0}` is not a valid entry name")]
    InvalidName(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Permission state reported by a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Access lapsed; a user gesture is needed to grant it again.
    Prompt,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub kind: EntryKind,
}

/// A live handle to a directory. Entry names are single path segments.
#[async_trait]
pub trait DirectoryCapability: Send + Sync + fmt::Debug {
    /// Directory base name as reported by the platform.
    fn name(&self) -> &str;

    /// Filesystem location, when the platform exposes one.
    fn local_path(&self) -> Option<&Path> {
        None
    }

    /// Non-interactive permission check.
    async fn query_permission(&self) -> Result<PermissionState, CapabilityError>;

    /// Ask for read/write permission. May involve the user.
    async fn request_permission(&self) -> Result<PermissionState, CapabilityError>;

    async fn entries(&self) -> Result<Vec<DirEntry>, CapabilityError>;

    async fn directory(
        &self,
        name: &str,
        create: bool,
    ) -> Result<SharedCapability, CapabilityError>;

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, CapabilityError>;

    /// Create-if-missing, truncating write.
    async fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), CapabilityError>;

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<(), CapabilityError>;
}

pub type SharedCapability = Arc<dyn DirectoryCapability>;

/// What the provider is being asked to pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRequest {
    /// Workspace being re-granted; `None` for a fresh import.
    pub workspace_id: Option<String>,
    /// Remembered directory name shown to the user as guidance.
    pub expected_name: Option<String>,
}

impl PromptRequest {
    pub fn import() -> Self {
        Self {
            workspace_id: None,
            expected_name: None,
        }
    }

    pub fn regrant(workspace_id: impl Into<String>, expected_name: impl Into<String>) -> Self {
        Self {
            workspace_id: Some(workspace_id.into()),
            expected_name: Some(expected_name.into()),
        }
    }

    pub fn guidance(&self) -> String {
        match &self.expected_name {
            Some(name) => format!("Please select the \"{name}\" folder to restore access"),
            None => "Please select a project folder to import".to_string(),
        }
    }
}

/// Result of one interactive prompt. Never an error: an abandoned prompt is `Aborted`.
#[derive(Debug, Clone)]
pub enum PromptOutcome {
    Granted(SharedCapability),
    Denied,
    Aborted,
}

/// The platform's interactive picker.
#[async_trait]
pub trait CapabilityProvider: Send + Sync {
    async fn prompt(&self, request: &PromptRequest) -> PromptOutcome;
}
