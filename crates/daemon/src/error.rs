// Registry error taxonomy and its user-facing projection.

use aide_common::path::PathError;
use thiserror::Error;

use crate::capability::CapabilityError;

/// Errors surfaced by the workspace registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A record or a path segment is absent.
    #[error("{0} was not found")]
    NotFound(String),

    /// The capability grant was refused or has been revoked.
    #[error("access to workspace `{0}` was denied")]
    PermissionDenied(String),

    /// The granted directory is not the remembered one.
    #[error("selected directory `{actual}` does not match workspace directory `{expected}`")]
    Mismatch { expected: String, actual: String },

    /// The user cancelled an interactive prompt.
    #[error("directory selection was cancelled")]
    Aborted,

    #[error("workspace record `{id}` is corrupt: {reason}")]
    Corrupt { id: String, reason: String },

    /// The backing directory is confirmed gone.
    #[error("workspace `{0}` directory is no longer reachable")]
    Unreachable(String),

    #[error("invalid path: {0}")]
    InvalidPath(#[from] PathError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode workspace data: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    NotFound,
    PermissionDenied,
    Mismatch,
    Aborted,
    Corrupt,
    Unreachable,
    ValidationFailed,
    InternalError,
}

impl ErrorCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NOT_FOUND",
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::Mismatch => "MISMATCH",
            Self::Aborted => "ABORTED",
            Self::Corrupt => "CORRUPT",
            Self::Unreachable => "UNREACHABLE",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl RegistryError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn workspace_not_found(id: &str) -> Self {
        Self::NotFound(format!("workspace `{id}`"))
    }

    pub fn entry_not_found(path: &str) -> Self {
        Self::NotFound(format!("entry `{path}`"))
    }

    /// Attach workspace context to an error raised by a capability.
    pub fn from_capability(workspace_id: &str, error: CapabilityError) -> Self {
        match error {
            CapabilityError::NotFound(name) => Self::entry_not_found(&name),
            CapabilityError::RootMissing => Self::Unreachable(workspace_id.to_string()),
            CapabilityError::PermissionDenied => Self::PermissionDenied(workspace_id.to_string()),
            CapabilityError::TypeMismatch(name) => {
                Self::InvalidInput(format!("`{name}` is not the expected kind of entry"))
            }
            CapabilityError::InvalidName(name) => {
                Self::InvalidInput(format!("`{name}` is not a valid entry name"))
            }
            CapabilityError::Io(source) => Self::io("workspace filesystem error", source),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::PermissionDenied(_) => ErrorCode::PermissionDenied,
            Self::Mismatch { .. } => ErrorCode::Mismatch,
            Self::Aborted => ErrorCode::Aborted,
            Self::Corrupt { .. } => ErrorCode::Corrupt,
            Self::Unreachable(_) => ErrorCode::Unreachable,
            Self::InvalidPath(_) | Self::InvalidInput(_) => ErrorCode::ValidationFailed,
            Self::Io { .. } | Self::Serialization(_) => ErrorCode::InternalError,
        }
    }

    /// What the user can do about it.
    pub fn user_action(&self) -> &'static str {
        match self.code() {
            ErrorCode::NotFound => "this workspace or entry was removed; refresh the list",
            ErrorCode::PermissionDenied => "open the workspace and grant access again",
            ErrorCode::Mismatch => "this workspace was removed; import the folder again",
            ErrorCode::Aborted => "select the folder to continue",
            ErrorCode::Corrupt => "this workspace was removed; import the folder again",
            ErrorCode::Unreachable => "the folder no longer exists; import it again",
            ErrorCode::ValidationFailed => "check the request and try again",
            ErrorCode::InternalError => "try again; see the daemon log for details",
        }
    }

    /// Message safe to show across the collaborator boundary.
    pub fn user_message(&self) -> String {
        match self {
            Self::Io { context, .. } => context.clone(),
            Self::Serialization(_) => "failed to encode workspace data".to_string(),
            other => other.to_string(),
        }
    }
}
