// Entry-path canonicalization for capability-relative paths:
// separator folding, traversal rejection, 512 char max. Segments are kept
// byte-exact so they match the names the capability lists.

use thiserror::Error;

/// Maximum allowed path length in characters.
const MAX_PATH_CHARS: usize = 512;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,
}

/// Normalize a `/`-delimited path that is resolved against a capability root.
///
/// Rules:
/// - Keep segment text byte-exact (no Unicode folding)
/// - Convert all separators to `/`
/// - Collapse consecutive `/` into one
/// - Strip leading and trailing `/` (the capability root is the only anchor)
/// - Reject `.` and `..` path components (traversal)
/// - Reject null bytes
/// - Reject empty paths
/// - Enforce max 512 character limit
pub fn normalize_path(input: &str) -> Result<String, PathError> {
    split_segments(input).map(|segments| segments.join("/"))
}

/// Like [`normalize_path`] but returns the individual segments.
pub fn split_segments(input: &str) -> Result<Vec<String>, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let unified = input.replace('\\', "/");

    let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();

    if components.is_empty() {
        return Err(PathError::Empty);
    }

    for component in &components {
        if *component == "." || *component == ".." {
            return Err(PathError::Traversal((*component).to_string()));
        }
    }

    if components.join("/").chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(components.into_iter().map(ToOwned::to_owned).collect())
}

/// Splits a normalized path into its parent segments and final name.
pub fn split_parent(input: &str) -> Result<(Vec<String>, String), PathError> {
    let mut segments = split_segments(input)?;
    let name = segments.pop().ok_or(PathError::Empty)?;
    Ok((segments, name))
}
