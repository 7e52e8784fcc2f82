// Capability backed by a real directory on the local filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use aide_common::types::EntryKind;
use async_trait::async_trait;
use tracing::warn;

use super::{CapabilityError, DirEntry, DirectoryCapability, PermissionState, SharedCapability};

const GRANTED: u8 = 0;
const PROMPT: u8 = 1;
const DENIED: u8 = 2;

/// Permission state shared by a capability and every child handle derived from it.
#[derive(Debug, Clone)]
pub struct PermissionGate(Arc<AtomicU8>);

impl PermissionGate {
    pub fn granted() -> Self {
        Self(Arc::new(AtomicU8::new(GRANTED)))
    }

    pub fn state(&self) -> PermissionState {
        match self.0.load(Ordering::SeqCst) {
            GRANTED => PermissionState::Granted,
            DENIED => PermissionState::Denied,
            _ => PermissionState::Prompt,
        }
    }

    pub fn set(&self, state: PermissionState) {
        let raw = match state {
            PermissionState::Granted => GRANTED,
            PermissionState::Prompt => PROMPT,
            PermissionState::Denied => DENIED,
        };
        self.0.store(raw, Ordering::SeqCst);
    }

    /// Silently lapse the grant, as the platform may do at any time.
    pub fn revoke(&self) {
        self.set(PermissionState::Prompt);
    }
}

#[derive(Debug, Clone)]
pub struct FsDirectoryCapability {
    root: PathBuf,
    name: String,
    gate: PermissionGate,
}

impl FsDirectoryCapability {
    /// Open a capability on an existing directory.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CapabilityError> {
        let root: PathBuf = path.into();
        match tokio::fs::metadata(&root).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(CapabilityError::TypeMismatch(root.display().to_string())),
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Err(CapabilityError::NotFound(root.display().to_string()));
            }
            Err(error) => return Err(CapabilityError::Io(error)),
        }
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| root.display().to_string());
        Ok(Self {
            root,
            name,
            gate: PermissionGate::granted(),
        })
    }

    pub fn gate(&self) -> &PermissionGate {
        &self.gate
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn child(&self, name: &str) -> Self {
        Self {
            root: self.root.join(name),
            name: name.to_string(),
            gate: self.gate.clone(),
        }
    }

    fn ensure_granted(&self) -> Result<(), CapabilityError> {
        match self.gate.state() {
            PermissionState::Granted => Ok(()),
            _ => Err(CapabilityError::PermissionDenied),
        }
    }

    async fn ensure_root(&self) -> Result<(), CapabilityError> {
        match tokio::fs::metadata(&self.root).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CapabilityError::RootMissing),
            Err(error) if error.kind() == ErrorKind::NotFound => Err(CapabilityError::RootMissing),
            Err(error) => Err(CapabilityError::Io(error)),
        }
    }

    /// Resolve a single-segment entry name under this directory.
    fn entry_path(&self, name: &str) -> Result<PathBuf, CapabilityError> {
        validate_entry_name(name)?;
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl DirectoryCapability for FsDirectoryCapability {
    fn name(&self) -> &str {
        &self.name
    }

    fn local_path(&self) -> Option<&Path> {
        Some(&self.root)
    }

    async fn query_permission(&self) -> Result<PermissionState, CapabilityError> {
        self.ensure_root().await?;
        Ok(self.gate.state())
    }

    async fn request_permission(&self) -> Result<PermissionState, CapabilityError> {
        self.ensure_root().await?;
        // A lapsed grant is restored on request; an explicit denial sticks.
        if self.gate.state() == PermissionState::Prompt {
            self.gate.set(PermissionState::Granted);
        }
        Ok(self.gate.state())
    }

    async fn entries(&self) -> Result<Vec<DirEntry>, CapabilityError> {
        self.ensure_granted()?;
        let mut reader = tokio::fs::read_dir(&self.root)
            .await
            .map_err(|e| map_io(e, &self.name))?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let file_type = entry.file_type().await?;
            // Symlinks could escape the granted tree.
            let kind = if file_type.is_dir() {
                EntryKind::Directory
            } else if file_type.is_file() {
                EntryKind::File
            } else {
                continue;
            };
            // Only names that resolve back through this capability are listed.
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!(
                    directory = %self.name,
                    entry = %file_name.to_string_lossy(),
                    "skipping entry with non-UTF-8 name"
                );
                continue;
            };
            if let Err(error) = validate_entry_name(name) {
                warn!(directory = %self.name, error = %error, "skipping unaddressable entry");
                continue;
            }
            entries.push(DirEntry {
                name: name.to_string(),
                kind,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn directory(
        &self,
        name: &str,
        create: bool,
    ) -> Result<SharedCapability, CapabilityError> {
        self.ensure_granted()?;
        let path = self.entry_path(name)?;
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => return Err(CapabilityError::TypeMismatch(name.to_string())),
            Err(error) if error.kind() == ErrorKind::NotFound && create => {
                tokio::fs::create_dir(&path)
                    .await
                    .map_err(|e| map_io(e, name))?;
            }
            Err(error) => return Err(map_io(error, name)),
        }
        Ok(Arc::new(self.child(name)))
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, CapabilityError> {
        self.ensure_granted()?;
        let path = self.entry_path(name)?;
        let meta = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| map_io(e, name))?;
        if !meta.is_file() {
            return Err(CapabilityError::TypeMismatch(name.to_string()));
        }
        tokio::fs::read(&path).await.map_err(|e| map_io(e, name))
    }

    async fn write_file(&self, name: &str, contents: &[u8]) -> Result<(), CapabilityError> {
        self.ensure_granted()?;
        let path = self.entry_path(name)?;
        match tokio::fs::symlink_metadata(&path).await {
            Ok(meta) if !meta.is_file() => {
                return Err(CapabilityError::TypeMismatch(name.to_string()));
            }
            Ok(_) => {}
            Err(error) if error.kind() == ErrorKind::NotFound => {}
            Err(error) => return Err(map_io(error, name)),
        }
        tokio::fs::write(&path, contents)
            .await
            .map_err(|e| map_io(e, name))
    }

    async fn remove_entry(&self, name: &str, recursive: bool) -> Result<(), CapabilityError> {
        self.ensure_granted()?;
        let path = self.entry_path(name)?;
        let meta = tokio::fs::symlink_metadata(&path)
            .await
            .map_err(|e| map_io(e, name))?;
        let result = if meta.is_dir() {
            if recursive {
                tokio::fs::remove_dir_all(&path).await
            } else {
                tokio::fs::remove_dir(&path).await
            }
        } else {
            tokio::fs::remove_file(&path).await
        };
        result.map_err(|e| map_io(e, name))
    }
}

fn validate_entry_name(name: &str) -> Result<(), CapabilityError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(CapabilityError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn map_io(error: std::io::Error, name: &str) -> CapabilityError {
    match error.kind() {
        ErrorKind::NotFound => CapabilityError::NotFound(name.to_string()),
        ErrorKind::PermissionDenied => CapabilityError::PermissionDenied,
        _ => CapabilityError::Io(error),
    }
}
