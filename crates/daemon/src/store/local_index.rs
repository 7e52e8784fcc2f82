// Local Index: client-local id -> descriptor map persisted as one JSON object.
// Entries never imply access; they only remember what was granted before.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use aide_common::types::HandleDescriptor;
use tracing::warn;

use crate::error::RegistryError;
use crate::security::{create_private_dir_all, write_private_atomic};

#[derive(Debug)]
pub struct LocalIndex {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, HandleDescriptor>>,
}

impl LocalIndex {
    /// Load the index. An unreadable or corrupt file starts an empty index;
    /// every entry is disposable.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            create_private_dir_all(parent).map_err(|source| {
                RegistryError::io(
                    format!(
                        "failed to create local index directory `{}`",
                        parent.display()
                    ),
                    source,
                )
            })?;
        }

        let entries = match fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|error| {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "local index is corrupt; starting empty"
                );
                BTreeMap::new()
            }),
            Err(error) if error.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(error) => {
                warn!(
                    path = %path.display(),
                    error = %error,
                    "local index is unreadable; starting empty"
                );
                BTreeMap::new()
            }
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last write wins. Memory only changes once the new map is on disk.
    pub fn put(&self, id: &str, descriptor: HandleDescriptor) -> Result<(), RegistryError> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        let mut next = entries.clone();
        next.insert(id.to_string(), descriptor);
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<HandleDescriptor> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .get(id)
            .cloned()
    }

    /// Returns whether an entry was removed.
    pub fn remove(&self, id: &str) -> Result<bool, RegistryError> {
        let mut entries = self.entries.write().unwrap_or_else(|p| p.into_inner());
        if !entries.contains_key(id) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(id);
        self.persist(&next)?;
        *entries = next;
        Ok(true)
    }

    pub fn all(&self) -> BTreeMap<String, HandleDescriptor> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    fn persist(&self, entries: &BTreeMap<String, HandleDescriptor>) -> Result<(), RegistryError> {
        let encoded = serde_json::to_vec(entries)?;
        write_private_atomic(&self.path, &encoded).map_err(|source| {
            RegistryError::io("failed to write local index", source)
        })
    }
}
