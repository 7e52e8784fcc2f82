// Workspace Registry: the operations collaborators use. Owns the three stores
// and routes every capability use through revalidation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use aide_common::detect::{detect_project, manifest_entry, Detection};
use aide_common::types::{FileNode, HandleDescriptor, WorkspaceRecord};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::capability::{
    CapabilityProvider, DirectoryCapability, PromptOutcome, PromptRequest, SharedCapability,
};
use crate::config::{GlobalConfig, RegistryPaths};
use crate::error::RegistryError;
use crate::fs_ops;
use crate::git::GitInspector;
use crate::reconcile::{OrphanReason, Reconciler, Resolution, UnresolvedReason, WorkspaceListing};
use crate::scaffold::{self, WorkspaceConfig};
use crate::session::HandleCache;
use crate::store::{LocalIndex, NewWorkspace, RecordPatch, RecordStore, Registration};

#[derive(Debug, Clone)]
pub struct RegistryOptions {
    pub paths: RegistryPaths,
    pub validation_timeout: Duration,
    pub git_timeout: Duration,
    pub write_workspace_config: bool,
}

impl RegistryOptions {
    pub fn from_config(config: &GlobalConfig, state_dir: &Path, home: &Path) -> Self {
        Self {
            paths: config.registry_paths(state_dir, home),
            validation_timeout: config.validation.timeout(),
            git_timeout: config.validation.git_timeout(),
            write_workspace_config: config.import.write_workspace_config,
        }
    }

    /// Defaults with every store under `root`.
    pub fn under(root: &Path) -> Self {
        Self::from_config(&GlobalConfig::default(), root, root)
    }
}

/// Result of [`WorkspaceRegistry::open_workspace`].
#[derive(Debug, Clone)]
pub enum OpenOutcome {
    Opened {
        record: WorkspaceRecord,
        handle: SharedCapability,
    },
    /// Left untouched; may be retried.
    Unresolved { reason: UnresolvedReason },
    /// Deleted from every store, or never existed.
    Removed { reason: OrphanReason },
}

impl OpenOutcome {
    pub fn into_handle(self) -> Option<SharedCapability> {
        match self {
            Self::Opened { handle, .. } => Some(handle),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct WorkspaceRegistry {
    records: Arc<RecordStore>,
    index: Arc<LocalIndex>,
    cache: Arc<HandleCache>,
    reconciler: Reconciler,
    git: GitInspector,
    projects_dir: PathBuf,
    write_workspace_config: bool,
}

impl WorkspaceRegistry {
    pub fn open(options: RegistryOptions) -> Result<Self, RegistryError> {
        let RegistryOptions {
            paths,
            validation_timeout,
            git_timeout,
            write_workspace_config,
        } = options;
        let records = Arc::new(RecordStore::open(&paths.records_dir, &paths.relative_base)?);
        let index = Arc::new(LocalIndex::open(&paths.local_index_path)?);
        let cache = Arc::new(HandleCache::new());
        let reconciler = Reconciler::new(
            records.clone(),
            index.clone(),
            cache.clone(),
            validation_timeout,
        );

        Ok(Self {
            records,
            index,
            cache,
            reconciler,
            git: GitInspector::new(git_timeout),
            projects_dir: paths.projects_dir,
            write_workspace_config,
        })
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn local_index(&self) -> &LocalIndex {
        &self.index
    }

    pub fn handle_cache(&self) -> &HandleCache {
        &self.cache
    }

    // ── Workspaces ─────────────────────────────────────────────────

    /// Reconcile every store and return the workspaces usable right now.
    pub async fn list_workspaces(
        &self,
        provider: &dyn CapabilityProvider,
    ) -> Result<WorkspaceListing, RegistryError> {
        self.reconciler.reconcile_all(provider).await
    }

    /// Create a skeleton project under the projects directory and register it.
    pub async fn create_workspace(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<WorkspaceRecord, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::InvalidInput(
                "workspace name is empty".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        match self.scaffold_and_register(&id, name, description).await {
            Ok((registration, root)) => {
                self.adopt(&registration, root).await;
                Ok(registration.record)
            }
            Err(error) => {
                // No record points at the skeleton; do not leave it behind.
                let dir = self.projects_dir.join(&id);
                if let Err(cleanup) = tokio::fs::remove_dir_all(&dir).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(
                            workspace_id = %id,
                            error = %cleanup,
                            "failed to remove unregistered skeleton"
                        );
                    }
                }
                Err(error)
            }
        }
    }

    /// Ask the provider for a directory and register it. Importing an
    /// already-registered path returns the existing record.
    pub async fn import_workspace(
        &self,
        provider: &dyn CapabilityProvider,
    ) -> Result<Registration, RegistryError> {
        let request = PromptRequest::import();
        let handle = match self.reconciler.prompt_for_grant(provider, &request).await {
            PromptOutcome::Granted(handle) => handle,
            PromptOutcome::Denied => {
                return Err(RegistryError::PermissionDenied("import".to_string()));
            }
            PromptOutcome::Aborted => return Err(RegistryError::Aborted),
        };

        let detection = detect("import", handle.as_ref()).await?;
        let git = if detection.has_git {
            Some(self.git.snapshot(handle.as_ref()).await)
        } else {
            None
        };

        let registration = self.records.create(NewWorkspace {
            id: None,
            path: self.path_hint(handle.as_ref()),
            name: None,
            description: None,
            project_type: detection.project_type,
            project_files: detection.project_files,
            git,
        })?;
        self.adopt(&registration, handle).await;
        Ok(registration)
    }

    /// Steps 1-3 of reconciliation for one id. Never fails: an absent or
    /// unusable workspace yields no handle.
    pub async fn open_workspace(&self, id: &str, provider: &dyn CapabilityProvider) -> OpenOutcome {
        match self.reconciler.resolve(id, provider).await {
            Resolution::Resolved { record, handle } => OpenOutcome::Opened { record, handle },
            Resolution::Unresolved { pending } => OpenOutcome::Unresolved {
                reason: pending.reason,
            },
            Resolution::Orphaned { reason, .. } => OpenOutcome::Removed { reason },
        }
    }

    /// Rename, describe, or change settings.
    pub async fn update_workspace(
        &self,
        id: &str,
        patch: RecordPatch,
    ) -> Result<WorkspaceRecord, RegistryError> {
        let _guard = self.reconciler.lock(id).await;
        self.records.update(id, patch)
    }

    /// Remove a workspace from every store. Always succeeds; returns whether
    /// a record existed.
    pub async fn delete_workspace(&self, id: &str) -> bool {
        let _guard = self.reconciler.lock(id).await;
        let existed = matches!(self.records.load(id), Ok(Some(_)));
        self.reconciler.purge(id);
        info!(workspace_id = %id, existed, "workspace deleted");
        existed
    }

    /// The `.ai-ide/workspace.json` mirrored inside an open workspace.
    pub async fn workspace_config(
        &self,
        id: &str,
    ) -> Result<Option<WorkspaceConfig>, RegistryError> {
        let handle = self.reconciler.revalidate(id).await?;
        self.guard(id, scaffold::read_workspace_config(id, &handle).await)
    }

    // ── Files ──────────────────────────────────────────────────────

    pub async fn list_files(&self, id: &str) -> Result<Vec<FileNode>, RegistryError> {
        let handle = self.reconciler.revalidate(id).await?;
        self.guard(id, fs_ops::list_tree(id, handle.as_ref()).await)
    }

    pub async fn read_file(&self, id: &str, path: &str) -> Result<Vec<u8>, RegistryError> {
        let handle = self.reconciler.revalidate(id).await?;
        self.guard(id, fs_ops::read_file(id, &handle, path).await)
    }

    pub async fn write_file(
        &self,
        id: &str,
        path: &str,
        contents: &[u8],
    ) -> Result<(), RegistryError> {
        let handle = self.reconciler.revalidate(id).await?;
        self.guard(id, fs_ops::write_file(id, &handle, path, contents).await)
    }

    pub async fn mkdir(&self, id: &str, path: &str) -> Result<(), RegistryError> {
        let handle = self.reconciler.revalidate(id).await?;
        self.guard(id, fs_ops::mkdir(id, &handle, path).await)
    }

    pub async fn delete_entry(&self, id: &str, path: &str) -> Result<(), RegistryError> {
        let handle = self.reconciler.revalidate(id).await?;
        self.guard(id, fs_ops::remove(id, &handle, path).await)
    }

    // ── Internals ──────────────────────────────────────────────────

    async fn scaffold_and_register(
        &self,
        id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<(Registration, SharedCapability), RegistryError> {
        let root = scaffold::create_skeleton(&self.projects_dir, id, name).await?;
        let detection = detect(id, root.as_ref()).await?;
        let registration = self.records.create(NewWorkspace {
            id: Some(id.to_string()),
            path: self.path_hint(root.as_ref()),
            name: Some(name.to_string()),
            description,
            project_type: detection.project_type,
            project_files: detection.project_files,
            git: None,
        })?;
        Ok((registration, root))
    }

    /// Record the live handle for a freshly registered workspace.
    async fn adopt(&self, registration: &Registration, handle: SharedCapability) {
        let id = registration.record.id.as_str();
        {
            let _guard = self.reconciler.lock(id).await;
            let descriptor = HandleDescriptor::directory(handle.name(), Utc::now());
            if let Err(error) = self.index.put(id, descriptor) {
                warn!(workspace_id = %id, error = %error, "failed to write local index entry");
            }
            self.cache.insert(id, handle.clone());
        }

        if registration.created && self.write_workspace_config {
            let record = &registration.record;
            if let Err(error) = scaffold::write_workspace_config(&handle, record).await {
                warn!(workspace_id = %id, error = %error, "failed to write workspace config");
            }
        }
    }

    fn path_hint(&self, handle: &dyn DirectoryCapability) -> String {
        match handle.local_path() {
            Some(path) => path.display().to_string(),
            // Resolved against the configured base by the record store.
            None => handle.name().to_string(),
        }
    }

    // A grant that lapsed mid-operation is dropped from the cache.
    fn guard<T>(&self, id: &str, result: Result<T, RegistryError>) -> Result<T, RegistryError> {
        if let Err(RegistryError::PermissionDenied(_)) = &result {
            self.cache.remove(id);
        }
        result
    }
}

async fn detect(id: &str, root: &dyn DirectoryCapability) -> Result<Detection, RegistryError> {
    let entries = root
        .entries()
        .await
        .map_err(|error| RegistryError::from_capability(id, error))?;
    let names: Vec<String> = entries.into_iter().map(|entry| entry.name).collect();

    let manifest = match manifest_entry(&names) {
        Some(name) => root.read_file(name).await.ok(),
        None => None,
    };
    let manifest = manifest.and_then(|raw| String::from_utf8(raw).ok());
    Ok(detect_project(&names, manifest.as_deref()))
}
