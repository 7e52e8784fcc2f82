// Reconciliation Engine: validates every candidate workspace against the
// Handle Cache, Local Index and Provider, and repairs or prunes the stores.
//
// Per id the steps run under a keyed lock, so two passes never race on the
// same workspace; unrelated ids resolve concurrently. Interactive prompts are
// serialized through a single gate.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use aide_common::types::{HandleDescriptor, WorkspaceRecord, WorkspaceSummary};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::capability::{
    CapabilityError, CapabilityProvider, PermissionState, PromptOutcome, PromptRequest,
    SharedCapability,
};
use crate::error::RegistryError;
use crate::session::HandleCache;
use crate::store::{LoadedRecord, LocalIndex, RecordStore};

/// Why a workspace was left untouched for this pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    Denied,
    Aborted,
    TimedOut,
    /// A transient store or capability failure.
    Failed,
}

/// Why a workspace was deleted from every store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanReason {
    MissingRecord,
    Corrupt,
    NoDescriptor,
    Mismatch,
    Unreachable,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    Resolved {
        record: WorkspaceRecord,
        handle: SharedCapability,
    },
    Unresolved {
        pending: PendingWorkspace,
    },
    Orphaned {
        id: String,
        reason: OrphanReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Ready,
    Empty,
    /// Records exist but none could be resolved.
    AllAccessLost,
}

/// An unresolved workspace the caller may retry with a fresh grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingWorkspace {
    pub id: String,
    /// Remembered directory name to show in the prompt.
    pub name: String,
    pub path: String,
    pub reason: UnresolvedReason,
    /// Prompt text naming the folder to pick.
    pub guidance: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedWorkspace {
    pub id: String,
    pub reason: OrphanReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkspaceListing {
    pub status: ListingStatus,
    pub workspaces: Vec<WorkspaceSummary>,
    pub pending: Vec<PendingWorkspace>,
    pub removed: Vec<RemovedWorkspace>,
}

#[derive(Debug, Default)]
struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl KeyedLocks {
    async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

#[derive(Debug)]
pub struct Reconciler {
    records: Arc<RecordStore>,
    index: Arc<LocalIndex>,
    cache: Arc<HandleCache>,
    locks: KeyedLocks,
    prompt_gate: tokio::sync::Mutex<()>,
    validation_timeout: Duration,
}

impl Reconciler {
    pub fn new(
        records: Arc<RecordStore>,
        index: Arc<LocalIndex>,
        cache: Arc<HandleCache>,
        validation_timeout: Duration,
    ) -> Self {
        Self {
            records,
            index,
            cache,
            locks: KeyedLocks::default(),
            prompt_gate: tokio::sync::Mutex::new(()),
            validation_timeout,
        }
    }

    /// Hold the per-id lock while mutating a workspace outside a pass.
    pub(crate) async fn lock(&self, id: &str) -> OwnedMutexGuard<()> {
        self.locks.lock(id).await
    }

    /// Show one prompt and, on a grant, request permission on the result.
    /// Prompts never overlap.
    pub(crate) async fn prompt_for_grant(
        &self,
        provider: &dyn CapabilityProvider,
        request: &PromptRequest,
    ) -> PromptOutcome {
        let _prompt = self.prompt_gate.lock().await;
        match provider.prompt(request).await {
            PromptOutcome::Granted(handle) => match handle.request_permission().await {
                Ok(PermissionState::Granted) => PromptOutcome::Granted(handle),
                Ok(_) => PromptOutcome::Denied,
                Err(error) => {
                    warn!(error = %error, "permission request on granted directory failed");
                    PromptOutcome::Denied
                }
            },
            other => other,
        }
    }

    /// Run a full pass over every id known to any store.
    pub async fn reconcile_all(
        &self,
        provider: &dyn CapabilityProvider,
    ) -> Result<WorkspaceListing, RegistryError> {
        let listing = self.records.list()?;
        let store_was_empty = listing.is_empty();

        let mut seen = HashSet::new();
        let candidates: Vec<String> = listing
            .ids()
            .map(ToOwned::to_owned)
            .chain(self.index.ids())
            .chain(self.cache.ids())
            .filter(|id| seen.insert(id.clone()))
            .collect();
        debug!(candidates = candidates.len(), "reconciliation pass started");

        let resolutions = join_all(candidates.iter().map(|id| self.resolve(id, provider))).await;

        let mut workspaces = Vec::new();
        let mut pending = Vec::new();
        let mut removed = Vec::new();
        for resolution in resolutions {
            match resolution {
                Resolution::Resolved { record, .. } => {
                    workspaces.push(WorkspaceSummary::from(&record))
                }
                Resolution::Unresolved { pending: entry } => pending.push(entry),
                Resolution::Orphaned { id, reason } => {
                    removed.push(RemovedWorkspace { id, reason })
                }
            }
        }

        self.sweep_cache();

        let status = if !workspaces.is_empty() {
            ListingStatus::Ready
        } else if store_was_empty {
            ListingStatus::Empty
        } else {
            ListingStatus::AllAccessLost
        };
        if status == ListingStatus::AllAccessLost {
            warn!(
                pending = pending.len(),
                removed = removed.len(),
                "all workspace access lost"
            );
        }

        Ok(WorkspaceListing {
            status,
            workspaces,
            pending,
            removed,
        })
    }

    /// Resolve a single workspace.
    pub async fn resolve(&self, id: &str, provider: &dyn CapabilityProvider) -> Resolution {
        let _guard = self.locks.lock(id).await;

        let (record, repaired) = match self.records.load(id) {
            Ok(Some(LoadedRecord::Valid(record))) => (record, false),
            Ok(Some(LoadedRecord::Repaired(record))) => (record, true),
            Ok(Some(LoadedRecord::Irreparable { .. })) => {
                return self.orphan(id, OrphanReason::Corrupt);
            }
            Ok(None) | Err(RegistryError::InvalidInput(_)) => {
                return self.orphan(id, OrphanReason::MissingRecord);
            }
            Err(error) => {
                warn!(workspace_id = %id, error = %error, "workspace record unreadable");
                return unresolved(id, id, "", UnresolvedReason::Failed);
            }
        };

        if let Some(handle) = self.cache.get(id) {
            match tokio::time::timeout(self.validation_timeout, handle.query_permission()).await {
                Ok(Ok(PermissionState::Granted)) => {
                    debug!(workspace_id = %id, "cached handle still granted");
                    return self.accept(record, repaired, handle);
                }
                Ok(Err(CapabilityError::RootMissing)) => {
                    return self.orphan(id, OrphanReason::Unreachable);
                }
                Ok(Ok(state)) => {
                    debug!(workspace_id = %id, ?state, "cached handle lost permission");
                    self.cache.remove(id);
                }
                Ok(Err(error)) => {
                    debug!(workspace_id = %id, error = %error, "cached handle failed validation");
                    self.cache.remove(id);
                }
                Err(_) => {
                    warn!(workspace_id = %id, "workspace validation timed out");
                    return unresolved(
                        id,
                        &record.name,
                        &record.path,
                        UnresolvedReason::TimedOut,
                    );
                }
            }
        }

        let Some(descriptor) = self.index.get(id) else {
            return self.orphan(id, OrphanReason::NoDescriptor);
        };

        let pending = |reason| unresolved(id, &descriptor.name, &record.path, reason);
        let request = PromptRequest::regrant(id, descriptor.name.clone());
        let _prompt = self.prompt_gate.lock().await;
        let handle = match provider.prompt(&request).await {
            PromptOutcome::Granted(handle) => handle,
            PromptOutcome::Denied => {
                warn!(workspace_id = %id, "directory access denied");
                return pending(UnresolvedReason::Denied);
            }
            PromptOutcome::Aborted => {
                debug!(workspace_id = %id, "directory prompt aborted");
                return pending(UnresolvedReason::Aborted);
            }
        };

        if handle.name() != descriptor.name {
            info!(
                workspace_id = %id,
                expected = %descriptor.name,
                actual = %handle.name(),
                "granted directory does not match workspace"
            );
            return self.orphan(id, OrphanReason::Mismatch);
        }

        match handle.request_permission().await {
            Ok(PermissionState::Granted) => {
                self.cache.insert(id, handle.clone());
                self.accept(record, repaired, handle)
            }
            Ok(state) => {
                debug!(workspace_id = %id, ?state, "permission request not granted");
                pending(UnresolvedReason::Denied)
            }
            Err(error) => {
                warn!(workspace_id = %id, error = %error, "permission request failed");
                pending(UnresolvedReason::Failed)
            }
        }
    }

    /// Check a cached handle before it is used for a file operation.
    pub async fn revalidate(&self, id: &str) -> Result<SharedCapability, RegistryError> {
        let _guard = self.locks.lock(id).await;

        if self.records.load(id)?.is_none() {
            return Err(RegistryError::workspace_not_found(id));
        }
        let Some(handle) = self.cache.get(id) else {
            return Err(RegistryError::PermissionDenied(id.to_string()));
        };

        match tokio::time::timeout(self.validation_timeout, handle.query_permission()).await {
            Ok(Ok(PermissionState::Granted)) => Ok(handle),
            Ok(Ok(_)) => {
                self.cache.remove(id);
                Err(RegistryError::PermissionDenied(id.to_string()))
            }
            Ok(Err(CapabilityError::RootMissing)) => {
                self.orphan(id, OrphanReason::Unreachable);
                Err(RegistryError::Unreachable(id.to_string()))
            }
            Ok(Err(error)) => {
                self.cache.remove(id);
                Err(RegistryError::from_capability(id, error))
            }
            Err(_) => Err(RegistryError::io(
                "workspace validation timed out",
                std::io::Error::from(std::io::ErrorKind::TimedOut),
            )),
        }
    }

    /// Delete a workspace from all three stores. Best effort per store.
    pub(crate) fn purge(&self, id: &str) {
        self.cache.remove(id);
        if let Err(error) = self.index.remove(id) {
            warn!(workspace_id = %id, error = %error, "failed to remove local index entry");
        }
        match self.records.delete(id) {
            Ok(_) | Err(RegistryError::InvalidInput(_)) => {}
            Err(error) => {
                warn!(workspace_id = %id, error = %error, "failed to delete workspace record")
            }
        }
    }

    fn orphan(&self, id: &str, reason: OrphanReason) -> Resolution {
        self.purge(id);
        info!(workspace_id = %id, ?reason, "orphaned workspace pruned");
        Resolution::Orphaned {
            id: id.to_string(),
            reason,
        }
    }

    fn accept(
        &self,
        mut record: WorkspaceRecord,
        repaired: bool,
        handle: SharedCapability,
    ) -> Resolution {
        if repaired {
            info!(workspace_id = %record.id, "repaired workspace record written back");
        }
        if let Err(error) = self.records.touch(&mut record) {
            warn!(workspace_id = %record.id, error = %error, "failed to refresh lastAccessed");
        }
        let descriptor = HandleDescriptor::directory(handle.name(), Utc::now());
        if let Err(error) = self.index.put(&record.id, descriptor) {
            warn!(workspace_id = %record.id, error = %error, "failed to refresh local index entry");
        }
        Resolution::Resolved { record, handle }
    }

    // Cache entries must always be backed by a record and an index entry.
    fn sweep_cache(&self) {
        for id in self.cache.ids() {
            let has_record = matches!(self.records.load(&id), Ok(Some(_)));
            if !has_record || self.index.get(&id).is_none() {
                debug!(workspace_id = %id, "dropping unbacked cache entry");
                self.cache.remove(&id);
            }
        }
    }
}

fn unresolved(id: &str, name: &str, path: &str, reason: UnresolvedReason) -> Resolution {
    Resolution::Unresolved {
        pending: PendingWorkspace {
            id: id.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            reason,
            guidance: PromptRequest::regrant(id, name).guidance(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::{DirEntry, DirectoryCapability, FsDirectoryCapability};
    use crate::store::NewWorkspace;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    /// Provider that replays scripted outcomes and records what it was asked.
    #[derive(Default)]
    struct ScriptedProvider {
        outcomes: Mutex<VecDeque<PromptOutcome>>,
        asked: Mutex<Vec<PromptRequest>>,
    }

    impl ScriptedProvider {
        fn new(outcomes: Vec<PromptOutcome>) -> Self {
            Self {
                outcomes: Mutex::new(outcomes.into()),
                asked: Mutex::new(Vec::new()),
            }
        }

        fn asked(&self) -> Vec<PromptRequest> {
            self.asked.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CapabilityProvider for ScriptedProvider {
        async fn prompt(&self, request: &PromptRequest) -> PromptOutcome {
            self.asked.lock().unwrap().push(request.clone());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(PromptOutcome::Aborted)
        }
    }

    /// Provider whose prompt never answers; signals once it has been entered.
    #[derive(Default)]
    struct HangingProvider {
        entered: tokio::sync::Notify,
    }

    #[async_trait]
    impl CapabilityProvider for HangingProvider {
        async fn prompt(&self, _request: &PromptRequest) -> PromptOutcome {
            self.entered.notify_one();
            std::future::pending().await
        }
    }

    /// Capability whose permission check never returns.
    #[derive(Debug)]
    struct StalledCapability;

    #[async_trait]
    impl DirectoryCapability for StalledCapability {
        fn name(&self) -> &str {
            "stalled"
        }
        async fn query_permission(&self) -> Result<PermissionState, CapabilityError> {
            std::future::pending().await
        }
        async fn request_permission(&self) -> Result<PermissionState, CapabilityError> {
            std::future::pending().await
        }
        async fn entries(&self) -> Result<Vec<DirEntry>, CapabilityError> {
            Ok(Vec::new())
        }
        async fn directory(
            &self,
            name: &str,
            _create: bool,
        ) -> Result<SharedCapability, CapabilityError> {
            Err(CapabilityError::NotFound(name.to_string()))
        }
        async fn read_file(&self, name: &str) -> Result<Vec<u8>, CapabilityError> {
            Err(CapabilityError::NotFound(name.to_string()))
        }
        async fn write_file(&self, _name: &str, _contents: &[u8]) -> Result<(), CapabilityError> {
            Err(CapabilityError::PermissionDenied)
        }
        async fn remove_entry(&self, name: &str, _recursive: bool) -> Result<(), CapabilityError> {
            Err(CapabilityError::NotFound(name.to_string()))
        }
    }

    fn descriptor(name: &str) -> HandleDescriptor {
        HandleDescriptor::directory(name, Utc::now())
    }

    struct Harness {
        tmp: TempDir,
        records: Arc<RecordStore>,
        index: Arc<LocalIndex>,
        cache: Arc<HandleCache>,
        reconciler: Reconciler,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_timeout(Duration::from_secs(30))
        }

        fn with_timeout(validation_timeout: Duration) -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let records_dir = tmp.path().join("records");
            let records = Arc::new(RecordStore::open(records_dir, tmp.path()).unwrap());
            let index_path = tmp.path().join("local/handles.json");
            let index = Arc::new(LocalIndex::open(index_path).unwrap());
            let cache = Arc::new(HandleCache::new());
            let reconciler = Reconciler::new(
                records.clone(),
                index.clone(),
                cache.clone(),
                validation_timeout,
            );
            Self {
                tmp,
                records,
                index,
                cache,
                reconciler,
            }
        }

        /// Register a directory named `name` with a descriptor; optionally cache it.
        async fn workspace(&self, name: &str, cached: bool) -> (String, FsDirectoryCapability) {
            let dir = self.tmp.path().join("projects").join(name);
            std::fs::create_dir_all(&dir).unwrap();
            let new = NewWorkspace {
                path: dir.display().to_string(),
                ..NewWorkspace::default()
            };
            let record = self.records.create(new).unwrap().record;
            self.index.put(&record.id, descriptor(name)).unwrap();
            let cap = FsDirectoryCapability::open(&dir).await.unwrap();
            if cached {
                self.cache.insert(&record.id, Arc::new(cap.clone()));
            }
            (record.id, cap)
        }

        fn exists_anywhere(&self, id: &str) -> bool {
            matches!(self.records.load(id), Ok(Some(_)))
                || self.index.get(id).is_some()
                || self.cache.contains(id)
        }
    }

    #[tokio::test]
    async fn cached_granted_handle_resolves_without_prompt() {
        let h = Harness::new();
        let (id, _) = h.workspace("proj-a", true).await;
        let provider = ScriptedProvider::new(Vec::new());

        let listing = h.reconciler.reconcile_all(&provider).await.unwrap();

        assert_eq!(listing.status, ListingStatus::Ready);
        assert_eq!(listing.workspaces.len(), 1);
        assert_eq!(listing.workspaces[0].id, id);
        assert!(provider.asked().is_empty());
    }

    #[tokio::test]
    async fn revoked_handle_reprompts_with_remembered_name() {
        let h = Harness::new();
        let (id, cap) = h.workspace("proj-a", true).await;
        cap.gate().revoke();
        let regrant = FsDirectoryCapability::open(cap.root()).await.unwrap();
        let provider = ScriptedProvider::new(vec![PromptOutcome::Granted(Arc::new(regrant))]);

        let resolution = h.reconciler.resolve(&id, &provider).await;

        assert!(matches!(resolution, Resolution::Resolved { .. }));
        assert_eq!(
            provider.asked(),
            vec![PromptRequest::regrant(id.clone(), "proj-a")]
        );
        let cached = h.cache.get(&id).unwrap();
        assert_eq!(
            cached.query_permission().await.unwrap(),
            PermissionState::Granted
        );
    }

    #[tokio::test]
    async fn aborted_prompt_leaves_all_stores_untouched() {
        let h = Harness::new();
        let (id, _) = h.workspace("proj-a", false).await;
        let before = h.records.get(&id).unwrap();
        let provider = ScriptedProvider::new(vec![PromptOutcome::Aborted]);

        let listing = h.reconciler.reconcile_all(&provider).await.unwrap();

        assert_eq!(listing.status, ListingStatus::AllAccessLost);
        assert_eq!(listing.pending.len(), 1);
        assert_eq!(listing.pending[0].reason, UnresolvedReason::Aborted);
        assert_eq!(listing.pending[0].name, "proj-a");
        assert_eq!(
            listing.pending[0].guidance,
            "Please select the \"proj-a\" folder to restore access"
        );
        assert_eq!(h.records.get(&id).unwrap(), before);
        assert!(h.index.get(&id).is_some());
    }

    #[tokio::test]
    async fn denied_prompt_is_unresolved_not_deleted() {
        let h = Harness::new();
        let (id, _) = h.workspace("proj-a", false).await;
        let provider = ScriptedProvider::new(vec![PromptOutcome::Denied]);

        match h.reconciler.resolve(&id, &provider).await {
            Resolution::Unresolved { pending } => {
                assert_eq!(pending.reason, UnresolvedReason::Denied)
            }
            other => panic!("expected unresolved, got {other:?}"),
        }
        assert!(h.records.get(&id).is_ok());
    }

    #[tokio::test]
    async fn missing_root_is_orphaned_everywhere() {
        let h = Harness::new();
        let (id, cap) = h.workspace("proj-a", true).await;
        std::fs::remove_dir_all(cap.root()).unwrap();
        let provider = ScriptedProvider::default();

        let resolution = h.reconciler.resolve(&id, &provider).await;

        assert!(matches!(
            resolution,
            Resolution::Orphaned {
                reason: OrphanReason::Unreachable,
                ..
            }
        ));
        assert!(!h.exists_anywhere(&id));
    }

    #[tokio::test]
    async fn cache_and_index_entries_without_record_are_pruned() {
        let h = Harness::new();
        let (id, cap) = h.workspace("proj-a", true).await;
        h.records.delete(&id).unwrap();
        h.index.put("stray", descriptor("x")).unwrap();
        h.cache.insert("other", Arc::new(cap));
        let provider = ScriptedProvider::default();

        let listing = h.reconciler.reconcile_all(&provider).await.unwrap();

        assert_eq!(listing.status, ListingStatus::Empty);
        let reasons: Vec<_> = listing.removed.iter().map(|r| r.reason).collect();
        assert_eq!(reasons, vec![OrphanReason::MissingRecord; 3]);
        assert!(h.cache.is_empty());
        assert!(h.index.all().is_empty());
    }

    #[tokio::test]
    async fn irreparable_record_is_deleted() {
        let h = Harness::new();
        std::fs::write(h.records.dir().join("broken.json"), "{").unwrap();
        h.index.put("broken", descriptor("x")).unwrap();
        let provider = ScriptedProvider::default();

        let listing = h.reconciler.reconcile_all(&provider).await.unwrap();

        assert_eq!(listing.status, ListingStatus::AllAccessLost);
        assert_eq!(
            listing.removed,
            vec![RemovedWorkspace {
                id: "broken".into(),
                reason: OrphanReason::Corrupt,
            }]
        );
        assert!(!h.exists_anywhere("broken"));
    }

    #[tokio::test]
    async fn repaired_record_is_written_back_when_resolved() {
        let h = Harness::new();
        let (id, _) = h.workspace("proj-a", true).await;
        let path = h.records.dir().join(format!("{id}.json"));
        let raw = std::fs::read(&path).unwrap();
        let mut value: serde_json::Value = serde_json::from_slice(&raw).unwrap();
        value.as_object_mut().unwrap().remove("settings");
        std::fs::write(&path, value.to_string()).unwrap();
        let provider = ScriptedProvider::default();

        let resolution = h.reconciler.resolve(&id, &provider).await;

        assert!(matches!(resolution, Resolution::Resolved { .. }));
        assert!(matches!(
            h.records.load(&id).unwrap(),
            Some(LoadedRecord::Valid(_))
        ));
    }

    #[tokio::test]
    async fn slow_validation_is_skipped_without_blocking_others() {
        let h = Harness::with_timeout(Duration::from_millis(200));
        let (slow, _) = h.workspace("slow", false).await;
        let (fast, _) = h.workspace("fast", true).await;
        h.cache.insert(&slow, Arc::new(StalledCapability));
        let provider = ScriptedProvider::default();

        let listing = h.reconciler.reconcile_all(&provider).await.unwrap();

        assert_eq!(listing.status, ListingStatus::Ready);
        let ids: Vec<&str> = listing.workspaces.iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec![fast.as_str()]);
        assert_eq!(listing.pending.len(), 1);
        assert_eq!(listing.pending[0].id, slow);
        assert_eq!(listing.pending[0].reason, UnresolvedReason::TimedOut);
        assert!(h.records.get(&slow).is_ok());
    }

    #[tokio::test]
    async fn concurrent_resolves_of_one_id_prompt_once() {
        let h = Harness::new();
        let (id, cap) = h.workspace("proj-a", false).await;
        let grant = FsDirectoryCapability::open(cap.root()).await.unwrap();
        let provider = ScriptedProvider::new(vec![PromptOutcome::Granted(Arc::new(grant))]);

        let (first, second) = tokio::join!(
            h.reconciler.resolve(&id, &provider),
            h.reconciler.resolve(&id, &provider)
        );

        assert!(matches!(first, Resolution::Resolved { .. }));
        assert!(matches!(second, Resolution::Resolved { .. }));
        assert_eq!(provider.asked().len(), 1);
        assert!(h.cache.contains(&id));
    }

    #[tokio::test]
    async fn hanging_prompt_blocks_its_id_but_not_others() {
        let h = Harness::new();
        let (waiting, _) = h.workspace("waiting", false).await;
        let (cached, _) = h.workspace("cached", true).await;
        let provider = HangingProvider::default();

        let hanging = h.reconciler.resolve(&waiting, &provider);
        tokio::pin!(hanging);
        tokio::select! {
            _ = &mut hanging => panic!("prompt never answers"),
            _ = provider.entered.notified() => {}
        }

        let again = tokio::time::timeout(
            Duration::from_millis(200),
            h.reconciler.resolve(&waiting, &provider),
        )
        .await;
        assert!(again.is_err(), "a second resolve of the same id must wait");

        let other = tokio::time::timeout(
            Duration::from_secs(5),
            h.reconciler.resolve(&cached, &provider),
        )
        .await
        .expect("an unrelated cached workspace must not wait");
        assert!(matches!(other, Resolution::Resolved { .. }));
    }

    #[tokio::test]
    async fn revalidate_requires_a_cached_grant() {
        let h = Harness::new();
        let (id, cap) = h.workspace("proj-a", false).await;
        assert!(matches!(
            h.reconciler.revalidate(&id).await,
            Err(RegistryError::PermissionDenied(_))
        ));
        assert!(matches!(
            h.reconciler.revalidate("ghost").await,
            Err(RegistryError::NotFound(_))
        ));

        h.cache.insert(&id, Arc::new(cap.clone()));
        assert!(h.reconciler.revalidate(&id).await.is_ok());

        cap.gate().revoke();
        assert!(matches!(
            h.reconciler.revalidate(&id).await,
            Err(RegistryError::PermissionDenied(_))
        ));
        assert!(!h.cache.contains(&id));
        assert!(h.records.get(&id).is_ok());
    }
}
