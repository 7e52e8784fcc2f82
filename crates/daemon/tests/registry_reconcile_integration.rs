// End-to-end reconciliation across sessions: each `session()` reopens the
// registry over the same state directory with an empty handle cache.

use std::path::{Path, PathBuf};

use aide_daemon::capability::{GrantProvider, NonInteractive};
use aide_daemon::reconcile::{ListingStatus, OrphanReason, UnresolvedReason};
use aide_daemon::{ErrorCode, OpenOutcome, RegistryOptions, WorkspaceRegistry};
use tempfile::TempDir;

struct Fixture {
    tmp: TempDir,
}

impl Fixture {
    fn new() -> Self {
        Self {
            tmp: TempDir::new().expect("tempdir should be created"),
        }
    }

    fn session(&self) -> WorkspaceRegistry {
        WorkspaceRegistry::open(RegistryOptions::under(&self.tmp.path().join("state")))
            .expect("registry should open")
    }

    fn project(&self, name: &str) -> PathBuf {
        let dir = self.tmp.path().join("projects").join(name);
        std::fs::create_dir_all(&dir).expect("project dir should be created");
        dir
    }
}

async fn import(registry: &WorkspaceRegistry, path: &Path) -> String {
    registry
        .import_workspace(&GrantProvider::new().with_import(path))
        .await
        .expect("import should succeed")
        .record
        .id
}

fn assert_cache_is_backed(registry: &WorkspaceRegistry) {
    for id in registry.handle_cache().ids() {
        assert!(
            registry.records().get(&id).is_ok(),
            "cached id `{id}` has no record"
        );
        assert!(
            registry.local_index().get(&id).is_some(),
            "cached id `{id}` has no descriptor"
        );
    }
}

#[tokio::test]
async fn importing_the_same_path_twice_returns_one_record() {
    let fixture = Fixture::new();
    let project = fixture.project("proj-a");
    std::fs::write(project.join("Cargo.toml"), "[package]\nname = \"a\"\n").unwrap();
    let registry = fixture.session();

    let importer = GrantProvider::new().with_import(&project);
    let first = registry.import_workspace(&importer).await.unwrap();
    let second = registry.import_workspace(&importer).await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.record.id, second.record.id);
    assert!(second.record.last_accessed >= first.record.last_accessed);
    assert_eq!(registry.records().list().unwrap().records.len(), 1);
    assert_eq!(first.record.project_type.as_str(), "rust");
    assert!(project.join(".ai-ide/workspace.json").is_file());
}

#[tokio::test]
async fn remembered_name_mismatch_deletes_everywhere() {
    let fixture = Fixture::new();
    let proj_a = fixture.project("proj-a");
    let proj_b = fixture.project("proj-b");
    let id = import(&fixture.session(), &proj_a).await;

    let registry = fixture.session();
    let listing = registry
        .list_workspaces(&GrantProvider::new().with_grant(&id, &proj_b))
        .await
        .unwrap();

    assert!(listing.workspaces.is_empty());
    assert_eq!(listing.removed.len(), 1);
    assert_eq!(listing.removed[0].reason, OrphanReason::Mismatch);
    assert!(registry.records().get(&id).is_err());
    assert!(registry.local_index().get(&id).is_none());
    assert!(!registry.handle_cache().contains(&id));

    // Granting the right folder later cannot bring it back.
    let later = fixture.session();
    let provider = GrantProvider::new().with_grant(&id, &proj_a);
    let listing = later.list_workspaces(&provider).await.unwrap();
    assert!(listing.workspaces.iter().all(|w| w.id != id));
    assert_eq!(listing.status, ListingStatus::Empty);
}

#[tokio::test]
async fn records_without_descriptors_are_orphaned() {
    let fixture = Fixture::new();
    let dirs: Vec<PathBuf> = ["one", "two", "three"]
        .iter()
        .map(|n| fixture.project(n))
        .collect();
    let ids = {
        let registry = fixture.session();
        let mut ids = Vec::new();
        for dir in &dirs {
            ids.push(import(&registry, dir).await);
        }
        assert!(registry.local_index().remove(&ids[2]).unwrap());
        ids
    };

    let registry = fixture.session();
    assert!(registry.handle_cache().is_empty());
    let mut provider = GrantProvider::new();
    for (id, dir) in ids.iter().zip(&dirs) {
        provider = provider.with_grant(id.clone(), dir.clone());
    }
    let listing = registry.list_workspaces(&provider).await.unwrap();

    assert_eq!(listing.status, ListingStatus::Ready);
    let mut resolved: Vec<&str> = listing.workspaces.iter().map(|w| w.id.as_str()).collect();
    resolved.sort_unstable();
    let mut expected = vec![ids[0].as_str(), ids[1].as_str()];
    expected.sort_unstable();
    assert_eq!(resolved, expected);
    assert_eq!(listing.removed.len(), 1);
    assert_eq!(listing.removed[0].id, ids[2]);
    assert_eq!(listing.removed[0].reason, OrphanReason::NoDescriptor);
    assert!(registry.records().get(&ids[2]).is_err());
    assert_cache_is_backed(&registry);
}

#[tokio::test]
async fn all_prompts_aborted_reports_access_lost() {
    let fixture = Fixture::new();
    let ids = {
        let registry = fixture.session();
        vec![
            import(&registry, &fixture.project("a")).await,
            import(&registry, &fixture.project("b")).await,
        ]
    };

    let registry = fixture.session();
    let listing = registry.list_workspaces(&NonInteractive).await.unwrap();

    assert_eq!(listing.status, ListingStatus::AllAccessLost);
    assert!(listing.workspaces.is_empty());
    assert!(listing.removed.is_empty());
    assert_eq!(listing.pending.len(), 2);
    assert!(listing
        .pending
        .iter()
        .all(|p| p.reason == UnresolvedReason::Aborted));
    for id in &ids {
        assert!(
            registry.records().get(id).is_ok(),
            "aborted prompt must not delete `{id}`"
        );
        assert!(registry.local_index().get(id).is_some());
    }

    // Resuming with one answer resolves just that workspace.
    let provider = GrantProvider::new().with_grant(&ids[0], fixture.project("a"));
    let listing = registry.list_workspaces(&provider).await.unwrap();
    assert_eq!(listing.status, ListingStatus::Ready);
    assert_eq!(listing.workspaces.len(), 1);
    assert_eq!(listing.pending.len(), 1);
    assert_eq!(listing.pending[0].id, ids[1]);
    assert_eq!(listing.pending[0].name, "b");
    assert_cache_is_backed(&registry);
}

#[tokio::test]
async fn denial_leaves_workspace_for_a_later_pass() {
    let fixture = Fixture::new();
    let project = fixture.project("kept");
    let id = import(&fixture.session(), &project).await;

    let registry = fixture.session();
    let denial = GrantProvider::new().with_denial(&id);
    match registry.open_workspace(&id, &denial).await {
        OpenOutcome::Unresolved { reason } => assert_eq!(reason, UnresolvedReason::Denied),
        other => panic!("expected unresolved, got {other:?}"),
    }
    assert!(registry.records().get(&id).is_ok());

    let grant = GrantProvider::new().with_grant(&id, &project);
    let opened = registry.open_workspace(&id, &grant).await;
    assert!(opened.into_handle().is_some());
}

#[tokio::test]
async fn deleted_workspace_never_reappears() {
    let fixture = Fixture::new();
    let project = fixture.project("gone");
    let registry = fixture.session();
    let id = import(&registry, &project).await;

    assert!(registry.delete_workspace(&id).await);
    assert!(!registry.delete_workspace(&id).await);
    assert!(registry.records().get(&id).is_err());
    assert!(registry.local_index().get(&id).is_none());
    assert!(!registry.handle_cache().contains(&id));

    let listing = fixture
        .session()
        .list_workspaces(&GrantProvider::new().with_grant(&id, &project))
        .await
        .unwrap();
    assert_eq!(listing.status, ListingStatus::Empty);
    assert!(listing.workspaces.is_empty());
    assert!(
        project.is_dir(),
        "deleting a workspace never touches its directory"
    );
}

#[tokio::test]
async fn open_unknown_workspace_returns_nothing() {
    let fixture = Fixture::new();
    let registry = fixture.session();
    match registry.open_workspace("never-registered", &NonInteractive).await {
        OpenOutcome::Removed { reason } => assert_eq!(reason, OrphanReason::MissingRecord),
        other => panic!("expected removed, got {other:?}"),
    }
}

#[tokio::test]
async fn file_operations_round_trip_and_require_an_open_workspace() {
    let fixture = Fixture::new();
    let project = fixture.project("files");
    let id = import(&fixture.session(), &project).await;

    let registry = fixture.session();
    let error = registry.read_file(&id, "notes.txt").await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::PermissionDenied);

    let grant = GrantProvider::new().with_grant(&id, &project);
    let opened = registry.open_workspace(&id, &grant).await;
    assert!(opened.into_handle().is_some());

    let notes = "deep/er/notes.txt";
    let contents = b"line one\n\xffbinary\n".to_vec();
    registry.write_file(&id, notes, &contents).await.unwrap();
    assert_eq!(registry.read_file(&id, notes).await.unwrap(), contents);

    registry.mkdir(&id, "empty/child").await.unwrap();
    let tree = registry.list_files(&id).await.unwrap();
    let top: Vec<&str> = tree.iter().map(|node| node.name.as_str()).collect();
    assert_eq!(top, vec![".ai-ide", "deep", "empty"]);

    registry.delete_entry(&id, "deep").await.unwrap();
    let error = registry.read_file(&id, notes).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::NotFound);
    assert!(!project.join("deep").exists());
}

#[tokio::test]
async fn vanished_directory_is_purged_on_next_use() {
    let fixture = Fixture::new();
    let project = fixture.project("ephemeral");
    let registry = fixture.session();
    let id = import(&registry, &project).await;

    std::fs::remove_dir_all(&project).unwrap();
    let error = registry.list_files(&id).await.unwrap_err();
    assert_eq!(error.code(), ErrorCode::Unreachable);
    assert!(registry.records().get(&id).is_err());
    assert!(registry.local_index().get(&id).is_none());
}
