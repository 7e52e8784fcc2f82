// Record Store: one pretty-printed JSON document per workspace at
// `{records_dir}/{id}.json`. The only source of truth for existence.

use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

use aide_common::types::{GitSnapshot, ProjectType, WorkspaceRecord, WorkspaceSettings};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RegistryError;
use crate::security::{create_private_dir_all, is_temp_file, write_private_atomic};

const RECORD_EXT: &str = "json";
const MAX_ID_LEN: usize = 128;

/// Metadata for a workspace about to be registered.
#[derive(Debug, Clone, Default)]
pub struct NewWorkspace {
    /// Preassigned id; generated when `None`.
    pub id: Option<String>,
    pub path: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub project_type: ProjectType,
    pub project_files: BTreeSet<String>,
    pub git: Option<GitSnapshot>,
}

/// Outcome of [`RecordStore::create`].
#[derive(Debug, Clone)]
pub struct Registration {
    pub record: WorkspaceRecord,
    /// `false` when an existing record with the same path hint was returned.
    pub created: bool,
}

/// Partial metadata edit. An empty `description` clears it.
#[derive(Debug, Clone, Default)]
pub struct RecordPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub settings: Option<WorkspaceSettings>,
}

impl RecordPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.settings.is_none()
    }
}

/// A record as read from disk.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedRecord {
    Valid(WorkspaceRecord),
    /// Structurally invalid but reconstructed; not yet written back.
    Repaired(WorkspaceRecord),
    /// Neither the id nor the path hint could be recovered.
    Irreparable { reason: String },
}

#[derive(Debug, Clone)]
pub struct StoredRecord {
    pub record: WorkspaceRecord,
    pub repaired: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptRecord {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct RecordListing {
    /// Ordered by creation time, then id.
    pub records: Vec<StoredRecord>,
    /// Irreparable records, flagged for deletion.
    pub corrupt: Vec<CorruptRecord>,
}

impl RecordListing {
    pub fn is_empty(&self) -> bool {
        self.records.is_empty() && self.corrupt.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records
            .iter()
            .map(|stored| stored.record.id.as_str())
            .chain(self.corrupt.iter().map(|c| c.id.as_str()))
    }
}

#[derive(Debug)]
pub struct RecordStore {
    dir: PathBuf,
    relative_base: PathBuf,
    // Serializes the duplicate-path check with the write that follows it.
    create_lock: Mutex<()>,
}

impl RecordStore {
    pub fn open(
        dir: impl Into<PathBuf>,
        relative_base: impl Into<PathBuf>,
    ) -> Result<Self, RegistryError> {
        let dir = dir.into();
        create_private_dir_all(&dir).map_err(|source| {
            RegistryError::io(
                format!("failed to create records directory `{}`", dir.display()),
                source,
            )
        })?;
        Ok(Self {
            dir,
            relative_base: relative_base.into(),
            create_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute, lexically normalized form of a path hint.
    pub fn resolve_path_hint(&self, raw: &str) -> Result<String, RegistryError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(RegistryError::InvalidInput(
                "workspace path is empty".to_string(),
            ));
        }
        let candidate = Path::new(trimmed);
        let joined = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            self.relative_base.join(candidate)
        };

        let mut resolved = PathBuf::new();
        for component in joined.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    resolved.pop();
                }
                other => resolved.push(other.as_os_str()),
            }
        }
        Ok(resolved.display().to_string())
    }

    /// Register a workspace. Idempotent on the resolved path hint: a second
    /// registration of the same path returns the existing record with
    /// `lastAccessed` refreshed.
    pub fn create(&self, new: NewWorkspace) -> Result<Registration, RegistryError> {
        let path = self.resolve_path_hint(&new.path)?;
        let _guard = self
            .create_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let existing = self
            .list()?
            .records
            .into_iter()
            .find(|stored| stored.record.path == path);
        if let Some(existing) = existing {
            let mut record = existing.record;
            record.last_accessed = Utc::now();
            self.put(&record)?;
            debug!(workspace_id = %record.id, path = %path, "path already registered");
            return Ok(Registration {
                record,
                created: false,
            });
        }

        let id = match new.id {
            Some(id) => {
                if self.load(&id)?.is_some() {
                    return Err(RegistryError::InvalidInput(format!(
                        "workspace `{id}` already exists"
                    )));
                }
                id
            }
            None => Uuid::new_v4().to_string(),
        };
        let now = Utc::now();
        let name = new
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| base_name(&path));
        let record = WorkspaceRecord {
            id,
            path,
            name,
            description: new.description.filter(|d| !d.trim().is_empty()),
            created: now,
            modified: now,
            last_accessed: now,
            project_type: new.project_type,
            project_files: new.project_files,
            git: new.git,
            settings: WorkspaceSettings::defaults_for(new.project_type),
        };
        self.put(&record)?;
        info!(workspace_id = %record.id, path = %record.path, "workspace registered");
        Ok(Registration {
            record,
            created: true,
        })
    }

    /// Read one record, repairing it in memory if needed.
    pub fn get(&self, id: &str) -> Result<WorkspaceRecord, RegistryError> {
        match self.load(id)? {
            Some(LoadedRecord::Valid(record) | LoadedRecord::Repaired(record)) => Ok(record),
            Some(LoadedRecord::Irreparable { reason }) => Err(RegistryError::Corrupt {
                id: id.to_string(),
                reason,
            }),
            None => Err(RegistryError::workspace_not_found(id)),
        }
    }

    /// Read one record without failing on structural damage. `None` when absent.
    pub fn load(&self, id: &str) -> Result<Option<LoadedRecord>, RegistryError> {
        validate_id(id)?;
        let path = self.record_path(id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(RegistryError::io(
                    format!("failed to read workspace record `{id}`"),
                    source,
                ));
            }
        };

        let value: Value = match serde_json::from_slice(&raw) {
            Ok(value) => value,
            Err(error) => {
                return Ok(Some(LoadedRecord::Irreparable {
                    reason: format!("invalid JSON: {error}"),
                }));
            }
        };

        if let Ok(record) = serde_json::from_value::<WorkspaceRecord>(value.clone()) {
            if record.id == id {
                return Ok(Some(LoadedRecord::Valid(record)));
            }
        }

        Ok(Some(match repair_record(id, &value) {
            Some(record) => {
                warn!(workspace_id = %id, "workspace record repaired");
                LoadedRecord::Repaired(record)
            }
            None => LoadedRecord::Irreparable {
                reason: "path hint cannot be recovered".to_string(),
            },
        }))
    }

    pub fn list(&self) -> Result<RecordListing, RegistryError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => {
                return Ok(RecordListing::default());
            }
            Err(source) => {
                return Err(RegistryError::io(
                    "failed to list workspace records",
                    source,
                ));
            }
        };

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| {
                RegistryError::io("failed to list workspace records", source)
            })?;
            let path = entry.path();
            if is_temp_file(&path)
                || path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT)
            {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if validate_id(stem).is_err() {
                warn!(path = %path.display(), "ignoring record file with invalid id");
                continue;
            }
            ids.push(stem.to_string());
        }

        let mut listing = RecordListing::default();
        for id in ids {
            match self.load(&id)? {
                Some(LoadedRecord::Valid(record)) => {
                    listing.records.push(StoredRecord {
                        record,
                        repaired: false,
                    });
                }
                Some(LoadedRecord::Repaired(record)) => {
                    listing.records.push(StoredRecord {
                        record,
                        repaired: true,
                    });
                }
                Some(LoadedRecord::Irreparable { reason }) => {
                    warn!(workspace_id = %id, reason = %reason, "corrupt workspace record flagged");
                    listing.corrupt.push(CorruptRecord { id, reason });
                }
                None => {}
            }
        }
        listing.records.sort_by(|a, b| {
            a.record
                .created
                .cmp(&b.record.created)
                .then_with(|| a.record.id.cmp(&b.record.id))
        });
        listing.corrupt.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(listing)
    }

    /// Whole-record read-modify-write; refreshes `modified`.
    pub fn update(&self, id: &str, patch: RecordPatch) -> Result<WorkspaceRecord, RegistryError> {
        let mut record = self.get(id)?;
        if let Some(name) = patch.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(RegistryError::InvalidInput(
                    "workspace name is empty".to_string(),
                ));
            }
            record.name = name.to_string();
        }
        if let Some(description) = patch.description {
            let description = description.trim();
            record.description = (!description.is_empty()).then(|| description.to_string());
        }
        if let Some(settings) = patch.settings {
            record.settings = settings;
        }
        record.modified = Utc::now();
        self.put(&record)?;
        Ok(record)
    }

    /// Mark a successful open.
    pub fn touch(&self, record: &mut WorkspaceRecord) -> Result<(), RegistryError> {
        let now = Utc::now();
        record.modified = now;
        record.last_accessed = now;
        self.put(record)
    }

    pub fn put(&self, record: &WorkspaceRecord) -> Result<(), RegistryError> {
        validate_id(&record.id)?;
        let encoded = serde_json::to_vec_pretty(record)?;
        write_private_atomic(&self.record_path(&record.id), &encoded).map_err(|source| {
            RegistryError::io(
                format!("failed to write workspace record `{}`", record.id),
                source,
            )
        })
    }

    /// Remove a record. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool, RegistryError> {
        validate_id(id)?;
        match fs::remove_file(self.record_path(id)) {
            Ok(()) => Ok(true),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(source) => Err(RegistryError::io(
                format!("failed to delete workspace record `{id}`"),
                source,
            )),
        }
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.{RECORD_EXT}"))
    }
}

/// Ids double as file names: ASCII alphanumerics, `-` and `_` only.
pub fn validate_id(id: &str) -> Result<(), RegistryError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(is_id_char);
    if valid {
        Ok(())
    } else {
        Err(RegistryError::InvalidInput(format!(
            "`{id}` is not a valid workspace id"
        )))
    }
}

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn base_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}

/// Best-effort reconstruction. The id comes from the file name; the path
/// hint must be present for the record to be worth keeping.
fn repair_record(id: &str, value: &Value) -> Option<WorkspaceRecord> {
    let object = value.as_object()?;
    let text = |key: &str| {
        object
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };
    let timestamp = |key: &str| {
        text(key)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|t| t.with_timezone(&Utc))
    };

    let path = text("path")?.to_string();
    let now = Utc::now();
    let project_type = text("type")
        .map(ProjectType::parse_lenient)
        .unwrap_or_default();
    let created = timestamp("created").unwrap_or(now);
    let modified = timestamp("modified").unwrap_or(created);

    let project_files = object
        .get("projectFiles")
        .and_then(Value::as_array)
        .map(|files| {
            files
                .iter()
                .filter_map(Value::as_str)
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let git = object
        .get("git")
        .and_then(|git| serde_json::from_value(git.clone()).ok());

    Some(WorkspaceRecord {
        id: id.to_string(),
        name: text("name")
            .map(ToOwned::to_owned)
            .unwrap_or_else(|| base_name(&path)),
        description: text("description").map(ToOwned::to_owned),
        created,
        modified,
        last_accessed: timestamp("lastAccessed").unwrap_or(modified),
        project_type,
        project_files,
        git,
        settings: repair_settings(project_type, object.get("settings")),
        path,
    })
}

/// Overlay whatever settings fields are usable onto the type defaults.
fn repair_settings(project_type: ProjectType, stored: Option<&Value>) -> WorkspaceSettings {
    let defaults = WorkspaceSettings::defaults_for(project_type);
    let Some(Value::Object(stored)) = stored else {
        return defaults;
    };
    let Ok(Value::Object(mut merged)) = serde_json::to_value(&defaults) else {
        return defaults;
    };

    for (key, value) in stored {
        if !merged.contains_key(key) {
            continue;
        }
        let previous = merged.insert(key.clone(), value.clone());
        let candidate = Value::Object(merged.clone());
        let parsed: Result<WorkspaceSettings, _> = serde_json::from_value(candidate);
        if parsed.is_err() {
            if let Some(previous) = previous {
                merged.insert(key.clone(), previous);
            }
        }
    }
    serde_json::from_value(Value::Object(merged)).unwrap_or(defaults)
}
