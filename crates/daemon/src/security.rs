// Owner-only permissions and atomic writes for files the daemon persists.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use uuid::Uuid;

pub fn ensure_owner_only_file(path: &Path) -> io::Result<()> {
    set_mode_if_needed(path, 0o600)
}

pub fn ensure_owner_only_dir(path: &Path) -> io::Result<()> {
    set_mode_if_needed(path, 0o700)
}

/// Create `path` (and parents) with owner-only permissions on the leaf.
pub fn create_private_dir_all(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    ensure_owner_only_dir(path)
}

pub fn open_private_truncate(path: &Path) -> io::Result<fs::File> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;

        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
    }
    #[cfg(not(unix))]
    {
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
    }
}

/// Replace `path` with `contents` via a synced temp file and rename, so a
/// reader never observes a partially written file.
pub fn write_private_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let tmp_path = temp_path_for(path);
    let result = (|| {
        let mut file = open_private_truncate(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_data()?;
        drop(file);
        fs::rename(&tmp_path, path)?;
        ensure_owner_only_file(path)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

/// Whether a directory entry is a leftover temp file from [`write_private_atomic`].
pub fn is_temp_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(".tmp."))
}

fn temp_path_for(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{file_name}.tmp.{}", Uuid::new_v4().simple()))
}

fn set_mode_if_needed(path: &Path, wanted: u32) -> io::Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if !path.exists() {
            return Ok(());
        }

        let mode = fs::metadata(path)?.permissions().mode() & 0o777;
        if mode != wanted {
            fs::set_permissions(path, fs::Permissions::from_mode(wanted))?;
        }
    }

    #[cfg(not(unix))]
    {
        let _ = (path, wanted);
    }

    Ok(())
}
