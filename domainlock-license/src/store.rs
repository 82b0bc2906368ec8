//! Persistent storage for the verification record.
//!
//! The record is a single JSON file. Writes go to a temporary file in the
//! same directory and are renamed over the target, so readers never observe
//! a partial record. Read-modify-write sequences hold an exclusive advisory
//! lock on a sibling `.lock` file, which serializes them across processes.

use crate::error::{LicenseError, LicenseResult};
use crate::record::LicenseRecord;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-backed store for the single license record of this deployment.
#[derive(Debug, Clone)]
pub struct VerificationStore {
    path: PathBuf,
}

/// Exclusive hold on the verification file. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("failed to release verification lock: {e}");
        }
    }
}

impl VerificationStore {
    /// Creates a store for the record at `path`. Nothing is touched on disk.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the record path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Blocks until the exclusive lock is held.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock file cannot be created or locked.
    pub fn lock(&self) -> LicenseResult<StoreLock> {
        let lock_path = self.lock_path();
        ensure_parent_dir(&lock_path)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .map_err(|e| storage_err("failed to open lock", &lock_path, e))?;
        FileExt::lock_exclusive(&file)
            .map_err(|e| storage_err("failed to lock", &lock_path, e))?;
        Ok(StoreLock { file })
    }

    /// Reads the record. A missing file is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> LicenseResult<Option<LicenseRecord>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "verification file not found");
                return Ok(None);
            }
            Err(e) => return Err(storage_err("failed to read", &self.path, e)),
        };
        let record: LicenseRecord = serde_json::from_str(&raw)?;
        Ok(Some(record))
    }

    /// Atomically replaces the record.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary file cannot be written or renamed.
    pub fn save(&self, record: &LicenseRecord) -> LicenseResult<()> {
        let data = serde_json::to_vec_pretty(record)?;
        atomic_write(&self.path, &data)
    }

    /// Deletes the record. Returns whether a file was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub fn delete(&self) -> LicenseResult<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(storage_err("failed to delete", &self.path, e)),
        }
    }
}

fn storage_err(what: &str, path: &Path, e: io::Error) -> LicenseError {
    LicenseError::Storage(format!("{what} {}: {e}", path.display()))
}

fn ensure_parent_dir(path: &Path) -> LicenseResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent)
            .map_err(|e| storage_err("failed to create directory", parent, e)),
        _ => Ok(()),
    }
}

fn atomic_write(target: &Path, data: &[u8]) -> LicenseResult<()> {
    ensure_parent_dir(target)?;
    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| storage_err("failed to create temp file in", parent, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Err(e) = fs::set_permissions(temp.path(), fs::Permissions::from_mode(0o600)) {
            warn!(path = %temp.path().display(), "failed to restrict temp file permissions: {e}");
        }
    }

    let mut file = temp.as_file();
    file.write_all(data)
        .map_err(|e| storage_err("failed to write temp file for", target, e))?;
    file.sync_all()
        .map_err(|e| storage_err("failed to sync temp file for", target, e))?;

    temp.persist(target)
        .map_err(|e| storage_err("failed to replace", target, e.error))?;
    Ok(())
}
