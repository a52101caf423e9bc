//! Durable persistence of transaction manifests.
//!
//! One file per transaction, named by correlation id. Writes go through a
//! temp file, `sync_all`, then an atomic rename, so a record is either
//! fully present or absent — never torn. The store takes no locks;
//! ordering guarantees come from the engine's call sequence.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::warn;

use relink_core::WalError;

use crate::manifest::TransactionManifest;

/// Write-ahead log store rooted at a dedicated directory.
pub struct WalStore {
    dir: PathBuf,
}

impl WalStore {
    /// Open the store, creating the WAL directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the directory cannot be created — an
    /// unwritable WAL directory makes every transaction unsafe, so this
    /// is a hard startup error.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, WalError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// The WAL directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a manifest, durable before returning.
    ///
    /// Re-writing the same correlation id atomically replaces the record,
    /// which is how commit progress updates reach disk.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] if the record cannot be made durable.
    pub fn write(&self, manifest: &TransactionManifest) -> Result<PathBuf, WalError> {
        let path = self.record_path(manifest);
        let tmp = self.dir.join(format!(".{}.tmp", manifest.correlation_id));

        let json = serde_json::to_vec_pretty(manifest)?;
        let mut file = File::create(&tmp)?;
        file.write_all(&json)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, &path)?;
        // The rename itself must survive power loss, not just the bytes
        File::open(&self.dir)?.sync_all()?;

        Ok(path)
    }

    /// List and parse every record currently on disk.
    ///
    /// A record that fails to parse is logged and skipped — a corrupt
    /// record must not block recovery of the others.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] only if the directory itself cannot be
    /// listed.
    pub fn scan_pending(&self) -> Result<Vec<(PathBuf, TransactionManifest)>, WalError> {
        let mut pending = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_record(&path) {
                Ok(manifest) => pending.push((path, manifest)),
                Err(err) => {
                    warn!(path = %path.display(), %err, "skipping corrupt wal record");
                }
            }
        }
        pending.sort_by(|a, b| a.1.timestamp.cmp(&b.1.timestamp));
        Ok(pending)
    }

    /// Remove a record. Idempotent — deleting an already-absent record
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`WalError::Io`] for any failure other than the record
    /// being absent.
    pub fn delete(&self, path: &Path) -> Result<(), WalError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the record for a given manifest.
    pub fn record_path(&self, manifest: &TransactionManifest) -> PathBuf {
        self.dir.join(format!("{}.json", manifest.correlation_id))
    }
}

fn read_record(path: &Path) -> Result<TransactionManifest, WalError> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| WalError::CorruptRecord {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
