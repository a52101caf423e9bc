//! Commit primitives: staged-file naming, durable staged writes, and the
//! idempotent replace steps that recovery can safely re-run.
//!
//! Once commit begins the transaction is resumable, not reversible: each
//! step either atomically renames its staged file into place or, on
//! resume, verifies the destination already holds the expected bytes.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use uuid::Uuid;

use relink_core::{ContentDigest, RenameError};
use relink_wal::{TransactionManifest, WalStore};

/// Reserved prefix for staged files. Any file carrying it is traceable to
/// its owning WAL record via the embedded correlation id.
pub const STAGE_PREFIX: &str = ".relink-stage-";

/// Staged-file path for a real document, unique per transaction so
/// concurrent transactions against the same document never collide.
pub fn staged_path(real: &Path, correlation_id: Uuid) -> PathBuf {
    let name = real
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    real.with_file_name(format!("{STAGE_PREFIX}{correlation_id}-{name}"))
}

/// Write staged content durably; commit resume depends on these bytes
/// surviving a crash.
pub fn write_staged(path: &Path, content: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    file.sync_all()
}

/// Remove a file, treating absence as success.
pub fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Run (or resume) the commit phase: every incomplete reference update,
/// then the rename itself, persisting progress after each step so a crash
/// leaves an accurate record.
///
/// # Errors
///
/// Any failure is returned with `recovery_needed` set — real files may
/// already be replaced, and the WAL record must stay for boot recovery.
pub fn run(
    vault_root: &Path,
    manifest: &mut TransactionManifest,
    wal: &WalStore,
) -> Result<(), RenameError> {
    let id = manifest.correlation_id;

    for i in 0..manifest.reference_updates.len() {
        if manifest.reference_updates[i].completed {
            continue;
        }
        let update = manifest.reference_updates[i].clone();
        let real = vault_root.join(&update.path);
        apply_replace(&real, id, update.digest_after).map_err(RenameError::io_during_commit)?;
        debug!(path = %update.path.display(), "reference update committed");
        manifest.reference_updates[i].completed = true;
        wal.write(manifest)
            .map_err(|e| RenameError::io_during_commit(io::Error::other(e)))?;
    }

    if !manifest.rename.completed {
        apply_rename(vault_root, manifest, id).map_err(RenameError::io_during_commit)?;
        debug!(
            from = %manifest.rename.from.display(),
            to = %manifest.rename.to.display(),
            "rename committed"
        );
        manifest.rename.completed = true;
        wal.write(manifest)
            .map_err(|e| RenameError::io_during_commit(io::Error::other(e)))?;
    }

    Ok(())
}

/// Replace one referencing document with its staged content.
///
/// Idempotent: if the staged file is gone, the step counts as done only
/// when the destination already holds the staged bytes.
fn apply_replace(real: &Path, id: Uuid, digest_after: ContentDigest) -> io::Result<()> {
    let staged = staged_path(real, id);
    if staged.exists() {
        return fs::rename(&staged, real);
    }
    match fs::read(real) {
        Ok(bytes) if digest_after.matches(&bytes) => Ok(()),
        _ => Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!(
                "staged file missing and destination not in expected state: {}",
                real.display()
            ),
        )),
    }
}

/// Apply the rename step: the destination ends up holding the expected
/// content and the source is gone. Handles both first-run and resume.
fn apply_rename(vault_root: &Path, manifest: &TransactionManifest, id: Uuid) -> io::Result<()> {
    let op = &manifest.rename;
    let from = vault_root.join(&op.from);
    let to = vault_root.join(&op.to);

    // Self-referencing source: staged rewritten content lands at the
    // destination, then the original is removed.
    let staged = staged_path(&to, id);
    if staged.exists() {
        fs::rename(&staged, &to)?;
        return remove_if_exists(&from);
    }

    // Already applied (resume after a crash between the two mutations).
    if let Ok(bytes) = fs::read(&to) {
        if op.digest_after.matches(&bytes) {
            return remove_if_exists(&from);
        }
    }

    // Plain rename; atomically replaces an overwrite destination.
    if from.exists() {
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)?;
        }
        return fs::rename(&from, &to);
    }

    Err(io::Error::new(
        io::ErrorKind::NotFound,
        format!(
            "cannot resume rename: no staged content and neither {} nor {} is in expected state",
            from.display(),
            to.display()
        ),
    ))
}

/// All staged-file paths a manifest may have left behind.
pub fn staged_paths(vault_root: &Path, manifest: &TransactionManifest) -> Vec<PathBuf> {
    let id = manifest.correlation_id;
    let mut paths: Vec<PathBuf> = manifest
        .reference_updates
        .iter()
        .map(|u| staged_path(&vault_root.join(&u.path), id))
        .collect();
    paths.push(staged_path(&vault_root.join(&manifest.rename.to), id));
    paths
}
