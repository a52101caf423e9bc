//! Boot recovery: resolve WAL records left behind by an unclean shutdown.
//!
//! Runs before any new transaction is accepted. A `prepare`-phase record
//! never touched a real file, so it is discarded outright; a
//! `commit`-phase record is resumed forward with the same idempotent
//! replace steps the engine uses. Correctness, not age, decides the
//! action — resuming a commit is always safe to repeat.

use std::path::Path;
use std::process::{Command, Stdio};

use tracing::{debug, error, info};

use relink_core::RenameError;
use relink_wal::{TxPhase, WalStore};

use crate::commit;

/// What one recovery pass did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RecoverySummary {
    /// Abandoned `prepare`-phase records cleaned up.
    pub discarded: usize,
    /// `commit`-phase records resumed to completion.
    pub resumed: usize,
    /// Records owned by a still-live process, left alone.
    pub skipped: usize,
    /// Records that could not be resolved and were left in place.
    pub failed: usize,
}

/// Scan the WAL directory and resolve every orphaned transaction.
///
/// Records that cannot be resolved (a staged file the manifest needs is
/// gone and the destination is not in the expected state) are logged and
/// left on disk for a future attempt — never silently dropped.
///
/// # Errors
///
/// Returns [`RenameError::Wal`] only if the WAL directory itself cannot
/// be scanned.
pub fn recover(vault_root: &Path, wal: &WalStore) -> Result<RecoverySummary, RenameError> {
    let mut summary = RecoverySummary::default();

    for (record_path, mut manifest) in wal.scan_pending()? {
        let id = manifest.correlation_id;
        if manifest.owner_pid != std::process::id() && process_alive(manifest.owner_pid) {
            debug!(%id, pid = manifest.owner_pid, "skipping record owned by live process");
            summary.skipped += 1;
            continue;
        }

        match manifest.phase {
            TxPhase::Prepare => {
                // No real document was ever touched; pure cleanup.
                let mut ok = true;
                for staged in commit::staged_paths(vault_root, &manifest) {
                    if let Err(e) = commit::remove_if_exists(&staged) {
                        error!(%id, path = %staged.display(), %e, "failed to remove staged file");
                        ok = false;
                    }
                }
                if !ok {
                    summary.failed += 1;
                    continue;
                }
                match wal.delete(&record_path) {
                    Ok(()) => {
                        info!(%id, "discarded abandoned prepare-phase transaction");
                        summary.discarded += 1;
                    }
                    Err(e) => {
                        error!(%id, %e, "failed to delete wal record");
                        summary.failed += 1;
                    }
                }
            }
            TxPhase::Commit => match commit::run(vault_root, &mut manifest, wal) {
                Ok(()) => match wal.delete(&record_path) {
                    Ok(()) => {
                        info!(%id, "resumed commit-phase transaction to completion");
                        summary.resumed += 1;
                    }
                    Err(e) => {
                        error!(%id, %e, "failed to delete wal record");
                        summary.failed += 1;
                    }
                },
                Err(e) => {
                    // Left in place for a future attempt.
                    error!(%id, %e, "could not resume commit-phase transaction");
                    summary.failed += 1;
                }
            },
        }
    }

    Ok(summary)
}

/// Check whether a pid denotes a live process, without sending a signal.
fn process_alive(pid: u32) -> bool {
    Command::new("kill")
        .args(["-0", &pid.to_string()])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}
