//! # relink-engine
//!
//! The transaction manager: renames a document and rewrites every
//! reference to it as a single all-or-nothing operation, safe against
//! crashes, concurrent modification, and partial I/O failure.
//!
//! Phases: plan → stage → validate → commit. The write-ahead log record
//! goes durable before any staged mutation; real documents change only
//! during commit, one atomic rename each. Failures before commit roll
//! back fully; failures during commit leave a record that boot recovery
//! resumes forward.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::debug;

use relink_core::{ContentDigest, RenameError, Result};
use relink_wal::{TxPhase, WalStore};

pub mod commit;
pub mod plan;
pub mod recovery;

pub use recovery::RecoverySummary;

/// Directory under the vault root holding transaction records.
pub const WAL_DIR: &str = ".relink/wal";

/// A rename request, paths relative to the vault root.
#[derive(Debug, Clone)]
pub struct RenameRequest {
    pub from: PathBuf,
    pub to: PathBuf,
    /// Rewrite cross-references to the renamed document.
    pub update_links: bool,
    /// Replace an occupied destination instead of failing.
    pub overwrite: bool,
}

/// Summary of a completed rename.
#[derive(Debug)]
pub struct RenameOutcome {
    /// Vault-relative destination path.
    pub destination: PathBuf,
    /// Number of documents whose references were rewritten.
    pub references_updated: usize,
    pub elapsed: Duration,
    /// The destination was occupied and got replaced.
    pub overwrote: bool,
}

/// Per-process rename engine for one vault. Explicit context, no shared
/// globals — construct one per process (or per test) and pass it around.
pub struct RenameEngine {
    vault_root: PathBuf,
    wal: WalStore,
}

impl RenameEngine {
    /// Open an engine over an existing vault directory.
    ///
    /// # Errors
    ///
    /// Returns [`RenameError::Io`] if the vault root does not resolve, or
    /// [`RenameError::Wal`] if the WAL directory cannot be created.
    pub fn open(vault_root: impl AsRef<Path>) -> Result<Self> {
        let vault_root = vault_root
            .as_ref()
            .canonicalize()
            .map_err(RenameError::io)?;
        let wal = WalStore::open(vault_root.join(WAL_DIR))?;
        Ok(Self { vault_root, wal })
    }

    /// The vault this engine operates over.
    pub fn vault_root(&self) -> &Path {
        &self.vault_root
    }

    /// Resolve transactions left behind by an unclean shutdown. Must run
    /// before the first [`rename`](Self::rename) of a process.
    pub fn recover(&self) -> Result<RecoverySummary> {
        recovery::recover(&self.vault_root, &self.wal)
    }

    /// Rename a document and rewrite every reference to it, atomically.
    ///
    /// On failure the vault is either byte-for-byte untouched (failure
    /// before commit) or resumable by [`recover`](Self::recover) — the
    /// `recovery_needed` flag on [`RenameError::Io`] tells which.
    ///
    /// # Errors
    ///
    /// See the error taxonomy on [`RenameError`].
    pub fn rename(&self, req: &RenameRequest) -> Result<RenameOutcome> {
        let start = Instant::now();

        // Planning: no disk mutation, all content precomputed.
        let plan = plan::build(&self.vault_root, req)?;
        let id = plan.manifest.correlation_id;
        debug!(%id, from = %req.from.display(), to = %req.to.display(),
               updates = plan.manifest.reference_updates.len(), "transaction planned");

        // Staging: record intent durably, then write staged files.
        let record_path = self.wal.write(&plan.manifest)?;
        if let Err(e) = self.stage(&plan) {
            self.abort(&plan, &record_path);
            return Err(e);
        }

        // Validating: every to-be-replaced document must be byte-identical
        // to what planning saw. Sole concurrency control.
        if let Err(e) = self.validate(&plan) {
            self.abort(&plan, &record_path);
            return Err(e);
        }

        // Committing: from here on, resumable rather than reversible.
        let mut manifest = plan.manifest.clone();
        manifest.phase = TxPhase::Commit;
        if let Err(e) = self.wal.write(&manifest) {
            // The prepare-phase record is still intact; clean abort.
            self.abort(&plan, &record_path);
            return Err(e.into());
        }
        commit::run(&self.vault_root, &mut manifest, &self.wal)?;
        self.wal.delete(&record_path)?;
        debug!(%id, "transaction complete");

        Ok(RenameOutcome {
            destination: req.to.clone(),
            references_updated: manifest.reference_updates.len(),
            elapsed: start.elapsed(),
            overwrote: plan.overwrote,
        })
    }

    /// Write every staged file; no real document is touched.
    fn stage(&self, plan: &plan::TxPlan) -> Result<()> {
        let id = plan.manifest.correlation_id;
        for (update, content) in plan
            .manifest
            .reference_updates
            .iter()
            .zip(&plan.update_contents)
        {
            let real = self.vault_root.join(&update.path);
            commit::write_staged(&commit::staged_path(&real, id), content)
                .map_err(RenameError::io)?;
        }
        if let Some(content) = &plan.rename_content {
            let to = self.vault_root.join(&plan.manifest.rename.to);
            commit::write_staged(&commit::staged_path(&to, id), content)
                .map_err(RenameError::io)?;
        }
        Ok(())
    }

    /// Re-digest every planned document from current on-disk bytes.
    fn validate(&self, plan: &plan::TxPlan) -> Result<()> {
        let check = |rel: &Path, expected: ContentDigest| -> Result<()> {
            let bytes = fs::read(self.vault_root.join(rel)).map_err(RenameError::io)?;
            if expected.matches(&bytes) {
                Ok(())
            } else {
                Err(RenameError::StalenessConflict {
                    path: rel.to_path_buf(),
                })
            }
        };

        check(&plan.manifest.rename.from, plan.manifest.rename.digest_before)?;
        for update in &plan.manifest.reference_updates {
            check(&update.path, update.digest_before)?;
        }
        Ok(())
    }

    /// Clean abort before commit: staged files and the WAL record go,
    /// real documents were never touched.
    fn abort(&self, plan: &plan::TxPlan, record_path: &Path) {
        for staged in commit::staged_paths(&self.vault_root, &plan.manifest) {
            if let Err(e) = commit::remove_if_exists(&staged) {
                debug!(path = %staged.display(), %e, "staged cleanup failed");
            }
        }
        if let Err(e) = self.wal.delete(record_path) {
            debug!(path = %record_path.display(), %e, "wal cleanup failed");
        }
    }
}
