//! Transaction manifest — the durable description of one in-flight rename.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use relink_core::ContentDigest;

/// Lifecycle phase of a transaction.
///
/// `complete` has no serialized form: a completed transaction's record is
/// deleted. A record found on disk in either phase after an unclean
/// shutdown is orphaned and owned by boot recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxPhase {
    /// Staged writes in progress; no real file touched yet.
    Prepare,
    /// Real-file replacement in progress; resumable, not reversible.
    Commit,
}

/// The file rename at the heart of the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameOp {
    /// Vault-relative path of the source document.
    pub from: PathBuf,
    /// Vault-relative path of the destination.
    pub to: PathBuf,
    /// Digest of the source content captured at planning time.
    pub digest_before: ContentDigest,
    /// Digest of the content that will land at the destination. Equals
    /// `digest_before` unless the source's own body was rewritten.
    pub digest_after: ContentDigest,
    /// Set once the destination holds the expected content.
    pub completed: bool,
}

/// One referencing document whose content is rewritten by the transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceUpdate {
    /// Vault-relative path of the referencing document.
    pub path: PathBuf,
    /// Digest of the document captured at planning time. Checked again
    /// before commit so a concurrent edit to a referencing document is a
    /// staleness conflict, not a silent overwrite.
    pub digest_before: ContentDigest,
    /// Digest of the staged replacement content.
    pub digest_after: ContentDigest,
    /// Set once the real file holds the staged content.
    pub completed: bool,
}

/// Durable description of one in-flight rename transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionManifest {
    /// Globally unique id, assigned at creation, immutable. Staged file
    /// names embed it so crash leftovers are traceable to their record.
    pub correlation_id: Uuid,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Absolute path of the vault this transaction applies to.
    pub vault_root: PathBuf,
    /// Current lifecycle phase.
    pub phase: TxPhase,
    /// The rename itself.
    pub rename: RenameOp,
    /// Referencing documents to rewrite, in commit order.
    pub reference_updates: Vec<ReferenceUpdate>,
    /// Pid of the process that owns this transaction. Recovery skips
    /// records whose owner is still alive.
    pub owner_pid: u32,
}

impl TransactionManifest {
    /// Create a fresh manifest in the `prepare` phase.
    pub fn new(
        vault_root: PathBuf,
        rename: RenameOp,
        reference_updates: Vec<ReferenceUpdate>,
    ) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            vault_root,
            phase: TxPhase::Prepare,
            rename,
            reference_updates,
            owner_pid: std::process::id(),
        }
    }

    /// Every commit step has landed.
    pub fn all_completed(&self) -> bool {
        self.rename.completed && self.reference_updates.iter().all(|u| u.completed)
    }
}
