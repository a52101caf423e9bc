//! Error types for relink.
//!
//! Expected conditions (missing source, occupied destination, concurrent
//! edit) are explicit error kinds, never panics. Everything below the
//! transaction manager is translated into one of these before it crosses
//! the engine boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level result type for rename operations.
pub type Result<T> = std::result::Result<T, RenameError>;

/// Top-level error type for the rename engine.
#[derive(Debug, Error)]
pub enum RenameError {
    #[error("source document not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("destination already exists: {}", path.display())]
    DestinationConflict { path: PathBuf },

    #[error("document changed since planning, retry the rename: {}", path.display())]
    StalenessConflict { path: PathBuf },

    #[error("io failure: {source}")]
    Io {
        #[source]
        source: std::io::Error,
        /// True when the failure happened mid-commit: real files may
        /// already be replaced and boot recovery must finish the job.
        recovery_needed: bool,
    },

    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    #[error("wal error: {0}")]
    Wal(#[from] WalError),
}

impl RenameError {
    /// An I/O failure before commit began; full rollback already happened.
    pub fn io(source: std::io::Error) -> Self {
        Self::Io {
            source,
            recovery_needed: false,
        }
    }

    /// An I/O failure after commit began; the WAL record stays on disk
    /// for boot recovery to resume.
    pub fn io_during_commit(source: std::io::Error) -> Self {
        Self::Io {
            source,
            recovery_needed: true,
        }
    }
}

/// Errors in reference parsing and rewriting.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("reference carries both a heading and a block anchor")]
    AmbiguousAnchor,
}

/// Errors from the write-ahead log store.
#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupt wal record at {}: {reason}", path.display())]
    CorruptRecord { path: PathBuf, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_display_human_readable_messages() {
        let err = RenameError::SourceNotFound {
            path: PathBuf::from("Notes/Alpha.md"),
        };
        assert!(err.to_string().contains("Notes/Alpha.md"));

        let err = RenameError::StalenessConflict {
            path: PathBuf::from("Linking.md"),
        };
        let msg = err.to_string();
        assert!(msg.contains("Linking.md"));
        assert!(msg.contains("retry"));
    }

    #[test]
    fn io_helpers_set_recovery_flag() {
        let before = RenameError::io(std::io::Error::other("disk full"));
        match before {
            RenameError::Io {
                recovery_needed, ..
            } => assert!(!recovery_needed),
            other => panic!("expected Io, got {other:?}"),
        }

        let during = RenameError::io_during_commit(std::io::Error::other("disk full"));
        match during {
            RenameError::Io {
                recovery_needed, ..
            } => assert!(recovery_needed),
            other => panic!("expected Io, got {other:?}"),
        }
    }
}
