//! # relink-wal
//!
//! Durable write-ahead log for in-flight rename transactions.
//!
//! One JSON record per transaction, written before any staged mutation
//! and deleted only after every real file has been replaced. The record
//! format is the crash-compatibility contract between engine versions —
//! field names are stable.

pub mod manifest;
pub mod store;

pub use manifest::{ReferenceUpdate, RenameOp, TransactionManifest, TxPhase};
pub use store::WalStore;
