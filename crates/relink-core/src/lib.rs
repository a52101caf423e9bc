//! # relink-core
//!
//! Core types for the relink rename engine:
//! - [`ContentDigest`] — SHA-256 content fingerprint for staleness detection
//! - [`Reference`] — a parsed wikilink occurrence and its rewrite rule
//! - Error hierarchy ([`RenameError`], [`ReferenceError`])

pub mod digest;
pub mod error;
pub mod reference;

pub use digest::ContentDigest;
pub use error::{RenameError, ReferenceError, Result, WalError};
pub use reference::Reference;
