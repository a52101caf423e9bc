//! Reference type — a parsed wikilink occurrence and its rewrite rule.
//!
//! A reference is an in-text pointer from one document to another:
//! ```text
//! [[Target]]
//! [[Target#Heading]]
//! [[Target#^block-id|shown text]]
//! ![[Target]]              (embed)
//! ```
//! Target matching is case-insensitive and extension-agnostic; a heading
//! anchor and a block anchor are mutually exclusive by construction in
//! the grammar, and the rewriter rejects a reference carrying both.

use std::ops::Range;
use std::path::Path;

use crate::error::ReferenceError;

/// One occurrence of a reference inside a document's content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// The occurrence is an embed (`![[...]]`) rather than a plain link.
    pub embed: bool,
    /// Link target as written, without anchor or alias.
    pub target: String,
    /// Heading anchor (`#Heading`), without the `#`.
    pub heading: Option<String>,
    /// Block anchor (`#^id`), without the `#^` sigil.
    pub block_id: Option<String>,
    /// Display text override (`|alias`), without the `|`.
    pub alias: Option<String>,
    /// Byte range of the whole occurrence in the source document.
    pub span: Range<usize>,
}

impl Reference {
    /// Case-folded, extension-stripped match key for a target name or a
    /// vault-relative document path. `"Notes/Alpha.md"` and `"notes/alpha"`
    /// produce the same key.
    pub fn key(name: &str) -> String {
        let normalized = name.replace('\\', "/");
        let lower = normalized.to_lowercase();
        match lower.rsplit_once('/') {
            Some((dir, last)) => format!("{dir}/{}", strip_extension(last)),
            None => strip_extension(&lower).to_string(),
        }
    }

    /// Match key of this reference's target.
    pub fn target_key(&self) -> String {
        Self::key(&self.target)
    }

    /// Reconstruct the reference text with a new target name.
    ///
    /// Component order is a strict invariant: embed sigil outermost, then
    /// the opening delimiter, target, anchor (block id preferred over
    /// heading), alias, closing delimiter. Everything except the target is
    /// reproduced byte-identically.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::AmbiguousAnchor`] if both a heading and a
    /// block anchor are set.
    pub fn rewrite(&self, new_target: &str) -> Result<String, ReferenceError> {
        if self.heading.is_some() && self.block_id.is_some() {
            return Err(ReferenceError::AmbiguousAnchor);
        }

        let mut out = String::with_capacity(new_target.len() + 8);
        if self.embed {
            out.push('!');
        }
        out.push_str("[[");
        out.push_str(new_target);
        if let Some(block) = &self.block_id {
            out.push_str("#^");
            out.push_str(block);
        } else if let Some(heading) = &self.heading {
            out.push('#');
            out.push_str(heading);
        }
        if let Some(alias) = &self.alias {
            out.push('|');
            out.push_str(alias);
        }
        out.push_str("]]");
        Ok(out)
    }
}

fn strip_extension(segment: &str) -> &str {
    Path::new(segment)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(segment)
}
