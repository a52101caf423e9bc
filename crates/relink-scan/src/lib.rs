//! # relink-scan
//!
//! Vault walker and reference scanner.
//!
//! Finds every occurrence of a reference to a given document across the
//! vault. The matching strategy is a single compiled regex kept behind
//! this crate's interface so it can be swapped for a hand-written parser
//! without touching the transaction manager. Scanning is read-only.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use relink_core::{Reference, RenameError};

/// The reference grammar: optional embed sigil, double-bracket delimiters,
/// target, optional `#anchor`, optional `|alias`.
const REFERENCE_PATTERN: &str = r"(!?)\[\[([^\[\]#|]+)(#[^\[\]|]+)?(\|[^\[\]]*)?\]\]";

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(REFERENCE_PATTERN).expect("reference pattern is valid"))
}

/// Parse every reference occurrence in a document's content, frontmatter
/// included. Returns occurrences in document order.
pub fn parse_references(content: &str) -> Vec<Reference> {
    reference_regex()
        .captures_iter(content)
        .map(|caps| {
            let whole = caps.get(0).expect("capture 0 always present");
            let anchor = caps.get(3).map(|m| &m.as_str()[1..]);
            let (heading, block_id) = match anchor {
                Some(a) => match a.strip_prefix('^') {
                    Some(block) => (None, Some(block.to_string())),
                    None => (Some(a.to_string()), None),
                },
                None => (None, None),
            };
            Reference {
                embed: !caps[1].is_empty(),
                target: caps[2].to_string(),
                heading,
                block_id,
                alias: caps.get(4).map(|m| m.as_str()[1..].to_string()),
                span: whole.start()..whole.end(),
            }
        })
        .collect()
}

/// A document containing at least one reference to the scan target.
#[derive(Debug)]
pub struct ScannedDocument {
    /// Absolute path of the document.
    pub path: PathBuf,
    /// The exact content the reference spans index into. Callers must
    /// digest and rewrite this string, not a re-read of the file — a
    /// concurrent edit between two reads would desynchronize the spans.
    pub content: String,
    /// Matching references, in document order.
    pub references: Vec<Reference>,
}

/// Find every reference to `target_name` across the vault.
///
/// `target_name` is a vault-relative document path or bare name; matching
/// is case-insensitive and extension-agnostic, and a reference written as
/// a bare name (`[[Alpha]]`) matches a document at any depth
/// (`Notes/Alpha.md`). Returns one entry per document that contains at
/// least one match, sorted by path; an empty list when nothing matches.
///
/// # Errors
///
/// Returns [`RenameError::Io`] if the vault cannot be walked or a
/// document cannot be read. Files that are not valid UTF-8 are skipped
/// with a warning — they cannot contain a textual reference.
pub fn find_references(
    vault_root: &Path,
    target_name: &str,
) -> Result<Vec<ScannedDocument>, RenameError> {
    let path_key = Reference::key(target_name);
    let stem_key = match path_key.rsplit_once('/') {
        Some((_, stem)) => stem.to_string(),
        None => path_key.clone(),
    };

    let mut results = Vec::new();
    for doc in walk_documents(vault_root)? {
        let bytes = fs::read(&doc).map_err(RenameError::io)?;
        let content = match String::from_utf8(bytes) {
            Ok(c) => c,
            Err(_) => {
                warn!(path = %doc.display(), "skipping non-utf8 file during scan");
                continue;
            }
        };

        let matches: Vec<Reference> = parse_references(&content)
            .into_iter()
            .filter(|r| {
                let key = r.target_key();
                key == path_key || key == stem_key
            })
            .collect();
        if !matches.is_empty() {
            results.push(ScannedDocument {
                path: doc,
                content,
                references: matches,
            });
        }
    }
    results.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(results)
}

/// Collect every markdown document under the vault root, skipping hidden
/// files and directories (which covers the WAL directory and staged files).
pub fn walk_documents(vault_root: &Path) -> Result<Vec<PathBuf>, RenameError> {
    let mut docs = Vec::new();
    walk_into(vault_root, &mut docs)?;
    docs.sort();
    Ok(docs)
}

fn walk_into(dir: &Path, docs: &mut Vec<PathBuf>) -> Result<(), RenameError> {
    for entry in fs::read_dir(dir).map_err(RenameError::io)? {
        let entry = entry.map_err(RenameError::io)?;
        let path = entry.path();
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('.'));
        if hidden {
            continue;
        }
        let file_type = entry.file_type().map_err(RenameError::io)?;
        if file_type.is_dir() {
            walk_into(&path, docs)?;
        } else if path.extension().and_then(|e| e.to_str()) == Some("md") {
            docs.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;

    #[test]
    fn parses_plain_link() {
        let refs = parse_references("see [[Alpha]] for details");
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].target, "Alpha");
        assert!(!refs[0].embed);
        assert_eq!(refs[0].heading, None);
        assert_eq!(refs[0].block_id, None);
        assert_eq!(refs[0].alias, None);
        assert_eq!(&"see [[Alpha]] for details"[refs[0].span.clone()], "[[Alpha]]");
    }

    #[test]
    fn parses_all_components() {
        let refs = parse_references("![[Alpha#Usage|the docs]]");
        assert_eq!(refs.len(), 1);
        assert!(refs[0].embed);
        assert_eq!(refs[0].target, "Alpha");
        assert_eq!(refs[0].heading.as_deref(), Some("Usage"));
        assert_eq!(refs[0].alias.as_deref(), Some("the docs"));
    }

    #[test]
    fn parses_block_anchor() {
        let refs = parse_references("[[Alpha#^block42]]");
        assert_eq!(refs[0].block_id.as_deref(), Some("block42"));
        assert_eq!(refs[0].heading, None);
    }

    #[test]
    fn parses_multiple_occurrences_in_order() {
        let refs = parse_references("[[Alpha]] then [[Beta|b]] then [[Alpha#H]]");
        let targets: Vec<&str> = refs.iter().map(|r| r.target.as_str()).collect();
        assert_eq!(targets, vec!["Alpha", "Beta", "Alpha"]);
    }

    #[test]
    fn ignores_malformed_brackets() {
        assert!(parse_references("[not a link] [[]] [[|alias]]").is_empty());
        assert!(parse_references("[[unclosed").is_empty());
    }

    #[test]
    fn find_references_matches_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Linking.md"), "see [[alpha]] and [[ALPHA|a]]").unwrap();
        fs::write(dir.path().join("Other.md"), "no links here").unwrap();

        let found = find_references(dir.path(), "Alpha.md").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].references.len(), 2);
    }

    #[test]
    fn find_references_matches_bare_name_for_nested_target() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("Notes")).unwrap();
        fs::write(dir.path().join("Linking.md"), "[[Alpha]] and [[Notes/Alpha]]").unwrap();

        let found = find_references(dir.path(), "Notes/Alpha.md").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].references.len(), 2);
    }

    #[test]
    fn scanned_document_carries_the_content_its_spans_index_into() {
        let dir = tempfile::tempdir().unwrap();
        let text = "intro text here [[Alpha]] trailing ![[Alpha#^b|a]]";
        fs::write(dir.path().join("Linking.md"), text).unwrap();

        let found = find_references(dir.path(), "Alpha").unwrap();
        let doc = &found[0];
        assert_eq!(doc.content, text);
        for r in &doc.references {
            let slice = &doc.content[r.span.clone()];
            assert!(slice.ends_with("]]"), "span does not cover a link: {slice}");
            assert!(slice.contains("[[Alpha"));
        }
    }

    #[test]
    fn find_references_does_not_match_other_documents() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Linking.md"), "[[Alphabet]] [[Alpha Two]]").unwrap();

        let found = find_references(dir.path(), "Alpha.md").unwrap();
        assert!(found.is_empty());
    }

    #[test]
    fn find_references_scans_frontmatter() {
        let dir = tempfile::tempdir().unwrap();
        let content = "---\nrelated: \"[[Alpha]]\"\n---\n\nbody\n";
        fs::write(dir.path().join("Meta.md"), content).unwrap();

        let found = find_references(dir.path(), "Alpha").unwrap();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn walk_skips_hidden_directories_and_non_markdown() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".relink/wal")).unwrap();
        fs::write(dir.path().join(".relink/wal/tx.json"), "{}").unwrap();
        fs::write(dir.path().join(".relink-stage-x-a.md"), "[[Alpha]]").unwrap();
        fs::write(dir.path().join("notes.txt"), "[[Alpha]]").unwrap();
        fs::write(dir.path().join("Real.md"), "[[Alpha]]").unwrap();

        let docs = walk_documents(dir.path()).unwrap();
        assert_eq!(docs, vec![dir.path().join("Real.md")]);
    }

    #[test]
    fn find_references_skips_non_utf8_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("binary.md"), [0xff, 0xfe, 0x00]).unwrap();
        fs::write(dir.path().join("Real.md"), "[[Alpha]]").unwrap();

        let found = find_references(dir.path(), "Alpha").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].path, dir.path().join("Real.md"));
    }

    proptest! {
        // Round-trip: parsing a rewritten reference and rewriting it again
        // reproduces the same text.
        #[test]
        fn rewrite_parse_rewrite_is_idempotent(
            embed in any::<bool>(),
            target in "[A-Za-z][A-Za-z0-9 ]{0,10}",
            anchor in proptest::option::of(("[A-Za-z][A-Za-z0-9]{0,6}", any::<bool>())),
            alias in proptest::option::of("[A-Za-z][A-Za-z0-9 ]{0,6}"),
        ) {
            let (heading, block_id) = match anchor {
                Some((a, true)) => (None, Some(a)),
                Some((a, false)) => (Some(a), None),
                None => (None, None),
            };
            let original = Reference {
                embed,
                target,
                heading,
                block_id,
                alias,
                span: 0..0,
            };

            let first = original.rewrite("Target Doc").unwrap();
            let parsed = parse_references(&first);
            prop_assert_eq!(parsed.len(), 1);
            let second = parsed[0].rewrite("Target Doc").unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
