//! Planning phase: resolve the source, enumerate affected documents, and
//! precompute every rewritten content before anything touches disk.

use std::fs;
use std::path::Path;

use relink_core::{ContentDigest, Reference, RenameError};
use relink_wal::{ReferenceUpdate, RenameOp, TransactionManifest};

use crate::RenameRequest;

/// The fully-computed plan for one rename transaction.
#[derive(Debug)]
pub struct TxPlan {
    pub manifest: TransactionManifest,
    /// Rewritten content per referencing document, parallel to
    /// `manifest.reference_updates`.
    pub update_contents: Vec<String>,
    /// Rewritten source content, when the source references its own old
    /// name. `None` means the commit is a plain file rename.
    pub rename_content: Option<String>,
    /// The destination was occupied and will be replaced.
    pub overwrote: bool,
}

/// Build the transaction plan.
///
/// # Errors
///
/// - [`RenameError::SourceNotFound`] if the source document is absent.
/// - [`RenameError::DestinationConflict`] if the destination is occupied
///   and overwrite was not requested.
/// - [`RenameError::Io`] (no recovery needed) for read failures.
pub fn build(vault_root: &Path, req: &RenameRequest) -> Result<TxPlan, RenameError> {
    let from_abs = vault_root.join(&req.from);
    let to_abs = vault_root.join(&req.to);

    // A no-op rename would let the idempotent commit primitive mistake
    // the source for an already-replaced destination.
    if req.from == req.to {
        return Err(RenameError::DestinationConflict {
            path: req.to.clone(),
        });
    }
    if !from_abs.is_file() {
        return Err(RenameError::SourceNotFound {
            path: req.from.clone(),
        });
    }
    let overwrote = to_abs.exists();
    if overwrote && !req.overwrite {
        return Err(RenameError::DestinationConflict {
            path: req.to.clone(),
        });
    }

    let source_bytes = fs::read(&from_abs).map_err(RenameError::io)?;
    let mut digest_before = ContentDigest::of(&source_bytes);

    let mut update_contents = Vec::new();
    let mut reference_updates = Vec::new();
    let mut rename_content = None;

    if req.update_links {
        let target_name = req.from.to_string_lossy().replace('\\', "/");
        for scanned in relink_scan::find_references(vault_root, &target_name)? {
            let doc_rel = scanned
                .path
                .strip_prefix(vault_root)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| scanned.path.clone());
            if doc_rel == req.to {
                // The document being overwritten disappears at commit;
                // rewriting it would be wasted work.
                continue;
            }

            // Digest and rewrite both derive from the scanner's single
            // read; the spans index into exactly these bytes.
            let new = apply_rewrites(&scanned.content, &scanned.references, &req.to)?;
            if doc_rel == req.from {
                digest_before = ContentDigest::of(scanned.content.as_bytes());
                rename_content = Some(new);
                continue;
            }
            reference_updates.push(ReferenceUpdate {
                path: doc_rel,
                digest_before: ContentDigest::of(scanned.content.as_bytes()),
                digest_after: ContentDigest::of(new.as_bytes()),
                completed: false,
            });
            update_contents.push(new);
        }
    }

    let digest_after = match &rename_content {
        Some(content) => ContentDigest::of(content.as_bytes()),
        None => digest_before,
    };

    let manifest = TransactionManifest::new(
        vault_root.to_path_buf(),
        RenameOp {
            from: req.from.clone(),
            to: req.to.clone(),
            digest_before,
            digest_after,
            completed: false,
        },
        reference_updates,
    );

    Ok(TxPlan {
        manifest,
        update_contents,
        rename_content,
        overwrote,
    })
}

/// Splice rewritten reference text into a document's content. Spans come
/// from the scanner in document order, so a single left-to-right pass
/// reproduces every byte outside the matches unchanged.
fn apply_rewrites(
    content: &str,
    refs: &[Reference],
    destination: &Path,
) -> Result<String, RenameError> {
    let mut out = String::with_capacity(content.len());
    let mut last = 0;
    for r in refs {
        out.push_str(&content[last..r.span.start]);
        out.push_str(&r.rewrite(&new_target_text(r, destination))?);
        last = r.span.end;
    }
    out.push_str(&content[last..]);
    Ok(out)
}

/// New link-target text for a rewritten reference, preserving the style
/// the author used: a bare name stays a bare name, a path stays a path.
fn new_target_text(old: &Reference, destination: &Path) -> String {
    let no_ext = destination.with_extension("");
    if old.target.contains('/') {
        no_ext.to_string_lossy().replace('\\', "/")
    } else {
        no_ext
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| no_ext.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relink_scan::parse_references;
    use std::path::PathBuf;

    fn req(from: &str, to: &str) -> RenameRequest {
        RenameRequest {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
            update_links: true,
            overwrite: false,
        }
    }

    #[test]
    fn missing_source_is_source_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = build(dir.path(), &req("Alpha.md", "Beta.md")).unwrap_err();
        assert!(matches!(err, RenameError::SourceNotFound { .. }));
    }

    #[test]
    fn rename_onto_itself_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Alpha.md"), "a").unwrap();

        let mut r = req("Alpha.md", "Alpha.md");
        r.overwrite = true;
        let err = build(dir.path(), &r).unwrap_err();
        assert!(matches!(err, RenameError::DestinationConflict { .. }));
    }

    #[test]
    fn occupied_destination_without_overwrite_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Alpha.md"), "a").unwrap();
        fs::write(dir.path().join("Beta.md"), "b").unwrap();

        let err = build(dir.path(), &req("Alpha.md", "Beta.md")).unwrap_err();
        assert!(matches!(err, RenameError::DestinationConflict { .. }));
    }

    #[test]
    fn occupied_destination_with_overwrite_plans_replace() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Alpha.md"), "a").unwrap();
        fs::write(dir.path().join("Beta.md"), "b").unwrap();

        let mut r = req("Alpha.md", "Beta.md");
        r.overwrite = true;
        let plan = build(dir.path(), &r).unwrap();
        assert!(plan.overwrote);
    }

    #[test]
    fn plan_captures_per_document_digests() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Alpha.md"), "alpha body").unwrap();
        fs::write(dir.path().join("Linking.md"), "see [[Alpha]]").unwrap();

        let plan = build(dir.path(), &req("Alpha.md", "Beta.md")).unwrap();
        assert_eq!(plan.manifest.reference_updates.len(), 1);
        let update = &plan.manifest.reference_updates[0];
        assert!(update.digest_before.matches(b"see [[Alpha]]"));
        assert!(update.digest_after.matches(b"see [[Beta]]"));
        assert_eq!(plan.update_contents[0], "see [[Beta]]");
        assert!(plan.manifest.rename.digest_before.matches(b"alpha body"));
    }

    #[test]
    fn self_reference_moves_into_rename_content() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Alpha.md"), "see [[Alpha#History]]").unwrap();

        let plan = build(dir.path(), &req("Alpha.md", "Beta.md")).unwrap();
        assert!(plan.manifest.reference_updates.is_empty());
        assert_eq!(plan.rename_content.as_deref(), Some("see [[Beta#History]]"));
        assert!(plan
            .manifest
            .rename
            .digest_after
            .matches(b"see [[Beta#History]]"));
    }

    #[test]
    fn update_links_false_plans_plain_rename() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("Alpha.md"), "a").unwrap();
        fs::write(dir.path().join("Linking.md"), "[[Alpha]]").unwrap();

        let mut r = req("Alpha.md", "Beta.md");
        r.update_links = false;
        let plan = build(dir.path(), &r).unwrap();
        assert!(plan.manifest.reference_updates.is_empty());
        assert!(plan.rename_content.is_none());
    }

    #[test]
    fn rewrite_preserves_path_style_of_original_reference() {
        let content = "[[Notes/Alpha]] and [[Alpha|a]]";
        let refs = parse_references(content);
        let out = apply_rewrites(content, &refs, Path::new("Notes/Beta.md")).unwrap();
        assert_eq!(out, "[[Notes/Beta]] and [[Beta|a]]");
    }
}
