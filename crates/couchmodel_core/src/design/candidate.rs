//! Candidate design document assembly and signature.

use super::document::{DesignDocument, ViewDefinition};
use super::source::{source_path, strip_comments, IndexKind, ViewSourceReader, ViewSpec};
use super::sync::{SyncError, SyncResult};
use log::debug;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::path::PathBuf;

struct ResolvedBody {
    body: String,
    modified: i64,
}

/// Builds the candidate document for `document_id` from `roots`.
///
/// Views are visited in declared order and, per view, `map`, `reduce`,
/// `spatial`. Every body that ends up in the document is fed to one
/// running SHA-256; the latest mtime among those files becomes the
/// timestamp. Views without a `map` body are left out; a spatial body
/// stands on its own.
///
/// # Errors
/// - `Misconfigured` when `roots` is empty.
/// - `Source` when an existing file cannot be read.
pub fn build_candidate(
    reader: &dyn ViewSourceReader,
    roots: &[PathBuf],
    document_id: &str,
    views: &[ViewSpec],
) -> SyncResult<DesignDocument> {
    if roots.is_empty() {
        return Err(SyncError::Misconfigured(
            "no design document search roots configured".to_string(),
        ));
    }

    let mut doc = DesignDocument::new(document_id);
    let mut hasher = Sha256::new();
    let mut timestamp = 0_i64;
    let mut seen = HashSet::new();

    let mut contribute = |resolved: ResolvedBody| -> String {
        hasher.update(resolved.body.as_bytes());
        timestamp = timestamp.max(resolved.modified);
        resolved.body
    };

    for view in views {
        if !seen.insert(view.name.as_str()) {
            continue;
        }

        let mut bodies = [None, None, None];
        for (slot, kind) in view.kinds().iter().enumerate() {
            bodies[slot] = resolve(reader, roots, document_id, &view.name, *kind)?;
        }
        let [map, reduce, spatial] = bodies;

        match map {
            Some(map) => {
                let definition = ViewDefinition {
                    map: Some(contribute(map)),
                    reduce: reduce.map(&mut contribute),
                };
                doc.views.insert(view.name.clone(), definition);
            }
            None if reduce.is_some() => {
                debug!(
                    "event=design_resolve module=design status=skipped doc={} view={} reason=reduce_without_map",
                    document_id, view.name
                );
            }
            None => {}
        }

        if let Some(spatial) = spatial {
            let body = contribute(spatial);
            doc.spatial.insert(view.name.clone(), body);
        }
    }

    doc.signature = hex::encode(hasher.finalize());
    doc.timestamp = timestamp;
    Ok(doc)
}

fn resolve(
    reader: &dyn ViewSourceReader,
    roots: &[PathBuf],
    document_id: &str,
    view: &str,
    kind: IndexKind,
) -> SyncResult<Option<ResolvedBody>> {
    for root in roots {
        let path = source_path(root, document_id, view, kind);
        let file = reader
            .read(&path)
            .map_err(|source| SyncError::Source {
                path: path.clone(),
                source,
            })?;
        let Some(file) = file else {
            continue;
        };

        let body = strip_comments(&file.contents);
        if body.is_empty() {
            debug!(
                "event=design_resolve module=design status=skipped doc={} view={} kind={} reason=empty_body",
                document_id, view, kind
            );
            continue;
        }
        return Ok(Some(ResolvedBody {
            body,
            modified: file.modified,
        }));
    }
    Ok(None)
}
