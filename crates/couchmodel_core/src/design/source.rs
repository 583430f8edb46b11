//! View source files on disk.
//!
//! Layout under every search root:
//!
//! ```text
//! <root>/<document-id>/<view-name>/map.js
//! <root>/<document-id>/<view-name>/reduce.js
//! <root>/<document-id>/<view-name>/spatial.js
//! ```

use super::sync::{SyncError, SyncResult};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

/// Index body kind, in resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Map,
    Reduce,
    Spatial,
}

impl IndexKind {
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Map => "map.js",
            Self::Reduce => "reduce.js",
            Self::Spatial => "spatial.js",
        }
    }
}

impl Display for IndexKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Map => "map",
            Self::Reduce => "reduce",
            Self::Spatial => "spatial",
        })
    }
}

/// A declared view, optionally carrying a spatial index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSpec {
    pub name: String,
    pub spatial: bool,
}

impl ViewSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spatial: false,
        }
    }

    pub fn spatial(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            spatial: true,
        }
    }

    /// Kinds probed for this view.
    pub fn kinds(&self) -> &'static [IndexKind] {
        if self.spatial {
            &[IndexKind::Map, IndexKind::Reduce, IndexKind::Spatial]
        } else {
            &[IndexKind::Map, IndexKind::Reduce]
        }
    }
}

/// Raw file contents with modification time in epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub contents: String,
    pub modified: i64,
}

/// File-reading capability used by the synchronizer.
pub trait ViewSourceReader: Send + Sync {
    /// Reads a regular file; `Ok(None)` when nothing exists at `path`.
    fn read(&self, path: &Path) -> io::Result<Option<SourceFile>>;

    /// Lists subdirectory names of `dir`; empty when `dir` is missing.
    fn list_dirs(&self, dir: &Path) -> io::Result<Vec<String>>;
}

/// Reader backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSourceReader;

impl ViewSourceReader for FsSourceReader {
    fn read(&self, path: &Path) -> io::Result<Option<SourceFile>> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err),
        };
        if !metadata.is_file() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(path)?;
        // Pre-epoch mtimes count as 0 so they never look newer than anything.
        let modified = metadata
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
            .unwrap_or(0);

        Ok(Some(SourceFile { contents, modified }))
    }

    fn list_dirs(&self, dir: &Path) -> io::Result<Vec<String>> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

/// Drops full-line `//` comments and trims the whole result.
///
/// Retained lines keep their exact bytes, including inner whitespace and
/// line endings.
pub fn strip_comments(contents: &str) -> String {
    let kept: String = contents
        .split_inclusive('\n')
        .filter(|line| !line.trim_start().starts_with("//"))
        .collect();
    kept.trim().to_string()
}

/// Path probed for one (view, kind) pair under `root`.
pub(crate) fn source_path(root: &Path, document_id: &str, view: &str, kind: IndexKind) -> PathBuf {
    root.join(document_id).join(view).join(kind.file_name())
}

/// Lists views present under any root for `document_id`.
///
/// Names are the sorted union across roots; a view is flagged spatial when
/// any root holds a `spatial.js` for it.
///
/// # Errors
/// - `Source` naming the directory or file that could not be read.
pub fn discover_views(
    reader: &dyn ViewSourceReader,
    roots: &[PathBuf],
    document_id: &str,
) -> SyncResult<Vec<ViewSpec>> {
    let mut found = BTreeMap::<String, bool>::new();
    for root in roots {
        let dir = root.join(document_id);
        let names = reader
            .list_dirs(&dir)
            .map_err(|source| SyncError::Source { path: dir, source })?;
        for name in names {
            let spatial_path = source_path(root, document_id, &name, IndexKind::Spatial);
            let has_spatial = reader
                .read(&spatial_path)
                .map_err(|source| SyncError::Source {
                    path: spatial_path,
                    source,
                })?
                .is_some();
            let spatial = found.entry(name).or_insert(false);
            *spatial |= has_spatial;
        }
    }

    Ok(found
        .into_iter()
        .map(|(name, spatial)| ViewSpec { name, spatial })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::{strip_comments, IndexKind, ViewSpec};

    #[test]
    fn index_kind_names_match_log_and_file_names() {
        let names: Vec<(String, &str)> = [IndexKind::Map, IndexKind::Reduce, IndexKind::Spatial]
            .into_iter()
            .map(|kind| (kind.to_string(), kind.file_name()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("map".to_string(), "map.js"),
                ("reduce".to_string(), "reduce.js"),
                ("spatial".to_string(), "spatial.js"),
            ]
        );
    }

    #[test]
    fn strip_comments_drops_comment_lines_and_trims() {
        let source = "// header\n  // indented\nfunction(doc, meta) {\n  emit(meta.id, null); // trailing\n}\n\n// footer";
        assert_eq!(
            strip_comments(source),
            "function(doc, meta) {\n  emit(meta.id, null); // trailing\n}"
        );
    }

    #[test]
    fn strip_comments_preserves_inner_bytes() {
        let source = "a\r\n\t  b  \r\n// c\r\nd";
        assert_eq!(strip_comments(source), "a\r\n\t  b  \r\nd");
    }

    #[test]
    fn comment_only_file_is_empty() {
        assert!(strip_comments("// one\n   // two\n\n").is_empty());
    }

    #[test]
    fn spatial_views_probe_spatial_kind_last() {
        assert_eq!(ViewSpec::new("by_name").kinds().len(), 2);
        assert_eq!(
            ViewSpec::spatial("by_location").kinds().last(),
            Some(&IndexKind::Spatial)
        );
    }
}
