//! Design document synchronization.
//!
//! # Responsibility
//! - Decide whether a model's design document must be re-published.
//! - Keep the per-model remembered signature/timestamp current.
//!
//! # Invariants
//! - Remembered state changes only after a confirmed server read or write.
//! - The read-decide-write sequence for one model holds that model's lock.
//! - Store errors propagate unchanged; no retry happens here.

use super::candidate::build_candidate;
use super::source::{discover_views, FsSourceReader, ViewSourceReader, ViewSpec};
use crate::model::ModelConfig;
use crate::store::StoreError;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

pub type SyncResult<T> = Result<T, SyncError>;

/// Synchronization errors.
#[derive(Debug)]
pub enum SyncError {
    /// Invoked without search roots.
    Misconfigured(String),
    /// An existing view source could not be read.
    Source { path: PathBuf, source: io::Error },
    Store(StoreError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Misconfigured(message) => write!(f, "synchronizer misconfigured: {message}"),
            Self::Source { path, source } => {
                write!(f, "failed to read view source `{}`: {source}", path.display())
            }
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Misconfigured(_) => None,
            Self::Source { source, .. } => Some(source),
            Self::Store(err) => Some(err),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}

/// Last signature/timestamp a process published or observed as current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncState {
    pub signature: String,
    pub timestamp: i64,
}

/// Result of one synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Candidate matched remembered state; the store was not contacted.
    Unchanged,
    /// Server copy is identical or newer; nothing was written.
    UpToDate,
    /// Candidate was written to the store.
    Published,
}

impl SyncOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::UpToDate => "up_to_date",
            Self::Published => "published",
        }
    }
}

impl Display for SyncOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Publishes on-disk view definitions as design documents.
pub struct DesignDocumentSynchronizer {
    roots: Vec<PathBuf>,
    reader: Arc<dyn ViewSourceReader>,
}

impl DesignDocumentSynchronizer {
    /// Creates a synchronizer reading from the local file system.
    ///
    /// `roots` are searched in order; the first root holding a non-empty
    /// source for a (view, kind) pair wins.
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self::with_reader(roots, Arc::new(FsSourceReader))
    }

    pub fn with_reader(roots: Vec<PathBuf>, reader: Arc<dyn ViewSourceReader>) -> Self {
        Self { roots, reader }
    }

    /// Synchronizes the views declared on the model schema.
    ///
    /// A schema without declared views falls back to the views found on
    /// disk.
    pub fn ensure(&self, model: &ModelConfig) -> SyncResult<SyncOutcome> {
        self.require_roots()?;
        let declared = model.schema().views();
        if !declared.is_empty() {
            return self.synchronize(model, declared);
        }

        let document_id = model.design_document();
        let discovered = discover_views(self.reader.as_ref(), &self.roots, document_id)?;
        self.synchronize(model, &discovered)
    }

    /// Runs one synchronization pass for `model` over `views`.
    ///
    /// Publishes only when the candidate differs from the remembered
    /// signature and is newer than the remembered timestamp, and, when the
    /// store already holds the document, differs from and is newer than
    /// that copy as well.
    ///
    /// # Errors
    /// - `Misconfigured` when no roots are set; nothing is touched.
    /// - `Source` when a view file exists but cannot be read.
    /// - `Store` when the existence check or the write fails.
    pub fn synchronize(&self, model: &ModelConfig, views: &[ViewSpec]) -> SyncResult<SyncOutcome> {
        self.require_roots()?;
        let document_id = model.design_document();
        let mut remembered = model.lock_sync_state();

        let candidate = build_candidate(self.reader.as_ref(), &self.roots, document_id, views)?;
        debug!(
            "event=design_sync module=design status=candidate doc={} views={} spatial={} timestamp={}",
            document_id,
            candidate.views.len(),
            candidate.spatial.len(),
            candidate.timestamp
        );

        let (known_signature, known_timestamp) = match remembered.as_ref() {
            Some(state) => (Some(state.signature.as_str()), state.timestamp),
            None => (None, 0),
        };
        if known_signature == Some(candidate.signature.as_str())
            || candidate.timestamp <= known_timestamp
        {
            return Ok(SyncOutcome::Unchanged);
        }

        let store = model.store();
        let current = store.design_document(document_id)?;
        let outcome = match current {
            Some(current)
                if current.signature == candidate.signature
                    || candidate.timestamp <= current.timestamp =>
            {
                info!(
                    "event=design_sync module=design status=up_to_date doc={} server_timestamp={} local_timestamp={}",
                    document_id, current.timestamp, candidate.timestamp
                );
                *remembered = Some(SyncState {
                    signature: current.signature,
                    timestamp: current.timestamp,
                });
                SyncOutcome::UpToDate
            }
            _ => {
                if let Err(err) = store.save_design_document(&candidate) {
                    warn!(
                        "event=design_sync module=design status=error doc={} error={}",
                        document_id, err
                    );
                    return Err(err.into());
                }
                info!(
                    "event=design_sync module=design status=published doc={} timestamp={}",
                    document_id, candidate.timestamp
                );
                *remembered = Some(SyncState {
                    signature: candidate.signature,
                    timestamp: candidate.timestamp,
                });
                SyncOutcome::Published
            }
        };

        Ok(outcome)
    }

    fn require_roots(&self) -> SyncResult<()> {
        if self.roots.is_empty() {
            return Err(SyncError::Misconfigured(
                "no design document search roots configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// Outcome of one model during [`warm_up`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarmUpEntry {
    pub document_id: String,
    /// `None` when the store was unreachable and the model was skipped.
    pub outcome: Option<SyncOutcome>,
}

/// Best-effort synchronization of several models at process start.
///
/// Transient store errors are logged and the model is skipped; every other
/// error stops the warm-up and is returned.
pub fn warm_up(
    synchronizer: &DesignDocumentSynchronizer,
    models: &[&ModelConfig],
) -> SyncResult<Vec<WarmUpEntry>> {
    let mut entries = Vec::with_capacity(models.len());
    for model in models {
        let outcome = match synchronizer.ensure(model) {
            Ok(outcome) => Some(outcome),
            Err(SyncError::Store(err)) if err.is_transient() => {
                warn!(
                    "event=design_warm_up module=design status=skipped doc={} error={}",
                    model.design_document(),
                    err
                );
                None
            }
            Err(err) => return Err(err),
        };
        entries.push(WarmUpEntry {
            document_id: model.design_document().to_string(),
            outcome,
        });
    }
    Ok(entries)
}
