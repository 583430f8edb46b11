//! Design document resolution and synchronization.
//!
//! # Responsibility
//! - Resolve per-view index sources from ordered search roots.
//! - Compute a content signature and latest mtime for the candidate.
//! - Publish the candidate only when local and server copies are stale.
//!
//! # Invariants
//! - The signature depends only on contributing bytes and their order.
//! - A newer server copy is never replaced by older on-disk content.
//! - A second pass over unchanged files performs no store write.

mod candidate;
mod document;
mod naming;
mod source;
mod sync;

pub use candidate::build_candidate;
pub use document::{DesignDocument, ViewDefinition};
pub use naming::design_document_id;
pub use source::{
    discover_views, strip_comments, FsSourceReader, IndexKind, SourceFile, ViewSourceReader,
    ViewSpec,
};
pub use sync::{
    warm_up, DesignDocumentSynchronizer, SyncError, SyncOutcome, SyncResult, SyncState,
    WarmUpEntry,
};
