//! Declarative object-document mapping over a key/value document store.
//!
//! The crate mints record identifiers (`uuid`), keeps server-side design
//! documents in step with on-disk view sources (`design`), and layers a
//! small record lifecycle (`model`, `service`) over an abstract `store`.

pub mod db;
pub mod design;
pub mod logging;
pub mod model;
pub mod service;
pub mod settings;
pub mod store;
pub mod uuid;

pub use design::{
    design_document_id, discover_views, warm_up, DesignDocument, DesignDocumentSynchronizer,
    SyncError, SyncOutcome, SyncResult, SyncState, ViewDefinition, ViewSpec,
};
pub use logging::{init_logging, logging_status};
pub use model::{
    DocumentFormat, LifecycleEvent, ModelConfig, ModelSchema, Record, RecordError, RecordResult,
};
pub use service::record_service::{RecordService, SaveOptions};
pub use settings::{Settings, SettingsError};
pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreError, StoreResult};
pub use uuid::{EntropySource, Generated, UuidAlgorithm, UuidError, UuidGenerator};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
