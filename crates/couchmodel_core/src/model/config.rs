//! Per-model configuration.

use super::schema::ModelSchema;
use crate::design::SyncState;
use crate::store::DocumentStore;
use crate::uuid::{UuidAlgorithm, UuidGenerator};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Everything one model type needs at runtime.
///
/// Built once per model type and passed explicitly to record services and
/// the design synchronizer. Owns the remembered design sync state, so two
/// configs for the same type do not share it.
pub struct ModelConfig {
    schema: Arc<ModelSchema>,
    store: Arc<dyn DocumentStore>,
    uuid_algorithm: UuidAlgorithm,
    generator: Option<Arc<UuidGenerator>>,
    sync_state: Mutex<Option<SyncState>>,
}

impl ModelConfig {
    /// Uses the `sequential` algorithm and the process-wide generator.
    pub fn new(schema: ModelSchema, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            schema: Arc::new(schema),
            store,
            uuid_algorithm: UuidAlgorithm::default(),
            generator: None,
            sync_state: Mutex::new(None),
        }
    }

    pub fn with_uuid_algorithm(mut self, algorithm: UuidAlgorithm) -> Self {
        self.uuid_algorithm = algorithm;
        self
    }

    /// Uses a dedicated generator instead of [`UuidGenerator::global`].
    pub fn with_generator(mut self, generator: Arc<UuidGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn schema(&self) -> &ModelSchema {
        &self.schema
    }

    pub(crate) fn schema_handle(&self) -> Arc<ModelSchema> {
        Arc::clone(&self.schema)
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    pub fn uuid_algorithm(&self) -> UuidAlgorithm {
        self.uuid_algorithm
    }

    pub fn generator(&self) -> &UuidGenerator {
        self.generator
            .as_deref()
            .unwrap_or_else(|| UuidGenerator::global())
    }

    pub fn design_document(&self) -> &str {
        self.schema.design_document()
    }

    /// Snapshot of the remembered design sync state; `None` before the
    /// first pass that reached the store.
    pub fn sync_state(&self) -> Option<SyncState> {
        self.lock_sync_state().clone()
    }

    pub(crate) fn lock_sync_state(&self) -> MutexGuard<'_, Option<SyncState>> {
        self.sync_state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
