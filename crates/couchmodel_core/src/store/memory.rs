//! In-process store used by tests, dry runs and single-process tools.

use super::{DocumentStore, StoreError, StoreResult};
use crate::design::DesignDocument;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded in-memory store.
///
/// Counts design document writes and can simulate an unreachable backend,
/// which is what synchronization tests assert against.
#[derive(Default)]
pub struct MemoryStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    design_docs: Mutex<HashMap<String, DesignDocument>>,
    design_writes: AtomicUsize,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_design_document` calls.
    pub fn design_writes(&self) -> usize {
        self.design_writes.load(Ordering::SeqCst)
    }

    /// When set, every operation fails with `StoreError::Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Places a design document without counting it as a write.
    pub fn seed_design_document(&self, doc: DesignDocument) {
        lock(&self.design_docs).insert(doc.id.clone(), doc);
    }

    fn ensure_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "memory store is offline".to_string(),
            ));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        self.ensure_online()?;
        Ok(lock(&self.blobs).get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.ensure_online()?;
        lock(&self.blobs).insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn add(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.ensure_online()?;
        let mut blobs = lock(&self.blobs);
        if blobs.contains_key(key) {
            return Err(StoreError::KeyExists(key.to_string()));
        }
        blobs.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> StoreResult<()> {
        self.ensure_online()?;
        match lock(&self.blobs).remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn design_document(&self, id: &str) -> StoreResult<Option<DesignDocument>> {
        self.ensure_online()?;
        Ok(lock(&self.design_docs).get(id).cloned())
    }

    fn save_design_document(&self, doc: &DesignDocument) -> StoreResult<()> {
        self.ensure_online()?;
        lock(&self.design_docs).insert(doc.id.clone(), doc.clone());
        self.design_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
