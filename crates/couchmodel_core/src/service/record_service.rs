//! Record lifecycle service.
//!
//! # Responsibility
//! - Provide create/save/update/delete/reload/find entry points.
//! - Mint identifiers with the model's configured algorithm.
//!
//! # Invariants
//! - Writes run the schema validator first unless the caller opts out.
//! - Validation runs before any lifecycle hook.
//! - `create` never overwrites an existing key.
//! - Dirty state is committed only after the store confirms a write.
//! - Store errors are returned unchanged inside `RecordError::Store`.

use crate::model::{LifecycleEvent, ModelConfig, Record, RecordError, RecordResult};
use log::debug;
use serde_json::Value;

/// Per-call write options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOptions {
    pub validate: bool,
}

impl SaveOptions {
    /// Writes without running the schema validator.
    pub fn skip_validation() -> Self {
        Self { validate: false }
    }
}

impl Default for SaveOptions {
    fn default() -> Self {
        Self { validate: true }
    }
}


/// Lifecycle operations for records of one model type.
pub struct RecordService<'a> {
    model: &'a ModelConfig,
}

impl<'a> RecordService<'a> {
    pub fn new(model: &'a ModelConfig) -> Self {
        Self { model }
    }

    /// Returns a new record with schema defaults.
    pub fn build(&self) -> Record {
        Record::new(self.model.schema_handle())
    }

    /// Returns a new record with `attrs` assigned over the defaults.
    pub fn build_with<K: Into<String>>(
        &self,
        attrs: impl IntoIterator<Item = (K, Value)>,
    ) -> RecordResult<Record> {
        Record::with_attributes(self.model.schema_handle(), attrs)
    }

    /// Inserts `record`, minting an id when it has none.
    ///
    /// # Errors
    /// - `Invalid` when the schema validator rejects the record.
    /// - `Halted` when a create hook fails.
    /// - `Store(KeyExists)` when the id is already taken; a minted id is
    ///   cleared again so the record stays new.
    pub fn create(&self, record: &mut Record) -> RecordResult<()> {
        self.create_with(record, SaveOptions::default())
    }

    pub fn create_with(&self, record: &mut Record, options: SaveOptions) -> RecordResult<()> {
        if options.validate {
            self.validate(record)?;
        }
        self.insert(record)
    }

    /// Creates a new record, or upserts a persisted one.
    pub fn save(&self, record: &mut Record) -> RecordResult<()> {
        self.save_with(record, SaveOptions::default())
    }

    pub fn save_with(&self, record: &mut Record, options: SaveOptions) -> RecordResult<()> {
        if options.validate {
            self.validate(record)?;
        }
        self.run_hooks(LifecycleEvent::BeforeSave, record)?;
        match record.id().map(str::to_string) {
            None => self.insert(record)?,
            Some(id) => {
                self.model.store().set(&id, &record.to_document()?)?;
                record.commit_changes();
                debug!(
                    "event=record_save module=service status=ok model={}",
                    self.model.schema().name()
                );
            }
        }
        self.run_hooks(LifecycleEvent::AfterSave, record)
    }

    /// Assigns `attrs` and saves.
    pub fn update<K: Into<String>>(
        &self,
        record: &mut Record,
        attrs: impl IntoIterator<Item = (K, Value)>,
    ) -> RecordResult<()> {
        self.run_hooks(LifecycleEvent::BeforeUpdate, record)?;
        record.assign(attrs)?;
        self.save(record)?;
        self.run_hooks(LifecycleEvent::AfterUpdate, record)
    }

    /// Removes `record` from the store and clears its id.
    pub fn delete(&self, record: &mut Record) -> RecordResult<()> {
        if record.is_new() {
            return Err(RecordError::MissingId);
        }
        self.run_hooks(LifecycleEvent::BeforeDelete, record)?;
        let id = record.id().ok_or(RecordError::MissingId)?;
        self.model.store().delete(id)?;
        record.set_id(None);
        debug!(
            "event=record_delete module=service status=ok model={}",
            self.model.schema().name()
        );
        self.run_hooks(LifecycleEvent::AfterDelete, record)
    }

    /// Replaces attributes with the stored copy and clears dirty state.
    ///
    /// # Errors
    /// - `MissingId` for a new record.
    /// - `NotFound` when the stored copy is gone.
    pub fn reload(&self, record: &mut Record) -> RecordResult<()> {
        let id = record.id().ok_or(RecordError::MissingId)?;
        let stored = self.find(id)?;
        record.replace_attributes(stored);
        Ok(())
    }

    /// Loads the record stored under `id`.
    ///
    /// # Errors
    /// - `NotFound` when `id` is empty or absent from the store.
    pub fn find(&self, id: &str) -> RecordResult<Record> {
        self.find_by_id(id)?
            .ok_or_else(|| RecordError::NotFound(id.to_string()))
    }

    /// Loads the record stored under `id`, or `None` when there is none.
    pub fn find_by_id(&self, id: &str) -> RecordResult<Option<Record>> {
        if id.is_empty() {
            return Ok(None);
        }
        match self.model.store().get(id)? {
            Some(bytes) => Ok(Some(Record::from_document(
                self.model.schema_handle(),
                id,
                &bytes,
            )?)),
            None => Ok(None),
        }
    }

    /// Loads every id that exists, preserving request order.
    pub fn find_many<S: AsRef<str>>(&self, ids: &[S]) -> RecordResult<Vec<Record>> {
        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.find_by_id(id.as_ref())? {
                records.push(record);
            }
        }
        Ok(records)
    }

    pub fn exists(&self, id: &str) -> RecordResult<bool> {
        Ok(self.model.store().get(id)?.is_some())
    }

    /// Loads the record `association` points at, from `target`'s store.
    ///
    /// Returns `None` when the foreign key is unset or dangling.
    pub fn belongs_to(
        &self,
        record: &Record,
        association: &str,
        target: &ModelConfig,
    ) -> RecordResult<Option<Record>> {
        let foreign_key = self.foreign_key(association, target)?;
        match record.get(&foreign_key) {
            Some(Value::String(id)) => RecordService::new(target).find_by_id(id),
            Some(Value::Null) | None => Ok(None),
            Some(other) => Err(RecordError::InvalidData(format!(
                "`{foreign_key}` must hold a string id, got {other}"
            ))),
        }
    }

    /// Points `association` at `associated`, or clears it with `None`.
    pub fn assign_belongs_to(
        &self,
        record: &mut Record,
        association: &str,
        target: &ModelConfig,
        associated: Option<&Record>,
    ) -> RecordResult<()> {
        let foreign_key = self.foreign_key(association, target)?;
        let value = match associated {
            Some(associated) => {
                Value::String(associated.id().ok_or(RecordError::MissingId)?.to_string())
            }
            None => Value::Null,
        };
        record.set(&foreign_key, value)
    }

    fn foreign_key(&self, association: &str, target: &ModelConfig) -> RecordResult<String> {
        let assoc = self
            .model
            .schema()
            .association(association)
            .ok_or_else(|| RecordError::UnknownAssociation(association.to_string()))?;
        if assoc.target != target.schema().name() {
            return Err(RecordError::AssociationMismatch {
                expected: assoc.target.clone(),
                actual: target.schema().name().to_string(),
            });
        }
        Ok(assoc.foreign_key.clone())
    }

    /// Runs create hooks around the insert; the caller has validated.
    fn insert(&self, record: &mut Record) -> RecordResult<()> {
        self.run_hooks(LifecycleEvent::BeforeCreate, record)?;
        let minted = record.is_new();
        let id = match record.id().map(str::to_string) {
            Some(id) => id,
            None => {
                let id = self
                    .model
                    .generator()
                    .next_one(self.model.uuid_algorithm());
                record.set_id(Some(id.clone()));
                id
            }
        };

        let written = record
            .to_document()
            .and_then(|body| self.model.store().add(&id, &body).map_err(RecordError::from));
        if let Err(err) = written {
            if minted {
                record.set_id(None);
            }
            return Err(err);
        }
        record.commit_changes();
        debug!(
            "event=record_create module=service status=ok model={} minted={}",
            self.model.schema().name(),
            minted
        );
        self.run_hooks(LifecycleEvent::AfterCreate, record)
    }

    fn run_hooks(&self, event: LifecycleEvent, record: &mut Record) -> RecordResult<()> {
        for hook in self.model.schema().hooks(event) {
            if let Err(reason) = hook(&mut *record) {
                debug!(
                    "event=record_hook module=service status=halted model={} hook={}",
                    self.model.schema().name(),
                    event
                );
                return Err(RecordError::Halted { event, reason });
            }
        }
        Ok(())
    }

    fn validate(&self, record: &Record) -> RecordResult<()> {
        self.model
            .schema()
            .run_validator(record)
            .map_err(RecordError::Invalid)
    }
}
