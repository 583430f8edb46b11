//! Declarative record model.
//!
//! # Responsibility
//! - Register model schemas (attributes, defaults, associations, views).
//! - Hold explicit per-model configuration passed to services and the
//!   design synchronizer.
//!
//! # Invariants
//! - Records only carry attributes declared on their schema.
//! - Remembered design sync state lives on `ModelConfig`, one per model
//!   type, never in ambient globals.

mod config;
mod record;
mod schema;

pub use config::ModelConfig;
pub use record::{Changes, Record, RecordError, RecordResult};
pub use schema::{
    AttributeDef, AttributeDefault, Association, DocumentFormat, Hook, LifecycleEvent,
    ModelSchema, Validator, RAW_ATTRIBUTE,
};
