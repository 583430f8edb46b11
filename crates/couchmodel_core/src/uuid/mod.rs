//! Document identifier generation.
//!
//! # Responsibility
//! - Mint opaque, printable primary keys for new records.
//! - Offer `random`, `utc_random` and `sequential` algorithms.
//!
//! # Invariants
//! - Every identifier is 32 lowercase hex characters.
//! - `sequential` output strictly increases within one prefix epoch.
//! - Invalid requests fail before any randomness is consumed.

mod generator;

pub use generator::{
    EntropySource, Generated, SequenceEpoch, UuidAlgorithm, UuidError, UuidGenerator, UuidResult,
    MAX_COUNT,
};
