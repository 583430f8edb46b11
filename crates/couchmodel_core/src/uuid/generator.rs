//! Thread-safe identifier generator.
//!
//! # Responsibility
//! - Produce identifiers for the three supported algorithms.
//! - Own the per-instance `sequential` epoch (prefix + counter).
//!
//! # Invariants
//! - The `sequential` read-modify-write runs under one mutex per instance.
//! - `random` and `utc_random` never touch the epoch lock.
//! - Instances never share rollover state.

use log::debug;
use once_cell::sync::Lazy;
use rand::rngs::{OsRng, StdRng};
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

const PREFIX_BYTES: usize = 13;
const RANDOM_BYTES: usize = 16;
const UTC_TAIL_BYTES: usize = 9;
const MAX_INCREMENT: u32 = 0xfff;
const COUNTER_CEILING: u32 = 0xfff000;
/// Largest batch one call may request.
pub const MAX_COUNT: usize = 1000;

static GLOBAL_GENERATOR: Lazy<UuidGenerator> = Lazy::new(UuidGenerator::new);

pub type UuidResult<T> = Result<T, UuidError>;

/// Identifier generation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UuidError {
    /// Requested identifier count was zero or above the batch limit.
    InvalidArgument(String),
    /// Algorithm name is not one of `random|utc_random|sequential`.
    UnknownAlgorithm(String),
}

impl Display for UuidError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UnknownAlgorithm(name) => write!(
                f,
                "unknown algorithm `{name}`; expected sequential|random|utc_random"
            ),
        }
    }
}

impl Error for UuidError {}

/// Identifier algorithm.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UuidAlgorithm {
    /// 128 random bits, no ordering.
    Random,
    /// 56-bit microsecond UTC timestamp followed by 72 random bits.
    UtcRandom,
    /// Random 104-bit prefix followed by a 24-bit counter with random increments.
    #[default]
    Sequential,
}

impl UuidAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Random => "random",
            Self::UtcRandom => "utc_random",
            Self::Sequential => "sequential",
        }
    }
}

impl Display for UuidAlgorithm {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UuidAlgorithm {
    type Err = UuidError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().trim_start_matches(':') {
            "random" => Ok(Self::Random),
            "utc_random" => Ok(Self::UtcRandom),
            "sequential" => Ok(Self::Sequential),
            other => Err(UuidError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// Random source backing the `sequential` epoch.
///
/// `random` and `utc_random` always draw from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EntropySource {
    /// Operating system CSPRNG.
    #[default]
    Os,
    /// `StdRng` seeded once from OS entropy.
    Fast,
    /// Deterministic `StdRng`; reproducible epochs for fixtures.
    Seeded(u64),
}

impl EntropySource {
    fn build(self) -> Box<dyn RngCore + Send> {
        match self {
            Self::Os => Box::new(OsRng),
            Self::Fast => Box::new(StdRng::from_entropy()),
            Self::Seeded(seed) => Box::new(StdRng::seed_from_u64(seed)),
        }
    }
}

/// Output of [`UuidGenerator::next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Generated {
    One(String),
    Many(Vec<String>),
}

impl Generated {
    fn from_vec(mut ids: Vec<String>) -> Self {
        if ids.len() == 1 {
            Self::One(ids.remove(0))
        } else {
            Self::Many(ids)
        }
    }

    /// Flattens into generation-ordered identifiers.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(id) => vec![id],
            Self::Many(ids) => ids,
        }
    }
}

/// Snapshot of a generator's `sequential` epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceEpoch {
    pub prefix: String,
    pub counter: u32,
}

struct SequentialState {
    prefix: String,
    counter: u32,
    rng: Box<dyn RngCore + Send>,
}

impl SequentialState {
    fn new(source: EntropySource) -> Self {
        let mut rng = source.build();
        let prefix = random_hex(rng.as_mut(), PREFIX_BYTES);
        let counter = rng.gen_range(1..=MAX_INCREMENT);
        Self {
            prefix,
            counter,
            rng,
        }
    }

    fn advance(&mut self) -> String {
        if self.counter >= COUNTER_CEILING {
            self.prefix = random_hex(self.rng.as_mut(), PREFIX_BYTES);
            self.counter = self.rng.gen_range(1..=MAX_INCREMENT);
            debug!("event=uuid_rollover module=uuid status=ok");
        }
        self.counter += self.rng.gen_range(1..=MAX_INCREMENT);
        format!("{}{:06x}", self.prefix, self.counter)
    }
}

/// Identifier generator with its own `sequential` epoch.
pub struct UuidGenerator {
    sequential: Mutex<SequentialState>,
}

impl UuidGenerator {
    /// Creates a generator backed by the OS CSPRNG.
    pub fn new() -> Self {
        Self::with_entropy(EntropySource::default())
    }

    /// Creates a generator whose `sequential` epoch draws from `source`.
    pub fn with_entropy(source: EntropySource) -> Self {
        Self {
            sequential: Mutex::new(SequentialState::new(source)),
        }
    }

    /// Process-wide default generator, created on first use.
    pub fn global() -> &'static UuidGenerator {
        &GLOBAL_GENERATOR
    }

    /// Generates `count` identifiers with `algorithm`.
    ///
    /// Returns [`Generated::One`] when `count == 1`, otherwise
    /// [`Generated::Many`] in generation order.
    ///
    /// # Errors
    /// - `InvalidArgument` when `count` is zero or above [`MAX_COUNT`]; no
    ///   state is touched.
    pub fn next(&self, count: usize, algorithm: UuidAlgorithm) -> UuidResult<Generated> {
        check_count(count)?;

        let ids = match algorithm {
            UuidAlgorithm::Random => {
                let mut rng = rand::thread_rng();
                (0..count)
                    .map(|_| random_hex(&mut rng, RANDOM_BYTES))
                    .collect()
            }
            UuidAlgorithm::UtcRandom => {
                let prefix = format!("{:014x}", utc_micros());
                let mut rng = rand::thread_rng();
                (0..count)
                    .map(|_| format!("{prefix}{}", random_hex(&mut rng, UTC_TAIL_BYTES)))
                    .collect()
            }
            UuidAlgorithm::Sequential => (0..count).map(|_| self.next_sequential()).collect(),
        };

        Ok(Generated::from_vec(ids))
    }

    /// Parses `algorithm` and generates `count` identifiers.
    ///
    /// # Errors
    /// - `InvalidArgument` when `count` is zero or above [`MAX_COUNT`].
    /// - `UnknownAlgorithm` when the name is not recognized.
    pub fn next_named(&self, count: usize, algorithm: &str) -> UuidResult<Generated> {
        check_count(count)?;
        self.next(count, algorithm.parse()?)
    }

    /// Generates exactly one identifier.
    pub fn next_one(&self, algorithm: UuidAlgorithm) -> String {
        match algorithm {
            UuidAlgorithm::Sequential => self.next_sequential(),
            UuidAlgorithm::Random => random_hex(&mut rand::thread_rng(), RANDOM_BYTES),
            UuidAlgorithm::UtcRandom => format!(
                "{:014x}{}",
                utc_micros(),
                random_hex(&mut rand::thread_rng(), UTC_TAIL_BYTES)
            ),
        }
    }

    /// Returns the current `sequential` prefix and counter.
    pub fn epoch(&self) -> SequenceEpoch {
        let state = self
            .sequential
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        SequenceEpoch {
            prefix: state.prefix.clone(),
            counter: state.counter,
        }
    }

    fn next_sequential(&self) -> String {
        self.sequential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .advance()
    }
}

impl Default for UuidGenerator {
    fn default() -> Self {
        Self::new()
    }
}

fn check_count(count: usize) -> UuidResult<()> {
    if count == 0 {
        return Err(UuidError::InvalidArgument(
            "count should be a positive number".to_string(),
        ));
    }
    if count > MAX_COUNT {
        return Err(UuidError::InvalidArgument(format!(
            "count {count} exceeds the limit of {MAX_COUNT}"
        )));
    }
    Ok(())
}

fn random_hex<R: RngCore + ?Sized>(rng: &mut R, len: usize) -> String {
    let mut bytes = vec![0_u8; len];
    rng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn utc_micros() -> u128 {
    // Clocks set before 1970 collapse to zero instead of failing generation.
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_micros())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::{
        EntropySource, Generated, UuidAlgorithm, UuidError, UuidGenerator, COUNTER_CEILING,
    };

    fn is_lower_hex(value: &str) -> bool {
        value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    #[test]
    fn algorithm_parses_known_names() {
        assert_eq!(
            "random".parse::<UuidAlgorithm>().expect("random"),
            UuidAlgorithm::Random
        );
        assert_eq!(
            " :utc_random ".parse::<UuidAlgorithm>().expect("utc_random"),
            UuidAlgorithm::UtcRandom
        );
        assert_eq!(UuidAlgorithm::default(), UuidAlgorithm::Sequential);
    }

    #[test]
    fn every_algorithm_emits_32_lower_hex_chars() {
        let generator = UuidGenerator::new();
        for algorithm in [
            UuidAlgorithm::Random,
            UuidAlgorithm::UtcRandom,
            UuidAlgorithm::Sequential,
        ] {
            let id = generator.next_one(algorithm);
            assert_eq!(id.len(), 32, "{algorithm} produced `{id}`");
            assert!(is_lower_hex(&id), "{algorithm} produced `{id}`");
        }
    }

    #[test]
    fn single_count_returns_one_variant() {
        let generator = UuidGenerator::new();
        let single = generator
            .next(1, UuidAlgorithm::Random)
            .expect("count 1 should succeed");
        assert!(matches!(single, Generated::One(_)));

        let many = generator
            .next(3, UuidAlgorithm::Random)
            .expect("count 3 should succeed");
        assert_eq!(many.into_vec().len(), 3);
    }

    #[test]
    fn utc_random_batch_shares_time_prefix() {
        let ids = UuidGenerator::new()
            .next(5, UuidAlgorithm::UtcRandom)
            .expect("batch should succeed")
            .into_vec();
        let prefix = &ids[0][..14];
        assert!(ids.iter().all(|id| &id[..14] == prefix));
    }

    #[test]
    fn seeded_generators_replay_the_same_epoch() {
        let first = UuidGenerator::with_entropy(EntropySource::Seeded(42));
        let second = UuidGenerator::with_entropy(EntropySource::Seeded(42));
        assert_eq!(first.epoch(), second.epoch());
        assert_eq!(
            first.next_one(UuidAlgorithm::Sequential),
            second.next_one(UuidAlgorithm::Sequential)
        );
    }

    #[test]
    fn counter_at_ceiling_redraws_prefix() {
        let generator = UuidGenerator::with_entropy(EntropySource::Seeded(7));
        let before = generator.epoch();
        generator
            .sequential
            .lock()
            .expect("lock should not be poisoned")
            .counter = COUNTER_CEILING;

        let id = generator.next_one(UuidAlgorithm::Sequential);
        let after = generator.epoch();
        assert_ne!(after.prefix, before.prefix);
        assert!(after.counter >= 2 && after.counter <= 2 * 0xfff);
        assert_eq!(&id[..26], after.prefix);
    }

    #[test]
    fn zero_count_is_rejected_before_parsing() {
        let err = UuidGenerator::new()
            .next_named(0, "bogus")
            .expect_err("zero count should fail");
        assert!(matches!(err, UuidError::InvalidArgument(_)));
    }
}
