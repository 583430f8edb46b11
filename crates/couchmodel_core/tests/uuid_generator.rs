use couchmodel_core::uuid::MAX_COUNT;
use couchmodel_core::{EntropySource, Generated, UuidAlgorithm, UuidError, UuidGenerator};
use std::collections::HashSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ALGORITHMS: [UuidAlgorithm; 3] = [
    UuidAlgorithm::Random,
    UuidAlgorithm::UtcRandom,
    UuidAlgorithm::Sequential,
];

// First-epoch call count is bounded by increments in [1, 0xfff] against the
// 0xfff000 ceiling.
const MIN_CALLS_PER_EPOCH: usize = 4094;
const MAX_CALLS_PER_EPOCH: usize = 16_773_120;

#[test]
fn generates_distinct_ids_for_every_algorithm() {
    for total in [10, 10_000] {
        for algorithm in ALGORITHMS {
            let generator = UuidGenerator::new();
            let mut unique = HashSet::new();
            let mut produced = 0;
            while produced < total {
                let batch = (total - produced).min(MAX_COUNT);
                let ids = generator
                    .next(batch, algorithm)
                    .expect("batch within limit should succeed")
                    .into_vec();
                assert_eq!(ids.len(), batch);
                produced += batch;
                unique.extend(ids);
            }
            assert_eq!(unique.len(), total, "{algorithm} produced duplicates");
        }
    }
}

#[test]
fn id_layouts_match_algorithm_formats() {
    let generator = UuidGenerator::new();

    let sequential = generator.next_one(UuidAlgorithm::Sequential);
    assert_eq!(&sequential[..26], generator.epoch().prefix);
    assert_eq!(
        u32::from_str_radix(&sequential[26..], 16).expect("hex counter"),
        generator.epoch().counter
    );

    let utc = generator.next_one(UuidAlgorithm::UtcRandom);
    let micros = u64::from_str_radix(&utc[..14], 16).expect("hex timestamp");
    let now_micros = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock after epoch")
        .as_micros() as u64;
    assert!(micros <= now_micros);
    assert!(now_micros - micros < 60_000_000);
}

#[test]
fn successive_ids_are_ordered() {
    let generator = UuidGenerator::new();

    let first = generator.next_one(UuidAlgorithm::UtcRandom);
    thread::sleep(Duration::from_millis(2));
    let second = generator.next_one(UuidAlgorithm::UtcRandom);
    assert!(first < second, "{first} should sort before {second}");

    let first = generator.next_one(UuidAlgorithm::Sequential);
    let second = generator.next_one(UuidAlgorithm::Sequential);
    assert!(first < second, "{first} should sort before {second}");
}

#[test]
fn sequential_batch_is_strictly_increasing_within_epoch() {
    let generator = UuidGenerator::with_entropy(EntropySource::Seeded(11));
    let ids = generator
        .next(1_000, UuidAlgorithm::Sequential)
        .expect("batch should succeed")
        .into_vec();
    for pair in ids.windows(2) {
        if pair[0][..26] == pair[1][..26] {
            assert!(pair[0] < pair[1]);
        }
    }
}

#[test]
fn rollover_happens_within_increment_bounds() {
    for _ in 0..3 {
        let generator = UuidGenerator::with_entropy(EntropySource::Fast);
        let prefix = generator.next_one(UuidAlgorithm::Sequential)[..26].to_string();
        let mut calls = 0_usize;
        while generator.next_one(UuidAlgorithm::Sequential)[..26] == prefix {
            calls += 1;
            assert!(calls <= MAX_CALLS_PER_EPOCH, "prefix never rolled over");
        }
        assert!(
            (MIN_CALLS_PER_EPOCH..=MAX_CALLS_PER_EPOCH).contains(&calls),
            "rolled over after {calls} calls"
        );
    }
}

#[test]
fn invalid_count_fails_without_touching_epoch() {
    let generator = UuidGenerator::new();
    let before = generator.epoch();

    let err = generator
        .next(0, UuidAlgorithm::Sequential)
        .expect_err("zero count must fail");
    assert!(matches!(err, UuidError::InvalidArgument(_)));

    let err = generator
        .next_named(0, "random")
        .expect_err("zero count must fail");
    assert!(matches!(err, UuidError::InvalidArgument(_)));

    assert_eq!(generator.epoch(), before);
}

#[test]
fn oversized_count_fails_without_touching_epoch() {
    let generator = UuidGenerator::new();
    let before = generator.epoch();

    for count in [MAX_COUNT + 1, usize::MAX / 2, usize::MAX] {
        for algorithm in ALGORITHMS {
            let err = generator
                .next(count, algorithm)
                .expect_err("count above the limit must fail");
            assert!(matches!(err, UuidError::InvalidArgument(_)));
        }
        let err = generator
            .next_named(count, "sequential")
            .expect_err("count above the limit must fail");
        assert!(matches!(err, UuidError::InvalidArgument(_)));
    }
    assert_eq!(generator.epoch(), before);

    let ids = generator
        .next(MAX_COUNT, UuidAlgorithm::Sequential)
        .expect("count at the limit should succeed")
        .into_vec();
    assert_eq!(ids.len(), MAX_COUNT);
}

#[test]
fn unknown_algorithm_fails_without_touching_epoch() {
    let generator = UuidGenerator::new();
    let before = generator.epoch();

    let err = generator
        .next_named(1, "bogus")
        .expect_err("unknown algorithm must fail");
    assert_eq!(err, UuidError::UnknownAlgorithm("bogus".to_string()));
    assert!(matches!(
        "uuid4".parse::<UuidAlgorithm>(),
        Err(UuidError::UnknownAlgorithm(_))
    ));
    assert_eq!(generator.epoch(), before);
}

#[test]
fn named_single_request_returns_one_id() {
    let generated = UuidGenerator::new()
        .next_named(1, "sequential")
        .expect("sequential should be known");
    match generated {
        Generated::One(id) => assert_eq!(id.len(), 32),
        Generated::Many(ids) => panic!("expected a single id, got {}", ids.len()),
    }
}

#[test]
fn concurrent_sequential_callers_never_collide() {
    let generator = Arc::new(UuidGenerator::new());
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                generator
                    .next(500, UuidAlgorithm::Sequential)
                    .expect("batch should succeed")
                    .into_vec()
            })
        })
        .collect();

    let mut all = HashSet::new();
    for handle in handles {
        for id in handle.join().expect("worker should not panic") {
            assert!(all.insert(id), "duplicate id across threads");
        }
    }
    assert_eq!(all.len(), 8 * 500);
}

#[test]
fn independent_instances_keep_separate_epochs() {
    let first = UuidGenerator::new();
    let second = UuidGenerator::new();
    assert_ne!(first.epoch().prefix, second.epoch().prefix);

    let global = UuidGenerator::global();
    assert!(std::ptr::eq(global, UuidGenerator::global()));
}
