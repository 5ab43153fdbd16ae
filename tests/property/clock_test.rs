//! Property-based tests for `VectorClock`'s ordering and wire format.

use proptest::prelude::*;
use ringdb::core::clock::{Ordering, VectorClock};

fn arbitrary_clock(increments: &[(u16, u8)]) -> VectorClock {
    let mut clock = VectorClock::new();
    for &(node_id, count) in increments {
        for _ in 0..count {
            clock = clock.increment(node_id);
        }
    }
    clock
}

fn increments_strategy() -> impl Strategy<Value = Vec<(u16, u8)>> {
    proptest::collection::vec((0u16..6, 0u8..8), 0..6)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 200,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn compare_is_symmetric(a in increments_strategy(), b in increments_strategy()) {
        let ca = arbitrary_clock(&a);
        let cb = arbitrary_clock(&b);
        let expected = match ca.compare(&cb) {
            Ordering::Before => Ordering::After,
            Ordering::After => Ordering::Before,
            Ordering::Equal => Ordering::Equal,
            Ordering::Concurrently => Ordering::Concurrently,
        };
        prop_assert_eq!(cb.compare(&ca), expected);
    }

    #[test]
    fn increment_is_always_before_the_result(a in increments_strategy(), node_id in 0u16..6) {
        let ca = arbitrary_clock(&a);
        let incremented = ca.increment(node_id);
        prop_assert_eq!(ca.compare(&incremented), Ordering::Before);
    }

    #[test]
    fn wire_format_round_trips(a in increments_strategy()) {
        let clock = arbitrary_clock(&a);
        let encoded = clock.to_bytes();
        let decoded = VectorClock::from_bytes(encoded).unwrap();
        prop_assert_eq!(decoded, clock);
    }
}
