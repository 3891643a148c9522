// tests/property/backoff_test.rs

use proptest::prelude::*;
use quillmaster::core::leader::{INITIAL_BACKOFF, MAX_BACKOFF, next_backoff};
use std::time::Duration;

proptest! {
    #[test]
    fn backoff_never_shrinks_and_stays_capped(start_ms in 1u64..1_000, steps in 0usize..64) {
        let mut backoff = Duration::from_millis(start_ms).min(MAX_BACKOFF);
        for _ in 0..steps {
            let next = next_backoff(backoff);
            prop_assert!(next >= backoff);
            prop_assert!(next <= MAX_BACKOFF);
            backoff = next;
        }
    }

    #[test]
    fn backoff_reaches_cap_within_nine_steps(extra in 0usize..16) {
        let mut backoff = INITIAL_BACKOFF;
        for _ in 0..(8 + extra) {
            backoff = next_backoff(backoff);
        }
        prop_assert_eq!(backoff, MAX_BACKOFF);
    }
}
