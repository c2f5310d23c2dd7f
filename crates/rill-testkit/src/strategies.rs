//! Property test strategies for Rill inputs
//!
//! Strategies here describe bursts of input edits: the shapes that exercise
//! supersession and debounce in calculated properties.

use std::time::Duration;

use proptest::prelude::*;

// Re-export proptest for convenience
pub use proptest;

/// Short lowercase strings, like keystrokes in a text field.
pub fn arb_text() -> impl Strategy<Value = String> {
    "[a-z]{0,8}"
}

/// A burst of text edits, each with the pause that follows it.
pub fn arb_edit_burst(max_len: usize) -> impl Strategy<Value = Vec<(String, Duration)>> {
    prop::collection::vec((arb_text(), arb_pause()), 1..=max_len)
}

/// Pause between two edits, from back-to-back up to 200ms.
pub fn arb_pause() -> impl Strategy<Value = Duration> {
    (0u64..200).prop_map(Duration::from_millis)
}

/// Per-round calculation delays, so rounds can finish out of start order.
pub fn arb_round_delays(rounds: usize) -> impl Strategy<Value = Vec<Duration>> {
    prop::collection::vec((1u64..500).prop_map(Duration::from_millis), rounds)
}
