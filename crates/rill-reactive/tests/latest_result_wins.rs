//! Property tests for supersession and debounce under arbitrary timing.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use rill_core::CalculationError;
use rill_reactive::PropertyFactory;
use rill_testkit::strategies::{arb_edit_burst, arb_round_delays};
use rill_testkit::Recorder;

const DEBOUNCE: Duration = Duration::from_millis(100);

fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever order rounds finish in, published values only move forward
    /// and the property settles on the last input.
    #[test]
    fn rapid_changes_settle_on_last_round(
        delays in (1usize..8).prop_flat_map(arb_round_delays)
    ) {
        let rounds = delays.len();
        let delays = Arc::new(delays);
        paused_runtime().block_on(async move {
            let factory = PropertyFactory::new().unwrap();
            let input = factory.create_property(0usize);
            let round_delays = Arc::clone(&delays);
            let latest = factory
                .create_async_calculated_property(input.clone(), None, move |_helper, index: usize| {
                    let delay = round_delays[index];
                    async move {
                        tokio::time::sleep(delay).await;
                        Ok::<_, CalculationError>(index)
                    }
                })
                .unwrap();
            let published = Recorder::attach(&latest);

            for index in 1..rounds {
                input.set(index);
            }
            tokio::time::sleep(Duration::from_secs(1)).await;

            let values = published.values();
            prop_assert_eq!(latest.get(), rounds - 1);
            prop_assert!(values.windows(2).all(|pair| pair[0] <= pair[1]));

            let stats = latest.stats();
            prop_assert_eq!(stats.rounds_started, rounds as u64);
            prop_assert!(stats.rounds_published <= rounds as u64);
            prop_assert_eq!(stats.rounds_published + stats.rounds_superseded, stats.rounds_started);
            prop_assert!(!latest.is_calculating());
            Ok(())
        })?;
    }

    /// Only edits followed by a quiet period longer than the debounce window
    /// start a round.
    #[test]
    fn debounce_collapses_bursts(burst in arb_edit_burst(12)) {
        prop_assume!(burst.iter().all(|(_, pause)| *pause != DEBOUNCE));
        paused_runtime().block_on(async move {
            let factory = PropertyFactory::new().unwrap();
            let text = factory.create_property(String::new());
            let echoed = factory
                .create_async_calculated_property(text.clone(), Some(DEBOUNCE), |_helper, text: String| async move {
                    Ok::<_, CalculationError>(text)
                })
                .unwrap();
            tokio::time::sleep(Duration::from_millis(1)).await;

            for (edit, pause) in &burst {
                text.set(edit.clone());
                tokio::time::sleep(*pause).await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;

            let quiet_gaps = burst[..burst.len() - 1]
                .iter()
                .filter(|(_, pause)| *pause > DEBOUNCE)
                .count() as u64;
            let last = burst.last().map(|(edit, _)| edit.clone()).unwrap();
            prop_assert_eq!(echoed.get(), last);
            prop_assert_eq!(echoed.stats().rounds_started, 2 + quiet_gaps);
            Ok(())
        })?;
    }
}
