//! Property tests for observable notification ordering and change detection.
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;
use proptest::prelude::*;
use rill_core::{ObservableProperty, ReadOnlyProperty};

fn record<T: Clone + Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(&T) + Send + Sync) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |v: &T| sink.lock().push(v.clone()))
}

proptest! {
    /// A subscriber attached before a sequence of sets sees the initial value
    /// followed by every set value, in order.
    #[test]
    fn subscriber_sees_initial_then_every_set(initial in 0u8..8, sets in prop::collection::vec(0u8..8, 0..40)) {
        let property = ObservableProperty::new(initial);
        let (seen, observer) = record();
        let _sub = property.subscribe(observer);

        for value in &sets {
            property.set(*value);
        }

        let mut expected = vec![initial];
        expected.extend(sets.iter().copied());
        prop_assert_eq!(&*seen.lock(), &expected);
        prop_assert_eq!(property.version(), sets.len() as u64);
    }

    /// Changed notifications never fire for a set equal to the previous value.
    #[test]
    fn changed_skips_equal_consecutive_sets(initial in 0u8..4, sets in prop::collection::vec(0u8..4, 0..40)) {
        let property = ObservableProperty::new(initial);
        let (changes, observer) = record();
        let _sub = property.subscribe_changed(observer);

        for value in &sets {
            property.set(*value);
        }

        let mut expected = vec![initial];
        let mut previous = initial;
        for value in &sets {
            if *value != previous {
                expected.push(*value);
            }
            previous = *value;
        }
        prop_assert_eq!(&*changes.lock(), &expected);
    }

    /// Read-only projections observe exactly what the source observes.
    #[test]
    fn projection_tracks_source(sets in prop::collection::vec(any::<i16>(), 0..20)) {
        let property = ObservableProperty::new(0i16);
        let negated: ReadOnlyProperty<i32> = property.read_only().map(|v| -i32::from(*v));
        let (seen, observer) = record();
        let _sub = negated.subscribe(observer);

        for value in &sets {
            property.set(*value);
        }

        let mut expected = vec![0];
        expected.extend(sets.iter().map(|v| -i32::from(*v)));
        prop_assert_eq!(&*seen.lock(), &expected);
    }
}

#[test]
fn concurrent_setters_deliver_every_set_once() {
    let property = ObservableProperty::new(0u32);
    let (seen, observer) = record();
    let _sub = property.subscribe(observer);

    let writers: Vec<_> = (0..4u32)
        .map(|w| {
            let property = property.clone();
            thread::spawn(move || {
                for i in 0..250u32 {
                    property.set((w + 1) * 1000 + i);
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let seen = seen.lock();
    assert_eq!(seen.len(), 1 + 4 * 250);

    // Each writer's own sets arrive in the order it made them.
    for w in 0..4u32 {
        let mine: Vec<u32> = seen
            .iter()
            .copied()
            .filter(|v| *v / 1000 == w + 1)
            .collect();
        let expected: Vec<u32> = (0..250).map(|i| (w + 1) * 1000 + i).collect();
        assert_eq!(mine, expected);
    }
    // The last delivered value is the stored value.
    assert_eq!(*seen.last().unwrap(), property.get());
}
