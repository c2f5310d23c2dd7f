//! Source sets: the fixed inputs a calculated property depends on.
//!
//! A [`SourceSet`] knows how to capture a snapshot of its current values and
//! how to report changes. Single properties and tuples of up to four
//! properties are source sets; `()` is the empty set for calculations that only
//! run once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rill_core::{ObservableProperty, PropertySource, ReadOnlyProperty, Subscription};

use crate::CalculatedProperty;

/// Callback invoked on every source change.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync + 'static>;

/// The inputs of a calculated property.
pub trait SourceSet: Send + Sync + 'static {
    /// Values captured at trigger time and handed to the calculation.
    type Snapshot: Send + 'static;

    /// Capture the current values.
    fn snapshot(&self) -> Self::Snapshot;

    /// Call `on_change` after every set on any source. The replay of the
    /// current value on subscribe is not a change.
    fn subscribe_changes(&self, on_change: &ChangeCallback) -> Vec<Subscription>;
}

fn watch<S: PropertySource>(source: &S, on_change: &ChangeCallback) -> Subscription {
    let primed = AtomicBool::new(false);
    let on_change = Arc::clone(on_change);
    source.subscribe_observer(Arc::new(move |_: &S::Value| {
        if primed.swap(true, Ordering::AcqRel) {
            on_change();
        }
    }))
}

impl SourceSet for () {
    type Snapshot = ();

    fn snapshot(&self) {}

    fn subscribe_changes(&self, _on_change: &ChangeCallback) -> Vec<Subscription> {
        Vec::new()
    }
}

impl<T> SourceSet for ObservableProperty<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    type Snapshot = T;

    fn snapshot(&self) -> T {
        self.get()
    }

    fn subscribe_changes(&self, on_change: &ChangeCallback) -> Vec<Subscription> {
        vec![watch(self, on_change)]
    }
}

impl<T> SourceSet for ReadOnlyProperty<T>
where
    T: Clone + Send + Sync + 'static,
{
    type Snapshot = T;

    fn snapshot(&self) -> T {
        self.get()
    }

    fn subscribe_changes(&self, on_change: &ChangeCallback) -> Vec<Subscription> {
        vec![watch(self, on_change)]
    }
}

impl<T> SourceSet for CalculatedProperty<T>
where
    T: Clone + PartialEq + Default + Send + Sync + 'static,
{
    type Snapshot = T;

    fn snapshot(&self) -> T {
        self.get()
    }

    fn subscribe_changes(&self, on_change: &ChangeCallback) -> Vec<Subscription> {
        vec![watch(self, on_change)]
    }
}

macro_rules! impl_source_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: PropertySource),+> SourceSet for ($($name,)+) {
            type Snapshot = ($($name::Value,)+);

            fn snapshot(&self) -> Self::Snapshot {
                ($(self.$idx.get(),)+)
            }

            fn subscribe_changes(&self, on_change: &ChangeCallback) -> Vec<Subscription> {
                vec![$(watch(&self.$idx, on_change)),+]
            }
        }
    };
}

impl_source_tuple!(A: 0);
impl_source_tuple!(A: 0, B: 1);
impl_source_tuple!(A: 0, B: 1, C: 2);
impl_source_tuple!(A: 0, B: 1, C: 2, D: 3);
