//! CalculatedProperty<T> - a derived, read-only property
//!
//! The public face of a [`Coordinator`](crate::coordinator). It exposes the
//! latest outcome, value, error, and calculating flag, each readable and
//! observable. It never accepts external writes.
//!
//! Dropping the last handle disposes the property. Handles held by other
//! calculated properties (as sources) keep it alive.

use std::fmt;
use std::sync::{Arc, Weak};

use rill_core::{
    CalculationError, Observer, PropertySource, ReadOnlyProperty, Subscription, ValueOrError,
};

use crate::coordinator::{
    Calculation, Coordinator, CoordinatorStats, PublishedState, RoundDriver, RoundOptions,
};
use crate::sources::SourceSet;

/// Disposes the coordinator when the last property handle goes away.
struct DisposeGuard {
    driver: Arc<dyn RoundDriver>,
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        self.driver.dispose();
    }
}

/// A property whose value is computed from other properties.
///
/// Before the first round publishes, the property holds `T::default()` as its
/// value and `ValueOrError::Value(T::default())` as its outcome.
pub struct CalculatedProperty<T> {
    state: PublishedState<T>,
    guard: Arc<DisposeGuard>,
}

impl<T> Clone for CalculatedProperty<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<T: Clone + PartialEq + Default + Send + Sync + 'static> CalculatedProperty<T> {
    pub(crate) fn launch<S: SourceSet>(
        options: RoundOptions,
        sources: S,
        calculation: Calculation<S::Snapshot, T>,
    ) -> Self {
        let coordinator = Coordinator::launch(options, sources, calculation);
        let state = coordinator.state();
        Self {
            state,
            guard: Arc::new(DisposeGuard {
                driver: coordinator,
            }),
        }
    }

    /// The latest successfully calculated value.
    pub fn get(&self) -> T {
        self.state.value.get()
    }

    /// The outcome of the latest published round.
    pub fn latest_outcome(&self) -> ValueOrError<T> {
        self.state.outcome.get()
    }

    /// Same as [`get`](Self::get).
    pub fn latest_value(&self) -> T {
        self.state.value.get()
    }

    /// The error of the latest failed round, if any round has failed.
    ///
    /// A later successful round does not clear it; check
    /// [`latest_outcome`](Self::latest_outcome) for the current state.
    pub fn latest_error(&self) -> Option<CalculationError> {
        self.state.error.get()
    }

    /// True while the current round is running.
    pub fn is_calculating(&self) -> bool {
        self.state.calculating.get()
    }

    /// Observe published values. The observer receives the current value first.
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.state.value.subscribe(observer)
    }

    /// Observe every published outcome, value or error.
    pub fn subscribe_outcomes(
        &self,
        observer: impl Fn(&ValueOrError<T>) + Send + Sync + 'static,
    ) -> Subscription {
        self.state.outcome.subscribe(observer)
    }

    /// Observe published values.
    pub fn subscribe_values(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.subscribe(observer)
    }

    /// Observe published errors.
    ///
    /// The replay on subscribe only happens while the latest outcome is an
    /// error; a failure that a later round has replaced is not replayed.
    pub fn subscribe_errors(
        &self,
        observer: impl Fn(&CalculationError) + Send + Sync + 'static,
    ) -> Subscription {
        self.state.outcome.subscribe(move |outcome| {
            if let ValueOrError::Error(error) = outcome {
                observer(error);
            }
        })
    }

    /// Observe transitions of the calculating flag.
    pub fn subscribe_calculating(
        &self,
        observer: impl Fn(&bool) + Send + Sync + 'static,
    ) -> Subscription {
        self.state.calculating.subscribe_changed(observer)
    }

    /// Read-only view of the outcome, for dependents that must see errors.
    pub fn outcome_property(&self) -> ReadOnlyProperty<ValueOrError<T>> {
        self.state.outcome.read_only()
    }

    /// Read-only view of the latest value.
    pub fn value_property(&self) -> ReadOnlyProperty<T> {
        self.state.value.read_only()
    }

    /// Start a round now, bypassing any debounce window.
    pub fn recalculate(&self) {
        self.guard.driver.recalculate();
    }

    /// Round counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.guard.driver.stats()
    }

    /// Stop recalculating. Releases the source subscriptions and drops the
    /// result of any round still in flight. Idempotent.
    pub fn dispose(&self) {
        self.guard.driver.dispose();
    }

    /// True once the property has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.guard.driver.is_disposed()
    }

    /// Control handle that does not keep the property alive.
    pub(crate) fn driver(&self) -> Weak<dyn RoundDriver> {
        Arc::downgrade(&self.guard.driver)
    }
}

impl<T: Clone + PartialEq + Default + Send + Sync + 'static> PropertySource
    for CalculatedProperty<T>
{
    type Value = T;

    fn get(&self) -> T {
        self.state.value.get()
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        self.state.value.subscribe_observer(observer)
    }
}

impl<T: Clone + PartialEq + Default + Send + Sync + fmt::Debug + 'static> fmt::Debug
    for CalculatedProperty<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculatedProperty")
            .field("outcome", &self.latest_outcome())
            .field("calculating", &self.is_calculating())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
