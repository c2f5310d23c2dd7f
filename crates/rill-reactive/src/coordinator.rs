//! Coordinator - the round state machine behind a calculated property
//!
//! ## Rounds
//!
//! A source change starts a round: the coordinator snapshots the sources,
//! mints a fresh [`CalculationToken`] (which supersedes every earlier round),
//! marks the property as calculating, and runs the calculation. Synchronous
//! calculations complete on the caller's thread. Asynchronous calculations run
//! on the factory's [`TaskSpawner`], optionally after a debounce window.
//!
//! ## Publication
//!
//! A completing round takes the publish lock and compares its token against
//! the current one. Only the current round writes: a value updates the
//! latest value and outcome, an error updates the latest error and outcome.
//! A stale round is dropped with a trace event. Rounds that return the
//! cancellation error are dropped the same way.
//!
//! ## Locking
//!
//! - `publish_lock` is reentrant so an inline observer of a published value may
//!   set one of the sources and run a nested synchronous round.
//! - Token advance and the `calculating = true` write share the publish lock
//!   with completion, so a finishing round never clears the flag of a round
//!   that started after it.
//! - No lock is held while a calculation runs.

use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, ReentrantMutex};
use rill_core::{
    CalculationError, CalculationToken, CancellationToken, Dispatcher, ObservableProperty,
    RillError, Subscription, TaskSpawner, ValueOrError,
};
use tracing::Instrument;

use crate::helper::{AsyncCalculationHelper, DisposalToken, RoundSignal};
use crate::sources::{ChangeCallback, SourceSet};

/// Synchronous calculation body.
pub(crate) type SyncCalculation<S, T> =
    Arc<dyn Fn(S) -> Result<T, CalculationError> + Send + Sync + 'static>;

/// Asynchronous calculation body.
pub(crate) type AsyncCalculation<S, T> = Arc<
    dyn Fn(AsyncCalculationHelper, S) -> BoxFuture<'static, Result<T, CalculationError>>
        + Send
        + Sync
        + 'static,
>;

pub(crate) enum Calculation<S, T> {
    Sync(SyncCalculation<S, T>),
    Async(AsyncCalculation<S, T>),
}

/// Terminal state of one calculation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The round was current at completion and its result was written.
    Published,
    /// A newer round had started; the result was dropped.
    Superseded,
    /// The property was disposed, or the round cancelled itself.
    Discarded,
}

impl fmt::Display for RoundOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoundOutcome::Published => write!(f, "published"),
            RoundOutcome::Superseded => write!(f, "superseded"),
            RoundOutcome::Discarded => write!(f, "discarded"),
        }
    }
}

/// Round counters of one calculated property.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    /// Rounds started, including the initial round.
    pub rounds_started: u64,
    /// Rounds whose result was written.
    pub rounds_published: u64,
    /// Rounds dropped because a newer round had started.
    pub rounds_superseded: u64,
    /// Published rounds that carried an error.
    pub errors_published: u64,
    /// How the most recently completed round ended.
    pub last_outcome: Option<RoundOutcome>,
}

#[derive(Debug, Default)]
struct RoundCounters {
    started: AtomicU64,
    published: AtomicU64,
    superseded: AtomicU64,
    errors: AtomicU64,
    last_outcome: Mutex<Option<RoundOutcome>>,
}

impl RoundCounters {
    fn record(&self, outcome: RoundOutcome) {
        match outcome {
            RoundOutcome::Published => self.published.fetch_add(1, Ordering::Relaxed),
            RoundOutcome::Superseded => self.superseded.fetch_add(1, Ordering::Relaxed),
            RoundOutcome::Discarded => 0,
        };
        *self.last_outcome.lock() = Some(outcome);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            rounds_started: self.started.load(Ordering::Relaxed),
            rounds_published: self.published.load(Ordering::Relaxed),
            rounds_superseded: self.superseded.load(Ordering::Relaxed),
            errors_published: self.errors.load(Ordering::Relaxed),
            last_outcome: *self.last_outcome.lock(),
        }
    }
}

/// The observable state a coordinator publishes into.
pub(crate) struct PublishedState<T> {
    pub(crate) outcome: ObservableProperty<ValueOrError<T>>,
    pub(crate) value: ObservableProperty<T>,
    pub(crate) error: ObservableProperty<Option<CalculationError>>,
    pub(crate) calculating: ObservableProperty<bool>,
}

impl<T> Clone for PublishedState<T> {
    fn clone(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
            value: self.value.clone(),
            error: self.error.clone(),
            calculating: self.calculating.clone(),
        }
    }
}

impl<T: Clone + PartialEq + Default + Send + Sync + 'static> PublishedState<T> {
    pub(crate) fn new(dispatcher: &Arc<dyn Dispatcher>) -> Self {
        Self {
            outcome: ObservableProperty::with_dispatcher(
                ValueOrError::Value(T::default()),
                Arc::clone(dispatcher),
            ),
            value: ObservableProperty::with_dispatcher(T::default(), Arc::clone(dispatcher)),
            error: ObservableProperty::with_dispatcher(None, Arc::clone(dispatcher)),
            calculating: ObservableProperty::with_dispatcher(false, Arc::clone(dispatcher)),
        }
    }
}

/// Construction parameters shared by every calculated property a factory builds.
pub(crate) struct RoundOptions {
    pub(crate) name: Arc<str>,
    pub(crate) debounce: Duration,
    pub(crate) trace_rounds: bool,
    pub(crate) spawner: Option<Arc<dyn TaskSpawner>>,
    pub(crate) dispatcher: Arc<dyn Dispatcher>,
}

/// Type-erased control surface of a coordinator.
pub(crate) trait RoundDriver: Send + Sync {
    fn recalculate(&self);
    fn dispose(&self);
    fn is_disposed(&self) -> bool;
    fn stats(&self) -> CoordinatorStats;
}

pub(crate) struct Coordinator<S: SourceSet, T> {
    this: Weak<Self>,
    name: Arc<str>,
    sources: S,
    calculation: Calculation<S::Snapshot, T>,
    debounce: Duration,
    debounce_epoch: AtomicU64,
    signal: Arc<RoundSignal>,
    publish_lock: ReentrantMutex<()>,
    state: PublishedState<T>,
    spawner: Option<Arc<dyn TaskSpawner>>,
    counters: RoundCounters,
    subscriptions: Mutex<Vec<Subscription>>,
    trace_rounds: bool,
}

impl<S, T> Coordinator<S, T>
where
    S: SourceSet,
    T: Clone + PartialEq + Default + Send + Sync + 'static,
{
    /// Build the coordinator, attach it to its sources, and start the initial round.
    pub(crate) fn launch(
        options: RoundOptions,
        sources: S,
        calculation: Calculation<S::Snapshot, T>,
    ) -> Arc<Self> {
        let state = PublishedState::new(&options.dispatcher);
        let coordinator = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            name: options.name,
            sources,
            calculation,
            debounce: options.debounce,
            debounce_epoch: AtomicU64::new(0),
            signal: Arc::new(RoundSignal::new()),
            publish_lock: ReentrantMutex::new(()),
            state,
            spawner: options.spawner,
            counters: RoundCounters::default(),
            subscriptions: Mutex::new(Vec::new()),
            trace_rounds: options.trace_rounds,
        });

        let weak = Arc::downgrade(&coordinator);
        let on_change: ChangeCallback = Arc::new(move || {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.on_source_changed();
            }
        });
        let subscriptions = coordinator.sources.subscribe_changes(&on_change);
        *coordinator.subscriptions.lock() = subscriptions;

        coordinator.start_round();
        coordinator
    }

    /// Handles to the published state.
    pub(crate) fn state(&self) -> PublishedState<T> {
        self.state.clone()
    }

    fn on_source_changed(&self) {
        if self.signal.is_disposed() {
            return;
        }
        if self.debounce.is_zero() || matches!(self.calculation, Calculation::Sync(_)) {
            self.start_round();
            return;
        }

        let Some(spawner) = &self.spawner else {
            self.start_round();
            return;
        };
        let epoch = {
            let _publish = self.publish_lock.lock();
            self.debounce_epoch.fetch_add(1, Ordering::AcqRel) + 1
        };
        let weak = self.this.clone();
        let delay = self.debounce;
        let timer = async move {
            tokio::time::sleep(delay).await;
            if let Some(coordinator) = weak.upgrade() {
                coordinator.start_debounced_round(epoch);
            }
        };
        if let Err(error) = spawner.spawn_cancellable(timer.boxed(), self.disposal_token()) {
            self.abandon(error);
        }
    }

    /// Start a round only if no source changed since the timer for `epoch`
    /// was armed. The check and the snapshot share the publish lock with the
    /// epoch bump in [`on_source_changed`](Self::on_source_changed).
    fn start_debounced_round(&self, epoch: u64) {
        self.start_round_if(|| self.debounce_epoch.load(Ordering::Acquire) == epoch);
    }

    /// The spawner refused work, so no round of this property can ever
    /// publish again.
    fn abandon(&self, error: RillError) {
        tracing::debug!(property = %self.name, %error, "task spawner unavailable, disposing");
        RoundDriver::dispose(self);
    }

    fn disposal_token(&self) -> Arc<dyn CancellationToken> {
        Arc::new(DisposalToken::new(Arc::clone(&self.signal)))
    }

    fn start_round(&self) {
        self.start_round_if(|| true);
    }

    fn start_round_if(&self, wanted: impl FnOnce() -> bool) {
        let (token, snapshot) = {
            let _publish = self.publish_lock.lock();
            if self.signal.is_disposed() || !wanted() {
                return;
            }
            let snapshot = self.sources.snapshot();
            let token = self.signal.advance();
            self.counters.started.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(property = %self.name, round = token.value(), "calculation round started");
            self.state.calculating.set(true);
            (token, snapshot)
        };

        match &self.calculation {
            Calculation::Sync(calculate) => {
                let result = std::panic::catch_unwind(AssertUnwindSafe(|| calculate(snapshot)))
                    .unwrap_or_else(|payload| Err(self.panicked(token, payload)));
                self.complete(token, result);
            }
            Calculation::Async(calculate) => {
                let helper = AsyncCalculationHelper::new(token, Arc::clone(&self.signal));
                let future =
                    match std::panic::catch_unwind(AssertUnwindSafe(|| calculate(helper, snapshot))) {
                        Ok(future) => future,
                        Err(payload) => {
                            let error = self.panicked(token, payload);
                            self.complete(token, Err(error));
                            return;
                        }
                    };
                self.spawn_round(token, future);
            }
        }
    }

    fn spawn_round(
        &self,
        token: CalculationToken,
        future: BoxFuture<'static, Result<T, CalculationError>>,
    ) {
        let (Some(spawner), Some(coordinator)) = (&self.spawner, self.this.upgrade()) else {
            self.complete(
                token,
                Err(CalculationError::failed("no task spawner for asynchronous calculation")),
            );
            return;
        };

        let round = async move {
            let result = match AssertUnwindSafe(future).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => Err(coordinator.panicked(token, payload)),
            };
            coordinator.complete(token, result);
        };
        let span = if self.trace_rounds {
            tracing::debug_span!("rill.round", property = %self.name, round = token.value())
        } else {
            tracing::Span::none()
        };
        if let Err(error) =
            spawner.spawn_cancellable(round.instrument(span).boxed(), self.disposal_token())
        {
            self.abandon(error);
            self.complete(token, Err(CalculationError::cancelled()));
        }
    }

    fn panicked(
        &self,
        token: CalculationToken,
        payload: Box<dyn std::any::Any + Send>,
    ) -> CalculationError {
        let error = CalculationError::panicked(payload);
        tracing::warn!(
            property = %self.name,
            round = token.value(),
            error = %error,
            "calculation panicked"
        );
        error
    }

    /// Publish the result of round `token` if it is still current.
    fn complete(
        &self,
        token: CalculationToken,
        result: Result<T, CalculationError>,
    ) -> RoundOutcome {
        let _publish = self.publish_lock.lock();
        let outcome = self.publish(token, result);
        self.counters.record(outcome);
        match outcome {
            RoundOutcome::Published => {
                tracing::debug!(property = %self.name, round = token.value(), "calculation round published");
            }
            RoundOutcome::Superseded | RoundOutcome::Discarded => {
                tracing::trace!(property = %self.name, round = token.value(), %outcome, "calculation round dropped");
            }
        }
        outcome
    }

    fn publish(&self, token: CalculationToken, result: Result<T, CalculationError>) -> RoundOutcome {
        if self.signal.is_disposed() {
            return RoundOutcome::Discarded;
        }
        // Inline observers of each write below may start a nested round, so
        // currency is re-checked before every write.
        let current = || self.signal.is_current(token);
        if !current() {
            return RoundOutcome::Superseded;
        }

        match result {
            Err(error) if error.is_cancelled() => {
                self.state.calculating.set(false);
                return RoundOutcome::Discarded;
            }
            Ok(value) => {
                self.state.value.set(value.clone());
                if !current() {
                    return RoundOutcome::Superseded;
                }
                self.state.outcome.set(ValueOrError::Value(value));
            }
            Err(error) => {
                self.counters.errors.fetch_add(1, Ordering::Relaxed);
                self.state.error.set(Some(error.clone()));
                if !current() {
                    return RoundOutcome::Superseded;
                }
                self.state.outcome.set(ValueOrError::Error(error));
            }
        }
        if current() {
            self.state.calculating.set(false);
        }
        RoundOutcome::Published
    }
}

impl<S, T> RoundDriver for Coordinator<S, T>
where
    S: SourceSet,
    T: Clone + PartialEq + Default + Send + Sync + 'static,
{
    fn recalculate(&self) {
        self.debounce_epoch.fetch_add(1, Ordering::AcqRel);
        self.start_round();
    }

    fn dispose(&self) {
        let _publish = self.publish_lock.lock();
        if !self.signal.dispose() {
            return;
        }
        let subscriptions = std::mem::take(&mut *self.subscriptions.lock());
        drop(subscriptions);
        self.state.calculating.set(false);
        tracing::debug!(property = %self.name, "calculated property disposed");
    }

    fn is_disposed(&self) -> bool {
        self.signal.is_disposed()
    }

    fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }
}
