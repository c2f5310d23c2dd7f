//! AsyncCalculationHelper - cooperative cancellation for one calculation round
//!
//! Every asynchronous round receives a helper bound to the round's
//! [`CalculationToken`]. The helper answers one question: is this round still
//! the one whose result will be published? Calculations ask at their own
//! suspension points and bail out early with the cancellation error.
//!
//! ```rust,ignore
//! factory.create_async_calculated_property(text.clone(), None, |helper, text| async move {
//!     for chunk in text.split(' ') {
//!         helper.checkpoint().await?;
//!         expensive(chunk).await;
//!     }
//!     Ok::<_, CalculationError>(text.len())
//! })?;
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rill_core::{CalculationError, CalculationToken, CancellationToken, TokenGenerator};
use tokio::sync::watch;

/// Shared round state of one coordinator: the generation counter, the
/// disposal flag, and a wake-up channel for helpers waiting on cancellation.
#[derive(Debug)]
pub(crate) struct RoundSignal {
    generation: TokenGenerator,
    disposed: AtomicBool,
    wake_tx: watch::Sender<CalculationToken>,
}

impl RoundSignal {
    pub(crate) fn new() -> Self {
        let (wake_tx, _wake_rx) = watch::channel(CalculationToken::INITIAL);
        Self {
            generation: TokenGenerator::new(),
            disposed: AtomicBool::new(false),
            wake_tx,
        }
    }

    /// Mint the next token and wake every helper of older rounds.
    pub(crate) fn advance(&self) -> CalculationToken {
        let token = self.generation.advance();
        self.wake_tx.send_replace(token);
        token
    }

    /// Returns false if the signal was already disposed.
    pub(crate) fn dispose(&self) -> bool {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.wake_tx.send_replace(self.current());
        true
    }

    pub(crate) fn current(&self) -> CalculationToken {
        self.generation.current()
    }

    pub(crate) fn is_current(&self, token: CalculationToken) -> bool {
        self.generation.is_current(token)
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    async fn wait_until(&self, done: impl Fn() -> bool) {
        let mut wake_rx = self.wake_tx.subscribe();
        loop {
            if done() {
                return;
            }
            if wake_rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Handle passed to every asynchronous calculation round.
///
/// Cheap to clone; clones observe the same round.
#[derive(Debug, Clone)]
pub struct AsyncCalculationHelper {
    token: CalculationToken,
    signal: Arc<RoundSignal>,
}

impl AsyncCalculationHelper {
    pub(crate) fn new(token: CalculationToken, signal: Arc<RoundSignal>) -> Self {
        Self { token, signal }
    }

    /// The token of the round this helper belongs to.
    pub fn token(&self) -> CalculationToken {
        self.token
    }

    /// True once a newer round has started or the property was disposed.
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_disposed() || !self.signal.is_current(self.token)
    }

    /// Fail with the cancellation error if this round has been superseded.
    ///
    /// Meant for `?` propagation: a round that returns the cancellation error
    /// is discarded without publishing anything.
    pub fn ensure_current(&self) -> Result<(), CalculationError> {
        if self.is_cancelled() {
            Err(CalculationError::cancelled())
        } else {
            Ok(())
        }
    }

    /// Yield to the scheduler, then check for supersession.
    pub async fn checkpoint(&self) -> Result<(), CalculationError> {
        tokio::task::yield_now().await;
        self.ensure_current()
    }

    /// Sleep for `duration`, returning early with the cancellation error if the
    /// round is superseded in the meantime.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CalculationError> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => self.ensure_current(),
            _ = self.cancelled() => Err(CalculationError::cancelled()),
        }
    }

    /// Resolves when this round is superseded or the property is disposed.
    pub async fn cancelled(&self) {
        self.signal.wait_until(|| self.is_cancelled()).await;
    }
}

#[async_trait]
impl CancellationToken for AsyncCalculationHelper {
    async fn cancelled(&self) {
        AsyncCalculationHelper::cancelled(self).await;
    }

    fn is_cancelled(&self) -> bool {
        AsyncCalculationHelper::is_cancelled(self)
    }
}

/// Fires when the owning property is disposed. Guards debounce timers and
/// in-flight rounds.
#[derive(Debug, Clone)]
pub(crate) struct DisposalToken {
    signal: Arc<RoundSignal>,
}

impl DisposalToken {
    pub(crate) fn new(signal: Arc<RoundSignal>) -> Self {
        Self { signal }
    }
}

#[async_trait]
impl CancellationToken for DisposalToken {
    async fn cancelled(&self) {
        let signal = &self.signal;
        signal.wait_until(|| signal.is_disposed()).await;
    }

    fn is_cancelled(&self) -> bool {
        self.signal.is_disposed()
    }
}
