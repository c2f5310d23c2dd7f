//! Caller-supplied state shared with every round of a calculation.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

/// State handed to context-carrying calculations, such as a seeded RNG or a
/// client handle.
///
/// Access goes through [`with`](Self::with), which holds a short-lived lock
/// for the duration of the closure. The closure is synchronous, so the lock can
/// never be held across an `.await`.
pub struct CalculationContext<C> {
    inner: Arc<Mutex<C>>,
}

impl<C> Clone for CalculationContext<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Send + 'static> CalculationContext<C> {
    /// Wrap `context` for sharing across rounds.
    pub fn new(context: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(context)),
        }
    }

    /// Run `f` with exclusive access to the context.
    pub fn with<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.inner.lock())
    }
}

impl<C> fmt::Debug for CalculationContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationContext")
            .field("handles", &Arc::strong_count(&self.inner))
            .finish()
    }
}
