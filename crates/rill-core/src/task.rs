//! The seam between calculated properties and an async runtime.
//!
//! Rounds and debounce timers are handed to a [`TaskSpawner`] together with
//! the [`CancellationToken`] of the property that owns them.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;

use crate::errors::Result;

/// Cooperative cancellation signal.
#[async_trait]
pub trait CancellationToken: Send + Sync {
    /// Resolves once cancellation has been requested.
    async fn cancelled(&self);

    /// Non-blocking check.
    fn is_cancelled(&self) -> bool;
}

/// Runs calculation rounds and debounce timers.
pub trait TaskSpawner: Send + Sync {
    /// Run `fut` until it completes or `token` fires, whichever is first.
    ///
    /// Fails with [`RillError::Disposed`](crate::RillError::Disposed) once the
    /// spawner has shut down; `fut` is then dropped without being polled.
    fn spawn_cancellable(
        &self,
        fut: BoxFuture<'static, ()>,
        token: Arc<dyn CancellationToken>,
    ) -> Result<()>;
}
