//! Tokio bindings for calculation rounds and notification lanes.
//!
//! # Blocking Lock Usage
//!
//! Uses `parking_lot::Mutex` for JoinHandle storage because:
//! 1. Operations are O(1) push, an occasional retain, or a drain on shutdown
//! 2. Lock is never held across `.await` points
//! 3. No I/O or async work inside lock scope

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use rill_core::{CancellationToken, DispatchJob, Dispatcher, RillError, TaskSpawner};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

/// Finished handles are pruned once the list grows past this length.
const PRUNE_THRESHOLD: usize = 64;

/// Tracks the round and timer tasks spawned for a property factory and
/// cancels whatever is still pending on shutdown.
#[derive(Debug)]
pub struct TaskRegistry {
    handle: Handle,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskRegistry {
    /// Bind to the Tokio runtime of the calling context.
    pub fn current() -> Result<Self, RillError> {
        let handle = Handle::try_current().map_err(|e| {
            RillError::no_runtime(format!("calculated properties need a Tokio runtime: {e}"))
        })?;
        Ok(Self::from_handle(handle))
    }

    /// Bind to an explicit runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        let (shutdown_tx, _shutdown_rx) = watch::channel(false);
        Self {
            handle,
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// The runtime tasks are spawned on.
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn a task that is dropped when the registry shuts down.
    ///
    /// Fails without spawning once the registry has shut down.
    pub fn spawn_cancellable<F>(&self, fut: F) -> Result<(), RillError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        if *shutdown_rx.borrow() {
            return Err(RillError::disposed("task registry has been shut down"));
        }
        let handle = self.handle.spawn(async move {
            tokio::select! {
                _ = shutdown_rx.changed() => {}
                _ = fut => {}
            }
        });
        self.track(handle);
        Ok(())
    }

    /// Cancel every pending task. Later spawns fail.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }

    /// True once [`shutdown`](Self::shutdown) has been called.
    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    /// Number of tracked tasks that have not finished yet.
    pub fn pending_tasks(&self) -> usize {
        self.handles
            .lock()
            .iter()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut handles = self.handles.lock();
        if handles.len() >= PRUNE_THRESHOLD {
            handles.retain(|h| !h.is_finished());
        }
        handles.push(handle);
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
        for handle in self.handles.lock().drain(..) {
            handle.abort();
        }
    }
}

impl TaskSpawner for TaskRegistry {
    fn spawn_cancellable(
        &self,
        fut: BoxFuture<'static, ()>,
        token: Arc<dyn CancellationToken>,
    ) -> Result<(), RillError> {
        if token.is_cancelled() {
            tracing::trace!("owner already cancelled, task not spawned");
            return Ok(());
        }
        TaskRegistry::spawn_cancellable(self, async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = fut => {}
            }
        })
    }
}

/// Notification lane that runs jobs one at a time on a dedicated Tokio task.
///
/// Jobs run in submission order. A panicking observer is logged and does not
/// stop the lane.
#[derive(Debug, Clone)]
pub struct SerialDispatcher {
    job_tx: mpsc::UnboundedSender<DispatchJob>,
}

impl SerialDispatcher {
    /// Start the lane's worker task on `handle`.
    pub fn spawn(handle: &Handle) -> Self {
        let (job_tx, mut job_rx) = mpsc::unbounded_channel::<DispatchJob>();
        handle.spawn(async move {
            while let Some(job) = job_rx.recv().await {
                if std::panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::warn!("observer panicked on serial notification lane");
                }
            }
            tracing::trace!("serial notification lane closed");
        });
        Self { job_tx }
    }

    /// Start the lane on the Tokio runtime of the calling context.
    pub fn current() -> Result<Self, RillError> {
        let handle = Handle::try_current().map_err(|e| {
            RillError::no_runtime(format!("serial notification lane needs a Tokio runtime: {e}"))
        })?;
        Ok(Self::spawn(&handle))
    }
}

impl Dispatcher for SerialDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        if self.job_tx.send(job).is_err() {
            tracing::trace!("serial notification lane closed, dropping notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_current_without_runtime_fails() {
        let err = TaskRegistry::current().unwrap_err();
        assert!(matches!(err, RillError::NoRuntime { .. }));
        assert!(SerialDispatcher::current().is_err());
    }

    #[tokio::test]
    async fn test_spawned_task_runs() {
        let registry = TaskRegistry::current().unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel();
        registry
            .spawn_cancellable(async move {
                let _ = tx.send(7);
            })
            .unwrap();
        assert_eq!(rx.await.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_and_refuses_later_tasks() {
        let registry = TaskRegistry::current().unwrap();
        let ran = Arc::new(AtomicUsize::new(0));

        let counter = ran.clone();
        registry
            .spawn_cancellable(async move {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        registry.shutdown();
        assert!(registry.is_shut_down());

        let counter = ran.clone();
        let refused = registry.spawn_cancellable(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(matches!(refused, Err(RillError::Disposed { .. })));
        tokio::task::yield_now().await;
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(registry.pending_tasks(), 0);
    }

    #[tokio::test]
    async fn test_spawner_drops_task_when_owner_cancels() {
        struct Flag(tokio::sync::watch::Receiver<bool>);

        #[async_trait::async_trait]
        impl CancellationToken for Flag {
            async fn cancelled(&self) {
                let mut flag = self.0.clone();
                let _ = flag.wait_for(|set| *set).await;
            }

            fn is_cancelled(&self) -> bool {
                *self.0.borrow()
            }
        }

        let registry = TaskRegistry::current().unwrap();
        let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
        let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
        let spawner: &dyn TaskSpawner = &registry;
        spawner
            .spawn_cancellable(
                futures::future::pending::<()>().boxed(),
                Arc::new(Flag(cancel_rx.clone())),
            )
            .unwrap();
        cancel_tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(5), async {
            while registry.pending_tasks() > 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        // Already cancelled owners spawn nothing.
        spawner
            .spawn_cancellable(
                async move {
                    let _ = done_tx.send(());
                }
                .boxed(),
                Arc::new(Flag(cancel_rx)),
            )
            .unwrap();
        assert!(done_rx.await.is_err());
        assert_eq!(registry.pending_tasks(), 0);
    }

    #[tokio::test]
    async fn test_serial_dispatcher_preserves_order() {
        let lane = SerialDispatcher::current().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        for i in 0..20 {
            let sink = seen.clone();
            lane.dispatch(Box::new(move || sink.lock().push(i)));
        }
        let (tx, rx) = tokio::sync::oneshot::channel();
        lane.dispatch(Box::new(move || {
            let _ = tx.send(());
        }));
        rx.await.unwrap();
        assert_eq!(*seen.lock(), (0..20).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_serial_dispatcher_survives_panicking_job() {
        let lane = SerialDispatcher::current().unwrap();
        lane.dispatch(Box::new(|| panic!("observer bug")));
        let (tx, rx) = tokio::sync::oneshot::channel();
        lane.dispatch(Box::new(move || {
            let _ = tx.send(());
        }));
        assert!(rx.await.is_ok());
    }
}
