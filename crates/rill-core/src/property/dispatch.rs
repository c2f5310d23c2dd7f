//! Notification lanes.
//!
//! Every property owns one [`Dispatcher`]. All set/changed notifications for
//! that property pass through it, in the order the sets happened, so a
//! subscriber never sees two emissions from the same property concurrently or
//! out of order. Different properties may use different dispatchers.

/// A unit of notification work.
pub type DispatchJob = Box<dyn FnOnce() + Send + 'static>;

/// Ordered delivery lane for one or more properties.
pub trait Dispatcher: Send + Sync {
    /// Run or enqueue `job`. Jobs submitted from one thread must run in
    /// submission order.
    fn dispatch(&self, job: DispatchJob);

    /// True if jobs run synchronously inside `dispatch`.
    fn is_inline(&self) -> bool {
        false
    }
}

/// Runs each job immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn dispatch(&self, job: DispatchJob) {
        job();
    }

    fn is_inline(&self) -> bool {
        true
    }
}
