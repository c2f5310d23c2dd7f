//! RAII subscription handles.

use std::fmt;

type Release = Box<dyn FnOnce() + Send + Sync + 'static>;

/// Disposer returned by every `subscribe` call.
///
/// Dropping the handle, or calling [`dispose`](Subscription::dispose),
/// permanently detaches the observer. An observer that is detached while a
/// notification is queued for it does not receive that notification.
#[must_use = "dropping a Subscription detaches the observer immediately"]
pub struct Subscription {
    release: Option<Release>,
}

impl Subscription {
    /// Build a subscription that runs `release` once when disposed.
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release, for sources that never change.
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Combine several subscriptions into one handle that releases all of them.
    pub fn merge(subscriptions: Vec<Subscription>) -> Self {
        if subscriptions.is_empty() {
            return Self::empty();
        }
        Self::new(move || drop(subscriptions))
    }

    /// Detach the observer now.
    pub fn dispose(mut self) {
        self.release_now();
    }

    /// True until the subscription has been disposed.
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> Subscription {
        let counter = counter.clone();
        Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_dispose_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let sub = counting(&released);
        assert!(sub.is_active());
        sub.dispose();
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_releases() {
        let released = Arc::new(AtomicUsize::new(0));
        {
            let _sub = counting(&released);
        }
        assert_eq!(released.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_merge_releases_all() {
        let released = Arc::new(AtomicUsize::new(0));
        let merged = Subscription::merge(vec![counting(&released), counting(&released)]);
        assert_eq!(released.load(Ordering::SeqCst), 0);
        merged.dispose();
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_empty_is_inactive() {
        assert!(!Subscription::empty().is_active());
        assert!(!Subscription::merge(Vec::new()).is_active());
    }
}
