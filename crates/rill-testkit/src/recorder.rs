//! Observer that records every notification it receives.

use std::sync::Arc;

use parking_lot::Mutex;
use rill_core::{PropertySource, Subscription};

/// Records the values delivered to it, in delivery order.
///
/// Cloning yields another handle to the same log.
#[derive(Debug)]
pub struct Recorder<T> {
    values: Arc<Mutex<Vec<T>>>,
    subscription: Option<Arc<Subscription>>,
}

impl<T> Clone for Recorder<T> {
    fn clone(&self) -> Self {
        Self {
            values: Arc::clone(&self.values),
            subscription: self.subscription.clone(),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for Recorder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> Recorder<T> {
    /// A detached recorder; feed it through [`observer`](Self::observer).
    pub fn new() -> Self {
        Self {
            values: Arc::new(Mutex::new(Vec::new())),
            subscription: None,
        }
    }

    /// Subscribe a new recorder to `source`. Recording stops when the last
    /// clone of the recorder is dropped.
    pub fn attach<S>(source: &S) -> Self
    where
        S: PropertySource<Value = T>,
    {
        let recorder = Self::new();
        let subscription = source.subscribe_observer(Arc::new(recorder.observer()));
        Self {
            subscription: Some(Arc::new(subscription)),
            ..recorder
        }
    }

    /// An observer callback that appends to this recorder.
    pub fn observer(&self) -> impl Fn(&T) + Send + Sync + 'static {
        let values = Arc::clone(&self.values);
        move |value: &T| values.lock().push(value.clone())
    }

    /// Everything recorded so far.
    pub fn values(&self) -> Vec<T> {
        self.values.lock().clone()
    }

    /// The most recent value.
    pub fn last(&self) -> Option<T> {
        self.values.lock().last().cloned()
    }

    /// Number of recorded values.
    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    /// True if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// Forget everything recorded so far.
    pub fn clear(&self) {
        self.values.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::ObservableProperty;

    #[test]
    fn test_attach_records_replay_and_sets() {
        let p = ObservableProperty::new('a');
        let recorder = Recorder::attach(&p);
        p.set('b');
        assert_eq!(recorder.values(), vec!['a', 'b']);
        assert_eq!(recorder.last(), Some('b'));

        recorder.clear();
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_dropping_recorder_detaches() {
        let p = ObservableProperty::new(0);
        let recorder = Recorder::attach(&p);
        drop(recorder);
        assert_eq!(p.observer_count(), 0);
    }
}
