//! ObservableProperty<T> - a mutable cell with push notifications
//!
//! `ObservableProperty<T>` holds the current value of an input to the dataflow
//! graph. Every `set` emits a *set* notification; sets that change the value
//! (by `PartialEq`) additionally emit a *changed* notification.
//!
//! # Notification Lane
//!
//! Emissions go through the property's [`Dispatcher`]. The inline dispatcher
//! delivers synchronously in the caller's context, under a reentrant emit lock,
//! so a subscriber may set the same property from its callback. Such a nested
//! set stores its value at once but its emission is queued behind the one
//! being delivered, so every subscriber sees the property's emissions in set
//! order and the last value delivered is the stored value. Any other thread
//! setting the property at the same time waits until delivery of the current
//! emission has started on the lane.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use super::observers::{ObserverList, Target};
use super::{
    DispatchJob, Dispatcher, InlineDispatcher, Observer, PropertySource, ReadOnlyProperty,
    Subscription,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Channel {
    Set,
    Changed,
}

/// Emissions waiting for the lane. Only the thread holding the emit lock
/// touches it.
#[derive(Default)]
struct EmitQueue {
    draining: bool,
    pending: VecDeque<DispatchJob>,
}

/// Clears `draining` even if an inline observer unwinds, so later sets still
/// deliver.
struct DrainGuard<'a>(&'a RefCell<EmitQueue>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.borrow_mut().draining = false;
    }
}

/// Shared state of an observable property.
struct PropertyInner<T> {
    /// The current value.
    value: RwLock<T>,
    /// Number of sets since construction.
    version: AtomicU64,
    /// Observers of every set.
    set_observers: Mutex<ObserverList<T>>,
    /// Observers of value-changing sets only.
    changed_observers: Mutex<ObserverList<T>>,
    /// Serializes value writes with the dispatch of their notifications.
    emit_lock: ReentrantMutex<RefCell<EmitQueue>>,
    /// Notification lane.
    dispatcher: Arc<dyn Dispatcher>,
}

impl<T> PropertyInner<T> {
    fn observers(&self, channel: Channel) -> &Mutex<ObserverList<T>> {
        match channel {
            Channel::Set => &self.set_observers,
            Channel::Changed => &self.changed_observers,
        }
    }

    /// Queue `job` and, unless an outer call on this thread is already
    /// draining, hand queued jobs to the lane in order. Caller holds the emit
    /// lock.
    fn emit(&self, queue: &RefCell<EmitQueue>, job: DispatchJob) {
        {
            let mut queue = queue.borrow_mut();
            queue.pending.push_back(job);
            if queue.draining {
                return;
            }
            queue.draining = true;
        }
        let _guard = DrainGuard(queue);
        loop {
            let next = queue.borrow_mut().pending.pop_front();
            match next {
                Some(job) => self.dispatcher.dispatch(job),
                None => break,
            }
        }
    }
}

/// A mutable, observable value.
///
/// Cloning an `ObservableProperty` creates a new handle to the **same** cell.
///
/// # Example
///
/// ```rust
/// use std::sync::{Arc, Mutex};
/// use rill_core::ObservableProperty;
///
/// let text = ObservableProperty::new(String::from("abc"));
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = seen.clone();
/// let _sub = text.subscribe(move |v: &String| sink.lock().unwrap().push(v.clone()));
///
/// text.set("abcd".to_string());
/// assert_eq!(*seen.lock().unwrap(), vec!["abc".to_string(), "abcd".to_string()]);
/// ```
pub struct ObservableProperty<T> {
    inner: Arc<PropertyInner<T>>,
}

impl<T> Clone for ObservableProperty<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> ObservableProperty<T> {
    /// Create a property with inline notification delivery.
    pub fn new(value: T) -> Self {
        Self::with_dispatcher(value, Arc::new(InlineDispatcher))
    }

    /// Create a property that delivers notifications through `dispatcher`.
    pub fn with_dispatcher(value: T, dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                value: RwLock::new(value),
                version: AtomicU64::new(0),
                set_observers: Mutex::new(ObserverList::new()),
                changed_observers: Mutex::new(ObserverList::new()),
                emit_lock: ReentrantMutex::new(RefCell::new(EmitQueue::default())),
                dispatcher,
            }),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Borrow the current value for the duration of `f`.
    ///
    /// Do not call `set` on this property from inside `f`.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.value.read())
    }

    /// Number of sets since construction.
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::Acquire)
    }

    /// Replace the value and notify.
    ///
    /// Set-subscribers are always notified. Changed-subscribers are notified
    /// only if `value` differs from the previous value.
    pub fn set(&self, value: T) {
        let emit = self.inner.emit_lock.lock();

        let changed = {
            let mut current = self.inner.value.write();
            let changed = *current != value;
            *current = value.clone();
            changed
        };
        self.inner.version.fetch_add(1, Ordering::AcqRel);

        let set_targets = self.inner.set_observers.lock().targets();
        let changed_targets = if changed {
            self.inner.changed_observers.lock().targets()
        } else {
            Vec::new()
        };
        if set_targets.is_empty() && changed_targets.is_empty() {
            return;
        }

        self.inner.emit(
            &emit,
            Box::new(move || {
                for target in &set_targets {
                    target.deliver(&value);
                }
                for target in &changed_targets {
                    target.deliver(&value);
                }
            }),
        );
    }

    /// Read-modify-write convenience.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let _emit = self.inner.emit_lock.lock();
        let next = self.with(f);
        self.set(next);
    }

    /// Observe every set. The observer receives the current value first.
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.attach(Channel::Set, Arc::new(observer))
    }

    /// Observe value-changing sets only. The observer receives the current
    /// value first.
    pub fn subscribe_changed(
        &self,
        observer: impl Fn(&T) + Send + Sync + 'static,
    ) -> Subscription {
        self.attach(Channel::Changed, Arc::new(observer))
    }

    /// A view of this property without write access.
    pub fn read_only(&self) -> ReadOnlyProperty<T> {
        ReadOnlyProperty::new(self.clone())
    }

    /// Number of attached observers across both channels.
    pub fn observer_count(&self) -> usize {
        self.inner.set_observers.lock().len() + self.inner.changed_observers.lock().len()
    }

    /// The notification lane of this property.
    pub fn dispatcher(&self) -> &Arc<dyn Dispatcher> {
        &self.inner.dispatcher
    }

    fn attach(&self, channel: Channel, observer: Observer<T>) -> Subscription {
        // Registration and the replay of the current value share the emit lock
        // so the replay lands on the lane before any later set.
        let emit = self.inner.emit_lock.lock();

        let (id, active) = self.inner.observers(channel).lock().add(observer.clone());
        let replay = Target::new(active.clone(), observer);
        let current = self.get();
        self.inner
            .emit(&emit, Box::new(move || replay.deliver(&current)));

        let weak: Weak<PropertyInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            active.store(false, Ordering::Release);
            if let Some(inner) = weak.upgrade() {
                inner.observers(channel).lock().remove(id);
            }
        })
    }
}

impl<T: Clone + PartialEq + Send + Sync + 'static> PropertySource for ObservableProperty<T> {
    type Value = T;

    fn get(&self) -> T {
        ObservableProperty::get(self)
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        self.attach(Channel::Set, observer)
    }
}

impl<T: Clone + PartialEq + Default + Send + Sync + 'static> Default for ObservableProperty<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + PartialEq + Send + Sync + fmt::Debug + 'static> fmt::Debug
    for ObservableProperty<T>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableProperty")
            .field("value", &self.get())
            .field("version", &self.version())
            .field("observers", &self.observer_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    fn recorder<T: Clone + Send + 'static>() -> (Arc<PlMutex<Vec<T>>>, impl Fn(&T) + Send + Sync) {
        let seen = Arc::new(PlMutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |v: &T| sink.lock().push(v.clone()))
    }

    #[test]
    fn test_new_and_get() {
        let p = ObservableProperty::new(42);
        assert_eq!(p.get(), 42);
        assert_eq!(p.version(), 0);
    }

    #[test]
    fn test_set_updates_value_and_version() {
        let p = ObservableProperty::new(0);
        p.set(5);
        p.set(5);
        assert_eq!(p.get(), 5);
        assert_eq!(p.version(), 2);
    }

    #[test]
    fn test_clone_shares_state() {
        let a = ObservableProperty::new(0);
        let b = a.clone();
        a.set(9);
        assert_eq!(b.get(), 9);
    }

    #[test]
    fn test_subscribe_replays_current_then_sets() {
        let p = ObservableProperty::new(1);
        let (seen, observer) = recorder();
        let _sub = p.subscribe(observer);
        p.set(2);
        p.set(3);
        assert_eq!(*seen.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn test_set_fires_even_when_equal_but_changed_does_not() {
        let p = ObservableProperty::new("a".to_string());
        let (sets, on_set) = recorder();
        let (changes, on_change) = recorder();
        let _s = p.subscribe(on_set);
        let _c = p.subscribe_changed(on_change);

        p.set("a".to_string());
        p.set("b".to_string());
        p.set("b".to_string());

        assert_eq!(*sets.lock(), vec!["a", "a", "b", "b"]);
        assert_eq!(*changes.lock(), vec!["a", "b"]);
    }

    #[test]
    fn test_dispose_detaches() {
        let p = ObservableProperty::new(0);
        let (seen, observer) = recorder();
        let sub = p.subscribe(observer);
        p.set(1);
        sub.dispose();
        p.set(2);
        assert_eq!(*seen.lock(), vec![0, 1]);
        assert_eq!(p.observer_count(), 0);
    }

    #[test]
    fn test_subscriber_attached_late_sees_only_later_sets() {
        let p = ObservableProperty::new(0);
        p.set(1);
        let (seen, observer) = recorder();
        let _sub = p.subscribe(observer);
        p.set(2);
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn test_reentrant_set_from_observer() {
        let p = ObservableProperty::new(0);
        let handle = p.clone();
        let _clamp = p.subscribe(move |v| {
            if *v > 10 {
                handle.set(10);
            }
        });
        let (seen, observer) = recorder();
        let _late = p.subscribe(observer);

        p.set(50);
        assert_eq!(p.get(), 10);
        // The nested set is delivered after the outer one to every observer.
        assert_eq!(*seen.lock(), vec![0, 50, 10]);
    }

    #[test]
    fn test_nested_sets_keep_order_on_changed_channel() {
        let p = ObservableProperty::new(0);
        let handle = p.clone();
        let _countdown = p.subscribe_changed(move |v| {
            if *v > 0 {
                handle.set(v - 1);
            }
        });
        let (changes, observer) = recorder();
        let _changes = p.subscribe_changed(observer);

        p.set(3);
        assert_eq!(p.get(), 0);
        assert_eq!(*changes.lock(), vec![0, 3, 2, 1, 0]);
    }

    #[test]
    fn test_panicking_observer_does_not_wedge_delivery() {
        let p = ObservableProperty::new(0);
        let _bad = p.subscribe(|v| {
            if *v == 1 {
                panic!("observer bug");
            }
        });
        let (seen, observer) = recorder();
        let _good = p.subscribe(observer);

        let unwound = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| p.set(1)));
        assert!(unwound.is_err());
        p.set(2);
        assert_eq!(*seen.lock(), vec![0, 2]);
    }

    #[test]
    fn test_update() {
        let p = ObservableProperty::new(10);
        p.update(|x| x * 2);
        assert_eq!(p.get(), 20);
    }

    #[test]
    fn test_debug_output() {
        let p = ObservableProperty::new(42);
        let text = format!("{p:?}");
        assert!(text.contains("ObservableProperty"));
        assert!(text.contains("42"));
    }

    #[test]
    fn test_custom_dispatcher_receives_every_emission() {
        struct Counting(AtomicU64);
        impl Dispatcher for Counting {
            fn dispatch(&self, job: super::super::DispatchJob) {
                self.0.fetch_add(1, Ordering::SeqCst);
                job();
            }
        }

        let lane = Arc::new(Counting(AtomicU64::new(0)));
        let p = ObservableProperty::with_dispatcher(0, lane.clone());
        let _sub = p.subscribe(|_| {});
        p.set(1);
        p.set(2);
        // One replay plus two sets.
        assert_eq!(lane.0.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_no_dispatch_without_observers() {
        struct Panicking;
        impl Dispatcher for Panicking {
            fn dispatch(&self, _job: super::super::DispatchJob) {
                panic!("nothing should be dispatched");
            }
        }
        let p = ObservableProperty::with_dispatcher(0, Arc::new(Panicking));
        p.set(1);
        assert_eq!(p.get(), 1);
    }
}
