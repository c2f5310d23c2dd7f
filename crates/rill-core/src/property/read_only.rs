//! ReadOnlyProperty<T> - capability-narrowing view over any property source.

use std::fmt;
use std::sync::Arc;

use super::{Observer, PropertySource, Subscription};

/// Read and observe access to a property, without the ability to set it.
///
/// A `ReadOnlyProperty` forwards to the wrapped source; it never copies the
/// value. Cloning creates another view of the same source.
pub struct ReadOnlyProperty<T> {
    source: Arc<dyn PropertySource<Value = T>>,
}

impl<T> Clone for ReadOnlyProperty<T> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> ReadOnlyProperty<T> {
    /// Wrap any property source.
    pub fn new<S>(source: S) -> Self
    where
        S: PropertySource<Value = T>,
    {
        Self {
            source: Arc::new(source),
        }
    }

    /// A source that always holds `value`.
    pub fn constant(value: T) -> Self {
        Self::new(ConstantSource { value })
    }

    /// Current value of the wrapped source.
    pub fn get(&self) -> T {
        self.source.get()
    }

    /// Observe the wrapped source. The observer receives the current value first.
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        self.source.subscribe_observer(Arc::new(observer))
    }

    /// A read-only projection: every read and notification goes through `f`.
    pub fn map<U, F>(&self, f: F) -> ReadOnlyProperty<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        ReadOnlyProperty::new(MappedSource {
            source: self.clone(),
            map: Arc::new(f),
        })
    }
}

impl<T: Clone + Send + Sync + 'static> PropertySource for ReadOnlyProperty<T> {
    type Value = T;

    fn get(&self) -> T {
        self.source.get()
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        self.source.subscribe_observer(observer)
    }
}

impl<T: Clone + Send + Sync + fmt::Debug + 'static> fmt::Debug for ReadOnlyProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyProperty")
            .field("value", &self.get())
            .finish()
    }
}

struct ConstantSource<T> {
    value: T,
}

impl<T: Clone + Send + Sync + 'static> PropertySource for ConstantSource<T> {
    type Value = T;

    fn get(&self) -> T {
        self.value.clone()
    }

    fn subscribe_observer(&self, observer: Observer<T>) -> Subscription {
        observer(&self.value);
        Subscription::empty()
    }
}

struct MappedSource<T, U> {
    source: ReadOnlyProperty<T>,
    map: Arc<dyn Fn(&T) -> U + Send + Sync>,
}

impl<T, U> PropertySource for MappedSource<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    type Value = U;

    fn get(&self) -> U {
        let value = self.source.get();
        (self.map)(&value)
    }

    fn subscribe_observer(&self, observer: Observer<U>) -> Subscription {
        let map = Arc::clone(&self.map);
        self.source.subscribe(move |value| observer(&map(value)))
    }
}
