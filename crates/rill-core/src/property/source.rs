//! The read/observe contract shared by every property kind.

use std::sync::Arc;

use super::Subscription;

/// Shared observer callback.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

/// Anything that can be read and observed: observable properties, read-only
/// views, and calculated properties.
///
/// `subscribe_observer` must deliver the current value to the observer before
/// any later value ("latest value on subscribe").
pub trait PropertySource: Send + Sync + 'static {
    /// The value type carried by the source.
    type Value: Clone + Send + Sync + 'static;

    /// Current value.
    fn get(&self) -> Self::Value;

    /// Attach an observer; it is called with the current value, then with
    /// every later value, until the returned subscription is disposed.
    fn subscribe_observer(&self, observer: Observer<Self::Value>) -> Subscription;
}
