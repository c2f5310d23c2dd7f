//! Property notifications as a `futures::Stream`.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::Stream;
use rill_core::{PropertySource, Subscription};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Stream of the values a property delivers, starting with its current value.
///
/// Dropping the stream detaches it from the property.
pub struct PropertyStream<T> {
    values: UnboundedReceiverStream<T>,
    _subscription: Subscription,
}

impl<T> Stream for PropertyStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.values).poll_next(cx)
    }
}

/// Turns any property into a stream of its notifications.
pub trait PropertyStreamExt: PropertySource + Sized {
    /// Subscribe and buffer every notification. No values are dropped; a slow
    /// consumer sees every intermediate value.
    fn stream(&self) -> PropertyStream<Self::Value> {
        let (value_tx, value_rx) = mpsc::unbounded_channel();
        let subscription = self.subscribe_observer(Arc::new(move |value: &Self::Value| {
            let _ = value_tx.send(value.clone());
        }));
        PropertyStream {
            values: UnboundedReceiverStream::new(value_rx),
            _subscription: subscription,
        }
    }
}

impl<S: PropertySource> PropertyStreamExt for S {}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use rill_core::ObservableProperty;

    #[tokio::test]
    async fn test_stream_yields_current_then_sets() {
        let p = ObservableProperty::new(1);
        let mut values = p.stream();
        p.set(2);
        p.set(3);
        assert_eq!(values.next().await, Some(1));
        assert_eq!(values.next().await, Some(2));
        assert_eq!(values.next().await, Some(3));
    }

    #[tokio::test]
    async fn test_dropping_stream_detaches() {
        let p = ObservableProperty::new(0);
        let values = p.stream();
        assert_eq!(p.observer_count(), 1);
        drop(values);
        assert_eq!(p.observer_count(), 0);
    }
}
