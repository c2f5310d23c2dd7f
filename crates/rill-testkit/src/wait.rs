//! Await a property reaching a state.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use rill_core::PropertySource;
use tokio::sync::Notify;

/// Failure of [`wait_for`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The predicate did not hold before the deadline.
    #[error("timed out after {waited:?}; last value {last}")]
    Timeout {
        /// How long the wait lasted.
        waited: Duration,
        /// Debug rendering of the last observed value.
        last: String,
    },
}

/// Wait until `predicate` holds for the value of `source`, or `timeout`
/// elapses. Returns the value that satisfied the predicate.
///
/// Works with paused Tokio time: the deadline auto-advances once every task is
/// idle.
pub async fn wait_for<S, P>(source: &S, predicate: P, timeout: Duration) -> Result<S::Value, WaitError>
where
    S: PropertySource,
    S::Value: Debug,
    P: Fn(&S::Value) -> bool,
{
    let notify = Arc::new(Notify::new());
    let _subscription = {
        let notify = Arc::clone(&notify);
        source.subscribe_observer(Arc::new(move |_: &S::Value| notify.notify_one()))
    };

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let value = source.get();
        if predicate(&value) {
            return Ok(value);
        }
        if tokio::time::timeout_at(deadline, notify.notified()).await.is_err() {
            let last = source.get();
            if predicate(&last) {
                return Ok(last);
            }
            return Err(WaitError::Timeout {
                waited: timeout,
                last: format!("{last:?}"),
            });
        }
    }
}

/// Wait until `source` holds exactly `expected`.
pub async fn wait_for_value<S>(source: &S, expected: S::Value, timeout: Duration) -> Result<S::Value, WaitError>
where
    S: PropertySource,
    S::Value: Debug + PartialEq,
{
    wait_for(source, move |value| *value == expected, timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_core::ObservableProperty;

    #[tokio::test]
    async fn test_returns_once_predicate_holds() {
        let p = ObservableProperty::new(0);
        let setter = p.clone();
        tokio::spawn(async move {
            for i in 1..=5 {
                tokio::task::yield_now().await;
                setter.set(i);
            }
        });
        let value = wait_for(&p, |v| *v >= 5, Duration::from_secs(5)).await.unwrap();
        assert_eq!(value, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let p = ObservableProperty::new(1);
        let err = wait_for_value(&p, 2, Duration::from_millis(50)).await.unwrap_err();
        assert!(err.to_string().contains("last value 1"));
    }
}
