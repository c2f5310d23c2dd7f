//! ValueOrError<T> - the outcome channel for every calculation
//!
//! A calculation never raises into caller code. Whatever it produces, a value
//! or a failure, is wrapped in [`ValueOrError`] and published through the
//! calculated property's outcome stream.
//!
//! [`CalculationError`] is the default error payload. It is cheap to clone and
//! comparable, so outcomes can be stored in observable properties and
//! compared for change detection.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::RillError;

/// Classification of a [`CalculationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalculationErrorKind {
    /// The calculation returned an error.
    Failed,
    /// The calculation panicked.
    Panicked,
    /// The round was superseded or the property disposed. Never published.
    Cancelled,
    /// The calculation rejected an error coming from one of its sources.
    Upstream,
}

impl fmt::Display for CalculationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Failed => "failed",
            Self::Panicked => "panicked",
            Self::Cancelled => "cancelled",
            Self::Upstream => "upstream",
        };
        f.write_str(label)
    }
}

/// Error payload carried in the Error branch of [`ValueOrError`].
///
/// Equality compares the kind and message only; the optional source error is
/// kept for `std::error::Error::source` chaining.
#[derive(Clone)]
pub struct CalculationError {
    kind: CalculationErrorKind,
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync + 'static>>,
}

impl CalculationError {
    /// Create a plain failure with a message.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            kind: CalculationErrorKind::Failed,
            message: message.into(),
            source: None,
        }
    }

    /// Wrap an arbitrary error, keeping it as the source.
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            kind: CalculationErrorKind::Failed,
            message: err.to_string(),
            source: Some(Arc::new(err)),
        }
    }

    /// Build an error from a caught panic payload.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "calculation panicked".to_string()
        };
        Self {
            kind: CalculationErrorKind::Panicked,
            message,
            source: None,
        }
    }

    /// The supersession signal raised by a calculation that noticed its round
    /// is no longer current.
    pub fn cancelled() -> Self {
        Self {
            kind: CalculationErrorKind::Cancelled,
            message: "calculation round superseded".to_string(),
            source: None,
        }
    }

    /// Reject an error observed on an upstream calculated property.
    pub fn upstream(upstream: &CalculationError) -> Self {
        Self {
            kind: CalculationErrorKind::Upstream,
            message: format!("upstream calculation failed: {}", upstream.message),
            source: Some(Arc::new(upstream.clone())),
        }
    }

    /// The error classification.
    pub fn kind(&self) -> CalculationErrorKind {
        self.kind
    }

    /// The human readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// True for the supersession signal.
    pub fn is_cancelled(&self) -> bool {
        self.kind == CalculationErrorKind::Cancelled
    }
}

impl fmt::Debug for CalculationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalculationError")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for CalculationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "calculation {}: {}", self.kind, self.message)
    }
}

impl std::error::Error for CalculationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

impl PartialEq for CalculationError {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.message == other.message
    }
}

impl Eq for CalculationError {}

impl From<String> for CalculationError {
    fn from(message: String) -> Self {
        Self::failed(message)
    }
}

impl From<&str> for CalculationError {
    fn from(message: &str) -> Self {
        Self::failed(message)
    }
}

impl From<RillError> for CalculationError {
    fn from(err: RillError) -> Self {
        Self::from_error(err)
    }
}

impl From<std::io::Error> for CalculationError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(err)
    }
}

/// Either a successfully computed value or an error.
///
/// Exactly one payload is present; the enum makes "both" and "neither"
/// unrepresentable. Instances are immutable once built.
///
/// # Example
///
/// ```rust
/// use rill_core::{CalculationError, ValueOrError};
///
/// let ok: ValueOrError<u32> = ValueOrError::Value(7);
/// let text = ok.match_with(|v| format!("value {v}"), |e| format!("error {e}"));
/// assert_eq!(text, "value 7");
///
/// let failed: ValueOrError<u32> = ValueOrError::Error(CalculationError::failed("boom"));
/// assert!(failed.is_error());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueOrError<T, E = CalculationError> {
    /// A successfully computed value.
    Value(T),
    /// The error the computation failed with.
    Error(E),
}

impl<T, E> ValueOrError<T, E> {
    /// Wrap a successful value.
    pub fn from_value(value: T) -> Self {
        Self::Value(value)
    }

    /// Wrap an error.
    pub fn from_error(error: E) -> Self {
        Self::Error(error)
    }

    /// Consume exactly one branch, producing a single result type.
    pub fn match_with<R>(self, on_value: impl FnOnce(T) -> R, on_error: impl FnOnce(E) -> R) -> R {
        match self {
            Self::Value(value) => on_value(value),
            Self::Error(error) => on_error(error),
        }
    }

    /// True if this holds a value.
    pub fn is_value(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    /// True if this holds an error.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// Borrow the value, if any.
    pub fn as_value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// Borrow the error, if any.
    pub fn as_error(&self) -> Option<&E> {
        match self {
            Self::Value(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    /// Borrow both payloads.
    pub fn as_ref(&self) -> ValueOrError<&T, &E> {
        match self {
            Self::Value(value) => ValueOrError::Value(value),
            Self::Error(error) => ValueOrError::Error(error),
        }
    }

    /// Take the value, dropping any error.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Error(_) => None,
        }
    }

    /// Take the error, dropping any value.
    pub fn err(self) -> Option<E> {
        match self {
            Self::Value(_) => None,
            Self::Error(error) => Some(error),
        }
    }

    /// Convert into a standard `Result`.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            Self::Value(value) => Ok(value),
            Self::Error(error) => Err(error),
        }
    }

    /// Transform the value branch.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ValueOrError<U, E> {
        match self {
            Self::Value(value) => ValueOrError::Value(f(value)),
            Self::Error(error) => ValueOrError::Error(error),
        }
    }

    /// Transform the error branch.
    pub fn map_error<F>(self, f: impl FnOnce(E) -> F) -> ValueOrError<T, F> {
        match self {
            Self::Value(value) => ValueOrError::Value(value),
            Self::Error(error) => ValueOrError::Error(f(error)),
        }
    }

    /// The value, or `default` on error.
    pub fn value_or(self, default: T) -> T {
        match self {
            Self::Value(value) => value,
            Self::Error(_) => default,
        }
    }
}

impl<T: Default, E> Default for ValueOrError<T, E> {
    fn default() -> Self {
        Self::Value(T::default())
    }
}

impl<T, E> From<Result<T, E>> for ValueOrError<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Value(value),
            Err(error) => Self::Error(error),
        }
    }
}

impl<T, E> From<ValueOrError<T, E>> for Result<T, E> {
    fn from(outcome: ValueOrError<T, E>) -> Self {
        outcome.into_result()
    }
}
