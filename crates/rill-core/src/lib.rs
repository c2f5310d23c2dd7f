//! Rill Core - runtime-agnostic reactive primitives
//!
//! This crate holds the pure layer of the Rill dataflow engine. It has no
//! async runtime dependency; the calculation coordinator lives in
//! `rill-reactive`.
//!
//! # Contents
//!
//! - [`ValueOrError`] / [`CalculationError`]: the outcome channel of every
//!   calculation.
//! - [`ObservableProperty`], [`ReadOnlyProperty`], [`Subscription`],
//!   [`PropertySource`]: inputs and views.
//! - [`CalculationToken`] / [`TokenGenerator`]: round generations for
//!   latest-result-wins publication.
//! - [`TaskSpawner`] / [`CancellationToken`]: the seam to an async runtime.
//! - [`ReactiveConfig`]: factory configuration.
//! - [`RillError`]: construction-time contract violations.

#![forbid(unsafe_code)]

/// Factory configuration
pub mod config;

/// Unified error handling
pub mod errors;

/// Observable properties, read-only views, and subscriptions
pub mod property;

/// Runtime-agnostic task spawning traits
pub mod task;

/// Generation tokens for calculation rounds
pub mod token;

/// The value-or-error outcome type
pub mod value_or_error;

pub use config::{NotificationMode, ReactiveConfig};
pub use errors::{Result, RillError};
pub use property::{
    DispatchJob, Dispatcher, InlineDispatcher, ObservableProperty, Observer, PropertySource,
    ReadOnlyProperty, Subscription,
};
pub use task::{CancellationToken, TaskSpawner};
pub use token::{CalculationToken, TokenGenerator};
pub use value_or_error::{CalculationError, CalculationErrorKind, ValueOrError};
