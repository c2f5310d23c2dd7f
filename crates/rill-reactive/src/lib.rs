//! Rill Reactive - calculated properties on Tokio
//!
//! Builds the derived layer of the dataflow graph on top of `rill-core`:
//!
//! - [`CalculatedProperty`]: a read-only property recomputed whenever one of
//!   its sources is set, synchronously or on the Tokio runtime.
//! - [`AsyncCalculationHelper`]: the per-round handle asynchronous
//!   calculations use to notice they have been superseded.
//! - [`PropertyFactory`]: the entry point that builds every property kind.
//! - [`SourceSet`]: single properties and tuples of up to four as inputs.
//! - [`PropertyStreamExt`]: any property as a `futures::Stream`.
//!
//! # Publication
//!
//! Only the most recently started round publishes. A round that completes
//! after a newer round has started is dropped, whatever order the rounds
//! finish in. Failures and panics inside a calculation are published as the
//! error branch of [`ValueOrError`](rill_core::ValueOrError); they never
//! propagate to the code that set a source.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use rill_core::CalculationError;
//! use rill_reactive::PropertyFactory;
//!
//! # async fn demo() -> rill_core::Result<()> {
//! let factory = PropertyFactory::new()?;
//! let text = factory.create_property(String::from("abc"));
//! let decorated = factory.create_async_calculated_property(text.clone(), None, |helper, text| async move {
//!     helper.sleep(Duration::from_millis(100)).await?;
//!     Ok::<_, CalculationError>(format!("{text} [CALCULATED]"))
//! })?;
//!
//! text.set(String::from("abcd"));
//! let _sub = decorated.subscribe(|value| println!("{value}"));
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

mod calculated;
mod context;
mod coordinator;
mod factory;
mod helper;
mod runtime;
mod sources;
mod stream;

pub use calculated::CalculatedProperty;
pub use context::CalculationContext;
pub use coordinator::{CoordinatorStats, RoundOutcome};
pub use factory::PropertyFactory;
pub use helper::AsyncCalculationHelper;
pub use runtime::{SerialDispatcher, TaskRegistry};
pub use sources::{ChangeCallback, SourceSet};
pub use stream::{PropertyStream, PropertyStreamExt};
