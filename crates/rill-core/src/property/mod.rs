//! # Observable Properties
//!
//! Leaf primitives of the dataflow graph.
//!
//! - [`ObservableProperty<T>`]: a mutable cell. Emits a *set* notification on
//!   every assignment and a *changed* notification when the value differs.
//! - [`ReadOnlyProperty<T>`]: a view over any [`PropertySource`] without write
//!   access, plus projections via [`ReadOnlyProperty::map`].
//! - [`Subscription`]: RAII disposer returned by every subscribe call.
//! - [`Dispatcher`]: the ordered notification lane a property emits on.
//!
//! ## Invariants
//!
//! 1. A subscriber receives the current value on subscribe, then every later
//!    set, in order.
//! 2. *Set* fires on every assignment; *changed* is suppressed for an
//!    assignment equal to the previous value.
//! 3. Disposing a subscription stops delivery before the next notification,
//!    including notifications already queued on a non-inline lane.
//! 4. Ordering between different subscribers of the same emission is
//!    unspecified.

mod dispatch;
mod observable;
mod observers;
mod read_only;
mod source;
mod subscription;

pub use dispatch::{DispatchJob, Dispatcher, InlineDispatcher};
pub use observable::ObservableProperty;
pub use read_only::ReadOnlyProperty;
pub use source::{Observer, PropertySource};
pub use subscription::Subscription;
