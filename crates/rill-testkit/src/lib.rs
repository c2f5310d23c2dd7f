//! Rill Testing Infrastructure
//!
//! Shared fixtures for tests of Rill properties: tracing setup, an observer
//! that records what it sees, seeded calculation contexts, async waiting on a
//! property, and proptest strategies.
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! rill-testkit = { path = "../rill-testkit" }
//! ```
//!
//! ```rust,no_run
//! use rill_testkit::*;
//!
//! #[tokio::test]
//! async fn settles() {
//!     init_tracing();
//!     let factory = rill_reactive::PropertyFactory::new().unwrap();
//!     let input = factory.create_property(1);
//!     let recorder = Recorder::attach(&input);
//!     input.set(2);
//!     assert_eq!(recorder.values(), vec![1, 2]);
//! }
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod recorder;
pub mod rng;
pub mod strategies;
pub mod tracing_setup;
pub mod wait;

pub use recorder::Recorder;
pub use rng::{random_delay, seeded_context, SeededContext};
pub use tracing_setup::init_tracing;
pub use wait::{wait_for, wait_for_value, WaitError};
