//! Postwork: a delay-aware, single-worker task runner.
//!
//! # Overview
//!
//! Postwork runs opaque closures on one dedicated background thread, each at
//! or after a caller-chosen due time. Producers post work from any thread;
//! the worker drains everything currently due in one pass and executes it
//! with no lock held. A one-shot countdown [`Barrier`] rounds out the crate
//! for "wait until N parties arrive" coordination.
//!
//! # Core Guarantees
//!
//! - **FIFO on ties**: tasks posted with the same due time run in submission order
//! - **Due-time order**: an earlier-due task never starts after a later-due one
//! - **Drain on drop**: dropping the handle runs everything already due before stopping
//! - **Panic isolation**: a panicking task is reported and counted, never kills the worker
//! - **Deterministic testing**: the clock is injected; [`VirtualClock`] only moves when told to
//!
//! # Module Structure
//!
//! - [`clock`]: the [`TimeSource`] trait plus wall and virtual clocks
//! - [`runner`]: the [`TaskRunner`] handle and its worker loop
//! - [`sync`]: thread coordination primitives ([`Barrier`])
//! - [`types`]: the [`Time`] timestamp and panic payload types
//!
//! # Example
//!
//! ```
//! use postwork::{TaskRunner, WallClock};
//! use std::sync::{Arc, mpsc};
//!
//! let runner = TaskRunner::new(Arc::new(WallClock::new()));
//! let (tx, rx) = mpsc::channel();
//! runner.post_task(move || {
//!     tx.send(42).expect("receiver alive");
//! });
//! drop(runner); // drains everything already due, then stops the worker
//! assert_eq!(rx.recv().unwrap(), 42);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::cast_possible_truncation)]

pub mod clock;
mod queue;
pub mod runner;
pub mod sync;
pub mod types;

// ── Test-only modules ───────────────────────────────────────────────────
#[cfg(any(test, feature = "test-internals"))]
pub mod test_utils;

// Re-exports for convenient access to core types
pub use clock::{TimeSource, VirtualClock, WallClock};
pub use runner::{TaskPanic, TaskRunner};
pub use sync::Barrier;
pub use types::{PanicPayload, Time};
