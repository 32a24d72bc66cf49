//! tickflow
//!
//! Cooperative task scheduling for real-time simulation loops.
//!
//! A [`Scheduler`] owns resumable computations and advances each of them once
//! per simulation tick. Computations suspend by yielding a [`Signal`]: wait a
//! number of seconds, wait for another task, or run a nested computation.
//!
//! # Example
//!
//! ```
//! use tickflow::computation::delay;
//! use tickflow::Scheduler;
//!
//! fn main() -> tickflow::Result<()> {
//!     let mut scheduler = Scheduler::new();
//!     let handle = scheduler.submit(delay(0.5, || println!("boom")))?;
//!     while !handle.is_done() {
//!         scheduler.advance_all(1.0 / 60.0)?;
//!     }
//!     Ok(())
//! }
//! ```

#![warn(rust_2018_idioms)]

pub mod demo;
pub mod runtime;
pub mod util;

// Re-exports
pub use runtime::scheduler::{
    computation, Computation, Result, Scheduler, SchedulerConfig, SchedulerError, Signal,
    Spawner, SubmitOptions, TaskHandle, TaskId, TaskState,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "tickflow";
