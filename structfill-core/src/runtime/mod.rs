//! Runtime layer: the execution engine.
//!
//! This module provides the executor that sits between the high-level
//! `fill()` API and the low-level generator interface. It is responsible
//! for:
//! - Compiling (and caching) the target type's schema
//! - Fanning one concurrent task out per batch, with bounded concurrency,
//!   per-call timeout, retry with exponential backoff, and first-failure
//!   cancellation
//! - Handing the collected fragments to the merger once all batches finish

pub mod executor;

pub use executor::{FillExecutor, FillExecutorBuilder};
