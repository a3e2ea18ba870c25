//! # Structfill Layers
//!
//! Built-in layers for structfill.
//!
//! Currently implemented layers:
//! - `LoggingLayer`: Logs all generator calls with timing information
//! - `RetryLayer`: Automatic retry with exponential backoff for retryable errors
//!
//! ## Usage
//!
//! ```ignore
//! use structfill_core::FillExecutor;
//! use structfill_layer::{LoggingLayer, RetryLayer};
//!
//! let executor = FillExecutor::builder(generator)
//!     .layer(LoggingLayer::new())
//!     .layer(RetryLayer::new().with_max_retries(3))
//!     .finish();
//! ```

pub mod logging;
pub mod retry;

// Re-exports
pub use logging::LoggingLayer;
pub use retry::RetryLayer;
