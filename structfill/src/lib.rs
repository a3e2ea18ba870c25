//! # Structfill
//!
//! Fill typed records from free-form source material.
//!
//! Structfill turns a target type's field descriptors plus per-field
//! extraction annotations into a batched execution plan: one generation call
//! per group of related fields instead of one per field, run concurrently,
//! with the partial results merged back into the typed record.
//!
//! ## Features
//!
//! - **Annotation-driven batching**: prompt/model annotations with
//!   inheritance, named groups, and per-field overrides
//! - **Composable layers**: stack logging, retry, and custom middleware
//!   around any generation backend with static dispatch
//! - **Concurrent dispatch**: one task per batch with bounded concurrency,
//!   retry with exponential backoff, and first-failure cancellation
//! - **Cost planning**: static and dry-run token/cost estimation over the
//!   same schema the executor runs
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! structfill = { version = "0.1", features = ["layers", "plan"] }
//! ```
//!
//! ```ignore
//! use structfill::{FillExecutor, RunConfig, SourceItem};
//! use structfill::layer::LoggingLayer;
//!
//! # async fn example(backend: impl structfill::Generator) -> structfill::Result<()> {
//! let executor = FillExecutor::builder(backend)
//!     .layer(LoggingLayer::new())
//!     .run_config(RunConfig::new().with_default_model("gpt-4o-mini"))
//!     .finish();
//!
//! let invoice: Invoice = executor
//!     .fill(vec![SourceItem::text("Invoice #42, due 2024-03-01 ...")])
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `default`: Includes `layers` and `plan`
//! - `layers`: Built-in layers (logging, retry)
//! - `plan`: Cost/token planner
//! - `full`: All features enabled

// Re-export core types and traits
pub use structfill_core::*;

// Re-export layers under `layer` module
#[cfg(feature = "structfill-layer")]
pub mod layer {
    //! Built-in middleware layers.
    pub use structfill_layer::*;
}

// Re-export the planner under `plan` module
#[cfg(feature = "structfill-plan")]
pub mod plan {
    //! Cost and token planning.
    pub use structfill_plan::*;
}

// Convenience re-exports at root level for common types
pub use structfill_core::{
    error::FillError,
    generator::{DefaultResolver, Generator, GeneratorInfo, PromptRequest, PromptResolver},
    layer::{Layer, LayeredGenerator},
    record::{FieldDescriptor, FieldShape, Record, TypeDescriptor, TypeDescriptorBuilder},
    runtime::FillExecutor,
    schema::{BatchKey, CompileOptions, FieldPath, Schema, SchemaCache, SchemaCompiler},
    types::{
        Fragment, GenerationRequest, GenerationResponse, GroupDef, ModelParams, RunConfig,
        SourceItem, TokenUsage,
    },
    Result,
};

/// Prelude module for convenient imports
pub mod prelude {
    //! Prelude module containing the most commonly used types and traits.
    //!
    //! ```
    //! use structfill::prelude::*;
    //! ```

    pub use crate::{
        CompileOptions, FillError, FillExecutor, Generator, Layer, Record, Result, RunConfig,
        SourceItem, TypeDescriptor,
    };

    #[cfg(feature = "structfill-layer")]
    pub use crate::layer::*;

    #[cfg(feature = "structfill-plan")]
    pub use crate::plan::*;
}
