//! # Structfill Core
//!
//! Core abstractions and runtime for filling typed records from free-form
//! source material.
//!
//! This crate provides the schema compiler that turns a target type's
//! descriptor into a batched generation plan, the execution engine that
//! dispatches batches concurrently against a generation backend, and the
//! permissive merger that assembles the responses into the target record.

pub mod annotation;
pub mod error;
pub mod generator;
pub mod layer;
pub mod merge;
pub mod record;
pub mod runtime;
pub mod schema;
pub mod types;

// Re-exports
pub use annotation::ResolvedAnnotation;
pub use error::FillError;
pub use generator::{DefaultResolver, Generator, GeneratorInfo, PromptRequest, PromptResolver};
pub use layer::{Layer, LayeredGenerator};
pub use merge::Merger;
pub use record::{FieldDescriptor, FieldShape, Record, TypeDescriptor, TypeDescriptorBuilder};
pub use runtime::{FillExecutor, FillExecutorBuilder};
pub use schema::{BatchKey, CompileOptions, FieldPath, FieldSpec, Schema, SchemaCache, SchemaCompiler};
pub use types::*;

/// Result type alias for fill operations
pub type Result<T> = std::result::Result<T, FillError>;
