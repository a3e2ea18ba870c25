//! # Structfill Plan
//!
//! Cost and token planner over compiled structfill schemas.
//!
//! The planner consumes the same [`Schema`](structfill_core::schema::Schema)
//! the executor runs, and produces a tree with one node per generation call
//! plus bracketing analysis and merge nodes. Static mode estimates token
//! counts from field-name categories; dry-run mode renders each batch's real
//! prompt through a [`PromptResolver`](structfill_core::generator::PromptResolver)
//! and measures it, but never calls the generation backend.
//!
//! ## Usage
//!
//! ```ignore
//! use structfill_plan::{Planner, ExecutionStats, render_text};
//!
//! let schema = compiler.compile::<Invoice>()?;
//! let plan = Planner::new().with_default_model("gpt-4o-mini").static_plan(&schema);
//! println!("{}", render_text(&plan));
//! let stats = ExecutionStats::from_plan(&plan);
//! ```

pub mod estimate;
pub mod plan;
pub mod render;

// Re-exports
pub use estimate::{ModelPrice, Planner, PriceTable};
pub use plan::{ExecutionStats, PlanKind, PlanNode};
pub use render::render_text;
