//! Basic usage example using the structfill meta crate.
//!
//! This demonstrates:
//! 1. Describing a target record and its per-field extraction annotations
//! 2. Building an executor with logging layered over a generation backend
//! 3. Filling the record from free-form source text
//! 4. Planning the same schema's cost before running it
//!
//! The backend here is a canned mock so the example runs offline; swap in
//! any type implementing `Generator` to talk to a real model API.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use structfill::layer::LoggingLayer;
use structfill::plan::{render_text, ExecutionStats, Planner};
use structfill::prelude::*;
use structfill::{GenerationRequest, GenerationResponse, GeneratorInfo, SourceItem};

/// Target record: every field carries its extraction annotation in the
/// descriptor below. Fields sharing a prompt label end up in one call.
#[derive(Debug, Deserialize)]
struct Applicant {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Age")]
    age: u32,
    #[serde(rename = "City")]
    city: String,
    #[serde(rename = "Summary")]
    summary: String,
}

impl Record for Applicant {
    fn descriptor() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder("Applicant")
            .string("Name", "profile")
            .integer("Age", "profile")
            .string("City", "profile")
            .string("Summary", "narrative")
            .build()
    }
}

/// Offline stand-in for a model API.
#[derive(Debug)]
struct CannedGenerator;

#[async_trait]
impl Generator for CannedGenerator {
    fn info(&self) -> Arc<GeneratorInfo> {
        Arc::new(GeneratorInfo {
            id: "canned".to_string(),
            name: "Canned".to_string(),
        })
    }

    async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse> {
        // One canned payload per prompt label; a real backend would send
        // req.prompt and req.content to the model named by req.model.
        let payload = if req.prompt.contains("profile") {
            r#"{"Name":"Ada Lovelace","Age":28,"City":"London"}"#
        } else {
            r#"{"Summary":"Analytical engineer with a gift for seeing programs where others see gears."}"#
        };
        Ok(GenerationResponse::from_text(payload))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let executor = FillExecutor::builder(CannedGenerator)
        .layer(LoggingLayer::new())
        .run_config(RunConfig::new().with_default_model("demo-model"))
        .finish();

    // Plan first: same schema the executor will run, no generation calls.
    println!("=== Plan ===");
    let schema = executor.schema::<Applicant>()?;
    let plan = Planner::new()
        .with_default_model("demo-model")
        .static_plan(&schema);
    print!("{}", render_text(&plan));
    let stats = ExecutionStats::from_plan(&plan);
    println!(
        "{} calls, ~{} input tokens, ~{} output tokens\n",
        stats.calls, stats.input_tokens, stats.output_tokens
    );

    // Then fill: two batches, two concurrent calls, one merged record.
    println!("=== Fill ===");
    let applicant: Applicant = executor
        .fill(vec![SourceItem::text(
            "Ada Lovelace, 28, of London. Known for analytical work on the engine.",
        )])
        .await?;

    println!("name:    {}", applicant.name);
    println!("age:     {}", applicant.age);
    println!("city:    {}", applicant.city);
    println!("summary: {}", applicant.summary);

    Ok(())
}
