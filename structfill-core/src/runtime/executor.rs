//! FillExecutor implementation.
//!
//! The executor owns one short-lived group of parallel tasks per `fill()`
//! call, one task per batch key, torn down when the call returns. The only
//! shared mutable state during the concurrent phase is the mutex-guarded
//! fragment collection; the destination record is produced by the
//! single-threaded merge phase strictly after the barrier.

use crate::error::FillError;
use crate::generator::{DefaultResolver, Generator, PromptRequest, PromptResolver};
use crate::layer::Layer;
use crate::merge::Merger;
use crate::record::Record;
use crate::schema::{CompileOptions, FieldPath, Schema, SchemaCache, SchemaCompiler};
use crate::types::{
    Fragment, GenerationRequest, GenerationResponse, ModelParams, RunConfig, SourceItem,
};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Builder for composing an executor from a generator, a prompt resolver,
/// and compile/run configuration.
///
/// Layers wrap the generator with static dispatch during building; the
/// finished executor erases the final type once.
///
/// # Example
///
/// ```ignore
/// let executor = FillExecutor::builder(backend)
///     .layer(LoggingLayer::new())
///     .resolver(templates)
///     .run_config(RunConfig::new().with_default_model("gpt-4o-mini"))
///     .finish();
/// ```
pub struct FillExecutorBuilder<G> {
    generator: G,
    resolver: Option<Arc<dyn PromptResolver>>,
    compile_options: CompileOptions,
    run_config: RunConfig,
    cache: SchemaCache,
}

impl<G: Generator> FillExecutorBuilder<G> {
    /// Create a new builder with a generator
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            resolver: None,
            compile_options: CompileOptions::default(),
            run_config: RunConfig::default(),
            cache: SchemaCache::new(),
        }
    }

    /// Add a layer to wrap the generator
    pub fn layer<L>(self, layer: L) -> FillExecutorBuilder<L::LayeredGenerator>
    where
        L: Layer<G>,
    {
        FillExecutorBuilder {
            generator: layer.layer(self.generator),
            resolver: self.resolver,
            compile_options: self.compile_options,
            run_config: self.run_config,
            cache: self.cache,
        }
    }

    /// Set the prompt resolver; [`DefaultResolver`] is used when unset
    pub fn resolver(mut self, resolver: impl PromptResolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Set the schema compile options
    pub fn compile_options(mut self, options: CompileOptions) -> Self {
        self.compile_options = options;
        self
    }

    /// Set the run configuration
    pub fn run_config(mut self, config: RunConfig) -> Self {
        self.run_config = config;
        self
    }

    /// Inject a schema cache (shared across executors or reset from tests)
    pub fn schema_cache(mut self, cache: SchemaCache) -> Self {
        self.cache = cache;
        self
    }

    /// Finish building and create a FillExecutor
    pub fn finish(self) -> FillExecutor {
        FillExecutor {
            generator: Arc::new(self.generator),
            resolver: self
                .resolver
                .unwrap_or_else(|| Arc::new(DefaultResolver::new())),
            compiler: SchemaCompiler::new(self.compile_options).with_cache(self.cache),
            config: self.run_config,
        }
    }
}

/// The execution engine: compiles schemas, dispatches batches concurrently,
/// and merges the collected fragments into a typed record.
pub struct FillExecutor {
    generator: Arc<dyn Generator>,
    resolver: Arc<dyn PromptResolver>,
    compiler: SchemaCompiler,
    config: RunConfig,
}

impl FillExecutor {
    /// Create a new builder
    pub fn builder<G: Generator>(generator: G) -> FillExecutorBuilder<G> {
        FillExecutorBuilder::new(generator)
    }

    /// The schema compiler (and its cache) used by this executor
    pub fn compiler(&self) -> &SchemaCompiler {
        &self.compiler
    }

    /// Compile (or fetch from cache) the schema for a record type
    pub fn schema<T: Record>(&self) -> Result<Arc<Schema>, FillError> {
        self.compiler.compile::<T>()
    }

    /// Fill a typed record from source material.
    ///
    /// Returns either a fully merged record or a single error: the first
    /// unrecoverable batch failure cancels all other in-flight and pending
    /// batches and is returned alone.
    pub async fn fill<T: Record>(&self, sources: Vec<SourceItem>) -> Result<T, FillError> {
        if sources.is_empty() && !self.config.allow_empty_source {
            return Err(FillError::EmptyInput);
        }
        let schema = self.compiler.compile::<T>()?;
        tracing::debug!(
            target_type = schema.type_name(),
            batches = schema.batches().len(),
            fields = schema.leaf_count(),
            "starting fill"
        );

        let fragments = match self.config.overall_timeout {
            // Dropping the dispatch future on expiry aborts every batch task.
            Some(limit) => tokio::time::timeout(limit, self.dispatch(&schema, sources))
                .await
                .map_err(|_| FillError::cancelled("overall timeout elapsed"))??,
            None => self.dispatch(&schema, sources).await?,
        };

        let merger = Merger::new(T::descriptor(), schema.clone());
        let doc = merger.merge(&fragments)?;
        serde_json::from_value(doc).map_err(|e| {
            FillError::merge(format!(
                "merged document does not deserialize into {}: {e}",
                schema.type_name()
            ))
        })
    }

    /// Run the concurrent phase: one task per batch, hard barrier at the end.
    async fn dispatch(
        &self,
        schema: &Arc<Schema>,
        sources: Vec<SourceItem>,
    ) -> Result<Vec<Fragment>, FillError> {
        let fragments = Arc::new(Mutex::new(Vec::with_capacity(schema.batches().len())));
        let semaphore = self
            .config
            .max_concurrency
            .map(|ceiling| Arc::new(Semaphore::new(ceiling)));
        let source_text = collect_source_text(&sources);
        let sources = Arc::new(sources);

        let mut tasks: JoinSet<Result<(), FillError>> = JoinSet::new();
        for (key, paths) in schema.batches() {
            let model = self.effective_model(schema, key.model.as_str(), paths)?;
            let prompt = match (key.prompt.is_empty(), &self.compiler.options().fallback_prompt) {
                (false, _) => key.prompt.clone(),
                (true, Some(fallback)) => fallback.clone(),
                // No prompt and no fallback: fail immediately, without retry,
                // naming the affected field paths.
                (true, None) => {
                    return Err(FillError::unresolved_prompt(
                        paths.iter().map(|p| p.as_str().to_string()).collect(),
                    ))
                }
            };

            let generator = self.generator.clone();
            let resolver = self.resolver.clone();
            let fragments = fragments.clone();
            let semaphore = semaphore.clone();
            let sources = sources.clone();
            let source_text = source_text.clone();
            let config = self.config.clone();
            let params = schema.batch_params(key);
            let paths = paths.clone();

            tasks.spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => Some(
                        semaphore
                            .acquire_owned()
                            .await
                            .map_err(|_| FillError::cancelled("concurrency gate closed"))?,
                    ),
                    None => None,
                };

                let rendered = resolver
                    .render(PromptRequest {
                        label: prompt.clone(),
                        version: config.prompt_version.clone(),
                        field_paths: paths,
                        source_text,
                    })
                    .await?;

                let response =
                    generate_with_retry(generator.as_ref(), &config, &model, rendered, params, &sources)
                        .await?;
                tracing::debug!(prompt = %prompt, model = %model, "batch fragment collected");

                fragments
                    .lock()
                    .map_err(|_| FillError::other("fragment collection lock poisoned"))?
                    .push(Fragment::new(prompt, model, response.payload));
                Ok(())
            });
        }

        // Hard barrier: the merge phase only starts once every batch task
        // has completed or been cancelled.
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    // First failure wins; siblings are cancelled and their
                    // errors discarded.
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(err);
                }
                Err(join_err) if join_err.is_cancelled() => {}
                Err(join_err) => {
                    tasks.abort_all();
                    while tasks.join_next().await.is_some() {}
                    return Err(FillError::other(format!("batch task panicked: {join_err}")));
                }
            }
        }

        let fragments = Arc::try_unwrap(fragments)
            .map_err(|_| FillError::other("fragment collection still shared after barrier"))?
            .into_inner()
            .map_err(|_| FillError::other("fragment collection lock poisoned"))?;
        Ok(fragments)
    }

    /// Batch key's model, else the single field's spec model, else the
    /// configured default.
    fn effective_model(
        &self,
        schema: &Schema,
        key_model: &str,
        paths: &[FieldPath],
    ) -> Result<String, FillError> {
        if !key_model.is_empty() {
            return Ok(key_model.to_string());
        }
        if let [only] = paths {
            if let Some(spec) = schema.spec(only) {
                if !spec.model.is_empty() {
                    return Ok(spec.model.clone());
                }
            }
        }
        self.config
            .default_model
            .clone()
            .ok_or(FillError::ModelUnspecified)
    }
}

/// Concatenated text content of the source material, if any.
fn collect_source_text(sources: &[SourceItem]) -> Option<String> {
    let texts: Vec<&str> = sources
        .iter()
        .filter_map(|item| match item {
            SourceItem::Text { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    if texts.is_empty() {
        None
    } else {
        Some(texts.join("\n\n"))
    }
}

/// Call the generator with per-call timeout and exponentially doubling
/// backoff between retryable failures.
async fn generate_with_retry(
    generator: &dyn Generator,
    config: &RunConfig,
    model: &str,
    prompt: String,
    params: ModelParams,
    sources: &Arc<Vec<SourceItem>>,
) -> Result<GenerationResponse, FillError> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        let req = GenerationRequest::new(model, prompt.clone())
            .with_params(params.clone())
            .with_content(sources.as_ref().clone());
        let result = match tokio::time::timeout(config.call_timeout, generator.generate(req)).await
        {
            Ok(result) => result,
            Err(_) => Err(FillError::timeout(format!(
                "generation call exceeded {:?}",
                config.call_timeout
            ))),
        };
        match result {
            Ok(response) => return Ok(response),
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(FillError::generation(
                        model,
                        format!("retries exhausted after {attempt} attempts: {err}"),
                    ));
                }
                // Cap the exponent so high attempt counts can't overflow.
                let exponent = attempt.saturating_sub(1).min(31);
                let delay = config.base_backoff.saturating_mul(2u32.pow(exponent));
                tracing::debug!(
                    model = %model,
                    attempt,
                    ?delay,
                    "generation failed, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
