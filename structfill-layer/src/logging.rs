//! Logging layer for generator operations.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use structfill_core::error::FillError;
use structfill_core::generator::{Generator, GeneratorInfo};
use structfill_core::layer::{Layer, LayeredGenerator};
use structfill_core::types::{GenerationRequest, GenerationResponse};

/// Logging layer that logs generator operations.
#[derive(Debug, Clone)]
pub struct LoggingLayer {
    prefix: String,
}

impl LoggingLayer {
    /// Create a new logging layer
    pub fn new() -> Self {
        Self {
            prefix: "[structfill]".to_string(),
        }
    }

    /// Create a logging layer with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Generator> Layer<G> for LoggingLayer {
    type LayeredGenerator = LoggingGenerator<G>;

    fn layer(&self, inner: G) -> Self::LayeredGenerator {
        LoggingGenerator {
            inner,
            prefix: self.prefix.clone(),
        }
    }
}

/// Generator wrapped with logging
#[derive(Debug)]
pub struct LoggingGenerator<G> {
    inner: G,
    prefix: String,
}

#[async_trait]
impl<G: Generator> LayeredGenerator for LoggingGenerator<G> {
    type Inner = G;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_generate(
        &self,
        req: GenerationRequest,
    ) -> Result<GenerationResponse, FillError> {
        tracing::debug!(
            "{} generate request: id={}, model={}, content_parts={}",
            self.prefix,
            req.request_id,
            req.model,
            req.content.len()
        );

        let request_id = req.request_id.clone();
        let start = std::time::Instant::now();
        let result = self.inner.generate(req).await;
        let elapsed = start.elapsed();

        match &result {
            Ok(response) => {
                tracing::debug!(
                    "{} generate success: id={}, bytes={}, elapsed={:?}",
                    self.prefix,
                    request_id,
                    response.payload.len(),
                    elapsed
                );
            }
            Err(e) => {
                tracing::error!(
                    "{} generate error: id={}, {:?}, elapsed={:?}",
                    self.prefix,
                    request_id,
                    e,
                    elapsed
                );
            }
        }

        result
    }
}

#[async_trait]
impl<G: Generator> Generator for LoggingGenerator<G> {
    fn info(&self) -> Arc<GeneratorInfo> {
        LayeredGenerator::layered_info(self)
    }

    async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse, FillError> {
        LayeredGenerator::layered_generate(self, req).await
    }
}
