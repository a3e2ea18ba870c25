//! Retry layer with exponential backoff.
//!
//! This wraps a single generator call, independently of the per-batch retry
//! the executor runs. Stacking both is legitimate but multiplies attempts;
//! callers who compose this layer usually set the run configuration's
//! `max_attempts` to 1.

use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use structfill_core::error::FillError;
use structfill_core::generator::{Generator, GeneratorInfo};
use structfill_core::layer::{Layer, LayeredGenerator};
use structfill_core::types::{GenerationRequest, GenerationResponse};

/// Retry layer configuration
#[derive(Debug, Clone)]
pub struct RetryLayer {
    max_retries: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f64,
}

impl RetryLayer {
    /// Create a new retry layer with default settings
    pub fn new() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Set maximum number of retries
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set initial delay
    pub fn with_initial_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Set maximum delay
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Set backoff multiplier
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculate delay for a given attempt
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        delay.min(self.max_delay)
    }
}

impl Default for RetryLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl<G: Generator> Layer<G> for RetryLayer {
    type LayeredGenerator = RetryGenerator<G>;

    fn layer(&self, inner: G) -> Self::LayeredGenerator {
        RetryGenerator {
            inner,
            config: self.clone(),
        }
    }
}

/// Generator wrapped with retry logic
#[derive(Debug)]
pub struct RetryGenerator<G> {
    inner: G,
    config: RetryLayer,
}

impl<G: Generator> RetryGenerator<G> {
    /// Execute with retry logic
    async fn execute_with_retry<T, F, Fut>(&self, mut operation: F) -> Result<T, FillError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, FillError>>,
    {
        let mut attempt = 0;

        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    if !e.is_retryable() || attempt >= self.config.max_retries {
                        return Err(e);
                    }

                    let delay = self.config.calculate_delay(attempt);
                    tracing::debug!(
                        "Retry attempt {}/{}, waiting {:?}",
                        attempt + 1,
                        self.config.max_retries,
                        delay
                    );

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[async_trait]
impl<G: Generator> LayeredGenerator for RetryGenerator<G> {
    type Inner = G;

    fn inner(&self) -> &Self::Inner {
        &self.inner
    }

    async fn layered_generate(
        &self,
        req: GenerationRequest,
    ) -> Result<GenerationResponse, FillError> {
        // Clone req for retry attempts
        let req_clone = req.clone();
        self.execute_with_retry(|| {
            let req = req_clone.clone();
            async move { self.inner.generate(req).await }
        })
        .await
    }
}

#[async_trait]
impl<G: Generator> Generator for RetryGenerator<G> {
    fn info(&self) -> Arc<GeneratorInfo> {
        LayeredGenerator::layered_info(self)
    }

    async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse, FillError> {
        LayeredGenerator::layered_generate(self, req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FlakyGenerator {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Generator for FlakyGenerator {
        fn info(&self) -> Arc<GeneratorInfo> {
            Arc::new(GeneratorInfo {
                id: "flaky".to_string(),
                name: "Flaky".to_string(),
            })
        }

        async fn generate(&self, _req: GenerationRequest) -> Result<GenerationResponse, FillError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(FillError::rate_limit("throttled"))
            } else {
                Ok(GenerationResponse::from_text("ok"))
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_retryable_errors_until_success() {
        let layered = RetryLayer::new()
            .with_initial_delay(Duration::from_millis(10))
            .layer(FlakyGenerator {
                failures: 2,
                calls: AtomicU32::new(0),
            });
        let response = layered
            .generate(GenerationRequest::new("m", "p"))
            .await
            .unwrap();
        assert_eq!(response.payload, b"ok");
        assert_eq!(layered.inner().calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let layered = RetryLayer::new().layer(AlwaysFatal);
        let err = layered
            .generate(GenerationRequest::new("m", "p"))
            .await
            .unwrap_err();
        assert!(matches!(err, FillError::Generation { .. }));
    }

    #[derive(Debug)]
    struct AlwaysFatal;

    #[async_trait]
    impl Generator for AlwaysFatal {
        fn info(&self) -> Arc<GeneratorInfo> {
            Arc::new(GeneratorInfo {
                id: "fatal".to_string(),
                name: "Fatal".to_string(),
            })
        }

        async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse, FillError> {
            Err(FillError::generation(req.model, "bad request"))
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let layer = RetryLayer::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(250));
        assert_eq!(layer.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(layer.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(layer.calculate_delay(2), Duration::from_millis(250));
    }
}
