//! Layer trait and abstractions.
//!
//! Layers provide a composable way to wrap generators with cross-cutting
//! concerns like logging or backend-level retry. Each layer wraps an inner
//! generator and returns a new generator with enhanced behavior; composition
//! uses static dispatch until the executor builder erases the final type.

use crate::error::FillError;
use crate::generator::{Generator, GeneratorInfo};
use crate::types::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use std::sync::Arc;

/// Layer trait for wrapping generators.
pub trait Layer<G: Generator> {
    /// The type of the layered generator
    type LayeredGenerator: Generator;

    /// Wrap the inner generator with this layer
    fn layer(&self, inner: G) -> Self::LayeredGenerator;
}

/// Helper trait for layered generators.
///
/// Provides default forwarding implementations so implementers only override
/// the methods they want to intercept.
#[async_trait]
pub trait LayeredGenerator: Sized + Generator {
    /// The inner generator type
    type Inner: Generator;

    /// Get a reference to the inner generator
    fn inner(&self) -> &Self::Inner;

    /// Default implementation for info - forwards to inner
    fn layered_info(&self) -> Arc<GeneratorInfo> {
        self.inner().info()
    }

    /// Default implementation for generate - forwards to inner
    async fn layered_generate(
        &self,
        req: GenerationRequest,
    ) -> Result<GenerationResponse, FillError> {
        self.inner().generate(req).await
    }
}

/// Macro to implement Generator by forwarding to LayeredGenerator methods.
///
/// This reduces boilerplate for concrete (non-generic) layered generators;
/// generic wrappers need the manual forwarding impl.
#[macro_export]
macro_rules! impl_layered_generator {
    ($type:ty) => {
        #[async_trait::async_trait]
        impl $crate::generator::Generator for $type {
            fn info(&self) -> std::sync::Arc<$crate::generator::GeneratorInfo> {
                $crate::layer::LayeredGenerator::layered_info(self)
            }

            async fn generate(
                &self,
                req: $crate::types::GenerationRequest,
            ) -> Result<$crate::types::GenerationResponse, $crate::error::FillError> {
                $crate::layer::LayeredGenerator::layered_generate(self, req).await
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GenerationRequest, GenerationResponse};

    #[derive(Debug)]
    struct StaticGenerator;

    #[async_trait]
    impl Generator for StaticGenerator {
        fn info(&self) -> Arc<GeneratorInfo> {
            Arc::new(GeneratorInfo {
                id: "static".to_string(),
                name: "Static".to_string(),
            })
        }

        async fn generate(&self, _req: GenerationRequest) -> Result<GenerationResponse, FillError> {
            Ok(GenerationResponse::from_text("static"))
        }
    }

    #[derive(Debug)]
    struct UppercaseGenerator {
        inner: StaticGenerator,
    }

    #[async_trait]
    impl LayeredGenerator for UppercaseGenerator {
        type Inner = StaticGenerator;

        fn inner(&self) -> &Self::Inner {
            &self.inner
        }

        async fn layered_generate(
            &self,
            req: GenerationRequest,
        ) -> Result<GenerationResponse, FillError> {
            let response = self.inner.generate(req).await?;
            let text = String::from_utf8_lossy(&response.payload).to_uppercase();
            Ok(GenerationResponse::from_text(text))
        }
    }

    crate::impl_layered_generator!(UppercaseGenerator);

    #[tokio::test]
    async fn macro_forwards_through_layered_methods() {
        let layered = UppercaseGenerator {
            inner: StaticGenerator,
        };
        let response = layered
            .generate(GenerationRequest::new("m", "p"))
            .await
            .unwrap();
        assert_eq!(response.payload, b"STATIC");
        assert_eq!(layered.info().id, "static");
    }
}
