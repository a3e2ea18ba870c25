//! Generator and prompt resolver traits.

use crate::error::FillError;
use crate::schema::FieldPath;
use crate::types::{GenerationRequest, GenerationResponse};
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;

/// Identity of a generation backend.
#[derive(Debug, Clone)]
pub struct GeneratorInfo {
    pub id: String,
    pub name: String,
}

/// Core generation capability trait.
///
/// This is the only interface the engine has to a concrete backend. One call
/// takes a model id, rendered prompt text and the source content parts, and
/// returns raw response bytes. Implementations must return promptly when
/// their future is dropped: task cancellation relies on it.
#[async_trait]
pub trait Generator: Send + Sync + Debug + 'static {
    /// Get backend information
    fn info(&self) -> Arc<GeneratorInfo>;

    /// Run one generation call
    async fn generate(&self, req: GenerationRequest) -> Result<GenerationResponse, FillError>;
}

/// Request passed to a [`PromptResolver`].
#[derive(Debug, Clone)]
pub struct PromptRequest {
    /// Prompt label from the batch key (or the configured fallback)
    pub label: String,
    /// Version string from the run configuration, passed through verbatim
    pub version: String,
    /// Field paths covered by the batch
    pub field_paths: Vec<FieldPath>,
    /// Concatenated text content of the source material, if any
    pub source_text: Option<String>,
}

/// Renders a prompt label plus batch context into prompt text.
///
/// The execution engine calls this once per batch before dispatching the
/// generation call; the planner's dry-run mode calls it the same way but
/// never proceeds to generation.
#[async_trait]
pub trait PromptResolver: Send + Sync + Debug + 'static {
    /// Render the prompt for one batch
    async fn render(&self, req: PromptRequest) -> Result<String, FillError>;
}

/// Fallback resolver producing a plain JSON-extraction instruction.
///
/// Useful for tests and for callers without a template engine: the rendered
/// prompt names every field path in the batch and asks for a single JSON
/// object keyed by those paths.
#[derive(Debug, Clone, Default)]
pub struct DefaultResolver;

impl DefaultResolver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PromptResolver for DefaultResolver {
    async fn render(&self, req: PromptRequest) -> Result<String, FillError> {
        let keys = req
            .field_paths
            .iter()
            .map(FieldPath::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        let mut text = format!(
            "Task {} (version {}): extract the following fields from the source \
             material and respond with a single JSON object keyed by field path: {}.",
            req.label, req.version, keys
        );
        if let Some(source) = &req.source_text {
            text.push_str("\n\nSource material:\n");
            text.push_str(source);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_resolver_names_fields_and_source() {
        let rendered = DefaultResolver::new()
            .render(PromptRequest {
                label: "basic".to_string(),
                version: "latest".to_string(),
                field_paths: vec![FieldPath::new("Name"), FieldPath::new("Age")],
                source_text: Some("John is 25.".to_string()),
            })
            .await
            .unwrap();
        assert!(rendered.contains("Task basic"));
        assert!(rendered.contains("Name, Age"));
        assert!(rendered.contains("John is 25."));
    }
}
