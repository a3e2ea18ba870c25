//! Error types for fill operations.

/// The main error type for fill operations.
#[derive(Debug, thiserror::Error)]
pub enum FillError {
    /// No source material was provided
    #[error("no source material provided")]
    EmptyInput,

    /// No model resolved for a batch and no default is configured
    #[error("no model specified and no default model configured")]
    ModelUnspecified,

    /// The target type could not be compiled into a schema
    #[error("schema compilation failed: {0}")]
    SchemaCompilation(String),

    /// A batch has no prompt label and no fallback prompt is configured
    #[error("no prompt resolved for fields [{}]", paths.join(", "))]
    UnresolvedPrompt { paths: Vec<String> },

    /// Prompt rendering failed
    #[error("prompt resolution failed: {0}")]
    Resolver(String),

    /// The generation capability failed fatally or exhausted its retries
    #[error("generation failed (model {model}): {message}")]
    Generation { model: String, message: String },

    /// Rate limit errors
    #[error("rate limit exceeded: {0}")]
    RateLimit(String),

    /// Timeout errors
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The operation was cancelled before completion
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    /// A fragment payload could not be parsed or applied
    #[error("merge failed: {0}")]
    Merge(String),

    /// Serialization/deserialization errors
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl FillError {
    /// Create a schema compilation error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaCompilation(msg.into())
    }

    /// Create an unresolved-prompt error naming the affected field paths
    pub fn unresolved_prompt(paths: Vec<String>) -> Self {
        Self::UnresolvedPrompt { paths }
    }

    /// Create a resolver error
    pub fn resolver(msg: impl Into<String>) -> Self {
        Self::Resolver(msg.into())
    }

    /// Create a generation error
    pub fn generation(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Create a rate limit error
    pub fn rate_limit(msg: impl Into<String>) -> Self {
        Self::RateLimit(msg.into())
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a merge error
    pub fn merge(msg: impl Into<String>) -> Self {
        Self::Merge(msg.into())
    }

    /// Create a generic error
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Check if this is a retryable error.
    ///
    /// The executor only retries transient failures; everything else fails
    /// the batch (and with it the whole run) on the first occurrence.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FillError::Timeout(_) | FillError::RateLimit(_))
    }
}

impl From<String> for FillError {
    fn from(s: String) -> Self {
        Self::Other(s)
    }
}

impl From<&str> for FillError {
    fn from(s: &str) -> Self {
        Self::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(FillError::timeout("slow").is_retryable());
        assert!(FillError::rate_limit("429").is_retryable());
        assert!(!FillError::generation("m", "boom").is_retryable());
        assert!(!FillError::merge("bad payload").is_retryable());
        assert!(!FillError::EmptyInput.is_retryable());
    }

    #[test]
    fn unresolved_prompt_names_paths() {
        let err = FillError::unresolved_prompt(vec!["Name".into(), "Profile.City".into()]);
        let text = err.to_string();
        assert!(text.contains("Name"));
        assert!(text.contains("Profile.City"));
    }
}
