//! Core types for fill operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// One piece of source material handed to the generation capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceItem {
    Text { text: String },
    Image { url: String },
    File { name: String, bytes: Vec<u8> },
}

impl SourceItem {
    /// Create a text source item
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    /// Create an image source item from a URL
    pub fn image(url: impl Into<String>) -> Self {
        Self::Image { url: url.into() }
    }

    /// Create a file source item
    pub fn file(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::File {
            name: name.into(),
            bytes,
        }
    }
}

/// Query-style parameter block parsed from a `?k=v&...` suffix on a model id.
///
/// Ordered so that schemas compiled from the same type compare equal.
pub type ModelParams = BTreeMap<String, String>;

/// Named (prompt, model) pair referenced by `group/<name>` annotations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDef {
    pub prompt: String,
    pub model: String,
}

impl GroupDef {
    /// Create a new group definition
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
        }
    }
}

/// Request sent to a [`Generator`](crate::generator::Generator).
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Unique id for log correlation; a fresh id is issued per attempt
    pub request_id: String,
    pub model: String,
    pub prompt: String,
    pub params: ModelParams,
    pub content: Vec<SourceItem>,
}

impl GenerationRequest {
    /// Create a new generation request
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            model: model.into(),
            prompt: prompt.into(),
            params: ModelParams::new(),
            content: Vec::new(),
        }
    }

    /// Set model parameters
    pub fn with_params(mut self, params: ModelParams) -> Self {
        self.params = params;
        self
    }

    /// Set content parts
    pub fn with_content(mut self, content: Vec<SourceItem>) -> Self {
        self.content = content;
        self
    }
}

/// Token usage reported by a generation backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Response from one generation call.
#[derive(Debug, Clone)]
pub struct GenerationResponse {
    /// Raw response bytes; the merger parses these permissively
    pub payload: Vec<u8>,
    pub usage: Option<TokenUsage>,
}

impl GenerationResponse {
    /// Create a response from raw bytes
    pub fn new(payload: Vec<u8>) -> Self {
        Self {
            payload,
            usage: None,
        }
    }

    /// Create a response from a text payload
    pub fn from_text(text: impl Into<String>) -> Self {
        Self::new(text.into().into_bytes())
    }

    /// Attach token usage
    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }
}

/// Raw response from one generation call, tagged with its batch's prompt
/// label and model.
///
/// Fragments are produced concurrently and carry no ordering guarantee among
/// themselves; the merger only runs once all of them have arrived.
#[derive(Debug, Clone)]
pub struct Fragment {
    pub prompt: String,
    pub model: String,
    pub payload: Vec<u8>,
}

impl Fragment {
    /// Create a new fragment
    pub fn new(prompt: impl Into<String>, model: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            payload,
        }
    }

    /// Create a fragment from a text payload
    pub fn from_text(
        prompt: impl Into<String>,
        model: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self::new(prompt, model, text.into().into_bytes())
    }
}

/// Execution-time configuration for a fill run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Model used when neither the batch key nor a field spec resolves one
    pub default_model: Option<String>,
    /// Prompt version passed verbatim to the prompt resolver
    pub prompt_version: String,
    /// Per-generation-call timeout; expiry counts as a retryable failure
    pub call_timeout: Duration,
    /// Timeout wrapping the whole concurrent phase
    pub overall_timeout: Option<Duration>,
    /// Maximum generation attempts per batch (1 = no retries)
    pub max_attempts: u32,
    /// First retry delay; doubles on each subsequent retry
    pub base_backoff: Duration,
    /// Concurrency ceiling across batches; unlimited when `None`
    pub max_concurrency: Option<usize>,
    /// Permit runs without any source material
    pub allow_empty_source: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            default_model: None,
            prompt_version: "latest".to_string(),
            call_timeout: Duration::from_secs(60),
            overall_timeout: None,
            max_attempts: 3,
            base_backoff: Duration::from_millis(100),
            max_concurrency: None,
            allow_empty_source: false,
        }
    }
}

impl RunConfig {
    /// Create a new run configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default model
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Set the prompt version
    pub fn with_prompt_version(mut self, version: impl Into<String>) -> Self {
        self.prompt_version = version.into();
        self
    }

    /// Set the per-call timeout
    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Set the overall timeout
    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = Some(timeout);
        self
    }

    /// Set the maximum attempts per batch
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the base backoff delay
    pub fn with_base_backoff(mut self, backoff: Duration) -> Self {
        self.base_backoff = backoff;
        self
    }

    /// Set the concurrency ceiling
    pub fn with_max_concurrency(mut self, ceiling: usize) -> Self {
        self.max_concurrency = Some(ceiling);
        self
    }

    /// Allow runs without source material
    pub fn with_allow_empty_source(mut self, allow: bool) -> Self {
        self.allow_empty_source = allow;
        self
    }
}
