//! Token and cost estimation over a compiled schema.

use crate::plan::{PlanKind, PlanNode};
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::sync::Arc;
use structfill_core::error::FillError;
use structfill_core::generator::{DefaultResolver, PromptRequest, PromptResolver};
use structfill_core::schema::{BatchKey, FieldPath, Schema};

/// Prompt scaffolding tokens assumed per call in static mode.
pub const STATIC_PROMPT_BASE_TOKENS: u32 = 120;
/// Tokens assumed for the source material appended to every prompt.
pub const DOCUMENT_CONTEXT_TOKENS: u32 = 400;
/// Rendered-length heuristic used by dry-run mode.
pub const CHARS_PER_TOKEN: usize = 4;

const NODE_BASE_COST: f64 = 1.0;

/// Token weights for one field-name category.
#[derive(Debug, Clone, Copy)]
struct FieldCategory {
    input_tokens: u32,
    output_tokens: u32,
}

const DEFAULT_CATEGORY: FieldCategory = FieldCategory {
    input_tokens: 10,
    output_tokens: 12,
};

static CATEGORY_TABLE: Lazy<BTreeMap<&'static str, FieldCategory>> = Lazy::new(|| {
    let mut table = BTreeMap::new();
    let mut put = |name, input_tokens, output_tokens| {
        table.insert(
            name,
            FieldCategory {
                input_tokens,
                output_tokens,
            },
        );
    };
    put("name", 8, 6);
    put("title", 8, 10);
    put("age", 4, 3);
    put("city", 6, 4);
    put("country", 6, 4);
    put("address", 10, 20);
    put("email", 8, 8);
    put("phone", 8, 8);
    put("url", 8, 12);
    put("date", 6, 8);
    put("summary", 12, 60);
    put("description", 12, 80);
    table
});

fn category_for(path: &FieldPath) -> FieldCategory {
    let normalized = path.leaf_name().to_ascii_lowercase();
    CATEGORY_TABLE
        .get(normalized.as_str())
        .copied()
        .unwrap_or(DEFAULT_CATEGORY)
}

/// Per-model price in dollars per thousand tokens.
#[derive(Debug, Clone, Copy)]
pub struct ModelPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

/// Price lookup by model id.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: BTreeMap<String, ModelPrice>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a price for a model
    pub fn with_model(mut self, model: impl Into<String>, price: ModelPrice) -> Self {
        self.prices.insert(model.into(), price);
        self
    }

    pub fn get(&self, model: &str) -> Option<ModelPrice> {
        self.prices.get(model).copied()
    }
}

/// Cost planner over a compiled schema.
///
/// Static mode never renders anything; dry-run mode renders real prompts
/// through the same resolver the executor uses but stops before the
/// generation call. Both produce the same tree shape as an actual run.
#[derive(Debug, Clone)]
pub struct Planner {
    resolver: Option<Arc<dyn PromptResolver>>,
    prices: Option<PriceTable>,
    default_model: Option<String>,
    prompt_version: String,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    pub fn new() -> Self {
        Self {
            resolver: None,
            prices: None,
            default_model: None,
            prompt_version: "latest".to_string(),
        }
    }

    /// Use a prompt resolver for dry-run rendering
    pub fn with_resolver(mut self, resolver: impl PromptResolver) -> Self {
        self.resolver = Some(Arc::new(resolver));
        self
    }

    /// Attach a price table; PromptCall nodes gain a currency cost
    pub fn with_prices(mut self, prices: PriceTable) -> Self {
        self.prices = Some(prices);
        self
    }

    /// Model assumed for batches that don't resolve one
    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    /// Prompt version passed to the resolver in dry-run mode
    pub fn with_prompt_version(mut self, version: impl Into<String>) -> Self {
        self.prompt_version = version.into();
        self
    }

    /// Build a plan without rendering any prompts.
    pub fn static_plan(&self, schema: &Schema) -> PlanNode {
        let mut root = self.root_node(schema);
        for (key, paths) in schema.batches() {
            let input = STATIC_PROMPT_BASE_TOKENS
                + paths.iter().map(|p| category_for(p).input_tokens).sum::<u32>()
                + DOCUMENT_CONTEXT_TOKENS;
            root.children.push(self.call_node(schema, key, paths, input));
        }
        root.children.push(merge_node(schema));
        root.finalize();
        root
    }

    /// Build a plan by rendering each batch's real prompt and measuring it.
    pub async fn dry_run(
        &self,
        schema: &Schema,
        source_text: Option<String>,
    ) -> Result<PlanNode, FillError> {
        let resolver: Arc<dyn PromptResolver> = match &self.resolver {
            Some(resolver) => resolver.clone(),
            None => Arc::new(DefaultResolver::new()),
        };

        let mut root = self.root_node(schema);
        for (key, paths) in schema.batches() {
            let rendered = resolver
                .render(PromptRequest {
                    label: key.prompt.clone(),
                    version: self.prompt_version.clone(),
                    field_paths: paths.clone(),
                    source_text: source_text.clone(),
                })
                .await?;
            let input = rendered.chars().count().div_ceil(CHARS_PER_TOKEN) as u32;
            root.children.push(self.call_node(schema, key, paths, input));
        }
        root.children.push(merge_node(schema));
        root.finalize();
        tracing::debug!(
            batches = schema.batches().len(),
            total_cost = root.total_cost,
            "dry run planned"
        );
        Ok(root)
    }

    fn root_node(&self, schema: &Schema) -> PlanNode {
        let mut root = PlanNode::new(PlanKind::SchemaAnalysis);
        root.own_cost = NODE_BASE_COST + 0.5 * schema.leaf_count() as f64;
        root
    }

    fn call_node(
        &self,
        schema: &Schema,
        key: &BatchKey,
        paths: &[FieldPath],
        input_tokens: u32,
    ) -> PlanNode {
        let output_tokens = paths
            .iter()
            .map(|p| category_for(p).output_tokens)
            .sum::<u32>();
        let model = self.effective_model(schema, key, paths);

        let mut node = PlanNode::new(PlanKind::PromptCall);
        node.prompt = Some(key.prompt.clone());
        node.field_paths = paths.to_vec();
        node.input_tokens = input_tokens;
        node.output_tokens = output_tokens;
        node.own_cost = NODE_BASE_COST + 0.01 * f64::from(input_tokens);
        node.currency_cost = model.as_deref().and_then(|m| {
            self.prices.as_ref().and_then(|table| table.get(m)).map(|price| {
                f64::from(input_tokens) * price.input_per_1k / 1000.0
                    + f64::from(output_tokens) * price.output_per_1k / 1000.0
            })
        });
        node.model = model;
        node
    }

    fn effective_model(
        &self,
        schema: &Schema,
        key: &BatchKey,
        paths: &[FieldPath],
    ) -> Option<String> {
        if !key.model.is_empty() {
            return Some(key.model.clone());
        }
        if let [only] = paths {
            if let Some(spec) = schema.spec(only) {
                if !spec.model.is_empty() {
                    return Some(spec.model.clone());
                }
            }
        }
        self.default_model.clone()
    }
}

fn merge_node(schema: &Schema) -> PlanNode {
    let mut node = PlanNode::new(PlanKind::MergeFragments);
    node.own_cost = NODE_BASE_COST + 0.1 * schema.leaf_count() as f64;
    node
}
