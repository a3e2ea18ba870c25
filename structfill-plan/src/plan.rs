//! Plan tree mirroring the execution shape.

use serde::Serialize;
use std::collections::BTreeMap;
use structfill_core::schema::FieldPath;

/// What one plan node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PlanKind {
    /// Root node: walking the schema itself
    SchemaAnalysis,
    /// One generation call for one batch
    PromptCall,
    /// The single-threaded merge phase after all batches arrive
    MergeFragments,
}

/// One node of the cost/token estimate tree.
///
/// The tree is shallow: a `SchemaAnalysis` root with one `PromptCall` child
/// per batch and a trailing `MergeFragments` child.
#[derive(Debug, Clone, Serialize)]
pub struct PlanNode {
    pub kind: PlanKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_paths: Vec<FieldPath>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Cost of this node alone, in abstract cost units
    pub own_cost: f64,
    /// Own cost plus the total cost of every child, filled by [`finalize`](Self::finalize)
    pub total_cost: f64,
    /// Real-currency cost when a price table was supplied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency_cost: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PlanNode>,
}

impl PlanNode {
    pub fn new(kind: PlanKind) -> Self {
        Self {
            kind,
            prompt: None,
            model: None,
            field_paths: Vec::new(),
            input_tokens: 0,
            output_tokens: 0,
            own_cost: 0.0,
            total_cost: 0.0,
            currency_cost: None,
            children: Vec::new(),
        }
    }

    /// Fill in `total_cost` bottom-up across the whole tree.
    pub fn finalize(&mut self) {
        let mut total = self.own_cost;
        for child in &mut self.children {
            child.finalize();
            total += child.total_cost;
        }
        self.total_cost = total;
    }

    /// Serialize the tree to a structured JSON document.
    pub fn to_document(&self) -> serde_json::Value {
        // Serialize on a Serialize-only tree cannot produce invalid JSON.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Iterate the tree depth-first, self first.
    pub fn walk(&self, visit: &mut impl FnMut(&PlanNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

/// Aggregate counters over a finished plan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionStats {
    pub calls: u32,
    pub calls_by_model: BTreeMap<String, u32>,
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl ExecutionStats {
    /// Aggregate call counts and token estimates from a plan tree.
    pub fn from_plan(plan: &PlanNode) -> Self {
        let mut stats = Self::default();
        plan.walk(&mut |node| {
            if node.kind == PlanKind::PromptCall {
                stats.calls += 1;
                if let Some(model) = &node.model {
                    *stats.calls_by_model.entry(model.clone()).or_insert(0) += 1;
                }
                stats.input_tokens += node.input_tokens;
                stats.output_tokens += node.output_tokens;
            }
        });
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call_node(model: &str, input: u32, output: u32) -> PlanNode {
        let mut node = PlanNode::new(PlanKind::PromptCall);
        node.model = Some(model.to_string());
        node.input_tokens = input;
        node.output_tokens = output;
        node.own_cost = 2.0;
        node
    }

    #[test]
    fn finalize_sums_bottom_up() {
        let mut root = PlanNode::new(PlanKind::SchemaAnalysis);
        root.own_cost = 1.0;
        root.children.push(call_node("a", 100, 10));
        root.children.push(call_node("b", 200, 20));
        let mut merge = PlanNode::new(PlanKind::MergeFragments);
        merge.own_cost = 0.5;
        root.children.push(merge);

        root.finalize();
        assert_eq!(root.total_cost, 1.0 + 2.0 + 2.0 + 0.5);
        assert_eq!(root.children[0].total_cost, 2.0);
    }

    #[test]
    fn stats_count_only_prompt_calls() {
        let mut root = PlanNode::new(PlanKind::SchemaAnalysis);
        root.children.push(call_node("a", 100, 10));
        root.children.push(call_node("a", 150, 15));
        root.children.push(call_node("b", 200, 20));
        root.children.push(PlanNode::new(PlanKind::MergeFragments));

        let stats = ExecutionStats::from_plan(&root);
        assert_eq!(stats.calls, 3);
        assert_eq!(stats.calls_by_model.get("a"), Some(&2));
        assert_eq!(stats.calls_by_model.get("b"), Some(&1));
        assert_eq!(stats.input_tokens, 450);
        assert_eq!(stats.output_tokens, 45);
    }

    #[test]
    fn document_skips_empty_fields() {
        let mut root = PlanNode::new(PlanKind::SchemaAnalysis);
        root.finalize();
        let doc = root.to_document();
        assert!(doc.get("prompt").is_none());
        assert!(doc.get("children").is_none());
        assert_eq!(doc["kind"], "SchemaAnalysis");
    }
}
