//! Text rendering of a plan tree.

use crate::plan::{PlanKind, PlanNode};
use std::fmt::Write;

/// Render a plan as an indented outline, one line per node.
pub fn render_text(plan: &PlanNode) -> String {
    let mut out = String::new();
    render_node(plan, 0, &mut out);
    out
}

fn render_node(node: &PlanNode, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    let label = match node.kind {
        PlanKind::SchemaAnalysis => "schema analysis",
        PlanKind::PromptCall => "prompt call",
        PlanKind::MergeFragments => "merge fragments",
    };
    let _ = write!(out, "{indent}{label}");
    if let Some(prompt) = &node.prompt {
        let _ = write!(out, " prompt={prompt:?}");
    }
    if let Some(model) = &node.model {
        let _ = write!(out, " model={model}");
    }
    if !node.field_paths.is_empty() {
        let paths = node
            .field_paths
            .iter()
            .map(|p| p.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let _ = write!(out, " fields=[{paths}]");
    }
    if node.kind == PlanKind::PromptCall {
        let _ = write!(out, " in={} out={}", node.input_tokens, node.output_tokens);
    }
    let _ = write!(out, " cost={:.2}", node.total_cost);
    if let Some(currency) = node.currency_cost {
        let _ = write!(out, " (${currency:.4})");
    }
    out.push('\n');
    for child in &node.children {
        render_node(child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_indents_children() {
        let mut root = PlanNode::new(PlanKind::SchemaAnalysis);
        let mut call = PlanNode::new(PlanKind::PromptCall);
        call.prompt = Some("basic".to_string());
        call.model = Some("M".to_string());
        call.input_tokens = 538;
        call.output_tokens = 13;
        root.children.push(call);
        root.children.push(PlanNode::new(PlanKind::MergeFragments));
        root.finalize();

        let text = render_text(&root);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("schema analysis"));
        assert!(lines[1].starts_with("  prompt call"));
        assert!(lines[1].contains("prompt=\"basic\""));
        assert!(lines[1].contains("model=M"));
        assert!(lines[1].contains("in=538 out=13"));
        assert!(lines[2].starts_with("  merge fragments"));
    }
}
