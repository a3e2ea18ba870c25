//! Field annotation grammar.
//!
//! Annotations are short strings attached to record fields. The grammar, in
//! resolution order:
//!
//! - `group/<name>` — substitute the named group's (prompt, model)
//! - `model/<id>[?k=v&...]` — model only, prompt inherited
//! - `prompt/<name>[/model/<id>[?k=v&...]]` — prompt, optionally also model
//! - `<prompt>,<model>` — legacy explicit pair
//! - single bare token — prompt label, unless it looks like a model name
//! - empty / malformed — full inheritance from the enclosing context

use crate::types::{GroupDef, ModelParams};
use std::collections::HashMap;

/// Model-family fragments recognized by the bare-token heuristic.
pub const MODEL_HINTS: &[&str] = &[
    "gpt", "claude", "gemini", "llama", "mistral", "deepseek", "qwen", "phi", "grok",
];

/// Provider prefixes recognized by the bare-token heuristic.
pub const PROVIDER_PREFIXES: &[&str] = &[
    "openai/",
    "anthropic/",
    "google/",
    "meta/",
    "ollama/",
    "azure/",
    "mistralai/",
];

/// Effective (prompt, model, params) for one field after grammar resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAnnotation {
    pub prompt: String,
    pub model: String,
    pub params: ModelParams,
}

/// True when a bare annotation token should be read as a model id rather
/// than a prompt label.
///
/// Substring/prefix matching is inherently ambiguous; the hint lists above
/// are the full extent of the heuristic.
pub fn looks_like_model(token: &str) -> bool {
    let lower = token.to_ascii_lowercase();
    PROVIDER_PREFIXES.iter().any(|p| lower.starts_with(p))
        || MODEL_HINTS.iter().any(|h| lower.contains(h))
}

/// Split a model token into its id and trailing `?k=v&...` parameter block.
///
/// The parameter block is stripped from the id used for batch equality.
pub fn split_model_params(token: &str) -> (String, ModelParams) {
    match token.split_once('?') {
        Some((id, query)) => (id.to_string(), parse_params(query)),
        None => (token.to_string(), ModelParams::new()),
    }
}

fn parse_params(query: &str) -> ModelParams {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Resolve a field annotation against its inherited context.
pub fn resolve(
    annotation: &str,
    inherited: &ResolvedAnnotation,
    groups: &HashMap<String, GroupDef>,
) -> ResolvedAnnotation {
    let annotation = annotation.trim();
    let mut out = inherited.clone();
    if annotation.is_empty() {
        return out;
    }

    if let Some(name) = annotation.strip_prefix("group/") {
        match groups.get(name) {
            Some(group) => {
                out.prompt = group.prompt.clone();
                out.model = group.model.clone();
                out.params.clear();
            }
            // Unknown group names keep the literal token as a placeholder
            // prompt: still a valid, distinct bucket instead of a failure.
            None => out.prompt = annotation.to_string(),
        }
        return out;
    }

    if let Some(rest) = annotation.strip_prefix("model/") {
        let (model, params) = split_model_params(rest);
        out.model = model;
        out.params = params;
        return out;
    }

    if let Some(rest) = annotation.strip_prefix("prompt/") {
        match rest.split_once("/model/") {
            Some((prompt, model_part)) => {
                let (model, params) = split_model_params(model_part);
                out.prompt = prompt.to_string();
                out.model = model;
                out.params = params;
            }
            None => out.prompt = rest.to_string(),
        }
        return out;
    }

    if annotation.contains(',') {
        let parts: Vec<&str> = annotation.split(',').map(str::trim).collect();
        if parts.len() == 2 {
            let (model, params) = split_model_params(parts[1]);
            out.prompt = parts[0].to_string();
            out.model = model;
            out.params = params;
        }
        // Three or more comma-separated parts is malformed; fall back to
        // full inheritance.
        return out;
    }

    if looks_like_model(annotation) {
        let (model, params) = split_model_params(annotation);
        out.model = model;
        out.params = params;
    } else {
        out.prompt = annotation.to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn groups() -> HashMap<String, GroupDef> {
        let mut map = HashMap::new();
        map.insert(
            "identity".to_string(),
            GroupDef::new("identity-prompt", "gpt-4o-mini"),
        );
        map
    }

    fn inherited() -> ResolvedAnnotation {
        ResolvedAnnotation {
            prompt: "parent-prompt".to_string(),
            model: "parent-model".to_string(),
            params: ModelParams::new(),
        }
    }

    #[test]
    fn empty_inherits_everything() {
        let resolved = resolve("", &inherited(), &groups());
        assert_eq!(resolved, inherited());
        let resolved = resolve("   ", &inherited(), &groups());
        assert_eq!(resolved, inherited());
    }

    #[test]
    fn group_substitutes_prompt_and_model() {
        let resolved = resolve("group/identity", &inherited(), &groups());
        assert_eq!(resolved.prompt, "identity-prompt");
        assert_eq!(resolved.model, "gpt-4o-mini");
    }

    #[test]
    fn unknown_group_degrades_to_placeholder_prompt() {
        let resolved = resolve("group/missing", &inherited(), &groups());
        assert_eq!(resolved.prompt, "group/missing");
        // model still inherited
        assert_eq!(resolved.model, "parent-model");
    }

    #[test]
    fn model_only_inherits_prompt() {
        let resolved = resolve("model/gpt-4o", &inherited(), &groups());
        assert_eq!(resolved.prompt, "parent-prompt");
        assert_eq!(resolved.model, "gpt-4o");
        assert!(resolved.params.is_empty());
    }

    #[test]
    fn model_params_are_parsed_and_stripped() {
        let resolved = resolve("model/gpt-4o?temperature=0.2&max_tokens=512", &inherited(), &groups());
        assert_eq!(resolved.model, "gpt-4o");
        assert_eq!(resolved.params.get("temperature").map(String::as_str), Some("0.2"));
        assert_eq!(resolved.params.get("max_tokens").map(String::as_str), Some("512"));
    }

    #[test]
    fn prompt_only() {
        let resolved = resolve("prompt/doc-type", &inherited(), &groups());
        assert_eq!(resolved.prompt, "doc-type");
        assert_eq!(resolved.model, "parent-model");
    }

    #[test]
    fn prompt_with_model_and_params() {
        let resolved = resolve("prompt/doc-type/model/claude-3-haiku?top_k=5", &inherited(), &groups());
        assert_eq!(resolved.prompt, "doc-type");
        assert_eq!(resolved.model, "claude-3-haiku");
        assert_eq!(resolved.params.get("top_k").map(String::as_str), Some("5"));
    }

    #[test]
    fn legacy_pair() {
        let resolved = resolve("doc-type,model-A", &inherited(), &groups());
        assert_eq!(resolved.prompt, "doc-type");
        assert_eq!(resolved.model, "model-A");
    }

    #[test]
    fn malformed_multi_part_inherits() {
        let resolved = resolve("a,b,c", &inherited(), &groups());
        assert_eq!(resolved, inherited());
    }

    #[test]
    fn bare_token_is_prompt_by_default() {
        let resolved = resolve("basic", &inherited(), &groups());
        assert_eq!(resolved.prompt, "basic");
        assert_eq!(resolved.model, "parent-model");
    }

    #[test]
    fn bare_token_matching_model_family_is_model() {
        let resolved = resolve("gpt-4o-mini", &inherited(), &groups());
        assert_eq!(resolved.prompt, "parent-prompt");
        assert_eq!(resolved.model, "gpt-4o-mini");
    }

    #[test]
    fn bare_token_with_provider_prefix_is_model() {
        let resolved = resolve("ollama/medgemma", &inherited(), &groups());
        assert_eq!(resolved.model, "ollama/medgemma");
        assert_eq!(resolved.prompt, "parent-prompt");
    }
}
