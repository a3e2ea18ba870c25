//! Result merging: applying fragments onto a working record document.
//!
//! The merger runs strictly after the concurrent phase ends. It parses each
//! fragment permissively (code-fence markup and surrounding whitespace are
//! trimmed before structural parsing), resolves payload keys against field
//! paths — dotted flat keys and nested objects both work — and follows each
//! field's recorded structural offsets from the record root to assign the
//! converted value. Unknown keys are ignored; a shape mismatch aborts the
//! whole merge.

use crate::error::FillError;
use crate::record::{FieldShape, TypeDescriptor};
use crate::schema::{FieldPath, FieldSpec, Schema};
use crate::types::Fragment;
use serde_json::Value;
use std::sync::Arc;

/// Applies generation fragments onto a zero-valued record document.
#[derive(Debug)]
pub struct Merger {
    descriptor: Arc<TypeDescriptor>,
    schema: Arc<Schema>,
}

impl Merger {
    pub fn new(descriptor: Arc<TypeDescriptor>, schema: Arc<Schema>) -> Self {
        Self { descriptor, schema }
    }

    /// Merge all fragments into a fresh working document.
    ///
    /// Fragments are applied in the order given (arrival order); if two
    /// fragments set the same path, the later one wins.
    pub fn merge(&self, fragments: &[Fragment]) -> Result<Value, FillError> {
        let mut doc = self.descriptor.zero_value();
        for fragment in fragments {
            self.apply(&mut doc, fragment)?;
        }
        Ok(doc)
    }

    /// Apply one fragment onto an existing working document.
    ///
    /// Values assigned before an error surface in `doc`; callers that need
    /// record-or-nothing semantics should merge into a scratch document, as
    /// [`Merger::merge`] does.
    pub fn apply(&self, doc: &mut Value, fragment: &Fragment) -> Result<(), FillError> {
        let text = std::str::from_utf8(&fragment.payload).map_err(|e| {
            FillError::merge(format!(
                "fragment from prompt {:?} is not valid UTF-8: {e}",
                fragment.prompt
            ))
        })?;
        let parsed: Value = serde_json::from_str(strip_fences(text)).map_err(|e| {
            FillError::merge(format!(
                "fragment from prompt {:?} is not valid JSON: {e}",
                fragment.prompt
            ))
        })?;
        let Value::Object(map) = parsed else {
            return Err(FillError::merge(format!(
                "fragment from prompt {:?} is not a JSON object",
                fragment.prompt
            )));
        };
        for (key, value) in &map {
            self.apply_entry(doc, &FieldPath::root(), key, value)?;
        }
        Ok(())
    }

    fn apply_entry(
        &self,
        doc: &mut Value,
        base: &FieldPath,
        key: &str,
        value: &Value,
    ) -> Result<(), FillError> {
        // Dotted flat keys address nested fields directly.
        let path = if base.as_str().is_empty() {
            FieldPath::new(key)
        } else {
            base.child(key)
        };
        let Some(spec) = self.schema.spec(&path) else {
            // Unknown keys are ignored.
            return Ok(());
        };
        if !spec.container {
            return self.assign(doc, spec, value);
        }
        match &spec.shape {
            FieldShape::List(_) => self.assign_list(doc, spec, value),
            _ => match value {
                // Nested objects mirror the record's own nesting.
                Value::Object(map) => {
                    for (k, v) in map {
                        self.apply_entry(doc, &path, k, v)?;
                    }
                    Ok(())
                }
                _ => Err(FillError::merge(format!(
                    "field {path} expects a nested object, got {}",
                    value_kind(value)
                ))),
            },
        }
    }

    fn assign(&self, doc: &mut Value, spec: &FieldSpec, value: &Value) -> Result<(), FillError> {
        let converted = convert(&spec.shape, value)
            .map_err(|msg| FillError::merge(format!("field {}: {msg}", spec.path)))?;
        *self.slot(doc, spec)? = converted;
        Ok(())
    }

    fn assign_list(&self, doc: &mut Value, spec: &FieldSpec, value: &Value) -> Result<(), FillError> {
        let Value::Array(items) = value else {
            return Err(FillError::merge(format!(
                "field {} expects an array, got {}",
                spec.path,
                value_kind(value)
            )));
        };
        let Some(element) = spec.shape.element_descriptor() else {
            return Err(FillError::merge(format!(
                "field {} is not a list of records",
                spec.path
            )));
        };
        let mut converted = Vec::with_capacity(items.len());
        for item in items {
            let Value::Object(map) = item else {
                return Err(FillError::merge(format!(
                    "field {}: list elements must be objects, got {}",
                    spec.path,
                    value_kind(item)
                )));
            };
            converted.push(self.convert_element(&element, &spec.path, map)?);
        }
        *self.slot(doc, spec)? = Value::Array(converted);
        Ok(())
    }

    /// Convert one list-element object against the element descriptor.
    ///
    /// Keys resolve against the field specs recorded under the list's path;
    /// unknown keys are ignored, shape mismatches are hard errors.
    fn convert_element(
        &self,
        desc: &Arc<TypeDescriptor>,
        base: &FieldPath,
        map: &serde_json::Map<String, Value>,
    ) -> Result<Value, FillError> {
        let mut out = desc.zero_value();
        let Some(obj) = out.as_object_mut() else {
            return Err(FillError::merge(format!(
                "descriptor {} did not produce an object document",
                desc.name
            )));
        };
        for (key, value) in map {
            let Some((_, field)) = desc.field(key) else {
                continue;
            };
            let path = base.child(key);
            if let Some(inner) = field.shape.element_descriptor() {
                let nested = match (&field.shape, value) {
                    (FieldShape::List(_), Value::Array(items)) => {
                        let mut elements = Vec::with_capacity(items.len());
                        for item in items {
                            let Value::Object(m) = item else {
                                return Err(FillError::merge(format!(
                                    "field {path}: list elements must be objects, got {}",
                                    value_kind(item)
                                )));
                            };
                            elements.push(self.convert_element(&inner, &path, m)?);
                        }
                        Value::Array(elements)
                    }
                    (FieldShape::List(_), other) => {
                        return Err(FillError::merge(format!(
                            "field {path} expects an array, got {}",
                            value_kind(other)
                        )))
                    }
                    (_, Value::Object(m)) => self.convert_element(&inner, &path, m)?,
                    (_, other) => {
                        return Err(FillError::merge(format!(
                            "field {path} expects a nested object, got {}",
                            value_kind(other)
                        )))
                    }
                };
                obj.insert(key.clone(), nested);
            } else if self.schema.spec(&path).is_some() {
                let converted = convert(&field.shape, value)
                    .map_err(|msg| FillError::merge(format!("field {path}: {msg}")))?;
                obj.insert(key.clone(), converted);
            }
        }
        Ok(out)
    }

    /// Follow a spec's structural offsets from the record root to its slot.
    fn slot<'doc>(
        &self,
        doc: &'doc mut Value,
        spec: &FieldSpec,
    ) -> Result<&'doc mut Value, FillError> {
        let mut desc = self.descriptor.clone();
        let mut current = doc;
        let last = spec.offsets.len().saturating_sub(1);
        for (depth, &idx) in spec.offsets.iter().enumerate() {
            let Some(field) = desc.fields.get(idx) else {
                return Err(FillError::merge(format!(
                    "field {}: structural offset {idx} out of range in {}",
                    spec.path, desc.name
                )));
            };
            let name = field.name.clone();
            let next = field.shape.element_descriptor();
            if current.is_array() {
                return Err(FillError::merge(format!(
                    "field {}: cannot address a field inside a list directly",
                    spec.path
                )));
            }
            let Some(obj) = current.as_object_mut() else {
                return Err(FillError::merge(format!(
                    "field {}: offset path crosses a non-object value",
                    spec.path
                )));
            };
            let Some(child) = obj.get_mut(&name) else {
                return Err(FillError::merge(format!(
                    "field {}: working document is missing {name:?}",
                    spec.path
                )));
            };
            current = child;
            if depth < last {
                let Some(next) = next else {
                    return Err(FillError::merge(format!(
                        "field {}: offset path crosses a non-composite field",
                        spec.path
                    )));
                };
                desc = next;
            }
        }
        Ok(current)
    }
}

/// Convert a parsed value into the destination field's shape.
fn convert(shape: &FieldShape, value: &Value) -> Result<Value, String> {
    match shape {
        FieldShape::String => match value {
            Value::String(_) => Ok(value.clone()),
            other => Err(format!("expected a string, got {}", value_kind(other))),
        },
        FieldShape::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
            other => Err(format!("expected an integer, got {}", value_kind(other))),
        },
        FieldShape::Float => match value {
            Value::Number(_) => Ok(value.clone()),
            other => Err(format!("expected a number, got {}", value_kind(other))),
        },
        FieldShape::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            other => Err(format!("expected a boolean, got {}", value_kind(other))),
        },
        // Timestamps pass through uninterpreted as RFC 3339 strings.
        FieldShape::Timestamp => match value {
            Value::String(_) | Value::Null => Ok(value.clone()),
            other => Err(format!("expected a timestamp string, got {}", value_kind(other))),
        },
        FieldShape::List(inner) => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(convert(inner, item)?);
                }
                Ok(Value::Array(out))
            }
            other => Err(format!("expected an array, got {}", value_kind(other))),
        },
        FieldShape::Composite(_) => Err("nested records are merged structurally".to_string()),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Trim surrounding code-fence markup and whitespace from a payload.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the fence line (with its optional language tag) and the
        // closing fence.
        let body = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest,
        };
        let body = body.strip_suffix("```").unwrap_or(body);
        return body.trim();
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{CompileOptions, SchemaCompiler};
    use crate::record::TypeDescriptor;

    fn person() -> Arc<TypeDescriptor> {
        let profile = TypeDescriptor::builder("Profile")
            .string("City", "where")
            .integer("Zip", "where")
            .build();
        let job = TypeDescriptor::builder("Job")
            .string("Title", "work")
            .integer("Years", "work")
            .build();
        TypeDescriptor::builder("Person")
            .string("Name", "basic")
            .integer("Age", "basic")
            .composite("Profile", profile, "")
            .list("Jobs", FieldShape::Composite(job), "")
            .list("Tags", FieldShape::String, "basic")
            .timestamp("UpdatedAt", "basic")
            .build()
    }

    fn merger() -> Merger {
        let desc = person();
        let schema = SchemaCompiler::new(CompileOptions::default())
            .compile_shape(&FieldShape::Composite(desc.clone()))
            .unwrap();
        Merger::new(desc, Arc::new(schema))
    }

    fn fragment(json: &str) -> Fragment {
        Fragment::from_text("p", "m", json)
    }

    #[test]
    fn merges_flat_keys() {
        let doc = merger()
            .merge(&[fragment(r#"{"Name":"John","Age":25}"#)])
            .unwrap();
        assert_eq!(doc["Name"], "John");
        assert_eq!(doc["Age"], 25);
    }

    #[test]
    fn merges_dotted_and_nested_keys() {
        let doc = merger()
            .merge(&[
                fragment(r#"{"Profile.City":"NYC"}"#),
                fragment(r#"{"Profile":{"Zip":10001}}"#),
            ])
            .unwrap();
        assert_eq!(doc["Profile"]["City"], "NYC");
        assert_eq!(doc["Profile"]["Zip"], 10001);
    }

    #[test]
    fn trims_code_fences() {
        let doc = merger()
            .merge(&[fragment("```json\n{\"Name\":\"Ada\"}\n```")])
            .unwrap();
        assert_eq!(doc["Name"], "Ada");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let doc = merger()
            .merge(&[fragment(r#"{"Name":"Ada","Unknown":"x","Deep.Unknown":1}"#)])
            .unwrap();
        assert_eq!(doc["Name"], "Ada");
        assert!(doc.get("Unknown").is_none());
    }

    #[test]
    fn shape_mismatch_is_a_hard_error() {
        let err = merger()
            .merge(&[fragment(r#"{"Age":"twenty-five"}"#)])
            .unwrap_err();
        assert!(matches!(err, FillError::Merge(_)));
        assert!(err.to_string().contains("Age"));
    }

    #[test]
    fn unparsable_payload_is_a_hard_error() {
        let err = merger().merge(&[fragment("not json at all")]).unwrap_err();
        assert!(matches!(err, FillError::Merge(_)));
    }

    #[test]
    fn later_fragment_wins() {
        let doc = merger()
            .merge(&[
                fragment(r#"{"Name":"First"}"#),
                fragment(r#"{"Name":"Second"}"#),
            ])
            .unwrap();
        assert_eq!(doc["Name"], "Second");
    }

    #[test]
    fn list_of_records_merges_per_element() {
        let doc = merger()
            .merge(&[fragment(
                r#"{"Jobs":[{"Title":"Engineer","Years":3},{"Title":"Manager"}]}"#,
            )])
            .unwrap();
        let jobs = doc["Jobs"].as_array().unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0]["Title"], "Engineer");
        assert_eq!(jobs[0]["Years"], 3);
        assert_eq!(jobs[1]["Title"], "Manager");
        // unset element fields hold their zero values
        assert_eq!(jobs[1]["Years"], 0);
    }

    #[test]
    fn list_element_shape_mismatch_fails() {
        let err = merger()
            .merge(&[fragment(r#"{"Jobs":[{"Years":"three"}]}"#)])
            .unwrap_err();
        assert!(err.to_string().contains("Jobs.Years"));
    }

    #[test]
    fn leaf_list_and_timestamp_assignment() {
        let doc = merger()
            .merge(&[fragment(
                r#"{"Tags":["a","b"],"UpdatedAt":"2026-08-24T10:00:00Z"}"#,
            )])
            .unwrap();
        assert_eq!(doc["Tags"].as_array().unwrap().len(), 2);
        assert_eq!(doc["UpdatedAt"], "2026-08-24T10:00:00Z");
    }

    #[test]
    fn full_coverage_sentinel_round_trip() {
        let desc = person();
        let schema = SchemaCompiler::new(CompileOptions::default())
            .compile_shape(&FieldShape::Composite(desc.clone()))
            .unwrap();
        let schema = Arc::new(schema);
        let merger = Merger::new(desc, schema.clone());

        // one synthetic fragment per batch, each setting every field in the
        // batch to a known sentinel; leaves inside a list are delivered the
        // way a model would, as a single-element array on the list's path
        let mut fragments = Vec::new();
        for (key, paths) in schema.batches() {
            let mut obj = serde_json::Map::new();
            let mut list_elements: serde_json::Map<String, Value> = serde_json::Map::new();
            for path in paths {
                let spec = schema.spec(path).unwrap();
                let sentinel = sentinel_for(&spec.shape);
                match path.as_str().strip_prefix("Jobs.") {
                    Some(leaf) => {
                        list_elements.insert(leaf.to_string(), sentinel);
                    }
                    None => {
                        obj.insert(path.as_str().to_string(), sentinel);
                    }
                }
            }
            if !list_elements.is_empty() {
                obj.insert(
                    "Jobs".to_string(),
                    Value::Array(vec![Value::Object(list_elements)]),
                );
            }
            fragments.push(Fragment::from_text(
                key.prompt.clone(),
                key.model.clone(),
                serde_json::to_string(&Value::Object(obj)).unwrap(),
            ));
        }

        let doc = merger.merge(&fragments).unwrap();
        for (_, paths) in schema.batches() {
            for path in paths {
                let spec = schema.spec(path).unwrap();
                let mut current = &doc;
                for (depth, segment) in path.segments().enumerate() {
                    current = &current[segment];
                    // descend into the single sentinel element of the list
                    if depth == 0 && segment == "Jobs" {
                        current = &current[0];
                    }
                }
                assert_eq!(current, &sentinel_for(&spec.shape), "path {path}");
            }
        }
    }

    fn sentinel_for(shape: &FieldShape) -> Value {
        match shape {
            FieldShape::String => Value::String("sentinel".to_string()),
            FieldShape::Integer => Value::from(42),
            FieldShape::Float => Value::from(4.2),
            FieldShape::Boolean => Value::Bool(true),
            FieldShape::Timestamp => Value::String("2026-01-01T00:00:00Z".to_string()),
            FieldShape::List(inner) => Value::Array(vec![sentinel_for(inner)]),
            FieldShape::Composite(_) => Value::Object(serde_json::Map::new()),
        }
    }
}
