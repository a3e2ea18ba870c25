//! Schema compilation: batching and field addressing.
//!
//! The compiler walks a target type's descriptor depth-first, threading the
//! inherited (prompt, model, params) context, and produces an immutable
//! [`Schema`]: batch buckets keyed by (prompt, model, enclosing path) plus a
//! field-path → [`FieldSpec`] map used later by the merger. Compiled schemas
//! are cached by type identity and safe for concurrent reads.

use crate::annotation::{self, ResolvedAnnotation};
use crate::error::FillError;
use crate::record::{FieldShape, Record, TypeDescriptor};
use crate::types::{GroupDef, ModelParams};
use dashmap::DashMap;
use serde::Serialize;
use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Dotted field path from the record root, e.g. `"Profile.City"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    /// The empty root path
    pub fn root() -> Self {
        Self(String::new())
    }

    /// Create a path from a dotted string
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Extend this path by one field name
    pub fn child(&self, name: &str) -> Self {
        if self.0.is_empty() {
            Self(name.to_string())
        } else {
            Self(format!("{}.{}", self.0, name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, root first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('.')
    }

    /// The final segment (the field's own name)
    pub fn leaf_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or("")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Grouping key bucketing leaf fields into one generation call.
///
/// A model mismatch always forces a new batch: the model is part of the key,
/// so two fields with identical prompt labels but different resolved models
/// can never share a bucket.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BatchKey {
    pub prompt: String,
    pub model: String,
    /// Enclosing field path, or `""` when flatten mode is enabled
    pub parent: String,
}

/// Resolved storage location and effective model for one field path.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub path: FieldPath,
    /// Structural field offsets from the record root (arena+index pattern:
    /// stable across freshly constructed record instances)
    pub offsets: Vec<usize>,
    pub model: String,
    pub params: ModelParams,
    pub shape: FieldShape,
    /// Containers are addressable during merge but never batched
    pub container: bool,
}

/// Compiled batching and addressing data for one target type.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    type_name: String,
    batches: BTreeMap<BatchKey, Vec<FieldPath>>,
    specs: BTreeMap<FieldPath, FieldSpec>,
}

impl Schema {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Batch buckets in deterministic key order; paths within a bucket keep
    /// declaration (depth-first) order
    pub fn batches(&self) -> &BTreeMap<BatchKey, Vec<FieldPath>> {
        &self.batches
    }

    pub fn specs(&self) -> &BTreeMap<FieldPath, FieldSpec> {
        &self.specs
    }

    pub fn spec(&self, path: &FieldPath) -> Option<&FieldSpec> {
        self.specs.get(path)
    }

    /// Total number of batched leaf fields
    pub fn leaf_count(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    /// All batched leaf paths in bucket order
    pub fn leaf_paths(&self) -> Vec<FieldPath> {
        self.batches.values().flatten().cloned().collect()
    }

    /// Model parameters for a batch's call.
    ///
    /// Params are stripped from bucketing, so fields sharing a model id may
    /// disagree on params; the first field's params (bucket order) win.
    pub fn batch_params(&self, key: &BatchKey) -> ModelParams {
        self.batches
            .get(key)
            .and_then(|paths| paths.first())
            .and_then(|path| self.specs.get(path))
            .map(|spec| spec.params.clone())
            .unwrap_or_default()
    }
}

/// Compile-time configuration for the schema compiler.
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    /// Named group registry resolvable from `group/<name>` annotations
    pub groups: HashMap<String, GroupDef>,
    /// Per-field model overrides keyed by `"TypeName.FieldName"`; an
    /// override wins over everything the annotation resolves
    pub model_overrides: HashMap<String, String>,
    /// Collapse the enclosing-path component of every batch key
    pub flatten: bool,
    /// Prompt label used at dispatch time by batches that resolved none
    pub fallback_prompt: Option<String>,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a named group
    pub fn with_group(mut self, name: impl Into<String>, group: GroupDef) -> Self {
        self.groups.insert(name.into(), group);
        self
    }

    /// Register a per-field model override
    pub fn with_model_override(
        mut self,
        field: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        self.model_overrides.insert(field.into(), model.into());
        self
    }

    /// Enable or disable flatten mode
    pub fn with_flatten(mut self, flatten: bool) -> Self {
        self.flatten = flatten;
        self
    }

    /// Set the fallback prompt label
    pub fn with_fallback_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.fallback_prompt = Some(prompt.into());
        self
    }
}

/// Injectable cache of compiled schemas keyed by type identity.
///
/// Purely a performance optimization: safe to drop and recompute at any
/// time, and cheap to clone (shared interior).
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    inner: Arc<DashMap<TypeId, Arc<Schema>>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.inner.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    fn get(&self, key: TypeId) -> Option<Arc<Schema>> {
        self.inner.get(&key).map(|entry| entry.clone())
    }

    fn insert(&self, key: TypeId, schema: Arc<Schema>) {
        self.inner.insert(key, schema);
    }
}

/// Walks target type descriptors into [`Schema`]s.
///
/// One compiler instance carries one set of [`CompileOptions`]; its cache is
/// keyed by type identity only, which keeps recompilation idempotent. Use a
/// fresh compiler (or [`SchemaCache::clear`]) when options change.
#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler {
    options: CompileOptions,
    cache: SchemaCache,
}

impl SchemaCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            cache: SchemaCache::new(),
        }
    }

    /// Replace the cache with an injected one (shared across compilers or
    /// reset from tests)
    pub fn with_cache(mut self, cache: SchemaCache) -> Self {
        self.cache = cache;
        self
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Compile (or fetch from cache) the schema for a record type.
    pub fn compile<T: Record>(&self) -> Result<Arc<Schema>, FillError> {
        let key = TypeId::of::<T>();
        if let Some(hit) = self.cache.get(key) {
            return Ok(hit);
        }
        let schema = Arc::new(self.compile_shape(&FieldShape::Composite(T::descriptor()))?);
        self.cache.insert(key, schema.clone());
        Ok(schema)
    }

    /// Compile directly from a shape. The root must be a composite.
    pub fn compile_shape(&self, shape: &FieldShape) -> Result<Schema, FillError> {
        let FieldShape::Composite(desc) = shape else {
            return Err(FillError::schema("target type must be a composite"));
        };
        let mut schema = Schema {
            type_name: desc.name.clone(),
            batches: BTreeMap::new(),
            specs: BTreeMap::new(),
        };
        self.walk(
            desc,
            &FieldPath::root(),
            &[],
            &ResolvedAnnotation::default(),
            &mut schema,
        );
        Ok(schema)
    }

    fn walk(
        &self,
        desc: &TypeDescriptor,
        parent: &FieldPath,
        offsets: &[usize],
        inherited: &ResolvedAnnotation,
        schema: &mut Schema,
    ) {
        for (idx, field) in desc.fields.iter().enumerate() {
            if field.skip || field.name.is_empty() {
                continue;
            }

            let mut resolved = annotation::resolve(&field.annotation, inherited, &self.options.groups);
            let override_key = format!("{}.{}", desc.name, field.name);
            if let Some(model) = self.options.model_overrides.get(&override_key) {
                let (model, params) = annotation::split_model_params(model);
                resolved.model = model;
                if !params.is_empty() {
                    resolved.params = params;
                }
            }

            let path = parent.child(&field.name);
            let mut field_offsets = offsets.to_vec();
            field_offsets.push(idx);

            if let Some(element) = field.shape.element_descriptor() {
                schema.specs.insert(
                    path.clone(),
                    FieldSpec {
                        path: path.clone(),
                        offsets: field_offsets.clone(),
                        model: resolved.model.clone(),
                        params: resolved.params.clone(),
                        shape: field.shape.clone(),
                        container: true,
                    },
                );
                self.walk(&element, &path, &field_offsets, &resolved, schema);
            } else {
                let key = BatchKey {
                    prompt: resolved.prompt.clone(),
                    model: resolved.model.clone(),
                    parent: if self.options.flatten {
                        String::new()
                    } else {
                        parent.as_str().to_string()
                    },
                };
                schema.batches.entry(key).or_default().push(path.clone());
                schema.specs.insert(
                    path.clone(),
                    FieldSpec {
                        path: path.clone(),
                        offsets: field_offsets,
                        model: resolved.model,
                        params: resolved.params,
                        shape: field.shape.clone(),
                        container: false,
                    },
                );
            }
        }
    }
}
