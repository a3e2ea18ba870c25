//! Target record descriptors.
//!
//! Rust has no runtime reflection, so target record types describe their own
//! shape through a [`TypeDescriptor`]: an explicit, cheap-to-clone value
//! listing every field with its annotation and shape. Typed records then
//! materialize from the merged working document through serde, which means a
//! descriptor's field names must match the record's serde names.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

/// Shape of a single field in a target record.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldShape {
    String,
    Integer,
    Float,
    Boolean,
    /// Opaque leaf kind: structurally a composite in most host systems
    /// (a timestamp value) but never recursed into.
    Timestamp,
    Composite(Arc<TypeDescriptor>),
    List(Box<FieldShape>),
}

impl FieldShape {
    /// The descriptor the schema compiler recurses into, for composites and
    /// lists of composites. Leaves (including lists of leaves) return `None`.
    pub fn element_descriptor(&self) -> Option<Arc<TypeDescriptor>> {
        match self {
            FieldShape::Composite(desc) => Some(desc.clone()),
            FieldShape::List(inner) => inner.element_descriptor(),
            _ => None,
        }
    }

    /// True when this shape is addressable during merge but never batched.
    pub fn is_container(&self) -> bool {
        self.element_descriptor().is_some()
    }

    /// Zero value used to seed the working document before merging.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldShape::String => Value::String(String::new()),
            FieldShape::Integer => Value::from(0),
            FieldShape::Float => Value::from(0.0),
            FieldShape::Boolean => Value::Bool(false),
            FieldShape::Timestamp => Value::Null,
            FieldShape::Composite(desc) => desc.zero_value(),
            FieldShape::List(_) => Value::Array(Vec::new()),
        }
    }
}

/// One named field of a target record type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    /// Extraction annotation; empty means full inheritance
    pub annotation: String,
    pub shape: FieldShape,
    /// Skipped fields are invisible to the schema compiler
    pub skip: bool,
}

/// Introspection data for one target record type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    /// Start building a descriptor
    pub fn builder(name: impl Into<String>) -> TypeDescriptorBuilder {
        TypeDescriptorBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, field)| field.name == name)
    }

    /// Zero-valued working document for this type, covering every field
    /// (skipped ones included, so the merged document always deserializes).
    pub fn zero_value(&self) -> Value {
        let mut map = serde_json::Map::with_capacity(self.fields.len());
        for field in &self.fields {
            map.insert(field.name.clone(), field.shape.zero_value());
        }
        Value::Object(map)
    }
}

/// Fluent builder for [`TypeDescriptor`].
#[derive(Debug)]
pub struct TypeDescriptorBuilder {
    name: String,
    fields: Vec<FieldDescriptor>,
}

impl TypeDescriptorBuilder {
    /// Add a field with an explicit shape and annotation
    pub fn field(
        mut self,
        name: impl Into<String>,
        shape: FieldShape,
        annotation: impl Into<String>,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            annotation: annotation.into(),
            shape,
            skip: false,
        });
        self
    }

    /// Add a string leaf
    pub fn string(self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.field(name, FieldShape::String, annotation)
    }

    /// Add an integer leaf
    pub fn integer(self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.field(name, FieldShape::Integer, annotation)
    }

    /// Add a float leaf
    pub fn float(self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.field(name, FieldShape::Float, annotation)
    }

    /// Add a boolean leaf
    pub fn boolean(self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.field(name, FieldShape::Boolean, annotation)
    }

    /// Add a timestamp leaf
    pub fn timestamp(self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.field(name, FieldShape::Timestamp, annotation)
    }

    /// Add a nested composite field
    pub fn composite(
        self,
        name: impl Into<String>,
        descriptor: Arc<TypeDescriptor>,
        annotation: impl Into<String>,
    ) -> Self {
        self.field(name, FieldShape::Composite(descriptor), annotation)
    }

    /// Add a list field
    pub fn list(
        self,
        name: impl Into<String>,
        element: FieldShape,
        annotation: impl Into<String>,
    ) -> Self {
        self.field(name, FieldShape::List(Box::new(element)), annotation)
    }

    /// Add a field that the schema compiler skips entirely
    pub fn skipped(mut self, name: impl Into<String>, shape: FieldShape) -> Self {
        self.fields.push(FieldDescriptor {
            name: name.into(),
            annotation: String::new(),
            shape,
            skip: true,
        });
        self
    }

    /// Finish building
    pub fn build(self) -> Arc<TypeDescriptor> {
        Arc::new(TypeDescriptor {
            name: self.name,
            fields: self.fields,
        })
    }
}

/// A typed record that can be filled from source material.
///
/// Implementations pair a deserializable struct with the descriptor the
/// schema compiler walks. Descriptors are built once and cached behind a
/// static, so `descriptor()` is cheap to call repeatedly.
pub trait Record: DeserializeOwned + Send + 'static {
    /// The introspection descriptor for this type
    fn descriptor() -> Arc<TypeDescriptor>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile() -> Arc<TypeDescriptor> {
        TypeDescriptor::builder("Profile")
            .string("City", "")
            .integer("Zip", "")
            .build()
    }

    #[test]
    fn zero_value_covers_all_fields() {
        let desc = TypeDescriptor::builder("Person")
            .string("Name", "basic")
            .integer("Age", "basic")
            .float("Score", "")
            .boolean("Active", "")
            .timestamp("CreatedAt", "")
            .composite("Profile", profile(), "")
            .list("Tags", FieldShape::String, "")
            .skipped("Internal", FieldShape::String)
            .build();

        let zero = desc.zero_value();
        let obj = zero.as_object().unwrap();
        assert_eq!(obj.len(), 8);
        assert_eq!(obj["Name"], Value::String(String::new()));
        assert_eq!(obj["Age"], Value::from(0));
        assert_eq!(obj["Active"], Value::Bool(false));
        assert_eq!(obj["CreatedAt"], Value::Null);
        assert!(obj["Profile"].is_object());
        assert_eq!(obj["Profile"]["Zip"], Value::from(0));
        assert_eq!(obj["Tags"], Value::Array(Vec::new()));
        assert_eq!(obj["Internal"], Value::String(String::new()));
    }

    #[test]
    fn container_detection() {
        assert!(FieldShape::Composite(profile()).is_container());
        assert!(FieldShape::List(Box::new(FieldShape::Composite(profile()))).is_container());
        assert!(!FieldShape::List(Box::new(FieldShape::String)).is_container());
        assert!(!FieldShape::Timestamp.is_container());
        assert!(!FieldShape::String.is_container());
    }

    #[test]
    fn field_lookup_returns_offset() {
        let desc = profile();
        let (idx, field) = desc.field("Zip").unwrap();
        assert_eq!(idx, 1);
        assert_eq!(field.shape, FieldShape::Integer);
        assert!(desc.field("Missing").is_none());
    }
}
