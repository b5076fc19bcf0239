//! Structural shapes declared on steps.
//!
//! A [`Schema`] is a JSON-Schema-like contract describing the value a step
//! accepts or produces. Shapes are only compared at compile time; nothing
//! here enforces them against runtime values.
//!
//! ```yaml
//! type: object
//! properties:
//!   email: { type: string, pattern: "^.+@.+$" }
//!   tags: { type: array, items: { type: string } }
//! required: [email]
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Primitive type names a shape may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
  String,
  Number,
  Integer,
  Boolean,
  Null,
  Array,
  Object,
}

impl SchemaType {
  pub fn as_str(&self) -> &'static str {
    match self {
      SchemaType::String => "string",
      SchemaType::Number => "number",
      SchemaType::Integer => "integer",
      SchemaType::Boolean => "boolean",
      SchemaType::Null => "null",
      SchemaType::Array => "array",
      SchemaType::Object => "object",
    }
  }
}

/// `type: string` or `type: [string, "null"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSet {
  One(SchemaType),
  Many(Vec<SchemaType>),
}

impl TypeSet {
  pub fn to_vec(&self) -> Vec<SchemaType> {
    match self {
      TypeSet::One(t) => vec![*t],
      TypeSet::Many(ts) => ts.clone(),
    }
  }
}

/// A structural shape: object/array/primitive with optional constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub schema_type: Option<TypeSet>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub properties: BTreeMap<String, Schema>,

  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub required: Vec<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub items: Option<Box<Schema>>,

  #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
  pub enum_values: Option<Vec<serde_json::Value>>,

  /// Alternative spelling of a `null` member in `type`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nullable: Option<bool>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub min_length: Option<u64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub max_length: Option<u64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub minimum: Option<f64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub maximum: Option<f64>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pattern: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl Schema {
  /// A shape declaring only the given type.
  pub fn of_type(schema_type: SchemaType) -> Self {
    Self {
      schema_type: Some(TypeSet::One(schema_type)),
      ..Self::default()
    }
  }

  /// An array shape whose elements follow `items` (unconstrained when `None`).
  pub fn array_of(items: Option<Schema>) -> Self {
    Self {
      schema_type: Some(TypeSet::One(SchemaType::Array)),
      items: items.map(Box::new),
      ..Self::default()
    }
  }

  /// Declared types, empty when the shape does not declare `type`.
  pub fn types(&self) -> Vec<SchemaType> {
    self
      .schema_type
      .as_ref()
      .map(TypeSet::to_vec)
      .unwrap_or_default()
  }

  /// Declared types without the `null` member.
  pub fn non_null_types(&self) -> Vec<SchemaType> {
    self
      .types()
      .into_iter()
      .filter(|t| *t != SchemaType::Null)
      .collect()
  }

  pub fn declares_type(&self) -> bool {
    self.schema_type.is_some()
  }

  pub fn has_type(&self, schema_type: SchemaType) -> bool {
    self.types().contains(&schema_type)
  }

  /// Whether the shape admits `null` / absence.
  pub fn permits_null(&self) -> bool {
    self.nullable == Some(true) || self.has_type(SchemaType::Null)
  }

  pub fn is_array(&self) -> bool {
    self.has_type(SchemaType::Array)
  }

  pub fn is_object(&self) -> bool {
    self.has_type(SchemaType::Object)
  }

  /// Names of the scalar constraints this shape declares.
  pub fn scalar_constraints(&self) -> Vec<&'static str> {
    let mut names = Vec::new();
    if self.min_length.is_some() {
      names.push("minLength");
    }
    if self.max_length.is_some() {
      names.push("maxLength");
    }
    if self.minimum.is_some() {
      names.push("minimum");
    }
    if self.maximum.is_some() {
      names.push("maximum");
    }
    if self.pattern.is_some() {
      names.push("pattern");
    }
    if self.enum_values.is_some() {
      names.push("enum");
    }
    names
  }
}
