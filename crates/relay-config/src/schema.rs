//! Abstract type descriptors for step and workflow inputs/outputs.
//!
//! A descriptor is a small JSON-schema-like tree:
//!
//! ```json
//! {
//!   "type": "object",
//!   "properties": {
//!     "title": { "type": "string" },
//!     "tone": { "type": "string", "enum": ["formal", "casual"] }
//!   },
//!   "required": ["title"]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A recursive type description for a JSON value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeDescriptor {
  /// Base type name (`string`, `number`, `integer`, `boolean`, `null`, `array`, `object`).
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub properties: BTreeMap<String, TypeDescriptor>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub items: Option<Box<TypeDescriptor>>,

  /// Property names that must be present. Everything else is optional.
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub required: Vec<String>,

  #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
  pub enum_values: Option<Vec<serde_json::Value>>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

impl TypeDescriptor {
  /// A descriptor with only a base type.
  pub fn of(kind: impl Into<String>) -> Self {
    Self {
      kind: Some(kind.into()),
      ..Self::default()
    }
  }

  /// An object descriptor with the given properties and required names.
  pub fn object<I, K>(properties: I, required: &[&str]) -> Self
  where
    I: IntoIterator<Item = (K, TypeDescriptor)>,
    K: Into<String>,
  {
    Self {
      kind: Some("object".to_string()),
      properties: properties.into_iter().map(|(k, v)| (k.into(), v)).collect(),
      required: required.iter().map(|r| r.to_string()).collect(),
      ..Self::default()
    }
  }

  /// An array descriptor, optionally constraining its elements.
  pub fn array(items: Option<TypeDescriptor>) -> Self {
    Self {
      kind: Some("array".to_string()),
      items: items.map(Box::new),
      ..Self::default()
    }
  }

  /// A string descriptor restricted to a fixed set of values.
  pub fn enumeration<I, V>(values: I) -> Self
  where
    I: IntoIterator<Item = V>,
    V: Into<serde_json::Value>,
  {
    Self {
      kind: Some("string".to_string()),
      enum_values: Some(values.into_iter().map(Into::into).collect()),
      ..Self::default()
    }
  }

  /// True when the descriptor constrains nothing.
  pub fn is_empty(&self) -> bool {
    self.kind.as_deref().is_none_or(str::is_empty)
      && self.properties.is_empty()
      && self.items.is_none()
      && self.required.is_empty()
      && self.enum_values.is_none()
  }

  pub fn is_required(&self, property: &str) -> bool {
    self.required.iter().any(|r| r == property)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_deserialize_nested_descriptor() {
    let descriptor: TypeDescriptor = serde_json::from_value(json!({
      "type": "object",
      "properties": {
        "tags": { "type": "array", "items": { "type": "string" } },
        "tone": { "type": "string", "enum": ["formal", "casual"] }
      },
      "required": ["tags"]
    }))
    .unwrap();

    assert_eq!(descriptor.kind.as_deref(), Some("object"));
    assert!(descriptor.is_required("tags"));
    assert!(!descriptor.is_required("tone"));
    assert_eq!(
      descriptor.properties["tags"].items.as_deref(),
      Some(&TypeDescriptor::of("string"))
    );
    assert_eq!(
      descriptor.properties["tone"].enum_values,
      Some(vec![json!("formal"), json!("casual")])
    );
  }

  #[test]
  fn test_empty_descriptor() {
    assert!(TypeDescriptor::default().is_empty());
    assert!(TypeDescriptor::of("").is_empty());
    assert!(!TypeDescriptor::of("string").is_empty());
    assert!(!TypeDescriptor::array(None).is_empty());
  }
}
