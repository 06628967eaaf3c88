//! Runtime validators built from type descriptors.
//!
//! # Translation rules
//! - Missing or empty descriptor → [`Validator::Any`]
//! - `enum` present → [`Validator::Enum`], whatever the base type says
//! - `object` → declared properties checked recursively; a property is optional
//!   unless listed in `required`; undeclared properties are accepted
//! - `array` → every element checked against `items`, or anything when absent
//! - Unknown base types → [`Validator::Any`]

use relay_config::TypeDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::ident::{is_identifier, quote_key};

/// A check for one value shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Validator {
  Any,
  String,
  Number,
  Integer,
  Boolean,
  Null,
  Array { items: Option<Box<Validator>> },
  Object { fields: Vec<Field> },
  Enum { values: Vec<Value> },
}

/// A declared object property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
  pub name: String,
  pub validator: Validator,
  pub required: bool,
}

/// Translate a descriptor into a validator.
pub fn translate(descriptor: Option<&TypeDescriptor>) -> Validator {
  let Some(descriptor) = descriptor.filter(|d| !d.is_empty()) else {
    return Validator::Any;
  };

  if let Some(values) = &descriptor.enum_values {
    return Validator::Enum {
      values: values.clone(),
    };
  }

  match descriptor.kind.as_deref() {
    Some("string") => Validator::String,
    Some("number") => Validator::Number,
    Some("integer") => Validator::Integer,
    Some("boolean") => Validator::Boolean,
    Some("null") => Validator::Null,
    Some("array") => Validator::Array {
      items: descriptor
        .items
        .as_deref()
        .map(|items| Box::new(translate(Some(items)))),
    },
    Some("object") => translate_object(descriptor),
    // Properties without a base type still describe an object
    None if !descriptor.properties.is_empty() => translate_object(descriptor),
    _ => Validator::Any,
  }
}

fn translate_object(descriptor: &TypeDescriptor) -> Validator {
  let fields = descriptor
    .properties
    .iter()
    .map(|(name, property)| Field {
      name: name.clone(),
      validator: translate(Some(property)),
      required: descriptor.is_required(name),
    })
    .collect();

  Validator::Object { fields }
}

impl Validator {
  /// Check a value, reporting the first mismatch.
  pub fn validate(&self, value: &Value) -> Result<(), SchemaError> {
    self.check(value, "$")
  }

  /// True when every value passes.
  pub fn is_permissive(&self) -> bool {
    matches!(self, Validator::Any)
  }

  fn check(&self, value: &Value, path: &str) -> Result<(), SchemaError> {
    match self {
      Validator::Any => Ok(()),
      Validator::String => expect(value.is_string(), "string", value, path),
      Validator::Number => expect(value.is_number(), "number", value, path),
      Validator::Integer => expect(is_integer(value), "integer", value, path),
      Validator::Boolean => expect(value.is_boolean(), "boolean", value, path),
      Validator::Null => expect(value.is_null(), "null", value, path),
      Validator::Enum { values } => {
        if values.contains(value) {
          Ok(())
        } else {
          Err(SchemaError::new(
            path,
            format!(
              "expected one of [{}], got {}",
              render_values(values),
              value
            ),
          ))
        }
      }
      Validator::Array { items } => {
        let Value::Array(elements) = value else {
          return Err(mismatch("array", value, path));
        };
        if let Some(items) = items {
          for (index, element) in elements.iter().enumerate() {
            items.check(element, &format!("{}[{}]", path, index))?;
          }
        }
        Ok(())
      }
      Validator::Object { fields } => {
        let Value::Object(map) = value else {
          return Err(mismatch("object", value, path));
        };
        for field in fields {
          let field_path = child_path(path, &field.name);
          match map.get(&field.name) {
            Some(field_value) => field.validator.check(field_value, &field_path)?,
            None if field.required => {
              return Err(SchemaError::new(&field_path, "required field is missing"));
            }
            None => {}
          }
        }
        Ok(())
      }
    }
  }

  /// Render the validator as inspectable source text.
  pub fn render(&self) -> String {
    match self {
      Validator::Any => "any()".to_string(),
      Validator::String => "string()".to_string(),
      Validator::Number => "number()".to_string(),
      Validator::Integer => "integer()".to_string(),
      Validator::Boolean => "boolean()".to_string(),
      Validator::Null => "null()".to_string(),
      Validator::Enum { values } => format!("enum([{}])", render_values(values)),
      Validator::Array { items } => match items {
        Some(items) => format!("array({})", items.render()),
        None => "array(any())".to_string(),
      },
      Validator::Object { fields } if fields.is_empty() => "object({})".to_string(),
      Validator::Object { fields } => {
        let rendered: Vec<String> = fields
          .iter()
          .map(|field| {
            let optional = if field.required { "" } else { ".optional()" };
            format!(
              "{}: {}{}",
              quote_key(&field.name),
              field.validator.render(),
              optional
            )
          })
          .collect();
        format!("object({{ {} }})", rendered.join(", "))
      }
    }
  }
}

fn is_integer(value: &Value) -> bool {
  value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|f| f.fract() == 0.0)
}

fn expect(ok: bool, expected: &str, value: &Value, path: &str) -> Result<(), SchemaError> {
  if ok {
    Ok(())
  } else {
    Err(mismatch(expected, value, path))
  }
}

fn mismatch(expected: &str, value: &Value, path: &str) -> SchemaError {
  SchemaError::new(
    path,
    format!("expected {}, got {}", expected, type_name(value)),
  )
}

fn type_name(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "boolean",
    Value::Number(_) => "number",
    Value::String(_) => "string",
    Value::Array(_) => "array",
    Value::Object(_) => "object",
  }
}

fn child_path(parent: &str, name: &str) -> String {
  if is_identifier(name) {
    format!("{}.{}", parent, name)
  } else {
    format!("{}[{}]", parent, quote_key(name))
  }
}

fn render_values(values: &[Value]) -> String {
  values
    .iter()
    .map(|v| v.to_string())
    .collect::<Vec<_>>()
    .join(", ")
}
