use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EntityKind;

/// A single row of any entity collection.
///
/// The backend assigns `id`; every other attribute lives in `fields` and is
/// interpreted through the entity's descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub id: i64,
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

impl Record {
  pub fn new(id: i64, fields: Map<String, Value>) -> Self {
    Self { id, fields }
  }

  pub fn get(&self, field: &str) -> Option<&Value> {
    self.fields.get(field).filter(|v| !v.is_null())
  }

  /// Text form of a field, `None` when missing or null.
  /// `id` resolves to the record identifier.
  pub fn text(&self, field: &str) -> Option<String> {
    if field == "id" {
      return Some(self.id.to_string());
    }
    self.get(field).map(value_to_text)
  }

  /// Foreign key value, accepting numbers and numeric strings
  pub fn reference(&self, field: &str) -> Option<i64> {
    match self.get(field)? {
      Value::Number(n) => n.as_i64(),
      Value::String(s) => s.trim().parse().ok(),
      _ => None,
    }
  }

  /// Name used in pickers, lookups and confirmation prompts; never empty
  pub fn display_name(&self, kind: EntityKind) -> String {
    let name = kind
      .descriptor()
      .display_fields
      .iter()
      .filter_map(|f| self.text(f))
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .collect::<Vec<_>>()
      .join(" ");

    if name.is_empty() {
      format!("#{}", self.id)
    } else {
      name
    }
  }
}

/// Plain text rendering of a JSON scalar
pub fn value_to_text(value: &Value) -> String {
  match value {
    Value::Null => String::new(),
    Value::String(s) => s.clone(),
    Value::Bool(b) => b.to_string(),
    Value::Number(n) => n.to_string(),
    other => other.to_string(),
  }
}
