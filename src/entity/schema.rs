//! Declarative field schemas and form validation.
//!
//! Forms work on raw strings (one per field); validation turns them into the
//! JSON payload sent to the API. Create and update use different rules:
//! create sends every non-empty field and enforces `required`, update sends
//! only the fields that changed and refuses to clear required ones.

use chrono::{NaiveDate, NaiveTime};
use serde_json::{Map, Number, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use validator::ValidateEmail;

use super::record::{value_to_text, Record};
use super::EntityKind;

/// Input kind of a form field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
  Text,
  Email,
  /// Write-only; never pre-filled and omitted on update when left blank
  Password,
  /// Whole number, never negative
  Integer,
  Decimal,
  /// `YYYY-MM-DD`
  Date,
  /// `HH:MM`
  Time,
  Bool,
  /// One of a fixed set of values
  Choice(&'static [&'static str]),
  /// Id of a record in the parent collection
  ForeignKey(EntityKind),
}

/// One field of an entity form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
  pub name: &'static str,
  pub label: &'static str,
  pub kind: FieldKind,
  pub required: bool,
  pub min_len: Option<usize>,
  pub max_len: Option<usize>,
}

impl FieldSpec {
  pub const fn new(name: &'static str, label: &'static str, kind: FieldKind) -> Self {
    Self {
      name,
      label,
      kind,
      required: false,
      min_len: None,
      max_len: None,
    }
  }

  pub const fn text(name: &'static str, label: &'static str) -> Self {
    Self::new(name, label, FieldKind::Text)
  }

  pub const fn required(mut self) -> Self {
    self.required = true;
    self
  }

  pub const fn min_len(mut self, len: usize) -> Self {
    self.min_len = Some(len);
    self
  }

  pub const fn max_len(mut self, len: usize) -> Self {
    self.max_len = Some(len);
    self
  }

  pub fn is_write_only(&self) -> bool {
    matches!(self.kind, FieldKind::Password)
  }

  /// Parent collection this field depends on
  pub fn parent(&self) -> Option<EntityKind> {
    match self.kind {
      FieldKind::ForeignKey(parent) => Some(parent),
      _ => None,
    }
  }

  /// Parse a non-empty raw value into its JSON form
  fn parse(&self, raw: &str, ctx: &ValidationContext) -> Result<Value, String> {
    let len = raw.chars().count();
    if let Some(min) = self.min_len {
      if len < min {
        return Err(format!("must be at least {} characters", min));
      }
    }
    if let Some(max) = self.max_len {
      if len > max {
        return Err(format!("must be at most {} characters", max));
      }
    }

    match self.kind {
      FieldKind::Text | FieldKind::Password => Ok(Value::String(raw.to_string())),
      FieldKind::Email => {
        if raw.to_string().validate_email() {
          Ok(Value::String(raw.to_string()))
        } else {
          Err("must be a valid email address".to_string())
        }
      }
      FieldKind::Integer => match raw.parse::<i64>() {
        Ok(n) if n >= 0 => Ok(Value::Number(n.into())),
        Ok(_) => Err("must not be negative".to_string()),
        Err(_) => Err("must be a whole number".to_string()),
      },
      FieldKind::Decimal => raw
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| "must be a number".to_string()),
      FieldKind::Date => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map(|_| Value::String(raw.to_string()))
        .map_err(|_| "must be a date (YYYY-MM-DD)".to_string()),
      FieldKind::Time => NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map(|_| Value::String(raw.to_string()))
        .map_err(|_| "must be a time (HH:MM)".to_string()),
      FieldKind::Bool => match raw {
        "true" => Ok(Value::Bool(true)),
        "false" => Ok(Value::Bool(false)),
        _ => Err("must be yes or no".to_string()),
      },
      FieldKind::Choice(options) => {
        if options.contains(&raw) {
          Ok(Value::String(raw.to_string()))
        } else {
          Err(format!("must be one of: {}", options.join(", ")))
        }
      }
      FieldKind::ForeignKey(parent) => {
        let id: i64 = raw
          .parse()
          .map_err(|_| format!("select a {}", parent.descriptor().singular))?;
        match ctx.parent_ids.get(&parent) {
          None => Err(format!("{} not loaded yet", parent.descriptor().title)),
          Some(ids) if ids.contains(&id) => Ok(Value::Number(id.into())),
          Some(_) => Err(format!(
            "unknown {} #{}",
            parent.descriptor().singular,
            id
          )),
        }
      }
    }
  }
}

/// Data the validator needs beyond the raw values: the ids of every parent
/// collection the form depends on.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
  parent_ids: HashMap<EntityKind, HashSet<i64>>,
}

impl ValidationContext {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn set_parents(&mut self, kind: EntityKind, records: &[Record]) {
    self
      .parent_ids
      .insert(kind, records.iter().map(|r| r.id).collect());
  }
}

/// Per-field validation messages keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn remove(&mut self, field: &str) {
    self.0.remove(field);
  }

  fn insert(&mut self, field: &'static str, message: String) {
    self.0.insert(field, message);
  }
}

/// Raw form values for a field list, pre-filled from `record` when editing
pub fn initial_values(fields: &[FieldSpec], record: Option<&Record>) -> Vec<String> {
  fields
    .iter()
    .map(|spec| match (record, spec.kind) {
      (_, FieldKind::Password) => String::new(),
      (None, FieldKind::Bool) => "false".to_string(),
      (None, FieldKind::Choice(options)) => options.first().map(|s| s.to_string()).unwrap_or_default(),
      (None, _) => String::new(),
      (Some(r), FieldKind::Bool) => r
        .get(spec.name)
        .and_then(Value::as_bool)
        .unwrap_or(false)
        .to_string(),
      (Some(r), _) => r.get(spec.name).map(value_to_text).unwrap_or_default(),
    })
    .collect()
}

/// Validate a create submission: every field checked, empty optionals omitted.
pub fn validate_create(
  fields: &[FieldSpec],
  values: &[String],
  ctx: &ValidationContext,
) -> Result<Map<String, Value>, FieldErrors> {
  let mut payload = Map::new();
  let mut errors = FieldErrors::default();

  for (spec, raw) in fields.iter().zip(values) {
    let raw = raw.trim();
    if raw.is_empty() {
      if spec.required {
        errors.insert(spec.name, "is required".to_string());
      }
      continue;
    }
    match spec.parse(raw, ctx) {
      Ok(value) => {
        payload.insert(spec.name.to_string(), value);
      }
      Err(message) => errors.insert(spec.name, message),
    }
  }

  if errors.is_empty() {
    Ok(payload)
  } else {
    Err(errors)
  }
}

/// Validate an update submission against the record being edited.
///
/// Only changed fields are validated and returned. Required fields may stay
/// untouched but cannot be cleared; clearing an optional field sends `null`.
/// Write-only fields are sent only when filled in.
pub fn validate_update(
  fields: &[FieldSpec],
  original: &Record,
  values: &[String],
  ctx: &ValidationContext,
) -> Result<Map<String, Value>, FieldErrors> {
  let before = initial_values(fields, Some(original));
  let mut payload = Map::new();
  let mut errors = FieldErrors::default();

  for ((spec, raw), old) in fields.iter().zip(values).zip(&before) {
    let raw = raw.trim();
    if spec.is_write_only() && raw.is_empty() {
      continue;
    }
    if !spec.is_write_only() && raw == old.trim() {
      continue;
    }
    if raw.is_empty() {
      if spec.required {
        errors.insert(spec.name, "cannot be cleared".to_string());
      } else {
        payload.insert(spec.name.to_string(), Value::Null);
      }
      continue;
    }
    match spec.parse(raw, ctx) {
      Ok(value) => {
        payload.insert(spec.name.to_string(), value);
      }
      Err(message) => errors.insert(spec.name, message),
    }
  }

  if errors.is_empty() {
    Ok(payload)
  } else {
    Err(errors)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  const FIELDS: &[FieldSpec] = &[
    FieldSpec::text("nombre", "Nombre").required().max_len(10),
    FieldSpec::text("codigo", "Código").required(),
    FieldSpec::new("electores", "Electores", FieldKind::Integer),
    FieldSpec::new("parroquia_id", "Parroquia", FieldKind::ForeignKey(EntityKind::Parroquias))
      .required(),
  ];

  fn parroquias() -> Vec<Record> {
    vec![
      serde_json::from_value(json!({"id": 1, "nombre": "Catedral"})).unwrap(),
      serde_json::from_value(json!({"id": 2, "nombre": "Altagracia"})).unwrap(),
    ]
  }

  fn ctx() -> ValidationContext {
    let mut ctx = ValidationContext::new();
    ctx.set_parents(EntityKind::Parroquias, &parroquias());
    ctx
  }

  fn values(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
  }

  #[test]
  fn test_create_valid_payload() {
    let payload = validate_create(FIELDS, &values(&["UE Bolívar", "C-01", "350", "2"]), &ctx()).unwrap();
    assert_eq!(
      Value::Object(payload),
      json!({"nombre": "UE Bolívar", "codigo": "C-01", "electores": 350, "parroquia_id": 2})
    );
  }

  #[test]
  fn test_create_reports_every_invalid_field() {
    let errors = validate_create(FIELDS, &values(&["", "C-01", "-3", "99"]), &ctx()).unwrap_err();
    assert_eq!(errors.len(), 3);
    assert_eq!(errors.get("nombre"), Some("is required"));
    assert_eq!(errors.get("electores"), Some("must not be negative"));
    assert_eq!(errors.get("parroquia_id"), Some("unknown Parroquia #99"));
    assert_eq!(errors.get("codigo"), None);
  }

  #[test]
  fn test_create_omits_empty_optionals() {
    let payload = validate_create(FIELDS, &values(&["A", "B", "  ", "1"]), &ctx()).unwrap();
    assert!(!payload.contains_key("electores"));
  }

  #[test]
  fn test_foreign_key_requires_loaded_parents() {
    let errors =
      validate_create(FIELDS, &values(&["A", "B", "", "1"]), &ValidationContext::new()).unwrap_err();
    assert_eq!(errors.get("parroquia_id"), Some("Parroquias not loaded yet"));
  }

  #[test]
  fn test_max_len_counts_characters() {
    let errors = validate_create(FIELDS, &values(&["ÁÁÁÁÁÁÁÁÁÁÁ", "B", "", "1"]), &ctx()).unwrap_err();
    assert_eq!(errors.get("nombre"), Some("must be at most 10 characters"));
  }

  #[test]
  fn test_update_sends_only_changed_fields() {
    let original: Record = serde_json::from_value(
      json!({"id": 5, "nombre": "Viejo", "codigo": "C-01", "electores": 10, "parroquia_id": 1}),
    )
    .unwrap();
    let mut current = initial_values(FIELDS, Some(&original));
    current[0] = "Nuevo".to_string();

    let payload = validate_update(FIELDS, &original, &current, &ValidationContext::new()).unwrap();
    assert_eq!(Value::Object(payload), json!({"nombre": "Nuevo"}));
  }

  #[test]
  fn test_update_rejects_clearing_required_and_nulls_optionals() {
    let original: Record = serde_json::from_value(
      json!({"id": 5, "nombre": "Viejo", "codigo": "C-01", "electores": 10, "parroquia_id": 1}),
    )
    .unwrap();
    let errors = validate_update(FIELDS, &original, &values(&["", "C-01", "10", "1"]), &ctx())
      .unwrap_err();
    assert_eq!(errors.get("nombre"), Some("cannot be cleared"));

    let payload =
      validate_update(FIELDS, &original, &values(&["Viejo", "C-01", "", "1"]), &ctx()).unwrap();
    assert_eq!(Value::Object(payload), json!({"electores": null}));
  }

  #[test]
  fn test_password_is_write_only() {
    let fields = &[
      FieldSpec::text("username", "Usuario").required(),
      FieldSpec::new("password", "Contraseña", FieldKind::Password)
        .required()
        .min_len(6),
    ];
    let original: Record =
      serde_json::from_value(json!({"id": 1, "username": "ana", "password": "hash"})).unwrap();

    let initial = initial_values(fields, Some(&original));
    assert_eq!(initial, values(&["ana", ""]));

    let unchanged = validate_update(fields, &original, &initial, &ValidationContext::new()).unwrap();
    assert!(unchanged.is_empty());

    let errors =
      validate_update(fields, &original, &values(&["ana", "123"]), &ValidationContext::new())
        .unwrap_err();
    assert_eq!(errors.get("password"), Some("must be at least 6 characters"));
  }

  #[test]
  fn test_kind_parsing() {
    let ctx = ValidationContext::new();
    let email = FieldSpec::new("email", "Correo", FieldKind::Email);
    assert!(email.parse("ana@example.com", &ctx).is_ok());
    assert!(email.parse("not-an-email", &ctx).is_err());

    let date = FieldSpec::new("fecha", "Fecha", FieldKind::Date);
    assert_eq!(date.parse("2024-07-28", &ctx), Ok(json!("2024-07-28")));
    assert!(date.parse("28/07/2024", &ctx).is_err());

    let time = FieldSpec::new("hora", "Hora", FieldKind::Time);
    assert!(time.parse("14:30", &ctx).is_ok());
    assert!(time.parse("25:00", &ctx).is_err());

    let decimal = FieldSpec::new("latitud", "Latitud", FieldKind::Decimal);
    assert_eq!(decimal.parse("-66.9", &ctx), Ok(json!(-66.9)));

    let choice = FieldSpec::new("estatus", "Estatus", FieldKind::Choice(&["a", "b"]));
    assert!(choice.parse("c", &ctx).is_err());

    let flag = FieldSpec::new("activo", "Activo", FieldKind::Bool);
    assert_eq!(flag.parse("true", &ctx), Ok(json!(true)));
  }
}
