//! Table columns as a closed set of kinds, each with its own rendering rule.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::record::{value_to_text, Record};
use super::EntityKind;

/// Visual emphasis of a rendered cell; the UI maps it to a color
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
  Normal,
  Muted,
  Positive,
  Negative,
  Warning,
}

/// A rendered table cell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
  pub text: String,
  pub tone: Tone,
}

impl Cell {
  fn new(text: impl Into<String>, tone: Tone) -> Self {
    Self {
      text: text.into(),
      tone,
    }
  }

  fn empty() -> Self {
    Self::new("-", Tone::Muted)
  }
}

/// A column of an entity table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
  /// Field value as-is
  Text {
    header: &'static str,
    field: &'static str,
    width: u16,
  },
  /// Boolean or status value with a tone
  Badge {
    header: &'static str,
    field: &'static str,
    width: u16,
  },
  /// ISO date or timestamp shown as `dd/mm/yyyy`
  Date {
    header: &'static str,
    field: &'static str,
    width: u16,
  },
  /// Foreign key resolved to the parent's display name
  Lookup {
    header: &'static str,
    field: &'static str,
    parent: EntityKind,
    width: u16,
  },
}

impl Column {
  pub const fn text(header: &'static str, field: &'static str, width: u16) -> Self {
    Column::Text {
      header,
      field,
      width,
    }
  }

  pub const fn badge(header: &'static str, field: &'static str, width: u16) -> Self {
    Column::Badge {
      header,
      field,
      width,
    }
  }

  pub const fn date(header: &'static str, field: &'static str, width: u16) -> Self {
    Column::Date {
      header,
      field,
      width,
    }
  }

  pub const fn lookup(
    header: &'static str,
    field: &'static str,
    parent: EntityKind,
    width: u16,
  ) -> Self {
    Column::Lookup {
      header,
      field,
      parent,
      width,
    }
  }

  pub fn header(&self) -> &'static str {
    match self {
      Column::Text { header, .. }
      | Column::Badge { header, .. }
      | Column::Date { header, .. }
      | Column::Lookup { header, .. } => header,
    }
  }

  pub fn width(&self) -> u16 {
    match self {
      Column::Text { width, .. }
      | Column::Badge { width, .. }
      | Column::Date { width, .. }
      | Column::Lookup { width, .. } => *width,
    }
  }

  pub fn field(&self) -> &'static str {
    match self {
      Column::Text { field, .. }
      | Column::Badge { field, .. }
      | Column::Date { field, .. }
      | Column::Lookup { field, .. } => field,
    }
  }

  /// Parent collection needed to render this column
  pub fn parent(&self) -> Option<EntityKind> {
    match self {
      Column::Lookup { parent, .. } => Some(*parent),
      _ => None,
    }
  }

  pub fn render(&self, record: &Record, lookups: &Lookups) -> Cell {
    match *self {
      Column::Text { field, .. } => match record.text(field) {
        Some(text) if !text.is_empty() => Cell::new(text, Tone::Normal),
        _ => Cell::empty(),
      },
      Column::Badge { field, .. } => match record.get(field) {
        Some(Value::Bool(true)) => Cell::new("Sí", Tone::Positive),
        Some(Value::Bool(false)) => Cell::new("No", Tone::Negative),
        Some(value) => {
          let text = value_to_text(value);
          let tone = badge_tone(&text);
          Cell::new(text.replace('_', " "), tone)
        }
        None => Cell::empty(),
      },
      Column::Date { field, .. } => match record.text(field) {
        Some(raw) => Cell::new(format_date(&raw), Tone::Normal),
        None => Cell::empty(),
      },
      Column::Lookup { field, parent, .. } => match record.reference(field) {
        Some(id) => match lookups.name(parent, id) {
          Some(name) => Cell::new(name, Tone::Normal),
          None => Cell::new(format!("#{}", id), Tone::Muted),
        },
        None => Cell::empty(),
      },
    }
  }

  /// Order two records by this column. Empty cells go last in both directions.
  pub fn compare(&self, a: &Record, b: &Record, lookups: &Lookups, descending: bool) -> Ordering {
    match (self.sort_key(a, lookups), self.sort_key(b, lookups)) {
      (SortKey::Missing, SortKey::Missing) => Ordering::Equal,
      (SortKey::Missing, _) => Ordering::Greater,
      (_, SortKey::Missing) => Ordering::Less,
      (x, y) => {
        let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        if descending {
          ord.reverse()
        } else {
          ord
        }
      }
    }
  }

  fn sort_key(&self, record: &Record, lookups: &Lookups) -> SortKey {
    if let Column::Lookup { field, parent, .. } = *self {
      return match record.reference(field) {
        Some(id) => match lookups.name(parent, id) {
          Some(name) => SortKey::Text(name.to_lowercase()),
          None => SortKey::Text(format!("#{}", id)),
        },
        None => SortKey::Missing,
      };
    }
    let field = self.field();
    if field == "id" {
      return SortKey::Number(record.id as f64);
    }
    match record.get(field) {
      Some(Value::Number(n)) => n.as_f64().map_or(SortKey::Missing, SortKey::Number),
      Some(Value::Bool(b)) => SortKey::Number(if *b { 1.0 } else { 0.0 }),
      Some(value) => {
        let text = value_to_text(value);
        if text.is_empty() {
          SortKey::Missing
        } else {
          SortKey::Text(text.to_lowercase())
        }
      }
      None => SortKey::Missing,
    }
  }
}

// Numbers sort before text when a column mixes both
#[derive(Debug, PartialEq, PartialOrd)]
enum SortKey {
  Number(f64),
  Text(String),
  Missing,
}

/// Tone for a free-form status value
fn badge_tone(value: &str) -> Tone {
  match value.to_lowercase().as_str() {
    "activo" | "activa" | "culminado" | "aprobado" | "true" | "1" => Tone::Positive,
    "en_ejecucion" | "en ejecución" | "en_proceso" | "pendiente" => Tone::Warning,
    "inactivo" | "inactiva" | "cancelado" | "rechazado" | "false" | "0" => Tone::Negative,
    _ => Tone::Normal,
  }
}

/// Format an ISO date or RFC 3339 timestamp as `dd/mm/yyyy`; anything else is
/// returned unchanged.
pub fn format_date(raw: &str) -> String {
  if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
    return ts.format("%d/%m/%Y").to_string();
  }
  let date_part = raw.get(..10).unwrap_or(raw);
  match NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
    Ok(date) => date.format("%d/%m/%Y").to_string(),
    Err(_) => raw.to_string(),
  }
}

/// Display names of parent records, by collection and id
#[derive(Debug, Clone, Default)]
pub struct Lookups {
  names: HashMap<EntityKind, HashMap<i64, String>>,
}

impl Lookups {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, kind: EntityKind, records: &[Record]) {
    let names = records
      .iter()
      .map(|r| (r.id, r.display_name(kind)))
      .collect();
    self.names.insert(kind, names);
  }

  pub fn name(&self, kind: EntityKind, id: i64) -> Option<&str> {
    self.names.get(&kind)?.get(&id).map(String::as_str)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn record(value: Value) -> Record {
    serde_json::from_value(value).unwrap()
  }

  #[test]
  fn test_text_column() {
    let col = Column::text("Nombre", "nombre", 20);
    let cell = col.render(&record(json!({"id": 1, "nombre": "Lara"})), &Lookups::new());
    assert_eq!(cell, Cell::new("Lara", Tone::Normal));

    let missing = col.render(&record(json!({"id": 1})), &Lookups::new());
    assert_eq!(missing.tone, Tone::Muted);
  }

  #[test]
  fn test_badge_column() {
    let col = Column::badge("Activo", "activo", 8);
    assert_eq!(
      col.render(&record(json!({"id": 1, "activo": true})), &Lookups::new()),
      Cell::new("Sí", Tone::Positive)
    );

    let status = Column::badge("Estatus", "estatus", 12);
    assert_eq!(
      status.render(&record(json!({"id": 1, "estatus": "en_ejecucion"})), &Lookups::new()),
      Cell::new("en ejecucion", Tone::Warning)
    );
  }

  #[test]
  fn test_date_column_formats() {
    assert_eq!(format_date("2024-07-28"), "28/07/2024");
    assert_eq!(format_date("2024-07-28T10:00:00Z"), "28/07/2024");
    assert_eq!(format_date("2024-07-28 10:00:00"), "28/07/2024");
    assert_eq!(format_date("mañana"), "mañana");
  }

  #[test]
  fn test_lookup_column_resolves_parent_name() {
    let mut lookups = Lookups::new();
    lookups.insert(
      EntityKind::Estados,
      &[record(json!({"id": 3, "nombre": "Carabobo"}))],
    );
    let col = Column::lookup("Estado", "estado_id", EntityKind::Estados, 16);

    let known = col.render(&record(json!({"id": 10, "estado_id": 3})), &lookups);
    assert_eq!(known, Cell::new("Carabobo", Tone::Normal));

    let unknown = col.render(&record(json!({"id": 11, "estado_id": 4})), &lookups);
    assert_eq!(unknown, Cell::new("#4", Tone::Muted));
  }

  #[test]
  fn test_compare_orders_numbers_and_text() {
    let lookups = Lookups::new();
    let id = Column::text("ID", "id", 6);
    let a = record(json!({"id": 2, "nombre": "zulia"}));
    let b = record(json!({"id": 10, "nombre": "Apure"}));
    assert_eq!(id.compare(&a, &b, &lookups, false), Ordering::Less);
    assert_eq!(id.compare(&a, &b, &lookups, true), Ordering::Greater);

    let nombre = Column::text("Nombre", "nombre", 20);
    assert_eq!(nombre.compare(&a, &b, &lookups, false), Ordering::Greater);
  }

  #[test]
  fn test_compare_puts_empty_cells_last() {
    let lookups = Lookups::new();
    let col = Column::text("Nombre", "nombre", 20);
    let named = record(json!({"id": 1, "nombre": "Lara"}));
    let blank = record(json!({"id": 2, "nombre": null}));
    assert_eq!(col.compare(&blank, &named, &lookups, false), Ordering::Greater);
    assert_eq!(col.compare(&blank, &named, &lookups, true), Ordering::Greater);
  }

  #[test]
  fn test_compare_lookup_uses_parent_name() {
    let mut lookups = Lookups::new();
    lookups.insert(
      EntityKind::Estados,
      &[
        record(json!({"id": 1, "nombre": "Zulia"})),
        record(json!({"id": 2, "nombre": "apure"})),
      ],
    );
    let col = Column::lookup("Estado", "estado_id", EntityKind::Estados, 16);
    let zulia = record(json!({"id": 10, "estado_id": 1}));
    let apure = record(json!({"id": 11, "estado_id": 2}));
    assert_eq!(col.compare(&apure, &zulia, &lookups, false), Ordering::Less);
  }
}
