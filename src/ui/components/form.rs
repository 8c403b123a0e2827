use super::input::{InputResult, TextInput};
use super::option_picker::{OptionPicker, PickerEvent, PickerOption};
use super::KeyResult;
use crate::entity::schema::{initial_values, validate_create, validate_update};
use crate::entity::{EntityKind, FieldErrors, FieldKind, FieldSpec, Record, ValidationContext};
use crate::ui::view::{ShortcutInfo, ShortcutProvider};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use serde_json::{Map, Value};
use std::collections::HashMap;

/// A validated request the parent should send
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
  Create(Map<String, Value>),
  /// Only the changed fields
  Update { id: i64, payload: Map<String, Value> },
}

/// Events emitted by the form that parent needs to handle
#[derive(Debug, Clone, PartialEq)]
pub enum FormEvent {
  Submit(Submission),
  /// Edit submitted without changes; the form has closed
  NoChanges,
  Cancelled,
}

/// Create/edit modal for one entity type.
///
/// Values are edited as raw strings and only turned into a payload by the
/// entity's field schema on submit. Foreign keys, choices and flags are
/// picked from a list instead of typed.
pub struct EntityForm {
  kind: EntityKind,
  /// Record being edited; None while creating
  editing: Option<Record>,
  active: bool,
  inputs: Vec<TextInput>,
  focused: usize,
  errors: FieldErrors,
  context: ValidationContext,
  parents: HashMap<EntityKind, Vec<Record>>,
  picker: OptionPicker,
  busy: bool,
}

impl EntityForm {
  pub fn new(kind: EntityKind) -> Self {
    Self {
      kind,
      editing: None,
      active: false,
      inputs: Vec::new(),
      focused: 0,
      errors: FieldErrors::default(),
      context: ValidationContext::new(),
      parents: HashMap::new(),
      picker: OptionPicker::new(),
      busy: false,
    }
  }

  fn fields(&self) -> &'static [FieldSpec] {
    self.kind.descriptor().fields
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Provide a parent collection for foreign key pickers and validation
  pub fn set_parents(&mut self, kind: EntityKind, records: &[Record]) {
    self.context.set_parents(kind, records);
    self.parents.insert(kind, records.to_vec());
  }

  pub fn open_create(&mut self) {
    self.open(None);
  }

  pub fn open_edit(&mut self, record: Record) {
    self.open(Some(record));
  }

  fn open(&mut self, record: Option<Record>) {
    self.inputs = initial_values(self.fields(), record.as_ref())
      .into_iter()
      .map(TextInput::with_value)
      .collect();
    self.editing = record;
    self.focused = 0;
    self.errors = FieldErrors::default();
    self.busy = false;
    self.active = true;
  }

  /// Pre-fill a field of the open form
  pub fn preset(&mut self, field: &str, value: impl Into<String>) {
    if let Some(input) = self
      .fields()
      .iter()
      .position(|f| f.name == field)
      .and_then(|idx| self.inputs.get_mut(idx))
    {
      input.set_value(value);
    }
  }

  /// Close and reset
  pub fn close(&mut self) {
    self.active = false;
    self.editing = None;
    self.inputs.clear();
    self.errors = FieldErrors::default();
    self.picker.hide();
    self.busy = false;
  }

  /// While busy a request is in flight and input is ignored
  pub fn set_busy(&mut self, busy: bool) {
    self.busy = busy;
  }

  pub fn values(&self) -> Vec<String> {
    self.inputs.iter().map(|i| i.value().to_string()).collect()
  }

  pub fn errors(&self) -> &FieldErrors {
    &self.errors
  }

  fn focused_spec(&self) -> Option<&'static FieldSpec> {
    self.fields().get(self.focused)
  }

  fn move_focus(&mut self, delta: isize) {
    let len = self.inputs.len() as isize;
    if len > 0 {
      self.focused = (self.focused as isize + delta).rem_euclid(len) as usize;
    }
  }

  /// Choices for list-picked fields, None for typed ones
  fn options_for(&self, spec: &FieldSpec) -> Option<Vec<PickerOption>> {
    match spec.kind {
      FieldKind::Bool => Some(vec![
        PickerOption::new("true", "Sí"),
        PickerOption::new("false", "No"),
      ]),
      FieldKind::Choice(options) => Some(
        options
          .iter()
          .map(|o| PickerOption::new(*o, o.replace('_', " ")))
          .collect(),
      ),
      FieldKind::ForeignKey(parent) => Some(
        self
          .parents
          .get(&parent)
          .map(|records| {
            let mut options: Vec<PickerOption> = records
              .iter()
              .map(|r| PickerOption::new(r.id.to_string(), r.display_name(parent)))
              .collect();
            options.sort_by(|a, b| a.label.cmp(&b.label));
            options
          })
          .unwrap_or_default(),
      ),
      _ => None,
    }
  }

  fn open_picker(&mut self) {
    let Some(spec) = self.focused_spec() else {
      return;
    };
    if let Some(options) = self.options_for(spec) {
      let current = self.inputs[self.focused].value().to_string();
      self.picker.show(spec.label.to_string(), options, &current);
    }
  }

  /// Text shown for a field's raw value
  fn display_value(&self, spec: &FieldSpec, raw: &str) -> String {
    if raw.is_empty() {
      return String::new();
    }
    match spec.kind {
      FieldKind::Password => "*".repeat(raw.chars().count()),
      FieldKind::Bool => (if raw == "true" { "Sí" } else { "No" }).to_string(),
      FieldKind::Choice(_) => raw.replace('_', " "),
      FieldKind::ForeignKey(parent) => raw
        .parse::<i64>()
        .ok()
        .and_then(|id| {
          self
            .parents
            .get(&parent)
            .and_then(|records| records.iter().find(|r| r.id == id))
            .map(|r| r.display_name(parent))
        })
        .unwrap_or_else(|| format!("#{}", raw)),
      _ => raw.to_string(),
    }
  }

  fn submit(&mut self) -> KeyResult<FormEvent> {
    let values = self.values();
    let result = match &self.editing {
      None => validate_create(self.fields(), &values, &self.context).map(Submission::Create),
      Some(record) => validate_update(self.fields(), record, &values, &self.context).map(|payload| {
        Submission::Update {
          id: record.id,
          payload,
        }
      }),
    };

    match result {
      Err(errors) => {
        if let Some(first) = self
          .fields()
          .iter()
          .position(|f| errors.get(f.name).is_some())
        {
          self.focused = first;
        }
        self.errors = errors;
        KeyResult::Handled
      }
      Ok(Submission::Update { payload, .. }) if payload.is_empty() => {
        self.close();
        KeyResult::Event(FormEvent::NoChanges)
      }
      Ok(submission) => {
        self.errors = FieldErrors::default();
        KeyResult::Event(FormEvent::Submit(submission))
      }
    }
  }

  /// Handle a key event
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<FormEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }
    if self.busy {
      return KeyResult::Handled;
    }

    match self.picker.handle_key(key) {
      KeyResult::Event(PickerEvent::Selected(value)) => {
        let name = self.fields()[self.focused].name;
        self.inputs[self.focused].set_value(value);
        self.errors = self.errors_without(name);
        return KeyResult::Handled;
      }
      KeyResult::Event(PickerEvent::Cancelled) | KeyResult::Handled => return KeyResult::Handled,
      KeyResult::NotHandled => {}
    }

    let picked = self
      .focused_spec()
      .is_some_and(|spec| self.options_for(spec).is_some());

    match key.code {
      KeyCode::Esc => {
        self.close();
        return KeyResult::Event(FormEvent::Cancelled);
      }
      KeyCode::Tab | KeyCode::Down => {
        self.move_focus(1);
        return KeyResult::Handled;
      }
      KeyCode::BackTab | KeyCode::Up => {
        self.move_focus(-1);
        return KeyResult::Handled;
      }
      KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => return self.submit(),
      KeyCode::Enter | KeyCode::Char(' ') if picked => {
        self.open_picker();
        return KeyResult::Handled;
      }
      KeyCode::Backspace | KeyCode::Delete if picked => {
        self.inputs[self.focused].clear();
        return KeyResult::Handled;
      }
      KeyCode::Enter => return self.submit(),
      _ if picked => return KeyResult::Handled,
      _ => {}
    }

    match self.inputs.get_mut(self.focused).map(|i| i.handle_key(key)) {
      Some(InputResult::Consumed) => {
        let name = self.fields()[self.focused].name;
        self.errors = self.errors_without(name);
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  fn errors_without(&self, field: &str) -> FieldErrors {
    let mut errors = self.errors.clone();
    errors.remove(field);
    errors
  }

  /// Render the form overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let descriptor = self.kind.descriptor();
    let fields = self.fields();
    let label_width = fields
      .iter()
      .map(|f| f.label.chars().count() + usize::from(f.required))
      .max()
      .unwrap_or(8) as u16;

    let width = 64.min(area.width);
    let height = (fields.len() as u16 * 2 + 3).min(area.height);
    let overlay_area = super::centered(area, width, height);

    frame.render_widget(Clear, overlay_area);

    let title = match &self.editing {
      None => format!(" New {} ", descriptor.singular),
      Some(record) => format!(" Edit {} #{} ", descriptor.singular, record.id),
    };
    let status = if self.busy {
      " saving... "
    } else {
      " tab next  enter save  esc cancel "
    };
    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(title)
      .title_bottom(Line::styled(status, Style::default().fg(Color::DarkGray)).right_aligned());

    let mut lines = Vec::with_capacity(fields.len() * 2);
    for (i, (spec, input)) in fields.iter().zip(&self.inputs).enumerate() {
      let focused = i == self.focused;
      let label = format!(
        "{:>width$} ",
        format!("{}{}", spec.label, if spec.required { "*" } else { "" }),
        width = label_width as usize
      );
      let label_style = if focused {
        Style::default().fg(Color::Cyan).bold()
      } else {
        Style::default().fg(Color::Gray)
      };

      let shown = self.display_value(spec, input.value());
      let mut spans = vec![Span::styled(label, label_style)];
      if !focused {
        spans.push(Span::raw(shown));
      } else if self.options_for(spec).is_some() {
        spans.push(Span::raw(shown));
        spans.push(Span::styled(" ▾", Style::default().fg(Color::Yellow)));
      } else {
        // Block cursor over the character at the cursor
        let at = shown
          .char_indices()
          .nth(input.cursor_position())
          .map(|(i, _)| i)
          .unwrap_or(shown.len());
        let (before, after) = shown.split_at(at);
        let mut rest = after.chars();
        let under = rest.next().map(String::from).unwrap_or_else(|| " ".to_string());
        spans.push(Span::raw(before.to_string()));
        spans.push(Span::styled(under, Style::default().fg(Color::Black).bg(Color::Yellow)));
        spans.push(Span::raw(rest.as_str().to_string()));
      }
      lines.push(Line::from(spans));

      let error = self
        .errors
        .get(spec.name)
        .map(|e| format!("{:>width$} {}", "", e, width = label_width as usize))
        .unwrap_or_default();
      lines.push(Line::styled(error, Style::default().fg(Color::Red)));
    }

    frame.render_widget(Paragraph::new(lines).block(block), overlay_area);
    self.picker.render_overlay(frame, area);
  }
}

impl ShortcutProvider for EntityForm {
  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next field").with_priority(1),
      ShortcutInfo::new("enter", "save").with_priority(2),
      ShortcutInfo::new("ctrl-s", "save").with_priority(3),
      ShortcutInfo::new("esc", "cancel").with_priority(4),
    ]
  }
}
