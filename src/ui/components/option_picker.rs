use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState};

/// One choice in the picker: the raw value stored in the form and its label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickerOption {
  pub value: String,
  pub label: String,
}

impl PickerOption {
  pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
    Self {
      value: value.into(),
      label: label.into(),
    }
  }
}

/// Events emitted by option picker that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerEvent {
  /// Option selected (returns its value)
  Selected(String),
  /// Picker cancelled
  Cancelled,
}

/// Popup list for choosing one of a fixed set of values, e.g. a parent record
#[derive(Debug, Clone, Default)]
pub struct OptionPicker {
  active: bool,
  options: Vec<PickerOption>,
  selected: usize,
  title: String,
}

impl OptionPicker {
  pub fn new() -> Self {
    Self::default()
  }

  /// Check if picker is currently active
  pub fn is_active(&self) -> bool {
    self.active
  }

  /// Show the picker, pre-selecting the option whose value is `current`
  pub fn show(&mut self, title: String, options: Vec<PickerOption>, current: &str) {
    self.selected = options.iter().position(|o| o.value == current).unwrap_or(0);
    self.active = true;
    self.options = options;
    self.title = title;
  }

  /// Hide the picker
  pub fn hide(&mut self) {
    self.active = false;
    self.options.clear();
    self.selected = 0;
  }

  /// Handle a key event
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<PickerEvent> {
    if !self.active {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Esc | KeyCode::Char('q') => {
        self.hide();
        KeyResult::Event(PickerEvent::Cancelled)
      }
      KeyCode::Enter | KeyCode::Char(' ') => {
        let event = match self.options.get(self.selected) {
          Some(option) => PickerEvent::Selected(option.value.clone()),
          None => PickerEvent::Cancelled,
        };
        self.hide();
        KeyResult::Event(event)
      }
      KeyCode::Char('j') | KeyCode::Down => {
        if !self.options.is_empty() {
          self.selected = (self.selected + 1) % self.options.len();
        }
        KeyResult::Handled
      }
      KeyCode::Char('k') | KeyCode::Up => {
        if !self.options.is_empty() {
          self.selected = if self.selected == 0 {
            self.options.len() - 1
          } else {
            self.selected - 1
          };
        }
        KeyResult::Handled
      }
      _ => KeyResult::Handled,
    }
  }

  /// Render the picker overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    // Calculate overlay dimensions
    let max_label_len = self
      .options
      .iter()
      .map(|o| o.label.chars().count())
      .max()
      .unwrap_or(10)
      .max(self.title.chars().count());
    let width = (max_label_len as u16 + 6).clamp(20, area.width.saturating_sub(4).max(20));
    let height = (self.options.len() as u16 + 2).clamp(3, area.height.saturating_sub(4).max(3));

    let overlay_area = super::centered(area, width, height);

    // Clear the area behind the overlay
    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(format!(" {} ", self.title));

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    if self.options.is_empty() {
      let empty = Line::styled("(nothing to choose from)", Style::default().fg(Color::DarkGray));
      frame.render_widget(empty, inner);
      return;
    }

    let items: Vec<ListItem> = self
      .options
      .iter()
      .map(|option| ListItem::new(Span::styled(option.label.as_str(), Style::default().fg(Color::Cyan))))
      .collect();

    let list =
      List::new(items).highlight_style(Style::default().bg(Color::DarkGray).fg(Color::White));

    let mut state = ListState::default();
    state.select(Some(self.selected));

    frame.render_stateful_widget(list, inner, &mut state);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn options() -> Vec<PickerOption> {
    vec![
      PickerOption::new("1", "Zulia"),
      PickerOption::new("2", "Lara"),
      PickerOption::new("3", "Falcón"),
    ]
  }

  #[test]
  fn test_preselects_current_value() {
    let mut picker = OptionPicker::new();
    picker.show("Estado".to_string(), options(), "2");
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PickerEvent::Selected("2".to_string()))
    );
    assert!(!picker.is_active());
  }

  #[test]
  fn test_navigation_wraps() {
    let mut picker = OptionPicker::new();
    picker.show("Estado".to_string(), options(), "");
    picker.handle_key(key(KeyCode::Up));
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PickerEvent::Selected("3".to_string()))
    );
  }

  #[test]
  fn test_empty_picker_cancels() {
    let mut picker = OptionPicker::new();
    picker.show("Estado".to_string(), Vec::new(), "");
    assert_eq!(
      picker.handle_key(key(KeyCode::Enter)),
      KeyResult::Event(PickerEvent::Cancelled)
    );
  }
}
