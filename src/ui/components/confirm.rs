use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

/// Events emitted by the confirmation dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmEvent<T> {
  /// User accepted; carries the subject the dialog was opened for
  Confirmed(T),
  Cancelled,
}

/// Yes/no dialog guarding destructive actions
#[derive(Debug, Clone)]
pub struct ConfirmDialog<T> {
  pending: Option<(T, String)>,
  title: String,
}

impl<T: Clone> ConfirmDialog<T> {
  pub fn new(title: impl Into<String>) -> Self {
    Self {
      pending: None,
      title: title.into(),
    }
  }

  pub fn is_active(&self) -> bool {
    self.pending.is_some()
  }

  /// Ask about `subject`
  pub fn show(&mut self, subject: T, message: impl Into<String>) {
    self.pending = Some((subject, message.into()));
  }

  /// Handle a key event. Anything but an explicit yes or no is swallowed.
  pub fn handle_key(&mut self, key: KeyEvent) -> KeyResult<ConfirmEvent<T>> {
    if self.pending.is_none() {
      return KeyResult::NotHandled;
    }

    match key.code {
      KeyCode::Char('y') | KeyCode::Char('Y') => match self.pending.take() {
        Some((subject, _)) => KeyResult::Event(ConfirmEvent::Confirmed(subject)),
        None => KeyResult::Handled,
      },
      KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc | KeyCode::Char('q') => {
        self.pending = None;
        KeyResult::Event(ConfirmEvent::Cancelled)
      }
      _ => KeyResult::Handled,
    }
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let Some((_, message)) = &self.pending else {
      return;
    };

    let width = 50.min(area.width);
    let height = 6.min(area.height);
    let overlay_area = super::centered(area, width, height);

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Red))
      .title(format!(" {} ", self.title));

    let text = vec![
      Line::from(message.as_str()),
      Line::raw(""),
      Line::from(vec![
        Span::styled("<y>", Style::default().fg(Color::Cyan)),
        Span::styled(" yes   ", Style::default().fg(Color::DarkGray)),
        Span::styled("<n>", Style::default().fg(Color::Cyan)),
        Span::styled(" no", Style::default().fg(Color::DarkGray)),
      ]),
    ];

    let paragraph = Paragraph::new(text)
      .block(block)
      .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, overlay_area);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_confirm_returns_subject() {
    let mut dialog = ConfirmDialog::new("Delete");
    dialog.show(7_i64, "Delete Zulia?");
    assert_eq!(dialog.handle_key(key(KeyCode::Enter)), KeyResult::Handled);
    assert!(dialog.is_active());
    assert_eq!(
      dialog.handle_key(key(KeyCode::Char('y'))),
      KeyResult::Event(ConfirmEvent::Confirmed(7))
    );
    assert!(!dialog.is_active());
  }

  #[test]
  fn test_cancel() {
    let mut dialog = ConfirmDialog::new("Delete");
    dialog.show(7_i64, "Delete Zulia?");
    assert_eq!(
      dialog.handle_key(key(KeyCode::Esc)),
      KeyResult::Event(ConfirmEvent::Cancelled)
    );
    assert_eq!(dialog.handle_key(key(KeyCode::Char('y'))), KeyResult::NotHandled);
  }
}
