use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Severity of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Success,
  Info,
  Error,
}

/// A message for the user, shown as a toast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
}

impl Notice {
  pub fn success(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Success,
      message: message.into(),
    }
  }

  pub fn info(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Info,
      message: message.into(),
    }
  }

  pub fn error(message: impl Into<String>) -> Self {
    Self {
      level: NoticeLevel::Error,
      message: message.into(),
    }
  }

  fn color(&self) -> Color {
    match self.level {
      NoticeLevel::Success => Color::Green,
      NoticeLevel::Info => Color::Cyan,
      NoticeLevel::Error => Color::Red,
    }
  }
}

const MAX_VISIBLE: usize = 4;

/// Stack of transient notifications in the bottom-right corner
#[derive(Debug)]
pub struct Toasts {
  queue: VecDeque<(Notice, Instant)>,
  ttl: Duration,
}

impl Default for Toasts {
  fn default() -> Self {
    Self::new(Duration::from_secs(4))
  }
}

impl Toasts {
  pub fn new(ttl: Duration) -> Self {
    Self {
      queue: VecDeque::new(),
      ttl,
    }
  }

  pub fn push(&mut self, notice: Notice) {
    // Errors stay twice as long
    let lifetime = match notice.level {
      NoticeLevel::Error => self.ttl * 2,
      _ => self.ttl,
    };
    self.queue.push_back((notice, Instant::now() + lifetime));
    while self.queue.len() > MAX_VISIBLE {
      self.queue.pop_front();
    }
  }

  /// Drop expired toasts
  pub fn tick(&mut self) {
    let now = Instant::now();
    self.queue.retain(|(_, expires)| *expires > now);
  }

  pub fn visible(&self) -> impl Iterator<Item = &Notice> {
    self.queue.iter().map(|(notice, _)| notice)
  }

  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    let width = 44.min(area.width);
    let mut bottom = area.bottom();

    for notice in self.queue.iter().rev().map(|(n, _)| n) {
      let lines = (notice.message.chars().count() as u16 / width.saturating_sub(4).max(1)) + 1;
      let height = lines + 2;
      if bottom < area.y + height {
        break;
      }
      bottom -= height;
      let toast_area = Rect::new(area.right().saturating_sub(width + 1), bottom, width, height);

      frame.render_widget(Clear, toast_area);
      let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(notice.color()));
      let paragraph = Paragraph::new(notice.message.as_str())
        .block(block)
        .wrap(Wrap { trim: true })
        .style(Style::default().fg(notice.color()));
      frame.render_widget(paragraph, toast_area);
    }
  }
}
