use crate::entity::Tone;
use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for a rendered cell
pub fn tone_color(tone: Tone) -> Color {
  match tone {
    Tone::Normal => Color::White,
    Tone::Muted => Color::DarkGray,
    Tone::Positive => Color::Green,
    Tone::Negative => Color::Red,
    Tone::Warning => Color::Yellow,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_counts_characters() {
    assert_eq!(truncate("Mérida Andrés", 9), "Mérida...");
  }

  #[test]
  fn test_tone_color() {
    assert_eq!(tone_color(Tone::Positive), Color::Green);
    assert_eq!(tone_color(Tone::Negative), Color::Red);
    assert_eq!(tone_color(Tone::Normal), Color::White);
  }
}
