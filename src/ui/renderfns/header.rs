use crate::ui::view::ShortcutInfo;
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// What the header shows besides shortcuts
pub struct HeaderContext<'a> {
  pub title: &'a str,
  pub api_url: &'a str,
  /// Signed-in user's name
  pub user: Option<&'a str>,
}

/// Draw the header bar with logo, context, and shortcuts
pub fn draw_header(frame: &mut Frame, area: Rect, ctx: &HeaderContext, shortcuts: &[ShortcutInfo]) {
  let separator = || Span::styled("│", Style::default().fg(Color::DarkGray));

  let mut spans = vec![
    Span::styled(" sce ", Style::default().fg(Color::Cyan).bold()),
    separator(),
    Span::styled(format!(" {} ", ctx.title), Style::default().fg(Color::White)),
    separator(),
    Span::styled(
      format!(" {} ", extract_host(ctx.api_url)),
      Style::default().fg(Color::DarkGray),
    ),
    separator(),
    match ctx.user {
      Some(name) => Span::styled(format!(" {} ", name), Style::default().fg(Color::Yellow).bold()),
      None => Span::styled(" not signed in ", Style::default().fg(Color::Red)),
    },
    Span::raw("  "),
  ];

  let mut shortcuts = shortcuts.to_vec();
  shortcuts.sort_by_key(|s| s.priority);

  // Shortcuts - keys and brackets highlighted, descriptions dimmed
  for (i, shortcut) in shortcuts.iter().enumerate() {
    if i > 0 {
      spans.push(Span::raw("  "));
    }
    spans.push(Span::styled(
      format!("<{}>", shortcut.key),
      Style::default().fg(Color::Cyan),
    ));
    spans.push(Span::styled(
      format!(" {}", shortcut.label),
      Style::default().fg(Color::DarkGray),
    ));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
  frame.render_widget(paragraph, area);
}

/// Extract host (and port) from the API URL
fn extract_host(url: &str) -> &str {
  url
    .strip_prefix("https://")
    .or_else(|| url.strip_prefix("http://"))
    .unwrap_or(url)
    .split('/')
    .next()
    .unwrap_or(url)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_extract_host() {
    assert_eq!(extract_host("https://sce.example.org"), "sce.example.org");
    assert_eq!(extract_host("https://sce.example.org/panel/"), "sce.example.org");
    assert_eq!(extract_host("http://localhost:3000"), "localhost:3000");
  }
}
