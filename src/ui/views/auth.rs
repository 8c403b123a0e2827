use crate::api::{CachedApiClient, Credentials, RegisterRequest, User};
use crate::query::Mutation;
use crate::ui::components::{InputResult, Notice, TextInput};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use validator::ValidateEmail;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
  Login,
  Register,
}

impl Mode {
  fn labels(self) -> &'static [&'static str] {
    match self {
      Mode::Login => &["Usuario", "Contraseña"],
      Mode::Register => &["Usuario", "Correo", "Contraseña", "Nombre"],
    }
  }

  fn password_index(self) -> usize {
    match self {
      Mode::Login => 1,
      Mode::Register => 2,
    }
  }
}

enum AuthOutcome {
  SignedIn(User),
  Registered(String),
}

/// Sign-in screen, switchable to account registration
pub struct LoginView {
  client: CachedApiClient,
  mode: Mode,
  inputs: Vec<TextInput>,
  focused: usize,
  /// Validation problem shown under the fields
  problem: Option<String>,
  request: Mutation<AuthOutcome>,
}

impl LoginView {
  pub fn new(client: CachedApiClient) -> Self {
    Self::with_username(client, None)
  }

  /// Login form with the username pre-filled
  pub fn with_username(client: CachedApiClient, username: Option<String>) -> Self {
    let mut view = Self {
      client,
      mode: Mode::Login,
      inputs: Vec::new(),
      focused: 0,
      problem: None,
      request: Mutation::new(),
    };
    view.switch(Mode::Login);
    if let Some(username) = username {
      view.inputs[0].set_value(username);
      view.focused = 1;
    }
    view
  }

  fn switch(&mut self, mode: Mode) {
    let username = self.inputs.first().map(|i| i.value().to_string());
    self.mode = mode;
    self.inputs = mode.labels().iter().map(|_| TextInput::new()).collect();
    if let Some(username) = username {
      self.inputs[0].set_value(username);
    }
    self.focused = 0;
    self.problem = None;
  }

  fn value(&self, idx: usize) -> String {
    self.inputs[idx].value().trim().to_string()
  }

  fn validate(&self) -> Result<(), (usize, String)> {
    if self.value(0).is_empty() {
      return Err((0, "Usuario is required".to_string()));
    }
    // Passwords are sent as typed
    let password_idx = self.mode.password_index();
    if self.inputs[password_idx].is_empty() {
      return Err((password_idx, "Contraseña is required".to_string()));
    }
    if self.mode == Mode::Register {
      let email = self.value(1);
      if !email.validate_email() {
        return Err((1, "Correo must be a valid email".to_string()));
      }
      if self.inputs[password_idx].value().chars().count() < 6 {
        return Err((password_idx, "Contraseña must have at least 6 characters".to_string()));
      }
    }
    Ok(())
  }

  fn submit(&mut self) {
    if let Err((idx, problem)) = self.validate() {
      self.focused = idx;
      self.problem = Some(problem);
      return;
    }
    self.problem = None;

    let client = self.client.clone();
    match self.mode {
      Mode::Login => {
        let credentials = Credentials {
          username: self.value(0),
          password: self.inputs[1].value().to_string(),
        };
        self.request.start(async move {
          client
            .login(&credentials)
            .await
            .map(AuthOutcome::SignedIn)
            .map_err(|e| e.to_string())
        });
      }
      Mode::Register => {
        let nombre = self.value(3);
        let request = RegisterRequest {
          username: self.value(0),
          email: self.value(1),
          password: self.inputs[2].value().to_string(),
          nombre: (!nombre.is_empty()).then_some(nombre),
        };
        self.request.start(async move {
          client
            .register(&request)
            .await
            .map(|_| AuthOutcome::Registered(request.username))
            .map_err(|e| e.to_string())
        });
      }
    }
  }

  fn move_focus(&mut self, delta: isize) {
    let len = self.inputs.len() as isize;
    self.focused = (self.focused as isize + delta).rem_euclid(len) as usize;
  }
}

impl View for LoginView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    if self.request.is_pending() {
      return ViewAction::None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
      KeyCode::Esc => return ViewAction::Pop,
      KeyCode::Tab | KeyCode::Down => self.move_focus(1),
      KeyCode::BackTab | KeyCode::Up => self.move_focus(-1),
      KeyCode::Char('r') if ctrl => {
        let next = match self.mode {
          Mode::Login => Mode::Register,
          Mode::Register => Mode::Login,
        };
        self.switch(next);
      }
      KeyCode::Char('s') if ctrl => self.submit(),
      _ => match self.inputs[self.focused].handle_key(key) {
        // Enter moves on until the last field
        InputResult::Submitted(_) if self.focused + 1 < self.inputs.len() => self.move_focus(1),
        InputResult::Submitted(_) => self.submit(),
        InputResult::Consumed => self.problem = None,
        _ => {}
      },
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let labels = self.mode.labels();
    let width = 56.min(area.width);
    let height = (labels.len() as u16 + 5).min(area.height);
    let dialog = Rect::new(
      area.x + (area.width - width) / 2,
      area.y + (area.height - height) / 2,
      width,
      height,
    );
    frame.render_widget(Clear, dialog);

    let title = match self.mode {
      Mode::Login => " Iniciar sesión ",
      Mode::Register => " Registrar cuenta ",
    };
    let block = Block::default()
      .title(title)
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(dialog);
    frame.render_widget(block, dialog);

    let mut lines: Vec<Line> = labels
      .iter()
      .enumerate()
      .map(|(i, label)| {
        let focused = i == self.focused;
        let raw = self.inputs[i].value();
        let shown = if i == self.mode.password_index() {
          "*".repeat(raw.chars().count())
        } else {
          raw.to_string()
        };
        let label_style = if focused {
          Style::default().fg(Color::Yellow).bold()
        } else {
          Style::default().fg(Color::Cyan)
        };
        let mut spans = vec![
          Span::styled(format!("{:>12}: ", label), label_style),
          Span::raw(shown),
        ];
        if focused {
          spans.push(Span::styled("_", Style::default().fg(Color::Yellow)));
        }
        Line::from(spans)
      })
      .collect();

    lines.push(Line::raw(""));
    let status = if self.request.is_pending() {
      Line::styled("Please wait...", Style::default().fg(Color::DarkGray))
    } else if let Some(problem) = &self.problem {
      Line::styled(problem.clone(), Style::default().fg(Color::Red))
    } else {
      Line::styled(
        "enter: next/submit  ctrl-r: switch login/register",
        Style::default().fg(Color::DarkGray),
      )
    };
    lines.push(status);

    frame.render_widget(Paragraph::new(lines), inner);
  }

  fn breadcrumb_label(&self) -> String {
    match self.mode {
      Mode::Login => "Login".to_string(),
      Mode::Register => "Register".to_string(),
    }
  }

  fn tick(&mut self) -> ViewAction {
    match self.request.poll() {
      Some(Ok(AuthOutcome::SignedIn(user))) => ViewAction::SignedIn(user),
      Some(Ok(AuthOutcome::Registered(username))) => {
        self.switch(Mode::Login);
        self.inputs[0].set_value(username);
        self.focused = 1;
        ViewAction::Notify(Notice::success("Account created, sign in to continue"))
      }
      Some(Err(e)) => {
        let action = match self.mode {
          Mode::Login => "Sign in failed",
          Mode::Register => "Registration failed",
        };
        ViewAction::Notify(Notice::error(format!("{}: {}", action, e)))
      }
      None => ViewAction::None,
    }
  }

  fn captures_input(&self) -> bool {
    true
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new("tab", "next field").with_priority(10),
      ShortcutInfo::new("ctrl-s", "submit").with_priority(11),
      ShortcutInfo::new("ctrl-r", "login/register").with_priority(12),
      ShortcutInfo::new("esc", "quit").with_priority(30),
    ]
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiClient;
  use crate::cache::{CacheLayer, MemoryStorage};
  use crate::ui::components::NoticeLevel;
  use serde_json::json;
  use std::time::Duration;
  use wiremock::matchers::{body_json, method, path};
  use wiremock::{Mock, MockServer, ResponseTemplate};

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  fn ctrl(c: char) -> KeyEvent {
    KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL)
  }

  fn type_str(view: &mut LoginView, s: &str) {
    for c in s.chars() {
      view.handle_key(key(KeyCode::Char(c)));
    }
  }

  async fn setup() -> (MockServer, LoginView) {
    let server = MockServer::start().await;
    let api = ApiClient::new(&server.uri(), None).unwrap();
    let client = CachedApiClient::with_cache(api, CacheLayer::new(MemoryStorage::new()));
    (server, LoginView::new(client))
  }

  async fn wait(view: &mut LoginView) -> ViewAction {
    for _ in 0..50 {
      tokio::time::sleep(Duration::from_millis(10)).await;
      let action = view.tick();
      if !matches!(action, ViewAction::None) {
        return action;
      }
    }
    ViewAction::None
  }

  #[tokio::test]
  async fn test_login_signs_in() {
    let (server, mut view) = setup().await;
    Mock::given(method("POST"))
      .and(path("/api/login"))
      .and(body_json(json!({"username": "admin", "password": "secreto"})))
      .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "username": "admin"})))
      .expect(1)
      .mount(&server)
      .await;

    type_str(&mut view, "admin");
    view.handle_key(key(KeyCode::Enter));
    type_str(&mut view, "secreto");
    view.handle_key(key(KeyCode::Enter));

    match wait(&mut view).await {
      ViewAction::SignedIn(user) => assert_eq!(user.username, "admin"),
      _ => panic!("expected a session"),
    }
  }

  #[tokio::test]
  async fn test_missing_password_sends_nothing() {
    let (server, mut view) = setup().await;
    type_str(&mut view, "admin");
    view.handle_key(ctrl('s'));

    assert_eq!(view.problem.as_deref(), Some("Contraseña is required"));
    assert_eq!(view.focused, 1);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
  }

  #[tokio::test]
  async fn test_rejected_login_notifies() {
    let (server, mut view) = setup().await;
    Mock::given(method("POST"))
      .and(path("/api/login"))
      .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Credenciales inválidas"})))
      .mount(&server)
      .await;

    type_str(&mut view, "admin");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "mal");
    view.handle_key(ctrl('s'));

    match wait(&mut view).await {
      ViewAction::Notify(notice) => {
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Sign in failed: Credenciales inválidas");
      }
      _ => panic!("expected a notice"),
    }
  }

  #[tokio::test]
  async fn test_register_then_login_prefilled() {
    let (server, mut view) = setup().await;
    Mock::given(method("POST"))
      .and(path("/api/register"))
      .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 9, "username": "ana"})))
      .expect(1)
      .mount(&server)
      .await;

    view.handle_key(ctrl('r'));
    assert_eq!(view.mode, Mode::Register);
    type_str(&mut view, "ana");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "no-es-correo");
    view.handle_key(key(KeyCode::Tab));
    type_str(&mut view, "123456");
    view.handle_key(ctrl('s'));
    assert_eq!(view.problem.as_deref(), Some("Correo must be a valid email"));

    view.inputs[1].set_value("ana@example.org");
    view.handle_key(ctrl('s'));

    assert!(matches!(wait(&mut view).await, ViewAction::Notify(_)));
    assert_eq!(view.mode, Mode::Login);
    assert_eq!(view.inputs[0].value(), "ana");
    assert_eq!(view.focused, 1);
  }
}
