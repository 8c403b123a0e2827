use crate::api::{CachedApiClient, User};
use crate::commands::CommandAction;
use crate::config::Config;
use crate::entity::EntityKind;
use crate::event::{Event, EventHandler};
use crate::query::Mutation;
use crate::ui::components::{CommandEvent, CommandInput, KeyResult, Notice, Toasts};
use crate::ui::renderfns::{draw_footer, draw_header, HeaderContext};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{EntityListView, LoginView};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{info, warn};

/// Screen opened after sign-in when nothing else is configured
const DEFAULT_VIEW: EntityKind = EntityKind::Centros;

/// Main application state
pub struct App {
  /// Navigation stack - root is always at index 0
  view_stack: Vec<Box<dyn View>>,

  /// Command input overlay (after pressing :)
  command_input: CommandInput,

  toasts: Toasts,

  /// Application configuration
  config: Config,

  client: CachedApiClient,

  /// Signed-in user; entity screens require one
  user: Option<User>,

  /// Entity screen shown as root after sign-in
  home: EntityKind,

  logout: Mutation<()>,

  /// Whether to quit
  should_quit: bool,
}

impl App {
  /// Build the app, resuming an existing session or signing in with
  /// configured credentials when possible.
  pub async fn new(config: Config, start_view: Option<String>) -> Result<Self> {
    let client = CachedApiClient::new(&config)?;

    let home = match start_view.or_else(|| config.default_view.clone()) {
      Some(name) => {
        EntityKind::from_name(&name).ok_or_else(|| eyre!("Unknown view '{}'", name))?
      }
      None => DEFAULT_VIEW,
    };

    let mut toasts = Toasts::default();
    let user = match client.current_user().await {
      Some(user) => {
        info!("resumed session of {}", user.username);
        Some(user)
      }
      None => match config.credentials() {
        Some(credentials) => match client.login(&credentials).await {
          Ok(user) => Some(user),
          Err(e) => {
            warn!("automatic sign-in as {} failed: {}", credentials.username, e);
            toasts.push(Notice::error(format!("Automatic sign-in failed: {}", e)));
            None
          }
        },
        None => None,
      },
    };

    let mut app = Self {
      view_stack: Vec::new(),
      command_input: CommandInput::new(),
      toasts,
      config,
      client,
      user: None,
      home,
      logout: Mutation::new(),
      should_quit: false,
    };
    match user {
      Some(user) => app.signed_in(user),
      None => app.show_login(),
    }
    Ok(app)
  }

  pub async fn run(&mut self) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut events = EventHandler::new(Duration::from_millis(100));

    // Main loop
    let result = loop {
      if self.should_quit {
        break Ok(());
      }
      if let Err(e) = terminal.draw(|frame| self.render(frame)) {
        break Err(e);
      }
      match events.next().await {
        Some(event) => self.handle_event(event),
        None => break Ok(()),
      }
    };

    // Cleanup terminal, even after a draw failure
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(result?)
  }

  fn handle_event(&mut self, event: Event) {
    match event {
      Event::Key(key) => self.handle_key(key),
      Event::Tick => self.tick(),
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.should_quit = true;
      return;
    }

    // `:` is text while a form or search has the keyboard
    let captured = self.current_view().is_some_and(|v| v.captures_input());
    if self.command_input.is_active() || !captured {
      match self.command_input.handle_key(key) {
        KeyResult::Event(CommandEvent::Submitted(action)) => {
          self.run_command(action);
          return;
        }
        KeyResult::Event(CommandEvent::Unknown(name)) => {
          self.toasts.push(Notice::error(format!("Unknown command '{}'", name)));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) | KeyResult::Handled => return,
        KeyResult::NotHandled => {}
      }
    }

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.handle_key(key);
      self.apply(action);
    }
  }

  fn tick(&mut self) {
    self.toasts.tick();

    if let Some(view) = self.view_stack.last_mut() {
      let action = view.tick();
      self.apply(action);
    }

    if let Some(result) = self.logout.poll() {
      match result {
        Ok(()) => self.toasts.push(Notice::success("Signed out")),
        // The local session is gone either way
        Err(e) => self
          .toasts
          .push(Notice::error(format!("Signed out locally, server said: {}", e))),
      }
      self.show_login();
    }
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.view_stack.push(view),
      ViewAction::Pop => {
        if self.view_stack.len() > 1 {
          self.view_stack.pop();
        } else {
          self.should_quit = true;
        }
      }
      ViewAction::Notify(notice) => self.toasts.push(notice),
      ViewAction::SignedIn(user) => {
        self
          .toasts
          .push(Notice::success(format!("Signed in as {}", user.display_name())));
        self.signed_in(user);
      }
    }
  }

  fn run_command(&mut self, action: CommandAction) {
    match action {
      CommandAction::Quit => self.should_quit = true,
      CommandAction::Open(_) | CommandAction::Logout if self.user.is_none() => {
        self.toasts.push(Notice::info("Sign in first"));
      }
      CommandAction::Open(kind) => {
        self.home = kind;
        self.view_stack = vec![Box::new(EntityListView::new(kind, self.client.clone()))];
      }
      CommandAction::Logout => {
        let client = self.client.clone();
        self
          .logout
          .start(async move { client.logout().await.map_err(|e| e.to_string()) });
      }
    }
  }

  fn signed_in(&mut self, user: User) {
    self.user = Some(user);
    self.view_stack = vec![Box::new(EntityListView::new(self.home, self.client.clone()))];
  }

  fn show_login(&mut self) {
    let username = self
      .user
      .take()
      .map(|u| u.username)
      .or_else(|| self.config.username.clone());
    self.view_stack = vec![Box::new(LoginView::with_username(self.client.clone(), username))];
  }

  fn current_view(&self) -> Option<&dyn View> {
    self.view_stack.last().map(|v| v.as_ref())
  }

  fn breadcrumb(&self) -> Vec<String> {
    self.view_stack.iter().map(|v| v.breadcrumb_label()).collect()
  }

  fn render(&mut self, frame: &mut Frame) {
    let chunks = Layout::default()
      .direction(Direction::Vertical)
      .constraints([
        Constraint::Length(1), // Header
        Constraint::Min(1),    // Main content
        Constraint::Length(1), // Footer
      ])
      .split(frame.area());

    let title = self.config.header_title();
    let shortcuts = self.current_view().map(|v| v.shortcuts()).unwrap_or_default();
    let ctx = HeaderContext {
      title: &title,
      api_url: self.client.api().base_url().as_str(),
      user: self.user.as_ref().map(|u| u.display_name()),
    };
    draw_header(frame, chunks[0], &ctx, &shortcuts);

    let breadcrumb = self.breadcrumb();
    if let Some(view) = self.view_stack.last_mut() {
      view.render(frame, chunks[1]);
    }
    draw_footer(frame, chunks[2], &breadcrumb);

    self.command_input.render_overlay(frame, chunks[1]);
    self.toasts.render_overlay(frame, chunks[1]);
  }
}
