use crate::api::CachedApiClient;
use crate::entity::{filter_records, EntityKind, Lookups, Record};
use crate::query::{Mutation, Query, QueryState};
use crate::ui::components::{
  ConfirmDialog, ConfirmEvent, EntityForm, FormEvent, KeyResult, Notice, OptionPicker,
  PickerEvent, PickerOption, SearchEvent, SearchInput, Submission,
};
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{tone_color, truncate};
use crate::ui::view::{ShortcutInfo, ShortcutProvider, View, ViewAction};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Row, Table, TableState};
use tracing::warn;

/// A collection plus the parent collections its columns and form refer to
#[derive(Debug, Clone)]
struct ListData {
  records: Vec<Record>,
  parents: Vec<(EntityKind, Vec<Record>)>,
  /// Some of the data came from cache because the server is unreachable
  offline: bool,
}

/// Load a collection and its parents through the cache.
///
/// Parent failures only cost the lookup names, so they are logged and skipped.
async fn load(client: CachedApiClient, kind: EntityKind) -> Result<ListData, String> {
  let parents = kind.parents();
  let (main, parent_results) = futures::join!(
    client.list(kind),
    futures::future::join_all(parents.iter().map(|&parent| client.list(parent)))
  );

  let main = main.map_err(|e| e.to_string())?;
  let mut offline = main.is_offline();
  let mut loaded = Vec::with_capacity(parents.len());
  for (parent, result) in parents.into_iter().zip(parent_results) {
    match result {
      Ok(result) => {
        offline |= result.is_offline();
        loaded.push((parent, result.data));
      }
      Err(e) => warn!("could not load {} for {}: {}", parent.resource(), kind.resource(), e),
    }
  }

  Ok(ListData {
    records: main.data,
    parents: loaded,
    offline,
  })
}

/// Finished write, for the notification
enum Outcome {
  Created,
  Updated,
  Deleted(String),
}

/// Restriction of a list to the children of one parent record
#[derive(Debug, Clone)]
struct Scope {
  /// Foreign key field pointing at the parent
  field: &'static str,
  parent_id: i64,
  parent_name: String,
}

/// Column the table is ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Sort {
  column: usize,
  descending: bool,
}

/// Searchable table for one entity with create, edit and delete
pub struct EntityListView {
  kind: EntityKind,
  scope: Option<Scope>,
  client: CachedApiClient,
  query: Query<ListData>,
  lookups: Lookups,
  /// Versions of the collection and its parents when the last fetch started
  seen_versions: Vec<u64>,
  table_state: TableState,
  /// `None` keeps server order
  sort: Option<Sort>,
  search: SearchInput,
  confirm: ConfirmDialog<Record>,
  form: EntityForm,
  /// Chooses which child list to open when there are several
  children: OptionPicker,
  mutation: Mutation<Outcome>,
}

impl EntityListView {
  pub fn new(kind: EntityKind, client: CachedApiClient) -> Self {
    let client_for_query = client.clone();
    let mut query = Query::new(move || {
      let client = client_for_query.clone();
      async move { load(client, kind).await }
    });

    // Start fetching immediately
    query.fetch();

    let mut view = Self {
      kind,
      scope: None,
      client,
      query,
      lookups: Lookups::new(),
      seen_versions: Vec::new(),
      table_state: TableState::default(),
      sort: None,
      search: SearchInput::new(),
      confirm: ConfirmDialog::new("Delete"),
      form: EntityForm::new(kind),
      children: OptionPicker::new(),
      mutation: Mutation::new(),
    };
    view.seen_versions = view.versions();
    view
  }

  /// List of `kind` records whose `field` points at `parent`
  pub fn scoped(
    kind: EntityKind,
    client: CachedApiClient,
    field: &'static str,
    parent: &Record,
    parent_kind: EntityKind,
  ) -> Self {
    let mut view = Self::new(kind, client);
    view.scope = Some(Scope {
      field,
      parent_id: parent.id,
      parent_name: parent.display_name(parent_kind),
    });
    view
  }

  /// Entity title, narrowed to the parent for scoped lists
  fn heading(&self) -> String {
    match &self.scope {
      Some(scope) => format!("{} in {}", self.kind.title(), scope.parent_name),
      None => self.kind.title().to_string(),
    }
  }

  fn in_scope(&self, record: &Record) -> bool {
    self
      .scope
      .as_ref()
      .map_or(true, |s| record.reference(s.field) == Some(s.parent_id))
  }

  fn watched(&self) -> Vec<EntityKind> {
    let mut kinds = vec![self.kind];
    kinds.extend(self.kind.parents());
    kinds
  }

  fn versions(&self) -> Vec<u64> {
    self
      .watched()
      .into_iter()
      .map(|kind| self.client.version(kind))
      .collect()
  }

  fn records(&self) -> &[Record] {
    self
      .query
      .data()
      .map(|d| d.records.as_slice())
      .unwrap_or(&[])
  }

  /// Records in scope matching the current search, in sort order
  fn visible(&self) -> Vec<&Record> {
    let descriptor = self.kind.descriptor();
    let mut records: Vec<&Record> =
      filter_records(self.records(), self.search.query(), descriptor.search_fields)
        .into_iter()
        .filter(|r| self.in_scope(r))
        .collect();
    if let Some(sort) = self.sort {
      if let Some(column) = descriptor.columns.get(sort.column) {
        records.sort_by(|a, b| column.compare(a, b, &self.lookups, sort.descending));
      }
    }
    records
  }

  /// Next sort column, back to server order after the last one
  fn cycle_sort(&mut self) {
    let columns = self.kind.descriptor().columns.len();
    self.sort = match self.sort {
      None if columns > 0 => Some(Sort {
        column: 0,
        descending: false,
      }),
      Some(sort) if sort.column + 1 < columns => Some(Sort {
        column: sort.column + 1,
        descending: false,
      }),
      _ => None,
    };
    self.table_state.select_first();
  }

  fn reverse_sort(&mut self) {
    if let Some(sort) = &mut self.sort {
      sort.descending = !sort.descending;
      self.table_state.select_first();
    }
  }

  fn selected_record(&self) -> Option<Record> {
    let idx = self.table_state.selected()?;
    self.visible().get(idx).map(|r| (*r).clone())
  }

  /// Refresh lookups and form choices from newly loaded data
  fn apply_data(&mut self) {
    let Some(data) = self.query.data() else {
      return;
    };
    let mut lookups = Lookups::new();
    for (parent, records) in &data.parents {
      lookups.insert(*parent, records);
      self.form.set_parents(*parent, records);
    }
    self.lookups = lookups;
    let len = self.visible().len();
    ensure_valid_selection(&mut self.table_state, len);
  }

  fn open_create(&mut self) {
    self.form.open_create();
    if let Some(scope) = &self.scope {
      self.form.preset(scope.field, scope.parent_id.to_string());
    }
  }

  fn child_view(&self, child: EntityKind, parent: &Record) -> ViewAction {
    let field = self
      .kind
      .children()
      .into_iter()
      .find(|(kind, _)| *kind == child)
      .map(|(_, field)| field);
    match field {
      Some(field) => ViewAction::Push(Box::new(EntityListView::scoped(
        child,
        self.client.clone(),
        field,
        parent,
        self.kind,
      ))),
      None => ViewAction::None,
    }
  }

  /// Open the records depending on the selected one, asking which kind when
  /// there are several
  fn open_children(&mut self) -> ViewAction {
    let Some(record) = self.selected_record() else {
      return ViewAction::None;
    };
    let children = self.kind.children();
    match children.as_slice() {
      [] => ViewAction::None,
      [(child, _)] => self.child_view(*child, &record),
      _ => {
        let options = children
          .iter()
          .map(|(child, _)| PickerOption::new(child.resource(), child.title()))
          .collect();
        self.children.show(
          format!("Open for {}", record.display_name(self.kind)),
          options,
          "",
        );
        ViewAction::None
      }
    }
  }

  fn refresh(&mut self) {
    self.client.invalidate(self.kind);
    self.seen_versions = self.versions();
    self.query.refetch();
  }

  fn start_save(&mut self, submission: Submission) -> ViewAction {
    if self.mutation.is_pending() {
      return ViewAction::Notify(Notice::info("Wait for the current request to finish"));
    }
    let client = self.client.clone();
    let kind = self.kind;
    let started = self.mutation.start(async move {
      let result = match submission {
        Submission::Create(payload) => client.create(kind, &payload).await.map(|_| Outcome::Created),
        Submission::Update { id, payload } => client
          .update(kind, id, &payload)
          .await
          .map(|_| Outcome::Updated),
      };
      result.map_err(|e| format!("{} not saved: {}", kind.descriptor().singular, e))
    });
    if started {
      self.form.set_busy(true);
    }
    ViewAction::None
  }

  fn start_delete(&mut self, record: Record) {
    let client = self.client.clone();
    let kind = self.kind;
    let name = record.display_name(kind);
    self.mutation.start(async move {
      client
        .delete(kind, record.id)
        .await
        .map(|_| Outcome::Deleted(name.clone()))
        .map_err(|e| format!("Could not delete \"{}\": {}", name, e))
    });
  }

  fn finish_mutation(&mut self, result: Result<Outcome, String>) -> ViewAction {
    let singular = self.kind.descriptor().singular;
    self.form.set_busy(false);

    let notice = match result {
      Ok(Outcome::Created) => {
        self.form.close();
        Notice::success(format!("{} created", singular))
      }
      Ok(Outcome::Updated) => {
        self.form.close();
        Notice::success(format!("{} updated", singular))
      }
      Ok(Outcome::Deleted(name)) => Notice::success(format!("{} \"{}\" deleted", singular, name)),
      // The form, if open, keeps its values for another try
      Err(e) => Notice::error(e),
    };
    ViewAction::Notify(notice)
  }

  fn title(&self) -> String {
    let name = self.heading();
    let offline = if self.query.data().is_some_and(|d| d.offline) {
      " [offline]"
    } else {
      ""
    };

    match self.query.state() {
      QueryState::Loading if self.query.data().is_none() => format!(" {} (loading...) ", name),
      QueryState::Error(e) => format!(" {} (error: {}) ", name, truncate(e, 60)),
      _ => {
        let total = self.records().len();
        let query = self.search.query();
        if query.is_empty() {
          format!(" {} ({}){} ", name, total, offline)
        } else {
          format!(
            " {} ({}/{}) /{}{} ",
            name,
            self.visible().len(),
            total,
            query,
            offline
          )
        }
      }
    }
  }

  fn render_table(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.visible().len();
    ensure_valid_selection(&mut self.table_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if len == 0 {
      let content = if self.query.data().is_none() && self.query.is_loading() {
        "Loading..."
      } else if self.query.error().is_some() {
        "Failed to load. Press 'r' to retry."
      } else if !self.search.query().is_empty() {
        "Nothing matches the search."
      } else {
        "No records yet. Press 'n' to create one."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let columns = self.kind.descriptor().columns;
    let header = Row::new(columns.iter().enumerate().map(|(i, c)| {
      let label = match self.sort {
        Some(sort) if sort.column == i => {
          format!("{} {}", c.header(), if sort.descending { "▼" } else { "▲" })
        }
        _ => c.header().to_string(),
      };
      Span::styled(label, Style::default().fg(Color::Cyan).bold())
    }));
    let rows: Vec<Row> = self
      .visible()
      .into_iter()
      .map(|record| {
        Row::new(columns.iter().map(|col| {
          let cell = col.render(record, &self.lookups);
          Span::styled(
            truncate(&cell.text, col.width() as usize),
            Style::default().fg(tone_color(cell.tone)),
          )
        }))
      })
      .collect();
    let widths: Vec<Constraint> = columns.iter().map(|c| Constraint::Length(c.width())).collect();

    let table = Table::new(rows, widths)
      .header(header)
      .block(block)
      .row_highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(table, area, &mut self.table_state);
  }
}

impl View for EntityListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    // Overlays first, topmost wins
    match self.form.handle_key(key) {
      KeyResult::Event(FormEvent::Submit(submission)) => return self.start_save(submission),
      KeyResult::Event(FormEvent::NoChanges) => {
        return ViewAction::Notify(Notice::info("No changes to save"));
      }
      KeyResult::Event(FormEvent::Cancelled) | KeyResult::Handled => return ViewAction::None,
      KeyResult::NotHandled => {}
    }

    match self.children.handle_key(key) {
      KeyResult::Event(PickerEvent::Selected(resource)) => {
        let child = EntityKind::from_name(&resource);
        return match (child, self.selected_record()) {
          (Some(child), Some(record)) => self.child_view(child, &record),
          _ => ViewAction::None,
        };
      }
      result if result.is_consumed() => return ViewAction::None,
      _ => {}
    }

    match self.confirm.handle_key(key) {
      KeyResult::Event(ConfirmEvent::Confirmed(record)) => {
        self.start_delete(record);
        return ViewAction::None;
      }
      result if result.is_consumed() => return ViewAction::None,
      _ => {}
    }

    match self.search.handle_key(key) {
      KeyResult::Event(SearchEvent::Changed(_)) => {
        self.table_state.select(None);
        let len = self.visible().len();
        ensure_valid_selection(&mut self.table_state, len);
        return ViewAction::None;
      }
      result if result.is_consumed() => return ViewAction::None,
      _ => {}
    }

    // Normal mode key handling
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.table_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.table_state.select_previous(),
      KeyCode::Char('g') | KeyCode::Home => self.table_state.select_first(),
      KeyCode::Char('G') | KeyCode::End => self.table_state.select_last(),
      KeyCode::Char('r') => self.refresh(),
      KeyCode::Char('s') => self.cycle_sort(),
      KeyCode::Char('S') => self.reverse_sort(),
      KeyCode::Char('n') | KeyCode::Char('c') => self.open_create(),
      KeyCode::Char('o') | KeyCode::Right => return self.open_children(),
      KeyCode::Char('e') | KeyCode::Enter => {
        if let Some(record) = self.selected_record() {
          self.form.open_edit(record);
        }
      }
      KeyCode::Char('d') | KeyCode::Delete => {
        if self.mutation.is_pending() {
          return ViewAction::Notify(Notice::info("Wait for the current request to finish"));
        }
        if let Some(record) = self.selected_record() {
          let message = format!(
            "Delete {} \"{}\"? This cannot be undone.",
            self.kind.descriptor().singular,
            record.display_name(self.kind)
          );
          self.confirm.show(record, message);
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_table(frame, area);
    let matches = self.visible().len();
    self.search.render_overlay(frame, area, matches);
    self.confirm.render_overlay(frame, area);
    self.children.render_overlay(frame, area);
    self.form.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.heading()
  }

  fn tick(&mut self) -> ViewAction {
    if self.query.poll() {
      self.apply_data();
    }

    // Another screen (or this one) changed a watched collection
    let current = self.versions();
    if current != self.seen_versions {
      self.seen_versions = current;
      self.query.refetch();
    }

    match self.mutation.poll() {
      Some(result) => self.finish_mutation(result),
      None => ViewAction::None,
    }
  }

  fn captures_input(&self) -> bool {
    self.form.is_active()
      || self.confirm.is_active()
      || self.children.is_active()
      || self.search.is_active()
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    if self.form.is_active() {
      return self.form.shortcuts();
    }
    if self.search.is_active() {
      return self.search.shortcuts();
    }

    let mut shortcuts = vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("n", "new").with_priority(40),
      ShortcutInfo::new("e", "edit").with_priority(41),
      ShortcutInfo::new("d", "delete").with_priority(42),
      ShortcutInfo::new("r", "refresh").with_priority(50),
      ShortcutInfo::new("s", "sort").with_priority(51),
      ShortcutInfo::new("S", "reverse").with_priority(52),
      ShortcutInfo::new("q", "back").with_priority(90),
    ];
    if !self.kind.children().is_empty() {
      shortcuts.push(ShortcutInfo::new("o", "open children").with_priority(43));
    }
    shortcuts.extend(self.search.shortcuts());
    shortcuts
  }
}
