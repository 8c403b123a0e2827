/// Available commands and autocomplete logic
use crate::entity::EntityKind;
use std::sync::OnceLock;

/// What running a command does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandAction {
  /// Switch the root screen to an entity list
  Open(EntityKind),
  Logout,
  Quit,
}

#[derive(Debug, Clone)]
pub struct Command {
  pub name: &'static str,
  pub aliases: &'static [&'static str],
  pub description: &'static str,
  pub action: CommandAction,
}

const BUILTINS: &[Command] = &[
  Command {
    name: "logout",
    aliases: &["salir", "signout"],
    description: "End the session",
    action: CommandAction::Logout,
  },
  Command {
    name: "quit",
    aliases: &["q", "exit"],
    description: "Exit sce",
    action: CommandAction::Quit,
  },
];

/// All available commands: one per entity screen, then the built-ins
pub fn all() -> &'static [Command] {
  static COMMANDS: OnceLock<Vec<Command>> = OnceLock::new();
  COMMANDS.get_or_init(|| {
    EntityKind::ALL
      .iter()
      .map(|&kind| {
        let d = kind.descriptor();
        Command {
          name: d.resource,
          aliases: d.aliases,
          description: d.title,
          action: CommandAction::Open(kind),
        }
      })
      .chain(BUILTINS.iter().cloned())
      .collect()
  })
}

/// Find a command by exact name or alias
pub fn find(name: &str) -> Option<&'static Command> {
  let name = name.trim().to_lowercase();
  all()
    .iter()
    .find(|cmd| cmd.name == name || cmd.aliases.contains(&name.as_str()))
}

/// Get autocomplete suggestions for a given input
pub fn get_suggestions(input: &str) -> Vec<&'static Command> {
  let input_lower = input.trim().to_lowercase();

  if input_lower.is_empty() {
    return all().iter().collect();
  }

  let mut matches: Vec<(&Command, u32)> = Vec::new();

  for cmd in all() {
    let title = cmd.description.to_lowercase();

    // Exact match on name
    if cmd.name == input_lower {
      matches.push((cmd, 0)); // Highest priority
      continue;
    }

    // Exact match on alias
    if cmd.aliases.contains(&input_lower.as_str()) {
      matches.push((cmd, 1));
      continue;
    }

    // Prefix match on name
    if cmd.name.starts_with(&input_lower) {
      matches.push((cmd, 2));
      continue;
    }

    // Prefix match on alias or title
    if cmd.aliases.iter().any(|a| a.starts_with(&input_lower)) || title.starts_with(&input_lower) {
      matches.push((cmd, 3));
      continue;
    }

    // Fuzzy match (contains)
    if cmd.name.contains(&input_lower) {
      matches.push((cmd, 4));
      continue;
    }

    // Fuzzy match on alias or title
    if cmd.aliases.iter().any(|a| a.contains(&input_lower)) || title.contains(&input_lower) {
      matches.push((cmd, 5));
    }
  }

  // Stable sort keeps catalogue order within a priority
  matches.sort_by_key(|(_, priority)| *priority);

  matches.into_iter().map(|(cmd, _)| cmd).collect()
}
