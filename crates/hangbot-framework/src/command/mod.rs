//! Bot command parsing and resolution.
//!
//! A chat message is a bot command when it starts with one of the configured
//! aliases (`/bot` by default) followed by whitespace or the end of the text:
//!
//! ```text
//! /bot echo "hello world" again
//! ^^^^ ^^^^ ^^^^^^^^^^^^^ ^^^^^
//! alias name     args...
//! ```
//!
//! The part after the alias is tokenized with [`shell_split`]; the first token,
//! lowercased, is the command name. A bare alias means `help`.
//!
//! [`parse_command`] only parses. Looking the name up in the command tables
//! and running the callback is the job of the [`CommandResolver`], which is
//! installed as an ordinary `message` handler.

mod resolver;
pub mod split;

pub use resolver::{COMMAND_PRIORITY, CommandResolver, RESOLVER_PLUGIN, Resolution};
pub use split::shell_split;

/// Command run when a message consists of the alias alone.
pub const BARE_ALIAS_COMMAND: &str = "help";

/// A message recognised as a bot command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The alias as configured (not as typed).
    pub alias: String,
    /// Lowercase command name.
    pub name: String,
    /// Tokens after the command name.
    pub args: Vec<String>,
}

/// Parses `text` as a bot command invoked through one of `aliases`.
///
/// Longer aliases are tried first, so `/botadmin` wins over `/bot` when both
/// are configured. Returns `None` when no alias matches.
pub fn parse_command<S: AsRef<str>>(text: &str, aliases: &[S]) -> Option<ParsedCommand> {
    let text = text.trim_start();

    let mut candidates: Vec<&str> = aliases
        .iter()
        .map(AsRef::as_ref)
        .filter(|a| !a.is_empty())
        .collect();
    candidates.sort_by_key(|a| std::cmp::Reverse(a.len()));

    let (alias, rest) = candidates
        .into_iter()
        .find_map(|alias| strip_alias(text, alias).map(|rest| (alias, rest)))?;

    let mut tokens = shell_split(rest).into_iter();
    let name = match tokens.next() {
        Some(first) => first.to_lowercase(),
        None => BARE_ALIAS_COMMAND.to_string(),
    };

    Some(ParsedCommand {
        alias: alias.to_string(),
        name,
        args: tokens.collect(),
    })
}

fn strip_alias<'a>(text: &'a str, alias: &str) -> Option<&'a str> {
    let head = text.get(..alias.len())?;
    if head.to_lowercase() != alias.to_lowercase() {
        return None;
    }
    let rest = &text[alias.len()..];
    match rest.chars().next() {
        None => Some(rest),
        Some(c) if c.is_whitespace() => Some(rest),
        Some(_) => None,
    }
}
