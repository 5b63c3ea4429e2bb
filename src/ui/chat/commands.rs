use std::str::FromStr;

use once_cell::sync::Lazy;
use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Select the model used for new submissions
    Model,
    /// Start a new chat session (clears the transcript)
    Clear,
    /// Show help
    Help,
    /// Exit the application
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl SlashCommand {
    /// User-visible description shown in help and the palette.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Model => "select the model used for new questions",
            SlashCommand::Clear => "start a new chat session",
            SlashCommand::Help => "show available commands",
            SlashCommand::Quit => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

static COMMAND_ENTRIES: Lazy<Vec<CommandEntry>> = Lazy::new(|| {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
});

pub fn command_entries() -> &'static [CommandEntry] {
    &COMMAND_ENTRIES
}

/// Parse a slash command from user input.
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].split_whitespace();
    let head = parts.next()?;
    let rest: Vec<String> = parts.map(|s| s.to_string()).collect();

    let command = SlashCommand::from_str(head)
        .ok()
        .or_else(|| match head.to_lowercase().as_str() {
            "q" | "exit" | "bye" => Some(SlashCommand::Quit),
            "new" | "reset" => Some(SlashCommand::Clear),
            "models" => Some(SlashCommand::Model),
            "h" => Some(SlashCommand::Help),
            _ => None,
        })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Help text for all available commands.
pub fn get_help_text() -> String {
    let mut help = String::from("Commands: ");
    let entries: Vec<String> = command_entries()
        .iter()
        .map(|entry| format!("/{} ({})", entry.keyword, entry.description))
        .collect();
    help.push_str(&entries.join(", "));
    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_and_without_arguments() {
        let parsed = parse_slash_command("/model DeepSeek").unwrap();
        assert_eq!(parsed.command, SlashCommand::Model);
        assert_eq!(parsed.argument(), Some("DeepSeek"));

        let parsed = parse_slash_command("/clear").unwrap();
        assert_eq!(parsed.command, SlashCommand::Clear);
        assert_eq!(parsed.argument(), None);
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(parse_slash_command("/q").unwrap().command, SlashCommand::Quit);
        assert_eq!(parse_slash_command("/new").unwrap().command, SlashCommand::Clear);
        assert_eq!(parse_slash_command("/models").unwrap().command, SlashCommand::Model);
    }

    #[test]
    fn plain_messages_are_not_commands() {
        assert!(parse_slash_command("hello /model").is_none());
        assert!(parse_slash_command("/unknown").is_none());
    }
}
