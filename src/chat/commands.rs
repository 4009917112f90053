//! Slash command parsing for the chat application.
//!
//! Lines starting with `/` control the REPL instead of being sent to the
//! backend.

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Print the whole transcript again.
    Transcript,

    /// Show how many replies are still outstanding.
    Pending,

    /// Abandon every outstanding reply.
    Cancel,

    /// Display session statistics.
    Stats,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be submitted as a regular message.
///
/// # Examples
///
/// ```
/// # use chatterpi::chat::{ChatCommand, parse_command};
/// assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
/// assert!(parse_command("Hello there").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "help" | "?" => no_argument(ChatCommand::Help, &command, argument),
        "quit" | "exit" | "q" => no_argument(ChatCommand::Quit, &command, argument),
        "transcript" | "history" => no_argument(ChatCommand::Transcript, &command, argument),
        "pending" => no_argument(ChatCommand::Pending, &command, argument),
        "cancel" => no_argument(ChatCommand::Cancel, &command, argument),
        "stats" | "status" => no_argument(ChatCommand::Stats, &command, argument),
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn no_argument(cmd: ChatCommand, name: &str, argument: Option<&str>) -> ChatCommand {
    match argument {
        Some(_) => ChatCommand::Invalid(format!("/{name} takes no arguments")),
        None => cmd,
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /transcript            Print the conversation so far
  /pending               Show how many replies are outstanding
  /cancel                Abandon outstanding replies
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_quit_commands() {
        assert_eq!(parse_command("/quit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/exit"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("/q"), Some(ChatCommand::Quit));
        assert_eq!(parse_command("  /QUIT  "), Some(ChatCommand::Quit));
    }

    #[test]
    fn parse_session_commands() {
        assert_eq!(parse_command("/transcript"), Some(ChatCommand::Transcript));
        assert_eq!(parse_command("/history"), Some(ChatCommand::Transcript));
        assert_eq!(parse_command("/pending"), Some(ChatCommand::Pending));
        assert_eq!(parse_command("/cancel"), Some(ChatCommand::Cancel));
        assert_eq!(parse_command("/stats"), Some(ChatCommand::Stats));
        assert_eq!(parse_command("/?"), Some(ChatCommand::Help));
    }

    #[test]
    fn arguments_are_rejected() {
        assert!(matches!(
            parse_command("/cancel everything"),
            Some(ChatCommand::Invalid(msg)) if msg.contains("no arguments")
        ));
    }

    #[test]
    fn unknown_command() {
        assert_eq!(
            parse_command("/model davinci-002"),
            Some(ChatCommand::Invalid("Unknown command: /model".to_string()))
        );
    }

    #[test]
    fn non_commands() {
        assert_eq!(parse_command("Hello!"), None);
        assert_eq!(parse_command("what is 1/2?"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("  "), None);
    }

    #[test]
    fn help_text_lists_commands() {
        let help = help_text();
        assert!(help.contains("/quit"));
        assert!(help.contains("/transcript"));
        assert!(help.contains("/cancel"));
    }
}
