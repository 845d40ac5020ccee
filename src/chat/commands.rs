//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to control the chat session without sending messages
//! to the service.

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the service.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Clear the visible transcript.
    Clear,

    /// Manually retry the last failed or timed out turn.
    Retry,

    /// Display the controller's current status.
    Status,

    /// Check the service's health endpoint.
    Health,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use chatwait::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/retry").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].splitn(2, ' ');
    let command = parts.next()?.to_lowercase();

    let result = match command.as_str() {
        "clear" => ChatCommand::Clear,
        "retry" => ChatCommand::Retry,
        "status" => ChatCommand::Status,
        "health" => ChatCommand::Health,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        other => ChatCommand::Invalid(format!("unknown command: /{other}")),
    };
    Some(result)
}

/// Returns the help text describing available commands.
pub fn help_text() -> &'static str {
    "Available commands:\n\
     /clear          Clear the visible transcript\n\
     /retry          Retry the last failed or timed out turn\n\
     /status         Show session and turn status\n\
     /health         Check the service's health\n\
     /help, /?       Show this help\n\
     /quit, /exit    Exit the application"
}
