//! Slash command parsing for the chat application.
//!
//! This module handles parsing of special commands that start with `/`,
//! allowing users to manage threads and settings without sending messages
//! to the endpoint.

use crate::types::KnownModel;

/// A parsed chat command.
///
/// These commands control the chat session and are not sent to the endpoint.  Thread and message
/// indexes are 1-based, as displayed.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCommand {
    /// Start a new empty thread.
    New,

    /// Start a new thread seeded with the writing-assistant prompt.
    Writer,

    /// List the threads.
    Threads,

    /// Make the thread at this index active.
    Switch(usize),

    /// Delete the thread at this index, or the active thread.
    Delete(Option<usize>),

    /// Toggle collapse of the thread at this index, or the active thread.
    Collapse(Option<usize>),

    /// Print the active thread.
    Show,

    /// Select a model.
    Model(KnownModel),

    /// List the available models.
    ListModels,

    /// Set the sampling temperature.
    Temperature(f32),

    /// Regenerate the latest reply.
    Regenerate,

    /// Re-invoke the action that last failed.
    Retry,

    /// Copy the message at this index, or the latest.
    Copy(Option<usize>),

    /// Show the current settings.
    Settings,

    /// Display session statistics.
    Stats,

    /// Display help information.
    Help,

    /// Exit the chat application.
    Quit,

    /// Report a parsing error back to the caller.
    Invalid(String),
}

/// Parses user input for slash commands.
///
/// Returns `Some(ChatCommand)` if the input is a valid command,
/// or `None` if it should be treated as a regular message.
///
/// # Examples
///
/// ```
/// # use threadchat::chat::parse_command;
/// assert!(parse_command("/quit").is_some());
/// assert!(parse_command("/switch 2").is_some());
/// assert!(parse_command("Hello there!").is_none());
/// ```
pub fn parse_command(input: &str) -> Option<ChatCommand> {
    let input = input.trim();

    let rest = input.strip_prefix('/')?;
    let mut parts = rest.splitn(2, ' ');
    let command = parts.next()?.to_lowercase();
    let argument = parts.next().map(|s| s.trim()).filter(|s| !s.is_empty());

    let result = match command.as_str() {
        "new" => ChatCommand::New,
        "writer" => ChatCommand::Writer,
        "threads" | "list" | "ls" => ChatCommand::Threads,
        "switch" => match argument {
            Some(arg) => match parse_index(arg) {
                Some(index) => ChatCommand::Switch(index),
                None => ChatCommand::Invalid("/switch expects a thread number".to_string()),
            },
            None => ChatCommand::Invalid("/switch requires a thread number".to_string()),
        },
        "delete" | "rm" => parse_optional_index(argument, ChatCommand::Delete, "/delete"),
        "collapse" => parse_optional_index(argument, ChatCommand::Collapse, "/collapse"),
        "show" => ChatCommand::Show,
        "model" => match argument {
            Some(name) => match name.parse::<KnownModel>() {
                Ok(model) => ChatCommand::Model(model),
                Err(err) => ChatCommand::Invalid(format!("{err} (try /model to list)")),
            },
            None => ChatCommand::ListModels,
        },
        "temperature" | "temp" => match argument {
            Some(arg) => match arg.parse::<f32>() {
                Ok(value) => ChatCommand::Temperature(value),
                Err(_) => ChatCommand::Invalid(
                    "/temperature expects a value between 0 and 1".to_string(),
                ),
            },
            None => ChatCommand::Invalid("/temperature requires a value".to_string()),
        },
        "regenerate" | "regen" => ChatCommand::Regenerate,
        "retry" => ChatCommand::Retry,
        "copy" => parse_optional_index(argument, ChatCommand::Copy, "/copy"),
        "settings" | "config" => ChatCommand::Settings,
        "stats" | "status" => ChatCommand::Stats,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" | "q" => ChatCommand::Quit,
        _ => ChatCommand::Invalid(format!("Unknown command: /{}", command)),
    };

    Some(result)
}

fn parse_index(value: &str) -> Option<usize> {
    value.parse::<usize>().ok().filter(|index| *index > 0)
}

fn parse_optional_index<F>(argument: Option<&str>, constructor: F, name: &str) -> ChatCommand
where
    F: Fn(Option<usize>) -> ChatCommand,
{
    match argument {
        Some(arg) => match parse_index(arg) {
            Some(index) => constructor(Some(index)),
            None => ChatCommand::Invalid(format!("{} expects a positive number", name)),
        },
        None => constructor(None),
    }
}

/// Returns help text describing available commands.
pub fn help_text() -> &'static str {
    r#"Available commands:
  /new                   Start a new thread
  /writer                Start a thread with the writing assistant
  /threads               List threads
  /switch <n>            Switch to thread n
  /delete [n]            Delete thread n (default: active thread)
  /collapse [n]          Collapse or expand thread n (default: active thread)
  /show                  Print the active thread
  /model [name]          Select a model (no argument lists them)
  /temperature <v>       Set temperature 0.0-1.0 in steps of 0.1
  /regenerate            Ask the last question again
  /retry                 Retry the last failed request
  /copy [n]              Copy message n (default: latest message)
  /settings              Show current settings
  /stats                 Show session statistics
  /help                  Show this help message
  /quit                  Exit the chat

End a line with \ to continue the message on the next line."#
}
