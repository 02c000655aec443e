//! Output rendering for the chat terminal.
//!
//! This module provides the [`Renderer`] trait and a plain-text implementation that writes to
//! stdout (or any writer) with optional ANSI styling.

use std::io::{self, Stdout, Write};

use crate::store::ConversationStore;
use crate::types::{Message, Role, Settings, Thread};
use crate::utils::time::short_display;

/// ANSI escape code for dim text (used for system messages and metadata).
const ANSI_DIM: &str = "\x1b[2m";

/// ANSI escape code for bold text (used for the active thread).
const ANSI_BOLD: &str = "\x1b[1m";

/// ANSI escape code to reset all styling.
const ANSI_RESET: &str = "\x1b[0m";

/// ANSI escape code for cyan text (used for the user label).
const ANSI_CYAN: &str = "\x1b[36m";

/// ANSI escape code for yellow text (used for the loading notice).
const ANSI_YELLOW: &str = "\x1b[33m";

/// ANSI escape code for green text (used for the assistant label).
const ANSI_GREEN: &str = "\x1b[32m";

/// ANSI escape code for red text (used for the error banner).
const ANSI_RED: &str = "\x1b[31m";

/// Heading shown for an empty thread.
pub const WELCOME_TITLE: &str = "Welcome to threadchat";

/// Text shown under the welcome heading.
pub const WELCOME_TEXT: &str = "Ready to assist you with anything you need, from answering questions to providing recommendations.";

/// Trait for rendering chat output.
///
/// This abstraction allows for different rendering strategies:
/// - Plain text with ANSI styling
/// - Plain text without styling (for piping/redirecting)
pub trait Renderer: Send {
    /// Print one message with its role label.
    fn print_message(&mut self, message: &Message);

    /// Print the error banner, with the hint that `/retry` re-invokes the failed action.
    fn print_error(&mut self, error: &str);

    /// Print an informational message.
    fn print_info(&mut self, info: &str);

    /// Print the notice shown while a request is outstanding.
    fn print_generating(&mut self);

    /// Print the thread list: index, markers, title, date and message count.
    fn print_threads(&mut self, store: &ConversationStore);

    /// Print the active thread: its messages, the welcome banner, or the collapsed placeholder.
    fn print_transcript(&mut self, store: &ConversationStore);

    /// Print the global settings.
    fn print_settings(&mut self, settings: &Settings);
}

/// Plain text renderer with optional ANSI styling.
pub struct PlainTextRenderer<W: Write + Send = Stdout> {
    out: W,
    use_color: bool,
}

impl PlainTextRenderer {
    /// Creates a new PlainTextRenderer with ANSI colors enabled.
    pub fn new() -> Self {
        Self::with_color(true)
    }

    /// Creates a new PlainTextRenderer with specified color setting.
    pub fn with_color(use_color: bool) -> Self {
        Self::with_writer(io::stdout(), use_color)
    }
}

impl<W: Write + Send> PlainTextRenderer<W> {
    /// Creates a renderer writing to `out`.
    pub fn with_writer(out: W, use_color: bool) -> Self {
        Self { out, use_color }
    }

    /// Consumes the renderer, returning its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn styled(&self, style: &str, text: &str) -> String {
        if self.use_color {
            format!("{style}{text}{ANSI_RESET}")
        } else {
            text.to_string()
        }
    }

    fn line(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> Renderer for PlainTextRenderer<W> {
    fn print_message(&mut self, message: &Message) {
        let label = match message.role {
            Role::User => self.styled(ANSI_CYAN, "You:"),
            Role::Assistant => self.styled(ANSI_GREEN, "Assistant:"),
            Role::System => self.styled(ANSI_DIM, "System:"),
        };
        let body = if message.role == Role::System {
            self.styled(ANSI_DIM, &message.content)
        } else {
            message.content.clone()
        };
        self.line(&format!("{label} {body}\n"));
    }

    fn print_error(&mut self, error: &str) {
        let banner = self.styled(ANSI_RED, &format!("Error: {error}"));
        self.line(&format!("{banner}  (/retry to try again)"));
    }

    fn print_info(&mut self, info: &str) {
        self.line(info);
    }

    fn print_generating(&mut self) {
        let notice = self.styled(ANSI_YELLOW, "Generating response...");
        self.line(&notice);
    }

    fn print_threads(&mut self, store: &ConversationStore) {
        for (index, thread) in store.threads().iter().enumerate() {
            let active = thread.id == store.active_id();
            let line = thread_line(
                index + 1,
                thread,
                active,
                store.is_collapsed(&thread.id),
                store.messages(&thread.id).len(),
            );
            let line = if active {
                self.styled(ANSI_BOLD, &line)
            } else {
                line
            };
            self.line(&line);
        }
    }

    fn print_transcript(&mut self, store: &ConversationStore) {
        let messages = store.active_messages();
        if store.is_collapsed(store.active_id()) {
            let placeholder = self.styled(ANSI_DIM, &collapsed_placeholder(messages.len()));
            self.line(&placeholder);
        } else if messages.is_empty() {
            let title = self.styled(ANSI_BOLD, WELCOME_TITLE);
            self.line(&title);
            self.line(WELCOME_TEXT);
            self.line("Type a message to start, or /writer for the writing assistant.");
        } else {
            for message in messages {
                self.print_message(message);
            }
        }
    }

    fn print_settings(&mut self, settings: &Settings) {
        self.line(&format!(
            "model: {} ({})",
            settings.model.menu_label(),
            settings.model
        ));
        self.line(&format!("temperature: {:.1}", settings.temperature));
    }
}

/// One row of the thread list, e.g. `* 2. Hello there  (Oct 19, 3:04 PM, 4 messages)`.
pub fn thread_line(
    index: usize,
    thread: &Thread,
    active: bool,
    collapsed: bool,
    message_count: usize,
) -> String {
    let marker = if active { '*' } else { ' ' };
    let fold = if collapsed { " [+]" } else { "" };
    let noun = if message_count == 1 {
        "message"
    } else {
        "messages"
    };
    format!(
        "{marker} {index}. {}{fold}  ({}, {message_count} {noun})",
        thread.title,
        short_display(thread.created_at),
    )
}

/// The line shown in place of a collapsed thread's messages.
pub fn collapsed_placeholder(message_count: usize) -> String {
    format!("[{message_count} messages collapsed]")
}
