//! Interactive multi-thread chat on top of the threadchat client library.
//!
//! This module provides the pieces the `threadchat` binary is assembled from:
//!
//! - Several named threads, persisted between runs
//! - Optimistic submission with rollback and a retry banner on failure
//! - Slash commands for thread and settings control
//! - Backslash line continuation for multi-line messages
//!
//! # Architecture
//!
//! The module is organized into several components:
//!
//! - [`config`]: CLI argument parsing and configuration
//! - [`session`]: Core chat session management and API interaction
//! - [`commands`]: Slash command parsing and handling
//! - [`input`]: Multi-line input assembly
//! - [`clipboard`]: Copying message text

mod clipboard;
mod commands;
mod config;
mod input;
mod session;

pub use crate::render::{PlainTextRenderer, Renderer};
pub use clipboard::{CopyDestination, copy_text};
pub use commands::{ChatCommand, help_text, parse_command};
pub use config::{
    ChatArgs, ChatConfig, ConfigFile, DATA_DIR_ENV, ENDPOINT_ENV, default_data_dir,
};
pub use input::InputBuffer;
pub use session::{
    ChatSession, PendingTurn, SessionStats, TurnAction, TurnOutcome, WRITER_PROMPT,
};
