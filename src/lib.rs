// Public modules
pub mod chat;
pub mod client;
pub mod client_logger;
pub mod error;
pub mod observability;
pub mod render;
pub mod storage;
pub mod store;
pub mod types;
pub mod utils;

// Re-exports
pub use client::{Completer, CompletionClient};
pub use client_logger::{CompletionLogger, JsonLinesLogger};
pub use error::{Error, Result};
pub use observability::register_biometrics;
pub use render::{PlainTextRenderer, Renderer};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use store::ConversationStore;
pub use types::*;
