use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::types::Message;

/// The title every thread starts with.
pub const DEFAULT_TITLE: &str = "New conversation";

/// Titles derived from a message keep at most this many characters before the ellipsis.
pub const TITLE_MAX_CHARS: usize = 50;

/// A named conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Thread {
    /// Opaque identifier, unique among live threads.
    pub id: String,

    /// Display title; starts as [`DEFAULT_TITLE`].
    pub title: String,

    /// When the thread was created.
    #[serde(with = "crate::utils::time")]
    pub created_at: OffsetDateTime,
}

impl Thread {
    /// Create a thread with the default title.
    pub fn new(id: impl Into<String>, created_at: OffsetDateTime) -> Self {
        Self {
            id: id.into(),
            title: DEFAULT_TITLE.to_string(),
            created_at,
        }
    }

    /// Returns true while the title has never been derived.
    pub fn has_default_title(&self) -> bool {
        self.title == DEFAULT_TITLE
    }
}

/// Derive a thread title from a message: its first 50 characters, with `...` appended when the
/// content was longer.
pub fn derive_title(message: &Message) -> String {
    let mut chars = message.content.chars();
    let head: String = chars.by_ref().take(TITLE_MAX_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    #[test]
    fn short_titles_are_kept() {
        assert_eq!(derive_title(&Message::user("Hello")), "Hello");
        let exact = "x".repeat(50);
        assert_eq!(derive_title(&Message::user(exact.clone())), exact);
    }

    #[test]
    fn long_titles_are_ellipsized() {
        let long = "y".repeat(51);
        let title = derive_title(&Message::user(long));
        assert_eq!(title, format!("{}...", "y".repeat(50)));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(60);
        let title = derive_title(&Message::user(long));
        assert_eq!(title.chars().count(), 53);
    }

    #[test]
    fn thread_uses_camel_case() {
        let thread = Thread::new("1", datetime!(2024-10-19 15:04:00 UTC));
        assert_eq!(
            serde_json::to_value(&thread).unwrap(),
            json!({
                "id": "1",
                "title": "New conversation",
                "createdAt": "2024-10-19T15:04:00Z"
            })
        );
    }

    #[test]
    fn thread_accepts_fractional_timestamps() {
        let thread: Thread = serde_json::from_value(json!({
            "id": "1729350240000",
            "title": "Hello",
            "createdAt": "2024-10-19T15:04:00.123Z"
        }))
        .unwrap();
        assert_eq!(thread.title, "Hello");
        assert!(!thread.has_default_title());
    }
}
