use std::fmt;

use serde::{Deserialize, Serialize};

/// The author of a message.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Typed by the person at the keyboard.
    User,

    /// Returned by the completion endpoint.
    Assistant,

    /// Seeded context, e.g. the writing-assistant preset.
    System,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::System => write!(f, "system"),
        }
    }
}

/// One turn in a thread.
///
/// Messages are immutable once created; a thread changes only by appending or by replacing its
/// whole sequence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// The author of the message.
    pub role: Role,

    /// The text of the message.
    pub content: String,
}

impl Message {
    /// Create a new `Message`.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a new user `Message`.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant `Message`.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a new system `Message`.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Returns true if the message was authored by the user.
    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Returns true if the message was returned by the endpoint.
    pub fn is_assistant(&self) -> bool {
        self.role == Role::Assistant
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, to_value};

    #[test]
    fn message_serialization() {
        let message = Message::user("Hello");
        assert_eq!(
            to_value(&message).unwrap(),
            json!({"role": "user", "content": "Hello"})
        );
    }

    #[test]
    fn system_role_deserializes() {
        let message: Message =
            serde_json::from_value(json!({"role": "system", "content": "be terse"})).unwrap();
        assert_eq!(message, Message::system("be terse"));
        assert!(!message.is_user());
        assert!(!message.is_assistant());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let result =
            serde_json::from_value::<Message>(json!({"role": "tool", "content": "x"}));
        assert!(result.is_err());
    }
}
