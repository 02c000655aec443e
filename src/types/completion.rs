use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{Message, Settings};

/// Upper bound on reply length sent with every request.
pub const MAX_TOKENS: u32 = 2000;

/// Message returned when a 2xx body does not carry `choices[0].message.content`.
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid API response format";

/// Body of an OpenAI-compatible chat completion request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionRequest {
    /// Model identifier.
    pub model: String,

    /// Conversation sent to the model.
    pub messages: Vec<Message>,

    /// Upper bound on reply length.
    pub max_tokens: u32,

    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Build the request for one user message.
    ///
    /// Only `message` is sent; earlier turns of the thread are not included.
    pub fn for_message(message: &Message, settings: &Settings) -> Self {
        Self {
            model: settings.model.as_str().to_string(),
            messages: vec![message.clone()],
            max_tokens: MAX_TOKENS,
            temperature: settings.temperature,
        }
    }
}

/// Body of a chat completion response.
///
/// Every field is optional so that a malformed body is reported as a format error by
/// [`CompletionResponse::into_reply`] rather than as a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletionResponse {
    /// Response identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Candidate replies; only the first is used.
    #[serde(default)]
    pub choices: Vec<Choice>,

    /// Token accounting, when the endpoint reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<CompletionUsage>,
}

/// One candidate reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Choice {
    /// Position in `choices`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,

    /// The reply itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChoiceMessage>,

    /// Why generation stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// The message inside a [`Choice`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChoiceMessage {
    /// Author role reported by the endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Reply text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

/// Token counts for a completion.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionUsage {
    /// Tokens in the prompt.
    #[serde(default)]
    pub prompt_tokens: u64,

    /// Tokens in the reply.
    #[serde(default)]
    pub completion_tokens: u64,

    /// Sum of the above.
    #[serde(default)]
    pub total_tokens: u64,
}

impl CompletionResponse {
    /// Extract `choices[0].message.content` as an assistant message.
    pub fn into_reply(self) -> Result<Message> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .map(Message::assistant)
            .ok_or_else(|| Error::format(INVALID_FORMAT_MESSAGE))
    }
}

/// Error body returned with non-2xx statuses: `{"error": {"message": "..."}}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    /// The error detail.
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

/// Detail inside an [`ErrorBody`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorDetail {
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,

    /// Error kind, when the endpoint reports one.
    #[serde(default, rename = "type")]
    pub error_type: Option<String>,
}

impl ErrorBody {
    /// The banner text for a failed request: `error.message` if present, else a status message.
    pub fn banner(body: &str, status: u16) -> String {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|body| body.error)
            .and_then(|detail| detail.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| format!("API Error: {status}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{KnownModel, Model};
    use serde_json::{json, to_value};

    #[test]
    fn request_carries_only_the_given_message() {
        let settings = Settings {
            model: Model::Known(KnownModel::Llama32_3BInstruct),
            temperature: 0.5,
        };
        let request = CompletionRequest::for_message(&Message::user("Hello"), &settings);
        assert_eq!(
            to_value(&request).unwrap(),
            json!({
                "model": "Meta-Llama-3-2-3B-Instruct",
                "messages": [{"role": "user", "content": "Hello"}],
                "max_tokens": 2000,
                "temperature": 0.5
            })
        );
    }

    #[test]
    fn reply_is_extracted() {
        let response: CompletionResponse = serde_json::from_value(json!({
            "id": "cmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there"}}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        }))
        .unwrap();
        assert_eq!(response.usage.unwrap().total_tokens, 5);
        assert_eq!(response.into_reply().unwrap(), Message::assistant("Hi there"));
    }

    #[test]
    fn missing_reply_is_a_format_error() {
        for body in [
            json!({}),
            json!({"choices": []}),
            json!({"choices": [{"index": 0}]}),
            json!({"choices": [{"message": {"role": "assistant"}}]}),
        ] {
            let response: CompletionResponse = serde_json::from_value(body).unwrap();
            let err = response.into_reply().unwrap_err();
            assert!(err.is_format());
            assert_eq!(err.message(), INVALID_FORMAT_MESSAGE);
        }
    }

    #[test]
    fn error_banner() {
        assert_eq!(
            ErrorBody::banner(r#"{"error":{"message":"rate limited"}}"#, 500),
            "rate limited"
        );
        assert_eq!(ErrorBody::banner(r#"{"error":{}}"#, 429), "API Error: 429");
        assert_eq!(ErrorBody::banner("<html>bad gateway</html>", 502), "API Error: 502");
        assert_eq!(ErrorBody::banner("", 404), "API Error: 404");
    }
}
