use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Response};
use url::Url;

use crate::client_logger::CompletionLogger;
use crate::error::{Error, Result};
use crate::observability::{
    CLIENT_FORMAT_ERRORS, CLIENT_NETWORK_ERRORS, CLIENT_REQUEST_DURATION, CLIENT_REQUESTS,
};
use crate::types::{CompletionRequest, CompletionResponse, ErrorBody, Message, Settings};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://chatapi.akash.network/api/v1/chat/completions";

/// Environment variable holding the bearer credential.
pub const API_KEY_ENV: &str = "THREADCHAT_API_KEY";

/// Produces an assistant reply for a single user message.
///
/// The chat session talks to the endpoint only through this trait, so tests can substitute
/// scripted replies for the network.
#[async_trait::async_trait]
pub trait Completer: Send + Sync {
    /// Requests one completion.  Implementations make exactly one attempt.
    async fn complete(&self, message: &Message, settings: &Settings) -> Result<Message>;
}

/// Client for an OpenAI-compatible chat completion endpoint.
///
/// Each call to [`complete`](Completer::complete) is a single POST with no retry and no timeout.
#[derive(Clone)]
pub struct CompletionClient {
    api_key: String,
    client: ReqwestClient,
    endpoint: Url,
    logger: Option<Arc<dyn CompletionLogger>>,
}

impl CompletionClient {
    /// Create a new client for the default endpoint.
    ///
    /// The API key can be provided directly or read from the THREADCHAT_API_KEY environment
    /// variable.  There is no built-in key.
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_options(api_key, None)
    }

    /// Create a new client with a custom endpoint.
    pub fn with_options(api_key: Option<String>, endpoint: Option<String>) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => env::var(API_KEY_ENV).map_err(|_| {
                Error::authentication(format!(
                    "API key not provided and {API_KEY_ENV} environment variable not set"
                ))
            })?,
        };
        if api_key.trim().is_empty() {
            return Err(Error::authentication("API key is empty"));
        }
        HeaderValue::from_str(&format!("Bearer {api_key}"))
            .map_err(|_| Error::authentication("API key contains invalid header characters"))?;

        let endpoint = Url::parse(endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::url(
                format!("endpoint must be http or https, got {}", endpoint.scheme()),
                None,
            ));
        }

        let client = ReqwestClient::builder().build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {}", e),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            api_key,
            client,
            endpoint,
            logger: None,
        })
    }

    /// Attaches a logger that observes every request and outcome.
    pub fn with_logger(mut self, logger: Arc<dyn CompletionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
        // Validated in the constructor.
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(header::AUTHORIZATION, value);
        }
        headers
    }

    /// Process a non-2xx response into a network error.
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Error::network(Some(status_code), ErrorBody::banner(&body, status_code), None)
    }

    /// Send one request and decode the 2xx body.
    pub async fn send(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        if let Some(logger) = &self.logger {
            logger.log_request(request);
        }
        CLIENT_REQUESTS.click();
        let start = Instant::now();
        let result = self.send_inner(request).await;
        CLIENT_REQUEST_DURATION.add(start.elapsed().as_secs_f64());

        match &result {
            Ok(response) => {
                if let Some(logger) = &self.logger {
                    logger.log_response(response);
                }
            }
            Err(err) => {
                if err.is_format() {
                    CLIENT_FORMAT_ERRORS.click();
                } else {
                    CLIENT_NETWORK_ERRORS.click();
                }
                if let Some(logger) = &self.logger {
                    logger.log_error(err);
                }
            }
        }
        result
    }

    async fn send_inner(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.default_headers())
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::network(None, format!("Connection error: {}", e), Some(Box::new(e)))
                } else {
                    Error::network(None, format!("Request failed: {}", e), Some(Box::new(e)))
                }
            })?;

        if !response.status().is_success() {
            return Err(Self::process_error_response(response).await);
        }

        let body = response.text().await.map_err(|e| {
            Error::network(
                None,
                format!("Failed to read response: {}", e),
                Some(Box::new(e)),
            )
        })?;
        serde_json::from_str::<CompletionResponse>(&body)
            .map_err(|_| Error::format(crate::types::INVALID_FORMAT_MESSAGE))
    }
}

impl fmt::Debug for CompletionClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"<redacted>")
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[async_trait::async_trait]
impl Completer for CompletionClient {
    async fn complete(&self, message: &Message, settings: &Settings) -> Result<Message> {
        let request = CompletionRequest::for_message(message, settings);
        let reply = self.send(&request).await?.into_reply();
        if let Err(err) = &reply {
            CLIENT_FORMAT_ERRORS.click();
            if let Some(logger) = &self.logger {
                logger.log_error(err);
            }
        }
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = CompletionClient::new(Some("test-key".to_string())).unwrap();
        assert_eq!(client.api_key, "test-key");
        assert_eq!(client.endpoint.as_str(), DEFAULT_ENDPOINT);

        let client = CompletionClient::with_options(
            Some("test-key".to_string()),
            Some("http://127.0.0.1:8080/v1/chat/completions".to_string()),
        )
        .unwrap();
        assert_eq!(
            client.endpoint().as_str(),
            "http://127.0.0.1:8080/v1/chat/completions"
        );
    }

    #[test]
    fn rejects_bad_credentials_and_endpoints() {
        assert!(
            CompletionClient::new(Some("   ".to_string()))
                .unwrap_err()
                .is_authentication()
        );
        assert!(
            CompletionClient::new(Some("bad\nkey".to_string()))
                .unwrap_err()
                .is_authentication()
        );
        assert!(
            CompletionClient::with_options(Some("k".to_string()), Some("not a url".to_string()))
                .is_err()
        );
        assert!(
            CompletionClient::with_options(
                Some("k".to_string()),
                Some("ftp://example.com/".to_string())
            )
            .is_err()
        );
    }

    #[test]
    fn headers_carry_bearer_token() {
        let client = CompletionClient::new(Some("sk-test".to_string())).unwrap();
        let headers = client.default_headers();
        assert_eq!(headers[header::AUTHORIZATION], "Bearer sk-test");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::ACCEPT], "application/json");
    }

    #[test]
    fn debug_redacts_key() {
        let client = CompletionClient::new(Some("sk-secret".to_string())).unwrap();
        let debug = format!("{client:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("redacted"));
    }
}
