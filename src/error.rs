//! Error types for threadchat.
//!
//! Every fallible operation in the crate returns [`Result`].  The completion client produces
//! [`Error::Network`] and [`Error::Format`]; the store produces I/O and serialization errors; the
//! session produces validation and not-found errors for bad user commands.

use std::error;
use std::fmt;
use std::io;
use std::sync::Arc;

/// The main error type for threadchat.
#[derive(Clone, Debug)]
pub enum Error {
    /// The request failed in transport or the endpoint answered with a non-2xx status.
    Network {
        /// HTTP status code, when the endpoint answered at all.
        status_code: Option<u16>,
        /// Human-readable error message.
        message: String,
        /// Underlying cause.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// The endpoint answered 2xx but the body lacked the reply.
    Format {
        /// Human-readable error message.
        message: String,
    },

    /// No usable credential was supplied.
    Authentication {
        /// Human-readable error message.
        message: String,
    },

    /// A thread or message does not exist.
    NotFound {
        /// Human-readable error message.
        message: String,
        /// The identifier that was looked up.
        resource_id: Option<String>,
    },

    /// A user-supplied value was rejected.
    Validation {
        /// Human-readable error message.
        message: String,
        /// Parameter that failed validation.
        param: Option<String>,
    },

    /// Error during JSON or YAML serialization or deserialization.
    Serialization {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },

    /// I/O error.
    Io {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Arc<io::Error>,
    },

    /// A URL parsing error.
    Url {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<url::ParseError>,
    },

    /// The HTTP client could not be constructed.
    HttpClient {
        /// Human-readable error message.
        message: String,
        /// The underlying error.
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    },
}

impl Error {
    /// Creates a new network error.
    pub fn network(
        status_code: Option<u16>,
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Network {
            status_code,
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new format error.
    pub fn format(message: impl Into<String>) -> Self {
        Error::Format {
            message: message.into(),
        }
    }

    /// Creates a new authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    /// Creates a new not found error.
    pub fn not_found(message: impl Into<String>, resource_id: Option<String>) -> Self {
        Error::NotFound {
            message: message.into(),
            resource_id,
        }
    }

    /// Creates a new validation error.
    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    /// Creates a new serialization error.
    pub fn serialization(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Creates a new I/O error.
    pub fn io(message: impl Into<String>, source: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            source: Arc::new(source),
        }
    }

    /// Creates a new URL error.
    pub fn url(message: impl Into<String>, source: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            source,
        }
    }

    /// Creates a new HTTP client error.
    pub fn http_client(
        message: impl Into<String>,
        source: Option<Box<dyn error::Error + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            source: source.map(Arc::from),
        }
    }

    /// Returns true if this error is a network error.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    /// Returns true if this error is a malformed-response error.
    pub fn is_format(&self) -> bool {
        matches!(self, Error::Format { .. })
    }

    /// Returns true if this error is related to authentication.
    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    /// Returns true if this error is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    /// Returns true if this error is a validation error.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    /// Returns true if this error is a serialization error.
    pub fn is_serialization(&self) -> bool {
        matches!(self, Error::Serialization { .. })
    }

    /// Returns the status code associated with this error, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Network { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// Returns the bare human-readable message, without the kind prefix used by `Display`.
    ///
    /// This is the text shown in the error banner.
    pub fn message(&self) -> &str {
        match self {
            Error::Network { message, .. }
            | Error::Format { message }
            | Error::Authentication { message }
            | Error::NotFound { message, .. }
            | Error::Validation { message, .. }
            | Error::Serialization { message, .. }
            | Error::Io { message, .. }
            | Error::Url { message, .. }
            | Error::HttpClient { message, .. } => message,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Network {
                status_code,
                message,
                ..
            } => {
                if let Some(status_code) = status_code {
                    write!(f, "Network error: {message} (status {status_code})")
                } else {
                    write!(f, "Network error: {message}")
                }
            }
            Error::Format { message } => {
                write!(f, "Format error: {message}")
            }
            Error::Authentication { message } => {
                write!(f, "Authentication error: {message}")
            }
            Error::NotFound {
                message,
                resource_id,
            } => {
                if let Some(resource_id) = resource_id {
                    write!(f, "Not found: {message} [ID: {resource_id}]")
                } else {
                    write!(f, "Not found: {message}")
                }
            }
            Error::Validation { message, param } => {
                if let Some(param) = param {
                    write!(f, "Validation error: {message} (parameter: {param})")
                } else {
                    write!(f, "Validation error: {message}")
                }
            }
            Error::Serialization { message, .. } => {
                write!(f, "Serialization error: {message}")
            }
            Error::Io { message, .. } => {
                write!(f, "I/O error: {message}")
            }
            Error::Url { message, .. } => {
                write!(f, "URL error: {message}")
            }
            Error::HttpClient { message, .. } => {
                write!(f, "HTTP client error: {message}")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::Network { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Serialization { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            Error::Io { source, .. } => Some(source.as_ref()),
            Error::Url { source, .. } => {
                source.as_ref().map(|e| e as &(dyn error::Error + 'static))
            }
            Error::HttpClient { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &(dyn error::Error + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::serialization(format!("JSON error: {err}"), Some(Box::new(err)))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::serialization(format!("YAML error: {err}"), Some(Box::new(err)))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("URL parse error: {err}"), Some(err))
    }
}

/// A specialized Result type for threadchat operations.
pub type Result<T> = std::result::Result<T, Error>;
