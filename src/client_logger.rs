//! Logging hooks for completion client operations.
//!
//! This module provides the [`CompletionLogger`] trait that allows callers to capture every
//! request the [`CompletionClient`](crate::CompletionClient) sends and every outcome it observes,
//! and [`JsonLinesLogger`], which appends them to a file as one JSON object per line.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{Error, Result};
use crate::types::{CompletionRequest, CompletionResponse};

/// A trait for logging completion client operations.
///
/// # Example
///
/// ```rust
/// use threadchat::{CompletionLogger, CompletionRequest, CompletionResponse, Error};
///
/// struct StderrLogger;
///
/// impl CompletionLogger for StderrLogger {
///     fn log_request(&self, request: &CompletionRequest) {
///         eprintln!("-> {} ({} messages)", request.model, request.messages.len());
///     }
///
///     fn log_response(&self, response: &CompletionResponse) {
///         eprintln!("<- {} choices", response.choices.len());
///     }
///
///     fn log_error(&self, error: &Error) {
///         eprintln!("!! {error}");
///     }
/// }
/// ```
pub trait CompletionLogger: Send + Sync {
    /// Log a request just before it is sent.
    fn log_request(&self, request: &CompletionRequest);

    /// Log a successfully decoded 2xx response, before the reply is extracted from it.
    fn log_response(&self, response: &CompletionResponse);

    /// Log a failed request: transport failure, non-2xx status, or malformed body.
    fn log_error(&self, error: &Error);
}

/// Appends one JSON object per event to a file.
///
/// Each line carries `ts` (RFC 3339), `event` (`request`, `response` or `error`) and the event
/// payload.  Write failures are swallowed; logging never fails a request.
pub struct JsonLinesLogger {
    file: Mutex<File>,
}

impl JsonLinesLogger {
    /// Opens `path` for appending, creating it if needed.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())
            .map_err(|err| {
                Error::io(
                    format!("failed to open log file {}", path.as_ref().display()),
                    err,
                )
            })?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    fn write_line(&self, event: &str, payload: serde_json::Value) {
        let ts = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        let line = json!({"ts": ts, "event": event, "payload": payload});
        if let Ok(mut file) = self.file.lock() {
            let _ = writeln!(file, "{line}");
        }
    }
}

impl CompletionLogger for JsonLinesLogger {
    fn log_request(&self, request: &CompletionRequest) {
        self.write_line("request", serde_json::to_value(request).unwrap_or_default());
    }

    fn log_response(&self, response: &CompletionResponse) {
        self.write_line("response", serde_json::to_value(response).unwrap_or_default());
    }

    fn log_error(&self, error: &Error) {
        self.write_line(
            "error",
            json!({"message": error.to_string(), "status": error.status_code()}),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Settings};

    #[test]
    fn json_lines_logger_appends_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.jsonl");
        let logger = JsonLinesLogger::create(&path).unwrap();

        let request = CompletionRequest::for_message(&Message::user("Hello"), &Settings::default());
        logger.log_request(&request);
        logger.log_error(&Error::network(Some(500), "rate limited", None));

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "request");
        assert_eq!(lines[0]["payload"]["max_tokens"], 2000);
        assert_eq!(lines[1]["event"], "error");
        assert_eq!(lines[1]["payload"]["status"], 500);
    }
}
