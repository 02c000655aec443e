//! Configuration types for the chat application.
//!
//! This module provides CLI argument parsing via `arrrg`, the optional YAML config file, and the
//! resolution of both against the environment.  Precedence is arguments, then environment, then
//! the config file, then defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use arrrg_derive::CommandLine;
use serde::Deserialize;

use crate::client::{API_KEY_ENV, DEFAULT_ENDPOINT};
use crate::error::{Error, Result};
use crate::types::KnownModel;

/// Environment variable overriding the endpoint.
pub const ENDPOINT_ENV: &str = "THREADCHAT_ENDPOINT";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "THREADCHAT_DATA_DIR";

/// Command-line arguments for the threadchat tool.
#[derive(CommandLine, Debug, Default, PartialEq, Eq)]
pub struct ChatArgs {
    /// Path to a YAML config file.
    #[arrrg(optional, "YAML config file with endpoint, api_key and data_dir", "FILE")]
    pub config: Option<String>,

    /// Completion endpoint URL.
    #[arrrg(optional, "Completion endpoint URL", "URL")]
    pub endpoint: Option<String>,

    /// Directory holding the persisted conversations.
    #[arrrg(optional, "Directory for persisted conversations", "DIR")]
    pub data_dir: Option<String>,

    /// File to append request/response events to.
    #[arrrg(optional, "Append request and response events as JSON lines", "FILE")]
    pub log_file: Option<String>,

    /// Model to select at startup.
    #[arrrg(optional, "Model to select at startup", "MODEL")]
    pub model: Option<String>,

    /// Disable ANSI colors and styles.
    #[arrrg(flag, "Disable ANSI colors/styles")]
    pub no_color: bool,

    /// Keep conversations in memory only.
    #[arrrg(flag, "Keep conversations in memory only")]
    pub ephemeral: bool,
}

/// The YAML config file.  Every key is optional.
#[derive(Debug, Default, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Completion endpoint URL.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Bearer credential.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Directory holding the persisted conversations.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl ConfigFile {
    /// Reads and parses a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|err| {
            Error::io(format!("failed to read config {}", path.display()), err)
        })?;
        Self::parse(&contents)
    }

    /// Parses config file contents.  An empty document yields the defaults.
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }
}

/// Resolved configuration for a chat session.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConfig {
    /// The endpoint requests are posted to.
    pub endpoint: String,

    /// The bearer credential, if one was configured.
    pub api_key: Option<String>,

    /// Where conversations persist; `None` keeps them in memory.
    pub data_dir: Option<PathBuf>,

    /// Where to append request/response events, if anywhere.
    pub log_file: Option<PathBuf>,

    /// A model to select at startup, replacing the persisted choice.
    pub model: Option<KnownModel>,

    /// Whether to use ANSI colors and styles in output.
    pub use_color: bool,
}

impl ChatConfig {
    /// Resolves arguments against the process environment and the config file.
    pub fn resolve(args: ChatArgs) -> Result<Self> {
        Self::resolve_with(args, |key| env::var(key).ok())
    }

    /// Resolves arguments against `lookup` in place of the process environment.
    pub fn resolve_with(args: ChatArgs, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let file = match &args.config {
            Some(path) => ConfigFile::load(path)?,
            None => ConfigFile::default(),
        };

        let endpoint = args
            .endpoint
            .or_else(|| lookup(ENDPOINT_ENV))
            .or(file.endpoint)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        let api_key = lookup(API_KEY_ENV).or(file.api_key);
        let data_dir = if args.ephemeral {
            None
        } else {
            Some(
                args.data_dir
                    .map(PathBuf::from)
                    .or_else(|| lookup(DATA_DIR_ENV).map(PathBuf::from))
                    .or(file.data_dir)
                    .unwrap_or_else(default_data_dir),
            )
        };
        let model = match args.model {
            Some(name) => Some(name.parse::<KnownModel>().map_err(|err| {
                Error::validation(err, Some("model".to_string()))
            })?),
            None => None,
        };

        Ok(Self {
            endpoint,
            api_key,
            data_dir,
            log_file: args.log_file.map(PathBuf::from),
            model,
            use_color: !args.no_color,
        })
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            data_dir: Some(default_data_dir()),
            log_file: None,
            model: None,
            use_color: true,
        }
    }
}

/// `<platform data dir>/threadchat`, or `.threadchat` when the platform has none.
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("threadchat"))
        .unwrap_or_else(|| PathBuf::from(".threadchat"))
}
