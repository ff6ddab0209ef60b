use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::client::{DEFAULT_BASE_URL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_STREAM_IDLE_TIMEOUT};
use crate::core::config::io::ConfigError;
use crate::utils::url::{base_url_from_host, normalize_base_url};

pub const DEFAULT_LOG_LEVEL: &str = "warn";
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Keys accepted by `config set` / `config unset`.
pub const CONFIG_KEYS: [&str; 8] = [
    "base_url",
    "default_model",
    "history_dir",
    "connect_timeout_secs",
    "request_timeout_secs",
    "stream_timeout_secs",
    "autosave",
    "log_level",
];

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    /// Ollama server, e.g. `http://localhost:11434`
    pub base_url: Option<String>,
    /// Model used when none is given on the command line
    pub default_model: Option<String>,
    /// Where saved conversations live
    pub history_dir: Option<PathBuf>,
    pub connect_timeout_secs: Option<u64>,
    /// Timeout for non-streaming requests (model list, `say --no-stream`)
    pub request_timeout_secs: Option<u64>,
    /// How long a streamed reply may go silent before it is abandoned
    pub stream_timeout_secs: Option<u64>,
    /// Save the conversation after every turn (default on)
    pub autosave: Option<bool>,
    /// Diagnostic log filter, e.g. `info` or `ollama_chat=debug`
    pub log_level: Option<String>,
}

/// Values that outrank the config file.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigOverrides<'a> {
    pub base_url: Option<&'a str>,
    pub model: Option<&'a str>,
    /// Raw `OLLAMA_HOST` value, if set.
    pub ollama_host: Option<&'a str>,
}

/// Effective settings after applying overrides and defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub model: Option<String>,
    pub history_dir: PathBuf,
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
    pub stream_timeout: Duration,
    pub autosave: bool,
    pub log_level: String,
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
///
/// # Examples
/// - Unix: `/home/user/.config/ollama-chat/config.toml` → `~/.config/ollama-chat/config.toml`
/// - Windows: paths are shown unchanged
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}

fn canonical_key(key: &str) -> Result<&'static str, ConfigError> {
    let normalized = key.trim().replace('-', "_");
    CONFIG_KEYS
        .iter()
        .copied()
        .find(|candidate| *candidate == normalized)
        .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Some(true),
        "false" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}

fn parse_seconds(key: &str, value: &str) -> Result<u64, ConfigError> {
    match value.trim().parse::<u64>() {
        Ok(seconds) if seconds > 0 => Ok(seconds),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a positive number of seconds, got '{value}'"),
        }),
    }
}

impl Config {
    /// Set one key from its command-line string form.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let key = canonical_key(key)?;
        let invalid = |reason: String| ConfigError::InvalidValue {
            key: key.to_string(),
            reason,
        };

        match key {
            "base_url" => {
                let trimmed = value.trim();
                if !(trimmed.starts_with("http://") || trimmed.starts_with("https://")) {
                    return Err(invalid(format!(
                        "expected an http:// or https:// URL, got '{value}'"
                    )));
                }
                self.base_url = Some(normalize_base_url(trimmed));
            }
            "default_model" => {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(invalid("model name cannot be empty".to_string()));
                }
                self.default_model = Some(trimmed.to_string());
            }
            "history_dir" => self.history_dir = Some(PathBuf::from(value.trim())),
            "connect_timeout_secs" => self.connect_timeout_secs = Some(parse_seconds(key, value)?),
            "request_timeout_secs" => self.request_timeout_secs = Some(parse_seconds(key, value)?),
            "stream_timeout_secs" => self.stream_timeout_secs = Some(parse_seconds(key, value)?),
            "autosave" => {
                self.autosave = Some(
                    parse_bool(value)
                        .ok_or_else(|| invalid(format!("expected on/off, got '{value}'")))?,
                );
            }
            "log_level" => {
                let level = value.trim().to_ascii_lowercase();
                if !LOG_LEVELS.contains(&level.as_str()) {
                    return Err(invalid(format!(
                        "expected one of {}, got '{value}'",
                        LOG_LEVELS.join(", ")
                    )));
                }
                self.log_level = Some(level);
            }
            _ => return Err(ConfigError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    pub fn unset_value(&mut self, key: &str) -> Result<(), ConfigError> {
        match canonical_key(key)? {
            "base_url" => self.base_url = None,
            "default_model" => self.default_model = None,
            "history_dir" => self.history_dir = None,
            "connect_timeout_secs" => self.connect_timeout_secs = None,
            "request_timeout_secs" => self.request_timeout_secs = None,
            "stream_timeout_secs" => self.stream_timeout_secs = None,
            "autosave" => self.autosave = None,
            "log_level" => self.log_level = None,
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// Apply precedence: command line, then `OLLAMA_HOST` (base URL only),
    /// then this file, then built-in defaults.
    pub fn resolve(&self, overrides: ConfigOverrides<'_>, data_dir: &Path) -> ResolvedConfig {
        let base_url = overrides
            .base_url
            .map(normalize_base_url)
            .or_else(|| overrides.ollama_host.and_then(base_url_from_host))
            .or_else(|| self.base_url.as_deref().map(normalize_base_url))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        ResolvedConfig {
            base_url,
            model: overrides
                .model
                .map(str::to_string)
                .or_else(|| self.default_model.clone()),
            history_dir: self
                .history_dir
                .clone()
                .unwrap_or_else(|| data_dir.join("history")),
            connect_timeout: self
                .connect_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
            stream_timeout: self
                .stream_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT),
            autosave: self.autosave.unwrap_or(true),
            log_level: self
                .log_level
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}
