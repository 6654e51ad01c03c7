//! Unified error handling for `chat-answer-service`.
//!
//! This module exposes a single top-level error type [`ChatError`] for the
//! whole library and groups load-time problems in [`ConfigError`]. Small
//! helpers for reading/validating configuration values return the unified
//! [`Result<T>`] alias.
//!
//! All messages include the suffix `[Chat Service]` to simplify attribution in logs.

use thiserror::Error;

use crate::config::messages::ChatMessages;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

/// Unified result alias for the entire crate.
pub type Result<T> = std::result::Result<T, ChatError>;

/* ------------------------------------------------------------------------- */
/* Top-level error                                                           */
/* ------------------------------------------------------------------------- */

/// Top-level error for the `chat-answer-service` crate.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChatError {
    /// Configuration/validation errors (startup).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The request never produced a response (connect, TLS, body read).
    #[error("[Chat Service] transport error: {0}")]
    Transport(String),

    /// Backend answered with a failing HTTP status.
    #[error("[Chat Service] HTTP {code}: {message}")]
    Response {
        /// Status text reported by the backend.
        message: String,
        /// Numeric HTTP status.
        code: u16,
    },

    /// Non-streamed payload was not a valid answer.
    #[error("[Chat Service] failed to decode response: {0}")]
    Decode(String),

    /// The request was cancelled by the caller.
    #[error("[Chat Service] request cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl ChatError {
    /// HTTP status of a failed response, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Response { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// User-facing text for this failure: the invalid-request text for a 400,
    /// the generic API error text for everything else.
    pub fn user_message<'a>(&self, messages: &'a ChatMessages) -> &'a str {
        match self.status_code() {
            Some(400) => &messages.invalid_request,
            _ => &messages.api_error,
        }
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

/// Error enum for environment/config-driven setup.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A number failed to parse (timeouts, limits).
    #[error("[Chat Service] invalid number in {var}: {reason}")]
    InvalidNumber {
        /// Variable name (e.g., `CHAT_TIMEOUT_SECS`).
        var: &'static str,
        /// Human-readable reason (e.g., `expected u64`).
        reason: &'static str,
    },

    /// Value had the wrong format (e.g., invalid URL, bad flag).
    #[error("[Chat Service] invalid format in {var}: {reason}")]
    InvalidFormat {
        /// Variable name (e.g., `CHAT_API_URL`).
        var: &'static str,
        /// Explanation (e.g., `must start with http:// or https://`).
        reason: &'static str,
    },

    /// A text value that must not be blank was blank.
    #[error("[Chat Service] {0} must not be empty")]
    Empty(&'static str),
}

/* ------------------------------------------------------------------------- */
/* Value helpers (return unified `Result<T>`)                                */
/* ------------------------------------------------------------------------- */

/// Parses an optional number (`Ok(None)` if unset/empty).
///
/// # Errors
/// Returns [`ChatError::Config`] with [`ConfigError::InvalidNumber`] if the
/// value is set but does not parse.
pub fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    reason: &'static str,
) -> Result<Option<T>> {
    match value {
        Some(v) if !v.trim().is_empty() => v
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, reason }.into()),
        _ => Ok(None),
    }
}

/// Parses an optional boolean flag (`1/0`, `true/false`, `yes/no`, `on/off`).
///
/// # Errors
/// Returns [`ChatError::Config`] with [`ConfigError::InvalidFormat`] for any
/// other non-empty value.
pub fn parse_bool(var: &'static str, value: Option<String>) -> Result<Option<bool>> {
    let Some(v) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(Some(true)),
        "0" | "false" | "no" | "off" => Ok(Some(false)),
        _ => Err(ConfigError::InvalidFormat {
            var,
            reason: "expected a boolean flag",
        }
        .into()),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
///
/// # Errors
/// Returns [`ChatError::Config`] with [`ConfigError::InvalidFormat`] when
/// the string does not start with a valid HTTP scheme.
pub fn validate_http_endpoint(var: &'static str, value: &str) -> Result<()> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        }
        .into())
    }
}
