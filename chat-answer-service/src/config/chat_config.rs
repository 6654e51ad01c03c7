//! Chat configuration loaded from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `CHAT_API_URL` | `http://localhost:3001` |
//! | `CHAT_STREAM` | `true` |
//! | `CHAT_APPROACH` | `rrr` |
//! | `CHAT_RETRIEVAL_MODE` | `hybrid` |
//! | `CHAT_TIMEOUT_SECS` | `60` |
//! | `CHAT_MAX_HISTORY` | `5` |
//! | `CHAT_API_ERROR_MESSAGE` | generic error text |
//! | `CHAT_INVALID_REQUEST_ERROR` | bad request text |
//! | `CHAT_NEXT_QUESTION_INDICATOR` | `Next Questions:` |

use std::time::Duration;

use answer_parser::{AnnotationExtractor, DEFAULT_NEXT_QUESTION_INDICATOR};
use serde_json::{Map, Value};

use crate::config::messages::ChatMessages;
use crate::config::request_options::{
    ChatHttpOptions, ChatRequestOptions, ConversationType, DEFAULT_APPROACH,
};
use crate::error_handler::{
    ConfigError, Result, parse_bool, parse_var, validate_http_endpoint,
};

/// Default number of prior turns a presentation layer keeps.
pub const DEFAULT_MAX_CHAT_HISTORY: usize = 5;

/// Default transport timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Everything a session needs besides the question itself.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub http: ChatHttpOptions,
    pub approach: String,
    pub overrides: Map<String, Value>,
    pub timeout: Duration,
    pub max_chat_history: usize,
    pub messages: ChatMessages,
    pub next_question_indicator: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            http: ChatHttpOptions::default(),
            approach: DEFAULT_APPROACH.to_string(),
            overrides: default_overrides("hybrid"),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_chat_history: DEFAULT_MAX_CHAT_HISTORY,
            messages: ChatMessages::default(),
            next_question_indicator: DEFAULT_NEXT_QUESTION_INDICATOR.to_string(),
        }
    }
}

impl ChatConfig {
    /// Build from process environment variables with defaults.
    ///
    /// # Errors
    /// [`ConfigError`] for malformed numbers, flags, URLs or a blank indicator.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(url) = text("CHAT_API_URL") {
            let url = url.trim().to_string();
            validate_http_endpoint("CHAT_API_URL", &url)?;
            cfg.http.url = url;
        }
        if let Some(stream) = parse_bool("CHAT_STREAM", lookup("CHAT_STREAM"))? {
            cfg.http.stream = stream;
        }
        if let Some(approach) = text("CHAT_APPROACH") {
            cfg.approach = approach.trim().to_string();
        }
        if let Some(mode) = text("CHAT_RETRIEVAL_MODE") {
            cfg.overrides = default_overrides(mode.trim());
        }
        if let Some(secs) =
            parse_var::<u64>("CHAT_TIMEOUT_SECS", lookup("CHAT_TIMEOUT_SECS"), "expected u64")?
        {
            cfg.timeout = Duration::from_secs(secs);
        }
        if let Some(max) =
            parse_var::<usize>("CHAT_MAX_HISTORY", lookup("CHAT_MAX_HISTORY"), "expected usize")?
        {
            cfg.max_chat_history = max;
        }
        if let Some(msg) = text("CHAT_API_ERROR_MESSAGE") {
            cfg.messages.api_error = msg;
        }
        if let Some(msg) = text("CHAT_INVALID_REQUEST_ERROR") {
            cfg.messages.invalid_request = msg;
        }
        if let Some(indicator) = lookup("CHAT_NEXT_QUESTION_INDICATOR") {
            let indicator = indicator.trim();
            if indicator.is_empty() {
                return Err(ConfigError::Empty("CHAT_NEXT_QUESTION_INDICATOR").into());
            }
            cfg.next_question_indicator = indicator.to_string();
        }

        Ok(cfg)
    }

    /// Request options for `question` carrying the configured approach and overrides.
    pub fn request(&self, question: impl Into<String>, kind: ConversationType) -> ChatRequestOptions {
        ChatRequestOptions {
            approach: self.approach.clone(),
            overrides: self.overrides.clone(),
            ..ChatRequestOptions::new(question, kind)
        }
    }

    pub fn extractor(&self) -> AnnotationExtractor {
        AnnotationExtractor::new(self.next_question_indicator.clone())
    }
}

fn default_overrides(retrieval_mode: &str) -> Map<String, Value> {
    let mut overrides = Map::new();
    overrides.insert("retrieval_mode".into(), retrieval_mode.into());
    overrides.insert("semantic_ranker".into(), true.into());
    overrides.insert("semantic_captions".into(), false.into());
    overrides.insert("suggest_followup_questions".into(), true.into());
    overrides
}
