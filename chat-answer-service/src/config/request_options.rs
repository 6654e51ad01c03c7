use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default backend base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:3001";

/// Default retrieval approach sent in the request context.
pub const DEFAULT_APPROACH: &str = "rrr";

/// Backend endpoint family; also the last path segment of the request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationType {
    /// Conversational answer; may be streamed.
    Chat,
    /// One-shot question; always a single payload.
    Ask,
}

impl ConversationType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Ask => "ask",
        }
    }
}

/// One prior message, passed through to the backend untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub role: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: "user".to_string(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            role: "assistant".to_string(),
        }
    }
}

/// What to ask and how the backend should retrieve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequestOptions {
    pub question: String,
    #[serde(rename = "type")]
    pub kind: ConversationType,
    pub approach: String,
    /// Free-form retrieval knobs merged into the request context.
    pub overrides: Map<String, Value>,
    /// Earlier turns, oldest first.
    pub messages: Vec<ChatMessage>,
}

impl ChatRequestOptions {
    pub fn new(question: impl Into<String>, kind: ConversationType) -> Self {
        Self {
            question: question.into(),
            kind,
            approach: DEFAULT_APPROACH.to_string(),
            overrides: Map::new(),
            messages: Vec::new(),
        }
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_override(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.overrides.insert(key.into(), value.into());
        self
    }
}

/// Where and how to send the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatHttpOptions {
    pub url: String,
    pub method: Method,
    /// Ask for a streamed body. Ignored for [`ConversationType::Ask`].
    pub stream: bool,
}

impl Default for ChatHttpOptions {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            method: Method::POST,
            stream: true,
        }
    }
}

impl ChatHttpOptions {
    /// Whether a request of `kind` is handled as a stream.
    pub fn streams(&self, kind: ConversationType) -> bool {
        self.stream && kind == ConversationType::Chat
    }

    /// `{url}/{type}` with a single separating slash.
    pub fn endpoint(&self, kind: ConversationType) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), kind.as_str())
    }
}
