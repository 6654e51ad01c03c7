//! Non-streamed answer payload.

use answer_parser::AnswerContext;
use serde::Deserialize;

/// `{ "choices": [{ "message": { "content", "context" } }] }`, or the same
/// message at the top level, plus an optional top-level `content` fallback.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotResponse {
    #[serde(default)]
    pub choices: Vec<BotChoice>,
    #[serde(default)]
    pub message: Option<BotMessage>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotChoice {
    #[serde(default)]
    pub message: Option<BotMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub context: Option<AnswerContext>,
}

impl BotResponse {
    /// The answer message: first choice, else the top-level message.
    pub fn answer(&self) -> Option<&BotMessage> {
        self.choices
            .first()
            .and_then(|c| c.message.as_ref())
            .or(self.message.as_ref())
    }

    /// Non-empty answer text, falling back to the top-level `content`.
    pub fn text(&self) -> Option<&str> {
        self.answer()
            .and_then(|m| m.content.as_deref())
            .filter(|c| !c.is_empty())
            .or(self.content.as_deref().filter(|c| !c.is_empty()))
    }

    pub fn context(&self) -> Option<&AnswerContext> {
        self.answer().and_then(|m| m.context.as_ref())
    }
}
