//! Wire shape of one streamed unit.
//!
//! Every line of a streamed body is a JSON object of the form
//! `{"choices":[{"delta":{"content":"..","role":".."},"context":{..}}]}`.
//! All fields are optional; unknown fields are ignored.

use serde::Deserialize;

use crate::model::AnswerContext;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamUnit {
    #[serde(default)]
    pub choices: Vec<StreamChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamChoice {
    #[serde(default)]
    pub delta: Delta,
    #[serde(default)]
    pub context: Option<AnswerContext>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Delta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub context: Option<AnswerContext>,
}

impl StreamUnit {
    /// Parses one framed line. `None` for anything that is not a unit.
    pub fn parse(line: &str) -> Option<Result<Self, serde_json::Error>> {
        let line = line.trim();
        let line = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
        if line.is_empty() || line.starts_with(':') || line == "[DONE]" {
            return None;
        }
        Some(serde_json::from_str(line))
    }

    /// Content fragment of the first choice.
    pub fn content(&self) -> Option<&str> {
        self.choices.first()?.delta.content.as_deref()
    }

    /// Context of the first choice, from the choice or from its delta.
    pub fn take_context(&mut self) -> Option<AnswerContext> {
        let choice = self.choices.first_mut()?;
        choice.context.take().or_else(|| choice.delta.context.take())
    }
}
