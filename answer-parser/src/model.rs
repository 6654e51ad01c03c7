//! Chat thread entry model shared by the extractor, the stream reassembler
//! and the session controller.
//!
//! Field names serialize in camelCase so a presentation layer can consume
//! entries as-is (`isUserMessage`, `followupQuestions`, `dataPoints`).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extractor::Annotations;

/// Opaque reference extracted from answer text (document name, URL, ...).
///
/// Two citations are the same citation when their text is equal.
///
/// # Example
/// ```
/// use answer_parser::Citation;
/// let c = Citation::new("DOC1");
/// assert_eq!(c.as_str(), "DOC1");
/// assert_eq!(c, Citation::from("DOC1"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Citation(String);

impl Citation {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Citation {
    fn from(text: &str) -> Self {
        Self(text.to_string())
    }
}

impl From<String> for Citation {
    fn from(text: String) -> Self {
        Self(text)
    }
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One block of display text together with its reasoning steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    /// Display text with every marker stripped.
    pub value: String,
    /// Reasoning steps extracted from this segment.
    pub following_steps: Vec<String>,
}

/// Thoughts and data points a backend attaches to an answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerContext {
    #[serde(default)]
    pub thoughts: Option<String>,
    #[serde(default)]
    pub data_points: Option<Vec<String>>,
}

/// One rendered turn of the conversation (user echo or bot answer).
///
/// While a stream is in flight the controller replaces the published entry
/// with newer values that keep the same `id`; once the session is idle again
/// the entry is final.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatThreadEntry {
    pub id: String,
    pub text: Vec<TextSegment>,
    pub followup_questions: Vec<String>,
    /// Deduplicated, in order of first appearance.
    pub citations: Vec<Citation>,
    pub timestamp: DateTime<Utc>,
    pub is_user_message: bool,
    pub thoughts: Option<String>,
    pub data_points: Option<Vec<String>>,
}

impl ChatThreadEntry {
    /// Entry echoing the user's own question. Never carries annotations.
    pub fn user(question: impl Into<String>) -> Self {
        Self::with_text(question.into(), true)
    }

    /// Bot entry with a single segment of already clean text.
    pub fn bot(text: impl Into<String>) -> Self {
        Self::with_text(text.into(), false)
    }

    fn with_text(value: String, is_user_message: bool) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            text: vec![TextSegment {
                value,
                following_steps: Vec::new(),
            }],
            followup_questions: Vec::new(),
            citations: Vec::new(),
            timestamp: Utc::now(),
            is_user_message,
            thoughts: None,
            data_points: None,
        }
    }

    /// Concatenated display text of all segments.
    pub fn display_text(&self) -> String {
        self.text.iter().map(|s| s.value.as_str()).collect()
    }

    /// Overwrites the annotation lists with `annotations`.
    ///
    /// Steps land on the last segment; citations are deduplicated. User
    /// entries are left untouched.
    pub fn apply_annotations(&mut self, annotations: &Annotations) {
        if self.is_user_message {
            return;
        }
        if self.text.is_empty() {
            self.text.push(TextSegment::default());
        }
        if let Some(segment) = self.text.last_mut() {
            segment.following_steps = annotations.following_steps.clone();
        }
        self.followup_questions = annotations.followup_questions.clone();
        self.citations.clear();
        for citation in &annotations.citations {
            if !self.citations.contains(citation) {
                self.citations.push(citation.clone());
            }
        }
    }

    /// Attaches backend context. User entries are left untouched.
    pub fn apply_context(&mut self, context: AnswerContext) {
        if self.is_user_message {
            return;
        }
        if context.thoughts.is_some() {
            self.thoughts = context.thoughts;
        }
        if context.data_points.is_some() {
            self.data_points = context.data_points;
        }
    }
}
