//! Session observation for presentation layers.
//!
//! Every state change of a [`ChatController`](crate::controller::ChatController)
//! is followed by exactly one [`ChatObserver::on_update`] with a full snapshot.

use answer_parser::ChatThreadEntry;
use serde::Serialize;

/// Observable state of a chat session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub generating_answer: bool,
    pub is_awaiting_response: bool,
    pub is_processing_response: bool,
    /// Entry currently on display: user echo, streamed answer, final answer
    /// or error entry.
    pub processing_message: Option<ChatThreadEntry>,
}

impl SessionSnapshot {
    /// No request in flight.
    pub fn is_idle(&self) -> bool {
        !(self.generating_answer || self.is_awaiting_response || self.is_processing_response)
    }
}

/// Receives session snapshots.
pub trait ChatObserver {
    fn on_update(&self, _snapshot: &SessionSnapshot) {}
}

/// Observer that ignores everything.
#[derive(Default, Clone, Copy)]
pub struct NoopObserver;
impl ChatObserver for NoopObserver {}

impl<F> ChatObserver for F
where
    F: Fn(&SessionSnapshot),
{
    fn on_update(&self, snapshot: &SessionSnapshot) {
        self(snapshot)
    }
}
