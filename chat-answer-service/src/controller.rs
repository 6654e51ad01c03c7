//! Chat session state machine.
//!
//! [`ChatController`] owns the request lifecycle of one chat session:
//!
//! ```text
//! idle ─generate_answer─▶ generating ─▶ awaiting ─┬─ payload ─▶ extract ─────────┐
//!                                                 └─ stream ──▶ processing ──────┤
//!                          (error: error entry unless a partial entry exists)   ▼
//!                                                                    clear ─▶ idle
//! ```
//!
//! The controller is single-threaded (`!Sync`): state lives in a `RefCell` and
//! no borrow is held across an await, so observers may call back into the
//! controller (e.g. [`ChatController::cancel_request`]) from `on_update`.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Instant;

use answer_parser::{AnnotationExtractor, ChatThreadEntry, StreamOutcome, StreamReassembler};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::acquisition::{ApiResponse, get_api_response};
use crate::api_types::BotResponse;
use crate::config::chat_config::ChatConfig;
use crate::config::messages::ChatMessages;
use crate::config::request_options::{ChatHttpOptions, ChatRequestOptions, ConversationType};
use crate::error_handler::{ChatError, Result};
use crate::observer::{ChatObserver, SessionSnapshot};
use crate::services::http_transport::{ByteStream, HttpTransport};

#[derive(Default)]
struct SessionState {
    snapshot: SessionSnapshot,
    /// Token of the request in flight, tagged with its sequence number.
    cancel: Option<(u64, CancellationToken)>,
    seq: u64,
}

pub struct ChatController {
    transport: Arc<dyn HttpTransport>,
    extractor: AnnotationExtractor,
    messages: ChatMessages,
    state: RefCell<SessionState>,
    observers: RefCell<Vec<Rc<dyn ChatObserver>>>,
}

impl ChatController {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        extractor: AnnotationExtractor,
        messages: ChatMessages,
    ) -> Self {
        Self {
            transport,
            extractor,
            messages,
            state: RefCell::default(),
            observers: RefCell::default(),
        }
    }

    pub fn from_config(transport: Arc<dyn HttpTransport>, cfg: &ChatConfig) -> Self {
        Self::new(transport, cfg.extractor(), cfg.messages.clone())
    }

    /// Registers `observer` for every subsequent update.
    pub fn subscribe(&self, observer: Rc<dyn ChatObserver>) {
        self.observers.borrow_mut().push(observer);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().snapshot.clone()
    }

    pub fn generating_answer(&self) -> bool {
        self.state.borrow().snapshot.generating_answer
    }

    pub fn is_awaiting_response(&self) -> bool {
        self.state.borrow().snapshot.is_awaiting_response
    }

    pub fn is_processing_response(&self) -> bool {
        self.state.borrow().snapshot.is_processing_response
    }

    pub fn processing_message(&self) -> Option<ChatThreadEntry> {
        self.state.borrow().snapshot.processing_message.clone()
    }

    /// Asks the backend and drives the session until the answer is complete,
    /// failed or cancelled. Never returns an error: failures become an error
    /// entry, cancellation leaves the partial entry in place.
    ///
    /// An empty question is ignored; whitespace still counts as a question.
    /// One request at a time per controller.
    #[instrument(skip_all, fields(kind = request.kind.as_str()))]
    pub async fn generate_answer(&self, request: &ChatRequestOptions, http: &ChatHttpOptions) {
        if request.question.is_empty() {
            debug!("empty question ignored");
            return;
        }

        let token = CancellationToken::new();
        let seq = {
            let mut state = self.state.borrow_mut();
            state.seq += 1;
            state.cancel = Some((state.seq, token.clone()));
            state.seq
        };
        let started = Instant::now();

        self.update(|s| s.generating_answer = true);

        match self.run_request(request, http, &token).await {
            Ok(()) => info!(
                latency_ms = started.elapsed().as_millis(),
                "answer generated"
            ),
            Err(ChatError::Cancelled) => info!(
                latency_ms = started.elapsed().as_millis(),
                "request cancelled"
            ),
            Err(err) => {
                warn!(error = %err, "answer generation failed");
                if self.processing_message().is_none() {
                    let entry = ChatThreadEntry::bot(err.user_message(&self.messages));
                    self.update(|s| s.processing_message = Some(entry));
                }
            }
        }

        self.clear();

        let mut state = self.state.borrow_mut();
        if state.cancel.as_ref().is_some_and(|(s, _)| *s == seq) {
            state.cancel = None;
        }
    }

    /// Cancels the request in flight. No-op when idle.
    pub fn cancel_request(&self) {
        let token = self
            .state
            .borrow()
            .cancel
            .as_ref()
            .map(|(_, token)| token.clone());
        if let Some(token) = token {
            debug!("cancelling request in flight");
            token.cancel();
        }
    }

    /// Drops the displayed entry and resets all flags.
    pub fn reset(&self) {
        self.update(|s| {
            s.generating_answer = false;
            s.is_awaiting_response = false;
            s.is_processing_response = false;
            s.processing_message = None;
        });
    }

    async fn run_request(
        &self,
        request: &ChatRequestOptions,
        http: &ChatHttpOptions,
        token: &CancellationToken,
    ) -> Result<()> {
        if request.kind == ConversationType::Chat {
            let entry = ChatThreadEntry::user(request.question.clone());
            self.update(|s| s.processing_message = Some(entry));
        }

        self.update(|s| {
            s.is_awaiting_response = true;
            s.processing_message = None;
        });
        let response = get_api_response(self.transport.as_ref(), request, http, token).await?;
        self.update(|s| s.is_awaiting_response = false);

        match response {
            ApiResponse::Payload(payload) => {
                self.process_payload(&payload);
                Ok(())
            }
            ApiResponse::Stream(body) => self.process_stream(body, token).await,
        }
    }

    fn process_payload(&self, payload: &BotResponse) {
        let entry = match payload.text() {
            Some(text) => {
                let extraction = self.extractor.extract(text);
                let mut entry = ChatThreadEntry::bot(extraction.display);
                entry.apply_annotations(&extraction.annotations);
                if let Some(context) = payload.context() {
                    entry.apply_context(context.clone());
                }
                entry
            }
            None => {
                warn!("answer payload without content");
                ChatThreadEntry::bot(self.messages.api_error.clone())
            }
        };
        self.update(|s| s.processing_message = Some(entry));
    }

    async fn process_stream(&self, body: ByteStream, token: &CancellationToken) -> Result<()> {
        self.update(|s| s.is_processing_response = true);

        let reassembler = StreamReassembler::new(ChatThreadEntry::bot(""), self.extractor.clone());
        let outcome = reassembler
            .run(
                body,
                token,
                |entry| {
                    let entry = entry.clone();
                    self.update(|s| s.processing_message = Some(entry));
                },
                || self.clear(),
            )
            .await?;

        if let StreamOutcome::Cancelled(entry) = outcome {
            debug!(id = %entry.id, "stream stopped by cancellation");
        }
        Ok(())
    }

    fn clear(&self) {
        self.update(|s| {
            s.generating_answer = false;
            s.is_awaiting_response = false;
            s.is_processing_response = false;
        });
    }

    /// Applies `change` and notifies every observer once.
    fn update(&self, change: impl FnOnce(&mut SessionSnapshot)) {
        let snapshot = {
            let mut state = self.state.borrow_mut();
            change(&mut state.snapshot);
            state.snapshot.clone()
        };
        let observers = self.observers.borrow().clone();
        for observer in observers {
            observer.on_update(&snapshot);
        }
    }
}
