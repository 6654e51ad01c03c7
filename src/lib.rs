//! Chat answer pipeline: marker extraction and stream reassembly
//! (`answer_parser`) plus the session controller and HTTP transport
//! (`chat_answer_service`).

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

pub use answer_parser;
pub use chat_answer_service;

pub use answer_parser::{AnnotationExtractor, ChatThreadEntry, Citation, StreamReassembler};
pub use chat_answer_service::{
    ChatConfig, ChatController, ChatError, ChatHttpOptions, ChatObserver, ChatRequestOptions,
    ConversationType, ReqwestTransport, SessionSnapshot,
};

/// Installs a global subscriber: `RUST_LOG` (or `default`) for everything,
/// `level` for the chat crates, rendered by the chat telemetry layer.
///
/// # Errors
/// Fails if a global subscriber is already set.
pub fn init_tracing(default: &str, level: Level) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(chat_answer_service::telemetry::env_filter_with_level(default, level))
        .with(chat_answer_service::telemetry::layer())
        .try_init()
}
