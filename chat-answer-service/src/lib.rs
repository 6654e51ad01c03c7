//! Chat answer orchestration for retrieval-augmented chat backends.
//!
//! - [`controller`]: session state machine (generate / cancel / reset)
//! - [`acquisition`]: one outbound call, status validation, payload vs stream
//! - [`services::http_transport`]: HTTP collaborator trait and `reqwest` implementation
//! - [`config`]: request/HTTP options and the environment loader
//! - [`observer`]: snapshots pushed to presentation layers
//! - [`telemetry`]: library-scoped `tracing` layer
//!
//! # Example
//! ```no_run
//! use std::rc::Rc;
//! use std::sync::Arc;
//!
//! use chat_answer_service::{ChatConfig, ChatController, ConversationType, ReqwestTransport, SessionSnapshot};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = ChatConfig::from_env()?;
//! let transport = Arc::new(ReqwestTransport::from_config(&cfg)?);
//! let chat = ChatController::from_config(transport, &cfg);
//! chat.subscribe(Rc::new(|s: &SessionSnapshot| {
//!     if let Some(entry) = &s.processing_message {
//!         println!("{}", entry.display_text());
//!     }
//! }));
//!
//! chat.generate_answer(&cfg.request("What should I eat?", ConversationType::Chat), &cfg.http)
//!     .await;
//! # Ok(()) }
//! ```

pub mod acquisition;
pub mod api_types;
pub mod config;
pub mod controller;
pub mod error_handler;
pub mod observer;
pub mod services;
pub mod telemetry;

pub use answer_parser::{AnnotationExtractor, ChatThreadEntry, Citation, TextSegment};
pub use config::chat_config::ChatConfig;
pub use config::messages::ChatMessages;
pub use config::request_options::{
    ChatHttpOptions, ChatMessage, ChatRequestOptions, ConversationType,
};
pub use controller::ChatController;
pub use error_handler::{ChatError, ConfigError, Result};
pub use observer::{ChatObserver, NoopObserver, SessionSnapshot};
pub use services::http_transport::{HttpTransport, RawResponse, ReqwestTransport};
