//! Response acquisition: one outbound call, status validation, routing.
//!
//! - streaming only for `ConversationType::Chat` with `http.stream` set
//! - status outside `2xx` → [`ChatError::Response`] (streamed or not)
//! - non-streamed bodies are read fully and decoded into [`BotResponse`]
//! - the call and the body read race the request's cancellation token

use std::fmt;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, instrument};

use crate::api_types::BotResponse;
use crate::config::request_options::{ChatHttpOptions, ChatRequestOptions};
use crate::error_handler::{ChatError, Result};
use crate::services::http_transport::{ByteStream, HttpTransport};

/// What the backend answered with.
pub enum ApiResponse {
    /// Complete JSON answer.
    Payload(BotResponse),
    /// Body to be reassembled incrementally.
    Stream(ByteStream),
}

impl fmt::Debug for ApiResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Payload(resp) => f.debug_tuple("Payload").field(resp).finish(),
            Self::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

/// Performs the request and routes the response.
///
/// # Errors
/// - [`ChatError::Cancelled`] if `cancel` fires before the response is ready
/// - [`ChatError::Response`] for a status outside `2xx`
/// - [`ChatError::Transport`] for network failures
/// - [`ChatError::Decode`] if a non-streamed body is not a valid answer
#[instrument(skip_all, fields(kind = request.kind.as_str()))]
pub async fn get_api_response(
    transport: &dyn HttpTransport,
    request: &ChatRequestOptions,
    http: &ChatHttpOptions,
    cancel: &CancellationToken,
) -> Result<ApiResponse> {
    let started = Instant::now();
    let stream = http.streams(request.kind);

    let resp = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ChatError::Cancelled),
        resp = transport.call(request, http, stream) => resp?,
    };

    if !resp.is_success() {
        error!(
            status = resp.status,
            latency_ms = started.elapsed().as_millis(),
            "chat request failed"
        );
        return Err(ChatError::Response {
            message: resp.status_text,
            code: resp.status,
        });
    }

    if stream {
        debug!(status = resp.status, "streaming answer");
        return Ok(ApiResponse::Stream(resp.body));
    }

    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(ChatError::Cancelled),
        bytes = resp.collect_body() => bytes?,
    };
    let payload: BotResponse = serde_json::from_slice(&bytes)
        .map_err(|e| ChatError::Decode(format!("serde error: {e}")))?;

    debug!(
        bytes = bytes.len(),
        latency_ms = started.elapsed().as_millis(),
        "answer payload received"
    );
    Ok(ApiResponse::Payload(payload))
}
