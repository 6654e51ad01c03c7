//! HTTP collaborator for chat requests.
//!
//! [`HttpTransport`] performs exactly one request and hands back the status
//! plus an unread body stream; deciding what to do with a failing status or
//! how to read the body is up to the caller. [`ReqwestTransport`] is the
//! production implementation:
//!
//! - `POST {url}/{type}` with a JSON body
//! - body: `{ "messages": [...prior, {question, "user"}], "context": {...overrides, "approach"}, "stream" }`
//! - the body is exposed as a byte stream (`reqwest::Response::bytes_stream`)

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::header;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::config::chat_config::ChatConfig;
use crate::config::request_options::{ChatHttpOptions, ChatMessage, ChatRequestOptions};
use crate::error_handler::{ChatError, Result};

/// Response body as raw byte chunks, in arrival order.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>>>;

/// Status line plus an unread body.
pub struct RawResponse {
    pub status: u16,
    pub status_text: String,
    pub body: ByteStream,
}

impl RawResponse {
    pub fn new(status: u16, status_text: impl Into<String>, body: ByteStream) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            body,
        }
    }

    /// `2xx`.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Reads the whole body into memory.
    pub async fn collect_body(self) -> Result<Vec<u8>> {
        self.body
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
    }
}

impl fmt::Debug for RawResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawResponse")
            .field("status", &self.status)
            .field("status_text", &self.status_text)
            .finish_non_exhaustive()
    }
}

/// Outbound HTTP call used by the session controller.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `request` to `http`, asking for a streamed body when `stream` is set.
    async fn call(
        &self,
        request: &ChatRequestOptions,
        http: &ChatHttpOptions,
        stream: bool,
    ) -> Result<RawResponse>;
}

/// JSON body sent to the backend.
#[derive(Debug, Serialize)]
pub struct ChatRequestBody<'a> {
    pub messages: Vec<&'a ChatMessage>,
    pub context: Map<String, Value>,
    pub stream: bool,
}

impl<'a> ChatRequestBody<'a> {
    pub fn new(request: &'a ChatRequestOptions, question: &'a ChatMessage, stream: bool) -> Self {
        let mut context = request.overrides.clone();
        context.insert("approach".into(), Value::String(request.approach.clone()));
        Self {
            messages: request.messages.iter().chain(Some(question)).collect(),
            context,
            stream,
        }
    }
}

/// [`HttpTransport`] on top of a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with JSON headers, a connect timeout and a per-read
    /// timeout of `timeout`.
    ///
    /// # Errors
    /// [`ChatError::Transport`] if the HTTP client cannot be built.
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .read_timeout(timeout)
            .default_headers(headers)
            .build()?;

        info!(timeout_secs = timeout.as_secs(), "ReqwestTransport initialized");
        Ok(Self { client })
    }

    pub fn from_config(cfg: &ChatConfig) -> Result<Self> {
        Self::new(cfg.timeout)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    #[instrument(skip_all, fields(kind = request.kind.as_str(), stream = stream))]
    async fn call(
        &self,
        request: &ChatRequestOptions,
        http: &ChatHttpOptions,
        stream: bool,
    ) -> Result<RawResponse> {
        let url = http.endpoint(request.kind);
        let question = ChatMessage::user(request.question.clone());
        let body = ChatRequestBody::new(request, &question, stream);

        debug!("{} {}", http.method, url);
        let resp = self
            .client
            .request(http.method.clone(), &url)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(ChatError::from))
            .boxed();

        Ok(RawResponse::new(status.as_u16(), status_text, body))
    }
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted in-memory transport.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use futures::channel::mpsc;
    use futures::stream;

    use super::*;

    pub(crate) enum Reply {
        Respond(RawResponse),
        Fail(ChatError),
        /// Never answers.
        Hang,
    }

    #[derive(Debug, Clone)]
    pub(crate) struct Call {
        pub request: ChatRequestOptions,
        pub http: ChatHttpOptions,
        pub stream: bool,
    }

    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        calls: Mutex<Vec<Call>>,
    }

    impl ScriptedTransport {
        pub fn new(replies: impl IntoIterator<Item = Reply>) -> Self {
            Self {
                replies: Mutex::new(replies.into_iter().collect()),
                calls: Mutex::default(),
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn call(
            &self,
            request: &ChatRequestOptions,
            http: &ChatHttpOptions,
            stream: bool,
        ) -> Result<RawResponse> {
            self.calls.lock().unwrap().push(Call {
                request: request.clone(),
                http: http.clone(),
                stream,
            });
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(Reply::Respond(resp)) => Ok(resp),
                Some(Reply::Fail(err)) => Err(err),
                Some(Reply::Hang) | None => futures::future::pending().await,
            }
        }
    }

    /// Response whose body is delivered in the given chunks.
    pub(crate) fn chunked(status: u16, status_text: &str, chunks: Vec<&str>) -> RawResponse {
        let chunks: Vec<Result<Vec<u8>>> =
            chunks.into_iter().map(|c| Ok(c.as_bytes().to_vec())).collect();
        RawResponse::new(status, status_text, stream::iter(chunks).boxed())
    }

    pub(crate) fn json(status: u16, status_text: &str, body: &str) -> RawResponse {
        chunked(status, status_text, vec![body])
    }

    /// Response whose body is fed by the returned sender.
    pub(crate) fn channel(status: u16) -> (mpsc::UnboundedSender<Result<Vec<u8>>>, RawResponse) {
        let (tx, rx) = mpsc::unbounded();
        (tx, RawResponse::new(status, "OK", rx.boxed()))
    }

    /// One NDJSON line carrying a content delta.
    pub(crate) fn delta(content: &str) -> String {
        format!(
            "{}\n",
            serde_json::json!({ "choices": [{ "delta": { "content": content } }] })
        )
    }
}
