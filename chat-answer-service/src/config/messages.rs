/// Generic text shown when the backend fails for any reason but a bad request.
pub const DEFAULT_API_ERROR_MESSAGE: &str =
    "Sorry, we are having some issues. Please try again later.";

/// Text shown when the backend rejects the question itself (HTTP 400).
pub const DEFAULT_INVALID_REQUEST_ERROR: &str =
    "Unable to generate advice for this query. Please rephrase your question and try again.";

/// User-facing texts for failed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessages {
    pub api_error: String,
    pub invalid_request: String,
}

impl Default for ChatMessages {
    fn default() -> Self {
        Self {
            api_error: DEFAULT_API_ERROR_MESSAGE.to_string(),
            invalid_request: DEFAULT_INVALID_REQUEST_ERROR.to_string(),
        }
    }
}
