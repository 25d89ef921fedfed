/// Error type returned by [`Executor`](crate::Executor) and [`fetch_with_retry`](crate::fetch_with_retry).
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Network or request execution error from `reqwest`.
    #[error("network error: {0}")]
    Network(reqwest::Error),
    /// Non-success HTTP status code with raw response body.
    #[error("http error {status}: {body}")]
    HttpStatus { status: u16, body: String },
    /// The shared deadline elapsed before any attempt succeeded.
    #[error("request timed out after {timeout_ms} ms ({attempts} attempt(s) started)")]
    Timeout {
        /// Deadline that was armed for the whole operation.
        timeout_ms: u64,
        /// Number of attempts started before the deadline fired.
        attempts: u32,
        /// Wall time between the start of the call and cancellation.
        elapsed_ms: u64,
    },
    /// Every allowed attempt failed with a retryable error.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted {
        attempts: u32,
        /// The error observed on the final attempt.
        last: Box<FetchError>,
    },
    /// A success response carried a body that is not valid JSON for the target type.
    #[error("parse error: {0}")]
    Parse(String),
    /// The request could not be built (bad URL, header name or value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    /// Returns `true` for errors that drive another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::HttpStatus { .. })
    }

    /// Returns `true` if the operation ended because the deadline fired.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// HTTP status of this error, looking through `RetriesExhausted`.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            Self::RetriesExhausted { last, .. } => last.status(),
            _ => None,
        }
    }
}
