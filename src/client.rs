use std::{
    sync::atomic::{AtomicBool, AtomicU32, Ordering},
    time::Instant,
};

use serde::de::DeserializeOwned;
use tokio::time::timeout;

use crate::{
    retry::{self, RetryError, RetryPolicy},
    ExecutorOptions, FetchError, RequestSpec, Result,
};

#[derive(Clone, Debug, Default)]
/// Runs HTTP requests under one shared deadline and a linear-backoff retry budget.
pub struct Executor {
    http: reqwest::Client,
    options: ExecutorOptions,
}

/// Bookkeeping owned by a single `execute` call.
#[derive(Debug)]
struct ExecutionState {
    attempt: AtomicU32,
    cancelled: AtomicBool,
    started: Instant,
}

impl ExecutionState {
    fn new() -> Self {
        Self {
            attempt: AtomicU32::new(0),
            cancelled: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    /// Records the start of `attempt`. Returns `false` once cancelled, in
    /// which case the attempt must not be sent.
    fn begin_attempt(&self, attempt: u32) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.attempt.store(attempt, Ordering::SeqCst);
        true
    }

    fn attempt(&self) -> u32 {
        self.attempt.load(Ordering::SeqCst)
    }

    /// Marks the invocation as cancelled. There is no way to clear the flag.
    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn timeout_error(&self, timeout_ms: u64) -> FetchError {
        FetchError::Timeout {
            timeout_ms,
            attempts: self.attempt(),
            elapsed_ms: u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }
    }
}

impl Executor {
    /// Creates an executor with a fresh `reqwest::Client` and default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an executor on top of a preconfigured client (proxies, TLS, pools).
    pub fn with_client(http: reqwest::Client) -> Self {
        Self {
            http,
            options: ExecutorOptions::default(),
        }
    }

    /// Applies deadline and retry options.
    pub fn with_options(mut self, opts: ExecutorOptions) -> Self {
        self.options = opts;
        self
    }

    /// Deadline and retry options in effect.
    pub fn options(&self) -> &ExecutorOptions {
        &self.options
    }

    /// Sends `spec` and decodes the JSON body of the first success response.
    ///
    /// The deadline is armed once for the whole call. When it fires, the
    /// in-flight attempt or pending backoff is dropped and the call resolves
    /// with [`FetchError::Timeout`]; a response arriving later cannot change
    /// that outcome.
    pub async fn execute<T: DeserializeOwned>(&self, spec: &RequestSpec) -> Result<T> {
        let template = spec.build(&self.http)?;
        let state = &ExecutionState::new();
        let timeout_ms = self.options.timeout_ms;
        let policy = RetryPolicy {
            max_attempts: self.options.max_attempts(),
            backoff: self.options.backoff(),
        };

        let attempts = retry::run(&policy, FetchError::is_retryable, |attempt| {
            let admitted = state.begin_attempt(attempt);

            #[cfg(feature = "tracing")]
            if attempt > 1 {
                tracing::warn!(
                    "retry {}/{} for {} {}",
                    attempt - 1,
                    self.options.max_retries,
                    spec.method(),
                    spec.url()
                );
            }

            let request = template.try_clone();
            async move {
                if !admitted {
                    return Err(state.timeout_error(timeout_ms));
                }
                let request = request.ok_or_else(|| {
                    FetchError::InvalidRequest("request body cannot be replayed".to_owned())
                })?;
                self.attempt_once::<T>(request).await
            }
        });

        match timeout(self.options.timeout(), attempts).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(RetryError::Aborted(err))) => Err(err),
            Ok(Err(RetryError::Exhausted { attempts, last })) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(attempts, url = spec.url(), "retries exhausted: {last}");

                Err(FetchError::RetriesExhausted {
                    attempts,
                    last: Box::new(last),
                })
            }
            Err(_elapsed) => {
                state.cancel();
                let err = state.timeout_error(timeout_ms);

                #[cfg(feature = "tracing")]
                tracing::warn!(url = spec.url(), "deadline exceeded, aborting request: {err}");

                Err(err)
            }
        }
    }

    async fn attempt_once<T: DeserializeOwned>(&self, request: reqwest::Request) -> Result<T> {
        let response = self
            .http
            .execute(request)
            .await
            .map_err(FetchError::Network)?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.bytes().await.map_err(FetchError::Network)?;
        serde_json::from_slice::<T>(&body).map_err(|err| {
            FetchError::Parse(format!(
                "invalid JSON response: {err}; body: {}",
                String::from_utf8_lossy(&body)
            ))
        })
    }
}

/// One-shot form of [`Executor::execute`] with explicit retry and deadline values.
///
/// # Example
///
/// ```no_run
/// use resilient_fetch::{fetch_with_retry, RequestSpec};
///
/// # async fn run() -> resilient_fetch::Result<()> {
/// let post = fetch_with_retry(&RequestSpec::get("https://example.com/posts/1"), 3, 5_000).await?;
/// println!("{post}");
/// # Ok(())
/// # }
/// ```
pub async fn fetch_with_retry(
    spec: &RequestSpec,
    max_retries: u32,
    timeout_ms: u64,
) -> Result<serde_json::Value> {
    Executor::new()
        .with_options(ExecutorOptions {
            timeout_ms,
            max_retries,
            ..ExecutorOptions::default()
        })
        .execute(spec)
        .await
}
