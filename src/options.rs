use std::time::Duration;

use crate::retry::Backoff;

/// Configures the shared deadline and retry behavior of an [`Executor`](crate::Executor).
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExecutorOptions {
    /// Deadline for the whole operation in milliseconds, shared by all attempts.
    pub timeout_ms: u64,
    /// Retry budget. A failed attempt is retried while the number of failed
    /// attempts is below this value.
    pub max_retries: u32,
    /// Linear backoff step: the wait before attempt `n + 1` is `n * backoff_step_ms`.
    pub backoff_step_ms: u64,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_retries: 3,
            backoff_step_ms: 1_000,
        }
    }
}

impl ExecutorOptions {
    /// Reads overrides from the environment.
    ///
    /// Recognised variables:
    /// - `RESILIENT_FETCH_TIMEOUT_MS`
    /// - `RESILIENT_FETCH_MAX_RETRIES`
    /// - `RESILIENT_FETCH_BACKOFF_STEP_MS`
    ///
    /// Unset variables keep their defaults. A set but unparsable value is an error.
    pub fn from_env() -> std::result::Result<Self, String> {
        let mut opts = Self::default();
        if let Some(value) = read_env_number("RESILIENT_FETCH_TIMEOUT_MS")? {
            opts.timeout_ms = value;
        }
        if let Some(value) = read_env_number("RESILIENT_FETCH_MAX_RETRIES")? {
            opts.max_retries = u32::try_from(value)
                .map_err(|_| "RESILIENT_FETCH_MAX_RETRIES is out of range".to_owned())?;
        }
        if let Some(value) = read_env_number("RESILIENT_FETCH_BACKOFF_STEP_MS")? {
            opts.backoff_step_ms = value;
        }
        Ok(opts)
    }

    pub(crate) fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub(crate) fn backoff(&self) -> Backoff {
        Backoff::Linear {
            step: Duration::from_millis(self.backoff_step_ms),
        }
    }

    /// Total attempts allowed: the first one always runs.
    pub(crate) fn max_attempts(&self) -> u32 {
        self.max_retries.max(1)
    }
}

fn read_env_number(name: &str) -> std::result::Result<Option<u64>, String> {
    match std::env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Err(format!("{name} is set but empty")),
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|err| format!("{name} must be a non-negative integer: {err}")),
        Err(_) => Ok(None),
    }
}
