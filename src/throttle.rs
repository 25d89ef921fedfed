//! Rate limiting of a callback to one invocation per interval.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    task::JoinHandle,
    time::{sleep, Instant},
};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Runs a callback at most once per `interval`.
///
/// A call outside the current window runs immediately. Calls inside the
/// window arm a single trailing invocation that runs with the most recent
/// argument once the window closes. Must be used from inside a tokio runtime.
pub struct Throttler<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    callback: Callback<T>,
    interval: Duration,
    state: Mutex<ThrottleState<T>>,
}

struct ThrottleState<T> {
    last_call: Option<Instant>,
    timer: Option<JoinHandle<()>>,
    pending: Option<T>,
    generation: u64,
}

impl<T: Send + 'static> Throttler<T> {
    /// Runs `callback` at most once per `interval`.
    pub fn new<F>(interval: Duration, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                callback: Arc::new(callback),
                interval,
                state: Mutex::new(ThrottleState {
                    last_call: None,
                    timer: None,
                    pending: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Runs now if the window is open, otherwise schedules one trailing call with the latest `arg`.
    pub fn call(&self, arg: T) {
        let now = Instant::now();
        let mut state = self.shared.lock();
        let since_last = state.last_call.map(|last| now.saturating_duration_since(last));
        let window_open = since_last.map_or(true, |elapsed| elapsed >= self.shared.interval);

        if window_open && state.timer.is_none() {
            state.last_call = Some(now);
            drop(state);
            (self.shared.callback)(arg);
            return;
        }

        state.pending = Some(arg);
        if state.timer.is_none() {
            let wait = self
                .shared
                .interval
                .saturating_sub(since_last.unwrap_or_default());
            state.timer = Some(Self::spawn_trailing(
                &self.shared,
                wait,
                state.generation,
            ));
        }
    }

    /// Drops the pending trailing call, if any.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending = None;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Whether a trailing invocation is armed.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().timer.is_some()
    }

    fn spawn_trailing(shared: &Arc<Shared<T>>, wait: Duration, generation: u64) -> JoinHandle<()> {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            sleep(wait).await;
            let pending = {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
                state.last_call = Some(Instant::now());
                state.pending.take()
            };
            if let Some(arg) = pending {
                (shared.callback)(arg);
            }
        })
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, ThrottleState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> Drop for Throttler<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
