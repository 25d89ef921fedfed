//! Trailing-edge (or leading-edge) debouncing of a callback.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{task::JoinHandle, time::sleep};

type Callback<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Delays a callback until `delay` has passed without another [`call`](Self::call).
///
/// The timer runs as a task on the current tokio runtime, so the handle must
/// be created and called from inside one. Dropping the handle cancels any
/// pending call.
pub struct Debouncer<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

struct Shared<T> {
    callback: Callback<T>,
    delay: Duration,
    leading: bool,
    state: Mutex<DebounceState<T>>,
}

struct DebounceState<T> {
    timer: Option<JoinHandle<()>>,
    pending: Option<T>,
    // Bumped on every reschedule so a timer that already woke up can tell it was superseded.
    generation: u64,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Trailing-edge debouncer: the last call of a burst runs once the burst goes quiet.
    pub fn new<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(delay, false, callback)
    }

    /// Leading-edge debouncer: the first call of a burst runs immediately and
    /// the rest of the burst is swallowed.
    pub fn leading<F>(delay: Duration, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(delay, true, callback)
    }

    fn build<F>(delay: Duration, leading: bool, callback: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self {
            shared: Arc::new(Shared {
                callback: Arc::new(callback),
                delay,
                leading,
                state: Mutex::new(DebounceState {
                    timer: None,
                    pending: None,
                    generation: 0,
                }),
            }),
        }
    }

    /// Records `arg` as the latest call and restarts the quiet period. In
    /// leading mode the first call of a burst runs at once.
    pub fn call(&self, arg: T) {
        let mut state = self.shared.lock();
        let call_now = self.shared.leading && state.timer.is_none();

        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.generation = state.generation.wrapping_add(1);

        let immediate = if self.shared.leading {
            state.pending = None;
            call_now.then_some(arg)
        } else {
            state.pending = Some(arg);
            None
        };

        state.timer = Some(Self::spawn_timer(&self.shared, state.generation));
        drop(state);

        if let Some(arg) = immediate {
            (self.shared.callback)(arg);
        }
    }

    /// Drops the pending call, if any, without running it.
    pub fn cancel(&self) {
        let mut state = self.shared.lock();
        if let Some(timer) = state.timer.take() {
            timer.abort();
        }
        state.pending = None;
        state.generation = state.generation.wrapping_add(1);
    }

    /// Runs the pending trailing call right away. Returns `true` if the callback ran.
    pub fn flush(&self) -> bool {
        let pending = {
            let mut state = self.shared.lock();
            let Some(timer) = state.timer.take() else {
                return false;
            };
            timer.abort();
            state.generation = state.generation.wrapping_add(1);
            state.pending.take()
        };

        match pending {
            Some(arg) => {
                (self.shared.callback)(arg);
                true
            }
            None => false,
        }
    }

    /// Whether a quiet-period timer is currently armed.
    pub fn is_pending(&self) -> bool {
        self.shared.lock().timer.is_some()
    }

    fn spawn_timer(shared: &Arc<Shared<T>>, generation: u64) -> JoinHandle<()> {
        let shared = Arc::clone(shared);
        tokio::spawn(async move {
            sleep(shared.delay).await;
            let pending = {
                let mut state = shared.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
                state.pending.take()
            };
            if let Some(arg) = pending {
                (shared.callback)(arg);
            }
        })
    }
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, DebounceState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}
