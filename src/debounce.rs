//! Trigger coalescing.
//!
//! A [`Debouncer`] turns a burst of [`trigger`](Debouncer::trigger) calls into
//! a single callback invocation, fired `delay` after the last call of the
//! burst.
//!
//! # Firing context
//!
//! The callback runs on one of, in priority order:
//!
//! 1. the executor set with [`Debouncer::with_executor`] or
//!    [`Debouncer::set_executor`];
//! 2. the [`SerialQueue`] that issued the `trigger()`, when it was called from
//!    a queue's worker;
//! 3. the debouncer's own timer thread.
//!
//! # Example
//!
//! ```
//! use stowaway::debounce::Debouncer;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let fired = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&fired);
//! let debouncer = Debouncer::new(Duration::from_millis(20))
//!     .with_callback(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     });
//!
//! for _ in 0..5 {
//!     debouncer.trigger();
//! }
//! std::thread::sleep(Duration::from_millis(200));
//! assert_eq!(fired.load(Ordering::SeqCst), 1);
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::config::CacheSettings;
use crate::queue::{Executor, SerialQueue};
use crate::sync_value::SyncValue;

/// Callback invoked when a debounced burst settles.
pub type Callback = Arc<dyn Fn() + Send + Sync + 'static>;

/// A scheduled firing. Exactly one can exist per debouncer.
struct Pending {
    deadline: Instant,
    generation: u64,
    target: Option<Arc<dyn Executor>>,
}

#[derive(Default)]
struct TimerState {
    pending: Option<Pending>,
    /// Bumped on every trigger and cancel; a firing carrying an older value is stale.
    generation: u64,
    worker_started: bool,
    shutdown: bool,
}

struct Shared {
    delay: Duration,
    state: Mutex<TimerState>,
    wake: Condvar,
    callback: SyncValue<Option<Callback>>,
    executor: SyncValue<Option<Arc<dyn Executor>>>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            log::warn!("Debouncer recovered from poisoned timer lock");
            poisoned.into_inner()
        })
    }

    fn is_current(&self, generation: u64) -> bool {
        let state = self.lock_state();
        !state.shutdown && state.generation == generation
    }

    fn run_callback(&self, generation: u64) {
        // A trigger or cancel after this firing was taken supersedes it.
        if !self.is_current(generation) {
            log::trace!("Dropping superseded debounce firing {}", generation);
            return;
        }
        let Some(callback) = self.callback.read() else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| callback())).is_err() {
            log::error!("Debounce callback panicked");
        }
    }
}

/// Coalesces rapid repeated triggers into one delayed callback.
///
/// Dropping the debouncer discards any pending firing.
pub struct Debouncer {
    shared: Arc<Shared>,
}

impl Debouncer {
    /// Create a debouncer with a fixed `delay` and no callback.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                delay,
                state: Mutex::new(TimerState::default()),
                wake: Condvar::new(),
                callback: SyncValue::new(None),
                executor: SyncValue::new(None),
            }),
        }
    }

    /// Create a debouncer using the configured `debounce_ms` delay.
    #[must_use]
    pub fn from_settings(settings: &CacheSettings) -> Self {
        Self::new(settings.debounce_delay())
    }

    /// Set the callback.
    #[must_use]
    pub fn with_callback(self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.set_callback(callback);
        self
    }

    /// Set the executor the callback is delivered to.
    #[must_use]
    pub fn with_executor(self, executor: Arc<dyn Executor>) -> Self {
        self.set_executor(Some(executor));
        self
    }

    /// Replace the callback. Takes effect for the next firing, including one
    /// that is already pending.
    pub fn set_callback(&self, callback: impl Fn() + Send + Sync + 'static) {
        self.shared.callback.replace(Some(Arc::new(callback)));
    }

    /// Remove the callback. A pending firing will do nothing.
    pub fn clear_callback(&self) {
        self.shared.callback.replace(None);
    }

    /// Replace the executor used for firings scheduled from now on.
    pub fn set_executor(&self, executor: Option<Arc<dyn Executor>>) {
        self.shared.executor.replace(executor);
    }

    /// The configured delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.shared.delay
    }

    /// Whether a firing is scheduled and has not been taken by the timer yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.shared.lock_state().pending.is_some()
    }

    /// Schedule the callback `delay` from now, cancelling any pending firing.
    ///
    /// Does nothing beyond the cancellation when no callback is set.
    pub fn trigger(&self) {
        let mut state = self.shared.lock_state();

        // Invalidate first so an in-flight firing sees it is stale, then clear.
        state.generation = state.generation.wrapping_add(1);
        state.pending = None;

        if self.shared.callback.with(Option::is_none) {
            self.shared.wake.notify_all();
            return;
        }

        if !state.worker_started {
            if let Err(e) = self.spawn_timer() {
                log::error!("Failed to start debounce timer thread: {}", e);
                return;
            }
            state.worker_started = true;
        }

        let target = self.shared.executor.read().or_else(|| {
            SerialQueue::current().map(|queue| Arc::new(queue) as Arc<dyn Executor>)
        });

        state.pending = Some(Pending {
            deadline: Instant::now() + self.shared.delay,
            generation: state.generation,
            target,
        });
        self.shared.wake.notify_all();
    }

    /// Drop the pending firing, if any.
    pub fn cancel(&self) {
        let mut state = self.shared.lock_state();
        state.generation = state.generation.wrapping_add(1);
        state.pending = None;
        self.shared.wake.notify_all();
    }

    fn spawn_timer(&self) -> std::io::Result<()> {
        let shared = Arc::clone(&self.shared);
        thread::Builder::new()
            .name("stowaway.debounce".to_string())
            .spawn(move || run_timer(&shared))
            .map(|_| ())
    }
}

fn run_timer(shared: &Arc<Shared>) {
    loop {
        let mut state = shared.lock_state();
        let due = loop {
            if state.shutdown {
                return;
            }
            match state.pending.as_ref().map(|pending| pending.deadline) {
                None => {
                    state = shared
                        .wake
                        .wait(state)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        break state.pending.take();
                    }
                    state = shared
                        .wake
                        .wait_timeout(state, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0;
                }
            }
        };
        drop(state);

        let Some(pending) = due else {
            continue;
        };
        log::trace!("Debounce firing {} is due", pending.generation);
        let generation = pending.generation;
        match pending.target {
            Some(executor) => {
                let shared = Arc::clone(shared);
                executor.execute(Box::new(move || shared.run_callback(generation)));
            }
            None => shared.run_callback(generation),
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let mut state = self.shared.lock_state();
        state.shutdown = true;
        state.pending = None;
        self.shared.wake.notify_all();
    }
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("delay", &self.shared.delay)
            .field("pending", &self.is_pending())
            .field(
                "callback",
                &self.shared.callback.with(|c| c.as_ref().map(|_| "<callback>")),
            )
            .finish()
    }
}
