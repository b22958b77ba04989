//! Reader-writer guarded value container.
//!
//! [`SyncValue`] owns a single value and hands out access only inside a
//! closure. Reads share the lock, writes take it exclusively. Both go through
//! the same [`RwLock`], so a write can never interleave with a read that
//! started just after it.
//!
//! # Example
//!
//! ```
//! use stowaway::sync_value::SyncValue;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let counter = Arc::new(SyncValue::new(0u32));
//! let handles: Vec<_> = (0..4)
//!     .map(|_| {
//!         let counter = Arc::clone(&counter);
//!         thread::spawn(move || counter.modify(|n| *n += 1))
//!     })
//!     .collect();
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! assert_eq!(counter.read(), 4);
//! ```

use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A value shared across threads with concurrent reads and exclusive writes.
pub struct SyncValue<V> {
    lock: RwLock<V>,
}

impl<V> SyncValue<V> {
    /// Wrap `value`.
    pub fn new(value: V) -> Self {
        Self {
            lock: RwLock::new(value),
        }
    }

    /// Run `f` with shared access to the value.
    ///
    /// Any number of `with`/`read` calls may run at the same time; they only
    /// wait while a [`modify`](Self::modify) is in progress.
    pub fn with<T>(&self, f: impl FnOnce(&V) -> T) -> T {
        f(&self.read_guard("with"))
    }

    /// Run `transform` with exclusive access and return its result.
    ///
    /// All readers and writers are excluded until `transform` returns, so keep
    /// it short. A fallible transform can return `Result<_, E>`; the error is
    /// passed through unchanged and whatever mutation already happened stays.
    pub fn modify<T>(&self, transform: impl FnOnce(&mut V) -> T) -> T {
        transform(&mut self.write_guard("modify"))
    }

    /// Swap in a new value and return the previous one.
    pub fn replace(&self, value: V) -> V {
        self.modify(|current| std::mem::replace(current, value))
    }

    /// Consume the container and return the value.
    pub fn into_inner(self) -> V {
        match self.lock.into_inner() {
            Ok(value) => value,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_guard(&self, op: &'static str) -> RwLockReadGuard<'_, V> {
        match self.lock.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    "SyncValue::{}: recovered from poisoned lock, value may be stale after a panic in another thread",
                    op
                );
                poisoned.into_inner()
            }
        }
    }

    fn write_guard(&self, op: &'static str) -> RwLockWriteGuard<'_, V> {
        match self.lock.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    "SyncValue::{}: recovered from poisoned lock, value may be stale after a panic in another thread",
                    op
                );
                poisoned.into_inner()
            }
        }
    }
}

impl<V: Clone> SyncValue<V> {
    /// Return a snapshot of the current value.
    #[must_use]
    pub fn read(&self) -> V {
        self.read_guard("read").clone()
    }
}

impl<V: Default> Default for SyncValue<V> {
    fn default() -> Self {
        Self::new(V::default())
    }
}

impl<V> From<V> for SyncValue<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}

impl<V: fmt::Debug> fmt::Debug for SyncValue<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.read_guard("fmt");
        f.debug_struct("SyncValue").field("value", &*guard).finish()
    }
}
