//! Ordered single-worker task queues.
//!
//! A [`SerialQueue`] owns one named worker thread and runs submitted jobs
//! strictly in submission order. Every [`FileCache`](crate::cache::FileCache)
//! owns its own queue, so unrelated caches never block each other.
//!
//! Code running on a queue's worker can find that queue again through
//! [`SerialQueue::current`]. The debouncer uses this to deliver a firing back
//! to the queue that triggered it.
//!
//! # Example
//!
//! ```
//! use stowaway::queue::{Executor, SerialQueue};
//! use std::sync::mpsc;
//!
//! let queue = SerialQueue::new("example").unwrap();
//! let (tx, rx) = mpsc::channel();
//! for i in 0..3 {
//!     let tx = tx.clone();
//!     queue.execute(Box::new(move || tx.send(i).unwrap()));
//! }
//! queue.barrier();
//! assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Weak};
use std::thread;

/// A unit of work submitted to an [`Executor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Something that can run jobs on some execution context.
///
/// Implemented by [`SerialQueue`] and by any `Fn(Job)` closure, which lets
/// callers hand jobs to their own event loop.
pub trait Executor: Send + Sync {
    /// Submit `job` for execution. Must not block on the job itself.
    fn execute(&self, job: Job);
}

impl<F> Executor for F
where
    F: Fn(Job) + Send + Sync,
{
    fn execute(&self, job: Job) {
        self(job)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Weak<QueueInner>>> = const { RefCell::new(None) };
}

struct QueueInner {
    label: String,
    sender: Sender<Job>,
}

/// A FIFO task queue backed by a dedicated worker thread.
///
/// Cloning is cheap and yields another handle to the same queue. When the
/// last handle is dropped the worker finishes the jobs already queued and
/// exits. A job that panics is logged and does not stop the worker.
#[derive(Clone)]
pub struct SerialQueue {
    inner: Arc<QueueInner>,
}

impl SerialQueue {
    /// Spawn a new queue whose worker thread is named `label`.
    ///
    /// NUL bytes are not allowed in thread names and are replaced with `_`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the worker thread cannot be spawned.
    pub fn new(label: impl Into<String>) -> io::Result<Self> {
        let label = label.into().replace('\0', "_");
        let (sender, receiver) = mpsc::channel::<Job>();
        let inner = Arc::new(QueueInner {
            label: label.clone(),
            sender,
        });
        let weak = Arc::downgrade(&inner);

        thread::Builder::new().name(label.clone()).spawn(move || {
            CURRENT.with(|current| *current.borrow_mut() = Some(weak));
            for job in receiver {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    log::error!("Job panicked on queue {}", label);
                }
            }
            log::trace!("Queue {} drained, worker exiting", label);
        })?;

        Ok(Self { inner })
    }

    /// The queue whose worker thread is running the calling code, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        CURRENT.with(|current| {
            current
                .borrow()
                .as_ref()
                .and_then(Weak::upgrade)
                .map(|inner| Self { inner })
        })
    }

    /// Whether the calling code is running on this queue's worker.
    #[must_use]
    pub fn is_current(&self) -> bool {
        CURRENT.with(|current| {
            current
                .borrow()
                .as_ref()
                .is_some_and(|weak| std::ptr::eq(weak.as_ptr(), Arc::as_ptr(&self.inner)))
        })
    }

    /// The worker thread name.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Block until every job submitted before this call has run.
    ///
    /// Returns immediately when called from the queue's own worker, since
    /// waiting there would deadlock.
    pub fn barrier(&self) {
        if self.is_current() {
            return;
        }
        let (done_tx, done_rx) = mpsc::sync_channel::<()>(1);
        self.execute(Box::new(move || {
            let _ = done_tx.send(());
        }));
        // A closed channel means the worker is gone; nothing is left to wait for.
        let _ = done_rx.recv();
    }
}

impl Executor for SerialQueue {
    fn execute(&self, job: Job) {
        if self.inner.sender.send(job).is_err() {
            log::error!("Queue {} worker is gone, job dropped", self.inner.label);
        }
    }
}

impl PartialEq for SerialQueue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for SerialQueue {}

impl fmt::Debug for SerialQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SerialQueue")
            .field("label", &self.inner.label)
            .finish()
    }
}
