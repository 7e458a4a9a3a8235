//! Update Scheduler
//!
//! Batches re-runs so that a burst of synchronous writes resolves into one
//! execution per affected job.
//!
//! # Algorithm
//!
//! 1. `queue(job)` inserts the job into the pending batch, keyed by its
//!    identity. A job already pending is not added twice.
//! 2. The first job of a batch requests one deferred flush from the
//!    [`Executor`]. No second flush is requested while one is pending.
//! 3. The flush takes the batch and clears the live one before running
//!    anything, so jobs queued during the flush form the next batch.
//! 4. The snapshot runs in first-queued order.

mod executor;

pub use executor::{Executor, Task, TaskQueue, TokioExecutor};

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use crate::reactive::{Job, JobId, Runtime};

struct QueueState {
    pending: RefCell<IndexMap<JobId, Job>>,
    flush_requested: Cell<bool>,
    flushes: Cell<u64>,
}

/// Deduplicating job queue with a single deferred flush per batch.
#[derive(Clone)]
pub struct JobQueue {
    state: Rc<QueueState>,
    executor: Rc<dyn Executor>,
}

impl JobQueue {
    pub fn new(executor: Rc<dyn Executor>) -> Self {
        Self {
            state: Rc::new(QueueState {
                pending: RefCell::new(IndexMap::new()),
                flush_requested: Cell::new(false),
                flushes: Cell::new(0),
            }),
            executor,
        }
    }

    /// Add `job` to the pending batch unless it is already there.
    pub fn queue(&self, job: Job) {
        let id = job.id();
        {
            let mut pending = self.state.pending.borrow_mut();
            if pending.contains_key(&id) {
                tracing::trace!(?id, "job already queued");
                return;
            }
            pending.insert(id, job);
        }

        if !self.state.flush_requested.replace(true) {
            let state = Rc::downgrade(&self.state);
            self.executor.defer(Box::new(move || flush(&state)));
        }
    }

    /// Number of jobs waiting for the next flush.
    pub fn len(&self) -> usize {
        self.state.pending.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of flushes that have run.
    pub fn flush_count(&self) -> u64 {
        self.state.flushes.get()
    }

    /// Drop every pending job. An already requested flush finds nothing.
    pub fn clear(&self) {
        self.state.pending.borrow_mut().clear();
    }

    pub(crate) fn executor(&self) -> &Rc<dyn Executor> {
        &self.executor
    }
}

fn flush(state: &Weak<QueueState>) {
    let Some(state) = state.upgrade() else {
        return;
    };

    state.flush_requested.set(false);
    let batch = std::mem::take(&mut *state.pending.borrow_mut());
    let flush = state.flushes.get() + 1;
    state.flushes.set(flush);

    tracing::debug!(flush, jobs = batch.len(), "flushing job queue");

    for job in batch.into_values() {
        job.run();
    }
}

impl fmt::Debug for JobQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobQueue")
            .field("pending", &self.len())
            .field("flush_requested", &self.state.flush_requested.get())
            .field("flushes", &self.flush_count())
            .finish()
    }
}

impl Runtime {
    /// Queue `job` for the next flush. See [`JobQueue::queue`].
    pub fn queue_job(&self, job: Job) {
        self.inner.scheduler.queue(job);
    }

    /// Drive the runtime's own executor one turn. Returns how many deferred
    /// tasks ran (0 for executors driven by an external event loop).
    pub fn tick(&self) -> usize {
        // The executor may re-enter the runtime while running tasks.
        let executor = self.inner.scheduler.executor().clone();
        executor.run_pending()
    }

    /// Number of jobs waiting for the next flush.
    pub fn pending_jobs(&self) -> usize {
        self.inner.scheduler.len()
    }

    /// Number of flushes run so far.
    pub fn flush_count(&self) -> u64 {
        self.inner.scheduler.flush_count()
    }
}
