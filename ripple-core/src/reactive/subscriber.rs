//! Subscriber types for the reactive system.
//!
//! A Subscriber represents any computation that depends on reactive values.
//! This includes effects, computed values, watchers and component render jobs.
//! The runtime owns subscriber state in an arena; handles refer to it by
//! [`SubscriberId`].

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use super::arena::Index;
use super::dep::DepId;

/// Unique identifier for a subscriber inside one runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(pub(crate) Index);

/// Identity of a [`Job`]. The scheduler deduplicates on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobId {
    /// The re-run job of a subscriber.
    Subscriber(SubscriberId),
    /// A free-standing job created with [`Job::new`].
    Detached(u64),
}

/// A unit of deferred work with a stable identity.
///
/// Cloning a job keeps its identity, so scheduling two clones of the same job
/// before a flush still runs it once.
#[derive(Clone)]
pub struct Job {
    id: JobId,
    run: Rc<dyn Fn()>,
}

impl Job {
    /// Create a job with a fresh identity.
    pub fn new<F>(run: F) -> Self
    where
        F: Fn() + 'static,
    {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self {
            id: JobId::Detached(COUNTER.fetch_add(1, Ordering::Relaxed)),
            run: Rc::new(run),
        }
    }

    pub(crate) fn for_subscriber(id: SubscriberId, run: Rc<dyn Fn()>) -> Self {
        Self {
            id: JobId::Subscriber(id),
            run,
        }
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    /// Execute the job now.
    pub fn run(&self) {
        (self.run)();
    }
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job").field("id", &self.id).finish()
    }
}

/// Re-run policy handed the subscriber's job on every trigger.
pub type SchedulerFn = Rc<dyn Fn(&Job)>;

/// Runtime-side state of a subscriber.
pub(crate) struct SubscriberSlot {
    /// Type-erased body. Running it performs one tracked run.
    pub body: Rc<dyn Fn()>,

    /// When present, invoked on trigger instead of re-running the body.
    pub scheduler: Option<SchedulerFn>,

    /// Re-runs this subscriber. Identity is the subscriber id.
    pub job: Option<Job>,

    /// Incremented at the start of every tracked run.
    pub track_id: u64,

    /// Dependency sets linked by the current or previous run, in read order.
    pub deps: Vec<DepId>,

    /// How many entries of `deps` were confirmed by the current run.
    pub deps_len: usize,

    /// Re-entrancy depth. Nonzero while the body is on the stack.
    pub running: u32,

    /// Label used in trace output.
    pub name: &'static str,
}

impl SubscriberSlot {
    pub fn new(name: &'static str, body: Rc<dyn Fn()>, scheduler: Option<SchedulerFn>) -> Self {
        Self {
            body,
            scheduler,
            job: None,
            track_id: 0,
            deps: Vec::new(),
            deps_len: 0,
            running: 0,
            name,
        }
    }
}
