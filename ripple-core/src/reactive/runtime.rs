//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects tracked values,
//! computed values and effects. It owns the dependency graph and the update
//! scheduler.
//!
//! # How It Works
//!
//! 1. When a tracked value is read while a subscriber is running, the runtime
//!    links that subscriber into the dependency set for (target, key).
//!
//! 2. When the value is written, the runtime walks the dependency set in
//!    subscription order and, for each subscriber not currently running,
//!    either hands its job to its scheduler or re-runs it directly.
//!
//! 3. After every run, links from the previous run that were not touched
//!    again are removed, and empty dependency sets are dropped.
//!
//! # Ownership
//!
//! A `Runtime` is an explicit context object: nothing is global, and several
//! runtimes can coexist (tests create one each). Handles created from a
//! runtime hold it weakly; once the last `Runtime` clone is dropped they keep
//! working as plain, untracked values.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::arena::Arena;
use super::context::ReactiveContext;
use super::dep::{DepKey, DepStore, TargetId};
use super::object::ReactiveInner;
use super::subscriber::{Job, SchedulerFn, SubscriberId, SubscriberSlot};
use crate::scheduler::{Executor, JobQueue, TaskQueue};

pub(crate) struct RuntimeInner {
    pub(crate) subscribers: RefCell<Arena<SubscriberSlot>>,
    pub(crate) deps: RefCell<DepStore>,
    pub(crate) stack: RefCell<Vec<Option<SubscriberId>>>,
    pub(crate) wrappers: RefCell<HashMap<TargetId, Weak<ReactiveInner>>>,
    pub(crate) scheduler: JobQueue,
}

/// Handle to one reactive system.
///
/// Cloning is cheap and yields the same system.
#[derive(Clone)]
pub struct Runtime {
    pub(crate) inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Create a runtime whose deferred flushes run on an in-process
    /// [`TaskQueue`], drained by [`Runtime::tick`].
    pub fn new() -> Self {
        Self::with_executor(Rc::new(TaskQueue::new()))
    }

    /// Create a runtime whose deferred flushes are handed to `executor`.
    ///
    /// With [`TokioExecutor`](crate::scheduler::TokioExecutor), every write
    /// that queues a job must happen inside a tokio `LocalSet`; queueing
    /// outside one panics in `spawn_local`.
    pub fn with_executor(executor: Rc<dyn Executor>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner {
                subscribers: RefCell::new(Arena::new()),
                deps: RefCell::new(DepStore::new()),
                stack: RefCell::new(Vec::new()),
                wrappers: RefCell::new(HashMap::new()),
                scheduler: JobQueue::new(executor),
            }),
        }
    }

    pub(crate) fn downgrade(&self) -> Weak<RuntimeInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn upgrade(weak: &Weak<RuntimeInner>) -> Option<Runtime> {
        weak.upgrade().map(|inner| Runtime { inner })
    }

    /// Get the current subscriber, if any.
    pub fn current_subscriber(&self) -> Option<SubscriberId> {
        self.inner.current_subscriber()
    }

    /// Check if reads would currently be tracked.
    pub fn is_tracking(&self) -> bool {
        self.current_subscriber().is_some()
    }

    /// Run `f` with tracking paused.
    pub fn untrack<R>(&self, f: impl FnOnce() -> R) -> R {
        let _ctx = ReactiveContext::enter(&self.inner, None);
        f()
    }

    /// Link the running subscriber, if any, to (target, key).
    pub fn track(&self, target: TargetId, key: &DepKey) {
        self.inner.track(target, key);
    }

    /// Notify every subscriber of (target, key).
    pub fn trigger(&self, target: TargetId, key: &DepKey) {
        self.inner.trigger(target, key);
    }

    /// Register a subscriber. It does not run until asked to.
    pub(crate) fn register(
        &self,
        name: &'static str,
        body: Rc<dyn Fn()>,
        scheduler: Option<SchedulerFn>,
    ) -> SubscriberId {
        let id = SubscriberId(
            self.inner
                .subscribers
                .borrow_mut()
                .insert(SubscriberSlot::new(name, body.clone(), scheduler)),
        );

        // The job keeps the body, so a job captured before `stop` still runs
        // once (untracked).
        let weak = self.downgrade();
        let job = Job::for_subscriber(
            id,
            Rc::new(move || match Runtime::upgrade(&weak) {
                Some(rt) => rt.with_subscriber(id, || body()),
                None => body(),
            }),
        );

        if let Some(slot) = self.inner.subscribers.borrow_mut().get_mut(id.0) {
            slot.job = Some(job);
        }

        tracing::trace!(?id, name, "subscriber registered");
        id
    }

    /// Perform one tracked run of subscriber `id` around `f`.
    ///
    /// A stopped (or unknown) subscriber runs `f` without any tracking of its
    /// own.
    pub(crate) fn with_subscriber<R>(&self, id: SubscriberId, f: impl FnOnce() -> R) -> R {
        let started = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            match subscribers.get_mut(id.0) {
                Some(slot) => {
                    slot.track_id += 1;
                    slot.deps_len = 0;
                    slot.running += 1;
                    tracing::trace!(?id, name = slot.name, run = slot.track_id, "run");
                    true
                }
                None => false,
            }
        };

        if !started {
            return self.untrack(f);
        }

        let _ctx = ReactiveContext::enter(&self.inner, Some(id));
        f()
    }

    /// Run a subscriber through its type-erased body.
    pub(crate) fn run_erased(&self, id: SubscriberId) {
        let body = match self.inner.subscribers.borrow().get(id.0) {
            Some(slot) => slot.body.clone(),
            None => return,
        };
        self.with_subscriber(id, || body());
    }

    /// Stop a subscriber permanently and unlink all of its dependencies.
    ///
    /// Returns `false` if it was already stopped.
    pub(crate) fn stop(&self, id: SubscriberId) -> bool {
        let removed = self.inner.subscribers.borrow_mut().remove(id.0);
        let Some(slot) = removed else {
            return false;
        };

        {
            let mut deps = self.inner.deps.borrow_mut();
            for dep in &slot.deps {
                deps.unlink(*dep, id, None);
            }
        }

        tracing::trace!(?id, name = slot.name, "subscriber stopped");

        // Closures may hold handles whose Drop calls back into the runtime.
        drop(slot);
        true
    }

    pub(crate) fn is_active(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.borrow().contains(id.0)
    }

    pub(crate) fn job_of(&self, id: SubscriberId) -> Option<Job> {
        self.inner
            .subscribers
            .borrow()
            .get(id.0)
            .and_then(|slot| slot.job.clone())
    }

    /// Number of dependency sets `id` is currently linked to.
    pub fn dependency_count(&self, id: SubscriberId) -> usize {
        self.inner
            .subscribers
            .borrow()
            .get(id.0)
            .map(|slot| slot.deps.len())
            .unwrap_or(0)
    }

    /// Number of live dependency sets in the store.
    pub fn dependency_set_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Number of live (not stopped) subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Subscribers linked to (target, key), in notification order.
    pub fn subscribers_of(&self, target: TargetId, key: &DepKey) -> Vec<SubscriberId> {
        self.inner.deps.borrow().subscribers_of(target, key)
    }

    /// Tear the graph down: every subscriber is stopped, every dependency set
    /// and cached wrapper released. Handles stay usable, untracked.
    pub fn dispose(&self) {
        let subscribers = self.inner.subscribers.borrow_mut().take_all();
        self.inner.deps.borrow_mut().clear();
        self.inner.wrappers.borrow_mut().clear();
        self.inner.scheduler.clear();
        drop(subscribers);
    }
}

impl RuntimeInner {
    fn current_subscriber(&self) -> Option<SubscriberId> {
        self.stack.borrow().last().copied().flatten()
    }

    fn track(&self, target: TargetId, key: &DepKey) {
        let Some(subscriber) = self.current_subscriber() else {
            return;
        };

        let mut subscribers = self.subscribers.borrow_mut();
        let Some(slot) = subscribers.get_mut(subscriber.0) else {
            return;
        };

        let mut deps = self.deps.borrow_mut();
        let dep = deps.get_or_create(target, key);
        let Some(set) = deps.get_mut(dep) else {
            return;
        };

        // Already linked during this run.
        if set.subscribers.get(&subscriber) == Some(&slot.track_id) {
            return;
        }
        set.subscribers.insert(subscriber, slot.track_id);

        // Reuse the previous run's list position by position.
        let position = slot.deps_len;
        match slot.deps.get(position).copied() {
            Some(previous) if previous == dep => {}
            Some(previous) => {
                deps.unlink(previous, subscriber, Some(slot.track_id));
                slot.deps[position] = dep;
            }
            None => slot.deps.push(dep),
        }
        slot.deps_len += 1;

        tracing::trace!(?subscriber, ?target, ?key, "track");
    }

    fn trigger(&self, target: TargetId, key: &DepKey) {
        let pending: SmallVec<[SubscriberId; 8]> = {
            let deps = self.deps.borrow();
            match deps.find(target, key).and_then(|id| deps.get(id)) {
                Some(set) => set.subscribers.keys().copied().collect(),
                None => return,
            }
        };

        tracing::trace!(?target, ?key, subscribers = pending.len(), "trigger");

        for id in pending {
            let action = {
                let subscribers = self.subscribers.borrow();
                match subscribers.get(id.0) {
                    Some(slot) if slot.running == 0 => {
                        slot.job.clone().map(|job| (slot.scheduler.clone(), job))
                    }
                    _ => None,
                }
            };

            match action {
                Some((Some(scheduler), job)) => scheduler(&job),
                Some((None, job)) => job.run(),
                None => {}
            }
        }
    }

    /// Called when a subscriber frame is popped.
    pub(crate) fn finish_run(&self, id: SubscriberId) {
        let mut subscribers = self.subscribers.borrow_mut();
        let Some(slot) = subscribers.get_mut(id.0) else {
            return;
        };

        slot.running = slot.running.saturating_sub(1);

        if slot.deps.len() > slot.deps_len {
            let track_id = slot.track_id;
            let stale: SmallVec<[_; 8]> = slot.deps.drain(slot.deps_len..).collect();
            let mut deps = self.deps.borrow_mut();
            for dep in stale {
                deps.unlink(dep, id, Some(track_id));
            }
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("subscribers", &self.subscriber_count())
            .field("dependency_sets", &self.dependency_set_count())
            .field("pending_jobs", &self.inner.scheduler.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn runtimes_are_independent() {
        let a = Runtime::new();
        let b = Runtime::new();

        let target = TargetId::new();
        let effect = a.effect(
            {
                let a = a.clone();
                move || a.track(target, &DepKey::Value)
            },
            Default::default(),
        );

        assert_eq!(a.subscribers_of(target, &DepKey::Value), vec![effect.id()]);
        assert!(b.subscribers_of(target, &DepKey::Value).is_empty());
        assert_eq!(b.dependency_set_count(), 0);
    }

    #[test]
    fn track_outside_subscriber_is_noop() {
        let rt = Runtime::new();
        rt.track(TargetId::new(), &DepKey::Value);
        assert_eq!(rt.dependency_set_count(), 0);
    }

    #[test]
    fn trigger_calls_scheduler_instead_of_body() {
        let rt = Runtime::new();
        let target = TargetId::new();
        let runs = Rc::new(Cell::new(0));
        let scheduled = Rc::new(Cell::new(0));

        let _effect = rt.effect(
            {
                let rt = rt.clone();
                let runs = runs.clone();
                move || {
                    runs.set(runs.get() + 1);
                    rt.track(target, &DepKey::Value);
                }
            },
            crate::reactive::EffectOptions::default().scheduler({
                let scheduled = scheduled.clone();
                move |_job: &Job| scheduled.set(scheduled.get() + 1)
            }),
        );

        rt.trigger(target, &DepKey::Value);
        rt.trigger(target, &DepKey::Value);

        assert_eq!(runs.get(), 1);
        assert_eq!(scheduled.get(), 2);
    }

    #[test]
    fn dispose_releases_graph() {
        let rt = Runtime::new();
        let target = TargetId::new();
        let _effect = rt.effect(
            {
                let rt = rt.clone();
                move || rt.track(target, &DepKey::Value)
            },
            Default::default(),
        );

        assert_eq!(rt.subscriber_count(), 1);
        assert_eq!(rt.dependency_set_count(), 1);

        rt.dispose();
        assert_eq!(rt.subscriber_count(), 0);
        assert_eq!(rt.dependency_set_count(), 0);
    }
}
