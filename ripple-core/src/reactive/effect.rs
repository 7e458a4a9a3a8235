//! Effect Implementation
//!
//! An Effect is a side-effecting computation that re-runs whenever the state
//! it read last time changes.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies (unless created lazily).
//!
//! 2. When any dependency changes, the effect either re-runs synchronously or,
//!    if it was given a scheduler, hands its [`Job`] to that scheduler.
//!
//! 3. Each run re-collects dependencies. Links that the new run did not touch
//!    are removed when it finishes.
//!
//! # Stopping
//!
//! [`Effect::stop`] is permanent: the effect is unlinked from everything and is
//! never triggered again. Calling [`Effect::run`] afterwards still invokes the
//! function, without tracking.

use std::fmt;
use std::rc::{Rc, Weak};

use super::runtime::{Runtime, RuntimeInner};
use super::subscriber::{Job, SchedulerFn, SubscriberId};

/// Options accepted by [`Runtime::effect`].
#[derive(Clone)]
pub struct EffectOptions {
    pub(crate) scheduler: Option<SchedulerFn>,
    pub(crate) lazy: bool,
    pub(crate) name: &'static str,
}

impl EffectOptions {
    /// Re-run policy: called with the effect's job instead of re-running it.
    pub fn scheduler<F>(mut self, scheduler: F) -> Self
    where
        F: Fn(&Job) + 'static,
    {
        self.scheduler = Some(Rc::new(scheduler));
        self
    }

    /// Skip the initial run.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Label shown in trace output.
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }
}

impl Default for EffectOptions {
    fn default() -> Self {
        Self {
            scheduler: None,
            lazy: false,
            name: "effect",
        }
    }
}

impl fmt::Debug for EffectOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectOptions")
            .field("scheduler", &self.scheduler.is_some())
            .field("lazy", &self.lazy)
            .field("name", &self.name)
            .finish()
    }
}

/// Runner handle for an effect.
///
/// Dropping the handle does not stop the effect; call [`Effect::stop`].
pub struct Effect<T> {
    id: SubscriberId,
    body: Rc<dyn Fn() -> T>,
    runtime: Weak<RuntimeInner>,
}

impl Runtime {
    /// Create an effect running `f`, re-run when what it read changes.
    pub fn effect<T, F>(&self, f: F, options: EffectOptions) -> Effect<T>
    where
        T: 'static,
        F: Fn() -> T + 'static,
    {
        let body: Rc<dyn Fn() -> T> = Rc::new(f);
        let erased = {
            let body = body.clone();
            Rc::new(move || {
                body();
            }) as Rc<dyn Fn()>
        };

        let id = self.register(options.name, erased, options.scheduler);
        let effect = Effect {
            id,
            body,
            runtime: self.downgrade(),
        };

        if !options.lazy {
            effect.run();
        }
        effect
    }
}

impl<T> Effect<T> {
    fn runtime(&self) -> Option<Runtime> {
        Runtime::upgrade(&self.runtime)
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Run the effect now and return what its function returned.
    pub fn run(&self) -> T {
        match self.runtime() {
            Some(rt) => rt.with_subscriber(self.id, || (self.body)()),
            None => (self.body)(),
        }
    }

    /// Stop the effect. It will not be triggered again.
    pub fn stop(&self) {
        if let Some(rt) = self.runtime() {
            rt.stop(self.id);
        }
    }

    /// Whether the effect is still trackable.
    pub fn is_active(&self) -> bool {
        self.runtime().is_some_and(|rt| rt.is_active(self.id))
    }

    /// The job that re-runs this effect, while it is active.
    pub fn job(&self) -> Option<Job> {
        self.runtime().and_then(|rt| rt.job_of(self.id))
    }

    /// Number of dependency sets this effect is linked to.
    pub fn dependency_count(&self) -> usize {
        self.runtime()
            .map(|rt| rt.dependency_count(self.id))
            .unwrap_or(0)
    }
}

impl<T> Clone for Effect<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            body: Rc::clone(&self.body),
            runtime: self.runtime.clone(),
        }
    }
}

impl<T> fmt::Debug for Effect<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}
