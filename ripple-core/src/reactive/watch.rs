//! Watchers
//!
//! `watch` observes a source and calls back with the new and previous value;
//! `watch_effect` is an effect whose re-runs can be deferred like any watcher.
//!
//! Sources are refs, computed values, tracked objects and getter closures
//! (wrapped in [`Getter`]). Watching a tracked object is deep by default:
//! every field, at every depth, is read so that any nested write fires the
//! callback. `deep(false)` limits that to the object's own fields.

use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::computed::Computed;
use super::dep::TargetId;
use super::effect::{Effect, EffectOptions};
use super::object::Reactive;
use super::runtime::Runtime;
use super::signal::Ref;
use super::subscriber::Job;
use super::value::Value;

/// When a triggered watcher runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flush {
    /// Synchronously, inside the write that triggered it.
    #[default]
    Sync,
    /// On the next scheduler flush, deduplicated with other queued jobs.
    Pre,
}

/// Options accepted by [`Runtime::watch`] and [`Runtime::watch_effect`].
#[derive(Debug, Clone, Copy, Default)]
pub struct WatchOptions {
    pub(crate) deep: Option<bool>,
    pub(crate) immediate: bool,
    pub(crate) flush: Flush,
}

impl WatchOptions {
    /// Traverse the watched value so nested writes fire the callback.
    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = Some(deep);
        self
    }

    /// Call back once at creation, with no previous value.
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    pub fn flush(mut self, flush: Flush) -> Self {
        self.flush = flush;
        self
    }
}

/// Values a deep watcher can walk. Walking reads every tracked field.
pub trait Traverse {
    /// Read nested tracked state, `depth` levels down (`None` = unbounded).
    fn traverse(&self, _depth: Option<usize>, _seen: &mut HashSet<TargetId>) {}
}

macro_rules! leaf_traverse {
    ($($ty:ty),* $(,)?) => {
        $(impl Traverse for $ty {})*
    };
}

leaf_traverse!(
    (),
    bool,
    char,
    i8,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    u64,
    usize,
    isize,
    f32,
    f64,
    String,
    &'static str,
    Rc<str>,
);

impl<T: Traverse> Traverse for Option<T> {
    fn traverse(&self, depth: Option<usize>, seen: &mut HashSet<TargetId>) {
        if let Some(value) = self {
            value.traverse(depth, seen);
        }
    }
}

impl<T: Traverse> Traverse for Vec<T> {
    fn traverse(&self, depth: Option<usize>, seen: &mut HashSet<TargetId>) {
        for value in self {
            value.traverse(depth, seen);
        }
    }
}

impl Traverse for Value {
    fn traverse(&self, depth: Option<usize>, seen: &mut HashSet<TargetId>) {
        if let Value::Reactive(reactive) = self {
            reactive.traverse(depth, seen);
        }
    }
}

impl Traverse for Reactive {
    fn traverse(&self, depth: Option<usize>, seen: &mut HashSet<TargetId>) {
        if depth == Some(0) || !seen.insert(self.id()) {
            return;
        }

        let next = depth.map(|d| d - 1);
        for key in self.keys() {
            self.get(&key).traverse(next, seen);
        }
    }
}

/// Something that can be watched.
pub trait WatchSource {
    type Value: Clone + PartialEq + Traverse + 'static;

    /// Whether the source is traversed when `deep` is not specified.
    const DEEP_BY_DEFAULT: bool = false;

    /// Read the current value, tracking what it depends on.
    fn read(&self) -> Self::Value;
}

impl<T> WatchSource for Ref<T>
where
    T: Clone + PartialEq + Traverse + 'static,
{
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

impl<T> WatchSource for Computed<T>
where
    T: Clone + PartialEq + Traverse + 'static,
{
    type Value = T;

    fn read(&self) -> T {
        self.get()
    }
}

impl WatchSource for Reactive {
    type Value = Reactive;

    const DEEP_BY_DEFAULT: bool = true;

    fn read(&self) -> Reactive {
        self.clone()
    }
}

/// A getter closure used as a watch source.
pub struct Getter<F>(pub F);

impl<F, T> WatchSource for Getter<F>
where
    F: Fn() -> T,
    T: Clone + PartialEq + Traverse + 'static,
{
    type Value = T;

    fn read(&self) -> T {
        (self.0)()
    }
}

/// Collects the cleanup a callback registers for its next run.
#[derive(Default)]
pub struct OnCleanup {
    cleanup: Option<Box<dyn FnOnce()>>,
}

impl OnCleanup {
    /// Run `f` before the next callback, or when the watcher stops.
    pub fn register<F>(&mut self, f: F)
    where
        F: FnOnce() + 'static,
    {
        self.cleanup = Some(Box::new(f));
    }

    fn take(&mut self) -> Option<Box<dyn FnOnce()>> {
        self.cleanup.take()
    }
}

impl fmt::Debug for OnCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnCleanup")
            .field("registered", &self.cleanup.is_some())
            .finish()
    }
}

type Callback<T> = Box<dyn FnMut(&T, Option<&T>, &mut OnCleanup)>;

trait Watcher {
    fn stop(&self);
    fn is_active(&self) -> bool;
}

struct WatchInner<T> {
    effect: RefCell<Option<Effect<T>>>,
    callback: RefCell<Callback<T>>,
    old: RefCell<Option<T>>,
    cleanup: RefCell<Option<Box<dyn FnOnce()>>>,
    in_callback: Cell<bool>,
    /// Deep watchers call back even when the value is the same object.
    force: bool,
}

impl<T> WatchInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn effect(&self) -> Option<Effect<T>> {
        self.effect.borrow().clone()
    }

    fn job(&self) {
        let Some(effect) = self.effect() else {
            return;
        };
        if !effect.is_active() {
            return;
        }
        if self.in_callback.get() {
            tracing::trace!("watch callback already running, skipping re-entrant trigger");
            return;
        }

        let new = effect.run();
        let previous = self.old.borrow_mut().take();

        if !self.force && previous.as_ref() == Some(&new) {
            *self.old.borrow_mut() = previous;
            return;
        }

        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }

        *self.old.borrow_mut() = Some(new.clone());

        let _guard = CallbackGuard::enter(&self.in_callback);
        let mut on_cleanup = OnCleanup::default();
        (self.callback.borrow_mut())(&new, previous.as_ref(), &mut on_cleanup);
        *self.cleanup.borrow_mut() = on_cleanup.take();
    }
}

/// Marks a watch callback as running until dropped, unwinding included.
struct CallbackGuard<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> CallbackGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for CallbackGuard<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

impl<T> Watcher for WatchInner<T>
where
    T: Clone + PartialEq + 'static,
{
    fn stop(&self) {
        if let Some(effect) = self.effect() {
            effect.stop();
        }
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }
    }

    fn is_active(&self) -> bool {
        self.effect().is_some_and(|effect| effect.is_active())
    }
}

struct WatchEffectInner {
    effect: RefCell<Option<Effect<()>>>,
    cleanup: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl Watcher for WatchEffectInner {
    fn stop(&self) {
        if let Some(effect) = self.effect.borrow().clone() {
            effect.stop();
        }
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            cleanup();
        }
    }

    fn is_active(&self) -> bool {
        self.effect
            .borrow()
            .as_ref()
            .is_some_and(|effect| effect.is_active())
    }
}

/// Handle returned by [`Runtime::watch`] and [`Runtime::watch_effect`].
///
/// Dropping the handle leaves the watcher running; call [`WatchHandle::stop`].
#[derive(Clone)]
pub struct WatchHandle {
    watcher: Rc<dyn Watcher>,
}

impl WatchHandle {
    /// Stop watching and run any pending cleanup.
    pub fn stop(&self) {
        self.watcher.stop();
    }

    pub fn is_active(&self) -> bool {
        self.watcher.is_active()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

impl Runtime {
    /// Call `callback(new, old, on_cleanup)` whenever `source` changes.
    pub fn watch<S, C>(&self, source: S, callback: C, options: WatchOptions) -> WatchHandle
    where
        S: WatchSource + 'static,
        C: FnMut(&S::Value, Option<&S::Value>, &mut OnCleanup) + 'static,
    {
        let deep = options.deep.unwrap_or(S::DEEP_BY_DEFAULT);
        let depth = match (S::DEEP_BY_DEFAULT, options.deep) {
            (true, Some(false)) => Some(Some(1)),
            (_, _) if deep => Some(None),
            _ => None,
        };

        let getter = move || {
            let value = source.read();
            if let Some(depth) = depth {
                value.traverse(depth, &mut HashSet::new());
            }
            value
        };

        let inner = Rc::new(WatchInner {
            effect: RefCell::new(None),
            callback: RefCell::new(Box::new(callback) as Callback<S::Value>),
            old: RefCell::new(None),
            cleanup: RefCell::new(None),
            in_callback: Cell::new(false),
            force: depth.is_some(),
        });

        let queued = {
            let inner = Rc::downgrade(&inner);
            Job::new(move || {
                if let Some(inner) = inner.upgrade() {
                    inner.job();
                }
            })
        };

        let scheduler = {
            let inner = inner.clone();
            let runtime = self.downgrade();
            move |_job: &Job| match options.flush {
                Flush::Sync => inner.job(),
                Flush::Pre => {
                    if let Some(rt) = Runtime::upgrade(&runtime) {
                        rt.queue_job(queued.clone());
                    }
                }
            }
        };

        let effect = self.effect(
            getter,
            EffectOptions::default()
                .name("watch")
                .lazy(true)
                .scheduler(scheduler),
        );
        *inner.effect.borrow_mut() = Some(effect.clone());

        if options.immediate {
            inner.job();
        } else {
            *inner.old.borrow_mut() = Some(effect.run());
        }

        WatchHandle { watcher: inner }
    }

    /// Run `f` now and again whenever what it read changes.
    pub fn watch_effect<F>(&self, f: F, options: WatchOptions) -> WatchHandle
    where
        F: Fn(&mut OnCleanup) + 'static,
    {
        let cleanup: Rc<RefCell<Option<Box<dyn FnOnce()>>>> = Rc::new(RefCell::new(None));

        let body = {
            let cleanup = cleanup.clone();
            move || {
                let previous = cleanup.borrow_mut().take();
                if let Some(previous) = previous {
                    previous();
                }
                let mut on_cleanup = OnCleanup::default();
                f(&mut on_cleanup);
                *cleanup.borrow_mut() = on_cleanup.take();
            }
        };

        let runtime = self.downgrade();
        let scheduler = move |job: &Job| match options.flush {
            Flush::Sync => job.run(),
            Flush::Pre => {
                if let Some(rt) = Runtime::upgrade(&runtime) {
                    rt.queue_job(job.clone());
                }
            }
        };

        let effect = self.effect(
            body,
            EffectOptions::default()
                .name("watch_effect")
                .scheduler(scheduler),
        );

        WatchHandle {
            watcher: Rc::new(WatchEffectInner {
                effect: RefCell::new(Some(effect)),
                cleanup,
            }),
        }
    }
}
