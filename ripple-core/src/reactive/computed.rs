//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! sources change.
//!
//! # How Computed Values Work
//!
//! 1. On first read, the getter runs inside the computed's own subscriber
//!    and the result is cached.
//!
//! 2. When a source changes, the subscriber's re-run policy does not
//!    recompute. It marks the cache dirty and notifies whoever read the
//!    computed (push invalidation).
//!
//! 3. The next read recomputes (pull evaluation). Computed values that are
//!    never read again stay dirty and cost nothing.
//!
//! The getter therefore runs at most once between two reads that have no
//! source change in between.

use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::dep::{DepKey, TargetId};
use super::effect::EffectOptions;
use super::runtime::{Runtime, RuntimeInner};
use super::subscriber::{Job, SubscriberId};

struct ComputedInner<T> {
    /// Identity of the computed's own dependency set.
    target: TargetId,

    /// The internal subscriber that reads the sources.
    subscriber: SubscriberId,

    getter: Box<dyn Fn() -> T>,
    setter: Option<Box<dyn Fn(T)>>,

    /// The cached value (None if never computed).
    value: RefCell<Option<T>>,

    /// Set when a source changed since the cached value was computed.
    dirty: Cell<bool>,

    runtime: Weak<RuntimeInner>,
}

/// A cached derived value.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl Runtime {
    /// Create a read-only computed value.
    pub fn computed<T, F>(&self, getter: F) -> Computed<T>
    where
        T: Clone + 'static,
        F: Fn() -> T + 'static,
    {
        self.build_computed(Box::new(getter), None)
    }

    /// Create a computed value whose writes go to `setter`.
    pub fn computed_with_setter<T, G, S>(&self, getter: G, setter: S) -> Computed<T>
    where
        T: Clone + 'static,
        G: Fn() -> T + 'static,
        S: Fn(T) + 'static,
    {
        self.build_computed(Box::new(getter), Some(Box::new(setter)))
    }

    fn build_computed<T>(
        &self,
        getter: Box<dyn Fn() -> T>,
        setter: Option<Box<dyn Fn(T)>>,
    ) -> Computed<T>
    where
        T: Clone + 'static,
    {
        let inner = Rc::new_cyclic(|this: &Weak<ComputedInner<T>>| {
            let target = TargetId::new();

            let body = {
                let this = this.clone();
                Rc::new(move || {
                    if let Some(inner) = this.upgrade() {
                        inner.evaluate();
                    }
                }) as Rc<dyn Fn()>
            };

            let invalidate = {
                let this = this.clone();
                move |_job: &Job| {
                    if let Some(inner) = this.upgrade() {
                        inner.invalidate();
                    }
                }
            };

            let options = EffectOptions::default()
                .name("computed")
                .scheduler(invalidate);
            let subscriber = self.register(options.name, body, options.scheduler);

            ComputedInner {
                target,
                subscriber,
                getter,
                setter,
                value: RefCell::new(None),
                dirty: Cell::new(true),
                runtime: self.downgrade(),
            }
        });

        Computed { inner }
    }
}

impl<T> ComputedInner<T> {
    fn runtime(&self) -> Option<Runtime> {
        Runtime::upgrade(&self.runtime)
    }

    fn evaluate(&self) {
        let value = (self.getter)();
        *self.value.borrow_mut() = Some(value);
        self.dirty.set(false);
    }

    fn invalidate(&self) {
        if self.dirty.replace(true) {
            return;
        }
        if let Some(rt) = self.runtime() {
            rt.trigger(self.target, &DepKey::Value);
        }
    }
}

impl<T> Computed<T>
where
    T: Clone + 'static,
{
    /// Get the current value, recomputing if a source changed.
    ///
    /// If called while a subscriber runs, also links that subscriber.
    pub fn get(&self) -> T {
        let inner = &self.inner;
        let runtime = inner.runtime();

        // Without a live subscriber nothing marks the cache dirty, so every
        // read recomputes, untracked.
        match &runtime {
            Some(rt) if rt.is_active(inner.subscriber) => {
                if inner.dirty.get() {
                    rt.run_erased(inner.subscriber);
                }
            }
            Some(rt) => rt.untrack(|| inner.evaluate()),
            None => inner.evaluate(),
        }

        if let Some(rt) = &runtime {
            rt.track(inner.target, &DepKey::Value);
        }

        match &*inner.value.borrow() {
            Some(value) => value.clone(),
            None => unreachable!("computed value read before evaluation"),
        }
    }

    /// Get the current value without linking the running subscriber.
    pub fn get_untracked(&self) -> T {
        match self.inner.runtime() {
            Some(rt) => rt.untrack(|| self.get()),
            None => self.get(),
        }
    }

    /// Hand `value` to the setter. A read-only computed ignores the write.
    pub fn set(&self, value: T) {
        match &self.inner.setter {
            Some(setter) => setter(value),
            None => tracing::warn!(
                target = ?self.inner.target,
                "write operation failed: computed value is readonly"
            ),
        }
    }

    /// Whether the next read recomputes.
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Identity of this computed in the dependency store.
    pub fn id(&self) -> TargetId {
        self.inner.target
    }

    /// Get the subscriber ID of the internal subscriber.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber
    }

    /// Number of subscribers reading this computed.
    pub fn dependent_count(&self) -> usize {
        self.inner
            .runtime()
            .map(|rt| rt.subscribers_of(self.inner.target, &DepKey::Value).len())
            .unwrap_or(0)
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        if let Some(rt) = self.runtime() {
            rt.stop(self.subscriber);
        }
    }
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> PartialEq for Computed<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<T> Debug for Computed<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("target", &self.inner.target)
            .field("dirty", &self.inner.dirty.get())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> Rc<Cell<u32>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn computed_is_lazy_and_cached() {
        let rt = Runtime::new();
        let calls = counter();

        let answer = rt.computed({
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                42
            }
        });

        // Not computed yet
        assert!(answer.is_dirty());
        assert_eq!(calls.get(), 0);

        assert_eq!(answer.get(), 42);
        assert_eq!(answer.get(), 42);
        assert_eq!(answer.get(), 42);
        assert_eq!(calls.get(), 1);
        assert!(!answer.is_dirty());
    }

    #[test]
    fn source_change_marks_dirty_without_recomputing() {
        let rt = Runtime::new();
        let base = rt.create_ref(1);
        let calls = counter();

        let doubled = rt.computed({
            let base = base.clone();
            let calls = calls.clone();
            move || {
                calls.set(calls.get() + 1);
                base.get() * 2
            }
        });

        assert_eq!(doubled.get(), 2);

        base.set(2);
        base.set(3);
        assert!(doubled.is_dirty());
        assert_eq!(calls.get(), 1);

        assert_eq!(doubled.get(), 6);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn writes_go_to_the_setter() {
        let rt = Runtime::new();
        let first = rt.create_ref(String::from("Ada"));

        let name = rt.computed_with_setter(
            {
                let first = first.clone();
                move || first.get().to_uppercase()
            },
            {
                let first = first.clone();
                move |value: String| first.set(value)
            },
        );

        assert_eq!(name.get(), "ADA");
        name.set(String::from("Grace"));
        assert_eq!(first.get(), "Grace");
        assert_eq!(name.get(), "GRACE");
    }

    #[test]
    fn readonly_write_is_ignored() {
        let rt = Runtime::new();
        let fixed = rt.computed(|| 1);

        assert_eq!(fixed.get(), 1);
        fixed.set(5);
        assert_eq!(fixed.get(), 1);
    }

    #[test]
    fn dropping_computed_releases_its_subscriber() {
        let rt = Runtime::new();
        let base = rt.create_ref(1);

        let doubled = rt.computed({
            let base = base.clone();
            move || base.get() * 2
        });
        assert_eq!(doubled.get(), 2);
        assert_eq!(base.subscriber_count(), 1);

        drop(doubled);
        assert_eq!(base.subscriber_count(), 0);
        assert_eq!(rt.subscriber_count(), 0);
    }

    #[test]
    fn disposed_runtime_recomputes_on_every_read() {
        let rt = Runtime::new();
        let base = rt.create_ref(1);
        let doubled = rt.computed({
            let base = base.clone();
            move || base.get() * 2
        });
        assert_eq!(doubled.get(), 2);

        rt.dispose();
        base.set(5);
        assert_eq!(doubled.get(), 10);
        assert_eq!(rt.dependency_set_count(), 0);
    }

    #[test]
    fn dropped_runtime_recomputes_on_every_read() {
        let (base, doubled) = {
            let rt = Runtime::new();
            let base = rt.create_ref(1);
            let doubled = rt.computed({
                let base = base.clone();
                move || base.get() * 2
            });
            assert_eq!(doubled.get(), 2);
            (base, doubled)
        };

        base.set(5);
        assert_eq!(doubled.get(), 10);
        base.set(7);
        assert_eq!(doubled.get(), 14);
    }

    #[test]
    fn computed_clone_shares_state() {
        let rt = Runtime::new();
        let first = rt.computed(|| 42);
        assert_eq!(first.get(), 42);

        let second = first.clone();
        assert_eq!(first, second);
        assert!(!second.is_dirty());
    }
}
