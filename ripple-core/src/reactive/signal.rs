//! Ref Implementation
//!
//! A [`Ref`] is a single tracked value. Reading it inside a subscriber links
//! the subscriber to the ref; writing a different value notifies every linked
//! subscriber.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//! let count = rt.create_ref(0);
//!
//! // Read the value
//! assert_eq!(count.get(), 0);
//!
//! // Update the value (notifies subscribers)
//! count.set(5);
//! assert_eq!(count.get(), 5);
//! ```

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};

use super::dep::{DepKey, TargetId};
use super::runtime::{Runtime, RuntimeInner};
use super::value::Value;

struct RefBody<T> {
    /// Identity used by the dependency store.
    target: TargetId,

    /// The current value.
    value: RefCell<T>,

    runtime: Weak<RuntimeInner>,
}

/// A tracked value holder.
pub struct Ref<T> {
    body: Rc<RefBody<T>>,
}

impl Runtime {
    /// Create a ref holding `value`.
    pub fn create_ref<T>(&self, value: T) -> Ref<T>
    where
        T: Clone + PartialEq + 'static,
    {
        Ref {
            body: Rc::new(RefBody {
                target: TargetId::new(),
                value: RefCell::new(value),
                runtime: self.downgrade(),
            }),
        }
    }

    /// Create a ref of a dynamic value. A record is wrapped up front, so the
    /// ref hands out a tracked object.
    pub fn create_value_ref(&self, value: Value) -> Ref<Value> {
        self.create_ref(self.to_reactive(value))
    }
}

impl<T> Ref<T>
where
    T: Clone + PartialEq + 'static,
{
    fn runtime(&self) -> Option<Runtime> {
        Runtime::upgrade(&self.body.runtime)
    }

    /// Identity of this ref in the dependency store.
    pub fn id(&self) -> TargetId {
        self.body.target
    }

    /// Get the current value.
    ///
    /// If called while a subscriber runs, also links that subscriber.
    pub fn get(&self) -> T {
        if let Some(rt) = self.runtime() {
            rt.track(self.body.target, &DepKey::Value);
        }
        self.body.value.borrow().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn get_untracked(&self) -> T {
        self.body.value.borrow().clone()
    }

    /// Read through a closure without cloning. Tracks like [`Ref::get`].
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        if let Some(rt) = self.runtime() {
            rt.track(self.body.target, &DepKey::Value);
        }
        f(&self.body.value.borrow())
    }

    /// Set a new value and notify subscribers if it differs from the old one.
    pub fn set(&self, value: T) {
        {
            let mut current = self.body.value.borrow_mut();
            if *current == value {
                return;
            }
            *current = value;
        }

        if let Some(rt) = self.runtime() {
            rt.trigger(self.body.target, &DepKey::Value);
        }
    }

    /// Update the value using a function of the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let next = f(&self.body.value.borrow());
        self.set(next);
    }

    /// Number of subscribers currently linked to this ref.
    pub fn subscriber_count(&self) -> usize {
        self.runtime()
            .map(|rt| rt.subscribers_of(self.body.target, &DepKey::Value).len())
            .unwrap_or(0)
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Self {
            body: Rc::clone(&self.body),
        }
    }
}

impl<T> PartialEq for Ref<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl<T> Debug for Ref<T>
where
    T: Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ref")
            .field("target", &self.body.target)
            .field("value", &*self.body.value.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::RawObject;
    use std::cell::Cell;

    #[test]
    fn ref_get_and_set() {
        let rt = Runtime::new();
        let count = rt.create_ref(0);
        assert_eq!(count.get(), 0);

        count.set(42);
        assert_eq!(count.get(), 42);
    }

    #[test]
    fn ref_update() {
        let rt = Runtime::new();
        let count = rt.create_ref(10);
        count.update(|v| v + 5);
        assert_eq!(count.get(), 15);
    }

    #[test]
    fn ref_notifies_subscribers() {
        let rt = Runtime::new();
        let count = rt.create_ref(0);
        let calls = Rc::new(Cell::new(0));

        let _effect = rt.effect(
            {
                let count = count.clone();
                let calls = calls.clone();
                move || {
                    count.get();
                    calls.set(calls.get() + 1);
                }
            },
            Default::default(),
        );
        assert_eq!(calls.get(), 1);

        count.set(1);
        assert_eq!(calls.get(), 2);

        count.set(2);
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn same_value_does_not_notify() {
        let rt = Runtime::new();
        let name = rt.create_ref(String::from("a"));
        let calls = Rc::new(Cell::new(0));

        let _effect = rt.effect(
            {
                let name = name.clone();
                let calls = calls.clone();
                move || {
                    name.get();
                    calls.set(calls.get() + 1);
                }
            },
            Default::default(),
        );

        name.set(String::from("a"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn ref_clone_shares_state() {
        let rt = Runtime::new();
        let first = rt.create_ref(0);
        let second = first.clone();

        first.set(42);
        assert_eq!(second.get(), 42);
        assert_eq!(first, second);
    }

    #[test]
    fn value_ref_wraps_records() {
        let rt = Runtime::new();
        let raw = RawObject::new();
        let state = rt.create_value_ref(Value::Object(raw.clone()));

        match state.get() {
            Value::Reactive(r) => assert_eq!(r, rt.wrap(&raw)),
            other => panic!("expected a reactive value, got {other:?}"),
        }
    }
}
