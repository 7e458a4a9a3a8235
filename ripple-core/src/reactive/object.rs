//! Tracked Objects
//!
//! [`Runtime::wrap`] turns a [`RawObject`] into a [`Reactive`]: an explicit
//! accessor over the record whose reads link the running subscriber to
//! (object, key) and whose writes notify that key.
//!
//! # Identity
//!
//! The runtime caches one wrapper per raw record. Wrapping the same record
//! again returns the same wrapper for as long as any handle to it is alive.
//!
//! # Nested records
//!
//! Nested records are wrapped lazily: reading a field that holds a record
//! returns `Value::Reactive`, so a subscriber that reads `a.b.c` depends on
//! both `(a, "b")` and `(b, "c")`. Writes store raw records only.

use std::fmt;
use std::rc::{Rc, Weak};

use super::dep::{DepKey, TargetId};
use super::runtime::{Runtime, RuntimeInner};
use super::value::{RawObject, Value};

pub(crate) struct ReactiveInner {
    raw: RawObject,
    runtime: Weak<RuntimeInner>,
}

/// A tracked view of a [`RawObject`].
#[derive(Clone)]
pub struct Reactive {
    inner: Rc<ReactiveInner>,
}

impl Runtime {
    /// Wrap a record so that reads are tracked and writes notify.
    ///
    /// Idempotent per record: the cached wrapper is returned when one is alive.
    pub fn wrap(&self, raw: &RawObject) -> Reactive {
        let target = raw.id();
        let mut wrappers = self.inner.wrappers.borrow_mut();

        if let Some(existing) = wrappers.get(&target).and_then(Weak::upgrade) {
            return Reactive { inner: existing };
        }

        let inner = Rc::new(ReactiveInner {
            raw: raw.clone(),
            runtime: self.downgrade(),
        });
        wrappers.insert(target, Rc::downgrade(&inner));

        tracing::trace!(?target, "wrapped object");
        Reactive { inner }
    }

    /// Wrap `value` if it is a record; anything else is returned unchanged.
    pub fn to_reactive(&self, value: Value) -> Value {
        match value {
            Value::Object(raw) => Value::Reactive(self.wrap(&raw)),
            other => other,
        }
    }
}

impl Reactive {
    fn runtime(&self) -> Option<Runtime> {
        Runtime::upgrade(&self.inner.runtime)
    }

    /// Identity of the wrapped record.
    pub fn id(&self) -> TargetId {
        self.inner.raw.id()
    }

    /// The wrapped record.
    pub fn raw(&self) -> RawObject {
        self.inner.raw.clone()
    }

    /// Read `key`, linking the running subscriber to it.
    pub fn get(&self, key: &str) -> Value {
        let runtime = self.runtime();
        if let Some(rt) = &runtime {
            rt.track(self.id(), &DepKey::from(key));
        }

        let value = self.inner.raw.get(key).unwrap_or_default();
        match runtime {
            Some(rt) => rt.to_reactive(value),
            None => value,
        }
    }

    /// Read `key` without tracking.
    pub fn get_untracked(&self, key: &str) -> Value {
        let value = self.inner.raw.get(key).unwrap_or_default();
        match self.runtime() {
            Some(rt) => rt.to_reactive(value),
            None => value,
        }
    }

    /// Write `key`. Subscribers are notified only if the value changed.
    pub fn set(&self, key: &str, value: impl Into<Value>) {
        let value = value.into().into_raw();

        let (changed, added) = {
            let mut fields = self.inner.raw.fields_mut();
            match fields.get_mut(key) {
                Some(slot) if *slot == value => (false, false),
                Some(slot) => {
                    *slot = value;
                    (true, false)
                }
                None => {
                    fields.insert(Rc::from(key), value);
                    (true, true)
                }
            }
        };

        if !changed {
            return;
        }

        if let Some(rt) = self.runtime() {
            rt.trigger(self.id(), &DepKey::from(key));
            if added {
                rt.trigger(self.id(), &DepKey::Iterate);
            }
        }
    }

    /// Remove `key`, notifying its subscribers and key-set readers.
    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.raw.remove(key)?;

        if let Some(rt) = self.runtime() {
            rt.trigger(self.id(), &DepKey::from(key));
            rt.trigger(self.id(), &DepKey::Iterate);
        }
        Some(removed)
    }

    /// Whether `key` is present. Tracks the key.
    pub fn has(&self, key: &str) -> bool {
        if let Some(rt) = self.runtime() {
            rt.track(self.id(), &DepKey::from(key));
        }
        self.inner.raw.contains_key(key)
    }

    /// Current keys. Tracks the key set, so additions and removals notify.
    pub fn keys(&self) -> Vec<Rc<str>> {
        if let Some(rt) = self.runtime() {
            rt.track(self.id(), &DepKey::Iterate);
        }
        self.inner.raw.keys()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot as JSON, without tracking.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.inner.raw).unwrap_or_default()
    }

    /// Number of subscribers currently linked to `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.runtime()
            .map(|rt| rt.subscribers_of(self.id(), &DepKey::from(key)).len())
            .unwrap_or(0)
    }
}

impl Drop for ReactiveInner {
    fn drop(&mut self) {
        let Some(runtime) = self.runtime.upgrade() else {
            return;
        };
        // Busy only while `wrap` runs, which never drops a wrapper; a missed
        // entry is overwritten by the next `wrap` of this record anyway.
        let Ok(mut wrappers) = runtime.wrappers.try_borrow_mut() else {
            return;
        };
        let target = self.raw.id();
        if wrappers
            .get(&target)
            .is_some_and(|weak| weak.strong_count() == 0)
        {
            wrappers.remove(&target);
        }
    }
}

impl PartialEq for Reactive {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Reactive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reactive")
            .field("target", &self.id())
            .field("raw", &self.inner.raw)
            .finish()
    }
}
