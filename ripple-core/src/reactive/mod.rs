//! Reactive Primitives
//!
//! This module implements the dependency-tracking engine: tracked objects,
//! refs, computed values, effects and watchers.
//!
//! # Concepts
//!
//! ## Tracked objects and refs
//!
//! [`Runtime::wrap`] gives a record explicit `get`/`set` accessors. A read made
//! while a subscriber runs links that subscriber to (object, key); a write of
//! a different value notifies every subscriber linked to that key. A [`Ref`]
//! is the same idea for a single value.
//!
//! ## Effects
//!
//! An [`Effect`] runs a function and re-runs it when anything it read changes.
//! With a scheduler in its [`EffectOptions`], a trigger hands the scheduler
//! the effect's [`Job`] instead of re-running inline.
//!
//! ## Computed values
//!
//! A [`Computed`] caches a derived value. Source changes only mark it dirty;
//! the next read recomputes.
//!
//! ## Watchers
//!
//! [`Runtime::watch`] calls back with the new and previous value of a source.
//!
//! # Implementation Notes
//!
//! Subscribers and dependency sets live in generational arenas owned by the
//! [`Runtime`], and refer to each other by index. Each link records the run
//! in which it was last touched, so repeated reads in one run cost O(1) and
//! links left over from the previous run are pruned when a run ends.

mod arena;
mod computed;
mod context;
mod dep;
mod effect;
mod object;
mod runtime;
mod signal;
mod subscriber;
mod value;
mod watch;

pub use computed::Computed;
pub use dep::{DepKey, TargetId};
pub use effect::{Effect, EffectOptions};
pub use object::Reactive;
pub use runtime::Runtime;
pub use signal::Ref;
pub use subscriber::{Job, JobId, SchedulerFn, SubscriberId};
pub use value::{RawObject, Value};
pub(crate) use runtime::RuntimeInner;
pub use watch::{Flush, Getter, OnCleanup, Traverse, WatchHandle, WatchOptions, WatchSource};
