//! Ripple Core
//!
//! This crate provides the core runtime for the Ripple reactive UI framework.
//! It implements:
//!
//! - Fine-grained dependency tracking (tracked objects, refs, computed values,
//!   effects, watchers)
//! - An update scheduler that batches re-runs into one deferred flush
//! - Render descriptions and a keyed reconciler driving an abstract host
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Dependency tracking and the reactive primitives
//! - `scheduler`: Job batching and deferral backends
//! - `render`: Render descriptions, host capabilities and reconciliation
//!
//! Everything is single-threaded. A [`reactive::Runtime`] is an explicit
//! context object; several can coexist.
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! use ripple_core::reactive::Runtime;
//!
//! let rt = Runtime::new();
//!
//! // Create a ref
//! let count = rt.create_ref(1);
//!
//! // Create a derived value
//! let doubled = rt.computed({
//!     let count = count.clone();
//!     move || count.get() * 2
//! });
//!
//! // Create an effect
//! let seen = Rc::new(Cell::new(0));
//! let _effect = rt.effect(
//!     {
//!         let seen = seen.clone();
//!         move || seen.set(doubled.get())
//!     },
//!     Default::default(),
//! );
//!
//! // Update the ref; the effect re-runs synchronously
//! count.set(5);
//! assert_eq!(seen.get(), 10);
//! ```

pub mod error;
pub mod reactive;
pub mod render;
pub mod scheduler;

pub use error::{Error, Result};
pub use reactive::{
    Computed, Effect, EffectOptions, Flush, Getter, Job, RawObject, Reactive, Ref, Runtime, Value,
    WatchHandle, WatchOptions,
};
pub use render::{Component, HostOps, MemoryHost, Renderer, VNode};
