//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a tracked value is read,
//! the runtime links the subscriber on top of the stack.
//!
//! # Implementation
//!
//! The stack lives in the runtime. Entering a context pushes a frame; the
//! returned guard pops it on drop. A `None` frame pauses tracking, so reads
//! inside `untrack` link nothing even when a subscriber is running further
//! down the stack.
//!
//! Dropping the guard of a subscriber frame also finishes the run: the
//! re-entrancy depth is decremented and links from the previous run that were
//! not confirmed by this one are pruned. Because this happens in `Drop`, a
//! panicking body still leaves the graph consistent.

use super::runtime::RuntimeInner;
use super::subscriber::SubscriberId;

/// Guard that pops the context when dropped.
pub(crate) struct ReactiveContext<'a> {
    runtime: &'a RuntimeInner,
    subscriber: Option<SubscriberId>,
}

impl<'a> ReactiveContext<'a> {
    /// Enter a frame for `subscriber` (or a paused frame for `None`).
    pub fn enter(runtime: &'a RuntimeInner, subscriber: Option<SubscriberId>) -> Self {
        runtime.stack.borrow_mut().push(subscriber);
        Self {
            runtime,
            subscriber,
        }
    }
}

impl Drop for ReactiveContext<'_> {
    fn drop(&mut self) {
        let popped = self.runtime.stack.borrow_mut().pop();

        debug_assert_eq!(
            popped,
            Some(self.subscriber),
            "ReactiveContext mismatch: expected {:?}, got {:?}",
            self.subscriber,
            popped
        );

        if let Some(id) = self.subscriber {
            self.runtime.finish_run(id);
        }
    }
}
