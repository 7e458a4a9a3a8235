//! Dependency Store
//!
//! For every tracked target and every key read on it, the store holds one
//! dependency set: the subscribers that read that (target, key) pair, in the
//! order they first subscribed.
//!
//! Each subscriber entry remembers the `track_id` of the run that last linked
//! it. A second read of the same key within one run finds its own `track_id`
//! already recorded and does nothing, which keeps re-subscription O(1).
//!
//! Sets are created lazily on first read and removed as soon as their last
//! subscriber unlinks.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::arena::{Arena, Index};
use super::subscriber::SubscriberId;

/// Identity of a tracked target (a wrapped object, a ref or a computed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(u64);

impl TargetId {
    /// Generate a new unique target ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for TargetId {
    fn default() -> Self {
        Self::new()
    }
}

/// Which part of a target a dependency set watches.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum DepKey {
    /// A named field of a tracked object.
    Field(Rc<str>),
    /// The key set of a tracked object (additions and removals).
    Iterate,
    /// The single value of a ref or computed.
    Value,
}

impl fmt::Debug for DepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DepKey::Field(name) => write!(f, "{name:?}"),
            DepKey::Iterate => f.write_str("<iterate>"),
            DepKey::Value => f.write_str("<value>"),
        }
    }
}

impl From<&str> for DepKey {
    fn from(key: &str) -> Self {
        DepKey::Field(Rc::from(key))
    }
}

/// Identifier of a dependency set inside the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DepId(pub(crate) Index);

/// All subscribers interested in one (target, key) pair.
pub(crate) struct DepSet {
    /// Subscriber → `track_id` of the run that last linked it.
    pub subscribers: IndexMap<SubscriberId, u64>,
    target: TargetId,
    key: DepKey,
}

/// Per target, per key, the dependency set currently tracking it.
#[derive(Default)]
pub(crate) struct DepStore {
    sets: Arena<DepSet>,
    index: HashMap<TargetId, HashMap<DepKey, DepId>>,
}

impl DepStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the set for (target, key) without creating it.
    pub fn find(&self, target: TargetId, key: &DepKey) -> Option<DepId> {
        self.index.get(&target)?.get(key).copied()
    }

    /// Look up the set for (target, key), creating an empty one if needed.
    pub fn get_or_create(&mut self, target: TargetId, key: &DepKey) -> DepId {
        if let Some(id) = self.find(target, key) {
            return id;
        }

        let id = DepId(self.sets.insert(DepSet {
            subscribers: IndexMap::new(),
            target,
            key: key.clone(),
        }));
        self.index.entry(target).or_default().insert(key.clone(), id);
        id
    }

    pub fn get(&self, id: DepId) -> Option<&DepSet> {
        self.sets.get(id.0)
    }

    pub fn get_mut(&mut self, id: DepId) -> Option<&mut DepSet> {
        self.sets.get_mut(id.0)
    }

    /// Unlink `subscriber` from `dep`, unless the subscriber's current run
    /// (`keep_track_id`) already re-linked it. Empty sets are removed.
    pub fn unlink(&mut self, dep: DepId, subscriber: SubscriberId, keep_track_id: Option<u64>) {
        let Some(set) = self.sets.get_mut(dep.0) else {
            return;
        };

        match set.subscribers.get(&subscriber) {
            Some(seen) if Some(*seen) == keep_track_id => return,
            Some(_) => {
                set.subscribers.shift_remove(&subscriber);
            }
            None => {}
        }

        if set.subscribers.is_empty() {
            self.remove(dep);
        }
    }

    fn remove(&mut self, dep: DepId) {
        let Some(set) = self.sets.remove(dep.0) else {
            return;
        };

        tracing::trace!(target = ?set.target, key = ?set.key, "dependency set emptied");

        if let Some(keys) = self.index.get_mut(&set.target) {
            keys.remove(&set.key);
            if keys.is_empty() {
                self.index.remove(&set.target);
            }
        }
    }

    /// Subscribers of (target, key) in notification order.
    pub fn subscribers_of(&self, target: TargetId, key: &DepKey) -> Vec<SubscriberId> {
        self.find(target, key)
            .and_then(|id| self.get(id))
            .map(|set| set.subscribers.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Number of live dependency sets.
    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn clear(&mut self) {
        self.sets.clear();
        self.index.clear();
    }
}
