//! Subscriber types for the reactive system.
//!
//! A subscriber is any callback that wants to hear about a cell change:
//! computed recompute entry points, computed dirty setters, effect triggers
//! and render-binding version setters. All of them are shared as [`Trigger`]
//! values and compared by the identity of their allocation.
//!
//! Most channels hold their subscribers through a [`WeakSubscriberSet`], so a
//! listener that nobody else keeps alive simply disappears from the graph
//! the next time the set is traversed.

use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use smallvec::SmallVec;

/// A callback registered on a cell.
pub type Trigger = Arc<TriggerFn>;

/// The unsized callback type behind a [`Trigger`].
pub type TriggerFn = dyn Fn() + Send + Sync;

/// Identity of a subscriber.
///
/// Two ids are equal exactly when they were taken from the same `Arc`
/// allocation. A live `Weak` keeps that allocation reserved, so an id cannot
/// be reused while any set still remembers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(usize);

impl SubscriberId {
    /// Identity of a shared subscriber.
    pub fn of<T: ?Sized>(item: &Arc<T>) -> Self {
        Self(Arc::as_ptr(item) as *const () as usize)
    }

    pub(crate) fn of_weak<T: ?Sized>(item: &Weak<T>) -> Self {
        Self(Weak::as_ptr(item) as *const () as usize)
    }
}

/// Snapshot of live subscribers, in registration order.
pub type SubscriberList<T> = SmallVec<[Arc<T>; 4]>;

/// A membership collection that does not keep its members alive.
///
/// Entries are keyed by [`SubscriberId`], which doubles as the cheap
/// "already present" marker for [`add`](Self::add). Dead entries are
/// dropped lazily whenever the set is traversed.
pub struct WeakSubscriberSet<T: ?Sized> {
    entries: IndexMap<SubscriberId, Weak<T>>,
}

impl<T: ?Sized> WeakSubscriberSet<T> {
    pub fn new() -> Self {
        Self {
            entries: IndexMap::new(),
        }
    }

    /// Add a subscriber. Adding an already present subscriber is a no-op.
    pub fn add(&mut self, item: &Arc<T>) {
        let id = SubscriberId::of(item);
        if self.entries.contains_key(&id) {
            return;
        }
        self.entries.insert(id, Arc::downgrade(item));
    }

    /// Remove a subscriber.
    ///
    /// When the item was never added, every entry is dereferenced instead,
    /// which evicts the ones whose subscriber is already gone.
    pub fn delete(&mut self, item: &Arc<T>) {
        let id = SubscriberId::of(item);
        if self.entries.shift_remove(&id).is_none() {
            self.prune();
        }
    }

    pub(crate) fn delete_id(&mut self, id: SubscriberId) {
        if self.entries.shift_remove(&id).is_none() {
            self.prune();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn has(&self, item: &Arc<T>) -> bool {
        self.contains_id(SubscriberId::of(item))
    }

    pub(crate) fn contains_id(&self, id: SubscriberId) -> bool {
        self.entries
            .get(&id)
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }

    /// Number of live subscribers. Evicts dead entries as a side effect.
    pub fn len(&mut self) -> usize {
        self.prune();
        self.entries.len()
    }

    pub fn is_empty(&mut self) -> bool {
        self.len() == 0
    }

    /// Upgrade every live entry, evicting the dead ones.
    pub fn to_vec(&mut self) -> SubscriberList<T> {
        let mut live = SubscriberList::new();
        self.entries.retain(|id, weak| match weak.upgrade() {
            Some(item) => {
                live.push(item);
                true
            }
            None => {
                tracing::trace!(subscriber = ?id, "evicted dead subscriber");
                false
            }
        });
        live
    }

    pub fn for_each(&mut self, mut f: impl FnMut(&Arc<T>)) {
        for item in self.to_vec() {
            f(&item);
        }
    }

    pub fn map<R>(&mut self, mut f: impl FnMut(&Arc<T>) -> R) -> Vec<R> {
        self.to_vec().iter().map(|item| f(item)).collect()
    }

    pub fn find(&mut self, mut f: impl FnMut(&Arc<T>) -> bool) -> Option<Arc<T>> {
        self.to_vec().into_iter().find(|item| f(item))
    }

    pub fn filter(&mut self, mut f: impl FnMut(&Arc<T>) -> bool) -> SubscriberList<T> {
        self.to_vec().into_iter().filter(|item| f(item)).collect()
    }

    /// Remove every entry and return the live ones, keyed by identity.
    pub(crate) fn take(&mut self) -> IndexMap<SubscriberId, Arc<T>> {
        std::mem::take(&mut self.entries)
            .into_iter()
            .filter_map(|(id, weak)| weak.upgrade().map(|item| (id, item)))
            .collect()
    }

    fn prune(&mut self) {
        self.entries.retain(|id, weak| {
            let alive = weak.strong_count() > 0;
            if !alive {
                tracing::trace!(subscriber = ?id, "evicted dead subscriber");
            }
            alive
        });
    }
}

impl<T: ?Sized> Default for WeakSubscriberSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> std::fmt::Debug for WeakSubscriberSet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeakSubscriberSet")
            .field("entries", &self.entries.len())
            .finish()
    }
}
