//! Graph Nodes
//!
//! Every cell in the dependency graph (signal or computed) owns a set of
//! [`Channels`]: the subscriber collections through which changes fan out.
//! Edges are not stored centrally; a dependent wires itself onto a cell by
//! registering callbacks in that cell's channels through the crate-private
//! [`ReactiveNode`] capability.

use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::reactive::{SubscriberId, SubscriberList, Trigger, TriggerFn, WeakSubscriberSet};

/// Unique identifier for a cell in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(SubscriberId);

impl CellId {
    pub(crate) fn of(node: &Arc<dyn ReactiveNode>) -> Self {
        Self(SubscriberId::of(node))
    }

    pub(crate) fn subscriber_id(self) -> SubscriberId {
        self.0
    }
}

/// The kind of cell in the dependency graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// A writable source cell.
    Signal,
    /// A derived, read-only cell.
    Computed,
}

/// The subscriber collections of one cell.
///
/// Only `effect_triggers` holds strong references: effects stay subscribed
/// until they are explicitly disposed. Everything else is weak.
#[derive(Default)]
pub(crate) struct Channels {
    version_setters: Mutex<WeakSubscriberSet<TriggerFn>>,
    computed_triggers: Mutex<WeakSubscriberSet<TriggerFn>>,
    computed_dirty_setters: Mutex<WeakSubscriberSet<TriggerFn>>,
    effect_triggers: Mutex<IndexMap<SubscriberId, Trigger>>,
    temporary_effect_triggers: Mutex<WeakSubscriberSet<TriggerFn>>,
}

impl Channels {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_effect(&self, trigger: &Trigger) {
        self.effect_triggers
            .lock()
            .entry(SubscriberId::of(trigger))
            .or_insert_with(|| trigger.clone());
    }

    pub fn remove_effect(&self, trigger: &Trigger) {
        self.effect_triggers
            .lock()
            .shift_remove(&SubscriberId::of(trigger));
    }

    pub fn add_computed(&self, trigger: &Trigger) {
        self.computed_triggers.lock().add(trigger);
    }

    pub fn remove_computed(&self, trigger: &Trigger) {
        self.computed_triggers.lock().delete(trigger);
    }

    pub fn add_temporary_effect(&self, trigger: &Trigger) {
        self.temporary_effect_triggers.lock().add(trigger);
    }

    pub fn add_computed_dirty_setter(&self, setter: &Trigger) {
        self.computed_dirty_setters.lock().add(setter);
    }

    pub fn remove_computed_dirty_setter(&self, setter: &Trigger) {
        self.computed_dirty_setters.lock().delete(setter);
    }

    pub fn add_version_setter(&self, setter: &Trigger) {
        self.version_setters.lock().add(setter);
    }

    pub fn remove_version_setter(&self, setter: &Trigger) {
        self.version_setters.lock().delete(setter);
    }

    pub fn has_effect(&self, id: SubscriberId) -> bool {
        self.effect_triggers.lock().contains_key(&id)
    }

    pub fn has_temporary_effect(&self, id: SubscriberId) -> bool {
        self.temporary_effect_triggers.lock().contains_id(id)
    }

    pub fn has_computed(&self, id: SubscriberId) -> bool {
        self.computed_triggers.lock().contains_id(id)
    }

    pub fn effects(&self) -> SubscriberList<TriggerFn> {
        self.effect_triggers.lock().values().cloned().collect()
    }

    pub fn temporary_effects(&self) -> SubscriberList<TriggerFn> {
        self.temporary_effect_triggers.lock().to_vec()
    }

    pub fn computed_triggers(&self) -> SubscriberList<TriggerFn> {
        self.computed_triggers.lock().to_vec()
    }

    pub fn computed_dirty_setters(&self) -> SubscriberList<TriggerFn> {
        self.computed_dirty_setters.lock().to_vec()
    }

    pub fn version_setters(&self) -> SubscriberList<TriggerFn> {
        self.version_setters.lock().to_vec()
    }

    pub fn clear_temporary_effects(&self) {
        self.temporary_effect_triggers.lock().clear();
    }

    pub fn effect_count(&self) -> usize {
        self.effect_triggers.lock().len()
    }

    pub fn computed_count(&self) -> usize {
        self.computed_triggers.lock().len()
    }

    pub fn version_setter_count(&self) -> usize {
        self.version_setters.lock().len()
    }

    /// Durable plus temporary effects, each once, durable ones first.
    pub fn effect_union(&self) -> IndexMap<SubscriberId, Trigger> {
        let mut union = IndexMap::new();
        merge_into(&mut union, self.effects());
        merge_into(&mut union, self.temporary_effects());
        union
    }

    pub fn fire_dirty_setters(&self) {
        fire(self.computed_dirty_setters());
    }

    pub fn fire_computed_triggers(&self) {
        fire(self.computed_triggers());
    }

    pub fn fire_effects(&self) {
        fire(self.effects());
    }

    pub fn fire_effect_union(&self) {
        fire(self.effect_union().into_values());
    }

    pub fn fire_version_setters(&self) {
        fire(self.version_setters());
    }

    /// One full notification pass.
    ///
    /// Computed triggers run first so the effects that follow read fresh
    /// values; the temporary effects they forward are picked up in the same
    /// pass. Version setters run last, after all logic-level listeners.
    pub fn notify(&self) {
        self.clear_temporary_effects();
        self.fire_computed_triggers();
        self.fire_effect_union();
        self.clear_temporary_effects();
        self.fire_version_setters();
    }
}

/// Add triggers to an identity-keyed union, keeping first-seen order.
pub(crate) fn merge_into(
    union: &mut IndexMap<SubscriberId, Trigger>,
    triggers: impl IntoIterator<Item = Trigger>,
) {
    for trigger in triggers {
        union.entry(SubscriberId::of(&trigger)).or_insert(trigger);
    }
}

/// Invoke each trigger. No lock is held while user code runs.
pub(crate) fn fire(triggers: impl IntoIterator<Item = Trigger>) {
    for trigger in triggers {
        trigger();
    }
}

/// The internal subscription capability of a cell.
///
/// This is the only way a computed or an effect wires itself onto a cell.
/// It is never exposed to application code.
pub(crate) trait ReactiveNode: Send + Sync {
    fn kind(&self) -> CellKind;

    fn channels(&self) -> &Arc<Channels>;

    fn add_effect(&self, trigger: &Trigger) {
        self.channels().add_effect(trigger);
    }

    fn remove_effect(&self, trigger: &Trigger) {
        self.channels().remove_effect(trigger);
    }

    fn add_computed(&self, trigger: &Trigger) {
        self.channels().add_computed(trigger);
    }

    fn remove_computed(&self, trigger: &Trigger) {
        self.channels().remove_computed(trigger);
    }

    fn add_temporary_effect(&self, trigger: &Trigger) {
        self.channels().add_temporary_effect(trigger);
    }

    fn add_computed_dirty_setter(&self, setter: &Trigger) {
        self.channels().add_computed_dirty_setter(setter);
    }

    fn remove_computed_dirty_setter(&self, setter: &Trigger) {
        self.channels().remove_computed_dirty_setter(setter);
    }
}

/// An opaque, type-erased reference to a signal or computed.
///
/// Handles are what watch lists and [`Effect::dispose_cells`] take, and they
/// compare by cell identity.
///
/// [`Effect::dispose_cells`]: crate::reactive::Effect::dispose_cells
#[derive(Clone)]
pub struct CellHandle {
    node: Arc<dyn ReactiveNode>,
}

impl CellHandle {
    pub(crate) fn new(node: Arc<dyn ReactiveNode>) -> Self {
        Self { node }
    }

    pub(crate) fn node(&self) -> &Arc<dyn ReactiveNode> {
        &self.node
    }

    pub fn id(&self) -> CellId {
        CellId::of(&self.node)
    }

    pub fn kind(&self) -> CellKind {
        self.node.kind()
    }

    pub fn is_signal(&self) -> bool {
        self.kind() == CellKind::Signal
    }

    pub fn is_computed(&self) -> bool {
        self.kind() == CellKind::Computed
    }

    /// Number of durable effects currently subscribed to the cell.
    pub fn effect_count(&self) -> usize {
        self.node.channels().effect_count()
    }

    /// Number of live computed recompute triggers registered on the cell.
    pub fn computed_count(&self) -> usize {
        self.node.channels().computed_count()
    }
}

impl PartialEq for CellHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for CellHandle {}

impl std::fmt::Debug for CellHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CellHandle")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

/// Implemented by every reactive cell type.
pub trait Reactive {
    /// A type-erased handle to this cell.
    fn handle(&self) -> CellHandle;

    fn kind(&self) -> CellKind {
        self.handle().kind()
    }
}

impl Reactive for CellHandle {
    fn handle(&self) -> CellHandle {
        self.clone()
    }

    fn kind(&self) -> CellKind {
        self.node.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Trigger {
        let log = log.clone();
        Arc::new(move || log.lock().push(name))
    }

    #[test]
    fn notify_runs_channels_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let channels = Channels::new();

        let version = recorder(&log, "version");
        let effect = recorder(&log, "effect");
        let computed = recorder(&log, "computed");

        channels.add_version_setter(&version);
        channels.add_effect(&effect);
        channels.add_computed(&computed);

        channels.notify();

        assert_eq!(*log.lock(), vec!["computed", "effect", "version"]);
    }

    #[test]
    fn temporary_effects_added_by_computed_run_in_same_pass() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let channels = Channels::new();

        let forwarded = recorder(&log, "forwarded");
        let forwarding_channels = channels.clone();
        let forwarded_clone = forwarded.clone();
        let computed: Trigger = Arc::new(move || {
            forwarding_channels.add_temporary_effect(&forwarded_clone);
        });
        channels.add_computed(&computed);

        channels.notify();

        assert_eq!(*log.lock(), vec!["forwarded"]);
        assert!(channels.temporary_effects().is_empty());
    }

    #[test]
    fn effect_union_fires_each_trigger_once() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let channels = Channels::new();
        let effect = recorder(&log, "effect");

        channels.add_effect(&effect);
        channels.add_effect(&effect);
        channels.add_temporary_effect(&effect);

        channels.fire_effect_union();

        assert_eq!(*log.lock(), vec!["effect"]);
        assert_eq!(channels.effect_count(), 1);
    }

    #[test]
    fn weak_channels_forget_dropped_subscribers() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let channels = Channels::new();

        let computed = recorder(&log, "computed");
        channels.add_computed(&computed);
        assert_eq!(channels.computed_count(), 1);

        drop(computed);
        channels.fire_computed_triggers();

        assert!(log.lock().is_empty());
        assert_eq!(channels.computed_count(), 0);
    }
}
