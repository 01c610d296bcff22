//! Listener-driven distribution of immutable snapshots.
//!
//! A [`SnapshotStore`] holds exactly one current snapshot and an ordered list
//! of listeners. Subscribing replays the current snapshot synchronously, so a
//! late observer never misses state. Optional activation hooks fire when the
//! listener count crosses the 0/1 boundary, which lets an expensive producer
//! run only while something is watching.
//!
//! Listeners receive `&S`; the store is borrowed mutably for the whole
//! notification pass, so a listener cannot re-enter the store it observes.

use crate::id::SubscriptionId;
use crate::snapshot::{ChassisOverlay, ChassisSnapshot, InventoryOverlay, InventorySnapshot};

/// A subscriber callback.
pub type Listener<S> = Box<dyn FnMut(&S)>;

/// Called on an idle/observed transition.
pub type ActivationHook = Box<dyn FnMut()>;

/// Store for inventory snapshots.
pub type InventoryStore = SnapshotStore<InventorySnapshot>;

/// Store for chassis snapshots.
pub type ChassisStore = SnapshotStore<ChassisSnapshot>;

pub struct SnapshotStore<S> {
    snapshot: S,
    /// Registration order is notification order.
    listeners: Vec<(SubscriptionId, Listener<S>)>,
    on_active: Option<ActivationHook>,
    on_inactive: Option<ActivationHook>,
    next_subscription: u64,
}

impl<S: std::fmt::Debug> std::fmt::Debug for SnapshotStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("snapshot", &self.snapshot)
            .field("listeners", &self.listeners.len())
            .field("on_active", &self.on_active.is_some())
            .field("on_inactive", &self.on_inactive.is_some())
            .finish()
    }
}

impl<S: Default> Default for SnapshotStore<S> {
    fn default() -> Self {
        Self::new(S::default())
    }
}

impl<S> SnapshotStore<S> {
    /// Create a store holding `snapshot` with no listeners.
    pub fn new(snapshot: S) -> Self {
        Self {
            snapshot,
            listeners: Vec::new(),
            on_active: None,
            on_inactive: None,
            next_subscription: 0,
        }
    }

    /// The current snapshot.
    pub fn current(&self) -> &S {
        &self.snapshot
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Whether at least one listener is attached.
    pub fn is_observed(&self) -> bool {
        !self.listeners.is_empty()
    }

    /// Add a listener. The current snapshot is delivered to it before this
    /// returns. Fires `on_active` if this is the first listener.
    pub fn subscribe(&mut self, listener: impl FnMut(&S) + 'static) -> SubscriptionId {
        let mut listener: Listener<S> = Box::new(listener);
        listener(&self.snapshot);

        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;

        let was_idle = self.listeners.is_empty();
        self.listeners.push((id, listener));
        if was_idle && let Some(hook) = self.on_active.as_mut() {
            hook();
        }
        id
    }

    /// Remove a listener. Fires `on_inactive` if it was the last one.
    /// Returns `false` if the id was unknown or already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let Some(pos) = self.listeners.iter().position(|(sid, _)| *sid == id) else {
            return false;
        };
        self.listeners.remove(pos);
        if self.listeners.is_empty()
            && let Some(hook) = self.on_inactive.as_mut()
        {
            hook();
        }
        true
    }

    /// Install activation hooks, replacing any previous ones. If listeners
    /// already exist, `on_active` fires immediately.
    pub fn set_activation_handlers(
        &mut self,
        on_active: Option<ActivationHook>,
        on_inactive: Option<ActivationHook>,
    ) {
        self.on_active = on_active;
        self.on_inactive = on_inactive;
        if !self.listeners.is_empty()
            && let Some(hook) = self.on_active.as_mut()
        {
            hook();
        }
    }

    /// Replace the snapshot and notify every listener in registration order.
    pub fn set_snapshot(&mut self, snapshot: S) {
        self.snapshot = snapshot;
        for (_, listener) in &mut self.listeners {
            listener(&self.snapshot);
        }
    }

    /// Notify listeners with `snapshot` without making it current.
    pub(crate) fn broadcast(&mut self, snapshot: &S) {
        for (_, listener) in &mut self.listeners {
            listener(snapshot);
        }
    }
}

impl<S: Default> SnapshotStore<S> {
    /// Reset to the canonical empty snapshot and notify.
    pub fn clear(&mut self) {
        self.set_snapshot(S::default());
    }
}

impl SnapshotStore<InventorySnapshot> {
    /// Replace the snapshot from raw slot data. Slots are copied, sorted by
    /// index and re-aggregated before publishing.
    pub fn apply_overlay_update(&mut self, update: &InventoryOverlay) {
        let slot_capacity = update.slot_capacity.unwrap_or(update.slots.len());
        let snapshot = InventorySnapshot::derive(&update.slots, update.capacity, slot_capacity);
        self.set_snapshot(snapshot);
    }
}

impl SnapshotStore<ChassisSnapshot> {
    /// Replace the snapshot from raw mount data. Slots are copied and sorted
    /// by index; nothing is aggregated.
    pub fn apply_overlay_update(&mut self, update: &ChassisOverlay) {
        self.set_snapshot(ChassisSnapshot::from_slots(update.capacity, &update.slots));
    }
}

// ===========================================================================
// Tests
// ===========================================================================
