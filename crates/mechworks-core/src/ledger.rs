//! Slot-based inventory ledger with transactional transfers.
//!
//! The ledger owns a fixed schema of [`Slot`]s, a set of named capacity
//! contributions, and the [`InventoryStore`] its snapshots are published
//! through. Every mutating call validates first and mutates second: it either
//! succeeds and publishes exactly one snapshot, or fails with a
//! [`LedgerError`] and leaves slots and listeners untouched.
//!
//! # Transfer resolution
//!
//! [`InventoryLedger::transfer_slot_item`] resolves, in order:
//!
//! 1. empty source -> [`LedgerError::EmptySource`]
//! 2. zero `amount` -> [`LedgerError::InvalidQuantity`]
//! 3. source == target -> [`LedgerError::SelfTransfer`]
//! 4. locked target -> [`LedgerError::LockedSlot`]
//! 5. empty target -> move the whole stack, or split off `amount` units
//! 6. same occupant on a stackable target -> merge the whole source stack
//! 7. anything else -> swap occupants and counts wholesale
//!
//! Unknown slot ids fail with [`LedgerError::NotFound`] before any of these.
//!
//! None of these create or destroy quantity; only [`InventoryLedger::store`]
//! and [`InventoryLedger::remove`] change an occupant's total.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::id::{CapacitySourceId, ResourceId, SlotId, SubscriptionId};
use crate::slot::{Slot, SlotMetadataPatch, inventory_schema};
use crate::snapshot::InventorySnapshot;
use crate::store::{ActivationHook, InventoryStore};

/// Inventory slot count used when no blueprint says otherwise.
pub const DEFAULT_SLOT_CAPACITY: usize = 12;

/// Capacity source id for the chassis base allowance.
pub const BASE_CAPACITY_SOURCE: &str = "chassis-base";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by ledger operations. A failed operation changes nothing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("slot not found: {slot}")]
    NotFound { slot: SlotId },

    #[error("slot {slot} is empty")]
    EmptySource { slot: SlotId },

    #[error("slot {slot} is locked")]
    LockedSlot { slot: SlotId },

    #[error("no eligible slot for {resource}")]
    CapacityExceeded { resource: ResourceId },

    #[error("quantity must be positive, got {quantity}")]
    InvalidQuantity { quantity: u32 },

    #[error("cannot transfer slot {slot} onto itself")]
    SelfTransfer { slot: SlotId },

    #[error("capacity source {id} would overflow the capacity total")]
    CapacityOverflow { id: CapacitySourceId },

    #[error("cannot remove {requested} of {resource}: only {available} held")]
    InsufficientQuantity {
        resource: ResourceId,
        requested: u32,
        available: u32,
    },
}

// ---------------------------------------------------------------------------
// Transfer outcome
// ---------------------------------------------------------------------------

/// What a successful transfer did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TransferOutcome {
    /// The whole source stack moved into an empty target.
    Moved { quantity: u32 },
    /// `moved` units went to an empty target; `remainder` stayed behind.
    Split { moved: u32, remainder: u32 },
    /// The source stack was folded into the target, which now holds `total`.
    Merged { moved: u32, total: u32 },
    /// Source and target exchanged occupants and counts.
    Swapped,
}

enum TransferPlan {
    Move,
    Split(u32),
    Merge,
    Swap,
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct InventoryLedger {
    /// Fixed schema, kept sorted by index.
    slots: Vec<Slot>,
    sources: BTreeMap<CapacitySourceId, i64>,
    snapshots: InventoryStore,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_CAPACITY)
    }
}

impl InventoryLedger {
    /// A ledger with `slot_capacity` default slots (`inventory-0` ..).
    pub fn new(slot_capacity: usize) -> Self {
        Self::with_schema(inventory_schema(slot_capacity))
    }

    /// A ledger over a custom schema. Slots are sorted by index and the
    /// schema is fixed from here on.
    pub fn with_schema(mut slots: Vec<Slot>) -> Self {
        slots.sort_by_key(|slot| slot.index);
        let mut ledger = Self {
            slots,
            sources: BTreeMap::new(),
            snapshots: InventoryStore::default(),
        };
        let snapshot = ledger.snapshot();
        ledger.snapshots = InventoryStore::new(snapshot);
        ledger
    }

    pub fn slot_capacity(&self) -> usize {
        self.slots.len()
    }

    // -- Capacity sources --

    /// Insert or replace a named capacity contribution. Publishes only if the
    /// derived capacity figures change.
    pub fn register_capacity_source(&mut self, source: impl Into<CapacitySourceId>, amount: i64) {
        let source = source.into();
        let before = self.snapshots.current().capacity;
        let previous = self.sources.insert(source.clone(), amount);
        debug!(source = %source, amount, ?previous, "capacity source registered");
        self.publish_if_capacity_changed(before);
    }

    /// Withdraw a contribution. Returns `false` if the id was not registered.
    pub fn remove_capacity_source(&mut self, source: &CapacitySourceId) -> bool {
        let before = self.snapshots.current().capacity;
        if self.sources.remove(source).is_none() {
            return false;
        }
        debug!(source = %source, "capacity source removed");
        self.publish_if_capacity_changed(before);
        true
    }

    /// Raw sum of all contributions (may be negative). Saturates at the
    /// `i64` bounds.
    pub fn declared_capacity(&self) -> i64 {
        clamp_total(self.sources.values().map(|amount| i128::from(*amount)).sum())
    }

    /// The declared capacity if `source` were registered with `amount`,
    /// replacing any current contribution under that id. Fails with
    /// [`LedgerError::CapacityOverflow`] if the total leaves the `i64` range.
    pub fn check_capacity_source(
        &self,
        source: &CapacitySourceId,
        amount: i64,
    ) -> Result<i64, LedgerError> {
        let total: i128 = self
            .sources
            .iter()
            .filter(|(id, _)| *id != source)
            .map(|(_, amount)| i128::from(*amount))
            .sum::<i128>()
            + i128::from(amount);
        i64::try_from(total).map_err(|_| LedgerError::CapacityOverflow { id: source.clone() })
    }

    pub fn capacity_sources(&self) -> &BTreeMap<CapacitySourceId, i64> {
        &self.sources
    }

    fn publish_if_capacity_changed(&mut self, before: u32) {
        let snapshot = self.snapshot();
        if snapshot.capacity != before {
            self.snapshots.set_snapshot(snapshot);
        }
    }

    // -- Store / remove --

    /// Add `quantity` units of `resource`.
    ///
    /// Tops up the lowest-index unlocked stackable slot already holding the
    /// resource, otherwise occupies the lowest-index unlocked empty slot.
    /// Returns the id of the slot that received the units.
    ///
    /// Exhaustion is counted in slots: a stack may grow past the declared
    /// capacity, but a resource that needs a fresh slot when none is free
    /// fails with [`LedgerError::CapacityExceeded`].
    pub fn store(&mut self, resource: &ResourceId, quantity: u32) -> Result<SlotId, LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity { quantity });
        }

        let stack = self.slots.iter().position(|slot| {
            slot.holds(resource) && slot.metadata.stackable && !slot.metadata.locked
        });

        let pos = match stack {
            Some(pos) => {
                let total = self.slots[pos]
                    .stack_count
                    .checked_add(quantity)
                    .ok_or_else(|| LedgerError::CapacityExceeded {
                        resource: resource.clone(),
                    })?;
                self.slots[pos].stack_count = total;
                pos
            }
            None => {
                let pos = self
                    .slots
                    .iter()
                    .position(|slot| slot.is_empty() && !slot.metadata.locked)
                    .ok_or_else(|| LedgerError::CapacityExceeded {
                        resource: resource.clone(),
                    })?;
                self.slots[pos].occupy(resource.clone(), quantity);
                pos
            }
        };

        let slot = self.slots[pos].id.clone();
        debug!(resource = %resource, quantity, slot = %slot, "stored");
        self.publish();
        Ok(slot)
    }

    /// Take `quantity` units of `resource` out of the ledger, draining slots
    /// in ascending index order. Fails without change if fewer are held.
    pub fn remove(&mut self, resource: &ResourceId, quantity: u32) -> Result<(), LedgerError> {
        if quantity == 0 {
            return Err(LedgerError::InvalidQuantity { quantity });
        }
        let available = self.quantity_of(resource);
        if available < quantity {
            return Err(LedgerError::InsufficientQuantity {
                resource: resource.clone(),
                requested: quantity,
                available,
            });
        }

        let mut remaining = quantity;
        for slot in self.slots.iter_mut().filter(|s| s.holds(resource)) {
            if remaining == 0 {
                break;
            }
            let taken = remaining.min(slot.stack_count);
            slot.stack_count -= taken;
            remaining -= taken;
            if slot.stack_count == 0 {
                slot.vacate();
            }
        }

        debug!(resource = %resource, quantity, "removed");
        self.publish();
        Ok(())
    }

    // -- Transfers --

    /// Move, split, merge or swap the contents of `source` onto `target`.
    ///
    /// `amount` only matters for a move into an empty target: a value below
    /// the source stack count splits the stack. Merges and swaps are always
    /// total.
    pub fn transfer_slot_item(
        &mut self,
        source: &SlotId,
        target: &SlotId,
        amount: Option<u32>,
    ) -> Result<TransferOutcome, LedgerError> {
        let si = self.position(source)?;
        let ti = self.position(target)?;
        let Some(resource) = self.slots[si].occupant_id.clone() else {
            return Err(LedgerError::EmptySource {
                slot: source.clone(),
            });
        };
        if amount == Some(0) {
            return Err(LedgerError::InvalidQuantity { quantity: 0 });
        }
        if si == ti {
            return Err(LedgerError::SelfTransfer {
                slot: source.clone(),
            });
        }

        let src = &self.slots[si];
        let tgt = &self.slots[ti];
        if tgt.metadata.locked {
            return Err(LedgerError::LockedSlot {
                slot: target.clone(),
            });
        }

        let count = src.stack_count;
        let plan = if tgt.is_empty() {
            match amount {
                Some(amount) if amount < count => TransferPlan::Split(amount),
                _ => TransferPlan::Move,
            }
        } else if tgt.holds(&resource) && tgt.metadata.stackable {
            if tgt.stack_count.checked_add(count).is_none() {
                return Err(LedgerError::CapacityExceeded { resource });
            }
            TransferPlan::Merge
        } else {
            TransferPlan::Swap
        };

        let outcome = match plan {
            TransferPlan::Move => {
                self.slots[ti].occupy(resource, count);
                self.slots[si].vacate();
                TransferOutcome::Moved { quantity: count }
            }
            TransferPlan::Split(moved) => {
                self.slots[ti].occupy(resource, moved);
                self.slots[si].stack_count = count - moved;
                TransferOutcome::Split {
                    moved,
                    remainder: count - moved,
                }
            }
            TransferPlan::Merge => {
                let total = self.slots[ti].stack_count + count;
                self.slots[ti].stack_count = total;
                self.slots[si].vacate();
                TransferOutcome::Merged {
                    moved: count,
                    total,
                }
            }
            TransferPlan::Swap => {
                self.swap_contents(si, ti);
                TransferOutcome::Swapped
            }
        };

        debug!(source = %source, target = %target, ?outcome, "transfer");
        self.publish();
        Ok(outcome)
    }

    fn swap_contents(&mut self, a: usize, b: usize) {
        let occupant_a = self.slots[a].occupant_id.take();
        let count_a = self.slots[a].stack_count;
        let occupant_b = self.slots[b].occupant_id.take();
        let count_b = self.slots[b].stack_count;

        self.slots[a].occupant_id = occupant_b;
        self.slots[a].stack_count = count_b;
        self.slots[b].occupant_id = occupant_a;
        self.slots[b].stack_count = count_a;
    }

    // -- Metadata --

    /// Merge `patch` into a slot's metadata and return the updated slot.
    ///
    /// A locked slot only accepts a patch that unlocks it.
    pub fn set_slot_metadata(
        &mut self,
        slot: &SlotId,
        patch: &SlotMetadataPatch,
    ) -> Result<Slot, LedgerError> {
        let pos = self.position(slot)?;
        if self.slots[pos].metadata.locked && !patch.unlocks() {
            return Err(LedgerError::LockedSlot { slot: slot.clone() });
        }
        self.slots[pos].metadata.merge(patch);
        let updated = self.slots[pos].clone();
        debug!(slot = %slot, ?patch, "slot metadata updated");
        self.publish();
        Ok(updated)
    }

    // -- Reads --

    pub fn slot(&self, id: &SlotId) -> Option<&Slot> {
        self.slots.iter().find(|slot| &slot.id == id)
    }

    /// Like [`slot`](Self::slot) but reports a missing id as an error.
    pub fn get_slot(&self, id: &SlotId) -> Result<&Slot, LedgerError> {
        self.slot(id)
            .ok_or_else(|| LedgerError::NotFound { slot: id.clone() })
    }

    pub fn quantity_of(&self, resource: &ResourceId) -> u32 {
        self.slots
            .iter()
            .filter(|slot| slot.holds(resource))
            .fold(0u32, |acc, slot| acc.saturating_add(slot.stack_count))
    }

    /// A freshly derived snapshot of the current state.
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot::derive(&self.slots, self.declared_capacity(), self.slots.len())
    }

    /// A copy of the slot schema, sorted by index.
    pub fn slot_schema_snapshot(&self) -> Vec<Slot> {
        self.slots.clone()
    }

    /// The store this ledger publishes through.
    pub fn snapshots(&self) -> &InventoryStore {
        &self.snapshots
    }

    /// Listen for published snapshots. The current one is replayed first.
    pub fn subscribe(
        &mut self,
        listener: impl FnMut(&InventorySnapshot) + 'static,
    ) -> SubscriptionId {
        self.snapshots.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.snapshots.unsubscribe(id)
    }

    /// See [`SnapshotStore::set_activation_handlers`](crate::store::SnapshotStore::set_activation_handlers).
    pub fn set_activation_handlers(
        &mut self,
        on_active: Option<ActivationHook>,
        on_inactive: Option<ActivationHook>,
    ) {
        self.snapshots.set_activation_handlers(on_active, on_inactive);
    }

    fn position(&self, id: &SlotId) -> Result<usize, LedgerError> {
        self.slots
            .iter()
            .position(|slot| &slot.id == id)
            .ok_or_else(|| LedgerError::NotFound { slot: id.clone() })
    }

    fn publish(&mut self) {
        let snapshot = self.snapshot();
        self.snapshots.set_snapshot(snapshot);
    }
}

fn clamp_total(total: i128) -> i64 {
    total.clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn scrap() -> ResourceId {
        ResourceId::from("resource.scrap")
    }

    fn ore() -> ResourceId {
        ResourceId::from("resource.ore")
    }

    fn slot(i: usize) -> SlotId {
        SlotId::inventory(i)
    }

    /// Count snapshots published after the replay-on-subscribe delivery.
    fn publish_counter(ledger: &mut InventoryLedger) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0));
        let c = Rc::clone(&count);
        ledger.subscribe(move |_| c.set(c.get() + 1));
        count.set(0);
        count
    }

    // -----------------------------------------------------------------------
    // store
    // -----------------------------------------------------------------------

    #[test]
    fn store_twice_stacks_into_one_entry() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&scrap(), 5).unwrap();
        ledger.store(&scrap(), 3).unwrap();

        let snap = ledger.snapshot();
        assert_eq!(snap.entries.len(), 1);
        assert_eq!(snap.entries[0].resource, scrap());
        assert_eq!(snap.entries[0].quantity, 8);
        assert_eq!(ledger.slot(&slot(0)).unwrap().stack_count, 8);
    }

    #[test]
    fn store_uses_lowest_unlocked_empty_slot() {
        let mut ledger = InventoryLedger::new(3);
        ledger
            .set_slot_metadata(&slot(0), &SlotMetadataPatch::lock())
            .unwrap();
        let placed = ledger.store(&ore(), 2).unwrap();
        assert_eq!(placed, slot(1));
    }

    #[test]
    fn store_skips_non_stackable_match() {
        let mut ledger = InventoryLedger::new(2);
        ledger.store(&ore(), 1).unwrap();
        ledger
            .set_slot_metadata(
                &slot(0),
                &SlotMetadataPatch {
                    stackable: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let placed = ledger.store(&ore(), 1).unwrap();
        assert_eq!(placed, slot(1));
        assert_eq!(ledger.quantity_of(&ore()), 2);
    }

    #[test]
    fn store_without_eligible_slot_is_capacity_exceeded() {
        // An exhausted ledger fails loudly rather than dropping the store.
        let mut ledger = InventoryLedger::new(1);
        ledger.store(&ore(), 1).unwrap();
        let counter = publish_counter(&mut ledger);

        let err = ledger.store(&scrap(), 1).unwrap_err();
        assert_eq!(err, LedgerError::CapacityExceeded { resource: scrap() });
        assert_eq!(counter.get(), 0);
        assert_eq!(ledger.quantity_of(&scrap()), 0);
    }

    #[test]
    fn store_is_bounded_by_slot_count_not_capacity() {
        let mut ledger = InventoryLedger::new(2);
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, 3);

        // One stack may outgrow the declared capacity.
        ledger.store(&ore(), 50).unwrap();
        assert_eq!(ledger.snapshot().capacity, 50);
        ledger.store(&scrap(), 1).unwrap();

        let err = ledger.store(&ResourceId::from("resource.ice"), 1).unwrap_err();
        assert_eq!(
            err,
            LedgerError::CapacityExceeded {
                resource: ResourceId::from("resource.ice")
            }
        );
        ledger.store(&ore(), 1).unwrap();
        assert_eq!(ledger.snapshot().used, 52);
    }

    #[test]
    fn store_zero_is_rejected() {
        let mut ledger = InventoryLedger::default();
        assert_eq!(
            ledger.store(&ore(), 0),
            Err(LedgerError::InvalidQuantity { quantity: 0 })
        );
    }

    #[test]
    fn store_emits_one_snapshot() {
        let mut ledger = InventoryLedger::default();
        let counter = publish_counter(&mut ledger);
        ledger.store(&ore(), 4).unwrap();
        assert_eq!(counter.get(), 1);
        assert_eq!(ledger.snapshots().current().used, 4);
    }

    // -----------------------------------------------------------------------
    // remove
    // -----------------------------------------------------------------------

    #[test]
    fn remove_drains_in_index_order() {
        let mut ledger = InventoryLedger::new(3);
        ledger.store(&scrap(), 4).unwrap();
        ledger
            .transfer_slot_item(&slot(0), &slot(2), Some(1))
            .unwrap();
        ledger.remove(&scrap(), 3).unwrap();

        assert!(ledger.slot(&slot(0)).unwrap().is_empty());
        assert_eq!(ledger.slot(&slot(2)).unwrap().stack_count, 1);
        assert_eq!(ledger.quantity_of(&scrap()), 1);
    }

    #[test]
    fn remove_more_than_held_changes_nothing() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&scrap(), 2).unwrap();
        let counter = publish_counter(&mut ledger);
        let err = ledger.remove(&scrap(), 5).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientQuantity {
                requested: 5,
                available: 2,
                ..
            }
        ));
        assert_eq!(ledger.quantity_of(&scrap()), 2);
        assert_eq!(counter.get(), 0);
    }

    // -----------------------------------------------------------------------
    // transfer_slot_item
    // -----------------------------------------------------------------------

    #[test]
    fn transfer_from_empty_source_fails_silently() {
        let mut ledger = InventoryLedger::default();
        let counter = publish_counter(&mut ledger);
        let err = ledger
            .transfer_slot_item(&slot(0), &slot(1), None)
            .unwrap_err();
        assert_eq!(err, LedgerError::EmptySource { slot: slot(0) });
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn empty_source_is_reported_before_other_checks() {
        let mut ledger = InventoryLedger::default();
        let counter = publish_counter(&mut ledger);
        assert_eq!(
            ledger.transfer_slot_item(&slot(0), &slot(0), None),
            Err(LedgerError::EmptySource { slot: slot(0) })
        );
        assert_eq!(
            ledger.transfer_slot_item(&slot(0), &slot(1), Some(0)),
            Err(LedgerError::EmptySource { slot: slot(0) })
        );
        assert_eq!(counter.get(), 0);
    }

    #[test]
    fn transfer_into_locked_target_fails() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&ore(), 3).unwrap();
        ledger
            .set_slot_metadata(&slot(1), &SlotMetadataPatch::lock())
            .unwrap();
        let before = ledger.snapshot();
        let err = ledger
            .transfer_slot_item(&slot(0), &slot(1), None)
            .unwrap_err();
        assert_eq!(err, LedgerError::LockedSlot { slot: slot(1) });
        assert_eq!(ledger.snapshot(), before);
    }

    #[test]
    fn transfer_unknown_slot_is_not_found() {
        let mut ledger = InventoryLedger::new(2);
        let err = ledger
            .transfer_slot_item(&slot(0), &SlotId::from("inventory-99"), None)
            .unwrap_err();
        assert!(matches!(err, LedgerError::NotFound { .. }));
    }

    #[test]
    fn transfer_onto_itself_is_rejected() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&ore(), 3).unwrap();
        let err = ledger
            .transfer_slot_item(&slot(0), &slot(0), None)
            .unwrap_err();
        assert_eq!(err, LedgerError::SelfTransfer { slot: slot(0) });
        assert_eq!(ledger.quantity_of(&ore()), 3);
    }

    #[test]
    fn move_whole_stack_when_amount_omitted_or_large() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&ore(), 3).unwrap();
        let outcome = ledger
            .transfer_slot_item(&slot(0), &slot(4), Some(10))
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Moved { quantity: 3 });
        assert!(ledger.slot(&slot(0)).unwrap().is_empty());
        assert_eq!(ledger.slot(&slot(4)).unwrap().stack_count, 3);
    }

    #[test]
    fn split_then_merge_restores_distribution() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&scrap(), 6).unwrap();
        let before = ledger.slot_schema_snapshot();

        let split = ledger
            .transfer_slot_item(&slot(0), &slot(3), Some(2))
            .unwrap();
        assert_eq!(
            split,
            TransferOutcome::Split {
                moved: 2,
                remainder: 4
            }
        );
        let merged = ledger.transfer_slot_item(&slot(3), &slot(0), None).unwrap();
        assert_eq!(merged, TransferOutcome::Merged { moved: 2, total: 6 });
        assert_eq!(ledger.slot_schema_snapshot(), before);
    }

    #[test]
    fn merge_ignores_partial_amount() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&scrap(), 5).unwrap();
        ledger
            .transfer_slot_item(&slot(0), &slot(1), Some(2))
            .unwrap();
        let outcome = ledger
            .transfer_slot_item(&slot(0), &slot(1), Some(1))
            .unwrap();
        assert_eq!(outcome, TransferOutcome::Merged { moved: 3, total: 5 });
        assert!(ledger.slot(&slot(0)).unwrap().is_empty());
    }

    #[test]
    fn non_stackable_same_occupant_swaps() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&scrap(), 5).unwrap();
        ledger
            .transfer_slot_item(&slot(0), &slot(1), Some(2))
            .unwrap();
        ledger
            .set_slot_metadata(
                &slot(1),
                &SlotMetadataPatch {
                    stackable: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        let outcome = ledger.transfer_slot_item(&slot(0), &slot(1), None).unwrap();
        assert_eq!(outcome, TransferOutcome::Swapped);
        assert_eq!(ledger.slot(&slot(0)).unwrap().stack_count, 2);
        assert_eq!(ledger.slot(&slot(1)).unwrap().stack_count, 3);
    }

    #[test]
    fn swap_exchanges_occupants_and_counts() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&scrap(), 6).unwrap();
        ledger.store(&ore(), 4).unwrap();
        let counter = publish_counter(&mut ledger);

        let outcome = ledger.transfer_slot_item(&slot(0), &slot(1), Some(1)).unwrap();
        assert_eq!(outcome, TransferOutcome::Swapped);
        assert_eq!(counter.get(), 1);

        let a = ledger.slot(&slot(0)).unwrap();
        let b = ledger.slot(&slot(1)).unwrap();
        assert_eq!(a.occupant_id, Some(ore()));
        assert_eq!(a.stack_count, 4);
        assert_eq!(b.occupant_id, Some(scrap()));
        assert_eq!(b.stack_count, 6);
    }

    #[test]
    fn transfer_status_serializes_lowercase() {
        let json = serde_json::to_value(TransferOutcome::Split {
            moved: 2,
            remainder: 4,
        })
        .unwrap();
        assert_eq!(json["status"], "split");
        assert_eq!(json["moved"], 2);
        assert_eq!(json["remainder"], 4);
    }

    // -----------------------------------------------------------------------
    // Capacity sources
    // -----------------------------------------------------------------------

    #[test]
    fn capacity_sources_upsert_not_accumulate() {
        let mut ledger = InventoryLedger::default();
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, 20);
        ledger.register_capacity_source("module:cargo", 6);
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, 10);
        assert_eq!(ledger.declared_capacity(), 16);
        assert_eq!(ledger.snapshot().capacity, 16);
    }

    #[test]
    fn capacity_registration_publishes_only_on_change() {
        let mut ledger = InventoryLedger::default();
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, 20);
        let counter = publish_counter(&mut ledger);

        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, 20);
        assert_eq!(counter.get(), 0);

        ledger.register_capacity_source("test-override", 5);
        assert_eq!(counter.get(), 1);
        assert_eq!(ledger.snapshots().current().capacity, 25);
    }

    #[test]
    fn capacity_never_drops_below_used() {
        let mut ledger = InventoryLedger::default();
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, 4);
        ledger.store(&ore(), 9).unwrap();
        let snap = ledger.snapshot();
        assert_eq!(snap.capacity, 9);
        assert_eq!(snap.available, 0);
    }

    #[test]
    fn declared_capacity_saturates() {
        let mut ledger = InventoryLedger::default();
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, i64::MAX);
        ledger.register_capacity_source("module:pod", 6);
        assert_eq!(ledger.declared_capacity(), i64::MAX);
        assert_eq!(ledger.snapshot().capacity, u32::MAX);

        ledger.register_capacity_source("module:drain", i64::MIN);
        assert_eq!(ledger.declared_capacity(), 5);
    }

    #[test]
    fn check_capacity_source_rejects_overflow() {
        let mut ledger = InventoryLedger::default();
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, i64::MAX);
        let pod = CapacitySourceId::from("module:pod");

        assert_eq!(ledger.check_capacity_source(&pod, -6), Ok(i64::MAX - 6));
        assert_eq!(
            ledger.check_capacity_source(&pod, 6),
            Err(LedgerError::CapacityOverflow { id: pod.clone() })
        );
        // Replacing the base itself does not count the old amount.
        let base = CapacitySourceId::from(BASE_CAPACITY_SOURCE);
        assert_eq!(ledger.check_capacity_source(&base, 10), Ok(10));
    }

    #[test]
    fn ledger_subscription_replays_and_fires_hooks() {
        let mut ledger = InventoryLedger::new(2);
        let active = Rc::new(Cell::new(0));
        let (on, off) = (Rc::clone(&active), Rc::clone(&active));
        let on_active: ActivationHook = Box::new(move || on.set(on.get() + 1));
        let on_inactive: ActivationHook = Box::new(move || off.set(off.get() - 1));
        ledger.set_activation_handlers(Some(on_active), Some(on_inactive));

        let seen = Rc::new(Cell::new(0u32));
        let sink = Rc::clone(&seen);
        let id = ledger.subscribe(move |snap| sink.set(snap.used));
        assert_eq!(active.get(), 1);
        ledger.store(&ore(), 3).unwrap();
        assert_eq!(seen.get(), 3);

        assert!(ledger.unsubscribe(id));
        assert_eq!(active.get(), 0);
        ledger.store(&ore(), 1).unwrap();
        assert_eq!(seen.get(), 3);
    }

    #[test]
    fn remove_capacity_source_withdraws_contribution() {
        let mut ledger = InventoryLedger::default();
        ledger.register_capacity_source(BASE_CAPACITY_SOURCE, 10);
        ledger.register_capacity_source("module:drive", -3);
        assert_eq!(ledger.snapshot().capacity, 7);
        assert!(ledger.remove_capacity_source(&CapacitySourceId::from("module:drive")));
        assert_eq!(ledger.snapshots().current().capacity, 10);
        assert!(!ledger.remove_capacity_source(&CapacitySourceId::from("module:drive")));
    }

    // -----------------------------------------------------------------------
    // Metadata
    // -----------------------------------------------------------------------

    #[test]
    fn set_metadata_unknown_slot_is_not_found() {
        let mut ledger = InventoryLedger::default();
        let err = ledger
            .set_slot_metadata(&SlotId::from("nope"), &SlotMetadataPatch::lock())
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::NotFound {
                slot: SlotId::from("nope")
            }
        );
    }

    #[test]
    fn locked_slot_only_accepts_unlock() {
        let mut ledger = InventoryLedger::default();
        ledger
            .set_slot_metadata(&slot(2), &SlotMetadataPatch::lock())
            .unwrap();
        let err = ledger
            .set_slot_metadata(
                &slot(2),
                &SlotMetadataPatch {
                    stackable: Some(false),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::LockedSlot { slot: slot(2) });

        let updated = ledger
            .set_slot_metadata(&slot(2), &SlotMetadataPatch::unlock())
            .unwrap();
        assert!(!updated.metadata.locked);
        assert!(updated.metadata.stackable);
    }

    #[test]
    fn old_snapshot_is_not_changed_by_later_mutation() {
        let mut ledger = InventoryLedger::default();
        ledger.store(&ore(), 2).unwrap();
        let held = ledger.snapshots().current().clone();
        ledger.store(&ore(), 2).unwrap();
        assert_eq!(held.used, 2);
        assert_eq!(ledger.snapshots().current().used, 4);
    }

    #[test]
    fn get_slot_reports_missing_id() {
        let ledger = InventoryLedger::new(1);
        assert!(ledger.get_slot(&slot(0)).is_ok());
        assert!(matches!(
            ledger.get_slot(&slot(1)),
            Err(LedgerError::NotFound { .. })
        ));
    }
}
