//! Immutable read views handed to observers.
//!
//! Snapshots are rebuilt from scratch on every mutation and never edited in
//! place. Their serialized field names and the ascending-index order of
//! `slots` are the contract rendering and UI collaborators depend on.

use serde::{Deserialize, Serialize};

use crate::id::ResourceId;
use crate::slot::Slot;

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

/// Total quantity of one occupant across all slots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub resource: ResourceId,
    pub quantity: u32,
}

/// Derived view of an inventory ledger.
///
/// `used == sum(entries.quantity) == sum(stack_count of occupied slots)`,
/// `capacity == max(declared capacity, used)` and
/// `available == capacity - used`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySnapshot {
    pub capacity: u32,
    pub used: u32,
    pub available: u32,
    pub entries: Vec<InventoryEntry>,
    pub slots: Vec<Slot>,
    pub slot_capacity: usize,
}

impl InventorySnapshot {
    /// The canonical empty inventory.
    pub const EMPTY: InventorySnapshot = InventorySnapshot {
        capacity: 0,
        used: 0,
        available: 0,
        entries: Vec::new(),
        slots: Vec::new(),
        slot_capacity: 0,
    };

    /// Build a snapshot from slot records, which may arrive in any order.
    ///
    /// `declared_capacity` is the raw sum of capacity contributions and may be
    /// negative; it is clamped to `used` from below.
    pub fn derive(slots: &[Slot], declared_capacity: i64, slot_capacity: usize) -> Self {
        let mut slots: Vec<Slot> = slots.iter().map(Slot::normalized).collect();
        slots.sort_by_key(|slot| slot.index);

        let mut entries: Vec<InventoryEntry> = Vec::new();
        for slot in &slots {
            let Some(resource) = &slot.occupant_id else {
                continue;
            };
            match entries.iter_mut().find(|e| &e.resource == resource) {
                Some(entry) => entry.quantity = entry.quantity.saturating_add(slot.stack_count),
                None => entries.push(InventoryEntry {
                    resource: resource.clone(),
                    quantity: slot.stack_count,
                }),
            }
        }

        let used = entries
            .iter()
            .fold(0u32, |acc, e| acc.saturating_add(e.quantity));
        let declared = declared_capacity.clamp(0, i64::from(u32::MAX)) as u32;
        let capacity = declared.max(used);

        Self {
            capacity,
            used,
            available: capacity - used,
            entries,
            slots,
            slot_capacity,
        }
    }

    /// Quantity of `resource` across all slots, zero if absent.
    pub fn quantity_of(&self, resource: &ResourceId) -> u32 {
        self.entries
            .iter()
            .find(|e| &e.resource == resource)
            .map(|e| e.quantity)
            .unwrap_or(0)
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.iter().find(|s| s.index == index)
    }
}

impl Default for InventorySnapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Raw inventory data pushed into an inventory store from outside the ledger.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryOverlay {
    pub capacity: i64,
    pub slots: Vec<Slot>,
    /// Defaults to the number of slots supplied.
    #[serde(default)]
    pub slot_capacity: Option<usize>,
}

// ---------------------------------------------------------------------------
// Chassis
// ---------------------------------------------------------------------------

/// Mount points of a chassis and the modules occupying them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisSnapshot {
    pub capacity: u32,
    pub slots: Vec<Slot>,
}

impl ChassisSnapshot {
    pub const EMPTY: ChassisSnapshot = ChassisSnapshot {
        capacity: 0,
        slots: Vec::new(),
    };

    pub fn from_slots(capacity: u32, slots: &[Slot]) -> Self {
        let mut slots: Vec<Slot> = slots.iter().map(Slot::normalized).collect();
        slots.sort_by_key(|slot| slot.index);
        Self { capacity, slots }
    }
}

impl Default for ChassisSnapshot {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Raw chassis data pushed into a chassis store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChassisOverlay {
    pub capacity: u32,
    pub slots: Vec<Slot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::SlotId;
    use crate::slot::{SlotMetadata, inventory_schema};

    fn scrap() -> ResourceId {
        ResourceId::from("resource.scrap")
    }

    fn ore() -> ResourceId {
        ResourceId::from("resource.ore")
    }

    #[test]
    fn derive_aggregates_across_slots() {
        let mut slots = inventory_schema(4);
        slots[0].occupy(scrap(), 3);
        slots[2].occupy(scrap(), 2);
        slots[3].occupy(ore(), 5);

        let snap = InventorySnapshot::derive(&slots, 20, 4);
        assert_eq!(snap.used, 10);
        assert_eq!(snap.quantity_of(&scrap()), 5);
        assert_eq!(snap.quantity_of(&ore()), 5);
        assert_eq!(snap.entries.len(), 2);
        assert_eq!(snap.capacity, 20);
        assert_eq!(snap.available, 10);
    }

    #[test]
    fn derive_sorts_out_of_order_slots() {
        let mut slots = inventory_schema(3);
        slots.reverse();
        let snap = InventorySnapshot::derive(&slots, 0, 3);
        let indices: Vec<usize> = snap.slots.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn capacity_never_below_used() {
        let mut slots = inventory_schema(2);
        slots[0].occupy(ore(), 9);
        let snap = InventorySnapshot::derive(&slots, 4, 2);
        assert_eq!(snap.capacity, 9);
        assert_eq!(snap.available, 0);

        let snap = InventorySnapshot::derive(&slots, -30, 2);
        assert_eq!(snap.capacity, 9);
    }

    #[test]
    fn derive_drops_stray_counts_on_empty_slots() {
        let mut slot = crate::slot::Slot::new(SlotId::inventory(0), 0, SlotMetadata::stackable());
        slot.stack_count = 4;
        let snap = InventorySnapshot::derive(&[slot], 0, 1);
        assert_eq!(snap.used, 0);
        assert_eq!(snap.slots[0].stack_count, 0);
    }

    #[test]
    fn empty_constants_match_default() {
        assert_eq!(InventorySnapshot::default(), InventorySnapshot::EMPTY);
        assert_eq!(ChassisSnapshot::default(), ChassisSnapshot::EMPTY);
    }

    #[test]
    fn inventory_snapshot_wire_names() {
        let snap = InventorySnapshot::derive(&inventory_schema(1), 5, 1);
        let json = serde_json::to_value(&snap).unwrap();
        for key in ["capacity", "used", "available", "entries", "slots", "slotCapacity"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
    }
}
