//! The slot record shared by the inventory ledger and the chassis schema.
//!
//! A [`Slot`] is one fixed, addressable cell. Slots are created once when a
//! schema is built and afterwards only mutated; their `id` and `index` never
//! change. Field names serialize in camelCase because observers consume the
//! snapshot JSON directly.

use serde::{Deserialize, Serialize};

use crate::id::{ResourceId, SlotId};

/// Per-slot flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMetadata {
    pub stackable: bool,
    #[serde(default)]
    pub module_subtype: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

impl SlotMetadata {
    /// Metadata for an ordinary inventory cell: stackable and unlocked.
    pub fn stackable() -> Self {
        Self {
            stackable: true,
            module_subtype: None,
            locked: false,
        }
    }

    /// Apply a partial update. Fields present in the patch win.
    pub fn merge(&mut self, patch: &SlotMetadataPatch) {
        if let Some(stackable) = patch.stackable {
            self.stackable = stackable;
        }
        if let Some(subtype) = &patch.module_subtype {
            self.module_subtype = subtype.clone();
        }
        if let Some(locked) = patch.locked {
            self.locked = locked;
        }
    }
}

/// A field-by-field partial update for [`SlotMetadata`].
///
/// `module_subtype` is doubly optional: `None` leaves the field alone,
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotMetadataPatch {
    #[serde(default)]
    pub stackable: Option<bool>,
    #[serde(default, with = "double_option", skip_serializing_if = "Option::is_none")]
    pub module_subtype: Option<Option<String>>,
    #[serde(default)]
    pub locked: Option<bool>,
}

impl SlotMetadataPatch {
    pub fn lock() -> Self {
        Self {
            locked: Some(true),
            ..Self::default()
        }
    }

    pub fn unlock() -> Self {
        Self {
            locked: Some(false),
            ..Self::default()
        }
    }

    /// True if the patch clears the `locked` flag.
    pub fn unlocks(&self) -> bool {
        self.locked == Some(false)
    }
}

/// One cell of a ledger or chassis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slot {
    pub id: SlotId,
    pub index: usize,
    pub occupant_id: Option<ResourceId>,
    pub metadata: SlotMetadata,
    pub stack_count: u32,
}

impl Slot {
    pub fn new(id: SlotId, index: usize, metadata: SlotMetadata) -> Self {
        Self {
            id,
            index,
            occupant_id: None,
            metadata,
            stack_count: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.occupant_id.is_none()
    }

    pub fn holds(&self, resource: &ResourceId) -> bool {
        self.occupant_id.as_ref() == Some(resource)
    }

    /// Place `quantity` units of `resource` into this slot, replacing any
    /// previous occupant.
    pub fn occupy(&mut self, resource: ResourceId, quantity: u32) {
        self.occupant_id = Some(resource);
        self.stack_count = quantity;
    }

    /// Remove the occupant. Restores `occupant_id == None => stack_count == 0`.
    pub fn vacate(&mut self) {
        self.occupant_id = None;
        self.stack_count = 0;
    }

    /// Copy of this slot with the empty-implies-zero invariant enforced.
    pub(crate) fn normalized(&self) -> Self {
        let mut slot = self.clone();
        if slot.occupant_id.is_none() {
            slot.stack_count = 0;
        }
        slot
    }
}

/// Build the default inventory schema: `count` stackable slots named
/// `inventory-0` .. `inventory-{count-1}`.
pub fn inventory_schema(count: usize) -> Vec<Slot> {
    (0..count)
        .map(|index| Slot::new(SlotId::inventory(index), index, SlotMetadata::stackable()))
        .collect()
}

mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Option<String>>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(inner) => inner.serialize(s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Option<String>>, D::Error> {
        Option::<String>::deserialize(d).map(Some)
    }
}
