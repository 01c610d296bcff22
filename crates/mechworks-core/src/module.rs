//! Module system: pluggable units mounted on a mechanism's chassis.
//!
//! Modules hook into the tick via the [`Module`] trait. They are attached
//! once (`on_attach`, before any update) and then updated once per tick in
//! attachment order, receiving a [`TickContext`] whose [`Port`] is their only
//! window onto telemetry, actuators and inventory. Concrete kinds are built
//! by name through the [`ModuleRegistry`](crate::registry::ModuleRegistry).

use serde::{Deserialize, Serialize};

use crate::id::{ModuleId, SlotId};
use crate::port::Port;

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// A chassis mounting point: slot family plus index within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    pub slot: String,
    pub index: u32,
}

impl Attachment {
    pub fn new(slot: impl Into<String>, index: u32) -> Self {
        Self {
            slot: slot.into(),
            index,
        }
    }

    /// The chassis slot id this attachment resolves to.
    pub fn slot_id(&self) -> SlotId {
        SlotId::mount(&self.slot, self.index)
    }
}

/// Static description of a module instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleDescriptor {
    pub id: ModuleId,
    pub title: String,
    /// Capability tags, e.g. `sensor` or `actuator`.
    #[serde(default)]
    pub provides: Vec<String>,
    pub attachment: Attachment,
    /// Capacity consumed from the ledger while mounted. Negative values add
    /// capacity.
    #[serde(default)]
    pub capacity_cost: i64,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<ModuleId>, title: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            provides: Vec::new(),
            attachment,
            capacity_cost: 0,
        }
    }

    pub fn provides(&self, capability: &str) -> bool {
        self.provides.iter().any(|c| c == capability)
    }
}

// ---------------------------------------------------------------------------
// Module trait
// ---------------------------------------------------------------------------

/// Per-tick context handed to [`Module::update`].
pub struct TickContext<'a> {
    /// The tick being simulated, starting at 1.
    pub tick: u64,
    pub port: Port<'a>,
}

/// A mounted behavior. Default `on_attach` and `update` are no-ops, so a
/// module only overrides what it uses.
pub trait Module: std::fmt::Debug {
    fn descriptor(&self) -> &ModuleDescriptor;

    fn id(&self) -> &ModuleId {
        &self.descriptor().id
    }

    /// Called exactly once when mounted, before the first `update`.
    fn on_attach(&mut self, port: &mut Port<'_>) {
        let _ = port;
    }

    /// Called once per tick. At most one actuator request per channel.
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let _ = ctx;
    }

    /// Downcast to `&dyn Any` for access to concrete module types.
    fn as_any(&self) -> &dyn std::any::Any;
}

// ===========================================================================
// Tests
// ===========================================================================
