//! One simulated mechanism: chassis mount points, an inventory ledger, the
//! modules mounted on it, and its telemetry.
//!
//! # Tick
//!
//! Each call to [`Mechanism::step`] advances one tick:
//!
//! 1. Every mounted module's `update` runs, in attachment order.
//! 2. Actuator requests collected during (1) are resolved in one pass.
//! 3. Each winning command is recorded in the telemetry `actions` map.
//!
//! Nothing a module submits in (1) is arbitrated until every module has run.

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use tracing::{debug, trace};

use crate::id::{MechanismId, ModuleId, ModuleKey, SlotId, SubscriptionId};
use crate::ledger::{InventoryLedger, LedgerError};
use crate::module::{Module, TickContext};
use crate::port::{ActuatorArbiter, ActuatorRequest, Arbitration, Port};
use crate::slot::{Slot, SlotMetadata};
use crate::snapshot::ChassisSnapshot;
use crate::store::ChassisStore;
use crate::telemetry::TelemetrySnapshot;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MechanismError {
    #[error("module {module} is already mounted")]
    DuplicateModule { module: ModuleId },

    #[error("module not found: {module}")]
    ModuleNotFound { module: ModuleId },

    #[error("mount point not found: {mount}")]
    MountNotFound { mount: SlotId },

    #[error("mount point {mount} is occupied")]
    MountOccupied { mount: SlotId },

    #[error("mount point {mount} is locked")]
    MountLocked { mount: SlotId },

    #[error("mount point {mount} requires a {required} module")]
    IncompatibleMount { mount: SlotId, required: String },

    #[error("module {module} has an out-of-range capacity cost {cost}")]
    CapacityCostOutOfRange { module: ModuleId, cost: i64 },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// Mount points
// ---------------------------------------------------------------------------

/// Definition of one chassis mounting point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountPoint {
    pub slot: String,
    pub index: u32,
    #[serde(default)]
    pub module_subtype: Option<String>,
    #[serde(default)]
    pub locked: bool,
}

impl MountPoint {
    pub fn new(slot: impl Into<String>, index: u32) -> Self {
        Self {
            slot: slot.into(),
            index,
            module_subtype: None,
            locked: false,
        }
    }

    /// Restrict this mount to modules providing `subtype`.
    pub fn accepting(mut self, subtype: impl Into<String>) -> Self {
        self.module_subtype = Some(subtype.into());
        self
    }
}

/// Build the chassis slot schema from mount points, in the order given.
pub fn chassis_schema(mounts: &[MountPoint]) -> Vec<Slot> {
    mounts
        .iter()
        .enumerate()
        .map(|(position, mount)| {
            Slot::new(
                SlotId::mount(&mount.slot, mount.index),
                position,
                SlotMetadata {
                    stackable: false,
                    module_subtype: mount.module_subtype.clone(),
                    locked: mount.locked,
                },
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tick report
// ---------------------------------------------------------------------------

/// What one tick decided.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TickReport {
    pub mechanism: MechanismId,
    pub tick: u64,
    #[serde(flatten)]
    pub arbitration: Arbitration,
}

impl TickReport {
    pub fn command(&self, channel: &str) -> Option<&ActuatorRequest> {
        self.arbitration
            .commands
            .iter()
            .find(|(id, _)| id.as_str() == channel)
            .map(|(_, request)| request)
    }
}

// ---------------------------------------------------------------------------
// Mechanism
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct Mechanism {
    id: MechanismId,
    ledger: InventoryLedger,
    mounts: Vec<Slot>,
    chassis: ChassisStore,
    modules: SlotMap<ModuleKey, Box<dyn Module>>,
    /// Attachment order; modules update in this order.
    order: Vec<ModuleKey>,
    telemetry: TelemetrySnapshot,
    arbiter: ActuatorArbiter,
    tick: u64,
}

impl Mechanism {
    pub fn new(id: impl Into<MechanismId>, ledger: InventoryLedger, mounts: &[MountPoint]) -> Self {
        let mounts = chassis_schema(mounts);
        let chassis = ChassisStore::new(ChassisSnapshot::from_slots(mounts.len() as u32, &mounts));
        Self {
            id: id.into(),
            ledger,
            mounts,
            chassis,
            modules: SlotMap::with_key(),
            order: Vec::new(),
            telemetry: TelemetrySnapshot::default(),
            arbiter: ActuatorArbiter::new(),
            tick: 0,
        }
    }

    pub fn id(&self) -> &MechanismId {
        &self.id
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn ledger(&self) -> &InventoryLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut InventoryLedger {
        &mut self.ledger
    }

    pub fn chassis(&self) -> &ChassisStore {
        &self.chassis
    }

    /// Listen for chassis snapshots. The current one is replayed first.
    pub fn subscribe_chassis(
        &mut self,
        listener: impl FnMut(&ChassisSnapshot) + 'static,
    ) -> SubscriptionId {
        self.chassis.subscribe(listener)
    }

    pub fn unsubscribe_chassis(&mut self, id: SubscriptionId) -> bool {
        self.chassis.unsubscribe(id)
    }

    pub fn telemetry(&self) -> &TelemetrySnapshot {
        &self.telemetry
    }

    pub fn module_count(&self) -> usize {
        self.order.len()
    }

    /// Mounted modules in attachment order.
    pub fn modules(&self) -> impl Iterator<Item = &dyn Module> {
        self.order
            .iter()
            .filter_map(|key| self.modules.get(*key))
            .map(|module| &**module)
    }

    pub fn module(&self, id: &ModuleId) -> Option<&dyn Module> {
        self.modules().find(|module| module.id() == id)
    }

    fn key_of(&self, id: &ModuleId) -> Option<ModuleKey> {
        self.order
            .iter()
            .copied()
            .find(|key| self.modules.get(*key).is_some_and(|m| m.id() == id))
    }

    /// Mount a module.
    ///
    /// Occupies its mount slot, registers its capacity cost with the ledger,
    /// then calls `on_attach`. Validation happens before any of that, so a
    /// rejected module leaves the mechanism unchanged.
    pub fn attach(&mut self, mut module: Box<dyn Module>) -> Result<ModuleKey, MechanismError> {
        let descriptor = module.descriptor().clone();
        if self.key_of(&descriptor.id).is_some() {
            return Err(MechanismError::DuplicateModule {
                module: descriptor.id,
            });
        }

        let mount_id = descriptor.attachment.slot_id();
        let pos = self
            .mounts
            .iter()
            .position(|slot| slot.id == mount_id)
            .ok_or_else(|| MechanismError::MountNotFound {
                mount: mount_id.clone(),
            })?;
        let mount = &self.mounts[pos];
        if mount.metadata.locked {
            return Err(MechanismError::MountLocked { mount: mount_id });
        }
        if !mount.is_empty() {
            return Err(MechanismError::MountOccupied { mount: mount_id });
        }
        if let Some(required) = &mount.metadata.module_subtype
            && !descriptor.provides(required)
        {
            return Err(MechanismError::IncompatibleMount {
                mount: mount_id,
                required: required.clone(),
            });
        }

        let source = descriptor.id.capacity_source();
        let contribution = descriptor.capacity_cost.checked_neg().ok_or_else(|| {
            MechanismError::CapacityCostOutOfRange {
                module: descriptor.id.clone(),
                cost: descriptor.capacity_cost,
            }
        })?;
        self.ledger.check_capacity_source(&source, contribution)?;

        self.mounts[pos].occupy(descriptor.id.as_occupant(), 1);
        self.ledger.register_capacity_source(source, contribution);

        let mut port = Port::new(
            descriptor.id.clone(),
            &mut self.telemetry,
            &mut self.arbiter,
            self.ledger.snapshots().current(),
            self.tick,
        );
        module.on_attach(&mut port);

        let key = self.modules.insert(module);
        self.order.push(key);
        debug!(mechanism = %self.id, module = %descriptor.id, mount = %mount_id, "module attached");
        self.publish_chassis();
        Ok(key)
    }

    /// Unmount a module and hand it back. Its mount slot is freed, its
    /// capacity contribution withdrawn and any pending requests dropped.
    pub fn detach(&mut self, id: &ModuleId) -> Result<Box<dyn Module>, MechanismError> {
        let key = self
            .key_of(id)
            .ok_or_else(|| MechanismError::ModuleNotFound { module: id.clone() })?;
        let module = self
            .modules
            .remove(key)
            .ok_or_else(|| MechanismError::ModuleNotFound { module: id.clone() })?;
        self.order.retain(|k| *k != key);

        let occupant = id.as_occupant();
        if let Some(mount) = self.mounts.iter_mut().find(|slot| slot.holds(&occupant)) {
            mount.vacate();
        }
        self.ledger.remove_capacity_source(&id.capacity_source());
        self.arbiter.withdraw(id);

        debug!(mechanism = %self.id, module = %id, "module detached");
        self.publish_chassis();
        Ok(module)
    }

    /// Advance one tick. See the module docs for the phase order.
    pub fn step(&mut self) -> TickReport {
        self.tick += 1;
        let tick = self.tick;

        for key in &self.order {
            let Some(module) = self.modules.get_mut(*key) else {
                continue;
            };
            let mut ctx = TickContext {
                tick,
                port: Port::new(
                    module.id().clone(),
                    &mut self.telemetry,
                    &mut self.arbiter,
                    self.ledger.snapshots().current(),
                    tick,
                ),
            };
            module.update(&mut ctx);
        }

        let arbitration = self.arbiter.resolve();
        for (channel, command) in &arbitration.commands {
            trace!(
                mechanism = %self.id,
                tick,
                channel = %channel,
                module = %command.module,
                priority = command.priority,
                "actuator resolved"
            );
            self.telemetry
                .record_action(channel.clone(), command.action_metadata());
        }

        TickReport {
            mechanism: self.id.clone(),
            tick,
            arbitration,
        }
    }

    fn publish_chassis(&mut self) {
        let snapshot = ChassisSnapshot::from_slots(self.mounts.len() as u32, &self.mounts);
        self.chassis.set_snapshot(snapshot);
    }
}

// ===========================================================================
// Tests
// ===========================================================================
