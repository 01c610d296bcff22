//! The port through which a mounted module reads and writes, and the
//! per-tick actuator arbitration behind it.
//!
//! Modules never touch the ledger or telemetry directly. A [`Port`] borrows
//! the mechanism's telemetry, pending actuator requests and current inventory
//! snapshot for the duration of one call, so it cannot outlive its module's
//! attachment.
//!
//! Actuator requests are collected for the whole tick and resolved once,
//! after every module has run: the highest priority wins each channel, and
//! ties go to whichever request was registered first.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::id::{ChannelId, ModuleId};
use crate::snapshot::InventorySnapshot;
use crate::telemetry::{Metadata, SignalValue, TelemetrySnapshot};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// A module may submit one request per channel per tick.
    #[error("module {module} already requested {channel} this tick")]
    DuplicateRequest { module: ModuleId, channel: ChannelId },
}

// ---------------------------------------------------------------------------
// Requests and arbitration
// ---------------------------------------------------------------------------

/// One candidate command for an actuator channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActuatorRequest {
    pub module: ModuleId,
    pub channel: ChannelId,
    pub payload: SignalValue,
    pub priority: i32,
    /// Registration order within the tick. Lower registered earlier.
    pub order: u64,
}

impl ActuatorRequest {
    /// Metadata recorded in telemetry when this request wins its channel.
    pub fn action_metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        metadata.insert("module".to_string(), self.module.to_string());
        metadata.insert("priority".to_string(), self.priority.to_string());
        metadata.insert("payload".to_string(), self.payload.to_string());
        metadata
    }
}

/// Result of resolving one tick's requests.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Arbitration {
    /// The winning request per channel.
    pub commands: BTreeMap<ChannelId, ActuatorRequest>,
    /// Requests that lost, in registration order.
    pub overridden: Vec<ActuatorRequest>,
}

/// Collects actuator requests during a tick.
#[derive(Debug, Default)]
pub struct ActuatorArbiter {
    pending: Vec<ActuatorRequest>,
    next_order: u64,
}

impl ActuatorArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit(
        &mut self,
        module: &ModuleId,
        channel: ChannelId,
        payload: SignalValue,
        priority: i32,
    ) -> Result<(), PortError> {
        if self
            .pending
            .iter()
            .any(|r| &r.module == module && r.channel == channel)
        {
            return Err(PortError::DuplicateRequest {
                module: module.clone(),
                channel,
            });
        }
        self.pending.push(ActuatorRequest {
            module: module.clone(),
            channel,
            payload,
            priority,
            order: self.next_order,
        });
        self.next_order += 1;
        Ok(())
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Drop every pending request from `module` (used on detach).
    pub fn withdraw(&mut self, module: &ModuleId) {
        self.pending.retain(|r| &r.module != module);
    }

    /// Resolve all pending requests and start a fresh tick.
    pub fn resolve(&mut self) -> Arbitration {
        let mut commands: BTreeMap<ChannelId, ActuatorRequest> = BTreeMap::new();
        let mut overridden = Vec::new();

        for request in self.pending.drain(..) {
            match commands.get_mut(&request.channel) {
                None => {
                    commands.insert(request.channel.clone(), request);
                }
                // Strictly greater: an equal priority never displaces the
                // earlier registration.
                Some(current) if request.priority > current.priority => {
                    overridden.push(std::mem::replace(current, request));
                }
                Some(_) => overridden.push(request),
            }
        }

        overridden.sort_by_key(|r| r.order);
        self.next_order = 0;
        Arbitration {
            commands,
            overridden,
        }
    }
}

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// A module's view of its mechanism for the duration of one call.
pub struct Port<'a> {
    module: ModuleId,
    telemetry: &'a mut TelemetrySnapshot,
    arbiter: &'a mut ActuatorArbiter,
    inventory: &'a InventorySnapshot,
    tick: u64,
}

impl<'a> Port<'a> {
    pub fn new(
        module: ModuleId,
        telemetry: &'a mut TelemetrySnapshot,
        arbiter: &'a mut ActuatorArbiter,
        inventory: &'a InventorySnapshot,
        tick: u64,
    ) -> Self {
        Self {
            module,
            telemetry,
            arbiter,
            inventory,
            tick,
        }
    }

    pub fn module_id(&self) -> &ModuleId {
        &self.module
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Overwrite `channel`'s value, bump its revision and merge `metadata`.
    pub fn publish_value(
        &mut self,
        channel: impl Into<ChannelId>,
        value: impl Into<SignalValue>,
        metadata: Metadata,
    ) {
        self.telemetry
            .publish_value(channel.into(), value.into(), metadata);
    }

    /// The last value published on `channel`, by any module.
    pub fn get_value(&self, channel: &ChannelId) -> Option<&SignalValue> {
        self.telemetry.value(channel)
    }

    /// Register a candidate command for `channel` this tick.
    pub fn request_actuator(
        &mut self,
        channel: impl Into<ChannelId>,
        payload: impl Into<SignalValue>,
        priority: i32,
    ) -> Result<(), PortError> {
        self.arbiter
            .submit(&self.module, channel.into(), payload.into(), priority)
    }

    /// The mechanism's current inventory, read-only.
    pub fn inventory(&self) -> &InventorySnapshot {
        self.inventory
    }
}

// ===========================================================================
// Tests
// ===========================================================================
