//! The simulation context: every mechanism, the shared telemetry cache and
//! the module registry, owned in one place and passed explicitly.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::id::{MechanismId, ModuleKey};
use crate::mechanism::{Mechanism, MechanismError, TickReport};
use crate::module::ModuleDescriptor;
use crate::registry::{ModuleRegistry, RegistryError};
use crate::telemetry::{TelemetryCache, TelemetrySnapshot};

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("unknown mechanism: {0}")]
    UnknownMechanism(MechanismId),

    #[error("mechanism {0} already exists")]
    DuplicateMechanism(MechanismId),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Mechanism(#[from] MechanismError),
}

#[derive(Debug, Default)]
pub struct Simulation {
    mechanisms: BTreeMap<MechanismId, Mechanism>,
    telemetry: TelemetryCache,
    registry: ModuleRegistry,
}

impl Simulation {
    pub fn new(registry: ModuleRegistry) -> Self {
        Self {
            mechanisms: BTreeMap::new(),
            telemetry: TelemetryCache::new(),
            registry,
        }
    }

    /// A simulation with the built-in module kinds registered.
    pub fn with_builtins() -> Self {
        Self::new(ModuleRegistry::with_builtins())
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn telemetry(&self) -> &TelemetryCache {
        &self.telemetry
    }

    pub fn telemetry_mut(&mut self) -> &mut TelemetryCache {
        &mut self.telemetry
    }

    pub fn mechanism(&self, id: &MechanismId) -> Option<&Mechanism> {
        self.mechanisms.get(id)
    }

    pub fn mechanism_mut(&mut self, id: &MechanismId) -> Option<&mut Mechanism> {
        self.mechanisms.get_mut(id)
    }

    pub fn mechanism_ids(&self) -> impl Iterator<Item = &MechanismId> {
        self.mechanisms.keys()
    }

    pub fn add_mechanism(&mut self, mechanism: Mechanism) -> Result<(), SimulationError> {
        let id = mechanism.id().clone();
        if self.mechanisms.contains_key(&id) {
            return Err(SimulationError::DuplicateMechanism(id));
        }
        info!(mechanism = %id, "mechanism added");
        self.mechanisms.insert(id, mechanism);
        Ok(())
    }

    /// Remove a mechanism. Its last telemetry stays in the cache.
    pub fn remove_mechanism(&mut self, id: &MechanismId) -> Option<Mechanism> {
        let removed = self.mechanisms.remove(id);
        if removed.is_some() {
            info!(mechanism = %id, "mechanism removed");
        }
        removed
    }

    /// Build a module of `kind` through the registry and mount it.
    pub fn attach_module(
        &mut self,
        mechanism: &MechanismId,
        kind: &str,
        descriptor: ModuleDescriptor,
        params: &serde_json::Value,
    ) -> Result<ModuleKey, SimulationError> {
        let mech = self
            .mechanisms
            .get_mut(mechanism)
            .ok_or_else(|| SimulationError::UnknownMechanism(mechanism.clone()))?;
        let module = self.registry.build(kind, descriptor, params)?;
        let key = mech.attach(module)?;
        self.push_telemetry(mechanism);
        Ok(key)
    }

    /// Advance one mechanism a tick and push its telemetry to the cache.
    pub fn step(&mut self, id: &MechanismId) -> Result<TickReport, SimulationError> {
        let report = self
            .mechanisms
            .get_mut(id)
            .ok_or_else(|| SimulationError::UnknownMechanism(id.clone()))?
            .step();
        self.push_telemetry(id);
        Ok(report)
    }

    /// Advance every mechanism one tick, in id order.
    pub fn step_all(&mut self) -> Vec<TickReport> {
        let ids: Vec<MechanismId> = self.mechanisms.keys().cloned().collect();
        let mut reports = Vec::with_capacity(ids.len());
        for id in &ids {
            if let Some(mech) = self.mechanisms.get_mut(id) {
                reports.push(mech.step());
                self.push_telemetry(id);
            }
        }
        reports
    }

    /// Make `id` the active mechanism. The cached snapshot is used if one
    /// exists, otherwise the mechanism's live telemetry is fetched.
    pub fn activate(&mut self, id: &MechanismId) -> Result<&TelemetrySnapshot, SimulationError> {
        let mechanisms = &self.mechanisms;
        self.telemetry.try_activate_mechanism(id, |id| {
            mechanisms
                .get(id)
                .map(|mech| mech.telemetry().clone())
                .ok_or_else(|| SimulationError::UnknownMechanism(id.clone()))
        })
    }

    fn push_telemetry(&mut self, id: &MechanismId) {
        let Some(mech) = self.mechanisms.get(id) else {
            return;
        };
        let snapshot = mech.telemetry().clone();
        if self.telemetry.active() == Some(id) {
            self.telemetry.set_active_snapshot(snapshot, id.clone());
        } else {
            debug!(mechanism = %id, "telemetry cached for inactive mechanism");
            self.telemetry.store_snapshot(snapshot, id.clone());
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
