//! Turns blueprints into live mechanisms.

use std::collections::BTreeSet;
use std::path::Path;

use mechworks_core::id::{ResourceId, SlotId};
use mechworks_core::ledger::{BASE_CAPACITY_SOURCE, InventoryLedger};
use mechworks_core::mechanism::Mechanism;
use mechworks_core::module::{Attachment, ModuleDescriptor};
use mechworks_core::registry::ModuleRegistry;
use mechworks_core::simulation::Simulation;
use tracing::info;

use crate::loader::{DataLoadError, load_blueprint, load_blueprint_dir};
use crate::schema::{MechanismBlueprint, ModuleData};

/// Build a mechanism from `blueprint`, creating its modules through
/// `registry`.
///
/// The ledger is sized and given its base capacity first, then stocked,
/// then each module is attached in declaration order.
pub fn build_mechanism(
    blueprint: &MechanismBlueprint,
    registry: &ModuleRegistry,
) -> Result<Mechanism, DataLoadError> {
    validate(blueprint)?;

    let mut ledger = InventoryLedger::new(blueprint.slot_capacity);
    ledger.register_capacity_source(BASE_CAPACITY_SOURCE, blueprint.base_capacity);
    for stock in &blueprint.inventory {
        ledger.store(&ResourceId::new(stock.resource.as_str()), stock.quantity)?;
    }

    let mut mechanism = Mechanism::new(blueprint.id.as_str(), ledger, &blueprint.mounts);
    for module in &blueprint.modules {
        let built = registry.build(&module.kind, descriptor(module), &module.params)?;
        mechanism.attach(built)?;
    }

    info!(
        mechanism = %blueprint.id,
        modules = blueprint.modules.len(),
        mounts = blueprint.mounts.len(),
        "mechanism built"
    );
    Ok(mechanism)
}

/// Load and build a single blueprint file.
pub fn load_mechanism(path: &Path, registry: &ModuleRegistry) -> Result<Mechanism, DataLoadError> {
    build_mechanism(&load_blueprint(path)?, registry)
}

/// Build every blueprint in `dir` into a simulation using `registry`.
pub fn load_simulation(dir: &Path, registry: ModuleRegistry) -> Result<Simulation, DataLoadError> {
    let blueprints = load_blueprint_dir(dir)?;
    let mut simulation = Simulation::new(registry);
    for blueprint in &blueprints {
        let mechanism = build_mechanism(blueprint, simulation.registry())?;
        simulation.add_mechanism(mechanism)?;
    }
    Ok(simulation)
}

fn descriptor(module: &ModuleData) -> ModuleDescriptor {
    let title = module.title.clone().unwrap_or_else(|| module.id.clone());
    let mut descriptor = ModuleDescriptor::new(
        module.id.as_str(),
        title,
        Attachment::new(module.mount.slot.as_str(), module.mount.index),
    );
    descriptor.provides = module.provides.clone();
    descriptor.capacity_cost = module.capacity_cost;
    descriptor
}

/// Checks that need the whole blueprint rather than one module at a time.
fn validate(blueprint: &MechanismBlueprint) -> Result<(), DataLoadError> {
    let invalid = |detail: String| DataLoadError::Invalid {
        blueprint: blueprint.id.clone(),
        detail,
    };

    if blueprint.id.is_empty() {
        return Err(invalid("id is empty".into()));
    }
    if blueprint.slot_capacity == 0 {
        return Err(invalid("slot_capacity must be at least 1".into()));
    }

    let mut mounts = BTreeSet::new();
    for mount in &blueprint.mounts {
        let id = SlotId::mount(&mount.slot, mount.index);
        if !mounts.insert(id.clone()) {
            return Err(invalid(format!("duplicate mount point {id}")));
        }
    }

    if let Some(stock) = blueprint.inventory.iter().find(|s| s.quantity == 0) {
        return Err(invalid(format!("zero quantity for {}", stock.resource)));
    }
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================
