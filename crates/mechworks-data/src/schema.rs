//! Serde data file structs for mechanism blueprints.
//!
//! A blueprint describes one mechanism: its inventory size and base capacity,
//! its chassis mount points, the modules mounted on them, and the stock the
//! ledger starts with. Blueprints are deserialized from RON, JSON, or TOML
//! and turned into a live mechanism by the builder.

use mechworks_core::ledger::DEFAULT_SLOT_CAPACITY;
use mechworks_core::mechanism::MountPoint;
use serde::Deserialize;

/// Base capacity used when a blueprint does not set one.
pub const DEFAULT_BASE_CAPACITY: i64 = 24;

fn default_slot_capacity() -> usize {
    DEFAULT_SLOT_CAPACITY
}

fn default_base_capacity() -> i64 {
    DEFAULT_BASE_CAPACITY
}

// ===========================================================================
// Blueprint
// ===========================================================================

/// One mechanism definition.
#[derive(Debug, Clone, Deserialize)]
pub struct MechanismBlueprint {
    pub id: String,
    #[serde(default = "default_slot_capacity")]
    pub slot_capacity: usize,
    #[serde(default = "default_base_capacity")]
    pub base_capacity: i64,
    #[serde(default)]
    pub mounts: Vec<MountPoint>,
    #[serde(default)]
    pub modules: Vec<ModuleData>,
    #[serde(default)]
    pub inventory: Vec<StockData>,
}

// ===========================================================================
// Modules
// ===========================================================================

/// A module to build through the registry and mount.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleData {
    /// Registry kind, e.g. `"drive"`.
    pub kind: String,
    pub id: String,
    /// Display title. Falls back to the id.
    #[serde(default)]
    pub title: Option<String>,
    pub mount: MountRef,
    /// Capability tags. Built-in kinds add their own default when empty.
    #[serde(default)]
    pub provides: Vec<String>,
    /// Ledger capacity this module consumes. Negative adds capacity.
    #[serde(default)]
    pub capacity_cost: i64,
    /// Kind-specific parameters, passed to the factory as-is.
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Reference to a mount point by slot name and index.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MountRef {
    pub slot: String,
    pub index: u32,
}

// ===========================================================================
// Inventory
// ===========================================================================

/// Initial stock, stored in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StockData {
    pub resource: String,
    pub quantity: u32,
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_blueprint_uses_defaults() {
        let blueprint: MechanismBlueprint = serde_json::from_str(r#"{ "id": "probe" }"#).unwrap();
        assert_eq!(blueprint.slot_capacity, 12);
        assert_eq!(blueprint.base_capacity, 24);
        assert!(blueprint.mounts.is_empty());
        assert!(blueprint.modules.is_empty());
        assert!(blueprint.inventory.is_empty());
    }

    #[test]
    fn module_params_keep_their_shape() {
        let module: ModuleData = serde_json::from_str(
            r#"{
                "kind": "drive",
                "id": "main-drive",
                "mount": { "slot": "drive-bay", "index": 0 },
                "params": { "priority": 4, "throttle_channel": "throttle" }
            }"#,
        )
        .unwrap();
        assert_eq!(module.title, None);
        assert_eq!(module.capacity_cost, 0);
        assert_eq!(module.params["priority"], 4);
        assert_eq!(module.params["throttle_channel"], "throttle");
    }

    #[test]
    fn missing_params_are_null() {
        let module: ModuleData = serde_json::from_str(
            r#"{ "kind": "scanner", "id": "s", "mount": { "slot": "bay", "index": 1 } }"#,
        )
        .unwrap();
        assert!(module.params.is_null());
    }

    #[test]
    fn toml_blueprint() {
        let blueprint: MechanismBlueprint = toml::from_str(
            r#"
            id = "crawler"
            slot_capacity = 4

            [[mounts]]
            slot = "arm"
            index = 0
            module_subtype = "actuator"

            [[modules]]
            kind = "drive"
            id = "arm-drive"
            mount = { slot = "arm", index = 0 }
            params = { priority = 2 }

            [[inventory]]
            resource = "ore"
            quantity = 3
            "#,
        )
        .unwrap();
        assert_eq!(blueprint.slot_capacity, 4);
        assert_eq!(blueprint.mounts[0].module_subtype.as_deref(), Some("actuator"));
        assert_eq!(blueprint.modules[0].params["priority"], 2);
        assert_eq!(
            blueprint.inventory,
            vec![StockData {
                resource: "ore".into(),
                quantity: 3
            }]
        );
    }
}
