use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::fmt;

new_key_type! {
    /// Identifies a mounted module inside one mechanism's module table.
    pub struct ModuleKey;
}

/// Declares a string-backed identifier newtype. Serialized transparently so
/// the wire shape is a bare string.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id! {
    /// Identifies whatever occupies a slot: a resource type in the inventory
    /// ledger, or a module id on the chassis.
    ResourceId
}

string_id! {
    /// Identifies one addressable slot. Immutable once the schema is built.
    SlotId
}

string_id! {
    /// Identifies a module instance. Unique within one mechanism.
    ModuleId
}

string_id! {
    /// Identifies one simulated mechanism; the telemetry cache key.
    MechanismId
}

string_id! {
    /// Names a telemetry value or actuator channel.
    ChannelId
}

string_id! {
    /// Names a capacity contributor registered on a ledger.
    CapacitySourceId
}

impl SlotId {
    /// The conventional id of the inventory slot at `index`: `inventory-<index>`.
    pub fn inventory(index: usize) -> Self {
        Self(format!("inventory-{index}"))
    }

    /// The id of a chassis mount slot: `<slot>-<index>`.
    pub fn mount(slot: &str, index: u32) -> Self {
        Self(format!("{slot}-{index}"))
    }
}

impl ModuleId {
    /// The chassis occupant id for this module.
    pub fn as_occupant(&self) -> ResourceId {
        ResourceId(self.0.clone())
    }

    /// The capacity source a mounted module registers on its ledger.
    pub fn capacity_source(&self) -> CapacitySourceId {
        CapacitySourceId(format!("module:{}", self.0))
    }
}

/// Handle returned by `subscribe`; pass it back to `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriptionId(pub u64);
