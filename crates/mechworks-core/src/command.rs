//! Ledger commands arriving from outside the process.
//!
//! Commands are JSON objects tagged by `op`:
//!
//! ```json
//! { "op": "transfer", "source": "inventory-0", "target": "inventory-3", "amount": 2 }
//! ```
//!
//! A command is parsed, then validated for shape (positive quantities,
//! distinct slots, non-empty ids) before it is applied. Validation does not
//! look at ledger state; the ledger performs its own checks on apply.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::id::{ResourceId, SlotId};
use crate::ledger::{InventoryLedger, LedgerError, TransferOutcome};
use crate::slot::{Slot, SlotMetadataPatch};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("malformed command: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid command: {0}")]
    Invalid(String),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// A single ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum LedgerCommand {
    Store {
        resource: ResourceId,
        quantity: u32,
    },
    Transfer {
        source: SlotId,
        target: SlotId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        amount: Option<u32>,
    },
    SetMetadata {
        slot: SlotId,
        patch: SlotMetadataPatch,
    },
    Remove {
        resource: ResourceId,
        quantity: u32,
    },
}

/// What an applied command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CommandOutcome {
    Stored { slot: SlotId },
    Transferred { outcome: TransferOutcome },
    MetadataSet { slot: Slot },
    Removed { resource: ResourceId, quantity: u32 },
}

impl LedgerCommand {
    pub fn parse(input: &str) -> Result<Self, CommandError> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn parse_value(value: serde_json::Value) -> Result<Self, CommandError> {
        Ok(serde_json::from_value(value)?)
    }

    /// Shape checks that need no ledger state.
    pub fn validate(&self) -> Result<(), CommandError> {
        match self {
            Self::Store { resource, quantity } | Self::Remove { resource, quantity } => {
                if resource.as_str().is_empty() {
                    return Err(CommandError::Invalid("resource id is empty".into()));
                }
                if *quantity == 0 {
                    return Err(CommandError::Invalid("quantity must be positive".into()));
                }
            }
            Self::Transfer {
                source,
                target,
                amount,
            } => {
                if source == target {
                    return Err(CommandError::Invalid(format!(
                        "source and target are both {source}"
                    )));
                }
                if *amount == Some(0) {
                    return Err(CommandError::Invalid("amount must be positive".into()));
                }
            }
            Self::SetMetadata { patch, .. } => {
                if *patch == SlotMetadataPatch::default() {
                    return Err(CommandError::Invalid("metadata patch is empty".into()));
                }
            }
        }
        Ok(())
    }

    /// Validate and apply against `ledger`.
    pub fn apply(&self, ledger: &mut InventoryLedger) -> Result<CommandOutcome, CommandError> {
        if let Err(err) = self.validate() {
            warn!(command = ?self, error = %err, "command rejected");
            return Err(err);
        }
        let result = match self {
            Self::Store { resource, quantity } => ledger
                .store(resource, *quantity)
                .map(|slot| CommandOutcome::Stored { slot }),
            Self::Transfer {
                source,
                target,
                amount,
            } => ledger
                .transfer_slot_item(source, target, *amount)
                .map(|outcome| CommandOutcome::Transferred { outcome }),
            Self::SetMetadata { slot, patch } => ledger
                .set_slot_metadata(slot, patch)
                .map(|slot| CommandOutcome::MetadataSet { slot }),
            Self::Remove { resource, quantity } => {
                ledger
                    .remove(resource, *quantity)
                    .map(|()| CommandOutcome::Removed {
                        resource: resource.clone(),
                        quantity: *quantity,
                    })
            }
        };
        result.map_err(|err| {
            warn!(command = ?self, error = %err, "command failed");
            CommandError::from(err)
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================
