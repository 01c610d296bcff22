//! Extra storage. Mounting a cargo pod adds ledger capacity (its descriptor
//! carries a negative capacity cost) and the pod reports how full the
//! inventory is.

use serde::Deserialize;

use crate::module::{Module, ModuleDescriptor, TickContext};
use crate::registry::{RegistryError, parse_params, with_default_capability};
use crate::telemetry::Metadata;

pub const KIND: &str = "cargo-pod";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CargoPodParams {
    pub channel: String,
}

impl Default for CargoPodParams {
    fn default() -> Self {
        Self {
            channel: "cargo.fill".to_string(),
        }
    }
}

#[derive(Debug)]
pub struct CargoPod {
    descriptor: ModuleDescriptor,
    params: CargoPodParams,
}

impl CargoPod {
    pub fn new(descriptor: ModuleDescriptor, params: CargoPodParams) -> Self {
        Self {
            descriptor: with_default_capability(descriptor, "storage"),
            params,
        }
    }
}

impl Module for CargoPod {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let inventory = ctx.port.inventory();
        let fill = if inventory.capacity == 0 {
            0.0
        } else {
            f64::from(inventory.used) / f64::from(inventory.capacity)
        };
        let mut metadata = Metadata::new();
        metadata.insert("unit".to_string(), "ratio".to_string());
        ctx.port
            .publish_value(self.params.channel.as_str(), fill, metadata);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn build(
    descriptor: ModuleDescriptor,
    params: &serde_json::Value,
) -> Result<Box<dyn Module>, RegistryError> {
    let params: CargoPodParams = parse_params(KIND, &descriptor, params)?;
    Ok(Box::new(CargoPod::new(descriptor, params)))
}
