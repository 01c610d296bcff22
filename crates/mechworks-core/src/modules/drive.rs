//! An actuator that requests its channel every tick.
//!
//! The payload comes from a throttle channel if anything has published to
//! it, otherwise from the module's configured default.

use serde::Deserialize;
use tracing::warn;

use crate::id::ChannelId;
use crate::module::{Module, ModuleDescriptor, TickContext};
use crate::registry::{RegistryError, parse_params, with_default_capability};
use crate::telemetry::SignalValue;

pub const KIND: &str = "drive";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct DriveParams {
    pub channel: String,
    pub throttle_channel: Option<String>,
    pub default_throttle: f64,
    pub priority: i32,
}

impl Default for DriveParams {
    fn default() -> Self {
        Self {
            channel: "drive".to_string(),
            throttle_channel: None,
            default_throttle: 1.0,
            priority: 0,
        }
    }
}

#[derive(Debug)]
pub struct Drive {
    descriptor: ModuleDescriptor,
    params: DriveParams,
    throttle_channel: Option<ChannelId>,
}

impl Drive {
    pub fn new(descriptor: ModuleDescriptor, params: DriveParams) -> Self {
        let throttle_channel = params.throttle_channel.as_deref().map(ChannelId::from);
        Self {
            descriptor: with_default_capability(descriptor, "actuator"),
            params,
            throttle_channel,
        }
    }

    pub fn priority(&self) -> i32 {
        self.params.priority
    }
}

impl Module for Drive {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        let payload = self
            .throttle_channel
            .as_ref()
            .and_then(|channel| ctx.port.get_value(channel))
            .cloned()
            .unwrap_or(SignalValue::Number(self.params.default_throttle));

        if let Err(err) =
            ctx.port
                .request_actuator(self.params.channel.as_str(), payload, self.params.priority)
        {
            warn!(module = %self.descriptor.id, error = %err, "drive request rejected");
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn build(
    descriptor: ModuleDescriptor,
    params: &serde_json::Value,
) -> Result<Box<dyn Module>, RegistryError> {
    let params: DriveParams = parse_params(KIND, &descriptor, params)?;
    Ok(Box::new(Drive::new(descriptor, params)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::Attachment;
    use crate::port::{ActuatorArbiter, Port};
    use crate::snapshot::InventorySnapshot;
    use crate::telemetry::{Metadata, TelemetrySnapshot};

    fn drive(params: DriveParams) -> Drive {
        Drive::new(
            ModuleDescriptor::new("drive-1", "Drive", Attachment::new("drive-bay", 0)),
            params,
        )
    }

    fn run_tick(module: &mut Drive, telemetry: &mut TelemetrySnapshot, arbiter: &mut ActuatorArbiter) {
        let inventory = InventorySnapshot::EMPTY;
        let mut ctx = TickContext {
            tick: 1,
            port: Port::new(module.id().clone(), telemetry, arbiter, &inventory, 1),
        };
        module.update(&mut ctx);
    }

    #[test]
    fn falls_back_to_default_throttle() {
        let mut module = drive(DriveParams {
            throttle_channel: Some("throttle".into()),
            default_throttle: 0.25,
            priority: 3,
            ..DriveParams::default()
        });
        let mut telemetry = TelemetrySnapshot::default();
        let mut arbiter = ActuatorArbiter::new();
        run_tick(&mut module, &mut telemetry, &mut arbiter);

        let result = arbiter.resolve();
        let command = &result.commands[&ChannelId::from("drive")];
        assert_eq!(command.payload, SignalValue::Number(0.25));
        assert_eq!(command.priority, 3);
    }

    #[test]
    fn reads_published_throttle() {
        let mut module = drive(DriveParams {
            throttle_channel: Some("throttle".into()),
            ..DriveParams::default()
        });
        let mut telemetry = TelemetrySnapshot::default();
        telemetry.publish_value(ChannelId::from("throttle"), 0.6.into(), Metadata::new());
        let mut arbiter = ActuatorArbiter::new();
        run_tick(&mut module, &mut telemetry, &mut arbiter);

        let result = arbiter.resolve();
        assert_eq!(
            result.commands[&ChannelId::from("drive")].payload,
            SignalValue::Number(0.6)
        );
    }

    #[test]
    fn declares_actuator_capability() {
        let module = drive(DriveParams::default());
        assert!(module.descriptor().provides("actuator"));
    }
}
