//! A sensor that publishes a steadily advancing reading.

use serde::Deserialize;

use crate::module::{Module, ModuleDescriptor, TickContext};
use crate::port::Port;
use crate::registry::{RegistryError, parse_params, with_default_capability};
use crate::telemetry::Metadata;

pub const KIND: &str = "scanner";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ScannerParams {
    pub channel: String,
    pub start: f64,
    /// Added to the reading every tick.
    pub step: f64,
    pub label: Option<String>,
}

impl Default for ScannerParams {
    fn default() -> Self {
        Self {
            channel: "scan".to_string(),
            start: 0.0,
            step: 1.0,
            label: None,
        }
    }
}

#[derive(Debug)]
pub struct Scanner {
    descriptor: ModuleDescriptor,
    params: ScannerParams,
    reading: f64,
}

impl Scanner {
    pub fn new(descriptor: ModuleDescriptor, params: ScannerParams) -> Self {
        let reading = params.start;
        Self {
            descriptor: with_default_capability(descriptor, "sensor"),
            params,
            reading,
        }
    }

    pub fn reading(&self) -> f64 {
        self.reading
    }

    fn metadata(&self) -> Metadata {
        let mut metadata = Metadata::new();
        let label = self
            .params
            .label
            .clone()
            .unwrap_or_else(|| self.descriptor.title.clone());
        metadata.insert("label".to_string(), label);
        metadata
    }
}

impl Module for Scanner {
    fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    fn on_attach(&mut self, port: &mut Port<'_>) {
        port.publish_value(self.params.channel.as_str(), self.reading, self.metadata());
    }

    fn update(&mut self, ctx: &mut TickContext<'_>) {
        self.reading += self.params.step;
        ctx.port
            .publish_value(self.params.channel.as_str(), self.reading, Metadata::new());
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

pub fn build(
    descriptor: ModuleDescriptor,
    params: &serde_json::Value,
) -> Result<Box<dyn Module>, RegistryError> {
    let params: ScannerParams = parse_params(KIND, &descriptor, params)?;
    Ok(Box::new(Scanner::new(descriptor, params)))
}
