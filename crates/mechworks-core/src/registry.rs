//! Kind-name -> factory lookup for building modules from data.
//!
//! Blueprints name a module `kind` and carry kind-specific `params` as a
//! self-describing value. The registry resolves the kind, parses the params
//! and returns a boxed [`Module`]. Kinds not shipped with the core can be
//! added with [`ModuleRegistry::register`].

use std::collections::BTreeMap;

use crate::module::{Module, ModuleDescriptor};
use crate::modules;

/// Builds a module from its descriptor and raw params.
pub type ModuleFactory = fn(ModuleDescriptor, &serde_json::Value) -> Result<Box<dyn Module>, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown module kind: {0}")]
    UnknownKind(String),

    #[error("invalid params for {kind} module {module}: {detail}")]
    InvalidParams {
        kind: String,
        module: String,
        detail: String,
    },
}

/// Registry of module kinds.
#[derive(Clone, Default)]
pub struct ModuleRegistry {
    factories: BTreeMap<String, ModuleFactory>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("kinds", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in kinds: `scanner`, `drive`, `cargo-pod`.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(modules::scanner::KIND, modules::scanner::build);
        registry.register(modules::drive::KIND, modules::drive::build);
        registry.register(modules::cargo_pod::KIND, modules::cargo_pod::build);
        registry
    }

    /// Add or replace a kind.
    pub fn register(&mut self, kind: impl Into<String>, factory: ModuleFactory) {
        self.factories.insert(kind.into(), factory);
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Build a module of `kind`.
    pub fn build(
        &self,
        kind: &str,
        descriptor: ModuleDescriptor,
        params: &serde_json::Value,
    ) -> Result<Box<dyn Module>, RegistryError> {
        let factory = self
            .factories
            .get(kind)
            .ok_or_else(|| RegistryError::UnknownKind(kind.to_string()))?;
        factory(descriptor, params)
    }
}

/// Parse kind params, treating `null` as "all defaults".
pub(crate) fn parse_params<T: serde::de::DeserializeOwned + Default>(
    kind: &str,
    descriptor: &ModuleDescriptor,
    params: &serde_json::Value,
) -> Result<T, RegistryError> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|e| RegistryError::InvalidParams {
        kind: kind.to_string(),
        module: descriptor.id.to_string(),
        detail: e.to_string(),
    })
}

/// Fill in a default capability tag if the descriptor declares none.
pub(crate) fn with_default_capability(mut descriptor: ModuleDescriptor, tag: &str) -> ModuleDescriptor {
    if descriptor.provides.is_empty() {
        descriptor.provides.push(tag.to_string());
    }
    descriptor
}
