//! Mechworks Data -- blueprint loading for mechworks mechanisms.
//!
//! Blueprints are RON, TOML, or JSON files (format detected from the
//! extension) describing a mechanism's inventory, chassis mounts, modules,
//! and initial stock. [`build_mechanism`] turns one into a live
//! [`mechworks_core::mechanism::Mechanism`].

pub mod builder;
pub mod loader;
pub mod schema;

pub use builder::{build_mechanism, load_mechanism, load_simulation};
pub use loader::{DataLoadError, load_blueprint};
pub use schema::MechanismBlueprint;
