//! Built-in module kinds. Each kind owns its params type and exposes a
//! `KIND` name plus a `build` factory for the registry.

pub mod cargo_pod;
pub mod drive;
pub mod scanner;
