//! Reads blueprint files from disk.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and the
//! deserialization helpers used by the builder.

use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tracing::debug;

use mechworks_core::ledger::LedgerError;
use mechworks_core::mechanism::MechanismError;
use mechworks_core::registry::RegistryError;
use mechworks_core::simulation::SimulationError;

use crate::schema::MechanismBlueprint;

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading or building blueprints.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The blueprint parsed but describes an impossible mechanism.
    #[error("invalid blueprint '{blueprint}': {detail}")]
    Invalid { blueprint: String, detail: String },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Mechanism(#[from] MechanismError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Simulation(#[from] SimulationError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

const EXTENSIONS: [&str; 3] = ["ron", "toml", "json"];

/// Look for `{name}.ron`, `{name}.toml`, and `{name}.json` in `dir`.
///
/// Returns `Ok(None)` if none exists, or `Err(ConflictingFormats)` if more
/// than one does.
pub fn find_blueprint(dir: &Path, name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut found: Option<PathBuf> = None;

    for ext in &EXTENSIONS {
        let candidate = dir.join(format!("{name}.{ext}"));
        if candidate.exists() {
            if let Some(existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing,
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Every blueprint file directly inside `dir`, sorted by path. Files with
/// other extensions are skipped.
pub fn blueprint_files(dir: &Path) -> Result<Vec<PathBuf>, DataLoadError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && detect_format(&path).is_ok() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// Read a file and deserialize it according to its format (detected from extension).
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    deserialize_str(&content, format).map_err(|detail| DataLoadError::Parse {
        file: path.to_path_buf(),
        detail,
    })
}

fn deserialize_str<T: DeserializeOwned>(content: &str, format: Format) -> Result<T, String> {
    match format {
        Format::Ron => ron::from_str(content).map_err(|e| e.to_string()),
        Format::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        Format::Toml => toml::from_str(content).map_err(|e| e.to_string()),
    }
}

/// Load one blueprint file.
pub fn load_blueprint(path: &Path) -> Result<MechanismBlueprint, DataLoadError> {
    let blueprint: MechanismBlueprint = deserialize_file(path)?;
    debug!(file = %path.display(), blueprint = %blueprint.id, "blueprint loaded");
    Ok(blueprint)
}

/// Load every blueprint in `dir`, in path order.
pub fn load_blueprint_dir(dir: &Path) -> Result<Vec<MechanismBlueprint>, DataLoadError> {
    blueprint_files(dir)?
        .iter()
        .map(|path| load_blueprint(path))
        .collect()
}

// ===========================================================================
// Tests
// ===========================================================================
