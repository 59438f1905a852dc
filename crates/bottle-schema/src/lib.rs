//! Shared types for bottle: manifests, package configurations and the
//! dependency values the resolution engine keys its graph on.

pub mod config;
pub mod dependency;
pub mod import_path;

// Re-exports
pub use config::*;
pub use dependency::*;
pub use import_path::*;

/// File name of the package manifest looked up during discovery.
pub const MANIFEST_FILE: &str = "Bottle.toml";
