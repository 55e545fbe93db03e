//! # modwarp-core
//!
//! Core library for the Modwarp mod-loading framework providing:
//! - Mod manifest type definitions (modinfo.json)
//! - Dotted-numeric version and version-range matching
//! - Per-unit JSON key/value configuration stores
//! - The shared error taxonomy for registration, resolution and loading

pub mod config;
pub mod error;
pub mod types;
pub mod version;

pub use config::ConfigStore;
pub use error::{Error, Result};
pub use types::{DependencyInfo, ModMetadata};
pub use version::{SpecVersion, Version, VersionRange};
