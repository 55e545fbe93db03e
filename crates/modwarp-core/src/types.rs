//! Mod manifest type definitions matching the modinfo.json schema

use crate::version::{SpecVersion, Version, VersionRange};
use serde::{Deserialize, Serialize};

/// Declared facts about one mod, parsed from its `modinfo.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModMetadata {
    /// Manifest spec version; governs which optional fields are validated
    pub spec: SpecVersion,

    /// Stable unique mod id (reverse-domain style by convention)
    pub mod_id: String,

    /// Human-readable display name
    pub name: String,

    /// Mod version (dotted-numeric)
    pub version: Version,

    /// Author name
    #[serde(default)]
    pub author: Option<String>,

    /// Short description
    #[serde(default)]
    pub description: Option<String>,

    /// Source / homepage URL
    #[serde(default)]
    pub source: Option<String>,

    /// Declared dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<DependencyInfo>,

    /// Declared conflicts, in declaration order
    #[serde(default)]
    pub conflicts: Vec<DependencyInfo>,

    /// Host versions this mod supports (report-only, never excludes)
    #[serde(default)]
    pub supported_host_versions: Option<VersionRange>,

    /// Relative path to the mod's loadable entry point, if it has one
    #[serde(default)]
    pub main_entry: Option<String>,

    /// Relative path searched for supporting libraries before the entry
    /// point is loaded
    #[serde(default)]
    pub library_search_path: Option<String>,
}

impl ModMetadata {
    /// Whether this manifest participates in dependency-aware resolution.
    ///
    /// Manifests below spec 1.3 are legacy, unordered units: accepted, but
    /// excluded from ordering and identity enforcement.
    pub fn is_ordered(&self) -> bool {
        self.spec >= SpecVersion::V1_3
    }
}

/// One dependency or conflict declaration: a target id plus the version
/// range it applies to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyInfo {
    /// Id of the target mod
    pub id: String,

    /// Versions of the target this declaration covers; defaults to any
    #[serde(default)]
    pub version: VersionRange,
}

impl DependencyInfo {
    /// Create a declaration covering any version of `id`
    pub fn any(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            version: VersionRange::any(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL_MANIFEST: &str = r#"{
        "spec": "2.0",
        "mod_id": "com.example.fuel",
        "name": "Fuel Systems",
        "version": "1.5.0"
    }"#;

    const FULL_MANIFEST: &str = r#"{
        "spec": "1.3",
        "mod_id": "com.example.wings",
        "name": "Procedural Wings",
        "version": "2.1",
        "author": "example",
        "description": "Wings, procedurally",
        "source": "https://example.org/wings",
        "dependencies": [
            { "id": "com.example.core", "version": { "min": "1.0", "max": "2.0" } },
            { "id": "com.example.ui" }
        ],
        "conflicts": [
            { "id": "com.legacy.wings", "version": { "min": "*", "max": "*" } }
        ],
        "supported_host_versions": { "min": "0.2.0", "max": "*" },
        "main_entry": "wings_entry",
        "library_search_path": "lib"
    }"#;

    #[test]
    fn test_minimal_manifest_parses_with_defaults() {
        let metadata: ModMetadata = serde_json::from_str(MINIMAL_MANIFEST).unwrap();
        assert_eq!(metadata.mod_id, "com.example.fuel");
        assert!(metadata.dependencies.is_empty());
        assert!(metadata.conflicts.is_empty());
        assert!(metadata.main_entry.is_none());
        assert!(metadata.is_ordered());
    }

    #[test]
    fn test_full_manifest_parses() {
        let metadata: ModMetadata = serde_json::from_str(FULL_MANIFEST).unwrap();
        assert_eq!(metadata.dependencies.len(), 2);
        assert_eq!(metadata.dependencies[0].id, "com.example.core");
        assert!(metadata.dependencies[0].version.supports("1.5"));
        assert!(!metadata.dependencies[0].version.supports("2.1"));
        // Omitted range covers any version
        assert!(metadata.dependencies[1].version.supports("99.0"));
        assert_eq!(metadata.conflicts.len(), 1);
        assert_eq!(metadata.main_entry.as_deref(), Some("wings_entry"));
    }

    #[test]
    fn test_legacy_spec_is_unordered() {
        let manifest = MINIMAL_MANIFEST.replace("\"2.0\"", "\"1.2\"");
        let metadata: ModMetadata = serde_json::from_str(&manifest).unwrap();
        assert!(!metadata.is_ordered());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let manifest = r#"{ "spec": "2.0", "name": "No Id", "version": "1.0" }"#;
        assert!(serde_json::from_str::<ModMetadata>(manifest).is_err());
    }
}
