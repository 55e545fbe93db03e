//! Manifest reading and identity enforcement
//!
//! The metadata reader is a pure, classified parse: given a manifest
//! location it yields either a [`ModMetadata`] or a `MetadataError`; it
//! never lets a parse failure escape as anything else.

use modwarp_core::{Error, ModMetadata, Result, Version};
use std::path::Path;
use tracing::warn;

/// File name of a unit's manifest inside its folder
pub const MANIFEST_FILE_NAME: &str = "modinfo.json";

/// Read and parse the manifest at `path`.
///
/// A manifest below spec 1.3 is accepted but logged as a legacy, unordered
/// unit; callers exclude it from dependency-aware resolution rather than
/// rejecting it.
pub fn read_manifest(path: &Path) -> Result<ModMetadata> {
    let unit = unit_name_for(path);

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::metadata(&unit, format!("unreadable manifest: {e}")))?;

    let metadata: ModMetadata = serde_json::from_str(&content)
        .map_err(|e| Error::metadata(&unit, format!("malformed manifest: {e}")))?;

    if !metadata.is_ordered() {
        warn!(
            "Manifest for '{}' declares spec {}, below 1.3; treating as a legacy unordered unit",
            metadata.name, metadata.spec
        );
    }

    Ok(metadata)
}

/// Enforce the spec >= 1.3 identity rules between a manifest and the
/// identity it was registered under.
///
/// Legacy manifests are exempt. `registered_version` is checked only when
/// the registering unit carries one of its own.
pub fn enforce_identity(
    metadata: &ModMetadata,
    registered_id: &str,
    registered_version: Option<&Version>,
) -> Result<()> {
    if !metadata.is_ordered() {
        return Ok(());
    }

    if metadata.mod_id != registered_id {
        return Err(Error::identity_mismatch(
            registered_id,
            format!(
                "manifest declares id '{}' but the unit registered as '{}'",
                metadata.mod_id, registered_id
            ),
        ));
    }

    if let Some(registered) = registered_version {
        if &metadata.version != registered {
            return Err(Error::identity_mismatch(
                registered_id,
                format!(
                    "manifest declares version {} but the unit registered version {}",
                    metadata.version, registered
                ),
            ));
        }
    }

    Ok(())
}

/// Best-effort unit name for diagnostics: the manifest's folder name
fn unit_name_for(path: &Path) -> String {
    path.parent()
        .and_then(|p| p.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
