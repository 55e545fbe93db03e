//! Mod discovery
//!
//! Walks the mods folder for manifests and turns each one into a candidate
//! descriptor, reads the operator's disabled set, and computes a hash of
//! the whole mod set so outer layers can tell whether it changed since the
//! last run. Malformed manifests become MetadataError candidates rather
//! than being dropped, so they still show up in exclusion reports.

use crate::descriptor::{DescriptorStatus, ModDescriptor};
use crate::manifest::{read_manifest, MANIFEST_FILE_NAME};
use modwarp_core::{ConfigStore, Result};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Default file name of the operator's disabled set, one id per line
pub const DISABLED_LIST_FILE_NAME: &str = "disabled_mods.txt";

const HASH_FILE_NAME: &str = ".modset-hash";

/// Scanner for one mods folder
pub struct Discovery {
    mods_dir: PathBuf,
    disabled_list: PathBuf,
    hash_file: PathBuf,
}

/// Everything one scan produced
pub struct DiscoveryReport {
    /// Candidate descriptors in discovery order (manifest path order)
    pub candidates: Vec<ModDescriptor>,
    /// Ids from the disabled set, matched case-insensitively downstream
    pub disabled_ids: Vec<String>,
    /// Whether the mod set differs from the previous scan's recorded hash
    pub changed_since_last_run: bool,
}

impl Discovery {
    pub fn new(mods_dir: impl Into<PathBuf>) -> Self {
        let mods_dir = mods_dir.into();
        Self {
            disabled_list: mods_dir.join(DISABLED_LIST_FILE_NAME),
            hash_file: mods_dir.join(HASH_FILE_NAME),
            mods_dir,
        }
    }

    /// Override where the disabled set is read from
    pub fn with_disabled_list(mut self, path: impl Into<PathBuf>) -> Self {
        self.disabled_list = path.into();
        self
    }

    /// Override where the mod-set hash is recorded
    pub fn with_hash_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.hash_file = path.into();
        self
    }

    /// Scan the mods folder once
    pub fn scan(&self) -> Result<DiscoveryReport> {
        if !self.mods_dir.exists() {
            std::fs::create_dir_all(&self.mods_dir)?;
        }

        let manifest_paths = self.find_manifests();
        let disabled_ids = self.read_disabled_list();

        let mut candidates = Vec::with_capacity(manifest_paths.len());
        let mut manifest_texts = Vec::with_capacity(manifest_paths.len());
        for path in &manifest_paths {
            if let Ok(text) = std::fs::read_to_string(path) {
                manifest_texts.push(text);
            }
            candidates.push(self.candidate_for(path));
        }

        let changed_since_last_run = self.update_modset_hash(&disabled_ids, &manifest_texts)?;

        info!(
            "Discovered {} candidate mod(s) in {:?} ({} disabled id(s))",
            candidates.len(),
            self.mods_dir,
            disabled_ids.len()
        );

        Ok(DiscoveryReport {
            candidates,
            disabled_ids,
            changed_since_last_run,
        })
    }

    /// All manifest paths under the mods folder, sorted for determinism
    fn find_manifests(&self) -> Vec<PathBuf> {
        WalkDir::new(&self.mods_dir)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE_NAME
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    fn candidate_for(&self, manifest_path: &Path) -> ModDescriptor {
        let folder = manifest_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.mods_dir.clone());

        match read_manifest(manifest_path) {
            Ok(metadata) => {
                debug!(
                    "Attempting to register mod: {}, {}",
                    metadata.mod_id, metadata.name
                );
                let config = self.config_store_for(&folder, &metadata.mod_id);
                ModDescriptor::discovered(metadata, folder, config)
            }
            Err(e) => {
                error!("{e}; this mod will not be initialized");
                let fallback_id = folder
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "unknown".to_string());
                ModDescriptor::invalid(fallback_id, Some(folder), DescriptorStatus::MetadataError)
            }
        }
    }

    fn config_store_for(&self, folder: &Path, mod_id: &str) -> ConfigStore {
        let path = folder.join(format!("{mod_id}-config.json"));
        ConfigStore::open(&path).unwrap_or_else(|e| {
            warn!("Could not open config store at {path:?}: {e}; using in-memory");
            ConfigStore::in_memory()
        })
    }

    /// Read the disabled set; an absent file is an empty set
    fn read_disabled_list(&self) -> Vec<String> {
        match std::fs::read_to_string(&self.disabled_list) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Hash the disabled set plus every manifest text and compare against
    /// the recorded hash from the previous run; record the new one
    fn update_modset_hash(&self, disabled_ids: &[String], manifest_texts: &[String]) -> Result<bool> {
        let mut hasher = Sha256::new();
        for id in disabled_ids {
            hasher.update(id.as_bytes());
            hasher.update(b"\n");
        }
        for text in manifest_texts {
            hasher.update(text.as_bytes());
        }
        let new_hash: String = hasher
            .finalize()
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect();

        let old_hash = std::fs::read_to_string(&self.hash_file).ok();
        std::fs::write(&self.hash_file, &new_hash)?;

        Ok(old_hash.as_deref() != Some(new_hash.as_str()))
    }
}
