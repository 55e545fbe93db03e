//! Descriptor model for discovered mods and internal modules
//!
//! A [`ModDescriptor`] is the registry's record of one unit: identity,
//! declared metadata, runtime status and (once activated) the live,
//! callback-bearing instance. Descriptors are created during discovery or
//! internal registration, classified during resolution, and persist for
//! the remainder of the process even when their unit is excluded.

use modwarp_core::{ConfigStore, ModMetadata, Version};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Runtime status of one descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorStatus {
    /// Discovered, not yet classified by the resolver
    Pending,
    /// Classified activatable; part of the load order
    Resolved,
    /// Excluded by the operator's disabled set
    Disabled,
    /// Excluded because a declared dependency is unsatisfiable
    MissingDependency,
    /// Excluded because its manifest was unreadable or invalid
    MetadataError,
    /// Faulted during a lifecycle phase; inactive for subsequent phases
    LoadError,
}

impl fmt::Display for DescriptorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DescriptorStatus::Pending => "pending",
            DescriptorStatus::Resolved => "resolved",
            DescriptorStatus::Disabled => "disabled",
            DescriptorStatus::MissingDependency => "missing dependency",
            DescriptorStatus::MetadataError => "metadata error",
            DescriptorStatus::LoadError => "load error",
        };
        write!(f, "{text}")
    }
}

/// The loaded, callback-bearing side of a unit.
///
/// Implementations receive one callback per lifecycle phase, in load order,
/// behind the orchestrator's phase barriers. A failed callback faults only
/// its own unit.
pub trait ModUnit: Send {
    fn on_pre_initialized(&mut self, ctx: &UnitContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    fn on_initialized(&mut self, ctx: &UnitContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }

    fn on_post_initialized(&mut self, ctx: &UnitContext) -> anyhow::Result<()> {
        let _ = ctx;
        Ok(())
    }
}

/// Shared handle to a live unit instance
pub type SharedUnit = Arc<Mutex<Box<dyn ModUnit>>>;

/// Context handed to unit factories and lifecycle callbacks
#[derive(Clone)]
pub struct UnitContext {
    /// The unit's registered id
    pub id: String,
    /// The unit's key/value configuration store
    pub config: ConfigStore,
    /// The unit's owning folder, absent for code-only units
    pub folder: Option<PathBuf>,
}

/// Factory producing a unit instance at activation time
pub type UnitFactory = Box<dyn Fn(&UnitContext) -> anyhow::Result<Box<dyn ModUnit>> + Send>;

/// Explicit unit-instantiation registrations, keyed by identity.
///
/// Each code-bearing mod registers a factory for its id at startup; the
/// orchestrator looks the factory up when the unit is promoted during the
/// first lifecycle phase. Units without a factory are asset-only: they skip
/// callbacks but keep their ordered slot for staged contributions.
#[derive(Default)]
pub struct UnitRegistrar {
    factories: HashMap<String, UnitFactory>,
}

impl UnitRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for `id` (case-insensitive; first wins)
    pub fn register<F>(&mut self, id: &str, factory: F)
    where
        F: Fn(&UnitContext) -> anyhow::Result<Box<dyn ModUnit>> + Send + 'static,
    {
        let key = id.to_lowercase();
        if self.factories.contains_key(&key) {
            warn!("Unit factory for '{id}' already registered; keeping the first");
            return;
        }
        self.factories.insert(key, Box::new(factory));
    }

    /// Whether a factory is registered for `id`
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(&id.to_lowercase())
    }

    pub(crate) fn get(&self, id: &str) -> Option<&UnitFactory> {
        self.factories.get(&id.to_lowercase())
    }
}

/// The registry's record of one discovered mod or internal module
pub struct ModDescriptor {
    /// Stable unique id; compared case-insensitively
    pub id: String,
    /// Human-readable name
    pub display_name: String,
    /// Declared manifest, absent for code-only internal units
    pub metadata: Option<ModMetadata>,
    /// Owning directory, absent for code-only internal units
    pub folder: Option<PathBuf>,
    /// Current classification
    pub status: DescriptorStatus,
    /// True for the framework's own built-in units
    pub is_core: bool,
    /// The unit's configuration store
    pub config: ConfigStore,
    /// Whether lifecycle callbacks run for this unit; false for asset-only
    /// units, which still occupy their ordered slot
    pub do_lifecycle_actions: bool,
    /// Ids of resolved units this unit was flagged as conflicting with
    pub conflicts_with: Vec<String>,
    instance: Option<SharedUnit>,
}

impl ModDescriptor {
    /// Descriptor for a mod discovered on disk via its manifest
    pub fn discovered(metadata: ModMetadata, folder: PathBuf, config: ConfigStore) -> Self {
        Self {
            id: metadata.mod_id.clone(),
            display_name: metadata.name.clone(),
            metadata: Some(metadata),
            folder: Some(folder),
            status: DescriptorStatus::Pending,
            is_core: false,
            config,
            do_lifecycle_actions: true,
            conflicts_with: Vec::new(),
            instance: None,
        }
    }

    /// Descriptor for an internally registered, code-only unit
    pub fn internal(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            metadata: None,
            folder: None,
            status: DescriptorStatus::Pending,
            is_core: true,
            config: ConfigStore::in_memory(),
            do_lifecycle_actions: true,
            conflicts_with: Vec::new(),
            instance: None,
        }
    }

    /// Descriptor recording a unit whose manifest could not be used
    pub fn invalid(id: impl Into<String>, folder: Option<PathBuf>, status: DescriptorStatus) -> Self {
        let id = id.into();
        Self {
            display_name: id.clone(),
            id,
            metadata: None,
            folder,
            status,
            is_core: false,
            config: ConfigStore::in_memory(),
            do_lifecycle_actions: false,
            conflicts_with: Vec::new(),
            instance: None,
        }
    }

    /// Attach metadata to an internally registered unit
    pub fn with_metadata(mut self, metadata: ModMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Override the unit's configuration store
    pub fn with_config(mut self, config: ConfigStore) -> Self {
        self.config = config;
        self
    }

    /// The declared version, when metadata is present
    pub fn version(&self) -> Option<&Version> {
        self.metadata.as_ref().map(|m| &m.version)
    }

    /// Whether this unit is part of the active set
    pub fn is_active(&self) -> bool {
        self.status == DescriptorStatus::Resolved
    }

    /// The live instance, once promoted
    pub fn instance(&self) -> Option<SharedUnit> {
        self.instance.clone()
    }

    /// Whether this unit has been promoted to a live instance
    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Context handed to this unit's factory and callbacks
    pub fn unit_context(&self) -> UnitContext {
        UnitContext {
            id: self.id.clone(),
            config: self.config.clone(),
            folder: self.folder.clone(),
        }
    }

    pub(crate) fn attach_instance(&mut self, instance: Box<dyn ModUnit>) {
        self.instance = Some(Arc::new(Mutex::new(instance)));
    }
}

impl fmt::Debug for ModDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModDescriptor")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("status", &self.status)
            .field("is_core", &self.is_core)
            .field("has_instance", &self.instance.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoopUnit;
    impl ModUnit for NoopUnit {}

    #[test]
    fn test_internal_descriptor_defaults() {
        let descriptor = ModDescriptor::internal("modwarp", "Modwarp");
        assert!(descriptor.is_core);
        assert!(descriptor.metadata.is_none());
        assert!(descriptor.folder.is_none());
        assert_eq!(descriptor.status, DescriptorStatus::Pending);
        assert!(!descriptor.has_instance());
    }

    #[test]
    fn test_registrar_first_registration_wins() {
        let mut registrar = UnitRegistrar::new();
        registrar.register("Com.Example.Mod", |_| Ok(Box::new(NoopUnit)));
        registrar.register("com.example.mod", |_| {
            anyhow::bail!("should never be called")
        });

        assert!(registrar.contains("COM.EXAMPLE.MOD"));
        let ctx = ModDescriptor::internal("com.example.mod", "m").unit_context();
        let factory = registrar.get("com.example.mod").unwrap();
        assert!(factory(&ctx).is_ok());
    }

    #[test]
    fn test_attach_instance_promotes_descriptor() {
        let mut descriptor = ModDescriptor::internal("a", "A");
        descriptor.attach_instance(Box::new(NoopUnit));
        assert!(descriptor.has_instance());
    }
}
