//! Mod discovery, resolution and lifecycle orchestration
//!
//! This crate handles:
//! - Manifest discovery and parsing
//! - The descriptor registry and the operator's disabled set
//! - Versioned dependency resolution and load-order computation
//! - Internal feature modules and their prerequisite ordering
//! - Staged loading actions (general, per-unit, asset and localization)
//! - The phase-barrier lifecycle with per-unit fault isolation

pub mod actions;
pub mod descriptor;
pub mod discovery;
pub mod manifest;
pub mod modules;
pub mod orchestrator;
pub mod registry;
pub mod resolver;

pub use actions::{
    ActionResult, AssetHandle, AssetProvider, FunctionAction, LabelAction, LoadingAction,
    LoadingRegistrar, LocalizationSink, NamedAsset, UnitLoadingAction,
};
pub use descriptor::{
    DescriptorStatus, ModDescriptor, ModUnit, SharedUnit, UnitContext, UnitRegistrar,
};
pub use discovery::{Discovery, DiscoveryReport};
pub use manifest::{enforce_identity, read_manifest, MANIFEST_FILE_NAME};
pub use modules::{LifecycleModule, ModuleManager};
pub use orchestrator::{assemble, LifecyclePhase, Orchestrator};
pub use registry::ModRegistry;
pub use resolver::{resolve, ResolutionReport};
