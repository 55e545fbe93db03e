//! Lifecycle orchestration
//!
//! The orchestrator drives every active unit and every internal module
//! through the phase sequence behind hard barriers: no unit enters a phase
//! until every unit has finished the previous one. Within a phase, units
//! run strictly in load order. A failure anywhere faults only the failing
//! unit; the rest of the set keeps going.

use crate::actions::{localization_action, LoadingRegistrar, LocalizationSink, UnitAction};
use crate::descriptor::{DescriptorStatus, ModDescriptor, UnitRegistrar};
use crate::discovery::Discovery;
use crate::manifest::enforce_identity;
use crate::modules::ModuleManager;
use crate::registry::ModRegistry;
use crate::resolver::{resolve, ResolutionReport};
use modwarp_core::Error;
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where the lifecycle currently stands. Phases only ever advance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LifecyclePhase {
    /// Registry assembled, nothing initialized yet
    Discovered,
    /// Every unit has completed pre-initialization
    PreInitialized,
    /// Staged loading actions have run
    Staged,
    /// Every unit has completed initialization
    Initialized,
    /// Terminal: every unit has completed post-initialization
    PostInitialized,
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LifecyclePhase::Discovered => "discovered",
            LifecyclePhase::PreInitialized => "pre-initialized",
            LifecyclePhase::Staged => "staged",
            LifecyclePhase::Initialized => "initialized",
            LifecyclePhase::PostInitialized => "post-initialized",
        };
        write!(f, "{text}")
    }
}

/// Discover, register and resolve in one pass: internal units first (so
/// they win identity collisions), then discovered candidates, then the
/// operator's disabled set, then the resolver.
pub fn assemble(
    discovery: &Discovery,
    internal: Vec<ModDescriptor>,
) -> modwarp_core::Result<(ModRegistry, ResolutionReport)> {
    let mut registry = ModRegistry::new();
    let mut duplicates: Vec<Error> = Vec::new();

    for mut descriptor in internal {
        if let Some(metadata) = &descriptor.metadata {
            if let Err(e) = enforce_identity(metadata, &descriptor.id, None) {
                error!("{e}; this unit will not be initialized");
                descriptor.status = DescriptorStatus::MetadataError;
                descriptor.do_lifecycle_actions = false;
            }
        }
        let id = descriptor.id.clone();
        if !registry.register(descriptor) {
            duplicates.push(Error::duplicate_identity(id));
        }
    }

    let report = discovery.scan()?;
    if report.changed_since_last_run {
        info!("Mod set changed since the previous run");
    }
    for candidate in report.candidates {
        let id = candidate.id.clone();
        if !registry.register(candidate) {
            duplicates.push(Error::duplicate_identity(id));
        }
    }
    registry.apply_disabled(&report.disabled_ids);

    let mut resolution = resolve(&mut registry);
    resolution.diagnostics.extend(duplicates);
    Ok((registry, resolution))
}

/// Drives the resolved registry through the lifecycle phases
pub struct Orchestrator {
    registry: ModRegistry,
    modules: ModuleManager,
    registrar: LoadingRegistrar,
    units: UnitRegistrar,
    localization: Option<Arc<dyn LocalizationSink>>,
    phase: LifecyclePhase,
}

impl Orchestrator {
    pub fn new(registry: ModRegistry) -> Self {
        Self {
            registry,
            modules: ModuleManager::new(),
            registrar: LoadingRegistrar::new(),
            units: UnitRegistrar::new(),
            localization: None,
            phase: LifecyclePhase::Discovered,
        }
    }

    pub fn with_modules(mut self, modules: ModuleManager) -> Self {
        self.modules = modules;
        self
    }

    pub fn with_registrar(mut self, registrar: LoadingRegistrar) -> Self {
        self.registrar = registrar;
        self
    }

    pub fn with_units(mut self, units: UnitRegistrar) -> Self {
        self.units = units;
        self
    }

    pub fn with_localization(mut self, sink: Arc<dyn LocalizationSink>) -> Self {
        self.localization = Some(sink);
        self
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn registry(&self) -> &ModRegistry {
        &self.registry
    }

    /// Run every remaining phase to completion. Idempotent: once the
    /// lifecycle has finished, further calls are no-ops.
    pub async fn run(&mut self) -> Vec<Error> {
        let mut diagnostics = Vec::new();
        while self.phase < LifecyclePhase::PostInitialized {
            diagnostics.extend(self.advance().await);
        }
        diagnostics
    }

    /// Advance exactly one phase barrier. A no-op after the final phase.
    pub async fn advance(&mut self) -> Vec<Error> {
        match self.phase {
            LifecyclePhase::Discovered => self.pre_initialize(),
            LifecyclePhase::PreInitialized => self.stage().await,
            LifecyclePhase::Staged => self.initialize(),
            LifecyclePhase::Initialized => self.post_initialize(),
            LifecyclePhase::PostInitialized => Vec::new(),
        }
    }

    /// First barrier: load modules, pre-initialize modules, promote unit
    /// instances and run their pre-initialization callbacks
    fn pre_initialize(&mut self) -> Vec<Error> {
        let mut diagnostics = self.modules.load_all();
        diagnostics.extend(self.modules.pre_initialize_all());

        for slot in self.registry.active_slots() {
            if let Err(e) = self.promote(slot) {
                self.fault(slot, "pre-initialize", &e, &mut diagnostics);
                continue;
            }
            self.run_callback(slot, "pre-initialize", &mut diagnostics, |unit, ctx| {
                unit.on_pre_initialized(ctx)
            });
        }

        self.phase = LifecyclePhase::PreInitialized;
        info!("Lifecycle phase complete: {}", self.phase);
        diagnostics
    }

    /// Second barrier: general actions once each, then every per-unit
    /// action for every active unit in load order. At most one action is
    /// outstanding at a time; each is awaited to completion before the
    /// next starts. A failed general action is reported and skipped
    /// without faulting anyone; a failed per-unit action faults its unit
    /// and skips that unit's remaining actions.
    async fn stage(&mut self) -> Vec<Error> {
        let mut diagnostics = Vec::new();

        for action in self.registrar.general_actions_mut() {
            info!("Running general loading action '{}'", action.name());
            if let Err(e) = action.run().await {
                warn!("General loading action '{}' failed: {e}", action.name());
                diagnostics.push(Error::load(action.name(), "staging", e));
            }
        }

        let localization = self.localization.clone().map(localization_action);
        for slot in self.registry.active_slots() {
            let descriptor = self.registry.descriptor_at(slot);
            let failure = run_unit_actions(
                descriptor,
                self.registrar.unit_actions(),
                localization.as_ref(),
            )
            .await;
            if let Some(e) = failure {
                self.fault(slot, "staging", &e, &mut diagnostics);
            }
        }

        self.phase = LifecyclePhase::Staged;
        info!("Lifecycle phase complete: {}", self.phase);
        diagnostics
    }

    /// Third barrier: module and unit initialization callbacks
    fn initialize(&mut self) -> Vec<Error> {
        let mut diagnostics = self.modules.initialize_all();
        for slot in self.registry.active_slots() {
            self.run_callback(slot, "initialize", &mut diagnostics, |unit, ctx| {
                unit.on_initialized(ctx)
            });
        }

        self.phase = LifecyclePhase::Initialized;
        info!("Lifecycle phase complete: {}", self.phase);
        diagnostics
    }

    /// Final barrier: post-initialization callbacks
    fn post_initialize(&mut self) -> Vec<Error> {
        let mut diagnostics = self.modules.post_initialize_all();
        for slot in self.registry.active_slots() {
            self.run_callback(slot, "post-initialize", &mut diagnostics, |unit, ctx| {
                unit.on_post_initialized(ctx)
            });
        }

        self.phase = LifecyclePhase::PostInitialized;
        info!("Lifecycle phase complete: {}", self.phase);
        diagnostics
    }

    /// Instantiate the unit for `slot` from its registered factory. A unit
    /// with no factory is asset-only: it skips callbacks but keeps its
    /// ordered slot for staged contributions.
    fn promote(&mut self, slot: usize) -> Result<(), String> {
        let descriptor = self.registry.descriptor_at(slot);
        if !descriptor.do_lifecycle_actions || descriptor.has_instance() {
            return Ok(());
        }
        let Some(factory) = self.units.get(&descriptor.id) else {
            info!("'{}' registered no unit factory; treating as asset-only", descriptor.id);
            self.registry.descriptor_at_mut(slot).do_lifecycle_actions = false;
            return Ok(());
        };

        let ctx = descriptor.unit_context();
        match factory(&ctx) {
            Ok(instance) => {
                self.registry.descriptor_at_mut(slot).attach_instance(instance);
                Ok(())
            }
            Err(e) => Err(format!("unit factory failed: {e:#}")),
        }
    }

    fn run_callback<F>(
        &mut self,
        slot: usize,
        phase: &str,
        diagnostics: &mut Vec<Error>,
        callback: F,
    ) where
        F: FnOnce(
            &mut dyn crate::descriptor::ModUnit,
            &crate::descriptor::UnitContext,
        ) -> anyhow::Result<()>,
    {
        let descriptor = self.registry.descriptor_at(slot);
        if !descriptor.do_lifecycle_actions {
            return;
        }
        let Some(instance) = descriptor.instance() else {
            return;
        };
        let ctx = descriptor.unit_context();

        let outcome = match instance.lock() {
            Ok(mut unit) => callback(unit.as_mut(), &ctx).map_err(|e| format!("{e:#}")),
            Err(_) => Err("instance mutex poisoned by an earlier panic".to_string()),
        };
        if let Err(e) = outcome {
            self.fault(slot, phase, &e, diagnostics);
        }
    }

    fn fault(&mut self, slot: usize, phase: &str, detail: &str, diagnostics: &mut Vec<Error>) {
        let id = self.registry.descriptor_at(slot).id.clone();
        self.registry.fault(slot, phase, detail);
        diagnostics.push(Error::load(id, phase, detail));
    }
}

/// Run every per-unit action for one unit: asset actions first, then the
/// localization action, then custom actions, each awaited before the next
/// starts. The first failure stops the unit's remaining actions and is
/// returned.
async fn run_unit_actions(
    descriptor: &ModDescriptor,
    actions: &[UnitAction],
    localization: Option<&UnitAction>,
) -> Option<String> {
    let assets = actions.iter().filter(|a| a.is_asset_action());
    let custom = actions.iter().filter(|a| !a.is_asset_action());
    for action in assets.chain(localization).chain(custom) {
        if let Err(e) = action.run(descriptor).await {
            return Some(format!("action '{}' failed: {e}", action.name()));
        }
    }
    None
}
