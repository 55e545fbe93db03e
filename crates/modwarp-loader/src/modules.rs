//! Internal feature modules and their lifecycle pass
//!
//! Internal modules are the framework's own feature units. They declare
//! unversioned name prerequisites only (no versions, no conflicts), are
//! explicitly registered rather than discovered, and are driven through
//! the same four lifecycle phases as mods, plus a one-time synchronous
//! `load` step unique to modules that runs before anything else.

use modwarp_core::{ConfigStore, Error};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{error, info, warn};

/// One internal feature module
pub trait LifecycleModule: Send {
    /// Unique module name; also names its configuration store
    fn name(&self) -> &str;

    /// Names of modules that must be ordered before this one. A name that
    /// matches no registered module is treated as satisfied.
    fn prerequisites(&self) -> Vec<String> {
        Vec::new()
    }

    /// One-time synchronous setup; runs before any lifecycle phase
    fn load(&mut self, config: &ConfigStore) -> anyhow::Result<()> {
        let _ = config;
        Ok(())
    }

    fn pre_initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn post_initialize(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Manager driving every registered internal module through its lifecycle
pub struct ModuleManager {
    modules: Vec<Box<dyn LifecycleModule>>,
    config_dir: Option<PathBuf>,
    loaded: bool,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self {
            modules: Vec::new(),
            config_dir: None,
            loaded: false,
        }
    }

    /// Directory holding per-module configuration files (`<name>.json`);
    /// modules get in-memory stores when unset
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = Some(dir.into());
        self
    }

    /// Register a module. Duplicate names are a no-op; first wins.
    pub fn register(&mut self, module: Box<dyn LifecycleModule>) {
        if self.modules.iter().any(|m| m.name() == module.name()) {
            warn!(
                "Ignoring duplicate module registration of '{}'; first registration wins",
                module.name()
            );
            return;
        }
        self.modules.push(module);
    }

    /// Registered module names in their current order
    pub fn names(&self) -> Vec<&str> {
        self.modules.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Order modules and run every `load` step. Idempotent: a second call
    /// is a no-op.
    ///
    /// Modules whose prerequisites cannot be ordered are dropped with one
    /// explicit diagnostic each; a module whose `load` fails is dropped
    /// from all further phases. Returned diagnostics mirror the logs.
    pub fn load_all(&mut self) -> Vec<Error> {
        if self.loaded {
            return Vec::new();
        }
        self.loaded = true;

        let mut diagnostics = self.sort_topologically();

        let mut keep = Vec::with_capacity(self.modules.len());
        for mut module in std::mem::take(&mut self.modules) {
            let name = module.name().to_string();
            let config = self.config_store_for(&name);
            info!("Loading module: {name}");
            match module.load(&config) {
                Ok(()) => keep.push(module),
                Err(e) => {
                    error!(
                        "Error loading module '{name}': {e:#}; removing from further initialization"
                    );
                    diagnostics.push(Error::load(&name, "load", format!("{e:#}")));
                }
            }
        }
        self.modules = keep;
        diagnostics
    }

    /// Pre-initialize every loaded module; failures drop the module from
    /// later phases
    pub fn pre_initialize_all(&mut self) -> Vec<Error> {
        self.run_phase("pre-initialize", true, |m| m.pre_initialize())
    }

    /// Initialize every remaining module; failures drop the module from
    /// later phases
    pub fn initialize_all(&mut self) -> Vec<Error> {
        self.run_phase("initialize", true, |m| m.initialize())
    }

    /// Post-initialize every remaining module; the final phase, so
    /// failures are logged but nothing is removed
    pub fn post_initialize_all(&mut self) -> Vec<Error> {
        self.run_phase("post-initialize", false, |m| m.post_initialize())
    }

    fn run_phase<F>(&mut self, phase: &str, remove_on_failure: bool, mut callback: F) -> Vec<Error>
    where
        F: FnMut(&mut dyn LifecycleModule) -> anyhow::Result<()>,
    {
        let mut diagnostics = Vec::new();
        let mut keep = Vec::with_capacity(self.modules.len());

        for mut module in std::mem::take(&mut self.modules) {
            let name = module.name().to_string();
            info!("{phase}: {name}");
            match callback(module.as_mut()) {
                Ok(()) => keep.push(module),
                Err(e) => {
                    error!("Error in {phase} for module '{name}': {e:#}");
                    diagnostics.push(Error::load(&name, phase, format!("{e:#}")));
                    if !remove_on_failure {
                        keep.push(module);
                    }
                }
            }
        }

        self.modules = keep;
        diagnostics
    }

    /// Name-only fixpoint ordering: a module is emitted once every
    /// prerequisite that exists among the candidates has been emitted;
    /// prerequisites naming no registered module are satisfied. When no
    /// further progress is possible the remaining modules are dropped,
    /// each with an explicit cycle diagnostic naming what blocked it.
    fn sort_topologically(&mut self) -> Vec<Error> {
        let known: HashSet<String> = self.modules.iter().map(|m| m.name().to_string()).collect();
        let mut ordered: Vec<Box<dyn LifecycleModule>> = Vec::with_capacity(self.modules.len());
        let mut emitted: HashSet<String> = HashSet::new();
        let mut remaining = std::mem::take(&mut self.modules);

        let max_rounds = remaining.len();
        for _round in 0..max_rounds {
            let mut changed = false;
            let mut still_waiting = Vec::with_capacity(remaining.len());

            for module in remaining {
                let satisfied = module
                    .prerequisites()
                    .iter()
                    .all(|p| !known.contains(p) || emitted.contains(p));
                if satisfied {
                    emitted.insert(module.name().to_string());
                    ordered.push(module);
                    changed = true;
                } else {
                    still_waiting.push(module);
                }
            }

            remaining = still_waiting;
            if remaining.is_empty() || !changed {
                break;
            }
        }

        let mut diagnostics = Vec::new();
        for module in &remaining {
            let blocked_on: Vec<String> = module
                .prerequisites()
                .into_iter()
                .filter(|p| known.contains(p) && !emitted.contains(p))
                .collect();
            let blocked_on = blocked_on.join(", ");
            error!(
                "Module '{}' is part of an unresolved prerequisite cycle (blocked on {blocked_on}); dropping it",
                module.name()
            );
            diagnostics.push(Error::cycle(module.name(), blocked_on));
        }

        self.modules = ordered;
        diagnostics
    }

    fn config_store_for(&self, name: &str) -> ConfigStore {
        match &self.config_dir {
            Some(dir) => ConfigStore::open(dir.join(format!("{name}.json"))).unwrap_or_else(|e| {
                warn!("Could not open config store for module '{name}': {e}; using in-memory");
                ConfigStore::in_memory()
            }),
            None => ConfigStore::in_memory(),
        }
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}
