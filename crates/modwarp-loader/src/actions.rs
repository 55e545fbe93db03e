//! Staged loading actions
//!
//! Between pre-initialization and initialization the orchestrator runs a
//! stage of registered actions: general actions that run once for the whole
//! process, and per-unit actions that run for every active unit in load
//! order. Mods and the host register actions through [`LoadingRegistrar`]
//! before the lifecycle starts.

use crate::descriptor::ModDescriptor;
use async_trait::async_trait;
use std::any::Any;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Outcome of one action; the message is surfaced in the fault log
pub type ActionResult = Result<(), String>;

/// A general staged action, run once per process during the staged phase
#[async_trait]
pub trait LoadingAction: Send {
    fn name(&self) -> &str;

    async fn run(&mut self) -> ActionResult;
}

/// General action wrapping a plain closure
pub struct FunctionAction {
    name: String,
    func: Box<dyn FnMut() -> ActionResult + Send>,
}

impl FunctionAction {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: FnMut() -> ActionResult + Send + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }
}

#[async_trait]
impl LoadingAction for FunctionAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self) -> ActionResult {
        (self.func)()
    }
}

/// Opaque handle to a loaded asset
pub type AssetHandle = Arc<dyn Any + Send + Sync>;

/// One asset produced by a provider, keyed by its name
pub struct NamedAsset {
    pub name: String,
    pub handle: AssetHandle,
}

/// Source of label-addressed assets, supplied by the host
pub trait AssetProvider: Send + Sync {
    /// Whether any asset carries the given label
    fn label_exists(&self, label: &str) -> bool;

    /// Load every asset carrying the given label
    fn load_by_label(&self, label: &str) -> Result<Vec<NamedAsset>, String>;
}

/// General action loading every asset under one label.
///
/// An absent label is a skip, not a failure: providers legitimately ship
/// without some optional labels.
pub struct LabelAction {
    name: String,
    label: String,
    provider: Arc<dyn AssetProvider>,
    handler: Arc<dyn Fn(&NamedAsset) -> ActionResult + Send + Sync>,
}

impl LabelAction {
    pub fn new<H>(label: impl Into<String>, provider: Arc<dyn AssetProvider>, handler: H) -> Self
    where
        H: Fn(&NamedAsset) -> ActionResult + Send + Sync + 'static,
    {
        let label = label.into();
        Self {
            name: format!("label '{label}'"),
            label,
            provider,
            handler: Arc::new(handler),
        }
    }
}

#[async_trait]
impl LoadingAction for LabelAction {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&mut self) -> ActionResult {
        if !self.provider.label_exists(&self.label) {
            info!("Skipping loading assets for label '{}'", self.label);
            return Ok(());
        }
        let assets = self.provider.load_by_label(&self.label)?;
        debug!("Loaded {} asset(s) for label '{}'", assets.len(), self.label);
        for asset in &assets {
            (self.handler)(asset)?;
        }
        Ok(())
    }
}

/// Sink for localization sources found in unit folders
pub trait LocalizationSink: Send + Sync {
    fn add_source(&self, text: &str) -> Result<(), String>;
}

/// Handler for one asset file found under a unit's asset folder; receives
/// the asset's lowercased key and its path on disk
pub type AssetPathHandler = Arc<dyn Fn(&str, &Path) -> ActionResult + Send + Sync>;

/// Per-unit handler for custom registered actions
pub type UnitActionFn = Arc<dyn Fn(&ModDescriptor) -> ActionResult + Send + Sync>;

/// A per-unit staged action, run for every active unit in load order.
///
/// The async seam: an action that completes later (a bundle load, a handle
/// resolving elsewhere) suspends here and the stage waits for it before
/// touching the next action or unit.
#[async_trait]
pub trait UnitLoadingAction: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, descriptor: &ModDescriptor) -> ActionResult;
}

enum UnitActionKind {
    Custom(UnitActionFn),
    Flow(Arc<dyn UnitLoadingAction>),
    AssetFolder {
        subfolder: String,
        extension: Option<String>,
        handler: AssetPathHandler,
    },
}

/// One registered per-unit action
pub struct UnitAction {
    name: String,
    kind: UnitActionKind,
}

impl UnitAction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn is_asset_action(&self) -> bool {
        matches!(self.kind, UnitActionKind::AssetFolder { .. })
    }

    pub(crate) async fn run(&self, descriptor: &ModDescriptor) -> ActionResult {
        match &self.kind {
            UnitActionKind::Custom(func) => func(descriptor),
            UnitActionKind::Flow(action) => action.run(descriptor).await,
            UnitActionKind::AssetFolder {
                subfolder,
                extension,
                handler,
            } => run_asset_folder(descriptor, subfolder, extension.as_deref(), handler),
        }
    }
}

/// Walk `<folder>/assets/<subfolder>` and hand each matching file to the
/// handler under its lowercased `<id>/<subfolder>/<relative path>` key
fn run_asset_folder(
    descriptor: &ModDescriptor,
    subfolder: &str,
    extension: Option<&str>,
    handler: &AssetPathHandler,
) -> ActionResult {
    let Some(folder) = &descriptor.folder else {
        return Ok(());
    };
    let root = folder.join("assets").join(subfolder);
    if !root.is_dir() {
        debug!("'{}' has no {subfolder} assets", descriptor.id);
        return Ok(());
    }

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| format!("could not walk {subfolder} assets: {e}"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(wanted) = extension {
            let matches = entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(wanted))
                .unwrap_or(false);
            if !matches {
                continue;
            }
        }
        let relative = entry
            .path()
            .strip_prefix(&root)
            .map_err(|e| e.to_string())?
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let key = format!("{}/{subfolder}/{relative}", descriptor.id).to_lowercase();
        handler(&key, entry.path())?;
    }
    Ok(())
}

/// Read every localization source under `<folder>/localizations` into the
/// sink; csv and i2csv files are recognized
fn run_localizations(descriptor: &ModDescriptor, sink: &Arc<dyn LocalizationSink>) -> ActionResult {
    let Some(folder) = &descriptor.folder else {
        return Ok(());
    };
    let root = folder.join("localizations");
    if !root.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(&root).sort_by_file_name() {
        let entry = entry.map_err(|e| format!("could not walk localizations: {e}"))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let recognized = entry
            .path()
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv") || ext.eq_ignore_ascii_case("i2csv"))
            .unwrap_or(false);
        if !recognized {
            continue;
        }
        let text = std::fs::read_to_string(entry.path())
            .map_err(|e| format!("unreadable localization {:?}: {e}", entry.path()))?;
        sink.add_source(&text)?;
    }
    Ok(())
}

pub(crate) fn localization_action(sink: Arc<dyn LocalizationSink>) -> UnitAction {
    UnitAction {
        name: "localizations".to_string(),
        kind: UnitActionKind::Custom(Arc::new(move |descriptor| {
            run_localizations(descriptor, &sink)
        })),
    }
}

/// Registration point for staged actions.
///
/// General actions run once each; per-unit actions run for every active
/// unit in load order, in registration order.
#[derive(Default)]
pub struct LoadingRegistrar {
    general: Vec<Box<dyn LoadingAction>>,
    per_unit: Vec<UnitAction>,
}

impl LoadingRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a general action, run once during the staged phase
    pub fn register_general_action(&mut self, action: Box<dyn LoadingAction>) {
        debug!("Registered general loading action '{}'", action.name());
        self.general.push(action);
    }

    /// Register a custom per-unit action (first registration of a name wins)
    pub fn register_unit_action<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(&ModDescriptor) -> ActionResult + Send + Sync + 'static,
    {
        self.push_unit_action(UnitAction {
            name: name.into(),
            kind: UnitActionKind::Custom(Arc::new(func)),
        });
    }

    /// Register an asynchronous per-unit action (first registration of a
    /// name wins)
    pub fn register_unit_loading_action(&mut self, action: Arc<dyn UnitLoadingAction>) {
        self.push_unit_action(UnitAction {
            name: action.name().to_string(),
            kind: UnitActionKind::Flow(action),
        });
    }

    /// Register a per-unit asset-folder action: every matching file under
    /// each unit's `assets/<subfolder>` is handed to the handler
    pub fn register_asset_action<H>(
        &mut self,
        name: impl Into<String>,
        subfolder: impl Into<String>,
        extension: Option<&str>,
        handler: H,
    ) where
        H: Fn(&str, &Path) -> ActionResult + Send + Sync + 'static,
    {
        self.push_unit_action(UnitAction {
            name: name.into(),
            kind: UnitActionKind::AssetFolder {
                subfolder: subfolder.into(),
                extension: extension.map(str::to_string),
                handler: Arc::new(handler),
            },
        });
    }

    fn push_unit_action(&mut self, action: UnitAction) {
        if self.per_unit.iter().any(|a| a.name == action.name) {
            warn!(
                "Per-unit action '{}' already registered; keeping the first",
                action.name
            );
            return;
        }
        debug!("Registered per-unit loading action '{}'", action.name);
        self.per_unit.push(action);
    }

    pub(crate) fn general_actions_mut(&mut self) -> &mut [Box<dyn LoadingAction>] {
        &mut self.general
    }

    pub(crate) fn unit_actions(&self) -> &[UnitAction] {
        &self.per_unit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modwarp_core::ConfigStore;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn descriptor_with_folder(id: &str, folder: PathBuf) -> ModDescriptor {
        let metadata = serde_json::from_str(&format!(
            r#"{{ "spec": "2.0", "mod_id": "{id}", "name": "{id}", "version": "1.0" }}"#
        ))
        .unwrap();
        ModDescriptor::discovered(metadata, folder, ConfigStore::in_memory())
    }

    struct EmptyProvider;
    impl AssetProvider for EmptyProvider {
        fn label_exists(&self, _label: &str) -> bool {
            false
        }
        fn load_by_label(&self, _label: &str) -> Result<Vec<NamedAsset>, String> {
            Err("should not be called".to_string())
        }
    }

    struct OneAssetProvider;
    impl AssetProvider for OneAssetProvider {
        fn label_exists(&self, label: &str) -> bool {
            label == "ui"
        }
        fn load_by_label(&self, _label: &str) -> Result<Vec<NamedAsset>, String> {
            Ok(vec![NamedAsset {
                name: "panel".to_string(),
                handle: Arc::new(42u32),
            }])
        }
    }

    #[tokio::test]
    async fn test_function_action_runs_closure() {
        let mut action = FunctionAction::new("probe", || Ok(()));
        assert_eq!(action.name(), "probe");
        assert!(action.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_label_action_skips_missing_label() {
        let mut action = LabelAction::new("ui", Arc::new(EmptyProvider), |_| {
            Err("handler must not run".to_string())
        });
        assert!(action.run().await.is_ok());
    }

    #[tokio::test]
    async fn test_label_action_hands_assets_to_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let mut action = LabelAction::new("ui", Arc::new(OneAssetProvider), move |asset| {
            record.lock().unwrap().push(asset.name.clone());
            Ok(())
        });
        action.run().await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["panel"]);
    }

    #[tokio::test]
    async fn test_asset_folder_action_keys_and_filters() {
        let dir = tempdir().unwrap();
        let assets = dir.path().join("assets").join("textures");
        std::fs::create_dir_all(assets.join("nested")).unwrap();
        std::fs::write(assets.join("rock.png"), b"").unwrap();
        std::fs::write(assets.join("nested").join("Moss.PNG"), b"").unwrap();
        std::fs::write(assets.join("notes.txt"), b"").unwrap();

        let descriptor = descriptor_with_folder("Com.Example.Art", dir.path().to_path_buf());

        let seen = Arc::new(Mutex::new(Vec::new()));
        let record = seen.clone();
        let mut registrar = LoadingRegistrar::new();
        registrar.register_asset_action("textures", "textures", Some("png"), move |key, _path| {
            record.lock().unwrap().push(key.to_string());
            Ok(())
        });

        registrar.unit_actions()[0].run(&descriptor).await.unwrap();
        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "com.example.art/textures/nested/moss.png",
                "com.example.art/textures/rock.png",
            ]
        );
    }

    #[tokio::test]
    async fn test_asset_folder_action_skips_units_without_assets() {
        let dir = tempdir().unwrap();
        let descriptor = descriptor_with_folder("com.example.bare", dir.path().to_path_buf());

        let mut registrar = LoadingRegistrar::new();
        registrar.register_asset_action("textures", "textures", None, |_, _| {
            Err("must not run".to_string())
        });
        assert!(registrar.unit_actions()[0].run(&descriptor).await.is_ok());
    }

    #[tokio::test]
    async fn test_localization_action_feeds_sink() {
        struct Collecting(Mutex<Vec<String>>);
        impl LocalizationSink for Collecting {
            fn add_source(&self, text: &str) -> Result<(), String> {
                self.0.lock().unwrap().push(text.to_string());
                Ok(())
            }
        }

        let dir = tempdir().unwrap();
        let loc = dir.path().join("localizations");
        std::fs::create_dir_all(&loc).unwrap();
        std::fs::write(loc.join("en.csv"), "key,value").unwrap();
        std::fs::write(loc.join("readme.md"), "ignored").unwrap();

        let descriptor = descriptor_with_folder("com.example.loc", dir.path().to_path_buf());
        let sink = Arc::new(Collecting(Mutex::new(Vec::new())));
        let action = localization_action(sink.clone());

        action.run(&descriptor).await.unwrap();
        assert_eq!(*sink.0.lock().unwrap(), vec!["key,value"]);
    }

    #[tokio::test]
    async fn test_async_unit_action_suspends_and_completes() {
        struct DeferredBundleLoad {
            journal: Arc<Mutex<Vec<String>>>,
        }

        #[async_trait]
        impl UnitLoadingAction for DeferredBundleLoad {
            fn name(&self) -> &str {
                "bundle load"
            }

            async fn run(&self, descriptor: &ModDescriptor) -> ActionResult {
                tokio::task::yield_now().await;
                self.journal.lock().unwrap().push(descriptor.id.clone());
                Ok(())
            }
        }

        let journal = Arc::new(Mutex::new(Vec::new()));
        let mut registrar = LoadingRegistrar::new();
        registrar.register_unit_loading_action(Arc::new(DeferredBundleLoad {
            journal: journal.clone(),
        }));

        let dir = tempdir().unwrap();
        let descriptor = descriptor_with_folder("com.example.deferred", dir.path().to_path_buf());
        registrar.unit_actions()[0].run(&descriptor).await.unwrap();
        assert_eq!(*journal.lock().unwrap(), vec!["com.example.deferred"]);
    }

    #[tokio::test]
    async fn test_duplicate_unit_action_name_keeps_first() {
        let counter = Arc::new(Mutex::new(0u32));
        let first = counter.clone();
        let mut registrar = LoadingRegistrar::new();
        registrar.register_unit_action("once", move |_| {
            *first.lock().unwrap() += 1;
            Ok(())
        });
        registrar.register_unit_action("once", |_| Err("second must be dropped".to_string()));

        assert_eq!(registrar.unit_actions().len(), 1);
        let dir = tempdir().unwrap();
        let descriptor = descriptor_with_folder("com.example.a", dir.path().to_path_buf());
        assert!(registrar.unit_actions()[0].run(&descriptor).await.is_ok());
        assert_eq!(*counter.lock().unwrap(), 1);
    }
}
