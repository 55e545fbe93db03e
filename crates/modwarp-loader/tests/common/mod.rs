//! Shared fixtures for integration tests
#![allow(dead_code)]

use modwarp_loader::{ModUnit, UnitContext, MANIFEST_FILE_NAME};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub type Journal = Arc<Mutex<Vec<String>>>;

pub fn journal() -> Journal {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

/// Serialize one dependency declaration as manifest JSON
pub fn dep_json(id: &str, min: &str, max: &str) -> String {
    format!(r#"{{ "id": "{id}", "version": {{ "min": "{min}", "max": "{max}" }} }}"#)
}

/// A complete manifest body for a mod with the given dependencies
pub fn manifest_json(id: &str, version: &str, deps: &[String]) -> String {
    format!(
        r#"{{ "spec": "2.0", "mod_id": "{id}", "name": "{id}",
             "version": "{version}", "dependencies": [{}] }}"#,
        deps.join(",")
    )
}

/// Write a mod folder with the given manifest body; returns the folder
pub fn write_mod_folder(root: &Path, folder: &str, manifest: &str) -> PathBuf {
    let dir = root.join(folder);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(MANIFEST_FILE_NAME), manifest).unwrap();
    dir
}

/// Write a simple mod with no dependencies
pub fn write_simple_mod(root: &Path, folder: &str, id: &str, version: &str) -> PathBuf {
    write_mod_folder(root, folder, &manifest_json(id, version, &[]))
}

/// Unit implementation recording every lifecycle callback it receives
pub struct JournalUnit {
    pub id: String,
    pub journal: Journal,
    pub fail_in: Option<&'static str>,
}

impl JournalUnit {
    pub fn factory(
        journal: Journal,
        fail_in: Option<&'static str>,
    ) -> impl Fn(&UnitContext) -> anyhow::Result<Box<dyn ModUnit>> + Send + 'static {
        move |ctx: &UnitContext| {
            Ok(Box::new(JournalUnit {
                id: ctx.id.clone(),
                journal: journal.clone(),
                fail_in,
            }) as Box<dyn ModUnit>)
        }
    }

    fn record(&self, phase: &str) -> anyhow::Result<()> {
        self.journal
            .lock()
            .unwrap()
            .push(format!("{}:{}", self.id, phase));
        if self.fail_in == Some(phase) {
            anyhow::bail!("simulated {phase} failure");
        }
        Ok(())
    }
}

impl ModUnit for JournalUnit {
    fn on_pre_initialized(&mut self, _ctx: &UnitContext) -> anyhow::Result<()> {
        self.record("pre")
    }

    fn on_initialized(&mut self, _ctx: &UnitContext) -> anyhow::Result<()> {
        self.record("init")
    }

    fn on_post_initialized(&mut self, _ctx: &UnitContext) -> anyhow::Result<()> {
        self.record("post")
    }
}
