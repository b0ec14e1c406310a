//! Installed applications.
//!
//! # Data Flow
//! ```text
//! repository/
//!   <app>/webapp.toml
//!     → descriptor::load_descriptor
//!     → GraphCompiler::compile
//!     → Arc<Application>
//!     → copy-on-write map swap (ArcSwap)
//!
//! Request path:
//!     Registry::get(name) → Arc<Application> snapshot (lock-free)
//! ```
//!
//! # Design Decisions
//! - Readers never block: every mutation builds a new map and swaps it in
//! - Writers are serialised by a mutex so concurrent reloads cannot lose
//!   each other's updates
//! - A failing application keeps its previous version installed, found
//!   through the name its directory was last mounted under
//! - Two directories declaring the same name: the first (sorted) wins,
//!   the second is reported as failed

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use arc_swap::ArcSwap;
use serde::Serialize;

use crate::compiler::GraphCompiler;
use crate::descriptor::load_descriptor;
use crate::error::{CompileError, TechnicalError};
use crate::model::application::Application;
use crate::model::component::ComponentFactory;
use crate::observability::metrics;

type AppMap = HashMap<String, Arc<Application>>;

/// Application directory → name it is installed under.
type MountMap = HashMap<PathBuf, String>;

/// Outcome of a repository reload.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct ReloadReport {
    pub loaded: Vec<String>,
    pub removed: Vec<String>,
    pub failed: Vec<ReloadFailure>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReloadFailure {
    pub name: String,
    pub error: String,
}

pub struct Registry {
    apps: ArcSwap<AppMap>,
    /// Serialises writers; holds the mounts of the last reload.
    write_lock: Mutex<MountMap>,
    factory: Arc<dyn ComponentFactory>,
    root: PathBuf,
    descriptor_file: String,
}

impl Registry {
    pub fn new(
        factory: Arc<dyn ComponentFactory>,
        root: impl Into<PathBuf>,
        descriptor_file: impl Into<String>,
    ) -> Self {
        Self {
            apps: ArcSwap::from_pointee(AppMap::new()),
            write_lock: Mutex::new(MountMap::new()),
            factory,
            root: root.into(),
            descriptor_file: descriptor_file.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn get(&self, name: &str) -> Option<Arc<Application>> {
        self.apps.load().get(name).cloned()
    }

    /// Installed applications, sorted by name.
    pub fn list(&self) -> Vec<Arc<Application>> {
        let mut apps: Vec<_> = self.apps.load().values().cloned().collect();
        apps.sort_by(|a, b| a.name().cmp(b.name()));
        apps
    }

    pub fn names(&self) -> Vec<String> {
        self.list().iter().map(|a| a.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.apps.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.load().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, MountMap> {
        // Mounts are only replaced wholesale, so a poisoned map is still consistent.
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install or replace an application under its own name.
    pub fn install(&self, app: Application) -> Arc<Application> {
        let app = Arc::new(app);
        let _guard = self.lock();
        let mut next = AppMap::clone(&self.apps.load());
        let previous = next.insert(app.name().to_string(), app.clone());
        self.apps.store(Arc::new(next));
        tracing::info!(
            app = app.name(),
            handlers = app.handlers().len(),
            replaced = previous.is_some(),
            "Application installed"
        );
        app
    }

    pub fn remove(&self, name: &str) -> Option<Arc<Application>> {
        let _guard = self.lock();
        let mut next = AppMap::clone(&self.apps.load());
        let removed = next.remove(name)?;
        self.apps.store(Arc::new(next));
        tracing::info!(app = name, "Application removed");
        Some(removed)
    }

    /// Compile the application in `dir` without installing it.
    ///
    /// The application is named by its descriptor, or by the directory.
    pub fn load_app(&self, dir: &Path) -> Result<Application, CompileError> {
        compile_dir(self.factory.as_ref(), dir, &self.descriptor_file)
    }

    /// Recompile every application in the repository.
    pub fn reload(&self) -> Result<ReloadReport, TechnicalError> {
        let dirs = app_dirs(&self.root, &self.descriptor_file)?;
        let mut report = ReloadReport::default();

        let mut mounts = self.lock();
        let current = self.apps.load_full();
        let mut next = AppMap::new();
        let mut next_mounts = MountMap::new();
        let mut owners: HashMap<String, PathBuf> = HashMap::new();

        for dir in dirs {
            let outcome = self.load_app(&dir).and_then(|app| match owners.get(app.name()) {
                Some(owner) => Err(CompileError::DuplicateName(format!(
                    "webapp '{}' is already declared by {}",
                    app.name(),
                    owner.display()
                ))),
                None => Ok(app),
            });
            match outcome {
                Ok(app) => {
                    let name = app.name().to_string();
                    report.loaded.push(name.clone());
                    owners.insert(name.clone(), dir.clone());
                    next_mounts.insert(dir, name.clone());
                    next.insert(name, Arc::new(app));
                }
                Err(e) => {
                    let name = mounts.get(&dir).cloned().unwrap_or_else(|| dir_name(&dir));
                    tracing::error!(
                        app = %name,
                        dir = %dir.display(),
                        error = %e,
                        "Failed to load application"
                    );
                    if let (Some(previous), false) = (current.get(&name), owners.contains_key(&name)) {
                        owners.insert(name.clone(), dir.clone());
                        next_mounts.insert(dir, name.clone());
                        next.insert(name.clone(), previous.clone());
                    }
                    report.failed.push(ReloadFailure {
                        name,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.removed = current
            .keys()
            .filter(|name| !next.contains_key(*name))
            .cloned()
            .collect();
        report.loaded.sort();
        report.removed.sort();
        self.apps.store(Arc::new(next));
        *mounts = next_mounts;

        metrics::record_reload("loaded", report.loaded.len());
        metrics::record_reload("failed", report.failed.len());
        metrics::record_reload("removed", report.removed.len());
        tracing::info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            removed = report.removed.len(),
            "Repository reloaded"
        );
        Ok(report)
    }
}

fn dir_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Compile one application directory.
pub fn compile_dir(
    factory: &dyn ComponentFactory,
    dir: &Path,
    descriptor_file: &str,
) -> Result<Application, CompileError> {
    let descriptor = load_descriptor(&dir.join(descriptor_file))?;
    let name = descriptor.name.unwrap_or_else(|| dir_name(dir));
    GraphCompiler::new(factory).compile(&name, Some(dir), descriptor.declarations)
}

/// Sub-directories of `root` that contain a descriptor, sorted.
fn app_dirs(root: &Path, descriptor_file: &str) -> Result<Vec<PathBuf>, TechnicalError> {
    let io = |source: std::io::Error| TechnicalError::Io {
        path: root.to_path_buf(),
        source,
    };
    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(root).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.is_dir() && path.join(descriptor_file).is_file() {
            dirs.push(path);
        }
    }
    dirs.sort();
    Ok(dirs)
}
