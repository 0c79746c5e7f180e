//! Per-run installation context
//!
//! Everything a command needs to know about the installation it operates
//! on, constructed once in `main` and passed down explicitly. Executable
//! lookups are memoized here for the lifetime of the run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;
use walkdir::WalkDir;

use crate::config::store::ConfigStore;
use crate::errors::SnovaError;
use crate::exec::{CommandOutput, CommandRunner, CommandSpec};
use crate::storage::layout::BenchLayout;
use crate::utils::bench_name;

/// Context of one snova invocation against one installation
pub struct BenchContext {
    layout: BenchLayout,
    name: String,
    config: ConfigStore,
    runner: Arc<dyn CommandRunner>,
    executables: Mutex<HashMap<String, Option<PathBuf>>>,
    env_commands: Mutex<HashMap<String, PathBuf>>,
}

impl BenchContext {
    /// Create a context for the installation at `path`
    pub fn new(path: impl AsRef<Path>, runner: Arc<dyn CommandRunner>) -> Result<Self, SnovaError> {
        let path = std::path::absolute(path.as_ref())?;
        let layout = BenchLayout::new(&path);
        Ok(Self {
            name: bench_name(&path),
            config: ConfigStore::new(layout.clone()),
            layout,
            runner,
            executables: Mutex::new(HashMap::new()),
            env_commands: Mutex::new(HashMap::new()),
        })
    }

    pub fn layout(&self) -> &BenchLayout {
        &self.layout
    }

    /// Installation name, used as the prefix of supervisor groups and systemd units
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn runner(&self) -> &dyn CommandRunner {
        self.runner.as_ref()
    }

    /// Run a command from the installation root
    pub async fn run(&self, spec: CommandSpec) -> Result<CommandOutput, SnovaError> {
        let spec = self.rooted(spec);
        self.runner.run(&spec).await
    }

    /// Run a command from the installation root, failing on non-zero exit
    pub async fn run_checked(&self, spec: CommandSpec) -> Result<CommandOutput, SnovaError> {
        let spec = self.rooted(spec);
        self.runner.run_checked(&spec).await
    }

    fn rooted(&self, spec: CommandSpec) -> CommandSpec {
        if spec.cwd.is_some() {
            spec
        } else {
            spec.cwd(self.layout.base_dir())
        }
    }

    /// Locate an executable on `PATH`, memoized per run
    pub fn which(&self, name: &str) -> Option<PathBuf> {
        let mut cache = self
            .executables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .entry(name.to_string())
            .or_insert_with(|| {
                let found = which::which(name).ok();
                debug!("Resolved executable {} -> {:?}", name, found);
                found
            })
            .clone()
    }

    /// Pin the result of [`which`](Self::which) for `name`
    pub fn set_executable(&self, name: &str, path: Option<PathBuf>) {
        self.executables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.to_string(), path);
    }

    /// Path of a command inside the installation's python environment.
    ///
    /// Environments created by some venv builds nest binaries one level
    /// deeper (`env/local/bin`), so the env is searched before falling back
    /// to `env/bin/<cmd>`.
    pub fn env_cmd(&self, cmd: &str) -> PathBuf {
        let mut cache = self
            .env_commands
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(path) = cache.get(cmd) {
            return path.clone();
        }

        let env_dir = self.layout.env_dir().path().to_path_buf();
        let found = WalkDir::new(&env_dir)
            .max_depth(4)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .find(|entry| {
                entry.file_name() == cmd
                    && entry
                        .path()
                        .parent()
                        .and_then(Path::file_name)
                        .is_some_and(|dir| dir == "bin")
            })
            .map(|entry| entry.into_path())
            .unwrap_or_else(|| env_dir.join("bin").join(cmd));

        cache.insert(cmd.to_string(), found.clone());
        found
    }

    /// The installation's python interpreter
    pub fn python(&self) -> PathBuf {
        self.env_cmd("python")
    }

    /// Command prefix of the framework's site helper, run from `sites/`
    pub fn site_helper(&self) -> String {
        format!(
            "{} -m sparrow.utils.snova_helper sparrow",
            self.python().display()
        )
    }
}
