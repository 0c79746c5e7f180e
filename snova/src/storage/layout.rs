//! Installation layout on disk

use std::path::{Path, PathBuf};

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Paths of a snova installation ("bench")
#[derive(Debug, Clone)]
pub struct BenchLayout {
    /// Root directory of the installation
    pub base_dir: PathBuf,
}

impl BenchLayout {
    /// Create a new layout rooted at `base_dir`
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Directory holding every site plus the installation-wide config
    pub fn sites_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("sites"))
    }

    /// Installation-wide config shared by every site
    pub fn common_site_config_file(&self) -> File {
        self.sites_dir().file("common_site_config.json")
    }

    /// Directory of a single site
    pub fn site_dir(&self, site: &str) -> Dir {
        self.sites_dir().subdir(site)
    }

    /// Config of a single site
    pub fn site_config_file(&self, site: &str) -> File {
        self.site_dir(site).file("site_config.json")
    }

    /// List of installed apps, one per line
    pub fn apps_txt_file(&self) -> File {
        self.sites_dir().file("apps.txt")
    }

    /// Source trees of installed apps
    pub fn apps_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("apps"))
    }

    pub fn app_dir(&self, app: &str) -> Dir {
        self.apps_dir().subdir(app)
    }

    /// Python virtual environment
    pub fn env_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("env"))
    }

    /// Archived python environments
    pub fn archived_envs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("archived").join("envs"))
    }

    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Socket created by overmind when it manages this installation
    pub fn overmind_socket(&self) -> File {
        File::new(self.base_dir.join(".overmind.sock"))
    }

    /// Record of applied internal patches
    pub fn patches_log_file(&self) -> File {
        File::new(self.base_dir.join("patches.txt"))
    }
}

impl Default for BenchLayout {
    fn default() -> Self {
        Self::new(".")
    }
}
