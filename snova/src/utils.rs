//! Utility functions

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Version information for snova
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionInfo {
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
}

/// Get version information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: option_env!("GIT_HASH").unwrap_or("unknown").to_string(),
        build_time: option_env!("BUILD_TIME").unwrap_or("unknown").to_string(),
    }
}

/// Installation name: the final component of its directory
pub fn bench_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snova".to_string())
}

/// Split a user-supplied app list on commas and whitespace
pub fn parse_app_list(apps: &str) -> Vec<String> {
    apps.split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|app| !app.is_empty())
        .map(str::to_string)
        .collect()
}
