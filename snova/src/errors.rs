//! Error types for snova

use thiserror::Error;

/// Main error type for snova
#[derive(Error, Debug)]
pub enum SnovaError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Persisting a config document failed. Always fatal.
    #[error("Failed to persist config {path}: {reason}")]
    FatalConfig { path: String, reason: String },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// A site's data migration failed.
    #[error("Patch error on site {site}: {reason}")]
    PatchError { site: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Upgrade blocked: {0}")]
    UpgradeBlocked(String),

    #[error("App {app} is on the deprecated branch '{branch}'")]
    DeprecatedBranch { app: String, branch: String },

    #[error("Aborted: {0}")]
    Aborted(String),

    #[error("No such site: {0}")]
    NoSuchSite(String),

    #[error("Command `{command}` failed with {}: {output}", exit_code_label(*.code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

fn exit_code_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "no exit status".to_string(),
    }
}
