//! JSON config persistence
//!
//! Two kinds of documents live under `sites/`: one installation-wide config
//! and one config per site. Both are plain string-keyed mappings.
//!
//! Writes go to a temp file that is renamed over the target. A crash between
//! the two leaves a stray temp file but never a truncated config.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::errors::SnovaError;
use crate::filesys::file::File;
use crate::storage::layout::BenchLayout;
use crate::storage::settings::InstallationSettings;

/// A config mapping
pub type ConfigMap = Map<String, Value>;

/// Which config document to address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    /// `sites/common_site_config.json`
    Installation,
    /// `sites/<site>/site_config.json`
    Site(String),
}

impl Scope {
    pub fn site(name: impl Into<String>) -> Self {
        Scope::Site(name.into())
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Installation => write!(f, "installation config"),
            Scope::Site(site) => write!(f, "site config of {site}"),
        }
    }
}

/// Key/value store over the installation's JSON config files
#[derive(Debug, Clone)]
pub struct ConfigStore {
    layout: BenchLayout,
}

impl ConfigStore {
    pub fn new(layout: BenchLayout) -> Self {
        Self { layout }
    }

    fn file(&self, scope: &Scope) -> File {
        match scope {
            Scope::Installation => self.layout.common_site_config_file(),
            Scope::Site(site) => self.layout.site_config_file(site),
        }
    }

    /// Read a config.
    ///
    /// A missing site config reads as an empty mapping. The installation
    /// config must exist once the installation is initialized, so its
    /// absence is a [`SnovaError::ConfigError`].
    pub async fn get(&self, scope: &Scope) -> Result<ConfigMap, SnovaError> {
        let file = self.file(scope);
        if !file.exists().await {
            return match scope {
                Scope::Site(_) => Ok(ConfigMap::new()),
                Scope::Installation => Err(SnovaError::ConfigError(format!(
                    "{} not found, is {} a snova installation?",
                    file.path().display(),
                    self.layout.base_dir().display()
                ))),
            };
        }
        read_map(&file).await
    }

    /// Overwrite a config with `config`
    pub async fn put(&self, scope: &Scope, config: &ConfigMap) -> Result<(), SnovaError> {
        let file = self.file(scope);
        debug!("Writing {}", scope);
        file.write_json(config)
            .await
            .map_err(|e| SnovaError::FatalConfig {
                path: file.path().display().to_string(),
                reason: e.to_string(),
            })
    }

    /// Merge `partial` into a config at the top level and persist the result.
    ///
    /// Nested values in `partial` replace existing ones wholesale. An absent
    /// installation config is created, so host setters work on a fresh
    /// installation.
    pub async fn update(&self, scope: &Scope, partial: ConfigMap) -> Result<ConfigMap, SnovaError> {
        let file = self.file(scope);
        let mut config = if file.exists().await {
            read_map(&file).await?
        } else {
            ConfigMap::new()
        };

        config.extend(partial);
        self.put(scope, &config).await?;
        Ok(config)
    }

    /// Typed view of the installation config
    pub async fn settings(&self) -> Result<InstallationSettings, SnovaError> {
        let map = self.get(&Scope::Installation).await?;
        InstallationSettings::from_map(&map)
    }
}

async fn read_map(file: &File) -> Result<ConfigMap, SnovaError> {
    match file.read_json::<Value>().await? {
        Value::Object(map) => Ok(map),
        other => Err(SnovaError::ConfigError(format!(
            "{} must hold a JSON object, found {}",
            file.path().display(),
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build a [`ConfigMap`] from `json!` object literals
pub fn config_map(value: Value) -> ConfigMap {
    match value {
        Value::Object(map) => map,
        _ => ConfigMap::new(),
    }
}
