//! Typed view of the installation-wide config

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::SnovaError;

/// Installation settings read from `common_site_config.json`.
///
/// This is a read-only view. Writes always go through
/// [`ConfigStore`](crate::config::store::ConfigStore) on the raw mapping so
/// keys unknown to this struct are never dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InstallationSettings {
    /// 1 while an update is migrating data
    #[serde(default, deserialize_with = "flag_as_u8")]
    pub maintenance_mode: u8,

    /// 1 while the scheduler must not enqueue jobs
    #[serde(default, deserialize_with = "flag_as_u8")]
    pub pause_scheduler: u8,

    /// Release installations are built from fixed tarballs and never updated
    #[serde(default, deserialize_with = "flag_as_bool")]
    pub release_snova: bool,

    /// Apps were cloned with `--depth 1`
    #[serde(default, deserialize_with = "flag_as_bool")]
    pub shallow_clone: bool,

    /// Installation is production-managed by a process supervisor
    #[serde(default, deserialize_with = "flag_as_bool")]
    pub restart_supervisor_on_update: bool,

    /// Installation is managed by systemd units
    #[serde(default, deserialize_with = "flag_as_bool")]
    pub restart_systemd_on_update: bool,

    /// Command replacing the supervisor restart logic entirely
    #[serde(default)]
    pub supervisor_restart_cmd: Option<String>,

    #[serde(default)]
    pub db_host: Option<String>,

    #[serde(default)]
    pub redis_cache: Option<String>,

    #[serde(default)]
    pub redis_queue: Option<String>,

    #[serde(default)]
    pub redis_socketio: Option<String>,

    /// System user owning the installation
    #[serde(default)]
    pub sparrow_user: Option<String>,
}

impl InstallationSettings {
    /// Build the typed view from a raw config mapping
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, SnovaError> {
        serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| SnovaError::ConfigError(format!("Invalid installation config: {e}")))
    }

    pub fn in_maintenance(&self) -> bool {
        self.maintenance_mode != 0
    }

    /// The override restart command, ignoring blank values
    pub fn restart_override(&self) -> Option<&str> {
        self.supervisor_restart_cmd
            .as_deref()
            .map(str::trim)
            .filter(|cmd| !cmd.is_empty())
    }
}

// Flags are checked by truthiness. Older installations wrote them as
// booleans, newer ones as 0/1.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

fn flag_as_u8<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(u8::from(is_truthy(&Value::deserialize(deserializer)?)))
}

fn flag_as_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(is_truthy(&Value::deserialize(deserializer)?))
}
