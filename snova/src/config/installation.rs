//! Installation-wide connection settings

use serde_json::Value;

use crate::config::store::{ConfigMap, ConfigStore, Scope};
use crate::errors::SnovaError;

async fn set_key(store: &ConfigStore, key: &str, value: String) -> Result<(), SnovaError> {
    let mut partial = ConfigMap::new();
    partial.insert(key.to_string(), Value::String(value));
    store.update(&Scope::Installation, partial).await?;
    Ok(())
}

pub async fn set_mariadb_host(store: &ConfigStore, host: &str) -> Result<(), SnovaError> {
    set_key(store, "db_host", host.to_string()).await
}

pub async fn set_redis_cache_host(store: &ConfigStore, host: &str) -> Result<(), SnovaError> {
    set_key(store, "redis_cache", redis_uri(host)).await
}

pub async fn set_redis_queue_host(store: &ConfigStore, host: &str) -> Result<(), SnovaError> {
    set_key(store, "redis_queue", redis_uri(host)).await
}

pub async fn set_redis_socketio_host(store: &ConfigStore, host: &str) -> Result<(), SnovaError> {
    set_key(store, "redis_socketio", redis_uri(host)).await
}

fn redis_uri(host: &str) -> String {
    format!("redis://{host}")
}
