//! Per-site config properties

use serde_json::{json, Value};
use tracing::info;

use crate::config::store::{config_map, ConfigMap, ConfigStore, Scope};
use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::storage::layout::BenchLayout;
use crate::update::steps::BenchSteps;

/// Sites of an installation: directories under `sites/` holding a site config
pub async fn list_sites(layout: &BenchLayout) -> Result<Vec<String>, SnovaError> {
    let sites_dir = layout.sites_dir();
    if !sites_dir.exists().await {
        return Ok(Vec::new());
    }

    let mut sites = Vec::new();
    for dir in sites_dir.list_dirs().await? {
        let Some(name) = dir.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if layout.site_config_file(&name).exists().await {
            sites.push(name);
        }
    }
    Ok(sites)
}

/// Update a property the reverse-proxy config is generated from.
///
/// Fails with [`SnovaError::NoSuchSite`] before writing anything when the
/// site does not exist. Regenerates the reverse-proxy config afterwards when
/// `gen_config` is set.
pub async fn set_nginx_property(
    ctx: &BenchContext,
    steps: &dyn BenchSteps,
    site: &str,
    partial: ConfigMap,
    gen_config: bool,
) -> Result<(), SnovaError> {
    if !steps.list_sites().await?.iter().any(|s| s == site) {
        return Err(SnovaError::NoSuchSite(site.to_string()));
    }

    ctx.config().update(&Scope::site(site), partial).await?;

    if gen_config {
        info!("Regenerating reverse-proxy config");
        steps.regenerate_reverse_proxy_config().await?;
    }
    Ok(())
}

pub async fn set_nginx_port(
    ctx: &BenchContext,
    steps: &dyn BenchSteps,
    site: &str,
    port: u16,
    gen_config: bool,
) -> Result<(), SnovaError> {
    set_nginx_property(ctx, steps, site, config_map(json!({ "nginx_port": port })), gen_config).await
}

pub async fn set_ssl_certificate(
    ctx: &BenchContext,
    steps: &dyn BenchSteps,
    site: &str,
    ssl_certificate: &str,
    gen_config: bool,
) -> Result<(), SnovaError> {
    set_nginx_property(
        ctx,
        steps,
        site,
        config_map(json!({ "ssl_certificate": ssl_certificate })),
        gen_config,
    )
    .await
}

pub async fn set_ssl_certificate_key(
    ctx: &BenchContext,
    steps: &dyn BenchSteps,
    site: &str,
    ssl_certificate_key: &str,
    gen_config: bool,
) -> Result<(), SnovaError> {
    set_nginx_property(
        ctx,
        steps,
        site,
        config_map(json!({ "ssl_certificate_key": ssl_certificate_key })),
        gen_config,
    )
    .await
}

/// Set the URL root a site is served under. Does not touch the reverse proxy.
pub async fn set_url_root(store: &ConfigStore, site: &str, url_root: &str) -> Result<(), SnovaError> {
    let mut partial = ConfigMap::new();
    partial.insert("host_name".to_string(), Value::String(url_root.to_string()));
    store.update(&Scope::site(site), partial).await?;
    Ok(())
}
