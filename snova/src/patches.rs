//! Internal installation patches
//!
//! Compiled-in fixes for data written by older snova releases. Each patch
//! runs once per installation; its id is appended to `patches.txt` after it
//! succeeds. Patches must be idempotent since a crash between applying one
//! and recording it re-runs it on the next invocation.

use tracing::{debug, info};

use crate::config::site::list_sites;
use crate::config::store::{ConfigMap, Scope};
use crate::context::BenchContext;
use crate::domains::{coalesce, domains_from_config};
use crate::errors::SnovaError;

/// Registered patches, in application order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalPatch {
    /// Merge domain entries sharing a name in every site config
    CoalesceSiteDomains,
}

impl InternalPatch {
    pub const ALL: [InternalPatch; 1] = [InternalPatch::CoalesceSiteDomains];

    /// Id recorded in the patch log
    pub fn id(&self) -> &'static str {
        match self {
            InternalPatch::CoalesceSiteDomains => "coalesce_site_domains",
        }
    }

    async fn apply(&self, ctx: &BenchContext) -> Result<(), SnovaError> {
        match self {
            InternalPatch::CoalesceSiteDomains => coalesce_site_domains(ctx).await,
        }
    }
}

/// Apply every patch not yet recorded. Returns the ids applied by this call.
pub async fn run_pending(ctx: &BenchContext) -> Result<Vec<String>, SnovaError> {
    let log = ctx.layout().patches_log_file();
    let done = if log.exists().await {
        log.read_lines().await?
    } else {
        Vec::new()
    };

    let mut applied = Vec::new();
    for patch in InternalPatch::ALL {
        if done.iter().any(|id| id == patch.id()) {
            debug!("Patch {} already applied", patch.id());
            continue;
        }

        info!("Applying internal patch {}", patch.id());
        patch.apply(ctx).await?;
        log.append_line(patch.id()).await?;
        applied.push(patch.id().to_string());
    }
    Ok(applied)
}

async fn coalesce_site_domains(ctx: &BenchContext) -> Result<(), SnovaError> {
    for site in list_sites(ctx.layout()).await? {
        let scope = Scope::site(site.as_str());
        let config = ctx.config().get(&scope).await?;
        let domains = domains_from_config(&config, &site)?;

        let merged = coalesce(&domains);
        if merged.len() == domains.len() {
            continue;
        }

        info!(
            "Merged {} duplicate domain entries of {}",
            domains.len() - merged.len(),
            site
        );
        let mut partial = ConfigMap::new();
        partial.insert("domains".to_string(), serde_json::to_value(&merged)?);
        ctx.config().update(&scope, partial).await?;
    }
    Ok(())
}
