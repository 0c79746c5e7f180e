//! Installed apps

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::config::site::list_sites;
use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::exec::CommandSpec;
use crate::storage::layout::BenchLayout;
use crate::utils::parse_app_list;

/// Apps of an installation in install order.
///
/// `sites/apps.txt` is authoritative. Without it every directory under
/// `apps/` counts as installed.
pub async fn installed_apps(layout: &BenchLayout) -> Result<Vec<String>, SnovaError> {
    let apps_txt = layout.apps_txt_file();
    if apps_txt.exists().await {
        let apps = apps_txt
            .read_lines()
            .await?
            .iter()
            .flat_map(|line| parse_app_list(line))
            .collect();
        return Ok(apps);
    }

    let apps_dir = layout.apps_dir();
    if !apps_dir.exists().await {
        return Ok(Vec::new());
    }
    Ok(apps_dir
        .list_dirs()
        .await?
        .iter()
        .filter_map(|dir| dir.file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.starts_with('.'))
        .collect())
}

/// Refuse to remove `app` while any site still has it installed.
///
/// Asks the framework for every site's apps in one JSON call first. Older
/// framework versions lack the JSON format, in which case each site is
/// queried on its own and the plain listing searched for the app name.
pub async fn validate_app_removal(ctx: &BenchContext, app: &str) -> Result<(), SnovaError> {
    println!("Checking if app installed on active sites...");

    match apps_by_site(ctx).await? {
        Some(by_site) => {
            for (site, apps) in &by_site {
                if apps.iter().any(|installed| installed == app) {
                    return Err(installed_on(site));
                }
            }
        }
        None => {
            info!("Listing apps as JSON is unsupported, checking sites one by one");
            for site in list_sites(ctx.layout()).await? {
                let out = ctx
                    .run_checked(
                        CommandSpec::captured(format!("{} --site {} list-apps", ctx.site_helper(), site))
                            .cwd(ctx.layout().sites_dir().path()),
                    )
                    .await?;
                if contains_word(&out.stdout, app) {
                    return Err(installed_on(&site));
                }
            }
        }
    }
    Ok(())
}

/// `None` when the framework cannot produce the JSON listing
async fn apps_by_site(ctx: &BenchContext) -> Result<Option<BTreeMap<String, Vec<String>>>, SnovaError> {
    let out = ctx
        .run(
            CommandSpec::captured(format!("{} --site all list-apps --format json", ctx.site_helper()))
                .cwd(ctx.layout().sites_dir().path()),
        )
        .await?;
    if !out.success() {
        debug!("list-apps --format json exited with {:?}", out.code);
        return Ok(None);
    }
    Ok(serde_json::from_str(&out.stdout).ok())
}

fn installed_on(site: &str) -> SnovaError {
    SnovaError::ValidationError(format!("Cannot remove, app is installed on site: {site}"))
}

/// Whether `word` appears in `text` delimited by non-word characters
fn contains_word(text: &str, word: &str) -> bool {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|token| token == word)
}
