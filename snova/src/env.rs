//! Python environment migration

use std::path::{Path, PathBuf};

use colored::Colorize;
use tracing::{info, warn};
use url::Url;

use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::exec::CommandSpec;

const DEFAULT_REDIS_PORT: u16 = 6379;

/// Primary app, installed before every other app
const PRIMARY_APP: &str = "sparrow";

/// Result of flushing the cache before the environment is replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheFlush {
    Flushed { port: u16 },
    /// `redis-cli` is not on `PATH`
    RedisCliMissing,
    /// No `redis_cache` in the installation config
    NotConfigured,
}

/// Flush the installation's redis cache with `redis-cli`
pub async fn flush_redis_cache(ctx: &BenchContext) -> Result<CacheFlush, SnovaError> {
    let settings = ctx.config().settings().await?;
    let Some(uri) = settings.redis_cache.as_deref() else {
        return Ok(CacheFlush::NotConfigured);
    };
    let Some(redis_cli) = ctx.which("redis-cli") else {
        return Ok(CacheFlush::RedisCliMissing);
    };

    let port = redis_port(uri)?;
    let redis = format!("{} -p {}", redis_cli.display(), port);

    info!("Clearing Redis Cache...");
    ctx.run_checked(CommandSpec::captured(format!("{redis} FLUSHALL"))).await?;
    info!("Clearing Redis DataBase...");
    ctx.run_checked(CommandSpec::captured(format!("{redis} FLUSHDB"))).await?;

    Ok(CacheFlush::Flushed { port })
}

fn redis_port(uri: &str) -> Result<u16, SnovaError> {
    let url = Url::parse(uri)
        .map_err(|e| SnovaError::ConfigError(format!("Invalid redis_cache URI {uri}: {e}")))?;
    Ok(url.port().unwrap_or(DEFAULT_REDIS_PORT))
}

/// Replace the installation's python environment with one built from `python`.
///
/// `python` is a name looked up on `PATH` or a path. When `backup` is set
/// the old environment is moved under `archived/envs/` instead of being
/// deleted by `venv`.
pub async fn migrate_env(ctx: &BenchContext, python: &str, backup: bool) -> Result<(), SnovaError> {
    let python = resolve_python(ctx, python)?;
    let env_dir = ctx.layout().env_dir();

    if python.starts_with(env_dir.path()) {
        println!(
            "{}",
            "Python version supplied is present in currently sourced virtual environment.\n\
             `deactivate` the current virtual environment before migrating environments."
                .yellow()
        );
        return Err(SnovaError::ValidationError(format!(
            "{} lives inside the environment being replaced",
            python.display()
        )));
    }

    match flush_redis_cache(ctx).await {
        Ok(CacheFlush::Flushed { port }) => info!("Flushed redis cache on port {}", port),
        Ok(CacheFlush::RedisCliMissing) => warn!("redis-cli not found, cache was not flushed"),
        Ok(CacheFlush::NotConfigured) => warn!("redis_cache is not configured, cache was not flushed"),
        Err(e) => warn!(
            "Please ensure Redis Connections are running or Daemonized. ({})",
            e
        ),
    }

    if backup && env_dir.exists().await {
        let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
        let target = ctx.layout().archived_envs_dir().path().join(stamp);
        info!("Backing up Virtual Environment to {}", target.display());
        env_dir.rename_to(&target).await?;
    }

    info!("Setting up a New Virtual {} Environment", python.display());
    ctx.run_checked(CommandSpec::new(format!(
        "{} -m venv {}",
        python.display(),
        env_dir.path().display()
    )))
    .await?;

    let env_python = env_dir.path().join("bin").join("python");
    install_app(ctx, &env_python, PRIMARY_APP).await?;
    for app in crate::apps::installed_apps(ctx.layout()).await? {
        if app != PRIMARY_APP {
            install_app(ctx, &env_python, &app).await?;
        }
    }

    info!("Migration Successful to {}", python.display());
    Ok(())
}

fn resolve_python(ctx: &BenchContext, python: &str) -> Result<PathBuf, SnovaError> {
    let candidate = Path::new(python);
    if candidate.components().count() > 1 {
        return Ok(std::path::absolute(candidate)?);
    }
    ctx.which(python)
        .ok_or_else(|| SnovaError::ValidationError(format!("{python} not found on PATH")))
}

async fn install_app(ctx: &BenchContext, env_python: &Path, app: &str) -> Result<(), SnovaError> {
    ctx.run_checked(CommandSpec::new(format!(
        "{} -m pip install --upgrade -e {}",
        env_python.display(),
        ctx.layout().app_dir(app).path().display()
    )))
    .await?;
    Ok(())
}
