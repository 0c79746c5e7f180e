//! Command-line interface
//!
//! ## Commands
//!
//! - `snova update` - Update apps, migrate sites and restart processes
//! - `snova restart` - Restart the installation's processes
//! - `snova domains` - Manage the domains a site answers to
//! - `snova config` - Read and write the installation config
//! - `snova site` - Set per-site reverse-proxy properties
//! - `snova validate-app-removal` - Check no site still has an app installed
//! - `snova migrate-env` - Rebuild the python environment
//! - `snova version` - Print build information

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;
use tracing::info;

use crate::config::installation;
use crate::config::site;
use crate::config::store::{ConfigMap, Scope};
use crate::context::BenchContext;
use crate::domains::{self, AddDomain, DomainEntry};
use crate::errors::SnovaError;
use crate::exec::shell::ShellRunner;
use crate::logs::LogLevel;
use crate::procman::{ProcessManagerResolver, RestartOutcome, RestartRequest};
use crate::update::orchestrator::UpdateOrchestrator;
use crate::update::plan::{UpdateOptions, UpdatePlan};
use crate::update::prompt::{AssumeYes, Prompter, StdinPrompter};
use crate::update::steps::ShellSteps;
use crate::utils::version_info;

/// Snova - manage multi-tenant Sparrow installations.
#[derive(Debug, Parser)]
#[command(name = "snova")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Installation directory.
    #[arg(long, global = true, env = "SNOVA_PATH", default_value = ".")]
    pub bench: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Log as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Level implied by the flags
    pub fn log_level(&self) -> LogLevel {
        if self.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Info
        }
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Update apps, migrate sites and restart processes.
    Update(UpdateArgs),
    /// Restart the installation's processes.
    Restart(RestartArgs),
    /// Manage site domains.
    #[command(subcommand)]
    Domains(DomainsCommand),
    /// Read and write the installation config.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Set per-site properties.
    #[command(subcommand)]
    Site(SiteCommand),
    /// Fail if any site still has the app installed.
    ValidateAppRemoval {
        /// App to check.
        app: String,
    },
    /// Rebuild the python environment with another interpreter.
    MigrateEnv {
        /// Python executable name or path.
        python: String,
        /// Archive the current environment instead of replacing it.
        #[arg(long)]
        backup: bool,
    },
    /// Print version information as JSON.
    Version,
}

/// Arguments of `snova update`.
#[derive(Debug, Args)]
pub struct UpdateArgs {
    /// Pull app source trees.
    #[arg(long)]
    pub pull: bool,
    /// Run site migrations.
    #[arg(long)]
    pub patch: bool,
    /// Build assets.
    #[arg(long)]
    pub build: bool,
    /// Install python and node requirements.
    #[arg(long)]
    pub requirements: bool,
    /// Apps to pull, comma separated.
    #[arg(long)]
    pub apps: Option<String>,
    /// Skip backing up sites.
    #[arg(long)]
    pub no_backup: bool,
    /// Proceed with a major upgrade without asking.
    #[arg(long)]
    pub force: bool,
    /// Hard reset app source trees to their remotes.
    #[arg(long)]
    pub reset: bool,
    /// Restart systemd units instead of supervisor.
    #[arg(long)]
    pub restart_systemd: bool,
    /// Fail the update if the restart command fails.
    #[arg(long)]
    pub strict_restart: bool,
    /// Answer yes to every confirmation.
    #[arg(long, short)]
    pub yes: bool,
}

impl UpdateArgs {
    fn options(&self) -> UpdateOptions {
        UpdateOptions {
            pull: self.pull,
            patch: self.patch,
            build: self.build,
            requirements: self.requirements,
            apps: self.apps.clone(),
            no_backup: self.no_backup,
            force: self.force,
            reset: self.reset,
            restart_systemd: self.restart_systemd,
            strict_restart: self.strict_restart,
        }
    }
}

/// Arguments of `snova restart`.
#[derive(Debug, Args)]
pub struct RestartArgs {
    /// Restart web workers only.
    #[arg(long)]
    pub web: bool,
    /// Restart systemd units.
    #[arg(long)]
    pub systemd: bool,
    /// Fail if the restart command fails.
    #[arg(long)]
    pub strict: bool,
}

/// `snova domains` subcommands.
#[derive(Debug, Subcommand)]
pub enum DomainsCommand {
    /// Add a domain to a site.
    Add {
        site: String,
        domain: String,
        #[arg(long)]
        ssl_certificate: Option<String>,
        #[arg(long)]
        ssl_certificate_key: Option<String>,
    },
    /// Remove a domain from a site.
    Remove { site: String, domain: String },
    /// Replace a site's domains with a JSON list, if they differ.
    Sync { site: String, domains: String },
    /// Print a site's domains.
    List { site: String },
}

/// `snova config` subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print a key of the installation config.
    Get { key: String },
    /// Set a key of the installation config. Values are parsed as JSON when possible.
    Set { key: String, value: String },
    /// Set the database host.
    SetDbHost { host: String },
    /// Set the redis cache host.
    SetRedisCacheHost { host: String },
    /// Set the redis queue host.
    SetRedisQueueHost { host: String },
    /// Set the redis socketio host.
    SetRedisSocketioHost { host: String },
}

/// `snova site` subcommands.
#[derive(Debug, Subcommand)]
pub enum SiteCommand {
    /// Set the port nginx serves a site on.
    SetNginxPort {
        site: String,
        port: u16,
        /// Do not regenerate the nginx config.
        #[arg(long)]
        no_gen: bool,
    },
    /// Set a site's SSL certificate path.
    SetSslCertificate {
        site: String,
        path: String,
        #[arg(long)]
        no_gen: bool,
    },
    /// Set a site's SSL certificate key path.
    SetSslKey {
        site: String,
        path: String,
        #[arg(long)]
        no_gen: bool,
    },
    /// Set the URL root a site is served under.
    SetUrlRoot { site: String, url_root: String },
}

/// Run the parsed command line
pub async fn execute(cli: Cli) -> Result<(), SnovaError> {
    if let Commands::Version = cli.command {
        println!("{}", serde_json::to_string_pretty(&version_info())?);
        return Ok(());
    }

    let ctx = BenchContext::new(&cli.bench, Arc::new(ShellRunner::new()))?;
    let steps = ShellSteps::new(&ctx);

    match cli.command {
        Commands::Update(args) => {
            let plan = UpdatePlan::from_options(&args.options());
            let prompter: Box<dyn Prompter> = if args.yes {
                Box::new(AssumeYes)
            } else {
                Box::new(StdinPrompter)
            };
            let report = UpdateOrchestrator::new(&ctx, &steps, prompter.as_ref())
                .run(&plan)
                .await?;
            info!("Completed stages: {:?}", report.stages);
        }
        Commands::Restart(args) => {
            let request = RestartRequest {
                web_only: args.web,
                strict: args.strict,
                systemd: args.systemd,
            };
            match ProcessManagerResolver::new(&ctx).restart(&request).await? {
                RestartOutcome::Restarted { command, .. } => info!("Ran `{}`", command),
                RestartOutcome::Skipped { reason } => println!("{}", reason.yellow()),
                RestartOutcome::Failed { command, output, .. } => {
                    eprintln!("{}", format!("`{command}` failed:\n{output}").red());
                }
            }
        }
        Commands::Domains(command) => domains_command(&ctx, command).await?,
        Commands::Config(command) => config_command(&ctx, command).await?,
        Commands::Site(command) => match command {
            SiteCommand::SetNginxPort { site, port, no_gen } => {
                site::set_nginx_port(&ctx, &steps, &site, port, !no_gen).await?
            }
            SiteCommand::SetSslCertificate { site, path, no_gen } => {
                site::set_ssl_certificate(&ctx, &steps, &site, &path, !no_gen).await?
            }
            SiteCommand::SetSslKey { site, path, no_gen } => {
                site::set_ssl_certificate_key(&ctx, &steps, &site, &path, !no_gen).await?
            }
            SiteCommand::SetUrlRoot { site, url_root } => {
                site::set_url_root(ctx.config(), &site, &url_root).await?
            }
        },
        Commands::ValidateAppRemoval { app } => crate::apps::validate_app_removal(&ctx, &app).await?,
        Commands::MigrateEnv { python, backup } => crate::env::migrate_env(&ctx, &python, backup).await?,
        Commands::Version => {}
    }
    Ok(())
}

async fn domains_command(ctx: &BenchContext, command: DomainsCommand) -> Result<(), SnovaError> {
    let store = ctx.config();
    match command {
        DomainsCommand::Add {
            site,
            domain,
            ssl_certificate,
            ssl_certificate_key,
        } => {
            let entry = DomainEntry::new(&domain, ssl_certificate.as_deref(), ssl_certificate_key.as_deref());
            if domains::add_site_domain(store, &site, entry).await? == AddDomain::AlreadyExists {
                println!("{}", format!("Domain {domain} already exists").yellow());
            }
        }
        DomainsCommand::Remove { site, domain } => {
            domains::remove_site_domain(store, &site, &domain).await?;
        }
        DomainsCommand::Sync { site, domains: proposed } => {
            let proposed: Vec<DomainEntry> = serde_json::from_str(&proposed)
                .map_err(|e| SnovaError::ValidationError(format!("Invalid domains list: {e}")))?;
            if !domains::sync_site_domains(store, &site, &proposed).await? {
                println!("Domains of {site} are up to date");
            }
        }
        DomainsCommand::List { site } => {
            for entry in domains::get_domains(store, &site).await? {
                println!("{}", entry.name());
            }
        }
    }
    Ok(())
}

async fn config_command(ctx: &BenchContext, command: ConfigCommand) -> Result<(), SnovaError> {
    let store = ctx.config();
    match command {
        ConfigCommand::Get { key } => {
            let config = store.get(&Scope::Installation).await?;
            match config.get(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(value)?),
                None => return Err(SnovaError::ConfigError(format!("{key} is not set"))),
            }
        }
        ConfigCommand::Set { key, value } => {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            let mut partial = ConfigMap::new();
            partial.insert(key, value);
            store.update(&Scope::Installation, partial).await?;
        }
        ConfigCommand::SetDbHost { host } => installation::set_mariadb_host(store, &host).await?,
        ConfigCommand::SetRedisCacheHost { host } => installation::set_redis_cache_host(store, &host).await?,
        ConfigCommand::SetRedisQueueHost { host } => installation::set_redis_queue_host(store, &host).await?,
        ConfigCommand::SetRedisSocketioHost { host } => {
            installation::set_redis_socketio_host(store, &host).await?
        }
    }
    Ok(())
}
