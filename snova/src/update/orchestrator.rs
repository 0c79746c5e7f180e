//! Update orchestration
//!
//! Runs the stages of [`UpdateStage`] strictly in order. The first failing
//! stage halts the run. Nothing is rolled back: once maintenance mode is on
//! it stays on until an operator clears it, so no traffic is served against
//! a half-migrated schema.

use std::time::Duration;

use colored::Colorize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::config::store::{config_map, Scope};
use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::procman::{ProcessManagerResolver, RestartOutcome};
use crate::storage::settings::InstallationSettings;
use crate::update::plan::UpdatePlan;
use crate::update::prompt::Prompter;
use crate::update::stage::{UpdateProgress, UpdateStage};
use crate::update::steps::BenchSteps;
use crate::update::version::VersionUpgrade;

/// Branch renamed to `version-11` with the version 12 release
const DEPRECATED_BRANCH: &str = "master";

const BRANCH_GUIDANCE: &str = "'master' branch is renamed to 'version-11' since 'version-12' release.
As of January 2020, the following branches are
version\t\tSparrow\t\t\tSHOPPER
11\t\tversion-11\t\tversion-11
12\t\tversion-12\t\tversion-12
13\t\tversion-13\t\tversion-13
14\t\tdevelop\t\t\tdevelop

Please switch to new branches to get future updates.
To switch to your required branch, run the following commands: snova switch-to-branch [branch-name]";

/// Orchestrator settings that do not come from the command line
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// App whose major version gates confirmation and post-upgrade hooks
    pub primary_app: String,
    /// Apps refused while on [`DEPRECATED_BRANCH`]
    pub tracked_apps: Vec<String>,
    /// Pause after the shallow clone warning
    pub shallow_clone_pause: Duration,
    /// First major version whose asset build needs node
    pub node_required_from: u64,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            primary_app: "sparrow".to_string(),
            tracked_apps: vec!["sparrow".to_string(), "shopper".to_string()],
            shallow_clone_pause: Duration::from_secs(10),
            node_required_from: 6,
        }
    }
}

/// Outcome of a completed update
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub version_upgrade: Option<VersionUpgrade>,
    /// `None` when the restart failed in a way that was downgraded to a warning
    pub restart: Option<RestartOutcome>,
    pub stages: Vec<UpdateStage>,
}

/// Drives one update run
pub struct UpdateOrchestrator<'a> {
    ctx: &'a BenchContext,
    steps: &'a dyn BenchSteps,
    prompter: &'a dyn Prompter,
    options: OrchestratorOptions,
    progress: UpdateProgress,
}

impl<'a> UpdateOrchestrator<'a> {
    pub fn new(ctx: &'a BenchContext, steps: &'a dyn BenchSteps, prompter: &'a dyn Prompter) -> Self {
        Self {
            ctx,
            steps,
            prompter,
            options: OrchestratorOptions::default(),
            progress: UpdateProgress::new(),
        }
    }

    pub fn with_options(mut self, options: OrchestratorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn progress(&self) -> &UpdateProgress {
        &self.progress
    }

    /// Run the update described by `plan`
    pub async fn run(&mut self, plan: &UpdatePlan) -> Result<UpdateReport, SnovaError> {
        match self.run_stages(plan).await {
            Ok(report) => Ok(report),
            Err(e) => {
                self.progress.fail(e.to_string());
                if self.progress.maintenance_on() {
                    error!(
                        "Update halted at {:?}: {}. Maintenance mode is still ON.",
                        self.progress.current(),
                        e
                    );
                    eprintln!(
                        "{}",
                        "Maintenance mode was left ON. Fix the failure above, then run \
                         `snova config set maintenance_mode 0` (and `pause_scheduler 0`) \
                         or re-run `snova update`."
                            .red()
                    );
                } else {
                    error!("Update aborted before any change: {}", e);
                }
                Err(e)
            }
        }
    }

    fn enter(&mut self, stage: UpdateStage) -> Result<(), SnovaError> {
        self.progress.begin(stage).map_err(SnovaError::Internal)
    }

    async fn run_stages(&mut self, plan: &UpdatePlan) -> Result<UpdateReport, SnovaError> {
        // Gate
        self.enter(UpdateStage::Gate)?;
        let settings = self.ctx.config().settings().await?;
        if settings.release_snova {
            return Err(SnovaError::UpgradeBlocked(
                "Release snova detected, cannot update!".to_string(),
            ));
        }
        self.steps.run_internal_patches().await?;
        let settings = self.ctx.config().settings().await?;
        self.progress.complete();

        // Branch check
        self.enter(UpdateStage::BranchCheck)?;
        let installed = self.steps.list_installed_apps().await?;
        self.check_branches(&installed).await?;
        self.progress.complete();

        // Version detect
        self.enter(UpdateStage::VersionDetect)?;
        let version_upgrade = if installed.contains(&self.options.primary_app) {
            let upgrade = VersionUpgrade::detect(self.steps, &self.options.primary_app).await?;
            self.progress.complete();
            Some(upgrade)
        } else {
            self.progress.skip();
            None
        };
        let major = version_upgrade.is_some_and(|v| v.is_major);

        // Confirm
        self.enter(UpdateStage::Confirm)?;
        match version_upgrade {
            Some(upgrade) if upgrade.is_major => {
                self.confirm_major_upgrade(&upgrade, plan.force)?;
                self.progress.complete();
            }
            _ => self.progress.skip(),
        }

        // Shallow clone warning
        self.enter(UpdateStage::ShallowCloneWarning)?;
        if plan.pull && !plan.reset && settings.shallow_clone {
            warn!("shallow_clone is set but --reset was not passed, repositories will be unshallowed");
            println!(
                "{}",
                "shallow_clone is set in your snova config.
However without passing the --reset flag, your repositories will be unshallowed.
To avoid this, cancel this operation and run `snova update --reset`.

Consider the consequences of `git reset --hard` on your apps before you run that.
To avoid seeing this warning, set shallow_clone to false in your common_site_config.json"
                    .yellow()
            );
            tokio::time::sleep(self.options.shallow_clone_pause).await;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        // Validate upgrade
        self.enter(UpdateStage::ValidateUpgrade)?;
        if major || plan.force {
            let target = version_upgrade.map(|v| v.to).unwrap_or_default();
            self.validate_upgrade(target)?;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        // Enter maintenance
        self.enter(UpdateStage::EnterMaintenance)?;
        self.set_maintenance(true).await?;
        self.progress.complete();

        self.enter(UpdateStage::Backup)?;
        if plan.backup {
            println!("Backing up sites...");
            self.steps.backup_all_sites().await?;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        self.enter(UpdateStage::Pull)?;
        if plan.pull {
            println!("Updating apps source...");
            self.steps.pull_apps(&plan.apps, plan.reset).await?;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        self.enter(UpdateStage::Requirements)?;
        if plan.requirements {
            println!("Setting up requirements...");
            self.steps.install_requirements().await?;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        self.enter(UpdateStage::Patch)?;
        if plan.patch {
            println!("Patching sites...");
            self.patch_sites().await?;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        self.enter(UpdateStage::Build)?;
        if plan.build {
            println!("Building assets...");
            self.steps.build_assets().await?;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        self.enter(UpdateStage::PostUpgrade)?;
        if major || plan.force {
            let to = version_upgrade.map(|v| v.to).unwrap_or_default();
            self.post_upgrade(to, &settings).await;
            self.progress.complete();
        } else {
            self.progress.skip();
        }

        // Reload, never restarting front-end web workers only
        self.enter(UpdateStage::Reload)?;
        let mut request = plan.restart.clone();
        request.web_only = false;
        let restart = match ProcessManagerResolver::new(self.ctx).restart(&request).await {
            Ok(outcome) => {
                if let RestartOutcome::Skipped { reason } = &outcome {
                    warn!("Processes were not restarted ({}). Restart them manually.", reason);
                }
                Some(outcome)
            }
            Err(e) if request.strict => return Err(e),
            Err(e) => {
                warn!("Restart failed: {}. Run `snova restart` to retry.", e);
                None
            }
        };
        self.progress.complete();

        // Exit maintenance
        self.enter(UpdateStage::ExitMaintenance)?;
        self.set_maintenance(false).await?;
        self.progress.complete();

        info!("Update completed");
        println!(
            "{}\nSnova: Deployment tool for Sparrow and Sparrow Applications (https://sparrow.io/snova).",
            "_".repeat(80)
        );

        Ok(UpdateReport {
            version_upgrade,
            restart,
            stages: self.progress.completed(),
        })
    }

    async fn check_branches(&self, installed: &[String]) -> Result<(), SnovaError> {
        for app in self
            .options
            .tracked_apps
            .iter()
            .filter(|app| installed.contains(app))
        {
            let branch = self.steps.current_branch(app).await?;
            if branch == DEPRECATED_BRANCH {
                println!("{BRANCH_GUIDANCE}");
                return Err(SnovaError::DeprecatedBranch {
                    app: app.clone(),
                    branch,
                });
            }
        }
        Ok(())
    }

    fn confirm_major_upgrade(&self, upgrade: &VersionUpgrade, force: bool) -> Result<(), SnovaError> {
        if force {
            warn!(
                "Force flag used for a major version change from {} to {}. \
                 This will take significant time to migrate and might break custom apps.",
                upgrade.from, upgrade.to
            );
            return Ok(());
        }

        println!(
            "This update will cause a major version change in Sparrow/SHOPPER from {} to {}.\n\
             This would take significant time to migrate and might break custom apps.",
            upgrade.from, upgrade.to
        );
        if self.prompter.confirm("Do you want to continue?")? {
            Ok(())
        } else {
            Err(SnovaError::Aborted("major version upgrade declined".to_string()))
        }
    }

    fn validate_upgrade(&self, to_version: u64) -> Result<(), SnovaError> {
        if to_version < self.options.node_required_from {
            return Ok(());
        }
        let has_node = ["npm", "node", "nodejs"]
            .iter()
            .any(|exe| self.ctx.which(exe).is_some());
        if has_node {
            Ok(())
        } else {
            Err(SnovaError::UpgradeBlocked(
                "Please install nodejs and npm".to_string(),
            ))
        }
    }

    async fn set_maintenance(&self, on: bool) -> Result<(), SnovaError> {
        let flag = u8::from(on);
        info!("Setting maintenance mode to {}", flag);
        let partial = config_map(json!({ "maintenance_mode": flag, "pause_scheduler": flag }));
        match self.ctx.config().update(&Scope::Installation, partial).await {
            Ok(_) => Ok(()),
            Err(e @ SnovaError::FatalConfig { .. }) => Err(e),
            Err(e) => Err(SnovaError::FatalConfig {
                path: self
                    .ctx
                    .layout()
                    .common_site_config_file()
                    .path()
                    .display()
                    .to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Migrate every site, one at a time. The first failure aborts the run.
    async fn patch_sites(&self) -> Result<(), SnovaError> {
        for site in self.steps.list_sites().await? {
            self.steps
                .run_pending_patches(&site)
                .await
                .map_err(|e| match e {
                    SnovaError::PatchError { .. } => e,
                    other => SnovaError::PatchError {
                        site: site.clone(),
                        reason: other.to_string(),
                    },
                })?;
        }
        Ok(())
    }

    async fn post_upgrade(&self, to_version: u64, settings: &InstallationSettings) {
        println!("{}Your snova was upgraded to version {}", "-".repeat(80), to_version);

        if !settings.restart_supervisor_on_update {
            return;
        }

        if let Err(e) = self.steps.regenerate_cache_config().await {
            warn!("Failed to regenerate redis config: {}", e);
        }
        if let Err(e) = self.steps.regenerate_supervisor_config().await {
            warn!("Failed to regenerate supervisor config: {}", e);
        }
        if let Err(e) = self.steps.regenerate_reverse_proxy_config().await {
            warn!("Failed to regenerate nginx config: {}", e);
        }
        println!(
            "As you have setup your snova for production, you will have to reload \
             configuration for nginx and supervisor. To complete the migration, please \
             run the following commands:\nsudo service nginx restart\nsudo supervisorctl reload"
        );
    }
}
