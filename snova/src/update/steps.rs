//! Steps the update pipeline delegates to external tooling
//!
//! The orchestrator only sees [`BenchSteps`]. [`ShellSteps`] implements it by
//! shelling out to git, pip, yarn and the framework's site helper.

use async_trait::async_trait;
use tracing::{info, warn};

use crate::apps::installed_apps;
use crate::config::site::list_sites;
use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::exec::CommandSpec;
use crate::patches;
use crate::update::version::parse_module_version;

/// Companion tool generating nginx, supervisor and redis configs
pub const SETUP_TOOL: &str = "snova-setup";

/// Collaborator operations consumed by the update pipeline.
///
/// Each call blocks until the underlying work is done and either succeeds
/// or returns the error to propagate.
#[async_trait]
pub trait BenchSteps: Send + Sync {
    /// Apply snova's own pending installation patches
    async fn run_internal_patches(&self) -> Result<(), SnovaError>;

    async fn list_installed_apps(&self) -> Result<Vec<String>, SnovaError>;

    async fn list_sites(&self) -> Result<Vec<String>, SnovaError>;

    async fn current_branch(&self, app: &str) -> Result<String, SnovaError>;

    /// Version of the checked-out source tree
    async fn installed_version(&self, app: &str) -> Result<Option<String>, SnovaError>;

    /// Version at the tip of the tracked remote branch
    async fn upstream_version(&self, app: &str) -> Result<Option<String>, SnovaError>;

    async fn backup_all_sites(&self) -> Result<(), SnovaError>;

    /// Update source trees of `apps`, or of every installed app when empty
    async fn pull_apps(&self, apps: &[String], reset: bool) -> Result<(), SnovaError>;

    async fn install_requirements(&self) -> Result<(), SnovaError>;

    /// Apply pending data migrations of one site. Fails with [`SnovaError::PatchError`].
    async fn run_pending_patches(&self, site: &str) -> Result<(), SnovaError>;

    async fn build_assets(&self) -> Result<(), SnovaError>;

    async fn regenerate_reverse_proxy_config(&self) -> Result<(), SnovaError>;

    async fn regenerate_cache_config(&self) -> Result<(), SnovaError>;

    async fn regenerate_supervisor_config(&self) -> Result<(), SnovaError>;
}

/// [`BenchSteps`] over real commands
pub struct ShellSteps<'a> {
    ctx: &'a BenchContext,
}

impl<'a> ShellSteps<'a> {
    pub fn new(ctx: &'a BenchContext) -> Self {
        Self { ctx }
    }

    fn site_helper(&self, args: &str) -> CommandSpec {
        CommandSpec::new(format!("{} {}", self.ctx.site_helper(), args))
            .cwd(self.ctx.layout().sites_dir().path())
    }

    fn git(&self, app: &str, args: &str) -> CommandSpec {
        CommandSpec::captured(format!("git {args}")).cwd(self.ctx.layout().app_dir(app).path())
    }

    /// `upstream` when configured, otherwise the first remote
    async fn remote(&self, app: &str) -> Result<String, SnovaError> {
        let out = self.ctx.run_checked(self.git(app, "remote")).await?;
        let remotes: Vec<&str> = out.stdout.split_whitespace().collect();
        if remotes.contains(&"upstream") {
            return Ok("upstream".to_string());
        }
        remotes
            .first()
            .map(|r| r.to_string())
            .ok_or_else(|| SnovaError::ConfigError(format!("App {app} has no git remote")))
    }

    async fn setup(&self, what: &str) -> Result<(), SnovaError> {
        self.ctx
            .run_checked(CommandSpec::new(format!("{SETUP_TOOL} {what} --yes")))
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BenchSteps for ShellSteps<'_> {
    async fn run_internal_patches(&self) -> Result<(), SnovaError> {
        let applied = patches::run_pending(self.ctx).await?;
        if !applied.is_empty() {
            info!("Applied internal patches: {}", applied.join(", "));
        }
        Ok(())
    }

    async fn list_installed_apps(&self) -> Result<Vec<String>, SnovaError> {
        installed_apps(self.ctx.layout()).await
    }

    async fn list_sites(&self) -> Result<Vec<String>, SnovaError> {
        list_sites(self.ctx.layout()).await
    }

    async fn current_branch(&self, app: &str) -> Result<String, SnovaError> {
        let out = self
            .ctx
            .run_checked(self.git(app, "rev-parse --abbrev-ref HEAD"))
            .await?;
        Ok(out.stdout.trim().to_string())
    }

    async fn installed_version(&self, app: &str) -> Result<Option<String>, SnovaError> {
        let init = self.ctx.layout().app_dir(app).subdir(app).file("__init__.py");
        if !init.exists().await {
            return Ok(None);
        }
        Ok(parse_module_version(&init.read_string().await?))
    }

    async fn upstream_version(&self, app: &str) -> Result<Option<String>, SnovaError> {
        let remote = self.remote(app).await?;
        let branch = self.current_branch(app).await?;

        let fetch = self
            .ctx
            .run(self.git(app, &format!("fetch --depth=1 --no-tags {remote} {branch}")))
            .await?;
        if !fetch.success() {
            warn!("Could not fetch {}/{} of {}, skipping version check", remote, branch, app);
            return Ok(None);
        }

        let show = self
            .ctx
            .run(self.git(app, &format!("show {remote}/{branch}:{app}/__init__.py")))
            .await?;
        if !show.success() {
            return Ok(None);
        }
        Ok(parse_module_version(&show.stdout))
    }

    async fn backup_all_sites(&self) -> Result<(), SnovaError> {
        for site in self.list_sites().await? {
            info!("Backing up {}", site);
            self.ctx
                .run_checked(self.site_helper(&format!("--site {site} backup")))
                .await?;
        }
        Ok(())
    }

    async fn pull_apps(&self, apps: &[String], reset: bool) -> Result<(), SnovaError> {
        let apps = if apps.is_empty() {
            self.list_installed_apps().await?
        } else {
            apps.to_vec()
        };
        let shallow = self.ctx.config().settings().await?.shallow_clone;

        for app in &apps {
            if !self.ctx.layout().app_dir(app).subdir(".git").exists().await {
                warn!("{} is not a git repository, skipping", app);
                continue;
            }

            let remote = self.remote(app).await?;
            let branch = self.current_branch(app).await?;
            info!("Pulling {} from {}/{}", app, remote, branch);

            let app_dir = self.ctx.layout().app_dir(app).path().to_path_buf();
            if reset {
                let depth = if shallow { "--depth=1 --no-tags " } else { "" };
                self.ctx
                    .run_checked(CommandSpec::new(format!("git fetch {depth}{remote} {branch}")).cwd(&app_dir))
                    .await?;
                self.ctx
                    .run_checked(CommandSpec::new(format!("git reset --hard {remote}/{branch}")).cwd(&app_dir))
                    .await?;
            } else {
                self.ctx
                    .run_checked(CommandSpec::new(format!("git pull --rebase {remote} {branch}")).cwd(&app_dir))
                    .await?;
            }
        }
        Ok(())
    }

    async fn install_requirements(&self) -> Result<(), SnovaError> {
        let python = self.ctx.python();
        let apps = self.list_installed_apps().await?;

        self.ctx
            .run_checked(CommandSpec::new(format!(
                "{} -m pip install --quiet --upgrade pip",
                python.display()
            )))
            .await?;

        for app in &apps {
            info!("Installing python dependencies of {}", app);
            self.ctx
                .run_checked(CommandSpec::new(format!(
                    "{} -m pip install --quiet --upgrade -e {}",
                    python.display(),
                    self.ctx.layout().app_dir(app).path().display()
                )))
                .await?;
        }

        if self.ctx.which("yarn").is_none() {
            warn!("yarn not found, skipping node dependencies. Install it with `npm install -g yarn`");
            return Ok(());
        }
        for app in &apps {
            let app_dir = self.ctx.layout().app_dir(app);
            if app_dir.file("package.json").exists().await {
                info!("Installing node dependencies of {}", app);
                self.ctx
                    .run_checked(CommandSpec::new("yarn install").cwd(app_dir.path()))
                    .await?;
            }
        }
        Ok(())
    }

    async fn run_pending_patches(&self, site: &str) -> Result<(), SnovaError> {
        info!("Migrating {}", site);
        let out = self.ctx.run(self.site_helper(&format!("--site {site} migrate"))).await?;
        if out.success() {
            Ok(())
        } else {
            Err(SnovaError::PatchError {
                site: site.to_string(),
                reason: format!("migrate exited with {:?}", out.code),
            })
        }
    }

    async fn build_assets(&self) -> Result<(), SnovaError> {
        self.ctx
            .run_checked(self.site_helper("build").env("SNOVA_DEVELOPER", "1"))
            .await?;
        Ok(())
    }

    async fn regenerate_reverse_proxy_config(&self) -> Result<(), SnovaError> {
        self.setup("nginx").await
    }

    async fn regenerate_cache_config(&self) -> Result<(), SnovaError> {
        self.setup("redis").await
    }

    async fn regenerate_supervisor_config(&self) -> Result<(), SnovaError> {
        self.setup("supervisor").await
    }
}
