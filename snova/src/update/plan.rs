//! Update plan

use crate::procman::RestartRequest;
use crate::utils::parse_app_list;

/// Update options as given on the command line
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub pull: bool,
    pub patch: bool,
    pub build: bool,
    pub requirements: bool,
    /// Comma or space separated apps to pull
    pub apps: Option<String>,
    pub no_backup: bool,
    pub force: bool,
    pub reset: bool,
    pub restart_systemd: bool,
    pub strict_restart: bool,
}

/// Which stages of an update run are enabled. Built once per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdatePlan {
    pub pull: bool,
    pub patch: bool,
    pub build: bool,
    pub requirements: bool,
    pub backup: bool,
    /// Apps to pull, empty for all installed apps
    pub apps: Vec<String>,
    /// Skip the major-version confirmation and run post-upgrade hooks regardless
    pub force: bool,
    /// Hard-reset app source trees to their remotes instead of rebasing
    pub reset: bool,
    pub restart: RestartRequest,
}

impl UpdatePlan {
    /// Without any step selected every step runs
    pub fn from_options(options: &UpdateOptions) -> Self {
        let (pull, patch, build, requirements) =
            if options.pull || options.patch || options.build || options.requirements {
                (options.pull, options.patch, options.build, options.requirements)
            } else {
                (true, true, true, true)
            };

        let apps = match (&options.apps, pull) {
            (Some(apps), true) => parse_app_list(apps),
            _ => Vec::new(),
        };

        Self {
            pull,
            patch,
            build,
            requirements,
            backup: !options.no_backup,
            apps,
            force: options.force,
            reset: options.reset,
            restart: RestartRequest {
                web_only: false,
                strict: options.strict_restart,
                systemd: options.restart_systemd,
            },
        }
    }
}

impl Default for UpdatePlan {
    fn default() -> Self {
        Self::from_options(&UpdateOptions::default())
    }
}
