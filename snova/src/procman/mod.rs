//! Process-manager restart resolution
//!
//! snova never supervises worker processes itself. It finds out which
//! process manager runs the installation and asks that one to restart:
//!
//! 1. an explicit `supervisor_restart_cmd` from the installation config
//! 2. overmind, when its executable and the installation's socket exist
//! 3. systemd, when requested or configured via `restart_systemd_on_update`
//! 4. supervisor, probed through `supervisorctl status`

pub mod overmind;
pub mod supervisor;
pub mod systemd;

use std::fmt;

use tracing::{info, warn};

use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::exec::{CommandOutput, CommandSpec};
use crate::procman::supervisor::{GroupSelector, StatusGroupSelector};

/// Process manager backends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Installation-configured restart command
    Override,
    Overmind,
    Systemd,
    Supervisor,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Backend::Override => "supervisor_restart_cmd",
            Backend::Overmind => "overmind",
            Backend::Systemd => "systemd",
            Backend::Supervisor => "supervisor",
        };
        f.write_str(name)
    }
}

/// What to restart and how to treat failures
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestartRequest {
    /// Restart only the web workers where the backend supports it
    pub web_only: bool,
    /// Raise restart command failures instead of reporting them
    pub strict: bool,
    /// Use systemd even if the installation config does not ask for it
    pub systemd: bool,
}

/// Result of a restart attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartOutcome {
    Restarted { backend: Backend, command: String },
    /// No usable process manager was found. Not an error.
    Skipped { reason: String },
    /// The restart command failed and the request was not strict
    Failed {
        backend: Backend,
        command: String,
        output: String,
    },
}

impl RestartOutcome {
    pub fn is_restarted(&self) -> bool {
        matches!(self, RestartOutcome::Restarted { .. })
    }
}

/// Picks the active process manager and restarts the installation's workers
pub struct ProcessManagerResolver<'a> {
    ctx: &'a BenchContext,
    selector: Box<dyn GroupSelector>,
}

impl<'a> ProcessManagerResolver<'a> {
    pub fn new(ctx: &'a BenchContext) -> Self {
        Self {
            ctx,
            selector: Box::new(StatusGroupSelector),
        }
    }

    /// Replace the supervisor group selection heuristic
    pub fn with_selector(mut self, selector: Box<dyn GroupSelector>) -> Self {
        self.selector = selector;
        self
    }

    pub async fn restart(&self, request: &RestartRequest) -> Result<RestartOutcome, SnovaError> {
        let settings = self.ctx.config().settings().await?;

        if let Some(cmd) = settings.restart_override() {
            info!("Restarting with configured command: {}", cmd);
            let out = self.ctx.run(CommandSpec::new(cmd)).await?;
            return finish(Backend::Override, cmd, out, request.strict);
        }

        if overmind::is_active(self.ctx).await {
            return overmind::restart(self.ctx, request).await;
        }

        if request.systemd || settings.restart_systemd_on_update {
            return systemd::restart(self.ctx, request).await;
        }

        supervisor::restart(self.ctx, self.selector.as_ref(), request).await
    }
}

/// Classify a finished restart command
pub(crate) fn finish(
    backend: Backend,
    command: &str,
    out: CommandOutput,
    strict: bool,
) -> Result<RestartOutcome, SnovaError> {
    if out.success() {
        info!("Restarted processes via {}", backend);
        return Ok(RestartOutcome::Restarted {
            backend,
            command: command.to_string(),
        });
    }

    let output = out.combined().trim().to_string();
    if strict {
        return Err(SnovaError::CommandFailed {
            command: command.to_string(),
            code: out.code,
            output,
        });
    }

    warn!(
        "Restarting via {} failed. Use `snova restart` to retry.",
        backend
    );
    Ok(RestartOutcome::Failed {
        backend,
        command: command.to_string(),
        output,
    })
}
