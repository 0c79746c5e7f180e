//! Supervisor backend

use tracing::{debug, info, warn};

use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::exec::CommandSpec;
use crate::procman::{finish, Backend, RestartOutcome, RestartRequest};

/// Printed by supervisorctl when the socket is not accessible to the caller
pub const PERMISSION_DENIED_MARKER: &str =
    "error: <class 'PermissionError'>, [Errno 13] Permission denied";

/// Group restarted when no installation-specific group is configured
pub const FALLBACK_GROUP: &str = "sparrow:";

const SUDO: &str = "sudo ";

/// Chooses which supervisor group to restart from `supervisorctl status` output.
///
/// supervisor has no structured query for its group layout, so the default
/// implementation matches known group names in the status text.
pub trait GroupSelector: Send + Sync {
    fn select(&self, status: &str, bench_name: &str, web_only: bool) -> String;
}

/// Naming conventions tried in order: web-only group, workers plus web,
/// legacy combined processes group, then [`FALLBACK_GROUP`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusGroupSelector;

impl GroupSelector for StatusGroupSelector {
    fn select(&self, status: &str, bench_name: &str, web_only: bool) -> String {
        let web = format!("{bench_name}-web:");
        let workers = format!("{bench_name}-workers:");
        let processes = format!("{bench_name}-processes:");

        if web_only && status.contains(&web) {
            web
        } else if status.contains(&workers) {
            format!("{workers} {web}")
        } else if status.contains(&processes) {
            processes
        } else {
            FALLBACK_GROUP.to_string()
        }
    }
}

/// Probe supervisor, escalating with sudo when needed, and restart the selected group
pub async fn restart(
    ctx: &BenchContext,
    selector: &dyn GroupSelector,
    request: &RestartRequest,
) -> Result<RestartOutcome, SnovaError> {
    let probe = ctx.run(CommandSpec::captured("supervisorctl status")).await?;

    if probe.is_not_found() {
        warn!("restart failed: Couldn't find supervisorctl in PATH");
        return Ok(RestartOutcome::Skipped {
            reason: "supervisorctl not found in PATH".to_string(),
        });
    }

    let mut sudo = "";
    let mut status = probe.combined();

    if !probe.success() || status.contains(PERMISSION_DENIED_MARKER) {
        debug!("supervisorctl status needs elevated privileges, retrying with sudo");
        sudo = SUDO;
        let escalated = ctx
            .run(CommandSpec::captured(format!("{sudo}supervisorctl status")))
            .await?;
        status = escalated.combined();

        // status exits non-zero while some programs are stopped, the listing is still usable
        if !escalated.success() && status.trim().is_empty() {
            let command = format!("{sudo}supervisorctl status");
            return finish(Backend::Supervisor, &command, escalated, request.strict);
        }
    }

    let group = selector.select(&status, ctx.name(), request.web_only);
    let command = format!("{sudo}supervisorctl restart {group}");
    info!("Restarting supervisor group(s): {}", group);

    let out = ctx.run(CommandSpec::new(command.as_str())).await?;
    finish(Backend::Supervisor, &command, out, request.strict)
}
