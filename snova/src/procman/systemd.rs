//! systemd backend
//!
//! Installations under systemd declare their workers as `Requires=` of a
//! `<bench>.target` unit. They are stopped as a whole and only then started
//! again: a plain `restart` would let new workers come up while old ones
//! still hold the shared resource locks.

use tracing::{info, warn};

use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::exec::CommandSpec;
use crate::procman::{finish, Backend, RestartOutcome, RestartRequest};

/// Parse `systemctl show -p Requires` output into unit names
pub fn parse_requires(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Requires="))
        .flat_map(str::split_whitespace)
        .map(str::to_string)
        .collect()
}

pub async fn restart(ctx: &BenchContext, request: &RestartRequest) -> Result<RestartOutcome, SnovaError> {
    let target = format!("{}.target", ctx.name());
    let show = format!("systemctl show -p Requires {target}");
    let out = ctx.run(CommandSpec::captured(show.as_str())).await?;

    if out.is_not_found() {
        warn!("restart failed: Couldn't find systemctl in PATH");
        return Ok(RestartOutcome::Skipped {
            reason: "systemctl not found in PATH".to_string(),
        });
    }
    if !out.success() {
        return finish(Backend::Systemd, &show, out, request.strict);
    }

    let units = parse_requires(&out.stdout);
    if units.is_empty() {
        warn!("{} declares no units to restart", target);
        return Ok(RestartOutcome::Skipped {
            reason: format!("{target} requires no units"),
        });
    }

    let units = units.join(" ");
    info!("Stopping units of {}: {}", target, units);
    let stop = format!("sudo systemctl stop -- {units}");
    let out = ctx.run(CommandSpec::new(stop.as_str())).await?;
    if !out.success() {
        return finish(Backend::Systemd, &stop, out, request.strict);
    }

    info!("Starting units of {}", target);
    let start = format!("sudo systemctl start -- {units}");
    let out = ctx.run(CommandSpec::new(start.as_str())).await?;
    finish(Backend::Systemd, &start, out, request.strict)
}
