//! Overmind backend

use tracing::info;

use crate::context::BenchContext;
use crate::errors::SnovaError;
use crate::exec::CommandSpec;
use crate::procman::{finish, Backend, RestartOutcome, RestartRequest};

/// Overmind manages this installation when its socket exists and the
/// executable is on `PATH`
pub async fn is_active(ctx: &BenchContext) -> bool {
    ctx.layout().overmind_socket().exists().await && ctx.which("overmind").is_some()
}

/// Overmind has no status probing, only a scoped restart verb
pub fn restart_command(web_only: bool) -> &'static str {
    if web_only {
        "overmind restart web"
    } else {
        "overmind restart"
    }
}

pub async fn restart(ctx: &BenchContext, request: &RestartRequest) -> Result<RestartOutcome, SnovaError> {
    let command = restart_command(request.web_only);
    info!("Restarting processes via overmind");
    let out = ctx.run(CommandSpec::new(command)).await?;
    finish(Backend::Overmind, command, out, request.strict)
}
