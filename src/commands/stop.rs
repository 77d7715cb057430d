// ABOUTME: Stop command: stop every container, dependents before their dependencies.
// ABOUTME: The state is marked stopped and saved even when stopping fails.

use super::Context;
use devnet::error::Result;
use devnet::target::Target;

pub async fn stop(ctx: &mut Context) -> Result<()> {
    ctx.output.start_timer();
    let spec = ctx.load_spec()?;
    let target = ctx.target(&spec)?;

    let stopped = target.stop(&ctx.cancel).await;
    spec.mark_all_stopped();
    let saved = spec.save();

    stopped?;
    saved?;
    ctx.output
        .success(&format!("Environment {} stopped", ctx.config.env_name));
    Ok(())
}
