// ABOUTME: Remove command: delete containers, the network and the environment's files.
// ABOUTME: Deleting the home dir is retried since stopped processes may still be flushing.

use super::Context;
use devnet::error::{Error, Result};
use devnet::target::Target;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const REMOVE_ATTEMPTS: usize = 3;
const REMOVE_RETRY_DELAY: Duration = Duration::from_secs(1);

pub async fn remove(ctx: &mut Context) -> Result<()> {
    ctx.output.start_timer();
    let spec = ctx.load_spec()?;
    let target = ctx.target(&spec)?;

    target.remove(&ctx.cancel).await?;
    remove_home(&ctx.config.home_dir, &ctx.cancel).await?;

    ctx.output
        .success(&format!("Environment {} removed", ctx.config.env_name));
    Ok(())
}

async fn remove_home(path: &Path, cancel: &CancellationToken) -> Result<()> {
    let mut attempt = 1;
    loop {
        let source = match tokio::fs::remove_dir_all(path).await {
            Ok(()) => return Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => e,
        };
        if attempt == REMOVE_ATTEMPTS {
            return Err(Error::RemoveHome {
                path: path.to_path_buf(),
                source,
            });
        }
        tracing::debug!(path = %path.display(), attempt, error = %source, "Retrying removal");
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => return Err(Error::Interrupted),
            _ = tokio::time::sleep(REMOVE_RETRY_DELAY) => {}
        }
    }
}
