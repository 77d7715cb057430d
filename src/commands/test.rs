// ABOUTME: Test command: deploy the test mode, then run the stack file's test commands against it.
// ABOUTME: Tests see the environment through DEVNET_ENV and DEVNET_SPEC.

use super::Context;
use devnet::app::mode_from_stack;
use devnet::config::{StackFile, TestConfig};
use devnet::error::{Error, Result};
use devnet::target::Target;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

pub async fn test(ctx: &mut Context) -> Result<()> {
    ctx.output.start_timer();
    let stack = ctx.load_stack()?;
    let tests: Vec<_> = stack.tests_matching(&ctx.config.test_filters).collect();
    if tests.is_empty() {
        return Err(Error::NoTests(ctx.config.test_filters.clone()));
    }

    let spec = ctx.load_spec()?;
    let target = ctx.target(&spec)?;
    let mode = mode_from_stack(&stack, &ctx.config.mode_name, &spec, &ctx.config)?;

    ctx.output.progress(&format!(
        "Deploying mode {} ({} apps) for {} test(s)",
        ctx.config.mode_name,
        mode.len(),
        tests.len()
    ));
    target.deploy(&mode, &ctx.cancel).await?;

    let spec_file = ctx.config.spec_file().display().to_string();
    let env = [
        ("DEVNET_ENV", ctx.config.env_name.as_str()),
        ("DEVNET_SPEC", spec_file.as_str()),
    ];

    let mut failed = Vec::new();
    for (name, test) in &tests {
        ctx.output.progress(&format!("Running test {name}"));
        let span = tracing::info_span!("test", test = name.as_str());
        let passed = run_test(&stack, name, test, &env, &ctx.cancel)
            .instrument(span)
            .await?;
        if !passed {
            failed.push(name.to_string());
        }
    }

    // Tests may change what is running; keep the state file current.
    spec.save()?;

    if failed.is_empty() {
        ctx.output
            .success(&format!("{} test(s) passed", tests.len()));
        Ok(())
    } else {
        Err(Error::TestsFailed {
            failed: failed.len(),
            total: tests.len(),
            names: failed.join(", "),
        })
    }
}

/// Run one test command to completion; `Ok(false)` when it exits unsuccessfully.
async fn run_test(
    stack: &StackFile,
    name: &str,
    test: &TestConfig,
    env: &[(&str, &str)],
    cancel: &CancellationToken,
) -> Result<bool> {
    let program = stack.resolve_path(&test.command);
    tracing::info!(command = %program.display(), "Test started");

    let mut command = Command::new(&program);
    command
        .args(&test.args)
        .envs(env.iter().copied())
        .kill_on_drop(true);
    if !stack.base_dir.as_os_str().is_empty() {
        command.current_dir(&stack.base_dir);
    }
    let mut child = command
        .spawn()
        .map_err(|source| Error::TestSpawn {
            name: name.to_string(),
            source,
        })?;

    let status = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Interrupted),
        status = child.wait() => status?,
    };

    if status.success() {
        tracing::info!("Test passed");
    } else {
        tracing::warn!(%status, "Test failed");
    }
    Ok(status.success())
}
