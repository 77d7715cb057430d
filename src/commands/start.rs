// ABOUTME: Start command: deploy the selected mode and leave helper scripts behind.
// ABOUTME: Apps already running are skipped, so repeated starts are cheap.

use super::Context;
use devnet::app::mode_from_stack;
use devnet::config::Config;
use devnet::error::Result;
use devnet::target::Target;
use std::io::Write;
use std::path::Path;

/// Commands exposed as wrapper scripts; `test` is a shell builtin so it becomes `tests`.
const COMMAND_WRAPPERS: &[(&str, &str)] = &[
    ("start", "start"),
    ("stop", "stop"),
    ("remove", "remove"),
    ("tests", "test"),
    ("spec", "spec"),
];

pub async fn start(ctx: &mut Context) -> Result<()> {
    ctx.output.start_timer();
    let stack = ctx.load_stack()?;
    let spec = ctx.load_spec()?;
    let target = ctx.target(&spec)?;
    let mode = mode_from_stack(&stack, &ctx.config.mode_name, &spec, &ctx.config)?;

    ctx.output.progress(&format!(
        "Deploying mode {} ({} apps) in environment {}",
        ctx.config.mode_name,
        mode.len(),
        ctx.config.env_name
    ));
    target.deploy(&mode, &ctx.cancel).await?;

    write_wrappers(&ctx.config, &ctx.docker)?;
    ctx.output.progress(&format!(
        "Helper scripts are in {}",
        ctx.config.wrapper_dir.display()
    ));
    ctx.output
        .success(&format!("Environment {} is running", ctx.config.env_name));
    Ok(())
}

/// Write `logs <app>` plus one script per devnet command into the wrapper dir.
pub(crate) fn write_wrappers(config: &Config, docker: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(&config.wrapper_dir)?;

    let exe = std::env::current_exe()?;
    for (file, command) in COMMAND_WRAPPERS {
        let script = format!(
            "#!/bin/sh\nexec \"{}\" --env \"{}\" {command} \"$@\"\n",
            exe.display(),
            config.env_name
        );
        write_script(&config.wrapper_dir.join(file), &script)?;
    }

    let logs = format!(
        "#!/bin/sh\n\
         if [ -z \"$1\" ]; then\n  \
           echo \"Provide the name of application\"\n  \
           exit 1\n\
         fi\n\
         exec {docker} logs -f \"{}-$1\"\n",
        config.env_name
    );
    write_script(&config.wrapper_dir.join("logs"), &logs)
}

#[cfg(unix)]
fn write_script(path: &Path, contents: &str) -> std::io::Result<()> {
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o700)
        .open(path)?;
    file.write_all(contents.as_bytes())
}

#[cfg(not(unix))]
fn write_script(path: &Path, contents: &str) -> std::io::Result<()> {
    let mut file = std::fs::File::create(path)?;
    file.write_all(contents.as_bytes())
}
