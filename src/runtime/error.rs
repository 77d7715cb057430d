// ABOUTME: Runtime error types with SNAFU pattern.
// ABOUTME: Failures invoking the container engine CLI or reading its output.

use snafu::Snafu;
use std::process::ExitStatus;

/// Failure of one container engine invocation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RuntimeError {
    #[snafu(display("failed to execute {program}: {source}"))]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[snafu(display("`{command}` failed with {status}: {stderr}"))]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    #[snafu(display("cannot parse output of `{command}`: {source}"))]
    Parse {
        command: String,
        source: serde_json::Error,
    },

    #[snafu(display("unexpected output of `{command}`: {output:?}"))]
    Unexpected { command: String, output: String },
}
