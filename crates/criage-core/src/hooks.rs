//! Lifecycle hook execution.

use std::path::Path;

use criage_schema::HookPoint;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info};

/// A lifecycle hook that could not run or did not succeed.
#[derive(Error, Debug)]
pub enum HookError {
    /// `sh` itself could not be started.
    #[error("{point} hook failed to start `{command}`: {source}")]
    Spawn {
        point: HookPoint,
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited non-zero.
    #[error("{point} hook `{command}` exited with {code}: {stderr}")]
    Failed {
        point: HookPoint,
        command: String,
        code: String,
        stderr: String,
    },
}

/// Run hook commands in order via `sh -c`, stopping at the first failure.
///
/// Each command inherits the environment. When `workdir` is `None` the
/// current directory is left unchanged.
pub async fn run_hooks(
    point: HookPoint,
    commands: &[String],
    workdir: Option<&Path>,
) -> Result<(), HookError> {
    for command in commands {
        info!("Running {point} hook: {command}");
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        let output = cmd.output().await.map_err(|source| HookError::Spawn {
            point,
            command: command.clone(),
            source,
        })?;

        if !output.stdout.is_empty() {
            debug!("{point} hook stdout: {}", String::from_utf8_lossy(&output.stdout).trim_end());
        }
        if !output.status.success() {
            return Err(HookError::Failed {
                point,
                command: command.clone(),
                code: output
                    .status
                    .code()
                    .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
    }
    Ok(())
}
