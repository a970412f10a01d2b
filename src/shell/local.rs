//! Local subprocess runner

use crate::core::stage::CommandSpec;
use crate::shell::{CommandError, CommandOutput, CommandRunner};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

/// Runs commands as local subprocesses.
///
/// The child's environment is cleared and replaced with the caller-provided
/// map, so a stage's overlay (including resolved credentials) is visible to
/// exactly the subprocesses of that stage. Children are killed if the
/// in-flight future is dropped, which is how cancellation terminates a
/// blocked command.
#[derive(Debug, Clone, Default)]
pub struct LocalRunner {
    /// Working directory for spawned commands; inherits the process cwd
    /// when unset.
    workdir: Option<PathBuf>,
}

impl LocalRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_workdir(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: Some(workdir.into()),
        }
    }
}

#[async_trait]
impl CommandRunner for LocalRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, CommandError> {
        debug!("Spawning `{}` with {} env vars", spec.display(), env.len());

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .env_clear()
            .envs(env)
            .kill_on_drop(true);
        if let Some(workdir) = &self.workdir {
            command.current_dir(workdir);
        }

        let output = command.output().await.map_err(|e| CommandError::Spawn {
            program: spec.program.clone(),
            source: e,
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let stdout = String::from_utf8(output.stdout).map_err(|_| CommandError::Decode {
            program: spec.program.clone(),
        })?;

        if exit_code != 0 {
            warn!(
                "`{}` exited with code {}: {}",
                spec.display(),
                exit_code,
                stderr.trim()
            );
        } else {
            debug!(
                "`{}` succeeded with {} bytes of output",
                spec.display(),
                stdout.len()
            );
        }

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
        })
    }
}
