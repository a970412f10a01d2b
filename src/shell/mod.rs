//! External command collaborators
//!
//! The engine treats clone, build, and upload tools as opaque subprocess
//! invocations: it owns the environment they see and observes their exit
//! status, nothing more.

pub mod local;

use crate::core::stage::CommandSpec;
use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub use local::LocalRunner;

/// Errors from launching a command (as opposed to the command itself
/// exiting non-zero, which is reported through [`CommandOutput`]).
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("output of `{program}` was not valid UTF-8")]
    Decode { program: String },
}

/// Captured result of a finished command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Trait for command execution - allows for different implementations.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion with exactly the given environment.
    async fn run(
        &self,
        spec: &CommandSpec,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, CommandError>;
}
