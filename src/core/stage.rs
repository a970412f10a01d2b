//! Stage domain model

use crate::core::guard::Guard;
use crate::env::credentials::{CredentialBinding, CredentialError};
use crate::env::scope::ScopeMismatchError;
use crate::shell::CommandError;
use std::collections::HashMap;
use thiserror::Error;

/// A single external command: program plus arguments, no shell in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(
        program: impl Into<String>,
        args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// One-line rendering for logs and failure causes.
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// A named, guarded unit of sequential pipeline work.
///
/// Stages hold no run-time state; everything they produce is in the
/// [`StageOutcome`] the runner returns.
#[derive(Debug, Clone)]
pub struct Stage {
    /// Stage name, unique within a pipeline
    pub name: String,

    /// Predicate deciding whether the stage runs for a given trigger
    pub guard: Guard,

    /// Stage-local environment overrides
    pub env: HashMap<String, String>,

    /// Credentials to resolve into the stage's scope before the body runs
    pub credentials: Vec<CredentialBinding>,

    /// Commands executed strictly in order; first non-zero exit stops the body
    pub body: Vec<CommandSpec>,
}

impl Stage {
    pub fn new(name: impl Into<String>, guard: Guard) -> Self {
        Self {
            name: name.into(),
            guard,
            env: HashMap::new(),
            credentials: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_credential(mut self, binding: CredentialBinding) -> Self {
        self.credentials.push(binding);
        self
    }

    pub fn with_command(mut self, command: CommandSpec) -> Self {
        self.body.push(command);
        self
    }
}

/// Why a stage failed.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("credential resolution failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("command `{command}` exited with code {exit_code}")]
    Command {
        command: String,
        exit_code: i32,
        /// Captured stderr, scrubbed of this stage's credential values.
        stderr: String,
    },

    #[error(transparent)]
    Shell(#[from] CommandError),

    #[error("stage aborted by cancellation")]
    Aborted,

    #[error("environment scope invariant violated: {0}")]
    Scope(#[from] ScopeMismatchError),
}

impl StageError {
    /// Exit code of the failing command, where one exists.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            StageError::Command { exit_code, .. } => Some(*exit_code),
            _ => None,
        }
    }

    /// Failure cause with captured stderr appended, for reporting.
    pub fn detail(&self) -> String {
        match self {
            StageError::Command { stderr, .. } if !stderr.trim().is_empty() => {
                format!("{}: {}", self, stderr.trim())
            }
            _ => self.to_string(),
        }
    }
}

/// Result of running one stage.
#[derive(Debug)]
pub enum StageOutcome {
    /// Guard evaluated false; body and environment scope were never entered
    Skipped,
    /// Every body command exited zero
    Succeeded,
    /// The stage stopped early
    Failed(StageError),
}

impl StageOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, StageOutcome::Skipped)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StageOutcome::Succeeded)
    }
}
