//! packline - a CI/release pipeline runner for package archives

pub mod cli;
pub mod core;
pub mod env;
pub mod execution;
pub mod persistence;
pub mod shell;

// Re-export commonly used types
pub use crate::core::{
    CommandSpec, EventType, Guard, Hook, Pipeline, PipelineRun, RunStatus, Stage, StageOutcome,
    TriggerMetadata,
};
pub use crate::env::{CredentialBinding, CredentialStore, EnvironmentScope, Secret};
pub use crate::execution::{CancelToken, ExecutionEvent, PipelineEngine};
pub use crate::shell::{CommandOutput, CommandRunner, LocalRunner};
