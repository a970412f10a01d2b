//! Stage runner - executes a single stage against its scoped environment

use crate::core::stage::{Stage, StageError, StageOutcome};
use crate::core::trigger::TriggerMetadata;
use crate::env::credentials::CredentialStore;
use crate::env::scope::EnvironmentScope;
use crate::execution::cancel::CancelToken;
use crate::shell::CommandRunner;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Executes one stage: guard, credentials, scope, body, guaranteed exit.
pub struct StageRunner {
    commands: Arc<dyn CommandRunner>,
    credentials: Arc<dyn CredentialStore>,
}

impl StageRunner {
    pub fn new(commands: Arc<dyn CommandRunner>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            commands,
            credentials,
        }
    }

    /// Run a stage to an outcome.
    ///
    /// A skipped stage touches nothing: no credential resolution, no scope
    /// entry, no commands. For a stage that does run, the scope layer entered
    /// here is exited before this function returns, whatever the body did.
    pub async fn run(
        &self,
        stage: &Stage,
        trigger: &TriggerMetadata,
        scope: &mut EnvironmentScope,
        cancel: &CancelToken,
    ) -> StageOutcome {
        if !stage.guard.evaluate(trigger) {
            info!("Stage {} skipped (guard)", stage.name);
            return StageOutcome::Skipped;
        }

        // Resolve declared credentials before entering the body; any failure
        // fails the stage without running a single command.
        let mut overlay = stage.env.clone();
        let mut secret_keys: HashSet<String> = HashSet::new();
        let mut secret_values: Vec<String> = Vec::new();
        for binding in &stage.credentials {
            match self.credentials.resolve(&binding.credential_id).await {
                Ok(resolved) => {
                    debug!(
                        "Stage {} resolved credential `{}`",
                        stage.name, binding.credential_id
                    );
                    secret_values.push(resolved.username.expose().to_string());
                    secret_values.push(resolved.secret.expose().to_string());
                    overlay.insert(
                        binding.username_var.clone(),
                        resolved.username.expose().to_string(),
                    );
                    overlay.insert(
                        binding.secret_var.clone(),
                        resolved.secret.expose().to_string(),
                    );
                    secret_keys.extend(binding.variable_names());
                }
                Err(e) => {
                    warn!("Stage {} credential resolution failed: {}", stage.name, e);
                    return StageOutcome::Failed(StageError::Credential(e));
                }
            }
        }

        let handle = scope.enter_with_secrets(overlay, secret_keys);
        let body_result = self.run_body(stage, scope, cancel, &secret_values).await;
        // The layer is released in straight-line code so a failed body can
        // never leak its overlay into the next stage.
        if let Err(e) = scope.exit(handle) {
            error!("Stage {} scope release failed: {}", stage.name, e);
            return StageOutcome::Failed(StageError::Scope(e));
        }

        match body_result {
            Ok(()) => {
                info!("Stage {} succeeded", stage.name);
                StageOutcome::Succeeded
            }
            Err(e) => StageOutcome::Failed(e),
        }
    }

    async fn run_body(
        &self,
        stage: &Stage,
        scope: &EnvironmentScope,
        cancel: &CancelToken,
        secret_values: &[String],
    ) -> Result<(), StageError> {
        let env = scope.effective();

        for command in &stage.body {
            if cancel.is_cancelled() {
                warn!("Stage {} aborted before `{}`", stage.name, command.display());
                return Err(StageError::Aborted);
            }

            debug!("Stage {} running `{}`", stage.name, command.display());
            let output = tokio::select! {
                output = self.commands.run(command, &env) => output?,
                _ = cancel.cancelled() => {
                    // Dropping the command future kills the child process.
                    warn!("Stage {} aborted during `{}`", stage.name, command.display());
                    return Err(StageError::Aborted);
                }
            };

            if !output.success() {
                return Err(StageError::Command {
                    command: command.display(),
                    exit_code: output.exit_code,
                    stderr: scrub(&output.stderr, secret_values),
                });
            }
        }

        Ok(())
    }
}

/// Replace any occurrence of a resolved credential value in diagnostic text.
fn scrub(text: &str, secret_values: &[String]) -> String {
    let mut scrubbed = text.to_string();
    for value in secret_values {
        if !value.is_empty() {
            scrubbed = scrubbed.replace(value, "[redacted]");
        }
    }
    scrubbed
}
