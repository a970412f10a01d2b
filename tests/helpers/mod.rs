//! Test utility functions for packline scenario tests
#![allow(dead_code)]

use async_trait::async_trait;
use packline::core::config::PipelineConfig;
use packline::core::trigger::{EventType, TriggerMetadata};
use packline::core::CommandSpec;
use packline::env::StaticCredentialStore;
use packline::shell::{CommandOutput, CommandRunner};
use packline::{CancelToken, PipelineEngine, PipelineRun};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded command invocation: the rendered command line and the exact
/// environment the subprocess would have seen.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub program: String,
    pub command: String,
    pub env: HashMap<String, String>,
}

/// Command runner that scripts exit codes per program and records every
/// invocation instead of spawning anything.
pub struct RecordingRunner {
    exit_codes: HashMap<String, i32>,
    stderr: HashMap<String, String>,
    delays: HashMap<String, Duration>,
    invocations: Mutex<Vec<Invocation>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            exit_codes: HashMap::new(),
            stderr: HashMap::new(),
            delays: HashMap::new(),
            invocations: Mutex::new(Vec::new()),
        }
    }

    /// Script a program to exit non-zero with the given stderr.
    pub fn failing(mut self, program: &str, exit_code: i32, stderr: &str) -> Self {
        self.exit_codes.insert(program.to_string(), exit_code);
        self.stderr.insert(program.to_string(), stderr.to_string());
        self
    }

    /// Script a program to block for a while before exiting zero.
    pub fn slow(mut self, program: &str, delay: Duration) -> Self {
        self.delays.insert(program.to_string(), delay);
        self
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn ran(&self, program: &str) -> bool {
        self.count(program) > 0
    }

    pub fn count(&self, program: &str) -> usize {
        self.invocations()
            .iter()
            .filter(|i| i.program == program)
            .count()
    }

    /// Environment of the first invocation of a program.
    pub fn env_of(&self, program: &str) -> Option<HashMap<String, String>> {
        self.invocations()
            .into_iter()
            .find(|i| i.program == program)
            .map(|i| i.env)
    }

    /// Rendered command lines in execution order.
    pub fn command_lines(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.command).collect()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(
        &self,
        spec: &CommandSpec,
        env: &HashMap<String, String>,
    ) -> Result<CommandOutput, packline::shell::CommandError> {
        self.invocations.lock().unwrap().push(Invocation {
            program: spec.program.clone(),
            command: spec.display(),
            env: env.clone(),
        });

        if let Some(delay) = self.delays.get(&spec.program) {
            tokio::time::sleep(*delay).await;
        }

        Ok(CommandOutput {
            exit_code: self.exit_codes.get(&spec.program).copied().unwrap_or(0),
            stdout: String::new(),
            stderr: self.stderr.get(&spec.program).cloned().unwrap_or_default(),
        })
    }
}

/// The standard pipeline configuration the scenarios run against.
pub fn sample_config() -> PipelineConfig {
    PipelineConfig::from_yaml(
        r#"
package_name: ts-dome
config_repository: "https://example.com/config.git"
channels: ["main-channel"]
workspace_owner: "1003:1003"
"#,
    )
    .expect("sample config is valid")
}

/// Credential store holding the publish credential the sample config asks
/// for.
pub fn publish_credentials() -> StaticCredentialStore {
    StaticCredentialStore::new().with_credential("package-index", "robot", "hunter2")
}

pub fn release_trigger() -> TriggerMetadata {
    TriggerMetadata::from_ref("v1.1.0", EventType::TagPush)
}

pub fn dev_trigger() -> TriggerMetadata {
    TriggerMetadata::from_ref("main", EventType::Push)
}

/// Engine over a recording runner with an empty base environment, so tests
/// see exactly the variables the pipeline injects.
pub fn engine_with(
    runner: RecordingRunner,
    credentials: StaticCredentialStore,
) -> (Arc<PipelineEngine>, Arc<RecordingRunner>) {
    let runner = Arc::new(runner);
    let engine = PipelineEngine::new(runner.clone(), Arc::new(credentials))
        .with_base_env(HashMap::new());
    (Arc::new(engine), runner)
}

/// Run the sample pipeline once for a trigger and return the run record.
pub async fn run_sample_pipeline(
    runner: RecordingRunner,
    credentials: StaticCredentialStore,
    trigger: &TriggerMetadata,
) -> (PipelineRun, Arc<RecordingRunner>) {
    let (engine, runner) = engine_with(runner, credentials);
    let pipeline = sample_config().to_pipeline();
    let run = engine
        .execute(&pipeline, trigger, &CancelToken::new())
        .await;
    (run, runner)
}
