//! Main execution engine - orchestrates the entire pipeline run

use crate::core::pipeline::{Hook, Pipeline};
use crate::core::stage::{StageError, StageOutcome};
use crate::core::state::{PipelineRun, RunStatus, StageRecord};
use crate::core::trigger::TriggerMetadata;
use crate::env::credentials::CredentialStore;
use crate::env::scope::EnvironmentScope;
use crate::execution::cancel::CancelToken;
use crate::execution::runner::StageRunner;
use crate::shell::CommandRunner;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Events that can occur during a pipeline run
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    /// A trigger arrived while another run was active; this run waits
    RunQueued {
        run_id: Uuid,
        pipeline_name: String,
    },
    RunStarted {
        run_id: Uuid,
        pipeline_name: String,
        git_ref: String,
    },
    StageStarted {
        stage: String,
    },
    StageSkipped {
        stage: String,
    },
    StageCompleted {
        stage: String,
    },
    StageFailed {
        stage: String,
        error: String,
    },
    HookFailed {
        hook: String,
        error: String,
    },
    RunCompleted {
        run_id: Uuid,
        status: RunStatus,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Sequences stages, runs the post-hooks, and reports one terminal status
/// per run.
///
/// The engine admits at most one run at a time: a trigger arriving while a
/// run is active queues FIFO behind it (the async mutex hands the gate to
/// waiters in arrival order) and stays `Pending` until the active run
/// reaches a terminal status.
pub struct PipelineEngine {
    commands: Arc<dyn CommandRunner>,
    runner: StageRunner,
    run_gate: tokio::sync::Mutex<()>,
    event_handlers: Mutex<Vec<EventHandler>>,
    base_env: Option<HashMap<String, String>>,
}

impl PipelineEngine {
    pub fn new(commands: Arc<dyn CommandRunner>, credentials: Arc<dyn CredentialStore>) -> Self {
        let runner = StageRunner::new(commands.clone(), credentials);
        Self {
            commands,
            runner,
            run_gate: tokio::sync::Mutex::new(()),
            event_handlers: Mutex::new(Vec::new()),
            base_env: None,
        }
    }

    /// Use an explicit base environment instead of snapshotting the ambient
    /// process environment at run start.
    pub fn with_base_env(mut self, base_env: HashMap<String, String>) -> Self {
        self.base_env = Some(base_env);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers
            .lock()
            .expect("event handler lock poisoned")
            .push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit(&self, event: ExecutionEvent) {
        let handlers = self
            .event_handlers
            .lock()
            .expect("event handler lock poisoned");
        for handler in handlers.iter() {
            handler(event.clone());
        }
    }

    /// Execute one run for the given trigger and return its record.
    ///
    /// The stage loop stops at the first failure or cancellation; the
    /// always-hooks and then the cleanup-hooks run exactly once afterwards
    /// in every case - the hook calls sit in straight-line code after the
    /// loop, not behind any condition.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        trigger: &TriggerMetadata,
        cancel: &CancelToken,
    ) -> PipelineRun {
        let mut run = PipelineRun::new(&pipeline.name, &trigger.git_ref);

        let _gate = match self.run_gate.try_lock() {
            Ok(gate) => gate,
            Err(_) => {
                info!(
                    "Run {} queued behind an active run of {}",
                    run.run_id, pipeline.name
                );
                self.emit(ExecutionEvent::RunQueued {
                    run_id: run.run_id,
                    pipeline_name: pipeline.name.clone(),
                });
                self.run_gate.lock().await
            }
        };

        run.start();
        info!(
            "Starting pipeline run: {} ({}) for ref {}",
            pipeline.name, run.run_id, trigger.git_ref
        );
        self.emit(ExecutionEvent::RunStarted {
            run_id: run.run_id,
            pipeline_name: pipeline.name.clone(),
            git_ref: trigger.git_ref.clone(),
        });

        let mut scope = match &self.base_env {
            Some(base) => EnvironmentScope::with_base(base.clone()),
            None => EnvironmentScope::from_ambient(),
        };
        let pipeline_layer = scope.enter(pipeline.env.clone());

        let aborted = self
            .run_stages(pipeline, trigger, &mut scope, cancel, &mut run)
            .await;

        self.run_hooks("always", &pipeline.always_hooks, &scope, &mut run)
            .await;
        self.run_hooks("cleanup", &pipeline.cleanup_hooks, &scope, &mut run)
            .await;

        if let Err(e) = scope.exit(pipeline_layer) {
            error!("Pipeline scope release failed: {}", e);
        }

        let status = if aborted {
            RunStatus::Aborted
        } else if run.failed_stage.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Succeeded
        };
        run.complete(status);

        info!(
            "Pipeline run finished: {} - {:?}",
            pipeline.name, run.status
        );
        self.emit(ExecutionEvent::RunCompleted {
            run_id: run.run_id,
            status: run.status,
        });

        run
    }

    /// Iterate stages in declared order; returns whether the run was
    /// aborted by cancellation.
    async fn run_stages(
        &self,
        pipeline: &Pipeline,
        trigger: &TriggerMetadata,
        scope: &mut EnvironmentScope,
        cancel: &CancelToken,
        run: &mut PipelineRun,
    ) -> bool {
        for stage in &pipeline.stages {
            if cancel.is_cancelled() {
                warn!("Run cancelled before stage {}", stage.name);
                return true;
            }

            run.current_stage = Some(stage.name.clone());
            self.emit(ExecutionEvent::StageStarted {
                stage: stage.name.clone(),
            });

            match self.runner.run(stage, trigger, scope, cancel).await {
                StageOutcome::Skipped => {
                    run.record(StageRecord::skipped(&stage.name));
                    self.emit(ExecutionEvent::StageSkipped {
                        stage: stage.name.clone(),
                    });
                }
                StageOutcome::Succeeded => {
                    run.record(StageRecord::succeeded(&stage.name));
                    self.emit(ExecutionEvent::StageCompleted {
                        stage: stage.name.clone(),
                    });
                }
                StageOutcome::Failed(StageError::Aborted) => {
                    let error = StageError::Aborted.to_string();
                    self.emit(ExecutionEvent::StageFailed {
                        stage: stage.name.clone(),
                        error: error.clone(),
                    });
                    run.record(StageRecord::failed(&stage.name, error, None));
                    return true;
                }
                StageOutcome::Failed(err) => {
                    let error = err.detail();
                    let exit_code = err.exit_code();
                    error!("Stage {} failed: {}", stage.name, error);
                    self.emit(ExecutionEvent::StageFailed {
                        stage: stage.name.clone(),
                        error: error.clone(),
                    });
                    run.record(StageRecord::failed(&stage.name, error, exit_code));
                    // Remaining stages do not run; the post-hooks still do.
                    return false;
                }
            }
        }

        false
    }

    /// Run a hook phase. Hook failures are logged and counted; they never
    /// suppress the remaining hooks and never change the run status.
    async fn run_hooks(
        &self,
        phase: &str,
        hooks: &[Hook],
        scope: &EnvironmentScope,
        run: &mut PipelineRun,
    ) {
        let env = scope.effective();

        for hook in hooks {
            debug!("Running {} hook {}", phase, hook.name);
            for command in &hook.body {
                let failure = match self.commands.run(command, &env).await {
                    Ok(output) if output.success() => None,
                    Ok(output) => Some(format!(
                        "command `{}` exited with code {}",
                        command.display(),
                        output.exit_code
                    )),
                    Err(e) => Some(e.to_string()),
                };

                if let Some(error) = failure {
                    warn!("{} hook {} failed: {}", phase, hook.name, error);
                    run.hook_failures += 1;
                    self.emit(ExecutionEvent::HookFailed {
                        hook: hook.name.clone(),
                        error,
                    });
                    // Give up on this hook's remaining commands but keep
                    // running the hooks after it.
                    break;
                }
            }
        }
    }
}
