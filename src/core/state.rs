//! Run state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Overall status of one pipeline run. Transitions only move forward:
/// `Pending -> Running -> {Succeeded, Failed, Aborted}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Created but not yet started (possibly queued behind another run)
    Pending,
    /// Stage loop or post-hooks in progress
    Running,
    /// Every non-skipped stage succeeded
    Succeeded,
    /// A stage failed; later stages did not run, post-hooks did
    Failed,
    /// Externally cancelled; post-hooks still ran
    Aborted,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Succeeded | RunStatus::Failed | RunStatus::Aborted
        )
    }
}

/// How a recorded stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageDisposition {
    Skipped,
    Succeeded,
    Failed,
}

/// One entry in the run's ordered stage history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: String,
    pub disposition: StageDisposition,
    /// Failure cause rendered for reporting; credential values never appear
    pub error: Option<String>,
    pub exit_code: Option<i32>,
}

impl StageRecord {
    pub fn skipped(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            disposition: StageDisposition::Skipped,
            error: None,
            exit_code: None,
        }
    }

    pub fn succeeded(stage: impl Into<String>) -> Self {
        Self {
            stage: stage.into(),
            disposition: StageDisposition::Succeeded,
            error: None,
            exit_code: None,
        }
    }

    pub fn failed(stage: impl Into<String>, error: String, exit_code: Option<i32>) -> Self {
        Self {
            stage: stage.into(),
            disposition: StageDisposition::Failed,
            error: Some(error),
            exit_code,
        }
    }
}

/// Mutable record of a single run; created at trigger, discarded after the
/// post-hooks finish and the status has been reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRun {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub git_ref: String,
    pub status: RunStatus,
    /// Stages in execution order, each with its outcome
    pub completed: Vec<StageRecord>,
    pub current_stage: Option<String>,
    pub failed_stage: Option<String>,
    pub failed_exit_code: Option<i32>,
    /// Hook commands that failed; logged, never fatal
    pub hook_failures: usize,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl PipelineRun {
    pub fn new(pipeline_name: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline_name: pipeline_name.into(),
            git_ref: git_ref.into(),
            status: RunStatus::Pending,
            completed: Vec::new(),
            current_stage: None,
            failed_stage: None,
            failed_exit_code: None,
            hook_failures: 0,
            started_at: None,
            finished_at: None,
        }
    }

    /// Mark the run as started. No-op unless currently `Pending`.
    pub fn start(&mut self) {
        if self.status == RunStatus::Pending {
            self.status = RunStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Append a stage record, clearing the current-stage marker.
    pub fn record(&mut self, record: StageRecord) {
        if record.disposition == StageDisposition::Failed && self.failed_stage.is_none() {
            self.failed_stage = Some(record.stage.clone());
            self.failed_exit_code = record.exit_code;
        }
        self.completed.push(record);
        self.current_stage = None;
    }

    /// Move to a terminal status. No-op unless currently `Running`.
    pub fn complete(&mut self, status: RunStatus) {
        if self.status == RunStatus::Running && status.is_terminal() {
            self.status = status;
            self.finished_at = Some(Utc::now());
        }
    }

    /// Look up the record for a stage by name.
    pub fn stage(&self, name: &str) -> Option<&StageRecord> {
        self.completed.iter().find(|r| r.stage == name)
    }

    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}
