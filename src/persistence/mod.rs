//! Persistence layer for pipeline run history
//!
//! Runs themselves are discarded once reported; what survives is a
//! [`RunSummary`] per run, kept only as far back as the configured
//! retention policy allows.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteRunStore;

use crate::core::config::RetentionPolicy;
use crate::core::state::{PipelineRun, RunStatus, StageDisposition};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Summary of a finished pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,

    pub pipeline_name: String,

    /// The git ref the run was triggered for
    pub git_ref: String,

    pub status: RunStatus,

    pub started_at: DateTime<Utc>,

    pub finished_at: Option<DateTime<Utc>>,

    /// Stages that actually executed
    pub stages_run: usize,

    /// Stages whose guard evaluated false
    pub stages_skipped: usize,

    /// Name of the failing stage, if any
    pub failed_stage: Option<String>,
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save a run summary
    async fn save_run(&self, summary: &RunSummary) -> Result<()>;

    /// Load a run by ID
    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>>;

    /// List all runs for a pipeline, newest first
    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>>;

    /// List all pipeline names
    async fn list_pipelines(&self) -> Result<Vec<String>>;

    /// Delete runs outside the retention policy; returns how many were
    /// removed
    async fn prune(&self, pipeline_name: &str, policy: &RetentionPolicy) -> Result<usize>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    runs: tokio::sync::RwLock<std::collections::HashMap<Uuid, RunSummary>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            runs: tokio::sync::RwLock::new(std::collections::HashMap::new()),
        }
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save_run(&self, summary: &RunSummary) -> Result<()> {
        let mut runs = self.runs.write().await;
        runs.insert(summary.run_id, summary.clone());
        Ok(())
    }

    async fn load_run(&self, run_id: Uuid) -> Result<Option<RunSummary>> {
        let runs = self.runs.read().await;
        Ok(runs.get(&run_id).cloned())
    }

    async fn list_runs(&self, pipeline_name: &str) -> Result<Vec<RunSummary>> {
        let runs = self.runs.read().await;
        let mut result: Vec<RunSummary> = runs
            .values()
            .filter(|r| r.pipeline_name == pipeline_name)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(result)
    }

    async fn list_pipelines(&self) -> Result<Vec<String>> {
        let runs = self.runs.read().await;
        let mut names: Vec<String> = runs.values().map(|r| r.pipeline_name.clone()).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    async fn prune(&self, pipeline_name: &str, policy: &RetentionPolicy) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(policy.max_days));
        let keep: Vec<Uuid> = {
            let runs = self.runs.read().await;
            let mut recent: Vec<&RunSummary> = runs
                .values()
                .filter(|r| r.pipeline_name == pipeline_name && r.started_at >= cutoff)
                .collect();
            recent.sort_by(|a, b| b.started_at.cmp(&a.started_at));
            recent
                .into_iter()
                .take(policy.max_builds as usize)
                .map(|r| r.run_id)
                .collect()
        };

        let mut runs = self.runs.write().await;
        let before = runs.len();
        runs.retain(|id, r| r.pipeline_name != pipeline_name || keep.contains(id));
        Ok(before - runs.len())
    }
}

/// Create a summary from a finished run
pub fn summarize(run: &PipelineRun) -> RunSummary {
    let stages_run = run
        .completed
        .iter()
        .filter(|r| r.disposition != StageDisposition::Skipped)
        .count();
    let stages_skipped = run
        .completed
        .iter()
        .filter(|r| r.disposition == StageDisposition::Skipped)
        .count();

    RunSummary {
        run_id: run.run_id,
        pipeline_name: run.pipeline_name.clone(),
        git_ref: run.git_ref.clone(),
        status: run.status,
        started_at: run.started_at.unwrap_or_else(Utc::now),
        finished_at: run.finished_at,
        stages_run,
        stages_skipped,
        failed_stage: run.failed_stage.clone(),
    }
}
