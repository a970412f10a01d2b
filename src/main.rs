mod cli;
mod core;
mod env;
mod execution;
mod persistence;
mod shell;

use anyhow::{Context, Result};
use cli::commands::{HistoryCommand, RunCommand, ValidateCommand};
use cli::output::*;
use cli::{Cli, Command};
use crate::core::config::PipelineConfig;
use crate::core::state::RunStatus;
use crate::core::trigger::TriggerMetadata;
use crate::env::credentials::EnvCredentialStore;
use execution::{CancelToken, ExecutionEvent, PipelineEngine};
use persistence::{summarize, InMemoryPersistence, PersistenceBackend};
use shell::LocalRunner;
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand) -> Result<()> {
    // Load pipeline config
    let config = PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    println!(
        "{} Loaded pipeline: {}",
        INFO,
        style(config.pipeline_name()).bold()
    );

    let pipeline = config.to_pipeline();

    let trigger = if cmd.ambiguous_trigger {
        TriggerMetadata::unresolved(&cmd.git_ref, cmd.event.into())
    } else {
        TriggerMetadata::from_ref(&cmd.git_ref, cmd.event.into())
    };
    match trigger.release_tag() {
        Some(true) => println!(
            "{} Trigger {} is a release tag",
            INFO,
            style(&trigger.git_ref).cyan()
        ),
        Some(false) => println!(
            "{} Trigger {} selects the dev lane",
            INFO,
            style(&trigger.git_ref).cyan()
        ),
        None => println!(
            "{} Trigger {} is ambiguous; running as dev",
            WARN,
            style(&trigger.git_ref).cyan()
        ),
    }

    // Set up persistence
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        history_store().await?
    };

    // Create execution engine over local subprocesses and the ambient
    // credential store
    let engine = PipelineEngine::new(
        Arc::new(LocalRunner::new()),
        Arc::new(EnvCredentialStore::from_ambient()),
    );

    // Ctrl-C aborts the run; the post-hooks still execute
    let cancel = CancelToken::new();
    let ctrlc = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested; aborting the active run");
            ctrlc.cancel();
        }
    });

    // Set up event handler for console output
    let progress = create_progress_bar(pipeline.stages.len());
    let bar = progress.clone();
    engine.add_event_handler(move |event| {
        bar.println(format_execution_event(&event));
        match event {
            ExecutionEvent::StageCompleted { .. }
            | ExecutionEvent::StageSkipped { .. }
            | ExecutionEvent::StageFailed { .. } => bar.inc(1),
            ExecutionEvent::RunCompleted { .. } => bar.finish_and_clear(),
            _ => {}
        }
    });

    // Execute pipeline
    println!();
    let run = engine.execute(&pipeline, &trigger, &cancel).await;
    progress.finish_and_clear();

    // Save to history
    if !cmd.no_history {
        let summary = summarize(&run);
        store.save_run(&summary).await?;
        let pruned = store.prune(&run.pipeline_name, &config.retention).await?;
        println!(
            "\n{} Run saved to history (ID: {}{})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim(),
            if pruned > 0 {
                format!(", pruned {} old runs", pruned)
            } else {
                String::new()
            }
        );
    }

    // Print final status
    match run.status {
        RunStatus::Succeeded => {
            println!(
                "\n{} {} completed {}",
                CHECK,
                style(&run.pipeline_name).bold(),
                style("successfully").green()
            );
        }
        RunStatus::Aborted => {
            println!(
                "\n{} {} {}",
                WARN,
                style(&run.pipeline_name).bold(),
                style("aborted").yellow()
            );
            std::process::exit(1);
        }
        _ => {
            let detail = match (&run.failed_stage, run.failed_exit_code) {
                (Some(stage), Some(code)) => format!(" at {} (exit code {})", stage, code),
                (Some(stage), None) => format!(" at {}", stage),
                _ => String::new(),
            };
            println!(
                "\n{} {} {}{}",
                CROSS,
                style(&run.pipeline_name).bold(),
                style("failed").red(),
                detail
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let result = PipelineConfig::from_file(&cmd.file);

    match result {
        Ok(config) => {
            let pipeline = config.to_pipeline();
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(config.pipeline_name()).bold());
            println!("  Package: {}", style(&config.package_name).cyan());
            println!("  Stages: {}", style(pipeline.stages.len()).cyan());
            println!(
                "  Hooks: {}",
                style(pipeline.always_hooks.len() + pipeline.cleanup_hooks.len()).cyan()
            );

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = history_store().await?;

    // If a specific run ID is requested
    if let Some(run_id_str) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id_str).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) => {
                if cmd.json {
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                } else {
                    println!("{}", format_run_summary(&summary));
                }
            }
            None => {
                println!("{} Run not found", WARN);
            }
        }
        return Ok(());
    }

    // List runs for one pipeline or all of them
    let runs = if let Some(pipeline_name) = &cmd.pipeline {
        store.list_runs(pipeline_name).await?
    } else {
        let pipelines = store.list_pipelines().await?;
        let mut all_runs = Vec::new();
        for pipeline in &pipelines {
            all_runs.extend(store.list_runs(pipeline).await?);
        }
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs
    };
    let runs: Vec<_> = runs.into_iter().take(cmd.limit).collect();

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(
        persistence::SqliteRunStore::with_default_path().await?,
    ))
}

#[cfg(not(feature = "sqlite"))]
async fn history_store() -> Result<Arc<dyn PersistenceBackend>> {
    anyhow::bail!("run history requires the `sqlite` feature")
}
