//! Scenario: one run at a time - later triggers queue, cancellation aborts

mod helpers;

use helpers::*;
use packline::core::StageDisposition;
use packline::{CancelToken, ExecutionEvent, RunStatus};
use std::sync::{Arc, Mutex};
use std::time::Duration;

async fn wait_for<F: Fn() -> bool>(condition: F, what: &str) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("timed out waiting for {}", what);
}

#[tokio::test]
async fn test_second_trigger_queues_until_first_run_finishes() {
    let (engine, _runner) = engine_with(
        RecordingRunner::new().slow("conda", Duration::from_millis(300)),
        publish_credentials(),
    );
    let pipeline = sample_config().to_pipeline();

    let events: Arc<Mutex<Vec<ExecutionEvent>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.add_event_handler(move |event| sink.lock().unwrap().push(event));

    let first = {
        let engine = engine.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            engine
                .execute(&pipeline, &release_trigger(), &CancelToken::new())
                .await
        })
    };

    // Only launch the second trigger once the first run is demonstrably
    // active.
    {
        let events = events.clone();
        wait_for(
            || {
                events
                    .lock()
                    .unwrap()
                    .iter()
                    .any(|e| matches!(e, ExecutionEvent::RunStarted { .. }))
            },
            "first run to start",
        )
        .await;
    }

    let second = {
        let engine = engine.clone();
        let pipeline = pipeline.clone();
        tokio::spawn(async move {
            engine
                .execute(&pipeline, &dev_trigger(), &CancelToken::new())
                .await
        })
    };

    let first_run = first.await.unwrap();
    let second_run = second.await.unwrap();
    assert_eq!(first_run.status, RunStatus::Succeeded);
    assert_eq!(second_run.status, RunStatus::Succeeded);

    let events = events.lock().unwrap();

    // The second run reported itself queued.
    assert!(events.iter().any(|e| matches!(
        e,
        ExecutionEvent::RunQueued { run_id, .. } if *run_id == second_run.run_id
    )));

    // And it only started after the first reached a terminal status.
    let first_completed = events
        .iter()
        .position(|e| {
            matches!(e, ExecutionEvent::RunCompleted { run_id, .. } if *run_id == first_run.run_id)
        })
        .expect("first run completed");
    let second_started = events
        .iter()
        .position(|e| {
            matches!(e, ExecutionEvent::RunStarted { run_id, .. } if *run_id == second_run.run_id)
        })
        .expect("second run started");
    assert!(
        first_completed < second_started,
        "second run must not start while the first is running"
    );
}

#[tokio::test]
async fn test_cancellation_aborts_blocked_command_and_still_runs_hooks() {
    let (engine, runner) = engine_with(
        // The build would block for a minute if nothing killed it.
        RecordingRunner::new().slow("conda", Duration::from_secs(60)),
        publish_credentials(),
    );
    let pipeline = sample_config().to_pipeline();

    let cancel = CancelToken::new();
    let task = {
        let engine = engine.clone();
        let pipeline = pipeline.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            engine
                .execute(&pipeline, &release_trigger(), &cancel)
                .await
        })
    };

    {
        let runner = runner.clone();
        wait_for(|| runner.ran("conda"), "the build to start").await;
    }
    cancel.cancel();

    let run = tokio::time::timeout(Duration::from_secs(5), task)
        .await
        .expect("cancellation must unblock the run")
        .unwrap();

    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(
        run.stage("build-release").unwrap().disposition,
        StageDisposition::Failed
    );

    // Publish never ran; the hooks still did.
    assert!(!runner.ran("anaconda"));
    assert_eq!(runner.count("chown"), 1);
    assert_eq!(runner.count("rm"), 1);
}

#[tokio::test]
async fn test_cancellation_before_start_aborts_without_running_stages() {
    let (engine, runner) = engine_with(RecordingRunner::new(), publish_credentials());
    let pipeline = sample_config().to_pipeline();

    let cancel = CancelToken::new();
    cancel.cancel();
    let run = engine.execute(&pipeline, &release_trigger(), &cancel).await;

    assert_eq!(run.status, RunStatus::Aborted);
    assert!(!runner.ran("git"));
    assert!(!runner.ran("conda"));

    // Post-hooks are unconditional even for a run that never got going.
    assert_eq!(runner.count("chown"), 1);
    assert_eq!(runner.count("rm"), 1);
}
