//! Scenario: failures stop the stage sequence but never the post-hooks

mod helpers;

use helpers::*;
use packline::core::StageDisposition;
use packline::RunStatus;

#[tokio::test]
async fn test_build_failure_stops_publish_but_not_hooks() {
    let (run, runner) = run_sample_pipeline(
        RecordingRunner::new().failing("conda", 2, "solver error"),
        publish_credentials(),
        &release_trigger(),
    )
    .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failed_stage.as_deref(), Some("build-release"));
    assert_eq!(run.failed_exit_code, Some(2));

    // The publish stage never ran.
    assert!(run.stage("publish").is_none());
    assert!(!runner.ran("anaconda"));

    // Both hook phases still ran, exactly once.
    assert_eq!(runner.count("chown"), 1);
    assert_eq!(runner.count("rm"), 1);
}

#[tokio::test]
async fn test_clone_failure_reports_stage_and_exit_code() {
    let (run, runner) = run_sample_pipeline(
        RecordingRunner::new().failing("git", 128, "fatal: repository not found"),
        publish_credentials(),
        &release_trigger(),
    )
    .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failed_stage.as_deref(), Some("clone-config"));
    assert_eq!(run.failed_exit_code, Some(128));
    assert!(!runner.ran("conda"));
    assert_eq!(runner.count("rm"), 1);

    let record = run.stage("clone-config").unwrap();
    assert_eq!(record.disposition, StageDisposition::Failed);
    assert!(record.error.as_deref().unwrap().contains("exited with code 128"));
}

#[tokio::test]
async fn test_credential_failure_fails_publish_without_running_it() {
    let (run, runner) = run_sample_pipeline(
        RecordingRunner::new(),
        publish_credentials().with_denied("package-index"),
        &release_trigger(),
    )
    .await;

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.failed_stage.as_deref(), Some("publish"));
    assert_eq!(run.failed_exit_code, None);

    // The stage failed before its body: no login, no upload.
    assert!(!runner.ran("anaconda"));
    assert_eq!(runner.count("chown"), 1);
    assert_eq!(runner.count("rm"), 1);

    let record = run.stage("publish").unwrap();
    assert!(record.error.as_deref().unwrap().contains("denied"));
}

#[tokio::test]
async fn test_failing_always_hook_does_not_suppress_cleanup() {
    let (run, runner) = run_sample_pipeline(
        RecordingRunner::new().failing("chown", 1, "operation not permitted"),
        publish_credentials(),
        &release_trigger(),
    )
    .await;

    // Hook failures are logged and counted, never fatal.
    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(run.hook_failures, 1);
    assert_eq!(runner.count("rm"), 1, "cleanup must still run");
}

#[tokio::test]
async fn test_failure_diagnostics_never_contain_credential_values() {
    let (run, _runner) = run_sample_pipeline(
        RecordingRunner::new().failing("anaconda", 1, "login rejected for robot:hunter2"),
        publish_credentials(),
        &release_trigger(),
    )
    .await;

    assert_eq!(run.status, RunStatus::Failed);
    let rendered = format!("{:?}", run);
    assert!(!rendered.contains("hunter2"));
    assert!(!rendered.contains("robot"));
}

#[tokio::test]
async fn test_skipped_stage_never_touches_its_credentials() {
    // The store denies the publish credential; on a dev trigger the publish
    // guard is false, so resolution must never even be attempted.
    let (run, runner) = run_sample_pipeline(
        RecordingRunner::new(),
        publish_credentials().with_denied("package-index"),
        &dev_trigger(),
    )
    .await;

    assert_eq!(run.status, RunStatus::Succeeded);
    assert_eq!(
        run.stage("publish").unwrap().disposition,
        StageDisposition::Skipped
    );
    assert!(!runner.ran("anaconda"));
}
