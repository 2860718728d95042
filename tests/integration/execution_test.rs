//! Integration tests for job execution through the runner.

mod helpers;

use std::time::Duration;

use chrono::Utc;

use helpers::{Harness, WebhookSink, test_config};
use mft_core::error::ErrorKind;
use mft_core::types::PageRequest;
use mft_entity::{FileStatus, HistoryStatus, Job, ProviderType, TriggerKind};
use mft_worker::{FireHandler, Housekeeper};

#[tokio::test]
async fn test_partial_failure_with_rejected_credentials() {
    let harness = Harness::rejecting(vec![ProviderType::Sftp]);
    let sink = WebhookSink::start().await;
    let inbound = harness
        .config("inbound", &["a.csv", "b.csv", "c.csv"])
        .await;
    let partner = harness.sftp_config("partner-sftp").await;

    let mut job = Job::new("quarter-hourly", "*/15 * * * *", vec![inbound.id, partner.id]);
    job.webhook_enabled = true;
    job.webhook_url = Some(sink.url.clone());
    job.notify_on_failure = true;
    let job = harness.job(job).await;

    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();

    assert_eq!(history.status, HistoryStatus::Failed);
    assert_eq!(history.files_transferred, 3);
    let error = history.error_message.clone().unwrap();
    assert!(error.contains("partner-sftp"), "{error}");
    assert!(error.contains("authentication failed"), "{error}");

    let files = harness.engine.service.files(history.id).await.unwrap();
    assert_eq!(files.len(), 3);
    assert!(files.iter().all(|f| f.config_id == inbound.id));
    assert!(files.iter().all(|f| f.status == FileStatus::Processed));
    assert!(!files.iter().any(|f| f.config_id == partner.id));
    assert!(harness.remote.exists("/dst/inbound/a.csv"));

    let received = sink.received();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].json()["event"], "job.failed");
}

#[tokio::test]
async fn test_configs_run_once_each_in_order() {
    let harness = Harness::new();
    let a = harness.config("a", &["1", "2", "3", "4", "5"]).await;
    let b = harness.config("b", &["1", "2", "3", "4", "5"]).await;
    let c = harness.config("c", &["1", "2", "3", "4", "5"]).await;
    let job = harness
        .job(Job::new("ordered", "0 * * * *", vec![c.id, a.id, b.id]))
        .await;

    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();

    assert_eq!(history.status, HistoryStatus::Completed);
    assert_eq!(history.files_transferred, 15);
    assert_eq!(
        harness.remote.listed_roots(),
        vec!["/src/c".to_string(), "/src/a".to_string(), "/src/b".to_string()]
    );
    let positions: Vec<usize> = history.config_results.0.iter().map(|r| r.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[tokio::test]
async fn test_second_run_makes_no_transfer_attempts() {
    let harness = Harness::new();
    let config = harness.config("daily", &["x.txt", "y.txt", "z.txt"]).await;
    let job = harness
        .job(Job::new("daily", "0 2 * * *", vec![config.id]))
        .await;
    let runner = &harness.engine.runner;

    let first = runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();
    assert_eq!(first.files_transferred, 3);
    assert_eq!(harness.remote.writes(), 3);

    let second = runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();
    assert_eq!(second.status, HistoryStatus::Completed);
    assert_eq!(second.files_transferred, 0);
    assert_eq!(harness.remote.writes(), 3);
    assert!(harness.engine.service.files(second.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_run_now_during_execution_is_rejected() {
    let harness = Harness::new();
    let config = harness.config("slow", &["big.bin"]).await;
    let job = harness
        .job(Job::new("slow", "*/5 * * * *", vec![config.id]))
        .await;
    let runner = &harness.engine.runner;

    harness.remote.hold();
    let running = harness.engine.service.run_now(job.id).await.unwrap();
    assert_eq!(running.status, HistoryStatus::Running);
    assert!(runner.is_running(job.id));

    let err = harness.engine.service.run_now(job.id).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::AlreadyRunning);

    // A scheduled firing that meets the lock is skipped, not queued.
    runner.fire(job.id, Utc::now()).await.unwrap();

    harness.remote.release();
    harness.wait_idle(job.id).await;

    let page = harness
        .engine
        .service
        .history(job.id, PageRequest::new(1, 10))
        .await
        .unwrap();
    assert_eq!(page.total_items, 1);
    let only = &page.items[0];
    assert_eq!(only.id, running.id);
    assert_eq!(only.status, HistoryStatus::Completed);

    let next = runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();
    assert!(next.start_time >= only.end_time.unwrap());
}

#[tokio::test]
async fn test_manual_run_allowed_on_disabled_job() {
    let harness = Harness::new();
    let config = harness.config("adhoc", &["one.txt"]).await;
    let mut job = Job::new("adhoc", "0 0 1 1 *", vec![config.id]);
    job.enabled = false;
    let job = harness.job(job).await;
    assert!(harness.engine.scheduler.entry(job.id).is_none());

    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();
    assert_eq!(history.trigger, TriggerKind::Manual);
    assert_eq!(history.files_transferred, 1);
}

#[tokio::test]
async fn test_rerun_after_retention_prune_makes_no_transfers() {
    let harness = Harness::new();
    let config = harness.config("kept", &["ledger.csv"]).await;
    let job = harness
        .job(Job::new("kept", "0 3 * * *", vec![config.id]))
        .await;
    let runner = &harness.engine.runner;

    let first = runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();
    assert_eq!(first.files_transferred, 1);

    let later = Utc::now() + chrono::Duration::days(91);
    let report = Housekeeper::new(&harness.engine.stores, 90)
        .prune(later)
        .await
        .unwrap();
    assert_eq!(report.history_rows, 1);
    assert_eq!(report.file_rows, 0);

    let second = runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();
    assert_eq!(second.files_transferred, 0);
    assert_eq!(harness.remote.writes(), 1);
}

#[tokio::test]
async fn test_file_parallelism_is_bounded_per_config() {
    let harness = Harness::new();
    let names = ["1", "2", "3", "4", "5", "6", "7", "8"];
    let mut wide = harness.config("wide", &names).await;
    wide.max_concurrent_transfers = 2;
    let wide = harness.engine.stores.configs.update(&wide).await.unwrap();
    let tail = harness.config("tail", &["last.txt"]).await;
    let job = harness
        .job(Job::new("bounded", "0 * * * *", vec![wide.id, tail.id]))
        .await;

    harness.remote.slow_reads(Duration::from_millis(25));
    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();

    assert_eq!(history.status, HistoryStatus::Completed);
    assert_eq!(history.files_transferred, 9);
    assert_eq!(harness.remote.peak_concurrent_reads(), 2);
    assert_eq!(
        harness.remote.listed_roots(),
        vec!["/src/wide".to_string(), "/src/tail".to_string()]
    );
}

#[tokio::test]
async fn test_transient_failures_are_retried() {
    let harness = Harness::new();
    let config = harness.config("flaky", &["a.txt", "b.txt"]).await;
    let job = harness
        .job(Job::new("flaky", "0 * * * *", vec![config.id]))
        .await;
    let retries = test_config().worker.transfer_retry_attempts as usize;
    assert!(retries >= 1);
    harness.remote.fail_transiently("/src/flaky/a.txt", retries);
    harness.remote.fail_transiently("/dst/flaky/b.txt", 1);

    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();

    assert_eq!(history.status, HistoryStatus::Completed);
    assert_eq!(history.files_transferred, 2);
    assert_eq!(harness.remote.attempts("/src/flaky/a.txt"), retries + 1);
    assert_eq!(harness.remote.attempts("/dst/flaky/b.txt"), 2);
    assert!(harness.remote.exists("/dst/flaky/a.txt"));
    assert!(harness.remote.exists("/dst/flaky/b.txt"));
}

#[tokio::test]
async fn test_exhausted_retries_record_one_error_and_continue() {
    let harness = Harness::new();
    let config = harness.config("lossy", &["bad.txt", "good.txt"]).await;
    let next = harness.config("next", &["n.txt"]).await;
    let job = harness
        .job(Job::new("lossy", "0 * * * *", vec![config.id, next.id]))
        .await;
    let retries = test_config().worker.transfer_retry_attempts as usize;
    harness.remote.fail_transiently("/src/lossy/bad.txt", usize::MAX);

    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();

    assert_eq!(history.status, HistoryStatus::Failed);
    assert_eq!(history.files_transferred, 2);
    assert_eq!(harness.remote.attempts("/src/lossy/bad.txt"), retries + 1);

    let results = &history.config_results.0;
    assert!(results[0].is_failed());
    assert_eq!(results[0].files_failed, 1);
    assert_eq!(results[0].files_transferred, 1);
    assert!(!results[1].is_failed());

    let files = harness.engine.service.files(history.id).await.unwrap();
    let errors: Vec<_> = files
        .iter()
        .filter(|f| f.status == FileStatus::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].file_name, "bad.txt");
    assert!(
        errors[0]
            .error_message
            .as_deref()
            .unwrap()
            .contains("connection reset")
    );
}

#[tokio::test]
async fn test_authentication_failures_are_not_retried() {
    let harness = Harness::new();
    let config = harness.config("locked", &["secret.txt"]).await;
    let job = harness
        .job(Job::new("locked", "0 * * * *", vec![config.id]))
        .await;
    harness.remote.reject("/src/locked/secret.txt");

    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();

    assert_eq!(history.status, HistoryStatus::Failed);
    assert_eq!(harness.remote.attempts("/src/locked/secret.txt"), 1);
    assert!(
        history
            .error_message
            .as_deref()
            .unwrap()
            .contains("authentication failed")
    );
}
