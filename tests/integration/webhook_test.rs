//! Integration tests for webhook notifications against an in-process sink.

mod helpers;

use chrono::Utc;
use uuid::Uuid;

use helpers::{Harness, WebhookSink, test_config};
use mft_entity::{ConfigRunResult, HistoryStatus, Job, JobHistory, TriggerKind};
use mft_worker::notify::{EVENT_HEADER, SIGNATURE_HEADER, sign};
use mft_worker::{NotifyOutcome, WebhookDispatcher};

fn dispatcher() -> WebhookDispatcher {
    WebhookDispatcher::new(&test_config().webhook).unwrap()
}

fn hooked_job(url: &str, on_success: bool, on_failure: bool) -> Job {
    let mut job = Job::new("hooked", "0 * * * *", vec![Uuid::new_v4()]);
    job.webhook_enabled = true;
    job.webhook_url = Some(url.to_string());
    job.notify_on_success = on_success;
    job.notify_on_failure = on_failure;
    job
}

fn finished(job: &Job, succeeded: bool) -> JobHistory {
    let mut history = JobHistory::start(job.id, &job.config_ids, TriggerKind::Scheduled);
    let mut result = ConfigRunResult::new(job.config_ids[0], "only", 0);
    result.files_transferred = 2;
    result.bytes = 64;
    if !succeeded {
        result.fail("PROVIDER_AUTH: denied");
    }
    history.finish(vec![result], Utc::now());
    history
}

#[tokio::test]
async fn test_notify_matches_flags_for_all_combinations() {
    for on_success in [false, true] {
        for on_failure in [false, true] {
            for succeeded in [true, false] {
                let sink = WebhookSink::start().await;
                let job = hooked_job(&sink.url, on_success, on_failure);
                let history = finished(&job, succeeded);

                let outcome = dispatcher().notify(&job, &history).await;

                let wanted = if succeeded { on_success } else { on_failure };
                let calls = sink.received().len();
                assert_eq!(
                    calls,
                    usize::from(wanted),
                    "success={on_success} failure={on_failure} succeeded={succeeded}"
                );
                if wanted {
                    assert_eq!(outcome, NotifyOutcome::Delivered { attempts: 1 });
                } else {
                    assert_eq!(outcome, NotifyOutcome::Skipped);
                }
            }
        }
    }
}

#[tokio::test]
async fn test_payload_headers_and_signature() {
    let sink = WebhookSink::start().await;
    let mut job = hooked_job(&sink.url, false, true);
    job.webhook_secret = Some("shh".into());
    job.webhook_headers =
        Some(r#"{"X-Team": "integrations", "X-Hub-Signature-256": "forged"}"#.into());
    let history = finished(&job, false);

    dispatcher().notify(&job, &history).await;

    let received = sink.received();
    assert_eq!(received.len(), 1);
    let call = &received[0];
    assert_eq!(call.header("x-team").as_deref(), Some("integrations"));
    assert_eq!(call.header(EVENT_HEADER).as_deref(), Some("job.failed"));
    assert_eq!(
        call.header("content-type").as_deref(),
        Some("application/json")
    );
    assert_eq!(
        call.header(SIGNATURE_HEADER),
        Some(sign("shh", &call.body).unwrap())
    );

    let body = call.json();
    assert_eq!(body["event"], "job.failed");
    assert_eq!(body["job_id"], job.id.to_string());
    assert_eq!(body["history_id"], history.id.to_string());
    assert_eq!(body["files_transferred"], 2);
    assert_eq!(body["bytes_transferred"], 64);
    assert_eq!(body["config_results"][0]["config_name"], "only");
    assert!(body["error_message"].as_str().unwrap().contains("denied"));
}

#[tokio::test]
async fn test_failed_delivery_is_retried_once() {
    let sink = WebhookSink::failing_first(1).await;
    let job = hooked_job(&sink.url, true, true);
    let outcome = dispatcher().notify(&job, &finished(&job, true)).await;
    assert_eq!(outcome, NotifyOutcome::Delivered { attempts: 2 });
    assert_eq!(sink.received().len(), 2);

    let sink = WebhookSink::failing_first(5).await;
    let job = hooked_job(&sink.url, true, true);
    let outcome = dispatcher().notify(&job, &finished(&job, true)).await;
    assert_eq!(outcome, NotifyOutcome::Failed);
    assert_eq!(sink.received().len(), 2);
}

#[tokio::test]
async fn test_webhook_failure_does_not_fail_the_job() {
    let harness = Harness::new();
    let sink = WebhookSink::failing_first(10).await;
    let config = harness.config("c", &["a.txt"]).await;
    let mut job = Job::new("noisy", "0 * * * *", vec![config.id]);
    job.webhook_enabled = true;
    job.webhook_url = Some(sink.url.clone());
    job.notify_on_success = true;
    let job = harness.job(job).await;

    let history = harness
        .engine
        .runner
        .run_to_completion(job.id, TriggerKind::Manual)
        .await
        .unwrap();

    assert_eq!(history.status, HistoryStatus::Completed);
    assert_eq!(sink.received().len(), 2);
    let stored = harness.engine.service.execution(history.id).await.unwrap();
    assert_eq!(stored.status, HistoryStatus::Completed);
}
