//! Integration tests for the scheduler against an independent cron evaluator.

mod helpers;

use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use tokio::sync::watch;
use uuid::Uuid;

use helpers::Harness;
use mft_core::result::AppResult;
use mft_core::types::PageRequest;
use mft_database::JobStore;
use mft_database::memory::MemoryJobStore;
use mft_entity::{Job, TriggerKind};
use mft_worker::{FireHandler, Scheduler};

#[derive(Default)]
struct Recorder {
    fires: Mutex<Vec<DateTime<Utc>>>,
}

#[async_trait]
impl FireHandler for Recorder {
    async fn fire(&self, _job_id: Uuid, fire_time: DateTime<Utc>) -> AppResult<()> {
        self.fires.lock().unwrap().push(fire_time);
        Ok(())
    }
}

/// The `cron` crate wants seconds; five-field expressions fire at second 0.
fn reference(expression: &str) -> cron::Schedule {
    let fields = expression.split_whitespace().count();
    let full = if fields == 5 {
        format!("0 {expression}")
    } else {
        expression.to_string()
    };
    cron::Schedule::from_str(&full).unwrap()
}

async fn scheduler_with(expression: &str) -> (Scheduler, Arc<Recorder>, Job) {
    let jobs = Arc::new(MemoryJobStore::new());
    let job = jobs
        .create(&Job::new("timed", expression, vec![Uuid::new_v4()]))
        .await
        .unwrap();
    let recorder = Arc::new(Recorder::default());
    let scheduler = Scheduler::new(jobs, recorder.clone());
    (scheduler, recorder, job)
}

#[tokio::test]
async fn test_fire_times_match_reference_evaluator() {
    let start = Utc.with_ymd_and_hms(2031, 3, 1, 0, 0, 7).unwrap();

    for expression in ["*/15 * * * *", "0 9 1,15 * *", "30 0 */2 * * *", "5 4 * * *"] {
        let (scheduler, recorder, job) = scheduler_with(expression).await;
        let mut next = scheduler.register_at(&job, start).await.unwrap().unwrap();

        for _ in 0..8 {
            for firing in scheduler.tick(next) {
                firing.handle.await.unwrap();
            }
            next = scheduler.entry(job.id).unwrap().next_run;
        }

        let expected: Vec<DateTime<Utc>> = reference(expression).after(&start).take(9).collect();
        let fired = recorder.fires.lock().unwrap().clone();
        assert_eq!(fired, expected[..8].to_vec(), "{expression}");
        assert_eq!(next, expected[8], "{expression}");
    }
}

#[tokio::test]
async fn test_ticks_before_due_do_not_fire() {
    let start = Utc.with_ymd_and_hms(2031, 3, 1, 10, 1, 0).unwrap();
    let (scheduler, recorder, job) = scheduler_with("*/15 * * * *").await;
    let next = scheduler.register_at(&job, start).await.unwrap().unwrap();

    assert!(scheduler.tick(next - chrono::Duration::seconds(1)).is_empty());
    assert_eq!(scheduler.tick(next).len(), 1);
    assert!(scheduler.tick(next).is_empty());
    scheduler.shutdown(Duration::from_secs(1)).await;
    assert_eq!(recorder.fires.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missed_occurrences_fire_once() {
    let start = Utc.with_ymd_and_hms(2031, 3, 1, 10, 1, 0).unwrap();
    let (scheduler, recorder, job) = scheduler_with("*/15 * * * *").await;
    let first = scheduler.register_at(&job, start).await.unwrap().unwrap();

    let late = first + chrono::Duration::hours(2);
    let firings = scheduler.tick(late);
    assert_eq!(firings.len(), 1);
    for firing in firings {
        firing.handle.await.unwrap();
    }

    assert_eq!(recorder.fires.lock().unwrap().as_slice(), &[first]);
    let expected = reference("*/15 * * * *").after(&late).next().unwrap();
    assert_eq!(scheduler.entry(job.id).unwrap().next_run, expected);
}

#[tokio::test]
async fn test_startup_disables_unparseable_jobs() {
    let harness = Harness::new();
    let config = harness.config("c", &[]).await;
    let good = harness
        .job(Job::new("good", "0 * * * *", vec![config.id]))
        .await;
    let legacy = harness
        .engine
        .stores
        .jobs
        .create(&Job::new("legacy", "0 0 31 2 * * * *", vec![config.id]))
        .await
        .unwrap();

    harness.engine.scheduler.load_enabled().await.unwrap();

    assert!(harness.engine.scheduler.entry(good.id).is_some());
    assert!(harness.engine.scheduler.entry(legacy.id).is_none());
    let stored = harness.engine.service.get(legacy.id).await.unwrap();
    assert!(!stored.enabled);
    assert!(stored.next_run.is_none());
}

#[tokio::test]
async fn test_background_loop_runs_due_jobs_until_shutdown() {
    let harness = Harness::new();
    let config = harness.config("every-second", &["tick.txt"]).await;
    let job = harness
        .job(Job::new("every-second", "* * * * * *", vec![config.id]))
        .await;

    let (tx, rx) = watch::channel(false);
    let handle = harness.engine.start(rx).await.unwrap();

    let mut scheduled = 0;
    for _ in 0..300 {
        let page = harness
            .engine
            .service
            .history(job.id, PageRequest::new(1, 50))
            .await
            .unwrap();
        scheduled = page
            .items
            .iter()
            .filter(|h| h.trigger == TriggerKind::Scheduled && h.end_time.is_some())
            .count();
        if scheduled > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(scheduled > 0, "no scheduled execution finished");

    tx.send(true).unwrap();
    handle.await.unwrap();
    harness.engine.shutdown().await;

    let stored = harness.engine.service.get(job.id).await.unwrap();
    assert!(stored.last_run.is_some());
}
