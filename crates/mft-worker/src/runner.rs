//! Run-locked job execution shared by scheduled and manual triggers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::task::TaskTracker;
use tracing;
use uuid::Uuid;

use mft_core::error::{AppError, ErrorKind};
use mft_core::result::AppResult;
use mft_database::{HistoryStore, JobStore, Stores};
use mft_entity::{Job, JobHistory, TriggerKind};

use crate::executor::TransferExecutor;
use crate::notify::WebhookDispatcher;
use crate::scheduler::FireHandler;

/// Marker held in the run-lock map while a job executes.
#[derive(Debug, Clone)]
pub struct RunToken {
    /// History row of the running execution.
    pub history_id: Uuid,
    /// What started it.
    pub trigger: TriggerKind,
    /// When it started.
    pub started_at: DateTime<Utc>,
}

/// Releases the run-lock when dropped, including on panic.
#[derive(Debug)]
struct RunGuard {
    running: Arc<DashMap<Uuid, RunToken>>,
    job_id: Uuid,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.running.remove(&self.job_id);
    }
}

#[derive(Debug)]
struct StartedRun {
    job: Job,
    history: JobHistory,
    guard: RunGuard,
}

/// Executes jobs under a per-job run-lock and notifies afterwards.
#[derive(Debug)]
pub struct JobRunner {
    jobs: Arc<dyn JobStore>,
    history: Arc<dyn HistoryStore>,
    executor: TransferExecutor,
    notifier: WebhookDispatcher,
    running: Arc<DashMap<Uuid, RunToken>>,
    tracker: TaskTracker,
}

impl JobRunner {
    /// Create a runner.
    pub fn new(stores: &Stores, executor: TransferExecutor, notifier: WebhookDispatcher) -> Self {
        Self {
            jobs: Arc::clone(&stores.jobs),
            history: Arc::clone(&stores.history),
            executor,
            notifier,
            running: Arc::new(DashMap::new()),
            tracker: TaskTracker::new(),
        }
    }

    /// Start a manual execution in the background and return its running
    /// history row. Fails with `AlreadyRunning` while the job executes.
    pub async fn run_now(self: &Arc<Self>, job_id: Uuid) -> AppResult<JobHistory> {
        let job = self.load(job_id).await?;
        let started = self.begin(job, TriggerKind::Manual).await?;
        let history = started.history.clone();

        let runner = Arc::clone(self);
        self.tracker.spawn(async move {
            if let Err(e) = runner.complete(started).await {
                tracing::error!("Manual run of job {} failed: {}", job_id, e);
            }
        });
        Ok(history)
    }

    /// Execute a job in the calling task and return its finalized history.
    pub async fn run_to_completion(
        &self,
        job_id: Uuid,
        trigger: TriggerKind,
    ) -> AppResult<JobHistory> {
        let job = self.load(job_id).await?;
        let started = self.begin(job, trigger).await?;
        self.complete(started).await
    }

    /// The token of a running job.
    pub fn running(&self, job_id: Uuid) -> Option<RunToken> {
        self.running.get(&job_id).map(|token| token.clone())
    }

    /// Whether the job currently executes.
    pub fn is_running(&self, job_id: Uuid) -> bool {
        self.running.contains_key(&job_id)
    }

    /// Wait up to `grace` for background manual runs.
    pub async fn shutdown(&self, grace: Duration) {
        self.tracker.close();
        if tokio::time::timeout(grace, self.tracker.wait()).await.is_err() {
            tracing::warn!(
                "{} manual run(s) still in flight after {}s",
                self.tracker.len(),
                grace.as_secs()
            );
        }
    }

    async fn load(&self, job_id: Uuid) -> AppResult<Job> {
        self.jobs
            .find_by_id(job_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Job {job_id} not found")))
    }

    /// Take the run-lock and create the running history row.
    async fn begin(&self, job: Job, trigger: TriggerKind) -> AppResult<StartedRun> {
        let history = JobHistory::start(job.id, &job.config_ids, trigger);
        let guard = self.lock(&job, &history)?;
        let history = self.history.create(&history).await?;
        tracing::info!(
            "Started {} run of job '{}' (history {})",
            trigger,
            job.name,
            history.id
        );
        Ok(StartedRun {
            job,
            history,
            guard,
        })
    }

    /// Execute, finalize, release the lock, then notify.
    async fn complete(&self, run: StartedRun) -> AppResult<JobHistory> {
        let StartedRun {
            job,
            history,
            guard,
        } = run;
        let finished = self.executor.execute(&job, history).await;
        drop(guard);
        let finished = finished?;

        let outcome = self.notifier.notify(&job, &finished).await;
        tracing::debug!("Notification for history {}: {:?}", finished.id, outcome);
        Ok(finished)
    }

    fn lock(&self, job: &Job, history: &JobHistory) -> AppResult<RunGuard> {
        match self.running.entry(job.id) {
            Entry::Occupied(e) => Err(AppError::already_running(format!(
                "Job '{}' is already running (history {})",
                job.name,
                e.get().history_id
            ))),
            Entry::Vacant(e) => {
                e.insert(RunToken {
                    history_id: history.id,
                    trigger: history.trigger,
                    started_at: history.start_time,
                });
                Ok(RunGuard {
                    running: Arc::clone(&self.running),
                    job_id: job.id,
                })
            }
        }
    }
}

#[async_trait]
impl FireHandler for JobRunner {
    async fn fire(&self, job_id: Uuid, fire_time: DateTime<Utc>) -> AppResult<()> {
        let job = match self.jobs.find_by_id(job_id).await? {
            Some(job) if job.enabled => job,
            _ => {
                tracing::debug!("Job {} is gone or disabled; not firing", job_id);
                return Ok(());
            }
        };
        match self.begin(job, TriggerKind::Scheduled).await {
            Ok(started) => self.complete(started).await.map(|_| ()),
            Err(e) if e.kind == ErrorKind::AlreadyRunning => {
                tracing::warn!("Skipping scheduled run at {}: {}", fire_time, e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
