//! Per-job timer registry driven by a periodic tick.
//!
//! Every enabled job owns exactly one slot. A slot is `Scheduled` while it
//! waits for its next run and `Firing` while an execution started by
//! [`Scheduler::tick`] is in flight. Schedule edits and removals that arrive
//! during a firing are parked on the slot and applied once it completes, so
//! a job never fires twice for the same occurrence.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::task::TaskTracker;
use tracing;
use uuid::Uuid;

use mft_core::error::ErrorKind;
use mft_core::result::AppResult;
use mft_database::JobStore;
use mft_entity::Job;

use crate::schedule::CronSchedule;

/// Receives due jobs from the scheduler.
#[async_trait]
pub trait FireHandler: Send + Sync + 'static {
    /// Run the job for the occurrence at `fire_time`. Errors are logged and
    /// never stop the scheduler.
    async fn fire(&self, job_id: Uuid, fire_time: DateTime<Utc>) -> AppResult<()>;
}

/// Lifecycle state of a registered job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Waiting for `next_run`.
    Scheduled,
    /// An execution for the last occurrence is in flight.
    Firing,
}

#[derive(Debug)]
enum PendingChange {
    Reschedule(CronSchedule),
    Remove,
}

#[derive(Debug)]
struct Slot {
    schedule: CronSchedule,
    next_run: DateTime<Utc>,
    state: SlotState,
    pending: Option<PendingChange>,
}

/// Read-only view of a registered job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleEntry {
    /// Job identifier.
    pub job_id: Uuid,
    /// Active cron expression.
    pub schedule: String,
    /// Next fire time.
    pub next_run: DateTime<Utc>,
    /// Current state.
    pub state: SlotState,
}

/// A firing started by [`Scheduler::tick`].
#[derive(Debug)]
pub struct Firing {
    /// The fired job.
    pub job_id: Uuid,
    /// The occurrence being executed.
    pub fire_time: DateTime<Utc>,
    /// Completes after the execution finished and the job was rescheduled.
    pub handle: JoinHandle<()>,
}

struct Inner {
    slots: DashMap<Uuid, Slot>,
    jobs: Arc<dyn JobStore>,
    handler: Arc<dyn FireHandler>,
    tracker: TaskTracker,
}

/// The job scheduler. Cheap to clone; clones share one registry.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("registered", &self.inner.slots.len())
            .finish()
    }
}

impl Scheduler {
    /// Create an empty scheduler.
    pub fn new(jobs: Arc<dyn JobStore>, handler: Arc<dyn FireHandler>) -> Self {
        Self {
            inner: Arc::new(Inner {
                slots: DashMap::new(),
                jobs,
                handler,
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Register every enabled job in the store.
    ///
    /// Jobs whose schedule no longer parses are disabled in the store.
    pub async fn load_enabled(&self) -> AppResult<usize> {
        let jobs = self.inner.jobs.list_enabled().await?;
        let mut registered = 0;
        for job in jobs {
            match self.register(&job).await {
                Ok(_) => registered += 1,
                Err(e) if e.kind == ErrorKind::InvalidSchedule => {
                    tracing::error!("Disabling job '{}' ({}): {}", job.name, job.id, e);
                    self.inner.jobs.set_enabled(job.id, false).await?;
                }
                Err(e) => return Err(e),
            }
        }
        tracing::info!("Registered {} enabled job(s)", registered);
        Ok(registered)
    }

    /// Register or update a job using the current time.
    pub async fn register(&self, job: &Job) -> AppResult<Option<DateTime<Utc>>> {
        self.register_at(job, Utc::now()).await
    }

    /// Register or update a job as of `now`.
    ///
    /// Returns the next run when it took effect immediately. A job that is
    /// firing keeps its execution and picks the new schedule up afterwards,
    /// in which case `None` is returned. Disabled jobs are unregistered.
    pub async fn register_at(
        &self,
        job: &Job,
        now: DateTime<Utc>,
    ) -> AppResult<Option<DateTime<Utc>>> {
        if !job.enabled {
            self.unregister(job.id).await?;
            return Ok(None);
        }

        let schedule = CronSchedule::parse(&job.schedule)?;
        let next = schedule.next_after(now)?;

        let applied = match self.inner.slots.entry(job.id) {
            Entry::Occupied(mut e) if e.get().state == SlotState::Firing => {
                e.get_mut().pending = Some(PendingChange::Reschedule(schedule));
                None
            }
            Entry::Occupied(mut e) => {
                let slot = e.get_mut();
                slot.schedule = schedule;
                slot.next_run = next;
                Some(next)
            }
            Entry::Vacant(e) => {
                e.insert(Slot {
                    schedule,
                    next_run: next,
                    state: SlotState::Scheduled,
                    pending: None,
                });
                Some(next)
            }
        };

        match applied {
            Some(next) => {
                self.inner
                    .jobs
                    .update_schedule_times(job.id, None, Some(next))
                    .await?;
                tracing::info!(
                    "Job '{}' scheduled with '{}', next run at {}",
                    job.name,
                    job.schedule,
                    next
                );
            }
            None => tracing::info!(
                "Job '{}' is firing; schedule '{}' applies after it completes",
                job.name,
                job.schedule
            ),
        }
        Ok(applied)
    }

    /// Remove a job's slot. Idempotent. A firing job finishes its execution
    /// and is dropped afterwards.
    pub async fn unregister(&self, job_id: Uuid) -> AppResult<()> {
        let removed = match self.inner.slots.entry(job_id) {
            Entry::Occupied(mut e) if e.get().state == SlotState::Firing => {
                e.get_mut().pending = Some(PendingChange::Remove);
                false
            }
            Entry::Occupied(e) => {
                e.remove();
                true
            }
            Entry::Vacant(_) => false,
        };
        if removed {
            self.inner.clear_next_run(job_id).await?;
            tracing::info!("Job {} unregistered", job_id);
        }
        Ok(())
    }

    /// Fire every scheduled job due at `now`.
    ///
    /// Each firing runs on its own task; the returned handles complete once
    /// the execution finished and the job was rescheduled.
    pub fn tick(&self, now: DateTime<Utc>) -> Vec<Firing> {
        let due: Vec<(Uuid, DateTime<Utc>)> = self
            .inner
            .slots
            .iter_mut()
            .filter_map(|mut slot| {
                if slot.state == SlotState::Scheduled && slot.next_run <= now {
                    slot.state = SlotState::Firing;
                    Some((*slot.key(), slot.next_run))
                } else {
                    None
                }
            })
            .collect();

        due.into_iter()
            .map(|(job_id, fire_time)| {
                let inner = Arc::clone(&self.inner);
                let handle = self
                    .inner
                    .tracker
                    .spawn(async move { inner.run_firing(job_id, fire_time, now).await });
                Firing {
                    job_id,
                    fire_time,
                    handle,
                }
            })
            .collect()
    }

    /// Drive [`tick`](Self::tick) every `interval` until `cancel` turns true.
    pub async fn run(&self, interval: Duration, mut cancel: watch::Receiver<bool>) {
        tracing::info!(
            "Scheduler started with tick interval {}ms",
            interval.as_millis()
        );
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        tracing::info!("Scheduler received shutdown signal");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let fired = self.tick(Utc::now());
                    tracing::trace!("Tick fired {} job(s)", fired.len());
                }
            }
        }
    }

    /// Wait up to `grace` for in-flight firings.
    pub async fn shutdown(&self, grace: Duration) {
        self.inner.tracker.close();
        tracing::info!(
            "Waiting for {} in-flight firing(s)...",
            self.inner.tracker.len()
        );
        if tokio::time::timeout(grace, self.inner.tracker.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                "Shutdown grace of {}s elapsed with firings still running",
                grace.as_secs()
            );
        }
    }

    /// Snapshot of one job's slot.
    pub fn entry(&self, job_id: Uuid) -> Option<ScheduleEntry> {
        self.inner.slots.get(&job_id).map(|slot| ScheduleEntry {
            job_id,
            schedule: slot.schedule.expression().to_string(),
            next_run: slot.next_run,
            state: slot.state,
        })
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    /// Whether no job is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }
}

enum Completion {
    Rescheduled(DateTime<Utc>),
    Dropped,
    Missing,
}

impl Inner {
    async fn run_firing(&self, job_id: Uuid, fire_time: DateTime<Utc>, tick_time: DateTime<Utc>) {
        tracing::debug!("Firing job {} for {}", job_id, fire_time);
        let handler = Arc::clone(&self.handler);
        let outcome = tokio::spawn(async move { handler.fire(job_id, fire_time).await }).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!("Firing of job {} failed: {}", job_id, e),
            Err(e) => tracing::error!("Firing of job {} aborted: {}", job_id, e),
        }
        self.complete(job_id, fire_time, tick_time).await;
    }

    /// Apply parked changes and compute the next run from the fire time.
    /// Occurrences already in the past at `tick_time` are skipped.
    async fn complete(&self, job_id: Uuid, fire_time: DateTime<Utc>, tick_time: DateTime<Utc>) {
        // Decide and remove under one entry guard so a concurrent
        // registration cannot park a change on a slot about to disappear.
        let completion = match self.slots.entry(job_id) {
            Entry::Vacant(_) => Completion::Missing,
            Entry::Occupied(mut entry) => {
                let slot = entry.get_mut();
                let completion = match slot.pending.take() {
                    Some(PendingChange::Remove) => Completion::Dropped,
                    pending => {
                        if let Some(PendingChange::Reschedule(schedule)) = pending {
                            slot.schedule = schedule;
                        }
                        let next = slot.schedule.next_after(fire_time).and_then(|next| {
                            if next > tick_time {
                                Ok(next)
                            } else {
                                slot.schedule.next_after(tick_time)
                            }
                        });
                        match next {
                            Ok(next) => {
                                slot.next_run = next;
                                slot.state = SlotState::Scheduled;
                                Completion::Rescheduled(next)
                            }
                            Err(e) => {
                                tracing::warn!("Job {} has no further runs: {}", job_id, e);
                                Completion::Dropped
                            }
                        }
                    }
                };
                if matches!(completion, Completion::Dropped) {
                    entry.remove();
                }
                completion
            }
        };

        let next_run = match completion {
            Completion::Rescheduled(next) => {
                tracing::debug!("Job {} next run at {}", job_id, next);
                Some(next)
            }
            Completion::Dropped => {
                tracing::info!("Job {} dropped after its last firing", job_id);
                None
            }
            Completion::Missing => None,
        };

        if let Err(e) = self
            .jobs
            .update_schedule_times(job_id, Some(fire_time), next_run)
            .await
        {
            if e.kind != ErrorKind::NotFound {
                tracing::error!("Failed to store schedule times for job {}: {}", job_id, e);
            }
        }
    }

    async fn clear_next_run(&self, job_id: Uuid) -> AppResult<()> {
        match self.jobs.update_schedule_times(job_id, None, None).await {
            Err(e) if e.kind == ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}
