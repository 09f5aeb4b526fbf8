//! Scheduler (spec C8/§4.7): recurring and one-shot jobs that fire by
//! synthesising inbound/outbound records onto the bus.
//!
//! Grounded on the reference framework's `cron::scheduler`
//! (`CronScheduler<S: CronStorage>`, `tokio::select!` sleep-vs-shutdown
//! loop, `check_and_run_jobs`), with real job-firing semantics per this
//! system's contract in place of the reference's single "scheduled task"
//! inbound synthesis.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::{Job, JobId, JobSchedule};
use super::storage::JobStorage;
use crate::bus::MessageBus;
use crate::error::SchedulerError;
use crate::types::{ChannelKind, InboundMessage, OutboundMessage};

/// Default interval between due-job checks. Finer than the reference's
/// 10s default so six-field (seconds-resolution) recurring jobs and
/// near-due one-shots fire within about a second of becoming due.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// A handle to stop a running scheduler.
#[derive(Debug)]
pub struct SchedulerHandle {
    cancel: CancellationToken,
}

impl SchedulerHandle {
    /// Stop the scheduler's background loop.
    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

/// Owns the job map and drives firing.
pub struct Scheduler<S: JobStorage> {
    storage: Arc<S>,
    bus: Arc<MessageBus>,
    check_interval: Duration,
}

impl<S: JobStorage> std::fmt::Debug for Scheduler<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler").field("check_interval", &self.check_interval).finish_non_exhaustive()
    }
}

impl<S: JobStorage + 'static> Scheduler<S> {
    /// Build a scheduler over `storage`, firing jobs onto `bus`.
    #[must_use]
    pub fn new(storage: Arc<S>, bus: Arc<MessageBus>) -> Self {
        Self {
            storage,
            bus,
            check_interval: DEFAULT_CHECK_INTERVAL,
        }
    }

    /// Override the due-job check cadence.
    #[must_use]
    pub const fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Validate, persist, and upsert a job. Duplicate ids overwrite.
    pub async fn add_job(&self, job: Job) -> Result<JobId, SchedulerError> {
        job.schedule.validate()?;
        self.storage.save(&job).await?;
        Ok(job.id)
    }

    /// Remove a job; `ErrJobNotFound` if it does not exist.
    pub async fn remove_job(&self, id: &str) -> Result<(), SchedulerError> {
        if self.storage.get(&id.to_string()).await?.is_none() {
            return Err(SchedulerError::JobNotFound(id.to_string()));
        }
        self.storage.delete(&id.to_string()).await
    }

    /// Read a job by id.
    pub async fn get_job(&self, id: &str) -> Result<Option<Job>, SchedulerError> {
        self.storage.get(&id.to_string()).await
    }

    /// List every job.
    pub async fn list_jobs(&self) -> Result<Vec<Job>, SchedulerError> {
        self.storage.list().await
    }

    /// Load jobs, validate recurring schedules, fire past-due one-shots
    /// immediately, then spawn the periodic check loop.
    pub async fn start(self: Arc<Self>) -> Result<SchedulerHandle, SchedulerError> {
        let jobs = self.storage.list().await?;
        for job in &jobs {
            if let JobSchedule::Recurring { expression } = &job.schedule {
                if let Err(e) = job.schedule.validate() {
                    warn!(job_id = %job.id, expression, error = %e, "skipping job with invalid cron expression");
                }
            }
        }
        info!(job_count = jobs.len(), "scheduler starting");

        self.check_and_fire_due_jobs().await;

        let cancel = CancellationToken::new();
        let scheduler = Arc::clone(&self);
        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(scheduler.check_interval) => scheduler.check_and_fire_due_jobs().await,
                    () = loop_cancel.cancelled() => break,
                }
            }
            debug!("scheduler loop stopped");
        });

        Ok(SchedulerHandle { cancel })
    }

    async fn check_and_fire_due_jobs(&self) {
        let now = Utc::now();
        let jobs = match self.storage.list().await {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "failed to list jobs for scheduler tick");
                return;
            }
        };

        for mut job in jobs {
            if !job.is_due(now) {
                continue;
            }
            if let Err(e) = self.fire(&job).await {
                error!(job_id = %job.id, error = %e, "job firing failed");
            }
            job.mark_fired(now);
            if let Err(e) = self.storage.save(&job).await {
                error!(job_id = %job.id, error = %e, "failed to persist job after firing");
            }
        }
    }

    /// Fire one job onto the bus (spec §4.7).
    async fn fire(&self, job: &Job) -> Result<(), SchedulerError> {
        match job.tool.as_str() {
            "send_message" => {
                let session_id = job.session_id.clone().ok_or_else(|| SchedulerError::FiringFailed {
                    job_id: job.id.clone(),
                    reason: "missing session_id for send_message".to_string(),
                })?;
                let message = job.message().ok_or_else(|| SchedulerError::FiringFailed {
                    job_id: job.id.clone(),
                    reason: "missing payload.message".to_string(),
                })?;
                let channel = crate::types::parse_session_id(&session_id, ChannelKind::Telegram, true)
                    .map(|(channel, _)| channel)
                    .unwrap_or(ChannelKind::Telegram);
                let outbound = OutboundMessage::text(channel, session_id, message);
                self.bus
                    .publish_outbound(outbound)
                    .await
                    .map_err(|e| SchedulerError::FiringFailed {
                        job_id: job.id.clone(),
                        reason: e.to_string(),
                    })
            }
            "agent" => {
                let session_id = job.session_id.clone().ok_or_else(|| SchedulerError::FiringFailed {
                    job_id: job.id.clone(),
                    reason: "missing session_id for agent".to_string(),
                })?;
                let message = job.message().ok_or_else(|| SchedulerError::FiringFailed {
                    job_id: job.id.clone(),
                    reason: "missing payload.message".to_string(),
                })?;
                let (channel, _native) = crate::types::parse_session_id(&session_id, ChannelKind::Telegram, true)
                    .ok_or_else(|| SchedulerError::FiringFailed {
                        job_id: job.id.clone(),
                        reason: format!("invalid session id {session_id:?}"),
                    })?;
                let mut inbound = InboundMessage::new(channel, job.user_id.clone().unwrap_or_default(), String::new(), message);
                inbound.session_id = session_id;
                self.bus
                    .publish_inbound(inbound)
                    .await
                    .map_err(|e| SchedulerError::FiringFailed {
                        job_id: job.id.clone(),
                        reason: e.to_string(),
                    })
            }
            _ => {
                let inbound = InboundMessage::new(
                    ChannelKind::Cron,
                    job.user_id.clone().unwrap_or_default(),
                    format!("cron_{}", job.id),
                    job.tool.clone(),
                );
                self.bus
                    .publish_inbound(inbound)
                    .await
                    .map_err(|e| SchedulerError::FiringFailed {
                        job_id: job.id.clone(),
                        reason: e.to_string(),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusConfig;
    use crate::cron::storage::MemoryJobStorage;
    use crate::tracker::ResultTracker;

    async fn scheduler() -> (Arc<Scheduler<MemoryJobStorage>>, Arc<MessageBus>) {
        let bus = Arc::new(MessageBus::new(BusConfig::default(), Arc::new(ResultTracker::new())).unwrap());
        bus.start().await.unwrap();
        let storage = Arc::new(MemoryJobStorage::new());
        let scheduler = Arc::new(Scheduler::new(storage, Arc::clone(&bus)).with_check_interval(Duration::from_millis(50)));
        (scheduler, bus)
    }

    #[tokio::test]
    async fn test_add_remove_job_count_preserved() {
        let (scheduler, _bus) = scheduler().await;
        let job = Job::builder(
            "j1",
            JobSchedule::OneShot {
                execute_at: Utc::now() + chrono::Duration::seconds(60),
            },
        )
        .tool("send_message")
        .message("hi")
        .session_id("telegram:1")
        .build()
        .unwrap();

        let before = scheduler.list_jobs().await.unwrap().len();
        scheduler.add_job(job.clone()).await.unwrap();
        scheduler.remove_job(&job.id).await.unwrap();
        let after = scheduler.list_jobs().await.unwrap().len();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_remove_missing_job_errors() {
        let (scheduler, _bus) = scheduler().await;
        assert!(matches!(
            scheduler.remove_job("nonexistent").await,
            Err(SchedulerError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_one_shot_past_due_fires_and_marks_executed() {
        let (scheduler, bus) = scheduler().await;
        let mut outbound = bus.subscribe_outbound().await;

        let job = Job::builder(
            "j1",
            JobSchedule::OneShot {
                execute_at: Utc::now() - chrono::Duration::seconds(1),
            },
        )
        .tool("send_message")
        .message("ping")
        .session_id("telegram:1")
        .build()
        .unwrap();
        scheduler.add_job(job.clone()).await.unwrap();

        let handle = Arc::clone(&scheduler).start().await.unwrap();

        let received = tokio::time::timeout(Duration::from_secs(1), outbound.recv()).await.unwrap().unwrap();
        assert_eq!(received.content, "ping");
        assert_eq!(received.session_id, "telegram:1");

        tokio::time::sleep(Duration::from_millis(100)).await;
        let stored = scheduler.get_job("j1").await.unwrap().unwrap();
        assert!(stored.executed);

        handle.stop();
    }

    #[tokio::test]
    async fn test_legacy_tool_synthesises_cron_inbound() {
        let (scheduler, bus) = scheduler().await;
        let mut inbound = bus.subscribe_inbound().await;

        let job = Job::builder(
            "legacy-1",
            JobSchedule::OneShot {
                execute_at: Utc::now() - chrono::Duration::seconds(1),
            },
        )
        .tool("daily_digest")
        .build()
        .unwrap();
        scheduler.add_job(job).await.unwrap();

        let handle = Arc::clone(&scheduler).start().await.unwrap();
        let received = tokio::time::timeout(Duration::from_secs(1), inbound.recv()).await.unwrap().unwrap();
        assert_eq!(received.channel, ChannelKind::Cron);
        assert_eq!(received.content, "daily_digest");
        assert_eq!(received.session_id, "cron:cron_legacy-1");
        handle.stop();
    }
}
