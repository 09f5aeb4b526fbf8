//! Gateway: owns the bus, channel manager, scheduler, and typing
//! coordinator, and drives their lifecycle as one unit (spec C1-C8 wiring).
//!
//! Grounded on the reference bot framework's `gateway::Gateway` (bus +
//! `ChannelManager` orchestration, a `run()` that starts everything then
//! blocks until shutdown) with its model/agent-loop orchestration dropped —
//! this system has no model or agent-loop concept — and the scheduler and
//! typing coordinator wired in its place.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::bus::{BusConfig, BusMetrics, MessageBus};
use crate::channel::{ChannelManager, ChannelStatus};
use crate::config::Config;
use crate::cron::{FileJobStorage, Scheduler, SchedulerHandle};
use crate::error::Result;
use crate::tracker::{DEFAULT_SWEEP_INTERVAL, ResultTracker};

#[cfg(feature = "telegram")]
use crate::channel::Channel;
#[cfg(feature = "telegram")]
use crate::channels::telegram::TelegramChannel;
#[cfg(feature = "telegram")]
use crate::types::ChannelKind;
#[cfg(feature = "telegram")]
use crate::typing::{ActivitySink, TypingCoordinator};

/// Owns the bus and every component that publishes or consumes it.
pub struct Gateway {
    config: Config,
    bus: Arc<MessageBus>,
    channels: ChannelManager,
    tracker: Arc<ResultTracker>,
    #[cfg(feature = "telegram")]
    telegram: Arc<TelegramChannel>,
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway").finish_non_exhaustive()
    }
}

impl Gateway {
    /// Build a gateway from loaded configuration.
    pub fn new(config: Config) -> Result<Self> {
        let tracker = Arc::new(ResultTracker::new());
        let bus = Arc::new(MessageBus::new(
            BusConfig {
                topic_capacity: config.bus_topic_capacity(),
                subscriber_capacity: config.bus_subscriber_capacity(),
            },
            Arc::clone(&tracker),
        )?);
        let channels = ChannelManager::new(Arc::clone(&bus));

        #[cfg(feature = "telegram")]
        let telegram = Arc::new(TelegramChannel::new(config.telegram()));

        Ok(Self {
            config,
            bus,
            channels,
            tracker,
            #[cfg(feature = "telegram")]
            telegram,
        })
    }

    /// The shared bus, for callers that publish/subscribe directly (tests,
    /// the scheduler's immediate one-shot path, the `status`/`config` CLI
    /// subcommands).
    #[must_use]
    pub fn bus(&self) -> Arc<MessageBus> {
        Arc::clone(&self.bus)
    }

    /// The correlation tracker, for callers awaiting a [`crate::types::SendResult`].
    #[must_use]
    pub fn tracker(&self) -> Arc<ResultTracker> {
        Arc::clone(&self.tracker)
    }

    /// Current bus metrics (spec §4.1, §6).
    pub async fn metrics(&self) -> BusMetrics {
        self.bus.metrics().await
    }

    /// Status of every registered channel.
    pub async fn channel_statuses(&self) -> Vec<ChannelStatus> {
        self.channels.status_all().await
    }

    /// Start the bus, registered channels, the typing coordinator, and the
    /// scheduler, then run until `shutdown` resolves, tearing everything
    /// back down in reverse order before returning.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.bus.start().await?;
        info!("message bus started");

        #[cfg(feature = "telegram")]
        self.channels.register(Arc::clone(&self.telegram) as Arc<dyn Channel>).await;

        for result in self.channels.start_all().await {
            if let Err(e) = result {
                error!(error = %e, "failed to start channel");
            }
        }

        let typing_task = self.spawn_typing_coordinator();
        let scheduler_handle = self.start_scheduler().await?;
        let sweeper_cancel = CancellationToken::new();
        let sweeper_task = Arc::clone(&self.tracker).spawn_sweeper(DEFAULT_SWEEP_INTERVAL, sweeper_cancel.clone());

        info!("gateway running");
        shutdown.await;
        info!("gateway shutting down");

        sweeper_cancel.cancel();
        let _ = sweeper_task.await;
        if let Some(handle) = scheduler_handle {
            handle.stop();
        }
        if let Some(task) = typing_task {
            task.abort();
        }
        self.channels.stop_all().await;
        self.bus.stop().await?;
        info!("gateway stopped");
        Ok(())
    }

    #[cfg(feature = "telegram")]
    fn spawn_typing_coordinator(&self) -> Option<JoinHandle<()>> {
        let settings = self.config.telegram();
        let sink = Arc::clone(&self.telegram) as Arc<dyn ActivitySink>;
        let coordinator = Arc::new(TypingCoordinator::new(ChannelKind::Telegram, sink, self.config.typing_cadence(), settings.accept_legacy_session_ids));
        Some(tokio::spawn(coordinator.run(self.bus())))
    }

    #[cfg(not(feature = "telegram"))]
    fn spawn_typing_coordinator(&self) -> Option<JoinHandle<()>> {
        None
    }

    async fn start_scheduler(&self) -> Result<Option<SchedulerHandle>> {
        let storage = Arc::new(FileJobStorage::new(self.config.scheduler_storage_path()));
        storage.init().await?;
        let scheduler = Arc::new(Scheduler::new(storage, self.bus()).with_check_interval(self.config.scheduler_check_interval()));
        let handle = scheduler.start().await?;
        Ok(Some(handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_gateway_builds_from_default_config() {
        let gateway = Gateway::new(Config::default()).unwrap();
        let metrics = gateway.metrics().await;
        assert_eq!(metrics.inbound.published, 0);
    }

    #[tokio::test]
    async fn test_gateway_run_starts_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.scheduler = Some(crate::config::SchedulerSettings {
            storage_path: Some(dir.path().join("jobs.json").to_string_lossy().to_string()),
            check_interval_secs: 1,
        });
        let gateway = Gateway::new(config).unwrap();

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel();
        let run = tokio::spawn(async move {
            gateway.run(async {
                let _ = stop_rx.await;
            })
            .await
        });

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        stop_tx.send(()).unwrap();
        run.await.unwrap().unwrap();
    }
}
