//! Typing coordinator (spec §4.6): a periodic per-session "activity"
//! indicator, started on `ProcessingStart` and cancelled on
//! `ProcessingEnd`.
//!
//! Grounded on the reference framework's `heartbeat` service (a single
//! periodic task gated by a shutdown channel), restructured here into a
//! per-session cancel-handle map since this coordinator must track many
//! concurrent sessions rather than one global beat.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::bus::MessageBus;
use crate::types::{ChannelKind, EventKind};

/// Default cadence between activity signals (spec §4.6, §9 — "a channel
/// policy; make it adapter-configurable").
pub const DEFAULT_CADENCE: Duration = Duration::from_secs(3);

/// The channel-specific side effect of "show activity for this session".
#[async_trait]
pub trait ActivitySink: Send + Sync {
    /// Emit one activity signal (e.g. a Telegram "typing" chat action) for
    /// the given native session id.
    async fn send_activity(&self, native_session_id: &str);
}

/// Per-session periodic activity indicator driven by the event topic.
pub struct TypingCoordinator {
    channel: ChannelKind,
    cadence: Duration,
    sink: Arc<dyn ActivitySink>,
    accept_legacy_session_ids: bool,
    active: RwLock<HashMap<String, CancellationToken>>,
}

impl std::fmt::Debug for TypingCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypingCoordinator")
            .field("channel", &self.channel)
            .field("cadence", &self.cadence)
            .finish_non_exhaustive()
    }
}

impl TypingCoordinator {
    /// Build a coordinator for `channel`, emitting activity via `sink`.
    #[must_use]
    pub fn new(channel: ChannelKind, sink: Arc<dyn ActivitySink>, cadence: Duration, accept_legacy_session_ids: bool) -> Self {
        Self {
            channel,
            cadence,
            sink,
            accept_legacy_session_ids,
            active: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to the bus's event topic and drive the coordinator until
    /// the bus stops. Intended to be spawned as a background task.
    pub async fn run(self: Arc<Self>, bus: Arc<MessageBus>) {
        let mut events = bus.subscribe_event().await;
        while let Some(event) = events.recv().await {
            if event.channel != self.channel {
                continue;
            }
            let Some((_, native)) =
                crate::types::parse_session_id(&event.session_id, self.channel, self.accept_legacy_session_ids)
            else {
                warn!(session_id = %event.session_id, "typing coordinator: unparsable session id, ignoring");
                continue;
            };
            match event.kind {
                EventKind::ProcessingStart => self.start(event.session_id.clone(), native).await,
                EventKind::ProcessingEnd => self.end(&event.session_id).await,
            }
        }
        self.shutdown().await;
    }

    /// Start the periodic task for `session_id`, idempotently.
    async fn start(&self, session_id: String, native_session_id: String) {
        let mut active = self.active.write().await;
        if active.contains_key(&session_id) {
            return;
        }
        let cancel = CancellationToken::new();
        active.insert(session_id.clone(), cancel.clone());
        drop(active);

        let sink = Arc::clone(&self.sink);
        let cadence = self.cadence;
        tokio::spawn(async move {
            debug!(session_id = %session_id, "typing coordinator: started");
            sink.send_activity(&native_session_id).await;
            loop {
                tokio::select! {
                    () = tokio::time::sleep(cadence) => sink.send_activity(&native_session_id).await,
                    () = cancel.cancelled() => break,
                }
            }
            debug!(session_id = %session_id, "typing coordinator: stopped");
        });
    }

    /// Cancel the periodic task for `session_id`, if any.
    async fn end(&self, session_id: &str) {
        if let Some(cancel) = self.active.write().await.remove(session_id) {
            cancel.cancel();
        }
    }

    /// Cancel every active task (adapter shutdown).
    async fn shutdown(&self) {
        for (_, cancel) in self.active.write().await.drain() {
            cancel.cancel();
        }
    }

    /// Number of sessions with an active periodic task (test/introspection).
    pub async fn active_count(&self) -> usize {
        self.active.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusConfig;
    use crate::tracker::ResultTracker;
    use crate::types::Event;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(Arc<AtomicUsize>);

    #[async_trait]
    impl ActivitySink for CountingSink {
        async fn send_activity(&self, _native_session_id: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let bus = Arc::new(MessageBus::new(BusConfig::default(), Arc::new(ResultTracker::new())).unwrap());
        bus.start().await.unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let coordinator = Arc::new(TypingCoordinator::new(
            ChannelKind::Telegram,
            Arc::new(CountingSink(Arc::clone(&count))),
            Duration::from_millis(20),
            true,
        ));
        tokio::spawn(Arc::clone(&coordinator).run(Arc::clone(&bus)));

        let event = Event::new(EventKind::ProcessingStart, ChannelKind::Telegram, "1", "telegram:1");
        bus.publish_event(event.clone()).await.unwrap();
        bus.publish_event(event).await.unwrap(); // second Start is a no-op
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(coordinator.active_count().await, 1);

        bus.publish_event(Event::new(EventKind::ProcessingEnd, ChannelKind::Telegram, "1", "telegram:1"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(coordinator.active_count().await, 0);
        assert!(count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_ignores_other_channels() {
        let bus = Arc::new(MessageBus::new(BusConfig::default(), Arc::new(ResultTracker::new())).unwrap());
        bus.start().await.unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        let coordinator = Arc::new(TypingCoordinator::new(
            ChannelKind::Telegram,
            Arc::new(CountingSink(Arc::clone(&count))),
            Duration::from_millis(20),
            true,
        ));
        tokio::spawn(Arc::clone(&coordinator).run(Arc::clone(&bus)));

        bus.publish_event(Event::new(EventKind::ProcessingStart, ChannelKind::Discord, "1", "discord:1"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(coordinator.active_count().await, 0);
    }
}
