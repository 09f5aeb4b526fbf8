//! The bounded broadcast bus (spec §4.1): four independent topics —
//! inbound, outbound, event, send-result — each a bounded FIFO queue
//! fanned out to per-subscriber bounded queues without blocking slow
//! consumers.
//!
//! Grounded on the reference bot framework's `MessageBus` (single inbound
//! channel + broadcast outbound + per-channel subscriber map), generalised
//! to four independently-bounded topics with per-subscriber drop isolation
//! and drop accounting, as this system's contract requires.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::BusError;
use crate::tracker::ResultTracker;
use crate::types::{Event, InboundMessage, OutboundMessage, SendResult};

/// Bounded wait before the send-result topic forces a blocking enqueue
/// (spec §4.1, §9 "result-topic asymmetry").
const SEND_RESULT_FORCE_WAIT: Duration = Duration::from_millis(100);

/// Sizing for the bus's four topics.
#[derive(Debug, Clone, Copy)]
pub struct BusConfig {
    /// Capacity of each topic's internal FIFO queue.
    pub topic_capacity: usize,
    /// Capacity of each subscriber's private queue.
    pub subscriber_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            topic_capacity: 256,
            subscriber_capacity: 8,
        }
    }
}

impl BusConfig {
    fn validate(self) -> Result<Self, BusError> {
        if self.topic_capacity == 0 || self.subscriber_capacity == 0 {
            return Err(BusError::QueueFull);
        }
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BusState {
    NotStarted,
    Started,
}

/// A drained-on-demand handle to one subscriber's queue.
///
/// The sequence terminates (`recv` returns `None`) once the bus stops.
#[derive(Debug)]
pub struct Subscription<T> {
    rx: mpsc::Receiver<T>,
}

impl<T> Subscription<T> {
    /// Await the next record, or `None` once the topic has closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

/// Per-topic counters exposed via [`BusMetrics`].
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TopicMetrics {
    /// Records accepted onto the topic queue.
    pub published: u64,
    /// Records dropped while fanning out to a subscriber.
    pub dropped: u64,
    /// Current number of registered subscribers.
    pub subscribers: usize,
    /// Current topic queue depth.
    pub depth: usize,
}

/// A point-in-time snapshot of bus-wide metrics (spec §4.1, §6).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BusMetrics {
    /// Inbound topic metrics.
    pub inbound: TopicMetrics,
    /// Outbound topic metrics.
    pub outbound: TopicMetrics,
    /// Event topic metrics.
    pub event: TopicMetrics,
    /// Send-result topic metrics.
    pub send_result: TopicMetrics,
}

impl BusMetrics {
    /// Total inbound drops, matching the §6 drop-metrics view key.
    #[must_use]
    pub const fn inbound_messages_dropped(&self) -> u64 {
        self.inbound.dropped
    }

    /// Total outbound drops.
    #[must_use]
    pub const fn outbound_messages_dropped(&self) -> u64 {
        self.outbound.dropped
    }

    /// Total event drops.
    #[must_use]
    pub const fn events_dropped(&self) -> u64 {
        self.event.dropped
    }

    /// Total send-result drops.
    #[must_use]
    pub const fn results_dropped(&self) -> u64 {
        self.send_result.dropped
    }
}

struct Subscriber<T> {
    id: u64,
    tx: mpsc::Sender<T>,
}

/// One broadcast topic: a bounded queue fanned out to N bounded subscriber
/// queues, with per-subscriber drop isolation.
struct Topic<T> {
    name: &'static str,
    capacity: usize,
    subscriber_capacity: usize,
    sender: RwLock<Option<mpsc::Sender<T>>>,
    subscribers: RwLock<Vec<Subscriber<T>>>,
    next_subscriber_id: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl<T> Topic<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn new(name: &'static str, capacity: usize, subscriber_capacity: usize) -> Self {
        Self {
            name,
            capacity,
            subscriber_capacity,
            sender: RwLock::new(None),
            subscribers: RwLock::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
            published: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Open the topic queue and spawn its fan-out worker.
    async fn start(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel(self.capacity);
        *self.sender.write().await = Some(tx);
        let topic = Arc::clone(self);
        tokio::spawn(async move { topic.run(rx, cancel).await })
    }

    async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<T>, cancel: CancellationToken) {
        debug!(topic = self.name, "fan-out worker started");
        loop {
            tokio::select! {
                biased;
                record = rx.recv() => {
                    match record {
                        Some(record) => self.fan_out(record).await,
                        None => break,
                    }
                }
                () = cancel.cancelled() => break,
            }
        }
        // `stop()` drops this topic's sender before cancelling, so every
        // record published before `Stop()` is already buffered in `rx` by
        // the time either branch above breaks out; drain it here so none of
        // them are lost (spec §5/§8 scenario 5) before closing subscribers.
        while let Ok(record) = rx.try_recv() {
            self.fan_out(record).await;
        }
        self.subscribers.write().await.clear();
        debug!(topic = self.name, "fan-out worker stopped");
    }

    async fn fan_out(&self, record: T) {
        let subscribers = self.subscribers.read().await;
        for subscriber in subscribers.iter() {
            if subscriber.tx.try_send(record.clone()).is_err() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    topic = self.name,
                    subscriber_id = subscriber.id,
                    "subscriber queue full or closed, dropping record"
                );
            }
        }
    }

    /// Non-blocking enqueue onto the topic queue.
    async fn publish(&self, record: T) -> Result<(), BusError> {
        let guard = self.sender.read().await;
        let Some(sender) = guard.as_ref() else {
            return Err(BusError::NotStarted);
        };
        sender.try_send(record).map_err(|_| BusError::QueueFull)
    }

    /// Bounded-wait-then-force enqueue, used only by the send-result topic.
    async fn publish_must_deliver(&self, record: T) -> Result<(), BusError> {
        let guard = self.sender.read().await;
        let Some(sender) = guard.as_ref() else {
            return Err(BusError::NotStarted);
        };
        if sender.try_send(record.clone()).is_ok() {
            return Ok(());
        }
        match tokio::time::timeout(SEND_RESULT_FORCE_WAIT, sender.send(record.clone())).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(BusError::NotStarted),
            Err(_) => {
                warn!(topic = self.name, "forcing blocking enqueue past bounded wait");
                sender.send(record).await.map_err(|_| BusError::NotStarted)
            }
        }
    }

    /// Subscribe to this topic. Returns an already-closed [`Subscription`]
    /// (its `recv` resolves to `None` immediately) if the topic has no
    /// running fan-out worker — i.e. the bus is not `Started` — per spec
    /// §4.1/§5 failure semantics: "Subscribe on a stopped bus returns a
    /// null/closed handle."
    async fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::channel(self.subscriber_capacity);
        if self.sender.read().await.is_some() {
            let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
            self.subscribers.write().await.push(Subscriber { id, tx });
        }
        // else: `tx` is dropped here, immediately closing `rx`.
        Subscription { rx }
    }

    async fn metrics(&self) -> TopicMetrics {
        let subscribers = self.subscribers.read().await.len();
        let depth = self
            .sender
            .read()
            .await
            .as_ref()
            .map_or(0, |s| s.max_capacity().saturating_sub(s.capacity()));
        TopicMetrics {
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            subscribers,
            depth,
        }
    }

    fn reset(&self) {
        self.dropped.store(0, Ordering::Relaxed);
    }
}

/// The four-topic message bus (spec C2).
pub struct MessageBus {
    state: RwLock<BusState>,
    cancel: RwLock<Option<CancellationToken>>,
    workers: RwLock<Vec<JoinHandle<()>>>,
    inbound: Arc<Topic<InboundMessage>>,
    outbound: Arc<Topic<OutboundMessage>>,
    event: Arc<Topic<Event>>,
    send_result: Arc<Topic<SendResult>>,
    tracker: Arc<ResultTracker>,
}

impl std::fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBus").finish_non_exhaustive()
    }
}

impl MessageBus {
    /// Build a bus with the given topic/subscriber sizing.
    ///
    /// Fails with [`BusError::QueueFull`] if either capacity is zero — a
    /// zero-capacity bus is a configuration error, never a runtime one
    /// (spec §8 boundary behaviour).
    pub fn new(config: BusConfig, tracker: Arc<ResultTracker>) -> Result<Self, BusError> {
        let config = config.validate()?;
        Ok(Self {
            state: RwLock::new(BusState::NotStarted),
            cancel: RwLock::new(None),
            workers: RwLock::new(Vec::new()),
            inbound: Arc::new(Topic::new("inbound", config.topic_capacity, config.subscriber_capacity)),
            outbound: Arc::new(Topic::new("outbound", config.topic_capacity, config.subscriber_capacity)),
            event: Arc::new(Topic::new("event", config.topic_capacity, config.subscriber_capacity)),
            send_result: Arc::new(Topic::new("send_result", config.topic_capacity, config.subscriber_capacity)),
            tracker,
        })
    }

    /// Transition NotStarted → Started, spawning one fan-out worker per
    /// topic. Idempotent failure when already started.
    pub async fn start(&self) -> Result<(), BusError> {
        let mut state = self.state.write().await;
        if *state == BusState::Started {
            return Err(BusError::AlreadyStarted);
        }
        let cancel = CancellationToken::new();
        let mut workers = Vec::with_capacity(4);
        workers.push(self.inbound.start(cancel.clone()).await);
        workers.push(self.outbound.start(cancel.clone()).await);
        workers.push(self.event.start(cancel.clone()).await);
        workers.push(self.send_result.start(cancel.clone()).await);
        *self.cancel.write().await = Some(cancel);
        *self.workers.write().await = workers;
        *state = BusState::Started;
        debug!("message bus started");
        Ok(())
    }

    /// Transition Started → NotStarted: cancel fan-out workers, let each
    /// close its subscriber queues, then close the topic queues.
    pub async fn stop(&self) -> Result<(), BusError> {
        let mut state = self.state.write().await;
        if *state == BusState::NotStarted {
            return Err(BusError::NotStarted);
        }
        // Drop every topic's sender *before* cancelling the fan-out workers,
        // so each worker's `rx` already holds every record published before
        // `Stop()` and can drain it to `None` instead of racing `cancel`.
        *self.inbound.sender.write().await = None;
        *self.outbound.sender.write().await = None;
        *self.event.sender.write().await = None;
        *self.send_result.sender.write().await = None;
        if let Some(cancel) = self.cancel.write().await.take() {
            cancel.cancel();
        }
        for worker in self.workers.write().await.drain(..) {
            let _ = worker.await;
        }
        *state = BusState::NotStarted;
        debug!("message bus stopped");
        Ok(())
    }

    async fn is_started(&self) -> bool {
        *self.state.read().await == BusState::Started
    }

    /// Publish an inbound message.
    pub async fn publish_inbound(&self, record: InboundMessage) -> Result<(), BusError> {
        if !self.is_started().await {
            return Err(BusError::NotStarted);
        }
        let result = self.inbound.publish(record).await;
        if result.is_ok() {
            self.inbound.published.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Publish an outbound message.
    pub async fn publish_outbound(&self, record: OutboundMessage) -> Result<(), BusError> {
        if !self.is_started().await {
            return Err(BusError::NotStarted);
        }
        let result = self.outbound.publish(record).await;
        if result.is_ok() {
            self.outbound.published.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Publish a lifecycle event.
    pub async fn publish_event(&self, record: Event) -> Result<(), BusError> {
        if !self.is_started().await {
            return Err(BusError::NotStarted);
        }
        let result = self.event.publish(record).await;
        if result.is_ok() {
            self.event.published.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Publish a send-result. Must-deliver: bounded-wait then forced
    /// blocking enqueue. Also wakes any waiter registered in the
    /// correlation tracker, so the synchronous and broadcast paths
    /// converge on one source of truth (spec §4.2).
    pub async fn publish_send_result(&self, record: SendResult) -> Result<(), BusError> {
        if !self.is_started().await {
            return Err(BusError::NotStarted);
        }
        self.tracker.complete(&record.correlation_id, record.clone()).await;
        let result = self.send_result.publish_must_deliver(record).await;
        if result.is_ok() {
            self.send_result.published.fetch_add(1, Ordering::Relaxed);
        }
        result
    }

    /// Subscribe to the inbound topic.
    pub async fn subscribe_inbound(&self) -> Subscription<InboundMessage> {
        self.inbound.subscribe().await
    }

    /// Subscribe to the outbound topic.
    pub async fn subscribe_outbound(&self) -> Subscription<OutboundMessage> {
        self.outbound.subscribe().await
    }

    /// Subscribe to the event topic.
    pub async fn subscribe_event(&self) -> Subscription<Event> {
        self.event.subscribe().await
    }

    /// Subscribe to the send-result topic.
    pub async fn subscribe_send_result(&self) -> Subscription<SendResult> {
        self.send_result.subscribe().await
    }

    /// Snapshot current metrics across all four topics.
    pub async fn metrics(&self) -> BusMetrics {
        BusMetrics {
            inbound: self.inbound.metrics().await,
            outbound: self.outbound.metrics().await,
            event: self.event.metrics().await,
            send_result: self.send_result.metrics().await,
        }
    }

    /// Zero every topic's drop counter; subscriber counts are untouched.
    pub fn reset_metrics(&self) {
        self.inbound.reset();
        self.outbound.reset();
        self.event.reset();
        self.send_result.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelKind;

    fn bus(tracker: Arc<ResultTracker>) -> MessageBus {
        MessageBus::new(
            BusConfig {
                topic_capacity: 10,
                subscriber_capacity: 5,
            },
            tracker,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_fan_out_to_three_listeners() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = bus(tracker);
        bus.start().await.unwrap();

        let mut subs = vec![
            bus.subscribe_inbound().await,
            bus.subscribe_inbound().await,
            bus.subscribe_inbound().await,
        ];

        let msg = InboundMessage::new(ChannelKind::Telegram, "123", "42", "hi");
        bus.publish_inbound(msg.clone()).await.unwrap();

        for sub in subs.iter_mut() {
            let received = sub.recv().await.unwrap();
            assert_eq!(received.content, "hi");
            assert_eq!(received.session_id, "telegram:42");
        }
        assert_eq!(bus.metrics().await.inbound.dropped, 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_isolation() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = MessageBus::new(
            BusConfig {
                topic_capacity: 100,
                subscriber_capacity: 1,
            },
            tracker,
        )
        .unwrap();
        bus.start().await.unwrap();

        let mut a = bus.subscribe_inbound().await;
        let _b = bus.subscribe_inbound().await; // never drains

        for i in 0..10 {
            let msg = InboundMessage::new(ChannelKind::Telegram, "1", "1", format!("m{i}"));
            bus.publish_inbound(msg).await.unwrap();
            // Drain A immediately so it keeps up; B's single slot fills fast.
            let _ = a.recv().await;
        }

        let metrics = bus.metrics().await;
        assert!(metrics.inbound.dropped >= 9, "expected at least 9 drops, got {}", metrics.inbound.dropped);
    }

    #[tokio::test]
    async fn test_start_twice_errors() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = bus(tracker);
        bus.start().await.unwrap();
        assert!(matches!(bus.start().await, Err(BusError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn test_stop_closes_subscriptions() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = bus(tracker);
        bus.start().await.unwrap();
        let mut sub = bus.subscribe_inbound().await;
        bus.stop().await.unwrap();
        assert!(sub.recv().await.is_none());
        assert!(matches!(
            bus.publish_inbound(InboundMessage::new(ChannelKind::Telegram, "1", "1", "x")).await,
            Err(BusError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_stop_without_start_errors() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = bus(tracker);
        assert!(matches!(bus.stop().await, Err(BusError::NotStarted)));
    }

    #[tokio::test]
    async fn test_subscribe_before_start_returns_closed_handle() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = bus(tracker);
        let mut sub = bus.subscribe_inbound().await;
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_after_stop_returns_closed_handle() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = bus(tracker);
        bus.start().await.unwrap();
        bus.stop().await.unwrap();

        let mut sub = bus.subscribe_inbound().await;
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_zero_capacity_rejected() {
        let tracker = Arc::new(ResultTracker::new());
        let result = MessageBus::new(
            BusConfig {
                topic_capacity: 0,
                subscriber_capacity: 5,
            },
            tracker,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_reset_metrics_keeps_subscriber_count() {
        let tracker = Arc::new(ResultTracker::new());
        let bus = MessageBus::new(
            BusConfig {
                topic_capacity: 4,
                subscriber_capacity: 1,
            },
            tracker,
        )
        .unwrap();
        bus.start().await.unwrap();
        let _sub = bus.subscribe_inbound().await;

        for i in 0..5 {
            let _ = bus
                .publish_inbound(InboundMessage::new(ChannelKind::Telegram, "1", "1", format!("{i}")))
                .await;
        }
        assert!(bus.metrics().await.inbound.dropped > 0);
        bus.reset_metrics();
        let metrics = bus.metrics().await;
        assert_eq!(metrics.inbound.dropped, 0);
        assert_eq!(metrics.inbound.subscribers, 1);
    }
}
