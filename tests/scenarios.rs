//! Crate-level integration tests exercising the literal scenarios from
//! spec.md §8 that don't fit naturally as a single module's unit test.

use std::sync::Arc;
use std::time::Duration;

use relaybus::bus::{BusConfig, MessageBus};
use relaybus::error::BusError;
use relaybus::tracker::ResultTracker;
use relaybus::types::{ChannelKind, Event, EventKind, InboundMessage, OutboundMessage, SendResult};

fn new_bus(topic_capacity: usize, subscriber_capacity: usize) -> Arc<MessageBus> {
    let tracker = Arc::new(ResultTracker::new());
    Arc::new(
        MessageBus::new(
            BusConfig {
                topic_capacity,
                subscriber_capacity,
            },
            tracker,
        )
        .unwrap(),
    )
}

/// Scenario 5: publisher emits 1000 outbound records, `Stop()` fires midway.
/// Nothing published before `Stop` is lost from a subscriber that drains in
/// time; everything published after `Stop` returns `ErrNotStarted`.
#[tokio::test]
async fn stop_during_publish_storm() {
    let bus = new_bus(2000, 2000);
    bus.start().await.unwrap();
    let mut sub = bus.subscribe_outbound().await;

    let drainer = tokio::spawn(async move {
        let mut received = 0usize;
        while sub.recv().await.is_some() {
            received += 1;
        }
        received
    });

    for i in 0..500 {
        bus.publish_outbound(OutboundMessage::text(ChannelKind::Telegram, "telegram:1", format!("msg-{i}")))
            .await
            .unwrap();
    }

    bus.stop().await.unwrap();

    for i in 500..1000 {
        let result = bus
            .publish_outbound(OutboundMessage::text(ChannelKind::Telegram, "telegram:1", format!("msg-{i}")))
            .await;
        assert!(matches!(result, Err(BusError::NotStarted)));
    }

    let received = drainer.await.unwrap();
    assert_eq!(received, 500, "every record published before Stop must reach a draining subscriber");
}

/// Invariant 3: after `Stop`, subsequent publishes to every topic return
/// `ErrNotStarted` and no further record is delivered.
#[tokio::test]
async fn stop_closes_every_topic() {
    let bus = new_bus(16, 16);
    bus.start().await.unwrap();
    bus.stop().await.unwrap();

    let inbound = bus.publish_inbound(InboundMessage::new(ChannelKind::Telegram, "1", "1", "hi")).await;
    let event = bus
        .publish_event(Event::new(EventKind::ProcessingStart, ChannelKind::Telegram, "1", "telegram:1"))
        .await;
    let result = bus.publish_send_result(SendResult::success("c-1", ChannelKind::Telegram)).await;

    assert!(matches!(inbound, Err(BusError::NotStarted)));
    assert!(matches!(event, Err(BusError::NotStarted)));
    assert!(matches!(result, Err(BusError::NotStarted)));
}

/// Round-trip law: JSON-serialise then JSON-parse of inbound/outbound/event/
/// result records yields the original record modulo timestamp precision.
#[tokio::test]
async fn round_trip_law_holds_across_record_types() {
    let inbound = InboundMessage::new(ChannelKind::Telegram, "123", "42", "hi").with_meta("chat_id", "42");
    let encoded = serde_json::to_string(&inbound).unwrap();
    let decoded: InboundMessage = serde_json::from_str(&encoded).unwrap();
    assert_eq!(inbound.channel, decoded.channel);
    assert_eq!(inbound.user_id, decoded.user_id);
    assert_eq!(inbound.session_id, decoded.session_id);
    assert_eq!(inbound.content, decoded.content);
    assert_eq!(inbound.metadata, decoded.metadata);

    let outbound = OutboundMessage::text(ChannelKind::Telegram, "telegram:1", "hi").with_correlation_id("c-1");
    let encoded = serde_json::to_string(&outbound).unwrap();
    let decoded: OutboundMessage = serde_json::from_str(&encoded).unwrap();
    assert_eq!(outbound.session_id, decoded.session_id);
    assert_eq!(outbound.correlation_id, decoded.correlation_id);

    let result = SendResult::success("c-1", ChannelKind::Telegram);
    let encoded = serde_json::to_string(&result).unwrap();
    let decoded: SendResult = serde_json::from_str(&encoded).unwrap();
    assert_eq!(result.correlation_id, decoded.correlation_id);
    assert_eq!(result.success, decoded.success);
}

/// Boundary behaviour: publishing with an empty subscriber set still
/// succeeds; the record is discarded silently.
#[tokio::test]
async fn publish_with_no_subscribers_succeeds() {
    let bus = new_bus(16, 16);
    bus.start().await.unwrap();

    let result = bus.publish_inbound(InboundMessage::new(ChannelKind::Telegram, "1", "1", "hi")).await;
    assert!(result.is_ok());

    tokio::time::sleep(Duration::from_millis(20)).await;
    let metrics = bus.metrics().await;
    assert_eq!(metrics.inbound.published, 1);
    assert_eq!(metrics.inbound.dropped, 0);

    bus.stop().await.unwrap();
}

/// Boundary behaviour: zero-capacity configuration is a start-time error,
/// not a panic.
#[tokio::test]
async fn zero_capacity_is_a_configuration_error() {
    let tracker = Arc::new(ResultTracker::new());
    let err = MessageBus::new(
        BusConfig {
            topic_capacity: 0,
            subscriber_capacity: 8,
        },
        tracker,
    )
    .unwrap_err();
    assert!(matches!(err, BusError::QueueFull));
}
