//! Channel trait and shared scaffolding for channel adapters.
//!
//! Adapted from the reference bot framework's `channel.rs`: the `Channel`
//! trait, `ChannelManager`, `ChannelBase`, and `AllowlistConfig` survive
//! almost unchanged — this system still needs exactly this lifecycle and
//! bookkeeping shape, just driven by the four-topic bus instead of a
//! single inbound channel.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::bus::MessageBus;
use crate::error::ChannelResult;
use crate::types::{ChannelKind, OutboundMessage};

/// Channel lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Not started.
    #[default]
    Stopped,
    /// Starting up.
    Starting,
    /// Running and connected.
    Running,
    /// Stopping.
    Stopping,
    /// Encountered an error.
    Error,
}

/// Channel status snapshot.
#[derive(Debug, Clone)]
pub struct ChannelStatus {
    /// Channel name.
    pub name: String,
    /// Channel kind.
    pub kind: ChannelKind,
    /// Current state.
    pub state: ChannelState,
    /// Inbound messages received.
    pub messages_received: u64,
    /// Outbound messages sent.
    pub messages_sent: u64,
    /// Most recent error, if any.
    pub last_error: Option<String>,
    /// Whether the channel is healthy (running, no recorded error).
    pub healthy: bool,
}

/// Trait implemented by every channel adapter.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Unique channel name (may differ from [`Channel::kind`] for multiple
    /// adapters of the same kind).
    fn name(&self) -> &str;

    /// The channel kind this adapter dispatches for.
    fn kind(&self) -> ChannelKind;

    /// Connect, subscribe to the bus's outbound/event topics, and spawn
    /// background ingestion/dispatch tasks.
    async fn start(&self, bus: Arc<MessageBus>) -> ChannelResult<()>;

    /// Disconnect and cancel background tasks.
    async fn stop(&self) -> ChannelResult<()>;

    /// Send a single outbound message through this channel directly,
    /// bypassing the bus (used by tests and by the scheduler's immediate
    /// one-shot firing path).
    async fn send(&self, msg: &OutboundMessage) -> ChannelResult<()>;

    /// Current status snapshot.
    async fn status(&self) -> ChannelStatus;

    /// Whether the channel is currently running.
    async fn is_running(&self) -> bool {
        self.status().await.state == ChannelState::Running
    }
}

/// A type-erased, reference-counted channel.
pub type BoxedChannel = Arc<dyn Channel>;

/// Owns the registered channel adapters and the shared bus.
pub struct ChannelManager {
    channels: RwLock<Vec<BoxedChannel>>,
    bus: Arc<MessageBus>,
}

impl std::fmt::Debug for ChannelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelManager").finish_non_exhaustive()
    }
}

impl ChannelManager {
    /// Create a manager wrapping the given bus.
    #[must_use]
    pub fn new(bus: Arc<MessageBus>) -> Self {
        Self {
            channels: RwLock::new(Vec::new()),
            bus,
        }
    }

    /// Register a channel adapter.
    pub async fn register(&self, channel: BoxedChannel) {
        info!(channel = %channel.name(), kind = %channel.kind(), "channel registered");
        self.channels.write().await.push(channel);
    }

    /// Start every registered channel, collecting one result per channel.
    pub async fn start_all(&self) -> Vec<ChannelResult<()>> {
        let channels = self.channels.read().await;
        let mut results = Vec::with_capacity(channels.len());
        for channel in channels.iter() {
            info!(channel = %channel.name(), "starting channel");
            let result = channel.start(Arc::clone(&self.bus)).await;
            if let Err(ref e) = result {
                error!(channel = %channel.name(), error = %e, "failed to start channel");
            }
            results.push(result);
        }
        results
    }

    /// Stop every registered channel.
    pub async fn stop_all(&self) -> Vec<ChannelResult<()>> {
        let channels = self.channels.read().await;
        let mut results = Vec::with_capacity(channels.len());
        for channel in channels.iter() {
            info!(channel = %channel.name(), "stopping channel");
            let result = channel.stop().await;
            if let Err(ref e) = result {
                error!(channel = %channel.name(), error = %e, "failed to stop channel");
            }
            results.push(result);
        }
        results
    }

    /// Status of every registered channel.
    pub async fn status_all(&self) -> Vec<ChannelStatus> {
        let channels = self.channels.read().await;
        let mut statuses = Vec::with_capacity(channels.len());
        for channel in channels.iter() {
            statuses.push(channel.status().await);
        }
        statuses
    }

    /// The shared bus.
    #[must_use]
    pub fn bus(&self) -> Arc<MessageBus> {
        Arc::clone(&self.bus)
    }

    /// Number of registered channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

#[derive(Debug, Default)]
struct ChannelStats {
    messages_received: u64,
    messages_sent: u64,
    last_error: Option<String>,
}

/// Shared bookkeeping helper that channel adapters embed.
pub struct ChannelBase {
    name: String,
    kind: ChannelKind,
    state: RwLock<ChannelState>,
    stats: RwLock<ChannelStats>,
}

impl std::fmt::Debug for ChannelBase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChannelBase").field("name", &self.name).finish_non_exhaustive()
    }
}

impl ChannelBase {
    /// Create a channel base for the given name/kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ChannelKind) -> Self {
        Self {
            name: name.into(),
            kind,
            state: RwLock::new(ChannelState::default()),
            stats: RwLock::new(ChannelStats::default()),
        }
    }

    /// The channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The channel kind.
    #[must_use]
    pub const fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> ChannelState {
        *self.state.read().await
    }

    /// Transition to a new lifecycle state.
    pub async fn set_state(&self, state: ChannelState) {
        *self.state.write().await = state;
        debug!(channel = %self.name, ?state, "channel state changed");
    }

    /// Record an inbound message received.
    pub async fn record_received(&self) {
        self.stats.write().await.messages_received += 1;
    }

    /// Record an outbound message sent.
    pub async fn record_sent(&self) {
        self.stats.write().await.messages_sent += 1;
    }

    /// Record an error, surfacing it in the next status snapshot.
    pub async fn record_error(&self, error: impl Into<String>) {
        let error = error.into();
        error!(channel = %self.name, %error, "channel error");
        self.stats.write().await.last_error = Some(error);
    }

    /// Build a status snapshot from current state and stats.
    pub async fn build_status(&self) -> ChannelStatus {
        let state = *self.state.read().await;
        let stats = self.stats.read().await;
        ChannelStatus {
            name: self.name.clone(),
            kind: self.kind,
            state,
            messages_received: stats.messages_received,
            messages_sent: stats.messages_sent,
            last_error: stats.last_error.clone(),
            healthy: state == ChannelState::Running && stats.last_error.is_none(),
        }
    }
}

/// Sender/chat allow-list. Empty lists mean "allow all" (spec §4.5 point 2).
#[derive(Debug, Clone, Default)]
pub struct AllowlistConfig {
    /// Allowed sender ids; empty means allow all.
    pub allowed_senders: Vec<String>,
    /// Allowed chat ids; empty means allow all.
    pub allowed_chats: Vec<String>,
}

impl AllowlistConfig {
    /// An empty (allow-all) config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an allowed sender, builder-style.
    #[must_use]
    pub fn allow_sender(mut self, sender: impl Into<String>) -> Self {
        self.allowed_senders.push(sender.into());
        self
    }

    /// Add an allowed chat, builder-style.
    #[must_use]
    pub fn allow_chat(mut self, chat: impl Into<String>) -> Self {
        self.allowed_chats.push(chat.into());
        self
    }

    /// Whether `sender` may use the bot.
    #[must_use]
    pub fn is_sender_allowed(&self, sender: &str) -> bool {
        self.allowed_senders.is_empty() || self.allowed_senders.iter().any(|s| s == sender)
    }

    /// Whether `chat` is permitted.
    #[must_use]
    pub fn is_chat_allowed(&self, chat: &str) -> bool {
        self.allowed_chats.is_empty() || self.allowed_chats.iter().any(|c| c == chat)
    }

    /// Whether both the sender and chat are permitted.
    #[must_use]
    pub fn is_allowed(&self, sender: &str, chat: &str) -> bool {
        self.is_sender_allowed(sender) && self.is_chat_allowed(chat)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allowlist_empty_allows_all() {
        let config = AllowlistConfig::new();
        assert!(config.is_allowed("anyone", "anywhere"));
    }

    #[test]
    fn test_allowlist_sender() {
        let config = AllowlistConfig::new().allow_sender("user1").allow_sender("user2");
        assert!(config.is_sender_allowed("user1"));
        assert!(!config.is_sender_allowed("user3"));
    }

    #[test]
    fn test_allowlist_chat() {
        let config = AllowlistConfig::new().allow_chat("chat1");
        assert!(config.is_chat_allowed("chat1"));
        assert!(!config.is_chat_allowed("chat2"));
    }

    #[tokio::test]
    async fn test_channel_base_lifecycle() {
        let base = ChannelBase::new("test", ChannelKind::Telegram);
        assert_eq!(base.state().await, ChannelState::Stopped);

        base.set_state(ChannelState::Running).await;
        base.record_received().await;
        base.record_sent().await;

        let status = base.build_status().await;
        assert_eq!(status.messages_received, 1);
        assert_eq!(status.messages_sent, 1);
        assert!(status.healthy);
    }

    #[tokio::test]
    async fn test_channel_base_unhealthy_after_error() {
        let base = ChannelBase::new("test", ChannelKind::Telegram);
        base.set_state(ChannelState::Running).await;
        base.record_error("boom").await;
        assert!(!base.build_status().await.healthy);
    }
}
