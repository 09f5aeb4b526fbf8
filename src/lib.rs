//! relaybus - a multi-channel bot-routing message bus.
//!
//! This crate provides the messaging substrate for a bot that ingests
//! messages from heterogeneous external channels, fans them out to
//! internal consumers, accepts outbound replies, delivers them back through
//! the originating channel, correlates request-with-result for callers
//! that need synchronous semantics, and emits lifecycle events so channels
//! can surface activity indicators.
//!
//! # Architecture
//!
//! - **Types** ([`types`]) - Inbound/outbound/event/send-result records
//! - **Bus** ([`bus`]) - The four-topic bounded broadcast bus
//! - **Tracker** ([`tracker`]) - Correlation-id waiters for synchronous sends
//! - **Format** ([`format`]) - Markdown detection, HTML rendering, stripping
//! - **Channel** ([`channel`]) - The `Channel` trait and shared scaffolding
//! - **Channels** ([`channels`]) - Concrete adapters (Telegram is the
//!   reference implementation)
//! - **Typing** ([`typing`]) - Per-session activity indicator coordinator
//! - **Cron** ([`cron`]) - Recurring and one-shot job scheduling
//! - **Gateway** ([`gateway`]) - Unified orchestration of the above
//!
//! # Quick start
//!
//! ```rust,ignore
//! use relaybus::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load_default().await;
//!     let gateway = Gateway::new(config)?;
//!     gateway.run(tokio::signal::ctrl_c().map(|_| ())).await
//! }
//! ```
//!
//! # Features
//!
//! - `telegram` (default) - Enable the Telegram channel adapter via `teloxide`

pub mod bus;
pub mod channel;
pub mod channels;
pub mod config;
pub mod cron;
pub mod error;
pub mod format;
pub mod gateway;
pub mod tracker;
pub mod types;
pub mod typing;
pub mod util;

/// Convenient re-exports for consumers of this crate.
pub mod prelude {
    pub use crate::bus::{BusConfig, BusMetrics, MessageBus, Subscription, TopicMetrics};
    pub use crate::channel::{AllowlistConfig, BoxedChannel, Channel, ChannelBase, ChannelManager, ChannelState, ChannelStatus};
    #[cfg(feature = "telegram")]
    pub use crate::channels::telegram::TelegramChannel;
    pub use crate::config::{Config, SchedulerSettings, TelegramSettings, TypingSettings, config_path, data_dir};
    pub use crate::cron::{FileJobStorage, Job, JobId, JobSchedule, JobStorage, MemoryJobStorage, Scheduler, SchedulerHandle};
    pub use crate::error::{BusError, ChannelError, ConfigError, DisplayError, Error, Result, SchedulerError, TrackerError};
    pub use crate::format::{ContentType, detect_content_type, escape_html, markdown_to_html, strip_formatting};
    pub use crate::gateway::Gateway;
    pub use crate::tracker::ResultTracker;
    pub use crate::types::{
        ChannelKind, Event, EventKind, FormatHint, InboundMessage, InlineButton, InlineKeyboard, MediaDescriptor, Metadata, MessageKind,
        OutboundMessage, SendErrorDetail, SendResult, parse_session_id, session_id,
    };
    pub use crate::typing::{ActivitySink, TypingCoordinator};
    pub use crate::util::{format_rfc3339, new_correlation_id};
}
