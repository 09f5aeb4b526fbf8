//! Concrete channel adapters. Telegram is the reference implementation
//! (spec C5/C6); Discord/Slack/Web/API are designed-in via
//! [`crate::types::ChannelKind`] but have no adapter here.

#[cfg(feature = "telegram")]
pub mod telegram;
