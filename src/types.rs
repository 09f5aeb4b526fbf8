//! Domain records that flow across the message bus.
//!
//! Every record here is a plain value type: the bus copies on publish, so
//! no subscriber can observe another subscriber's mutation (spec §3).
//! Serialisation is snake_case JSON with RFC 3339 UTC timestamps (spec §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The channel a message originated from or is destined for.
///
/// Compared only by value; extensible to new variants as channels are
/// added (Discord/Slack/Web/API are designed-in but not implemented here).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Telegram, the reference channel implementation.
    Telegram,
    /// Discord (designed-in, not implemented).
    Discord,
    /// Slack (designed-in, not implemented).
    Slack,
    /// A generic web chat widget (designed-in, not implemented).
    Web,
    /// A programmatic API caller (designed-in, not implemented).
    Api,
    /// The scheduler, acting as a synthetic channel for legacy job firing.
    Cron,
}

impl ChannelKind {
    /// The canonical wire tag used in session ids and JSON (`"telegram"`, ...).
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Telegram => "telegram",
            Self::Discord => "discord",
            Self::Slack => "slack",
            Self::Web => "web",
            Self::Api => "api",
            Self::Cron => "cron",
        }
    }

    /// Parse a channel tag back into a [`ChannelKind`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "telegram" => Some(Self::Telegram),
            "discord" => Some(Self::Discord),
            "slack" => Some(Self::Slack),
            "web" => Some(Self::Web),
            "api" => Some(Self::Api),
            "cron" => Some(Self::Cron),
            _ => None,
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// The kind of an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text send.
    Text,
    /// Edit an existing message.
    Edit,
    /// Delete an existing message.
    Delete,
    /// Send a photo.
    Photo,
    /// Send a document/file.
    Document,
}

/// Rendering hint for outbound text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatHint {
    /// No formatting markers; send as-is.
    #[default]
    Plain,
    /// Markdown-flavoured text; channel adapter renders or strips it.
    Markdown,
    /// Already-rendered HTML.
    Html,
    /// Let the format detector classify the content.
    Auto,
}

/// A descriptor for media attached to an outbound message.
///
/// At least one of `url`, `file_id`, or `local_path` must resolve to
/// something sendable (spec §3 invariants); adapters try them in that
/// priority order (local path, then file id, then URL — spec §4.4).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Media kind (photo/document — duplicated from `MessageKind` for
    /// adapters that accept raw media without a full outbound message).
    #[serde(default)]
    pub kind: Option<MessageKind>,
    /// Remote URL, if the media should be fetched by the channel API.
    #[serde(default)]
    pub url: Option<String>,
    /// An opaque remote file id the channel API already knows about.
    #[serde(default)]
    pub file_id: Option<String>,
    /// A local filesystem path to upload.
    #[serde(default)]
    pub local_path: Option<String>,
    /// Caption/description for the media.
    #[serde(default)]
    pub caption: Option<String>,
    /// Filename to present to the recipient.
    #[serde(default)]
    pub filename: Option<String>,
}

impl MediaDescriptor {
    /// Whether this descriptor resolves to at least one sendable source.
    #[must_use]
    pub fn is_resolvable(&self) -> bool {
        self.local_path.as_deref().is_some_and(|p| !p.is_empty())
            || self.file_id.as_deref().is_some_and(|p| !p.is_empty())
            || self.url.as_deref().is_some_and(|p| !p.is_empty())
    }
}

/// A single button in an outbound inline keyboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InlineButton {
    /// Visible label.
    pub text: String,
    /// Opaque callback payload delivered back on press.
    pub callback_data: String,
}

/// Rows of inline-keyboard buttons attached to an outbound message.
pub type InlineKeyboard = Vec<Vec<InlineButton>>;

/// Free-form metadata carried alongside a message.
pub type Metadata = HashMap<String, serde_json::Value>;

/// An inbound message: channel → bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Originating channel.
    pub channel: ChannelKind,
    /// Sender's identifier within the channel.
    pub user_id: String,
    /// Canonical session id, `"<channel>:<native-id>"`.
    pub session_id: String,
    /// Message text content; may be empty for non-text updates.
    #[serde(default)]
    pub content: String,
    /// When the message was received.
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata (command, chat type, username, ...).
    #[serde(default)]
    pub metadata: Metadata,
}

impl InboundMessage {
    /// Build an inbound message with the canonical session id already set.
    #[must_use]
    pub fn new(
        channel: ChannelKind,
        user_id: impl Into<String>,
        native_session_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let native = native_session_id.into();
        Self {
            channel,
            user_id: user_id.into(),
            session_id: format!("{}:{native}", channel.tag()),
            content: content.into(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }

    /// Attach a metadata entry, builder-style.
    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// An outbound message: bus → channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Target channel; a dispatcher for a different channel drops this
    /// silently (spec §3 invariant).
    pub channel: ChannelKind,
    /// Sender/user id context carried through from the triggering inbound
    /// message, if any.
    #[serde(default)]
    pub user_id: String,
    /// Target session id.
    pub session_id: String,
    /// Text content.
    #[serde(default)]
    pub content: String,
    /// Send timestamp.
    pub timestamp: DateTime<Utc>,
    /// Kind of send being requested.
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Target message id, required for `Edit`/`Delete`.
    #[serde(default)]
    pub message_id: Option<String>,
    /// Media descriptor, required for `Photo`/`Document`.
    #[serde(default)]
    pub media: Option<MediaDescriptor>,
    /// Correlation id; non-empty iff the sender wants a [`SendResult`].
    #[serde(default)]
    pub correlation_id: Option<String>,
    /// Inline keyboard to attach, if any.
    #[serde(default)]
    pub keyboard: Option<InlineKeyboard>,
    /// Rendering hint.
    #[serde(default)]
    pub format: FormatHint,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl OutboundMessage {
    /// Build a plain text outbound message.
    #[must_use]
    pub fn text(channel: ChannelKind, session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel,
            user_id: String::new(),
            session_id: session_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
            kind: MessageKind::Text,
            message_id: None,
            media: None,
            correlation_id: None,
            keyboard: None,
            format: FormatHint::default(),
            metadata: Metadata::new(),
        }
    }

    /// Set a correlation id, marking the sender as wanting a [`SendResult`].
    #[must_use]
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Set the format hint.
    #[must_use]
    pub const fn with_format(mut self, format: FormatHint) -> Self {
        self.format = format;
        self
    }

    /// Validate the structural invariants from spec §3.
    ///
    /// Does not validate channel-specific details (e.g. whether a session
    /// id's native part parses as that channel's id type) — that is the
    /// dispatching adapter's job.
    pub fn validate(&self) -> Result<(), String> {
        match self.kind {
            MessageKind::Edit | MessageKind::Delete => {
                if self.message_id.as_deref().unwrap_or_default().is_empty() {
                    return Err(format!("{:?} requires a non-empty message_id", self.kind));
                }
            }
            MessageKind::Photo | MessageKind::Document => {
                if !self.media.as_ref().is_some_and(MediaDescriptor::is_resolvable) {
                    return Err(format!(
                        "{:?} requires a media descriptor resolving to url/file_id/local_path",
                        self.kind
                    ));
                }
            }
            MessageKind::Text => {}
        }
        Ok(())
    }
}

/// A lifecycle event kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Downstream processing of an inbound message has started.
    ProcessingStart,
    /// Downstream processing has finished (success or failure).
    ProcessingEnd,
}

/// A lifecycle notification, used to drive per-channel activity indicators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Channel the triggering session belongs to.
    pub channel: ChannelKind,
    /// User id of the session.
    pub user_id: String,
    /// Session id.
    pub session_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl Event {
    /// Build a lifecycle event for the given session.
    #[must_use]
    pub fn new(kind: EventKind, channel: ChannelKind, user_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            kind,
            channel,
            user_id: user_id.into(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            metadata: Metadata::new(),
        }
    }
}

/// Structured detail describing why a send failed.
///
/// Channel-specific error shapes convert into this via
/// [`crate::error::ChannelError::describe`]/`retryable`/`retry_after` — the
/// wire format only needs to carry the rendered result (spec §3, §7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendErrorDetail {
    /// Human description of the failure.
    pub description: String,
    /// Whether resubmission might succeed.
    pub retryable: bool,
    /// Suggested wait before resubmission, in milliseconds.
    #[serde(default)]
    pub retry_after_ms: Option<u64>,
}

impl From<&crate::error::ChannelError> for SendErrorDetail {
    fn from(err: &crate::error::ChannelError) -> Self {
        Self {
            description: err.describe(),
            retryable: err.retryable(),
            retry_after_ms: err.retry_after().map(|d| d.as_millis() as u64),
        }
    }
}

/// The terminal outcome of a dispatched outbound message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    /// Correlation id this result answers.
    pub correlation_id: String,
    /// Channel that produced this result.
    pub channel: ChannelKind,
    /// Whether the send ultimately succeeded (including fallback-success).
    pub success: bool,
    /// Failure detail, present iff `success` is false.
    #[serde(default)]
    pub error: Option<SendErrorDetail>,
    /// Reserved for a future "rendering was degraded" signal (spec §9 open
    /// question 2) — never set today; a fallback-rendered send still
    /// reports `success: true` with this left `None`.
    #[serde(default)]
    pub degraded: Option<bool>,
    /// When the result was produced.
    pub timestamp: DateTime<Utc>,
}

impl SendResult {
    /// Build a success result.
    #[must_use]
    pub fn success(correlation_id: impl Into<String>, channel: ChannelKind) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            channel,
            success: true,
            error: None,
            degraded: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a failure result from a channel error.
    #[must_use]
    pub fn failure(correlation_id: impl Into<String>, channel: ChannelKind, err: &crate::error::ChannelError) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            channel,
            success: false,
            error: Some(err.into()),
            degraded: None,
            timestamp: Utc::now(),
        }
    }
}

/// Canonicalise a session id, accepting the legacy bare-native-id form.
///
/// Returns `(channel, native_id)` on success. `accept_legacy` governs
/// whether a bare id (no `:` separator) is accepted for `default_channel`
/// — spec §9 open question 1; callers decide this via configuration
/// rather than inferring it.
#[must_use]
pub fn parse_session_id(
    session_id: &str,
    default_channel: ChannelKind,
    accept_legacy: bool,
) -> Option<(ChannelKind, String)> {
    if let Some((tag, native)) = session_id.split_once(':') {
        let channel = ChannelKind::from_tag(tag)?;
        return Some((channel, native.to_string()));
    }
    if accept_legacy && !session_id.is_empty() {
        return Some((default_channel, session_id.to_string()));
    }
    None
}

/// Render the canonical session id for a channel + native id pair.
#[must_use]
pub fn session_id(channel: ChannelKind, native_id: &str) -> String {
    format!("{}:{native_id}", channel.tag())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_roundtrip() {
        let id = session_id(ChannelKind::Telegram, "12345");
        assert_eq!(id, "telegram:12345");
        let (channel, native) = parse_session_id(&id, ChannelKind::Telegram, false).unwrap();
        assert_eq!(channel, ChannelKind::Telegram);
        assert_eq!(native, "12345");
    }

    #[test]
    fn test_legacy_session_id() {
        assert!(parse_session_id("12345", ChannelKind::Telegram, false).is_none());
        let (channel, native) = parse_session_id("12345", ChannelKind::Telegram, true).unwrap();
        assert_eq!(channel, ChannelKind::Telegram);
        assert_eq!(native, "12345");
    }

    #[test]
    fn test_session_id_mismatched_channel() {
        // A canonical id always wins over the legacy/default fallback.
        let (channel, native) = parse_session_id("discord:9", ChannelKind::Telegram, true).unwrap();
        assert_eq!(channel, ChannelKind::Discord);
        assert_eq!(native, "9");
    }

    #[test]
    fn test_outbound_validation() {
        let mut msg = OutboundMessage::text(ChannelKind::Telegram, "telegram:1", "hi");
        msg.kind = MessageKind::Edit;
        assert!(msg.validate().is_err());
        msg.message_id = Some("42".into());
        assert!(msg.validate().is_ok());

        let mut msg = OutboundMessage::text(ChannelKind::Telegram, "telegram:1", "");
        msg.kind = MessageKind::Photo;
        assert!(msg.validate().is_err());
        msg.media = Some(MediaDescriptor {
            local_path: Some("/tmp/a.jpg".into()),
            ..Default::default()
        });
        assert!(msg.validate().is_ok());
    }

    #[test]
    fn test_channel_kind_serde_tag() {
        let json = serde_json::to_string(&ChannelKind::Telegram).unwrap();
        assert_eq!(json, "\"telegram\"");
        let json = serde_json::to_string(&EventKind::ProcessingStart).unwrap();
        assert_eq!(json, "\"processing_start\"");
    }

    #[test]
    fn test_send_result_roundtrip() {
        let result = SendResult::success("c-1", ChannelKind::Telegram);
        let json = serde_json::to_string(&result).unwrap();
        let parsed: SendResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.correlation_id, "c-1");
        assert!(parsed.success);
        assert!(parsed.degraded.is_none());
    }
}
