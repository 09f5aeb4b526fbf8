//! Unified error types for the message bus and its collaborators.
//!
//! Mirrors the error taxonomy of the subsystems it composes: preconditions
//! are returned directly to the caller, channel errors distinguish
//! transient/permanent/markdown subsets, and everything else folds into
//! [`Error`] so application code can propagate with `?`.

use std::fmt;

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Message bus precondition or queue error.
    #[error("bus: {0}")]
    Bus(#[from] BusError),

    /// Correlation tracker error.
    #[error("tracker: {0}")]
    Tracker(#[from] TrackerError),

    /// Channel adapter error.
    #[error("channel: {0}")]
    Channel(#[from] ChannelError),

    /// Scheduler error.
    #[error("scheduler: {0}")]
    Scheduler(#[from] SchedulerError),

    /// Configuration error.
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    /// IO error.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    /// Background task failed to join.
    #[error("task: {0}")]
    Task(String),

    /// Generic internal error.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Build an internal error from a message.
    #[inline]
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

// ============================================================================
// Message bus errors (§7 Preconditions)
// ============================================================================

/// Errors raised by [`crate::bus::MessageBus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// `Start` called on an already-started bus.
    #[error("bus already started")]
    AlreadyStarted,

    /// `Publish`/`Subscribe` called before `Start`, or after `Stop`.
    #[error("bus not started")]
    NotStarted,

    /// A bounded topic queue rejected a non-blocking enqueue.
    #[error("topic queue full")]
    QueueFull,
}

/// Result alias for bus operations.
pub type BusResult<T> = std::result::Result<T, BusError>;

// ============================================================================
// Correlation tracker errors
// ============================================================================

/// Errors raised by [`crate::tracker::ResultTracker`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum TrackerError {
    /// `Wait` exceeded its deadline without a matching `Complete`.
    #[error("wait timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The caller's context/cancellation token fired first.
    #[error("wait cancelled: {0}")]
    Cancelled(String),

    /// Correlation id was empty (fire-and-forget; never register these).
    #[error("invalid correlation id")]
    InvalidCorrelationId,
}

/// Result alias for tracker operations.
pub type TrackerResult<T> = std::result::Result<T, TrackerError>;

// ============================================================================
// Channel adapter errors (§7 Channel transient / permanent / markdown)
// ============================================================================

/// Errors raised by channel adapters (Telegram reference implementation).
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChannelError {
    /// Channel failed to start.
    #[error("start failed: {0}")]
    StartFailed(String),

    /// Channel failed to stop cleanly.
    #[error("stop failed: {0}")]
    StopFailed(String),

    /// The channel is not currently connected.
    #[error("not connected")]
    NotConnected,

    /// The session id could not be parsed for this channel.
    #[error("invalid session id: {0}")]
    InvalidSessionId(String),

    /// A retryable upstream failure (HTTP 429/5xx). Carries retry-after.
    #[error("transient failure: {description} (retry after {retry_after:?})")]
    Transient {
        /// Human description of the failure.
        description: String,
        /// Suggested wait before resubmission, if the API provided one.
        retry_after: Option<std::time::Duration>,
    },

    /// A non-retryable upstream failure (HTTP 400/403, content too long...).
    #[error("permanent failure: {description}")]
    Permanent {
        /// Human description of the failure.
        description: String,
        /// The original content, kept for diagnostic quoting.
        original_content: String,
    },

    /// A markdown-entity parse failure, matched by the fallback ladder.
    /// Distinguished from [`ChannelError::Permanent`] so callers can retry
    /// through `MarkdownToHTML`/`StripFormatting` before giving up.
    #[error("markdown parse failure: {description}")]
    MarkdownParse {
        /// Upstream error description (used for substring matching).
        description: String,
    },

    /// The per-send deadline elapsed.
    #[error("send timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Internal/unexpected failure.
    #[error("{0}")]
    Internal(String),
}

impl ChannelError {
    /// Human description, LLM-facing rendering, and whether it is retryable.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::StartFailed(m) | Self::StopFailed(m) | Self::Internal(m) => m.clone(),
            Self::NotConnected => "channel not connected".to_string(),
            Self::InvalidSessionId(s) => format!("invalid session id: {s}"),
            Self::Transient { description, .. }
            | Self::Permanent { description, .. }
            | Self::MarkdownParse { description } => description.clone(),
            Self::Timeout(d) => format!("timed out after {d:?}"),
        }
    }

    /// Whether the caller may usefully resubmit this send.
    #[must_use]
    pub const fn retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::Timeout(_))
    }

    /// Suggested retry-after duration, if known.
    #[must_use]
    pub const fn retry_after(&self) -> Option<std::time::Duration> {
        match self {
            Self::Transient { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Result alias for channel operations.
pub type ChannelResult<T> = std::result::Result<T, ChannelError>;

// ============================================================================
// Scheduler errors
// ============================================================================

/// Errors raised by the job scheduler.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SchedulerError {
    /// Referenced job id does not exist.
    #[error("job not found: {0}")]
    JobNotFound(String),

    /// The cron expression failed to parse/validate.
    #[error("invalid cron expression {expression:?}: {reason}")]
    InvalidSchedule {
        /// The offending expression.
        expression: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A job fired but was missing a required field.
    #[error("job {job_id} firing failed: {reason}")]
    FiringFailed {
        /// The job id.
        job_id: String,
        /// Why firing failed.
        reason: String,
    },

    /// Underlying storage failure.
    #[error("storage: {0}")]
    Storage(#[from] std::io::Error),

    /// Underlying (de)serialization failure.
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Result alias for scheduler operations.
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;

// ============================================================================
// Configuration errors
// ============================================================================

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading the config file.
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parse error.
    #[error("parse: {0}")]
    Parse(#[from] serde_json::Error),

    /// Required field missing.
    #[error("missing: {0}")]
    Missing(String),

    /// Field present but invalid.
    #[error("invalid: {0}")]
    Invalid(String),
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// ============================================================================
// Display helper
// ============================================================================

/// Wrapper that renders an [`Error`] the way it should be shown to an
/// operator (never raw error text reaches end users — see spec §7).
#[derive(Debug)]
pub struct DisplayError<'a>(pub &'a Error);

impl fmt::Display for DisplayError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Error::Bus(e) => write!(f, "message bus error: {e}"),
            Error::Tracker(e) => write!(f, "correlation tracker error: {e}"),
            Error::Channel(e) => write!(f, "channel error: {e}"),
            Error::Scheduler(e) => write!(f, "scheduler error: {e}"),
            Error::Config(e) => write!(f, "configuration error: {e}"),
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Json(e) => write!(f, "JSON error: {e}"),
            Error::Task(e) => write!(f, "task error: {e}"),
            Error::Internal(e) => write!(f, "internal error: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversions() {
        let bus_err = BusError::NotStarted;
        let err: Error = bus_err.into();
        assert!(matches!(err, Error::Bus(_)));

        let channel_err = ChannelError::NotConnected;
        let err: Error = channel_err.into();
        assert!(matches!(err, Error::Channel(_)));
    }

    #[test]
    fn test_channel_error_retryable() {
        let transient = ChannelError::Transient {
            description: "rate limited".into(),
            retry_after: Some(std::time::Duration::from_secs(30)),
        };
        assert!(transient.retryable());
        assert_eq!(
            transient.retry_after(),
            Some(std::time::Duration::from_secs(30))
        );

        let permanent = ChannelError::Permanent {
            description: "content too long".into(),
            original_content: "...".into(),
        };
        assert!(!permanent.retryable());
    }
}
