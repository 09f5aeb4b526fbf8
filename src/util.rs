//! Small standalone helpers with no home of their own (spec §9 ambient
//! stack) — correlation id generation and timestamp formatting shared by
//! channel adapters and the scheduler.

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a fresh correlation id for an outbound message that wants a
/// [`crate::types::SendResult`] (spec §6: "opaque, unique per send").
#[must_use]
pub fn new_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Render a timestamp as RFC 3339 with a UTC offset (spec §6 wire format).
#[must_use]
pub fn format_rfc3339(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let a = new_correlation_id();
        let b = new_correlation_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn test_format_rfc3339_roundtrips() {
        let now = Utc::now();
        let rendered = format_rfc3339(now);
        let parsed = DateTime::parse_from_rfc3339(&rendered).unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
    }
}
