//! Correlation tracker (spec §4.2): maps a correlation id to a one-shot
//! waiter, so a caller that published an outbound message with a
//! correlation id can synchronously await its eventual [`SendResult`].
//!
//! Grounded on the reference bot framework's `ConfirmationManager`
//! (`HashMap<String, oneshot::Sender<T>>` + register/respond), the same
//! shape this system needs for correlation ids instead of confirmation ids.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{oneshot, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::TrackerError;
use crate::types::SendResult;

struct PendingEntry {
    tx: oneshot::Sender<SendResult>,
    registered_at: DateTime<Utc>,
}

/// Default interval for the housekeeping sweep (spec §4.2).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

/// Maps correlation ids to single-slot waiters.
#[derive(Debug)]
pub struct ResultTracker {
    pending: RwLock<HashMap<String, PendingEntry>>,
}

impl Default for ResultTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            pending: RwLock::new(HashMap::new()),
        }
    }

    /// Register a fresh waiter for `id`, overwriting any previous
    /// registration for the same id (the previous waiter, if any, is
    /// simply dropped — its `Wait` call will observe a closed channel).
    pub async fn register(&self, id: impl Into<String>) -> Result<oneshot::Receiver<SendResult>, TrackerError> {
        let id = id.into();
        if id.is_empty() {
            return Err(TrackerError::InvalidCorrelationId);
        }
        let (tx, rx) = oneshot::channel();
        self.pending.write().await.insert(
            id,
            PendingEntry {
                tx,
                registered_at: Utc::now(),
            },
        );
        Ok(rx)
    }

    /// Wait for `id` to complete, time out, or be cancelled via `cancel`.
    /// The entry is evicted on every exit path (spec invariant).
    pub async fn wait(
        &self,
        id: &str,
        rx: oneshot::Receiver<SendResult>,
        timeout: Duration,
        cancel: Option<&CancellationToken>,
    ) -> Result<SendResult, TrackerError> {
        let result = match cancel {
            Some(token) => {
                tokio::select! {
                    result = rx => result.map_err(|_| TrackerError::Cancelled(id.to_string())),
                    () = tokio::time::sleep(timeout) => Err(TrackerError::Timeout(timeout)),
                    () = token.cancelled() => Err(TrackerError::Cancelled(id.to_string())),
                }
            }
            None => match tokio::time::timeout(timeout, rx).await {
                Ok(Ok(result)) => Ok(result),
                Ok(Err(_)) => Err(TrackerError::Cancelled(id.to_string())),
                Err(_) => Err(TrackerError::Timeout(timeout)),
            },
        };
        self.pending.write().await.remove(id);
        result
    }

    /// Non-blocking completion. Logs and drops if no waiter is registered
    /// or the waiter slot was already consumed.
    pub async fn complete(&self, id: &str, result: SendResult) {
        if id.is_empty() {
            return;
        }
        let entry = self.pending.write().await.remove(id);
        match entry {
            Some(entry) => {
                if entry.tx.send(result).is_err() {
                    debug!(correlation_id = id, "complete: waiter already gone");
                }
            }
            None => {
                debug!(correlation_id = id, "complete: no waiter registered");
            }
        }
    }

    /// Current number of pending registrations.
    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Log a gauge of pending entries; evicts nothing by itself since
    /// eviction only happens on `wait`'s exit paths, but surfaces how long
    /// the oldest unclaimed registration has been open.
    pub async fn sweep(&self) {
        let pending = self.pending.read().await;
        if pending.is_empty() {
            return;
        }
        let oldest = pending.values().map(|e| e.registered_at).min();
        warn!(
            pending = pending.len(),
            oldest_registered_at = ?oldest,
            "correlation tracker housekeeping sweep"
        );
    }

    /// Spawn a periodic housekeeping task that sweeps every `interval`
    /// until `cancel` fires.
    pub fn spawn_sweeper(self: std::sync::Arc<Self>, interval: Duration, cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(interval) => self.sweep().await,
                    () = cancel.cancelled() => break,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChannelKind;

    #[tokio::test]
    async fn test_correlation_round_trip() {
        let tracker = std::sync::Arc::new(ResultTracker::new());
        let rx = tracker.register("c-1").await.unwrap();

        let tracker2 = tracker.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            tracker2
                .complete("c-1", SendResult::success("c-1", ChannelKind::Telegram))
                .await;
        });

        let result = tracker
            .wait("c-1", rx, Duration::from_millis(200), None)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_wait_times_out_and_evicts() {
        let tracker = ResultTracker::new();
        let rx = tracker.register("c-2").await.unwrap();
        let result = tracker.wait("c-2", rx, Duration::from_millis(10), None).await;
        assert!(matches!(result, Err(TrackerError::Timeout(_))));
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_complete_without_waiter_is_noop() {
        let tracker = ResultTracker::new();
        // Should not panic even though nothing registered "c-3".
        tracker
            .complete("c-3", SendResult::success("c-3", ChannelKind::Telegram))
            .await;
        assert_eq!(tracker.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_register_empty_id_rejected() {
        let tracker = ResultTracker::new();
        assert!(matches!(tracker.register("").await, Err(TrackerError::InvalidCorrelationId)));
    }

    #[tokio::test]
    async fn test_wait_cancelled_by_token() {
        let tracker = ResultTracker::new();
        let rx = tracker.register("c-4").await.unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = tracker.wait("c-4", rx, Duration::from_secs(5), Some(&cancel)).await;
        assert!(matches!(result, Err(TrackerError::Cancelled(_))));
    }
}
