//! Bounded handoff queue between admission and notification delivery.
//!
//! [`NotificationQueue`] wraps a [`tokio::sync::mpsc`] sender. Enqueueing
//! never waits: when the queue is full or the dispatcher is gone the
//! admission is dropped, logged, and counted. Delivery is at-most-once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::domain::Admission;

/// Counters describing what happened to enqueued admissions.
///
/// `delivered` and `failed` count channel deliveries, so one admission
/// contributes once per configured channel.
#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    dropped: AtomicU64,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl DispatchStats {
    /// Counts one successful channel delivery.
    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one failed channel delivery.
    pub fn record_failed(&self) {
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> DispatchSnapshot {
        DispatchSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchSnapshot {
    /// Admissions accepted by the queue.
    pub enqueued: u64,
    /// Admissions dropped because the queue was full or closed.
    pub dropped: u64,
    /// Channel deliveries that succeeded.
    pub delivered: u64,
    /// Channel deliveries that failed.
    pub failed: u64,
}

/// Sending half of the notification queue.
#[derive(Debug, Clone)]
pub struct NotificationQueue {
    sender: mpsc::Sender<Arc<Admission>>,
    stats: Arc<DispatchStats>,
}

impl NotificationQueue {
    /// Creates a queue holding at most `capacity` pending admissions
    /// (minimum 1) and returns it with its receiving half.
    #[must_use]
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<Arc<Admission>>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let queue = Self {
            sender,
            stats: Arc::new(DispatchStats::default()),
        };
        (queue, receiver)
    }

    /// Hands an admission to the dispatcher without waiting.
    ///
    /// Returns `false` if the admission was dropped.
    pub fn enqueue(&self, admission: Admission) -> bool {
        match self.sender.try_send(Arc::new(admission)) {
            Ok(()) => {
                self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(admission)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    participant_id = %admission.participant_id,
                    "notification queue full, dropping admission"
                );
                false
            }
            Err(TrySendError::Closed(admission)) => {
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    participant_id = %admission.participant_id,
                    "notification dispatcher stopped, dropping admission"
                );
                false
            }
        }
    }

    /// Returns the shared delivery counters.
    #[must_use]
    pub fn stats(&self) -> &Arc<DispatchStats> {
        &self.stats
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::domain::participant::fixtures::profile;
    use crate::domain::{ParticipantId, PoolId};

    fn admission(n: u32) -> Admission {
        Admission {
            participant_id: ParticipantId::new(),
            pool_id: PoolId::new(1),
            pool_name: "Clan 1".to_string(),
            contact_link: "https://chat.example/1".to_string(),
            profile: profile(n),
            admitted_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn enqueued_admission_reaches_receiver() {
        let (queue, mut rx) = NotificationQueue::bounded(4);
        assert!(queue.enqueue(admission(1)));

        let Some(received) = rx.recv().await else {
            panic!("expected admission");
        };
        assert_eq!(received.profile.full_name, "Participant 1");
        assert_eq!(queue.stats().snapshot().enqueued, 1);
    }

    #[test]
    fn full_queue_drops_without_blocking() {
        let (queue, _rx) = NotificationQueue::bounded(1);
        assert!(queue.enqueue(admission(1)));
        assert!(!queue.enqueue(admission(2)));

        let stats = queue.stats().snapshot();
        assert_eq!(stats.enqueued, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn closed_queue_drops() {
        let (queue, rx) = NotificationQueue::bounded(4);
        drop(rx);
        assert!(!queue.enqueue(admission(1)));
        assert_eq!(queue.stats().snapshot().dropped, 1);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let (queue, _rx) = NotificationQueue::bounded(0);
        assert!(queue.enqueue(admission(1)));
    }
}
