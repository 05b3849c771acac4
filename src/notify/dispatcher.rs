//! Notification dispatcher: fans each admission out to every channel.
//!
//! Runs as its own task, fully detached from request handling. For each
//! admission received from the queue it spawns one task per channel; the
//! tasks run concurrently, in no particular order, and each makes a
//! single delivery attempt. Outcomes are logged and counted, never
//! retried, and never reported back to the registrant.
//!
//! The queue is only read while fewer than `max_in_flight` deliveries are
//! running, so slow endpoints back up into the bounded queue and overflow
//! is dropped there instead of piling up as tasks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle, JoinSet};

use super::{DispatchStats, NotificationChannel, NotificationQueue};
use crate::domain::Admission;

/// Default cap on concurrently running channel deliveries.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 64;

/// Consumer side of the notification queue.
#[derive(Debug)]
pub struct NotificationDispatcher {
    receiver: mpsc::Receiver<Arc<Admission>>,
    channels: Vec<Arc<dyn NotificationChannel>>,
    stats: Arc<DispatchStats>,
    max_in_flight: usize,
}

impl NotificationDispatcher {
    /// Creates a queue of `capacity` and the dispatcher draining it.
    #[must_use]
    pub fn channel(
        capacity: usize,
        channels: Vec<Arc<dyn NotificationChannel>>,
    ) -> (NotificationQueue, Self) {
        let (queue, receiver) = NotificationQueue::bounded(capacity);
        let dispatcher = Self {
            receiver,
            channels,
            stats: Arc::clone(queue.stats()),
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
        };
        (queue, dispatcher)
    }

    /// Caps how many channel deliveries may run at once (at least 1).
    #[must_use]
    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Names of the configured channels.
    #[must_use]
    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Runs the dispatcher on its own task.
    #[must_use]
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Delivers admissions until every [`NotificationQueue`] handle has
    /// been dropped, then waits for in-flight deliveries and returns.
    pub async fn run(mut self) {
        let mut in_flight = JoinSet::new();

        loop {
            tokio::select! {
                received = self.receiver.recv(), if in_flight.len() < self.max_in_flight => {
                    let Some(admission) = received else {
                        break;
                    };
                    for channel in &self.channels {
                        in_flight.spawn(deliver_once(
                            Arc::clone(channel),
                            Arc::clone(&admission),
                            Arc::clone(&self.stats),
                        ));
                    }
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            log_join(joined);
        }
        tracing::debug!("notification dispatcher stopped");
    }
}

async fn deliver_once(
    channel: Arc<dyn NotificationChannel>,
    admission: Arc<Admission>,
    stats: Arc<DispatchStats>,
) {
    match channel.deliver(&admission).await {
        Ok(()) => {
            stats.record_delivered();
            tracing::info!(
                channel = channel.name(),
                participant_id = %admission.participant_id,
                "notification delivered"
            );
        }
        Err(e) => {
            stats.record_failed();
            tracing::warn!(
                channel = channel.name(),
                participant_id = %admission.participant_id,
                error = %e,
                "notification failed"
            );
        }
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "notification task aborted");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::domain::participant::fixtures::profile;
    use crate::domain::{ParticipantId, PoolId};
    use crate::notify::NotifyError;

    #[derive(Debug, Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn deliver(&self, admission: &Admission) -> Result<(), NotifyError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(admission.profile.email.clone());
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Failing;

    #[async_trait]
    impl NotificationChannel for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn deliver(&self, _admission: &Admission) -> Result<(), NotifyError> {
            Err(NotifyError::Rejected {
                status: 500,
                body: "boom".to_string(),
            })
        }
    }

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
    async fn failing_channel_does_not_block_others() {
        let recording = Arc::new(Recording::default());
        let channels: Vec<Arc<dyn NotificationChannel>> = vec![
            Arc::new(Failing),
            Arc::clone(&recording) as Arc<dyn NotificationChannel>,
        ];
        let (queue, dispatcher) = NotificationDispatcher::channel(8, channels);
        let handle = dispatcher.spawn();

        assert!(queue.enqueue(admission(1)));
        assert!(queue.enqueue(admission(2)));
        let stats = Arc::clone(queue.stats());
        drop(queue);

        let Ok(()) = handle.await else {
            panic!("dispatcher panicked");
        };

        let seen = recording.seen.lock().map(|s| s.clone()).unwrap_or_default();
        assert_eq!(seen.len(), 2);
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.delivered, 2);
        assert_eq!(snapshot.failed, 2);
        assert_eq!(snapshot.enqueued, 2);
    }

    #[tokio::test]
    async fn stops_when_queue_handles_are_gone() {
        let (queue, dispatcher) = NotificationDispatcher::channel(1, Vec::new());
        let handle = dispatcher.spawn();
        drop(queue);

        let finished = tokio::time::timeout(std::time::Duration::from_secs(1), handle).await;
        assert!(matches!(finished, Ok(Ok(()))));
    }

    /// Signals when a delivery starts, then holds it until the gate opens.
    #[derive(Debug)]
    struct Gated {
        started: tokio::sync::Notify,
        gate: tokio::sync::Semaphore,
    }

    impl Gated {
        fn closed() -> Self {
            Self {
                started: tokio::sync::Notify::new(),
                gate: tokio::sync::Semaphore::new(0),
            }
        }
    }

    #[async_trait]
    impl NotificationChannel for Gated {
        fn name(&self) -> &'static str {
            "gated"
        }

        async fn deliver(&self, _admission: &Admission) -> Result<(), NotifyError> {
            self.started.notify_one();
            let _permit = self.gate.acquire().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn slow_channel_backs_up_into_queue_and_drops_overflow() {
        let gated = Arc::new(Gated::closed());
        let (queue, dispatcher) = NotificationDispatcher::channel(
            1,
            vec![Arc::clone(&gated) as Arc<dyn NotificationChannel>],
        );
        let handle = dispatcher.with_max_in_flight(1).spawn();

        assert!(queue.enqueue(admission(1)));
        let started =
            tokio::time::timeout(std::time::Duration::from_secs(1), gated.started.notified()).await;
        assert!(started.is_ok(), "first delivery never started");

        // One delivery is running, so the next admission waits in the queue
        // and the one after that has nowhere to go.
        assert!(queue.enqueue(admission(2)));
        assert!(!queue.enqueue(admission(3)));
        assert!(!queue.enqueue(admission(4)));

        gated.gate.add_permits(8);
        let stats = Arc::clone(queue.stats());
        drop(queue);
        let Ok(()) = handle.await else {
            panic!("dispatcher panicked");
        };

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.enqueued, 2);
        assert_eq!(snapshot.dropped, 2);
        assert_eq!(snapshot.delivered, 2);
    }

    #[test]
    fn max_in_flight_is_at_least_one() {
        let (_queue, dispatcher) = NotificationDispatcher::channel(1, Vec::new());
        assert_eq!(dispatcher.with_max_in_flight(0).max_in_flight, 1);
    }

    #[test]
    fn reports_channel_names() {
        let (_queue, dispatcher) =
            NotificationDispatcher::channel(1, vec![Arc::new(Failing) as Arc<dyn NotificationChannel>]);
        assert_eq!(dispatcher.channel_names(), vec!["failing"]);
    }
}
