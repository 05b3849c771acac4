//! Registration service: admission plus post-commit notification handoff.

use std::sync::Arc;

use crate::domain::{AdmissionOutcome, Participant, ParticipantProfile, Pool, PoolId};
use crate::error::GatewayError;
use crate::notify::{DispatchSnapshot, NotificationQueue};
use crate::persistence::RegistrationStore;

use super::CapacityAllocator;

/// Orchestration layer behind the HTTP handlers.
///
/// Stateless coordinator: owns the [`CapacityAllocator`] for admissions,
/// the store for roster reads, and the [`NotificationQueue`] for
/// post-admission side effects. `register` follows the pattern: admit →
/// enqueue (only on `Admitted`) → return, never waiting on delivery.
#[derive(Debug, Clone)]
pub struct RegistrationService {
    allocator: CapacityAllocator,
    store: Arc<dyn RegistrationStore>,
    notifications: NotificationQueue,
}

impl RegistrationService {
    /// Creates a new `RegistrationService`.
    #[must_use]
    pub fn new(
        allocator: CapacityAllocator,
        store: Arc<dyn RegistrationStore>,
        notifications: NotificationQueue,
    ) -> Self {
        Self {
            allocator,
            store,
            notifications,
        }
    }

    /// Runs one admission attempt and, if it committed, hands the
    /// admission to the notification dispatcher.
    ///
    /// The outcome is final once the allocator returns: a full or closed
    /// notification queue is logged and otherwise ignored.
    pub async fn register(&self, profile: &ParticipantProfile) -> AdmissionOutcome {
        let outcome = self.allocator.admit(profile).await;
        if let AdmissionOutcome::Admitted(admission) = &outcome {
            self.notifications.enqueue(admission.clone());
        }
        outcome
    }

    /// Returns every pool with its occupancy, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the store cannot be read.
    pub async fn pool_stats(&self) -> Result<Vec<Pool>, GatewayError> {
        Ok(self.store.list_pools().await?)
    }

    /// Returns the participants of one pool, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PoolNotFound`] for an unknown pool, or
    /// another [`GatewayError`] if the store cannot be read.
    pub async fn participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, GatewayError> {
        Ok(self.store.list_participants(pool_id).await?)
    }

    /// Returns a snapshot of notification delivery counters.
    #[must_use]
    pub fn dispatch_stats(&self) -> DispatchSnapshot {
        self.notifications.stats().snapshot()
    }

    /// Returns `true` if the store answers a ping.
    pub async fn store_healthy(&self) -> bool {
        match self.store.ping().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "store health check failed");
                false
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::participant::fixtures::profile;
    use crate::persistence::MemoryStore;

    type Receiver = tokio::sync::mpsc::Receiver<Arc<crate::domain::Admission>>;

    fn make_service(max_capacity: u32) -> (RegistrationService, Receiver) {
        let store = MemoryStore::new([Pool {
            id: PoolId::new(1),
            name: "Clan 1".to_string(),
            current_count: 0,
            max_capacity,
            contact_link: "https://chat.example/1".to_string(),
        }]);
        let store: Arc<dyn RegistrationStore> = Arc::new(store);
        let allocator = CapacityAllocator::new(Arc::clone(&store), Duration::from_secs(10));
        let (queue, rx) = NotificationQueue::bounded(8);
        (RegistrationService::new(allocator, store, queue), rx)
    }

    #[tokio::test]
    async fn admitted_registration_is_enqueued() {
        let (service, mut rx) = make_service(1);
        let outcome = service.register(&profile(1)).await;
        assert!(outcome.is_admitted());

        let Ok(queued) = rx.try_recv() else {
            panic!("expected queued admission");
        };
        assert_eq!(queued.profile.email, "participant1@example.com");
    }

    #[tokio::test]
    async fn rejected_registration_is_not_enqueued() {
        let (service, mut rx) = make_service(1);
        let _ = service.register(&profile(1)).await;
        let _ = rx.try_recv();

        let outcome = service.register(&profile(2)).await;
        assert_eq!(outcome, AdmissionOutcome::CapacityExhausted);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_queue_does_not_change_outcome() {
        let (service, rx) = make_service(2);
        drop(rx);

        let outcome = service.register(&profile(1)).await;
        assert!(outcome.is_admitted());
        assert_eq!(service.dispatch_stats().dropped, 1);
    }

    #[tokio::test]
    async fn stats_and_roster_reads() {
        let (service, _rx) = make_service(3);
        let _ = service.register(&profile(1)).await;

        let Ok(pools) = service.pool_stats().await else {
            panic!("stats failed");
        };
        assert_eq!(pools.first().map(|p| p.current_count), Some(1));

        let Ok(roster) = service.participants(PoolId::new(1)).await else {
            panic!("roster failed");
        };
        assert_eq!(roster.len(), 1);

        let missing = service.participants(PoolId::new(42)).await;
        assert!(matches!(missing, Err(GatewayError::PoolNotFound(_))));
        assert!(service.store_healthy().await);
    }
}
