//! Capacity allocator: the atomic admission protocol.
//!
//! Every call to [`CapacityAllocator::admit`] is exactly one attempt:
//!
//! 1. begin a transaction under a hard deadline;
//! 2. lock the lowest-id pool with room (`FOR UPDATE`), waiting on any
//!    concurrent holder and re-evaluating afterwards;
//! 3. no candidate → roll back, `CapacityExhausted`;
//! 4. insert the participant; unique violation → roll back,
//!    `DuplicateRegistration`;
//! 5. increment the locked pool's counter by one;
//! 6. commit; failure → `TransientFailure`;
//! 7. only then report `Admitted`.
//!
//! Locking before inserting is what keeps a pool from being over-filled:
//! a second attempt on the same pool blocks until the first finishes, and
//! then sees the advanced counter. Because the lowest-id open pool always
//! wins, contention sits on one pool at a time and moves to the next one
//! in id order once it fills.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::domain::{Admission, AdmissionOutcome, ParticipantProfile};
use crate::persistence::{AdmissionTx, RegistrationStore, StoreError};

/// Runs admission transactions against an injected store.
///
/// Holds no pool state of its own; every attempt re-reads and re-locks
/// from the store, so any number of allocators (or processes) may share
/// one database.
#[derive(Debug, Clone)]
pub struct CapacityAllocator {
    store: Arc<dyn RegistrationStore>,
    deadline: Duration,
}

/// What the transaction body decided before commit.
enum Staged {
    Commit(Admission),
    Abort(AdmissionOutcome),
}

impl CapacityAllocator {
    /// Creates an allocator with the given per-attempt deadline.
    #[must_use]
    pub fn new(store: Arc<dyn RegistrationStore>, deadline: Duration) -> Self {
        Self { store, deadline }
    }

    /// Admits one participant into the lowest-id pool with room.
    ///
    /// Never returns a raw store error: everything that is not a capacity
    /// or duplicate rejection is rolled back and reported as
    /// [`AdmissionOutcome::TransientFailure`]. Performs no retries.
    pub async fn admit(&self, profile: &ParticipantProfile) -> AdmissionOutcome {
        match tokio::time::timeout(self.deadline, self.attempt(profile)).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "admission rolled back");
                AdmissionOutcome::TransientFailure
            }
            Err(_) => {
                // The attempt future was dropped with its transaction, which
                // rolls back and releases the pool lock.
                tracing::warn!(
                    deadline_ms = u64::try_from(self.deadline.as_millis()).unwrap_or(u64::MAX),
                    "admission deadline exceeded"
                );
                AdmissionOutcome::TransientFailure
            }
        }
    }

    async fn attempt(&self, profile: &ParticipantProfile) -> Result<AdmissionOutcome, StoreError> {
        let mut tx = self.store.begin().await?;

        match stage(tx.as_mut(), profile).await {
            Ok(Staged::Commit(admission)) => {
                tx.commit().await?;
                tracing::info!(
                    participant_id = %admission.participant_id,
                    pool_id = %admission.pool_id,
                    pool = %admission.pool_name,
                    "participant admitted"
                );
                Ok(AdmissionOutcome::Admitted(admission))
            }
            Ok(Staged::Abort(outcome)) => {
                abort(tx).await;
                tracing::info!(outcome = outcome.as_str(), "admission rejected");
                Ok(outcome)
            }
            Err(e) => {
                abort(tx).await;
                Err(e)
            }
        }
    }
}

/// Steps 2–5 of the protocol, inside an open transaction.
async fn stage(
    tx: &mut dyn AdmissionTx,
    profile: &ParticipantProfile,
) -> Result<Staged, StoreError> {
    let Some(pool) = tx.find_lock_admittable_pool().await? else {
        return Ok(Staged::Abort(AdmissionOutcome::CapacityExhausted));
    };

    let participant_id = match tx.insert_participant(profile, pool.id).await {
        Ok(id) => id,
        Err(StoreError::DuplicateKey) => {
            return Ok(Staged::Abort(AdmissionOutcome::DuplicateRegistration));
        }
        Err(e) => return Err(e),
    };

    tx.increment_pool_count(pool.id).await?;

    Ok(Staged::Commit(Admission {
        participant_id,
        pool_id: pool.id,
        pool_name: pool.name,
        contact_link: pool.contact_link,
        profile: profile.clone(),
        admitted_at: Utc::now(),
    }))
}

/// Rolls back, logging instead of propagating a rollback failure; the
/// transaction is abandoned either way.
async fn abort(tx: Box<dyn AdmissionTx>) {
    if let Err(e) = tx.rollback().await {
        tracing::debug!(error = %e, "rollback failed");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::participant::fixtures::profile;
    use crate::domain::{Pool, PoolId};
    use crate::persistence::{InjectedFault, MemoryStore};

    fn pool(id: i64, current_count: u32, max_capacity: u32) -> Pool {
        Pool {
            id: PoolId::new(id),
            name: format!("Clan {id}"),
            current_count,
            max_capacity,
            contact_link: format!("https://chat.example/{id}"),
        }
    }

    fn allocator(store: &MemoryStore) -> CapacityAllocator {
        CapacityAllocator::new(Arc::new(store.clone()), Duration::from_secs(10))
    }

    #[tokio::test]
    async fn admits_into_lowest_open_pool() {
        let store = MemoryStore::new([pool(1, 2, 2), pool(2, 1, 2)]);
        let outcome = allocator(&store).admit(&profile(1)).await;

        let Some(admission) = outcome.admission() else {
            panic!("expected admission, got {outcome:?}");
        };
        assert_eq!(admission.pool_id, PoolId::new(2));
        assert_eq!(admission.pool_name, "Clan 2");
        assert_eq!(admission.contact_link, "https://chat.example/2");
        assert_eq!(store.pool(PoolId::new(2)).map(|p| p.current_count), Some(2));
    }

    #[tokio::test]
    async fn exhausted_touches_nothing() {
        let store = MemoryStore::new([pool(1, 1, 1)]);
        let outcome = allocator(&store).admit(&profile(1)).await;
        assert_eq!(outcome, AdmissionOutcome::CapacityExhausted);
        assert_eq!(store.participant_count(), 0);
    }

    #[tokio::test]
    async fn duplicate_consumes_no_slot() {
        let store = MemoryStore::new([pool(1, 0, 5)]);
        let allocator = allocator(&store);

        assert!(allocator.admit(&profile(1)).await.is_admitted());
        let mut same_phone = profile(2);
        same_phone.whatsapp_number = profile(1).whatsapp_number;
        assert_eq!(
            allocator.admit(&same_phone).await,
            AdmissionOutcome::DuplicateRegistration
        );
        assert_eq!(store.pool(PoolId::new(1)).map(|p| p.current_count), Some(1));
    }

    #[tokio::test]
    async fn increment_failure_rolls_back_insert() {
        let store = MemoryStore::new([pool(1, 0, 5)]);
        store.fail_next(InjectedFault::IncrementPoolCount);

        let outcome = allocator(&store).admit(&profile(1)).await;
        assert_eq!(outcome, AdmissionOutcome::TransientFailure);
        assert_eq!(store.participant_count(), 0);
        assert_eq!(store.pool(PoolId::new(1)).map(|p| p.current_count), Some(0));

        // The contact is free again after the rollback.
        assert!(allocator(&store).admit(&profile(1)).await.is_admitted());
    }

    #[tokio::test]
    async fn commit_failure_is_transient() {
        let store = MemoryStore::new([pool(1, 0, 5)]);
        store.fail_next(InjectedFault::Commit);

        let outcome = allocator(&store).admit(&profile(1)).await;
        assert_eq!(outcome, AdmissionOutcome::TransientFailure);
        assert_eq!(store.participant_count(), 0);
    }

    #[tokio::test]
    async fn deadline_releases_waiter() {
        let store = MemoryStore::new([pool(1, 0, 5)]);

        // Hold the only pool's row lock in an open transaction.
        let Ok(mut holder) = store.begin().await else {
            panic!("begin failed");
        };
        let Ok(Some(_)) = holder.find_lock_admittable_pool().await else {
            panic!("expected pool");
        };

        let short = CapacityAllocator::new(Arc::new(store.clone()), Duration::from_millis(50));
        assert_eq!(
            short.admit(&profile(1)).await,
            AdmissionOutcome::TransientFailure
        );

        drop(holder);
        assert!(short.admit(&profile(1)).await.is_admitted());
    }
}
