//! In-process implementation of the registration store.
//!
//! Mirrors the PostgreSQL locking model closely enough for the admission
//! protocol to behave identically:
//!
//! - every pool row owns a fair [`tokio::sync::Mutex`] that plays the part
//!   of `SELECT ... FOR UPDATE`; a transaction keeps the guard until it
//!   commits or is dropped;
//! - writes are staged per transaction and applied atomically on commit;
//! - contact identifiers are reserved at insert time, so a concurrent
//!   insert of the same email or phone number fails as a unique violation
//!   would, and the reservation is released on rollback.
//!
//! Committed state lives behind a short-lived `std::sync::Mutex` that is
//! never held across an `.await`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use super::{AdmissionTx, RegistrationStore, StoreError};
use crate::domain::{Participant, ParticipantId, ParticipantProfile, Pool, PoolId};

/// A failure the store will raise once, at the next matching step of any
/// transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    /// The next `increment_pool_count` fails after its checks pass.
    IncrementPoolCount,
    /// The next `commit` fails before applying anything.
    Commit,
}

#[derive(Debug, Default)]
struct MemoryState {
    pools: BTreeMap<PoolId, Pool>,
    /// Committed participants in commit order.
    participants: Vec<Participant>,
    /// Committed and in-flight emails.
    emails: HashSet<String>,
    /// Committed and in-flight phone numbers.
    phones: HashSet<String>,
    faults: Vec<InjectedFault>,
}

impl MemoryState {
    fn take_fault(&mut self, fault: InjectedFault) -> bool {
        match self.faults.iter().position(|f| *f == fault) {
            Some(pos) => {
                self.faults.remove(pos);
                true
            }
            None => false,
        }
    }
}

type RowLocks = HashMap<PoolId, Arc<RowLock<()>>>;

/// Registration store kept entirely in memory.
///
/// Cheap to clone; clones share the same pools, participants, and row
/// locks. Pools are fixed at construction.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    row_locks: Arc<RowLocks>,
}

impl MemoryStore {
    /// Creates a store holding `pools`. Pool ids must be unique; a later
    /// duplicate replaces an earlier one.
    #[must_use]
    pub fn new(pools: impl IntoIterator<Item = Pool>) -> Self {
        let pools: BTreeMap<PoolId, Pool> = pools.into_iter().map(|p| (p.id, p)).collect();
        let row_locks = pools
            .keys()
            .map(|id| (*id, Arc::new(RowLock::new(()))))
            .collect();

        Self {
            state: Arc::new(Mutex::new(MemoryState {
                pools,
                ..MemoryState::default()
            })),
            row_locks: Arc::new(row_locks),
        }
    }

    /// Arms a one-shot failure for the next matching transaction step.
    pub fn fail_next(&self, fault: InjectedFault) {
        lock_state(&self.state).faults.push(fault);
    }

    /// Returns the committed state of one pool.
    #[must_use]
    pub fn pool(&self, pool_id: PoolId) -> Option<Pool> {
        lock_state(&self.state).pools.get(&pool_id).cloned()
    }

    /// Returns the number of committed participants across all pools.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        lock_state(&self.state).participants.len()
    }

    /// Returns the number of committed participants bound to `pool_id`.
    #[must_use]
    pub fn participants_in(&self, pool_id: PoolId) -> usize {
        lock_state(&self.state)
            .participants
            .iter()
            .filter(|p| p.pool_id == pool_id)
            .count()
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn AdmissionTx>, StoreError> {
        Ok(Box::new(MemoryTx {
            state: Arc::clone(&self.state),
            row_locks: Arc::clone(&self.row_locks),
            held: HashMap::new(),
            inserted: Vec::new(),
            increments: Vec::new(),
        }))
    }

    async fn list_pools(&self) -> Result<Vec<Pool>, StoreError> {
        Ok(lock_state(&self.state).pools.values().cloned().collect())
    }

    async fn list_participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, StoreError> {
        let state = lock_state(&self.state);
        if !state.pools.contains_key(&pool_id) {
            return Err(StoreError::PoolNotFound(pool_id));
        }
        let participants = state
            .participants
            .iter()
            .rev()
            .filter(|p| p.pool_id == pool_id)
            .cloned()
            .collect();
        Ok(participants)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Open transaction against a [`MemoryStore`].
struct MemoryTx {
    state: Arc<Mutex<MemoryState>>,
    row_locks: Arc<RowLocks>,
    held: HashMap<PoolId, OwnedMutexGuard<()>>,
    inserted: Vec<Participant>,
    increments: Vec<PoolId>,
}

impl MemoryTx {
    /// Increments this transaction has staged against `pool_id`.
    fn own_increments(&self, pool_id: PoolId) -> u32 {
        let n = self.increments.iter().filter(|id| **id == pool_id).count();
        u32::try_from(n).unwrap_or(u32::MAX)
    }

    /// `pool` as this transaction sees it, including its own writes.
    fn own_view(&self, pool: &Pool) -> Pool {
        let mut pool = pool.clone();
        pool.current_count = pool
            .current_count
            .saturating_add(self.own_increments(pool.id));
        pool
    }

    /// Waits for the row lock on `pool_id` unless already held.
    /// Returns `true` if the lock was acquired by this call.
    async fn lock_row(&mut self, pool_id: PoolId) -> Result<bool, StoreError> {
        if self.held.contains_key(&pool_id) {
            return Ok(false);
        }
        let row_lock = self
            .row_locks
            .get(&pool_id)
            .map(Arc::clone)
            .ok_or(StoreError::PoolNotFound(pool_id))?;
        let guard = row_lock.lock_owned().await;
        self.held.insert(pool_id, guard);
        Ok(true)
    }
}

#[async_trait]
impl AdmissionTx for MemoryTx {
    async fn find_lock_admittable_pool(&mut self) -> Result<Option<Pool>, StoreError> {
        loop {
            let candidate = {
                let state = lock_state(&self.state);
                let found = state
                    .pools
                    .values()
                    .map(|p| self.own_view(p))
                    .find(Pool::has_room)
                    .map(|p| p.id);
                found
            };
            let Some(pool_id) = candidate else {
                return Ok(None);
            };

            let newly_locked = self.lock_row(pool_id).await?;

            // The holder we waited on may have filled the pool.
            let current = {
                let state = lock_state(&self.state);
                let pool = state.pools.get(&pool_id).map(|p| self.own_view(p));
                pool
            };
            match current {
                Some(pool) if pool.has_room() => return Ok(Some(pool)),
                _ => {
                    if newly_locked {
                        self.held.remove(&pool_id);
                    }
                }
            }
        }
    }

    async fn insert_participant(
        &mut self,
        profile: &ParticipantProfile,
        pool_id: PoolId,
    ) -> Result<ParticipantId, StoreError> {
        let mut state = lock_state(&self.state);
        if !state.pools.contains_key(&pool_id) {
            return Err(StoreError::PoolNotFound(pool_id));
        }
        if state.emails.contains(&profile.email) || state.phones.contains(&profile.whatsapp_number)
        {
            return Err(StoreError::DuplicateKey);
        }
        state.emails.insert(profile.email.clone());
        state.phones.insert(profile.whatsapp_number.clone());

        let participant = Participant {
            id: ParticipantId::new(),
            profile: profile.clone(),
            pool_id,
            created_at: Utc::now(),
        };
        let id = participant.id;
        self.inserted.push(participant);
        Ok(id)
    }

    async fn increment_pool_count(&mut self, pool_id: PoolId) -> Result<(), StoreError> {
        self.lock_row(pool_id).await?;

        let mut state = lock_state(&self.state);
        let pool = state
            .pools
            .get(&pool_id)
            .map(|p| self.own_view(p))
            .ok_or(StoreError::PoolNotFound(pool_id))?;
        if !pool.has_room() {
            return Err(StoreError::Backend(format!(
                "pool {pool_id} would exceed max_capacity"
            )));
        }
        if state.take_fault(InjectedFault::IncrementPoolCount) {
            return Err(StoreError::Backend(format!(
                "injected failure incrementing pool {pool_id}"
            )));
        }
        drop(state);

        self.increments.push(pool_id);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        let mut state = lock_state(&this.state);
        if state.take_fault(InjectedFault::Commit) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }

        let mut staged: BTreeMap<PoolId, u32> = BTreeMap::new();
        for pool_id in &this.increments {
            let n = staged.entry(*pool_id).or_insert(0);
            *n = n.saturating_add(1);
        }
        for (pool_id, n) in &staged {
            let pool = state
                .pools
                .get(pool_id)
                .ok_or(StoreError::PoolNotFound(*pool_id))?;
            if pool.current_count.saturating_add(*n) > pool.max_capacity {
                return Err(StoreError::Backend(format!(
                    "pool {pool_id} would exceed max_capacity"
                )));
            }
        }
        for (pool_id, n) in staged {
            if let Some(pool) = state.pools.get_mut(&pool_id) {
                pool.current_count = pool.current_count.saturating_add(n);
            }
        }
        state.participants.append(&mut this.inserted);
        this.increments.clear();
        drop(state);

        // Row locks are released when `this` drops here.
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        drop(self);
        Ok(())
    }
}

impl Drop for MemoryTx {
    fn drop(&mut self) {
        if self.inserted.is_empty() {
            return;
        }
        let mut state = lock_state(&self.state);
        for participant in self.inserted.drain(..) {
            state.emails.remove(&participant.profile.email);
            state.phones.remove(&participant.profile.whatsapp_number);
        }
    }
}

fn lock_state(state: &Mutex<MemoryState>) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}
