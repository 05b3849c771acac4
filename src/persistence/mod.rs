//! Persistence layer: pool registry and participant store.
//!
//! The admission core talks to storage through two object-safe traits:
//!
//! - [`RegistrationStore`] opens transactions and serves roster reads.
//! - [`AdmissionTx`] is one open transaction. Its operations compose into
//!   the admission protocol and become visible only on [`AdmissionTx::commit`].
//!
//! Dropping an `AdmissionTx` without committing rolls it back and releases
//! every row lock it holds.
//!
//! Two implementations are provided: [`postgres::PostgresStore`] (sqlx,
//! production) and [`memory::MemoryStore`] (per-row async mutexes, used
//! for tests and for running without a database).

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt::Debug;

use async_trait::async_trait;

use crate::domain::{Participant, ParticipantId, ParticipantProfile, Pool, PoolId};

pub use memory::{InjectedFault, MemoryStore};
pub use postgres::PostgresStore;

/// Store-level failure. Never surfaced past the capacity allocator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint on a contact identifier was violated.
    #[error("duplicate contact identifier")]
    DuplicateKey,

    /// A lock wait or statement exceeded its deadline.
    #[error("store operation timed out")]
    Timeout,

    /// The referenced pool does not exist.
    #[error("pool not found: {0}")]
    PoolNotFound(PoolId),

    /// Any other backend failure (connection loss, constraint, commit).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// One open admission transaction.
///
/// Operations are only visible to other transactions after
/// [`commit`](Self::commit). A transaction that is dropped, or whose
/// future is cancelled, is rolled back.
#[async_trait]
pub trait AdmissionTx: Send {
    /// Selects the lowest-id pool with `current_count < max_capacity` and
    /// locks it exclusively for the rest of the transaction.
    ///
    /// Blocks while another transaction holds the candidate row, then
    /// re-evaluates. Returns `None` when every pool is full.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on lock timeout or backend failure.
    async fn find_lock_admittable_pool(&mut self) -> Result<Option<Pool>, StoreError>;

    /// Inserts a participant bound to `pool_id` and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] when the email or phone number
    /// is already registered, or another [`StoreError`] on failure.
    async fn insert_participant(
        &mut self,
        profile: &ParticipantProfile,
        pool_id: PoolId,
    ) -> Result<ParticipantId, StoreError>;

    /// Advances `pool_id`'s occupancy counter by exactly one.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the pool is missing, already full, or
    /// the backend fails.
    async fn increment_pool_count(&mut self, pool_id: PoolId) -> Result<(), StoreError>;

    /// Makes every staged write durable and releases all locks.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the commit fails; nothing is persisted.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    /// Discards every staged write and releases all locks.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the backend reports a rollback failure.
    /// The transaction is abandoned either way.
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Durable home of pools and participants.
#[async_trait]
pub trait RegistrationStore: Send + Sync + Debug {
    /// Opens a new admission transaction.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if no connection is available.
    async fn begin(&self) -> Result<Box<dyn AdmissionTx>, StoreError>;

    /// Returns every pool ordered by id.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    async fn list_pools(&self) -> Result<Vec<Pool>, StoreError>;

    /// Returns the participants of one pool, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::PoolNotFound`] for an unknown pool, or another
    /// [`StoreError`] on backend failure.
    async fn list_participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, StoreError>;

    /// Checks that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if it is not.
    async fn ping(&self) -> Result<(), StoreError>;
}
