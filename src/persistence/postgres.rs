//! PostgreSQL implementation of the registration store.
//!
//! Admission relies on row-level locking: the candidate pool is selected
//! with `FOR UPDATE`, so a concurrent transaction aiming at the same pool
//! blocks until the holder commits or rolls back, then re-checks the
//! capacity predicate against the new row version.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::models::{ParticipantRow, PoolRow, participant_from_row, pool_from_row};
use super::{AdmissionTx, RegistrationStore, StoreError};
use crate::config::{GatewayConfig, PoolSeed};
use crate::domain::{Participant, ParticipantId, ParticipantProfile, Pool, PoolId};

/// SQLSTATE `lock_not_available`.
const LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE `query_canceled`, raised when `statement_timeout` fires.
const QUERY_CANCELED: &str = "57014";

/// PostgreSQL-backed store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    tx_deadline: Duration,
}

impl PostgresStore {
    /// Creates a store over an existing connection pool.
    ///
    /// `tx_deadline` becomes the transaction-local `statement_timeout` and
    /// `lock_timeout` of every admission transaction.
    #[must_use]
    pub fn new(pool: PgPool, tx_deadline: Duration) -> Self {
        Self { pool, tx_deadline }
    }

    /// Opens a connection pool from the gateway configuration.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the database cannot be reached.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .map_err(map_sqlx_error)?;

        Ok(Self::new(pool, config.admission_timeout()))
    }

    /// Applies the embedded schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    /// Provisions pools from `seeds` when the `pools` table is empty.
    ///
    /// Returns the number of pools inserted; zero if pools already exist.
    /// Ids are assigned by the database in seed order.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the table cannot be locked or written.
    pub async fn seed_pools_if_empty(&self, seeds: &[PoolSeed]) -> Result<usize, StoreError> {
        if seeds.is_empty() {
            return Ok(0);
        }
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        // Concurrent replicas starting together must not both seed.
        sqlx::query("LOCK TABLE pools IN EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM pools")
            .fetch_one(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        if existing > 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Ok(0);
        }

        for seed in seeds {
            let max_capacity = i32::try_from(seed.max_capacity).map_err(|_| {
                StoreError::Backend(format!("capacity of {} exceeds i32", seed.name))
            })?;
            sqlx::query("INSERT INTO pools (name, max_capacity, contact_link) VALUES ($1, $2, $3)")
                .bind(&seed.name)
                .bind(max_capacity)
                .bind(&seed.contact_link)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(seeds.len())
    }
}

#[async_trait]
impl RegistrationStore for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn AdmissionTx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let timeout = format!("{}ms", self.tx_deadline.as_millis());
        sqlx::query(
            "SELECT set_config('statement_timeout', $1, true), set_config('lock_timeout', $1, true)",
        )
        .bind(&timeout)
        .execute(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(Box::new(PostgresTx { tx }))
    }

    async fn list_pools(&self) -> Result<Vec<Pool>, StoreError> {
        let rows = sqlx::query_as::<_, PoolRow>(
            "SELECT id, name, current_count, max_capacity, contact_link FROM pools ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(pool_from_row).collect()
    }

    async fn list_participants(&self, pool_id: PoolId) -> Result<Vec<Participant>, StoreError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM pools WHERE id = $1)")
                .bind(pool_id.get())
                .fetch_one(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        if !exists {
            return Err(StoreError::PoolNotFound(pool_id));
        }

        let rows = sqlx::query_as::<_, ParticipantRow>(
            "SELECT id, full_name, email, whatsapp_number, gender, country, state, age_group, \
             religion, church_name, instagram_handle, relationship_status, pool_id, created_at \
             FROM participants WHERE pool_id = $1 ORDER BY created_at DESC",
        )
        .bind(pool_id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(participant_from_row).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }
}

/// An open PostgreSQL transaction. Rolled back by sqlx when dropped.
struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl AdmissionTx for PostgresTx {
    async fn find_lock_admittable_pool(&mut self) -> Result<Option<Pool>, StoreError> {
        let row = sqlx::query_as::<_, PoolRow>(
            "SELECT id, name, current_count, max_capacity, contact_link FROM pools \
             WHERE current_count < max_capacity \
             ORDER BY id ASC \
             LIMIT 1 \
             FOR UPDATE",
        )
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        row.map(pool_from_row).transpose()
    }

    async fn insert_participant(
        &mut self,
        profile: &ParticipantProfile,
        pool_id: PoolId,
    ) -> Result<ParticipantId, StoreError> {
        let id = sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO participants (full_name, email, whatsapp_number, gender, country, state, \
             age_group, religion, church_name, instagram_handle, relationship_status, pool_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) RETURNING id",
        )
        .bind(&profile.full_name)
        .bind(&profile.email)
        .bind(&profile.whatsapp_number)
        .bind(&profile.gender)
        .bind(&profile.country)
        .bind(&profile.state)
        .bind(&profile.age_group)
        .bind(&profile.religion)
        .bind(profile.church_name.as_deref())
        .bind(&profile.instagram_handle)
        .bind(&profile.relationship_status)
        .bind(pool_id.get())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        Ok(ParticipantId::from_uuid(id))
    }

    async fn increment_pool_count(&mut self, pool_id: PoolId) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE pools SET current_count = current_count + 1 \
             WHERE id = $1 AND current_count < max_capacity",
        )
        .bind(pool_id.get())
        .execute(&mut *self.tx)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() != 1 {
            return Err(StoreError::Backend(format!(
                "pool {pool_id} was not incremented"
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(map_sqlx_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(map_sqlx_error)
    }
}

/// Translates a sqlx error into the store taxonomy.
fn map_sqlx_error(err: sqlx::Error) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateKey,
        sqlx::Error::Database(db)
            if matches!(
                db.code().as_deref(),
                Some(LOCK_NOT_AVAILABLE | QUERY_CANCELED)
            ) =>
        {
            StoreError::Timeout
        }
        sqlx::Error::PoolTimedOut => StoreError::Timeout,
        _ => StoreError::Backend(err.to_string()),
    }
}
