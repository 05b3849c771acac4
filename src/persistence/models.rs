//! Database row shapes for `pools` and `participants`.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::StoreError;
use crate::domain::{Participant, ParticipantId, ParticipantProfile, Pool, PoolId};

/// A row from the `pools` table.
pub type PoolRow = (i64, String, i32, i32, String);

/// A row from the `participants` table.
pub type ParticipantRow = (
    Uuid,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    String,
    String,
    i64,
    DateTime<Utc>,
);

/// Converts a `pools` row into a [`Pool`].
///
/// # Errors
///
/// Returns [`StoreError::Backend`] if a counter column is negative.
pub fn pool_from_row(row: PoolRow) -> Result<Pool, StoreError> {
    let (id, name, current_count, max_capacity, contact_link) = row;
    let current_count = u32::try_from(current_count)
        .map_err(|_| StoreError::Backend(format!("pool {id} has negative current_count")))?;
    let max_capacity = u32::try_from(max_capacity)
        .map_err(|_| StoreError::Backend(format!("pool {id} has negative max_capacity")))?;

    Ok(Pool {
        id: PoolId::new(id),
        name,
        current_count,
        max_capacity,
        contact_link,
    })
}

/// Converts a `participants` row into a [`Participant`].
#[must_use]
pub fn participant_from_row(row: ParticipantRow) -> Participant {
    let (
        id,
        full_name,
        email,
        whatsapp_number,
        gender,
        country,
        state,
        age_group,
        religion,
        church_name,
        instagram_handle,
        relationship_status,
        pool_id,
        created_at,
    ) = row;

    Participant {
        id: ParticipantId::from_uuid(id),
        profile: ParticipantProfile {
            full_name,
            email,
            whatsapp_number,
            gender,
            country,
            state,
            age_group,
            religion,
            church_name,
            instagram_handle,
            relationship_status,
        },
        pool_id: PoolId::new(pool_id),
        created_at,
    }
}
