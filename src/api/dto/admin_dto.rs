//! Admin dashboard DTOs: pool occupancy, rosters and dispatch counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{Participant, Pool};
use crate::notify::DispatchSnapshot;

/// Occupancy of one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PoolStatDto {
    /// Pool id.
    pub id: i64,
    /// Pool name.
    pub name: String,
    /// Admitted participants.
    pub current_count: u32,
    /// Capacity.
    pub max_capacity: u32,
}

impl From<Pool> for PoolStatDto {
    fn from(pool: Pool) -> Self {
        Self {
            id: pool.id.get(),
            name: pool.name,
            current_count: pool.current_count,
            max_capacity: pool.max_capacity,
        }
    }
}

/// One roster entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ParticipantDto {
    /// Participant id.
    pub id: uuid::Uuid,
    /// Full name.
    pub full_name: String,
    /// Email address.
    pub email: String,
    /// WhatsApp number.
    pub whatsapp_number: String,
    /// Gender.
    pub gender: String,
    /// Country.
    pub country: String,
    /// State or region.
    pub state: String,
    /// Age bracket.
    pub age_group: String,
    /// Religion.
    pub religion: String,
    /// Church name, empty when none was given.
    pub church_name: String,
    /// Instagram handle.
    pub instagram_handle: String,
    /// Relationship status.
    pub relationship_status: String,
    /// Pool the participant belongs to.
    pub clan_id: i64,
    /// Admission time.
    pub created_at: DateTime<Utc>,
}

impl From<Participant> for ParticipantDto {
    fn from(participant: Participant) -> Self {
        let p = participant.profile;
        Self {
            id: *participant.id.as_uuid(),
            full_name: p.full_name,
            email: p.email,
            whatsapp_number: p.whatsapp_number,
            gender: p.gender,
            country: p.country,
            state: p.state,
            age_group: p.age_group,
            religion: p.religion,
            church_name: p.church_name.unwrap_or_default(),
            instagram_handle: p.instagram_handle,
            relationship_status: p.relationship_status,
            clan_id: participant.pool_id.get(),
            created_at: participant.created_at,
        }
    }
}

/// Query parameters for `GET /api/admin/participants`.
#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ParticipantsQuery {
    /// Pool to list. `pool_id` is accepted as an alias.
    #[serde(alias = "pool_id")]
    pub clan_id: Option<i64>,
}

/// Notification delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DispatchStatsDto {
    /// Admissions accepted by the queue.
    pub enqueued: u64,
    /// Admissions dropped because the queue was full or closed.
    pub dropped: u64,
    /// Channel deliveries that succeeded.
    pub delivered: u64,
    /// Channel deliveries that failed.
    pub failed: u64,
}

impl From<DispatchSnapshot> for DispatchStatsDto {
    fn from(s: DispatchSnapshot) -> Self {
        Self {
            enqueued: s.enqueued,
            dropped: s.dropped,
            delivered: s.delivered,
            failed: s.failed,
        }
    }
}
