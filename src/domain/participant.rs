//! Participant identity and profile.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PoolId;

/// Store-assigned participant identifier (UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(uuid::Uuid);

impl ParticipantId {
    /// Creates a new random `ParticipantId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `ParticipantId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ParticipantId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything needed to create a participant row.
///
/// Opaque to the admission core apart from the two contact identifiers,
/// `email` and `whatsapp_number`, each of which is unique across all
/// participants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantProfile {
    /// Full legal or preferred name.
    pub full_name: String,
    /// Email address; unique contact identifier.
    pub email: String,
    /// WhatsApp phone number; unique contact identifier.
    pub whatsapp_number: String,
    /// Self-reported gender.
    pub gender: String,
    /// Country of residence.
    pub country: String,
    /// State or region of residence.
    pub state: String,
    /// Age bracket (e.g. `"25-30"`).
    pub age_group: String,
    /// Religion.
    pub religion: String,
    /// Home church, when one was given.
    pub church_name: Option<String>,
    /// Instagram handle.
    pub instagram_handle: String,
    /// Relationship status.
    pub relationship_status: String,
}

/// A persisted participant bound to exactly one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Participant {
    /// Store-assigned identifier.
    pub id: ParticipantId,
    /// Profile fields captured at registration.
    #[serde(flatten)]
    pub profile: ParticipantProfile,
    /// Pool the participant was admitted into. Immutable.
    pub pool_id: PoolId,
    /// Commit timestamp of the admission.
    pub created_at: DateTime<Utc>,
}


#[cfg(test)]
mod tests {
    use super::fixtures::profile;
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        assert_ne!(ParticipantId::new(), ParticipantId::new());
    }

    #[test]
    fn participant_serializes_flat() {
        let participant = Participant {
            id: ParticipantId::new(),
            profile: profile(1),
            pool_id: PoolId::new(9),
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&participant).unwrap_or_default();
        assert_eq!(json.get("email").and_then(|v| v.as_str()), Some("participant1@example.com"));
        assert_eq!(json.get("pool_id").and_then(serde_json::Value::as_i64), Some(9));
    }
}
