//! Admission records and the caller-facing outcome taxonomy.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{ParticipantId, ParticipantProfile, PoolId};

/// Immutable record of a committed admission.
///
/// Produced only after the admission transaction commits, then shared
/// read-only with the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Admission {
    /// Identifier assigned to the new participant row.
    pub participant_id: ParticipantId,
    /// Pool the participant landed in.
    pub pool_id: PoolId,
    /// Pool name at admission time.
    pub pool_name: String,
    /// Pool contact link, passed through to notifications.
    pub contact_link: String,
    /// Profile as it was persisted.
    pub profile: ParticipantProfile,
    /// Time the admission committed.
    pub admitted_at: DateTime<Utc>,
}

/// Result of one admission attempt.
///
/// `CapacityExhausted` and `DuplicateRegistration` are expected outcomes,
/// not server errors. `TransientFailure` means the attempt was rolled back
/// and may be retried as a whole.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// The participant was persisted and the pool counter advanced.
    Admitted(Admission),
    /// No pool has room.
    CapacityExhausted,
    /// A participant with the same email or phone number already exists.
    DuplicateRegistration,
    /// Lock timeout, connection loss, or commit failure. Nothing persisted.
    TransientFailure,
}

impl AdmissionOutcome {
    /// Returns the outcome as a static `snake_case` label.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Admitted(_) => "admitted",
            Self::CapacityExhausted => "capacity_exhausted",
            Self::DuplicateRegistration => "duplicate_registration",
            Self::TransientFailure => "transient_failure",
        }
    }

    /// Returns the admission if the participant was admitted.
    #[must_use]
    pub const fn admission(&self) -> Option<&Admission> {
        match self {
            Self::Admitted(admission) => Some(admission),
            _ => None,
        }
    }

    /// Returns `true` for [`AdmissionOutcome::Admitted`].
    #[must_use]
    pub const fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::participant::fixtures::profile;

    #[test]
    fn labels_are_snake_case() {
        assert_eq!(AdmissionOutcome::CapacityExhausted.as_str(), "capacity_exhausted");
        assert_eq!(
            AdmissionOutcome::DuplicateRegistration.as_str(),
            "duplicate_registration"
        );
        assert_eq!(AdmissionOutcome::TransientFailure.as_str(), "transient_failure");
    }

    #[test]
    fn admission_accessor_only_for_admitted() {
        let admission = Admission {
            participant_id: ParticipantId::new(),
            pool_id: PoolId::new(1),
            pool_name: "Clan A".to_string(),
            contact_link: "https://chat.example/a".to_string(),
            profile: profile(1),
            admitted_at: Utc::now(),
        };
        let outcome = AdmissionOutcome::Admitted(admission.clone());
        assert!(outcome.is_admitted());
        assert_eq!(outcome.admission(), Some(&admission));
        assert_eq!(outcome.as_str(), "admitted");

        assert!(AdmissionOutcome::CapacityExhausted.admission().is_none());
    }
}
