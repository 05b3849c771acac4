//! Registration request and response bodies.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Admission, AdmissionOutcome, ParticipantProfile};
use crate::error::GatewayError;

/// Message returned with a successful admission.
pub const ADMITTED_MESSAGE: &str = "Registration successful!";
/// Message returned when every pool is full.
pub const CAPACITY_EXHAUSTED_MESSAGE: &str =
    "All cohorts are currently full. Please join the waitlist.";
/// Message returned when a contact identifier is already registered.
pub const DUPLICATE_MESSAGE: &str = "This email or phone number is already registered.";

/// Request body for `POST /api/register`.
///
/// Every field defaults to empty so that missing values are reported by
/// [`RegistrationRequest::into_profile`] as a validation error.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct RegistrationRequest {
    /// Full name (required).
    pub full_name: String,
    /// Email address (required, unique).
    pub email: String,
    /// WhatsApp number (required, unique).
    pub whatsapp_number: String,
    /// Gender.
    pub gender: String,
    /// Country of residence.
    pub country: String,
    /// State or region.
    pub state: String,
    /// Age bracket.
    pub age_group: String,
    /// Religion.
    pub religion: String,
    /// Church name, if any.
    pub church_name: Option<String>,
    /// Instagram handle.
    pub instagram_handle: String,
    /// Relationship status.
    pub relationship_status: String,
}

impl RegistrationRequest {
    /// Validates the request and converts it into a profile.
    ///
    /// Trims every field, lowercases the email and turns a blank church
    /// name into `None`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] if `full_name`, `email` or
    /// `whatsapp_number` is blank, or if `email` has no `@`.
    pub fn into_profile(self) -> Result<ParticipantProfile, GatewayError> {
        let full_name = required("full_name", &self.full_name)?;
        let email = required("email", &self.email)?.to_lowercase();
        let whatsapp_number = required("whatsapp_number", &self.whatsapp_number)?;
        if !email.contains('@') {
            return Err(GatewayError::InvalidRequest(
                "email is not a valid address".to_string(),
            ));
        }

        Ok(ParticipantProfile {
            full_name,
            email,
            whatsapp_number,
            gender: self.gender.trim().to_string(),
            country: self.country.trim().to_string(),
            state: self.state.trim().to_string(),
            age_group: self.age_group.trim().to_string(),
            religion: self.religion.trim().to_string(),
            church_name: self
                .church_name
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            instagram_handle: self.instagram_handle.trim().to_string(),
            relationship_status: self.relationship_status.trim().to_string(),
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, GatewayError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::InvalidRequest(format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Response body for `POST /api/register` (201 and 409).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RegistrationResponse {
    /// `true` only when the participant was admitted.
    pub success: bool,
    /// Outcome discriminator: `admitted`, `capacity_exhausted` or
    /// `duplicate_registration`.
    pub outcome: String,
    /// Human-readable message.
    pub message: String,
    /// Id of the new participant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<uuid::Uuid>,
    /// Name of the assigned cohort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clan_name: Option<String>,
    /// Group chat link of the assigned cohort.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub whatsapp_link: Option<String>,
}

impl RegistrationResponse {
    /// Response for a committed admission.
    #[must_use]
    pub fn admitted(admission: &Admission) -> Self {
        Self {
            success: true,
            outcome: "admitted".to_string(),
            message: ADMITTED_MESSAGE.to_string(),
            participant_id: Some(*admission.participant_id.as_uuid()),
            clan_name: Some(admission.pool_name.clone()),
            whatsapp_link: Some(admission.contact_link.clone()),
        }
    }

    /// Response for a structured rejection.
    fn rejected(outcome: &AdmissionOutcome, message: &str) -> Self {
        Self {
            success: false,
            outcome: outcome.as_str().to_string(),
            message: message.to_string(),
            participant_id: None,
            clan_name: None,
            whatsapp_link: None,
        }
    }

    /// Maps an outcome to its response body.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::TransientFailure`] for
    /// [`AdmissionOutcome::TransientFailure`], which is rendered as an
    /// error response instead.
    pub fn from_outcome(outcome: &AdmissionOutcome) -> Result<Self, GatewayError> {
        match outcome {
            AdmissionOutcome::Admitted(admission) => Ok(Self::admitted(admission)),
            AdmissionOutcome::CapacityExhausted => {
                Ok(Self::rejected(outcome, CAPACITY_EXHAUSTED_MESSAGE))
            }
            AdmissionOutcome::DuplicateRegistration => {
                Ok(Self::rejected(outcome, DUPLICATE_MESSAGE))
            }
            AdmissionOutcome::TransientFailure => Err(GatewayError::TransientFailure),
        }
    }
}
