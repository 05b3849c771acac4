//! Registration handler.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};

use crate::api::dto::{RegistrationRequest, RegistrationResponse};
use crate::app_state::AppState;
use crate::domain::AdmissionOutcome;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /register`: Admit a participant into the first cohort with room.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a malformed body and
/// [`GatewayError::TransientFailure`] when the admission was rolled back.
#[utoipa::path(
    post,
    path = "/api/register",
    tag = "Registration",
    summary = "Register a participant",
    description = "Runs one admission attempt. The participant lands in the lowest-id cohort with a free slot. Confirmation email and spreadsheet sync happen afterwards and never affect the response.",
    request_body = RegistrationRequest,
    responses(
        (status = 201, description = "Participant admitted", body = RegistrationResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 409, description = "All cohorts full, or contact already registered", body = RegistrationResponse),
        (status = 503, description = "Admission rolled back; retry", body = ErrorResponse),
    )
)]
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegistrationRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let profile = req.into_profile()?;
    let outcome = state.registration.register(&profile).await;

    let status = match outcome {
        AdmissionOutcome::Admitted(_) => StatusCode::CREATED,
        _ => StatusCode::CONFLICT,
    };
    let body = RegistrationResponse::from_outcome(&outcome)?;

    Ok((status, Json(body)))
}

/// Registration routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/register", post(register))
}
