//! Admin dashboard handlers, guarded by the `X-Admin-Secret` header.

use axum::extract::{FromRequestParts, Query, State};
use axum::http::request::Parts;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{DispatchStatsDto, ParticipantDto, ParticipantsQuery, PoolStatDto};
use crate::app_state::AppState;
use crate::domain::PoolId;
use crate::error::{ErrorResponse, GatewayError};

/// Header carrying the admin secret.
pub const ADMIN_SECRET_HEADER: &str = "x-admin-secret";

/// Extractor that rejects requests without the admin secret.
#[derive(Debug, Clone, Copy)]
pub struct AdminGuard;

impl FromRequestParts<AppState> for AdminGuard {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let provided = parts
            .headers
            .get(ADMIN_SECRET_HEADER)
            .and_then(|v| v.to_str().ok());
        if state.admin_secret.verify(provided) {
            Ok(Self)
        } else {
            tracing::warn!(path = %parts.uri.path(), "admin request rejected");
            Err(GatewayError::Unauthorized)
        }
    }
}

/// `GET /admin/stats`: Occupancy of every pool.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without the admin secret, or
/// [`GatewayError::PersistenceError`] if the store cannot be read.
#[utoipa::path(
    get,
    path = "/api/admin/stats",
    tag = "Admin",
    summary = "Cohort occupancy",
    description = "Returns every cohort ordered by id with its current and maximum size.",
    params(("X-Admin-Secret" = String, Header, description = "Admin secret")),
    responses(
        (status = 200, description = "Cohort occupancy", body = Vec<PoolStatDto>),
        (status = 401, description = "Missing or wrong admin secret", body = ErrorResponse),
    )
)]
pub async fn stats(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    let pools = state.registration.pool_stats().await?;
    let body: Vec<PoolStatDto> = pools.into_iter().map(PoolStatDto::from).collect();
    Ok(Json(body))
}

/// `GET /admin/participants?clan_id=N`: Roster of one pool.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] without `clan_id`,
/// [`GatewayError::PoolNotFound`] for an unknown pool, or
/// [`GatewayError::Unauthorized`] without the admin secret.
#[utoipa::path(
    get,
    path = "/api/admin/participants",
    tag = "Admin",
    summary = "Cohort roster",
    description = "Returns the participants of one cohort, newest first.",
    params(
        ("X-Admin-Secret" = String, Header, description = "Admin secret"),
        ParticipantsQuery,
    ),
    responses(
        (status = 200, description = "Roster", body = Vec<ParticipantDto>),
        (status = 400, description = "Missing clan_id", body = ErrorResponse),
        (status = 401, description = "Missing or wrong admin secret", body = ErrorResponse),
        (status = 404, description = "Unknown cohort", body = ErrorResponse),
    )
)]
pub async fn participants(
    _guard: AdminGuard,
    State(state): State<AppState>,
    Query(query): Query<ParticipantsQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let Some(clan_id) = query.clan_id else {
        return Err(GatewayError::InvalidRequest(
            "clan_id is required".to_string(),
        ));
    };
    let roster = state.registration.participants(PoolId::new(clan_id)).await?;
    let body: Vec<ParticipantDto> = roster.into_iter().map(ParticipantDto::from).collect();
    Ok(Json(body))
}

/// `GET /admin/dispatch`: Notification delivery counters.
///
/// # Errors
///
/// Returns [`GatewayError::Unauthorized`] without the admin secret.
#[utoipa::path(
    get,
    path = "/api/admin/dispatch",
    tag = "Admin",
    summary = "Notification counters",
    description = "Returns how many admissions were queued or dropped, and how many channel deliveries succeeded or failed.",
    params(("X-Admin-Secret" = String, Header, description = "Admin secret")),
    responses(
        (status = 200, description = "Dispatch counters", body = DispatchStatsDto),
        (status = 401, description = "Missing or wrong admin secret", body = ErrorResponse),
    )
)]
pub async fn dispatch(
    _guard: AdminGuard,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, GatewayError> {
    Ok(Json(DispatchStatsDto::from(
        state.registration.dispatch_stats(),
    )))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/stats", get(stats))
        .route("/admin/participants", get(participants))
        .route("/admin/dispatch", get(dispatch))
}
