//! REST API layer: route handlers, DTOs, and router composition.
//!
//! Registration and admin endpoints are mounted under `/api`; `/health`
//! and the OpenAPI document live at the root.

pub mod dto;
pub mod handlers;

use std::time::Duration;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// Path of the generated OpenAPI document.
pub const OPENAPI_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "cohort-gateway",
        description = "Capacity-bounded cohort registration with race-free admission."
    ),
    paths(
        handlers::register::register,
        handlers::admin::stats,
        handlers::admin::participants,
        handlers::admin::dispatch,
        handlers::system::health_handler,
    ),
    components(schemas(
        dto::RegistrationRequest,
        dto::RegistrationResponse,
        dto::PoolStatDto,
        dto::ParticipantDto,
        dto::DispatchStatsDto,
        handlers::system::HealthResponse,
        crate::error::ErrorResponse,
        crate::error::ErrorBody,
    )),
    tags(
        (name = "Registration", description = "Participant admission"),
        (name = "Admin", description = "Dashboard reads, guarded by X-Admin-Secret"),
        (name = "System", description = "Health"),
    )
)]
pub struct ApiDoc;

/// Builds the API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api", handlers::routes())
        .merge(handlers::system::routes())
        .merge(docs_router())
}

/// Builds the complete application: routes, middleware and state.
pub fn build_app(state: AppState, request_timeout: Duration) -> Router {
    build_router()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[cfg(feature = "swagger-ui")]
fn docs_router() -> Router<AppState> {
    let swagger =
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui").url(OPENAPI_PATH, ApiDoc::openapi());
    Router::new().merge(swagger)
}

#[cfg(not(feature = "swagger-ui"))]
fn docs_router() -> Router<AppState> {
    use axum::Json;
    use axum::routing::get;

    Router::new().route(OPENAPI_PATH, get(|| async { Json(ApiDoc::openapi()) }))
}
