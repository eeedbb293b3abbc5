//! System/health API handlers.
//!
//! # Purpose and responsibility
//! Lightweight endpoints for service metadata and health checks, used by
//! probes and operators. Neither requires the identity header.
//!
//! # Key invariants and assumptions
//! - Health checks are fast and side-effect free.
//! - System info is derived from in-memory state.
use crate::api::error::{ApiError, api_cache_unavailable, api_internal};
use crate::api::types::{ErrorResponse, HealthStatus, SystemInfo};
use crate::app::AppState;
use axum::Json;
use axum::extract::State;

#[utoipa::path(
    get,
    path = "/system/info",
    tag = "system",
    responses(
        (status = 200, description = "Service identity and backends", body = SystemInfo)
    )
)]
/// Return API version and the configured backends.
pub(crate) async fn system_info(State(state): State<AppState>) -> Json<SystemInfo> {
    Json(SystemInfo {
        api_version: state.api_version.clone(),
        storage_backend: state.store.backend_name().to_string(),
        cache_backend: state.cache.backend_name().to_string(),
        durable_storage: state.store.is_durable(),
    })
}

#[utoipa::path(
    get,
    path = "/system/health",
    tag = "system",
    responses(
        (status = 200, description = "Store and cache reachable", body = HealthStatus),
        (status = 500, description = "Store unavailable", body = ErrorResponse),
        (status = 503, description = "Cache unavailable", body = ErrorResponse)
    )
)]
/// Probe the store and the cache.
///
/// # Errors
/// - 500 if the store health check fails.
/// - 503 if the cache does not answer a ping.
pub(crate) async fn system_health(
    State(state): State<AppState>,
) -> Result<Json<HealthStatus>, ApiError> {
    if let Err(err) = state.store.health_check().await {
        return Err(api_internal("storage unavailable", &err));
    }
    if let Err(err) = state.cache.ping().await {
        return Err(api_cache_unavailable(&err));
    }
    Ok(Json(HealthStatus {
        status: "ok".to_string(),
    }))
}
