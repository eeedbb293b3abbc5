//! Maintenance endpoint for the username presence set.
use crate::api::error::{ApiError, api_from_sequence};
use crate::api::types::{ErrorResponse, ResyncResponse};
use crate::app::AppState;
use crate::auth::principal::require_admin;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

#[utoipa::path(
    get,
    path = "/sample/sync-redis",
    tag = "system",
    responses(
        (status = 200, description = "Presence set rebuilt from the store", body = ResyncResponse),
        (status = 503, description = "Identifier cache unavailable", body = ErrorResponse)
    )
)]
/// Rebuild the username presence set after a cache flush or data import.
pub(crate) async fn sync_redis(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ResyncResponse>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let usernames = state
        .generator
        .resync()
        .await
        .map_err(|err| api_from_sequence("failed to resync usernames", err))?;
    tracing::info!(admin_id = %admin.id, usernames, "username presence set resynced");
    Ok(Json(ResyncResponse { usernames }))
}
