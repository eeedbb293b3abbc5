//! Acting-user resolution.
//!
//! # Purpose
//! Authentication is owned by the upstream gateway, which forwards the
//! authenticated user's id in `x-user-id`. Handlers resolve it to a [`User`]
//! and check the role they need.
//!
//! # Security considerations
//! - The header is trusted; the service must not be exposed without the
//!   gateway in front of it.
//! - Disabled users are rejected even when the header is valid.
use crate::api::error::{ApiError, api_forbidden, api_internal, api_unauthorized};
use crate::app::AppState;
use crate::model::User;
use crate::store::StoreError;
use assetdesk_common::ids::UserId;
use axum::http::HeaderMap;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Resolve the acting user from the identity header.
///
/// # Errors
/// - 401 when the header is missing or malformed, or names an unknown or
///   disabled user.
/// - 500 when the store fails.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| api_unauthorized("missing x-user-id header"))?;
    let user_id: UserId = raw
        .to_str()
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .ok_or_else(|| api_unauthorized("invalid x-user-id header"))?;
    match state.store.get_user(user_id).await {
        Ok(user) if user.is_disabled => Err(api_unauthorized("user is disabled")),
        Ok(user) => Ok(user),
        Err(StoreError::NotFound(_)) => Err(api_unauthorized("unknown user")),
        Err(err) => Err(api_internal("failed to load acting user", &err)),
    }
}

/// Resolve the acting user and require the admin role.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<User, ApiError> {
    let user = authenticate(state, headers).await?;
    if !user.is_admin() {
        return Err(api_forbidden("admin role required"));
    }
    Ok(user)
}
