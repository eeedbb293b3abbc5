//! Login and change-password endpoints.
//!
//! Failed logins are counted per username in the cache. The counter expires
//! `login_lockout_seconds` after the first failure; once it reaches
//! `max_login_attempts`, further attempts get 429 until it expires.
use crate::api::error::{
    ApiError, api_cache_unavailable, api_hash_failure, api_internal, api_too_many_requests,
    api_unauthorized, api_validation_error,
};
use crate::api::types::{ChangePasswordRequest, ErrorResponse, LoginRequest, LoginResponse};
use crate::app::AppState;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::principal::authenticate;
use crate::store::StoreError;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

fn attempts_key(username: &str) -> String {
    format!("login:failures:{username}")
}

async fn record_failure(state: &AppState, key: &str) -> Result<(), ApiError> {
    let failures = state
        .cache
        .incr(key, 1)
        .await
        .map_err(|err| api_cache_unavailable(&err))?;
    if failures == 1 {
        state
            .cache
            .expire(key, state.login.lockout_seconds)
            .await
            .map_err(|err| api_cache_unavailable(&err))?;
    }
    metrics::counter!("assetdesk_login_failures_total").increment(1);
    Ok(())
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated user", body = LoginResponse),
        (status = 401, description = "Invalid credentials or disabled user", body = ErrorResponse),
        (status = 429, description = "Too many failed attempts", body = ErrorResponse)
    )
)]
pub(crate) async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = body.username.trim().to_lowercase();
    let key = attempts_key(&username);
    let failures = state
        .cache
        .get(&key)
        .await
        .map_err(|err| api_cache_unavailable(&err))?
        .and_then(|value| value.parse::<u32>().ok())
        .unwrap_or(0);
    if failures >= state.login.max_attempts {
        tracing::warn!(%username, failures, "login locked out");
        return Err(api_too_many_requests(
            "too many failed login attempts, try again later",
        ));
    }

    let user = match state.store.find_user_by_username(&username).await {
        Ok(user) => Some(user),
        Err(StoreError::NotFound(_)) => None,
        Err(err) => return Err(api_internal("failed to load user", &err)),
    };
    let Some(user) = user.filter(|user| verify_password(&body.password, &user.password_hash))
    else {
        record_failure(&state, &key).await?;
        return Err(api_unauthorized("invalid username or password"));
    };
    if user.is_disabled {
        return Err(api_unauthorized("user is disabled"));
    }
    state
        .cache
        .delete(&key)
        .await
        .map_err(|err| api_cache_unavailable(&err))?;
    tracing::info!(user_id = %user.id, "user logged in");
    Ok(Json(LoginResponse {
        is_first_login: user.is_first_login,
        user,
    }))
}

#[utoipa::path(
    post,
    path = "/auth/change-password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Old password mismatch or invalid new password", body = ErrorResponse),
        (status = 401, description = "Unknown acting user", body = ErrorResponse)
    )
)]
pub(crate) async fn change_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;
    if !verify_password(&body.old_password, &user.password_hash) {
        return Err(api_validation_error("old password does not match"));
    }
    if body.new_password.trim().is_empty() {
        return Err(api_validation_error("new password must not be empty"));
    }
    if body.new_password == body.old_password {
        return Err(api_validation_error(
            "new password must differ from the old one",
        ));
    }
    let password_hash =
        hash_password(&body.new_password).map_err(|err| api_hash_failure(&err))?;
    state
        .store
        .set_password(user.id, password_hash)
        .await
        .map_err(|err| api_internal("failed to update password", &err))?;
    Ok(StatusCode::NO_CONTENT)
}
