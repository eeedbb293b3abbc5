//! User API handlers.
//!
//! # Purpose
//! CRUD over users at the acting admin's location. Creating a user issues the
//! staff code and username through the identifier generator and sets the
//! initial password to `username@ddMMyyyy` of the date of birth.
//!
//! # Key invariants
//! - Users are at least 18 at creation and joined no earlier than their 18th
//!   birthday, on a weekday.
//! - Disabling is rejected while the user holds a waiting or accepted assignment.
use crate::api::error::{
    ApiError, api_from_sequence, api_from_store, api_hash_failure, api_validation_error,
};
use crate::api::types::{ErrorResponse, UserCreateRequest, UserListResponse};
use crate::api::{ListParams, ensure_same_location, parse_enum_list, parse_id, today};
use crate::app::AppState;
use crate::auth::password::hash_password;
use crate::auth::principal::require_admin;
use crate::model::{User, UserFilter, UserPatch};
use crate::sequence::naming::initial_password;
use assetdesk_common::ids::UserId;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::{Datelike, Months, NaiveDate, Weekday};
use std::collections::HashMap;

const SORT_FIELDS: &[&str] = &["staff_code", "full_name", "username", "joined_date", "role"];
const ADULT_AGE_MONTHS: u32 = 18 * 12;

fn eighteenth_birthday(date_of_birth: NaiveDate) -> Result<NaiveDate, ApiError> {
    date_of_birth
        .checked_add_months(Months::new(ADULT_AGE_MONTHS))
        .ok_or_else(|| api_validation_error("date of birth out of range"))
}

/// Check the date rules shared by create and update.
fn validate_dates(
    date_of_birth: NaiveDate,
    joined_date: NaiveDate,
    today: NaiveDate,
) -> Result<(), ApiError> {
    let adult_on = eighteenth_birthday(date_of_birth)?;
    if adult_on > today {
        return Err(api_validation_error("user must be at least 18 years old"));
    }
    if joined_date < adult_on {
        return Err(api_validation_error(
            "joined date must not precede the 18th birthday",
        ));
    }
    if matches!(joined_date.weekday(), Weekday::Sat | Weekday::Sun) {
        return Err(api_validation_error(
            "joined date must not fall on a weekend",
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/user-management",
    tag = "users",
    params(
        ("role" = Option<String>, Query, description = "Comma-separated roles"),
        ("search" = Option<String>, Query, description = "Substring of staff code, username or full name"),
        ("sort" = Option<String>, Query, description = "staff_code, full_name, username, joined_date or role"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<usize>, Query, description = "1-based page"),
        ("page_size" = Option<usize>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Enabled users at the admin's location", body = UserListResponse),
        (status = 400, description = "Invalid filter or sort field", body = ErrorResponse)
    )
)]
pub(crate) async fn list_users(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserListResponse>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let list = ListParams::from_query(&params)?;
    let sort = list.sort_field(SORT_FIELDS)?;
    let filter = UserFilter {
        location: admin.location.clone(),
        roles: parse_enum_list(&params, "role")?,
        search: list.search.clone(),
    };
    let mut items = state
        .store
        .list_users(&filter)
        .await
        .map_err(|err| api_from_store("failed to list users", err))?;
    match sort {
        "full_name" => items.sort_by_key(|user| (user.full_name().to_lowercase(), user.staff_code.clone())),
        "username" => items.sort_by(|a, b| a.username.cmp(&b.username)),
        "joined_date" => items.sort_by_key(|user| (user.joined_date, user.staff_code.clone())),
        "role" => items.sort_by_key(|user| (user.role as u8, user.staff_code.clone())),
        _ => items.sort_by(|a, b| a.staff_code.cmp(&b.staff_code)),
    }
    let (items, total) = list.paginate(items);
    Ok(Json(UserListResponse {
        items,
        total,
        page: list.page,
        page_size: list.page_size,
    }))
}

#[utoipa::path(
    post,
    path = "/user-management",
    tag = "users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created with generated staff code and username", body = User),
        (status = 400, description = "Invalid user", body = ErrorResponse),
        (status = 409, description = "Staff code space exhausted", body = ErrorResponse),
        (status = 503, description = "Identifier cache unavailable", body = ErrorResponse)
    )
)]
pub(crate) async fn create_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<UserCreateRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let first_name = body.first_name.trim();
    let last_name = body.last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(api_validation_error("first and last name are required"));
    }
    validate_dates(body.date_of_birth, body.joined_date, today())?;

    let staff_code = state
        .generator
        .next_staff_code()
        .await
        .map_err(|err| api_from_sequence("failed to issue staff code", err))?;
    let username = state
        .generator
        .next_username(first_name, last_name)
        .await
        .map_err(|err| api_from_sequence("failed to issue username", err))?;
    let password_hash = hash_password(&initial_password(&username, body.date_of_birth))
        .map_err(|err| api_hash_failure(&err))?;
    let user = state
        .store
        .create_user(User {
            id: UserId::new(),
            staff_code,
            username,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            date_of_birth: body.date_of_birth,
            joined_date: body.joined_date,
            gender: body.gender,
            role: body.role,
            location: admin.location,
            password_hash,
            is_first_login: true,
            is_disabled: false,
        })
        .await
        .map_err(|err| api_from_store("failed to create user", err))?;
    tracing::info!(
        user_id = %user.id,
        staff_code = %user.staff_code,
        username = %user.username,
        "user created"
    );
    Ok((StatusCode::CREATED, Json(user)))
}

async fn load_local_user(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
) -> Result<(User, User), ApiError> {
    let admin = require_admin(state, headers).await?;
    let id: UserId = parse_id(raw_id, "user")?;
    let user = state
        .store
        .get_user(id)
        .await
        .map_err(|err| api_from_store("failed to load user", err))?;
    ensure_same_location(&admin, &user.location)?;
    Ok((admin, user))
}

#[utoipa::path(
    get,
    path = "/user-management/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "User not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let (_, user) = load_local_user(&state, &headers, &id).await?;
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/user-management/{id}",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    request_body = UserPatch,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 400, description = "Invalid dates", body = ErrorResponse),
        (status = 404, description = "User not found or disabled", body = ErrorResponse)
    )
)]
pub(crate) async fn update_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<UserPatch>,
) -> Result<Json<User>, ApiError> {
    let (_, user) = load_local_user(&state, &headers, &id).await?;
    validate_dates(
        patch.date_of_birth.unwrap_or(user.date_of_birth),
        patch.joined_date.unwrap_or(user.joined_date),
        today(),
    )?;
    let user = state
        .store
        .update_user(user.id, patch)
        .await
        .map_err(|err| api_from_store("failed to update user", err))?;
    Ok(Json(user))
}

#[utoipa::path(
    post,
    path = "/user-management/{id}/disable",
    tag = "users",
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Disabled user", body = User),
        (status = 400, description = "User still holds assignments", body = ErrorResponse),
        (status = 404, description = "User not found or already disabled", body = ErrorResponse)
    )
)]
pub(crate) async fn disable_user(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<User>, ApiError> {
    let (admin, user) = load_local_user(&state, &headers, &id).await?;
    if admin.id == user.id {
        return Err(api_validation_error("cannot disable your own account"));
    }
    let user = state
        .store
        .disable_user(user.id)
        .await
        .map_err(|err| api_from_store("failed to disable user", err))?;
    tracing::info!(user_id = %user.id, "user disabled");
    Ok(Json(user))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    #[test]
    fn users_must_be_adults() {
        let today = date(2024, 6, 3);
        assert!(validate_dates(date(2006, 6, 3), date(2024, 6, 3), today).is_ok());
        let err = validate_dates(date(2006, 6, 4), date(2024, 6, 4), today).expect_err("17");
        assert!(err.body.message.contains("18"));
    }

    #[test]
    fn joined_date_follows_eighteenth_birthday() {
        let today = date(2024, 6, 3);
        // 2018-06-01 is a Friday, one day short of the 18th birthday.
        let err = validate_dates(date(2000, 6, 2), date(2018, 6, 1), today).expect_err("early");
        assert!(err.body.message.contains("18th birthday"));
    }

    #[test]
    fn joined_date_is_a_weekday() {
        let today = date(2024, 6, 3);
        // 2024-06-01 is a Saturday.
        let err = validate_dates(date(1990, 1, 1), date(2024, 6, 1), today).expect_err("weekend");
        assert!(err.body.message.contains("weekend"));
        assert!(validate_dates(date(1990, 1, 1), date(2024, 5, 31), today).is_ok());
    }
}
