//! Assignment API handlers.
//!
//! # Purpose
//! Admins create, edit and delete assignments of assets at their location;
//! assignees accept or decline them. Every state change goes through the store,
//! which checks the assignment state machine inside its unit of work.
use crate::api::error::{ApiError, api_forbidden, api_from_store, api_validation_error};
use crate::api::types::{AssignmentCreateRequest, AssignmentListResponse, ErrorResponse};
use crate::api::{
    ListParams, ensure_admin_or, ensure_same_location, parse_date, parse_enum_list, parse_id,
    today,
};
use crate::app::AppState;
use crate::auth::principal::{authenticate, require_admin};
use crate::lifecycle::AssignmentEvent;
use crate::model::{Assignment, AssignmentFilter, AssignmentPatch, AssignmentState, User};
use assetdesk_common::ids::{AssetId, AssignmentId, UserId};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use std::collections::HashMap;

const SORT_FIELDS: &[&str] = &["assigned_date", "state"];

/// Load an asset and check it sits at the admin's location.
async fn local_asset(state: &AppState, admin: &User, asset_id: AssetId) -> Result<(), ApiError> {
    let asset = state
        .store
        .get_asset(asset_id)
        .await
        .map_err(|err| api_from_store("failed to load asset", err))?;
    ensure_same_location(admin, &asset.location)
}

/// Load a user and check it sits at the admin's location.
async fn local_user(state: &AppState, admin: &User, user_id: UserId) -> Result<(), ApiError> {
    let user = state
        .store
        .get_user(user_id)
        .await
        .map_err(|err| api_from_store("failed to load user", err))?;
    ensure_same_location(admin, &user.location)
}

/// Load an assignment the actor may see: admins at the asset's location, or the assignee.
async fn visible_assignment(
    state: &AppState,
    actor: &User,
    raw_id: &str,
) -> Result<Assignment, ApiError> {
    let id: AssignmentId = parse_id(raw_id, "assignment")?;
    let assignment = state
        .store
        .get_assignment(id)
        .await
        .map_err(|err| api_from_store("failed to load assignment", err))?;
    if actor.is_admin() {
        local_asset(state, actor, assignment.asset_id).await?;
    } else {
        ensure_admin_or(actor, assignment.assigned_to == actor.id)?;
    }
    Ok(assignment)
}

fn ensure_not_past(date: chrono::NaiveDate) -> Result<(), ApiError> {
    if date < today() {
        return Err(api_validation_error(
            "assigned date must not be in the past",
        ));
    }
    Ok(())
}

#[utoipa::path(
    get,
    path = "/assignment",
    tag = "assignments",
    params(
        ("state" = Option<String>, Query, description = "Comma-separated states (admin only)"),
        ("assigned_date" = Option<String>, Query, description = "YYYY-MM-DD (admin only)"),
        ("search" = Option<String>, Query, description = "Substring of asset code or name"),
        ("sort" = Option<String>, Query, description = "assigned_date or state"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<usize>, Query, description = "1-based page"),
        ("page_size" = Option<usize>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Assignments visible to the acting user", body = AssignmentListResponse),
        (status = 400, description = "Invalid filter or sort field", body = ErrorResponse)
    )
)]
pub(crate) async fn list_assignments(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AssignmentListResponse>, ApiError> {
    let actor = authenticate(&state, &headers).await?;
    let list = ListParams::from_query(&params)?;
    let sort = list.sort_field(SORT_FIELDS)?;
    let filter = if actor.is_admin() {
        AssignmentFilter {
            location: Some(actor.location.clone()),
            assigned_to: None,
            states: parse_enum_list(&params, "state")?,
            assigned_date: parse_date(&params, "assigned_date")?,
            search: list.search.clone(),
        }
    } else {
        AssignmentFilter {
            location: None,
            assigned_to: Some(actor.id),
            states: vec![
                AssignmentState::WaitingForAcceptance,
                AssignmentState::Accepted,
            ],
            assigned_date: None,
            search: list.search.clone(),
        }
    };
    let mut items = state
        .store
        .list_assignments(&filter)
        .await
        .map_err(|err| api_from_store("failed to list assignments", err))?;
    if !actor.is_admin() {
        let today = today();
        items.retain(|assignment| assignment.assigned_date <= today);
    }
    match sort {
        "state" => items.sort_by_key(|a| (a.state as u8, a.assigned_date)),
        _ => items.sort_by_key(|a| a.assigned_date),
    }
    let (items, total) = list.paginate(items);
    Ok(Json(AssignmentListResponse {
        items,
        total,
        page: list.page,
        page_size: list.page_size,
    }))
}

#[utoipa::path(
    post,
    path = "/assignment",
    tag = "assignments",
    request_body = AssignmentCreateRequest,
    responses(
        (status = 201, description = "Assignment created; the asset is reserved", body = Assignment),
        (status = 400, description = "Asset unavailable, assignee disabled or date in the past", body = ErrorResponse),
        (status = 404, description = "Asset or user not found", body = ErrorResponse)
    )
)]
pub(crate) async fn create_assignment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AssignmentCreateRequest>,
) -> Result<(StatusCode, Json<Assignment>), ApiError> {
    let admin = require_admin(&state, &headers).await?;
    ensure_not_past(body.assigned_date)?;
    local_asset(&state, &admin, body.asset_id).await?;
    local_user(&state, &admin, body.assigned_to).await?;
    let assignment = state
        .store
        .create_assignment(Assignment {
            id: AssignmentId::new(),
            asset_id: body.asset_id,
            assigned_to: body.assigned_to,
            assigned_by: admin.id,
            assigned_date: body.assigned_date,
            note: body.note.trim().to_string(),
            state: AssignmentState::WaitingForAcceptance,
            is_deleted: false,
        })
        .await
        .map_err(|err| api_from_store("failed to create assignment", err))?;
    tracing::info!(
        assignment_id = %assignment.id,
        asset_id = %assignment.asset_id,
        assigned_to = %assignment.assigned_to,
        "assignment created"
    );
    Ok((StatusCode::CREATED, Json(assignment)))
}

#[utoipa::path(
    get,
    path = "/assignment/{id}",
    tag = "assignments",
    params(("id" = String, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Assignment", body = Assignment),
        (status = 403, description = "Not the assignee", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_assignment(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Assignment>, ApiError> {
    let actor = authenticate(&state, &headers).await?;
    visible_assignment(&state, &actor, &id).await.map(Json)
}

#[utoipa::path(
    put,
    path = "/assignment/{id}",
    tag = "assignments",
    params(("id" = String, Path, description = "Assignment id")),
    request_body = AssignmentPatch,
    responses(
        (status = 200, description = "Updated assignment", body = Assignment),
        (status = 400, description = "Assignment no longer waiting, or replacement unavailable", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
pub(crate) async fn edit_assignment(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(patch): Json<AssignmentPatch>,
) -> Result<Json<Assignment>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let assignment = visible_assignment(&state, &admin, &id).await?;
    if let Some(date) = patch.assigned_date {
        ensure_not_past(date)?;
    }
    if let Some(asset_id) = patch.asset_id {
        local_asset(&state, &admin, asset_id).await?;
    }
    if let Some(user_id) = patch.assigned_to {
        local_user(&state, &admin, user_id).await?;
    }
    let assignment = state
        .store
        .edit_assignment(assignment.id, patch)
        .await
        .map_err(|err| api_from_store("failed to edit assignment", err))?;
    Ok(Json(assignment))
}

#[utoipa::path(
    delete,
    path = "/assignment/{id}",
    tag = "assignments",
    params(("id" = String, Path, description = "Assignment id")),
    responses(
        (status = 204, description = "Assignment deleted"),
        (status = 400, description = "Assignment is accepted or returned", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_assignment(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let assignment = visible_assignment(&state, &admin, &id).await?;
    state
        .store
        .delete_assignment(assignment.id)
        .await
        .map_err(|err| api_from_store("failed to delete assignment", err))?;
    tracing::info!(assignment_id = %assignment.id, "assignment deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn respond(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
    event: AssignmentEvent,
) -> Result<Json<Assignment>, ApiError> {
    let actor = authenticate(state, headers).await?;
    let id: AssignmentId = parse_id(raw_id, "assignment")?;
    let assignment = state
        .store
        .get_assignment(id)
        .await
        .map_err(|err| api_from_store("failed to load assignment", err))?;
    if assignment.assigned_to != actor.id {
        return Err(api_forbidden("only the assignee can respond"));
    }
    let assignment = state
        .store
        .respond_to_assignment(id, event)
        .await
        .map_err(|err| api_from_store("failed to respond to assignment", err))?;
    tracing::info!(
        assignment_id = %assignment.id,
        state = ?assignment.state,
        "assignment answered"
    );
    Ok(Json(assignment))
}

#[utoipa::path(
    post,
    path = "/assignment/{id}/accept",
    tag = "assignments",
    params(("id" = String, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Accepted assignment", body = Assignment),
        (status = 400, description = "Assignment is not waiting for acceptance", body = ErrorResponse),
        (status = 403, description = "Not the assignee", body = ErrorResponse)
    )
)]
pub(crate) async fn accept_assignment(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Assignment>, ApiError> {
    respond(&state, &headers, &id, AssignmentEvent::Accept).await
}

#[utoipa::path(
    post,
    path = "/assignment/{id}/decline",
    tag = "assignments",
    params(("id" = String, Path, description = "Assignment id")),
    responses(
        (status = 200, description = "Declined assignment; the asset is released", body = Assignment),
        (status = 400, description = "Assignment is not waiting for acceptance", body = ErrorResponse),
        (status = 403, description = "Not the assignee", body = ErrorResponse)
    )
)]
pub(crate) async fn decline_assignment(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Assignment>, ApiError> {
    respond(&state, &headers, &id, AssignmentEvent::Decline).await
}
