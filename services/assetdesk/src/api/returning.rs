//! Returning-request API handlers.
//!
//! # Purpose
//! Lets an assignee (or an admin on their behalf) ask for an accepted asset to
//! be taken back, and lets admins cancel or complete those requests.
//!
//! # Key invariants
//! - At most one active request per assignment; a second one is 400
//!   `active_returning_request`.
//! - Completion returns the assignment and frees the asset in the same unit of
//!   work as the request update.
use crate::api::error::{ApiError, api_from_store};
use crate::api::types::{ErrorResponse, ReturningCreateRequest, ReturningListResponse};
use crate::api::{
    ListParams, ensure_admin_or, ensure_same_location, parse_date, parse_enum_list, parse_id,
    today,
};
use crate::app::AppState;
use crate::auth::principal::{authenticate, require_admin};
use crate::model::{Assignment, ReturningFilter, ReturningRequest, ReturningState, User};
use assetdesk_common::ids::{AssignmentId, ReturningRequestId};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use chrono::Utc;
use std::collections::HashMap;

const SORT_FIELDS: &[&str] = &["created_at", "returned_date", "state"];

/// Check that the assignment's asset sits at the admin's location.
async fn ensure_local_assignment(
    state: &AppState,
    admin: &User,
    assignment: &Assignment,
) -> Result<(), ApiError> {
    let asset = state
        .store
        .get_asset(assignment.asset_id)
        .await
        .map_err(|err| api_from_store("failed to load asset", err))?;
    ensure_same_location(admin, &asset.location)
}

async fn local_request(
    state: &AppState,
    admin: &User,
    raw_id: &str,
) -> Result<ReturningRequest, ApiError> {
    let id: ReturningRequestId = parse_id(raw_id, "returning request")?;
    let request = state
        .store
        .get_returning_request(id)
        .await
        .map_err(|err| api_from_store("failed to load returning request", err))?;
    let assignment = state
        .store
        .get_assignment(request.assignment_id)
        .await
        .map_err(|err| api_from_store("failed to load assignment", err))?;
    ensure_local_assignment(state, admin, &assignment).await?;
    Ok(request)
}

#[utoipa::path(
    get,
    path = "/returning-request",
    tag = "returning",
    params(
        ("state" = Option<String>, Query, description = "Comma-separated request states"),
        ("returned_date" = Option<String>, Query, description = "YYYY-MM-DD"),
        ("search" = Option<String>, Query, description = "Substring of asset code or name"),
        ("sort" = Option<String>, Query, description = "created_at, returned_date or state"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<usize>, Query, description = "1-based page"),
        ("page_size" = Option<usize>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Returning requests at the admin's location", body = ReturningListResponse),
        (status = 400, description = "Invalid filter or sort field", body = ErrorResponse)
    )
)]
pub(crate) async fn list_returning_requests(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReturningListResponse>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let list = ListParams::from_query(&params)?;
    let sort = list.sort_field(SORT_FIELDS)?;
    let filter = ReturningFilter {
        location: admin.location.clone(),
        states: parse_enum_list(&params, "state")?,
        returned_date: parse_date(&params, "returned_date")?,
        search: list.search.clone(),
    };
    let mut items = state
        .store
        .list_returning_requests(&filter)
        .await
        .map_err(|err| api_from_store("failed to list returning requests", err))?;
    match sort {
        "returned_date" => items.sort_by_key(|r| (r.returned_date, r.created_at)),
        "state" => items.sort_by_key(|r| (r.state as u8, r.created_at)),
        _ => items.sort_by_key(|r| r.created_at),
    }
    let (items, total) = list.paginate(items);
    Ok(Json(ReturningListResponse {
        items,
        total,
        page: list.page,
        page_size: list.page_size,
    }))
}

#[utoipa::path(
    post,
    path = "/returning-request",
    tag = "returning",
    request_body = ReturningCreateRequest,
    responses(
        (status = 201, description = "Returning request created", body = ReturningRequest),
        (status = 400, description = "Assignment not accepted or already has an active request", body = ErrorResponse),
        (status = 403, description = "Neither the assignee nor an admin", body = ErrorResponse),
        (status = 404, description = "Assignment not found", body = ErrorResponse)
    )
)]
pub(crate) async fn create_returning_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<ReturningCreateRequest>,
) -> Result<(StatusCode, Json<ReturningRequest>), ApiError> {
    let actor = authenticate(&state, &headers).await?;
    let assignment = state
        .store
        .get_assignment(body.assignment_id)
        .await
        .map_err(|err| api_from_store("failed to load assignment", err))?;
    if actor.is_admin() {
        ensure_local_assignment(&state, &actor, &assignment).await?;
    } else {
        ensure_admin_or(&actor, assignment.assigned_to == actor.id)?;
    }
    let request = state
        .store
        .create_returning_request(new_request(assignment.id, &actor))
        .await
        .map_err(|err| api_from_store("failed to create returning request", err))?;
    tracing::info!(
        request_id = %request.id,
        assignment_id = %request.assignment_id,
        "returning request created"
    );
    Ok((StatusCode::CREATED, Json(request)))
}

fn new_request(assignment_id: AssignmentId, actor: &User) -> ReturningRequest {
    ReturningRequest {
        id: ReturningRequestId::new(),
        assignment_id,
        requested_by: actor.id,
        accepted_by: None,
        returned_date: None,
        state: ReturningState::WaitingForReturning,
        is_deleted: false,
        created_at: Utc::now(),
    }
}

#[utoipa::path(
    delete,
    path = "/returning-request/{id}",
    tag = "returning",
    params(("id" = String, Path, description = "Returning request id")),
    responses(
        (status = 204, description = "Returning request cancelled"),
        (status = 400, description = "Request is no longer waiting", body = ErrorResponse),
        (status = 404, description = "Returning request not found", body = ErrorResponse)
    )
)]
pub(crate) async fn cancel_returning_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let request = local_request(&state, &admin, &id).await?;
    state
        .store
        .cancel_returning_request(request.id)
        .await
        .map_err(|err| api_from_store("failed to cancel returning request", err))?;
    tracing::info!(request_id = %request.id, "returning request cancelled");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/returning-request/{id}/complete",
    tag = "returning",
    params(("id" = String, Path, description = "Returning request id")),
    responses(
        (status = 200, description = "Completed request; assignment returned and asset available", body = ReturningRequest),
        (status = 400, description = "Request is no longer waiting", body = ErrorResponse),
        (status = 404, description = "Returning request not found", body = ErrorResponse)
    )
)]
pub(crate) async fn complete_returning_request(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReturningRequest>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let request = local_request(&state, &admin, &id).await?;
    let request = state
        .store
        .complete_returning_request(request.id, admin.id, today())
        .await
        .map_err(|err| api_from_store("failed to complete returning request", err))?;
    tracing::info!(request_id = %request.id, "returning request completed");
    Ok(Json(request))
}
