//! Per-category asset report.
use crate::api::error::{ApiError, api_internal};
use crate::api::types::{ErrorResponse, ReportResponse};
use crate::app::AppState;
use crate::auth::principal::require_admin;
use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;

#[utoipa::path(
    get,
    path = "/report",
    tag = "report",
    responses(
        (status = 200, description = "Asset counts per category and state at the admin's location", body = ReportResponse),
        (status = 403, description = "Admin role required", body = ErrorResponse)
    )
)]
pub(crate) async fn category_report(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ReportResponse>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let items = state
        .store
        .category_report(&admin.location)
        .await
        .map_err(|err| api_internal("failed to build report", &err))?;
    Ok(Json(ReportResponse {
        location: admin.location.to_string(),
        items,
    }))
}
