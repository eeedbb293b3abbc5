//! Category API handlers.
//!
//! Categories own the asset code prefix, so names and prefixes are both unique
//! and a prefix may not extend another one.
use crate::api::error::{ApiError, api_from_store, api_internal, api_validation_error};
use crate::api::types::{CategoryCreateRequest, CategoryListResponse, ErrorResponse};
use crate::app::AppState;
use crate::auth::principal::require_admin;
use crate::model::Category;
use assetdesk_common::ids::CategoryId;
use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};

const MAX_PREFIX_LEN: usize = 8;

fn validate_category(body: &CategoryCreateRequest) -> Result<(String, String), ApiError> {
    let name = body.name.trim();
    if name.is_empty() {
        return Err(api_validation_error("category name must not be empty"));
    }
    let prefix = body.prefix.trim().to_ascii_uppercase();
    if prefix.len() < 2
        || prefix.len() > MAX_PREFIX_LEN
        || !prefix.chars().all(|c| c.is_ascii_uppercase())
    {
        return Err(api_validation_error(
            "category prefix must be 2 to 8 ASCII letters",
        ));
    }
    Ok((name.to_string(), prefix))
}

#[utoipa::path(
    get,
    path = "/category",
    tag = "categories",
    responses(
        (status = 200, description = "All categories", body = CategoryListResponse),
        (status = 401, description = "Unknown acting user", body = ErrorResponse)
    )
)]
pub(crate) async fn list_categories(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<CategoryListResponse>, ApiError> {
    require_admin(&state, &headers).await?;
    let items = state
        .store
        .list_categories()
        .await
        .map_err(|err| api_internal("failed to list categories", &err))?;
    Ok(Json(CategoryListResponse { items }))
}

#[utoipa::path(
    post,
    path = "/category",
    tag = "categories",
    request_body = CategoryCreateRequest,
    responses(
        (status = 201, description = "Category created", body = Category),
        (status = 400, description = "Invalid or duplicate category", body = ErrorResponse)
    )
)]
pub(crate) async fn create_category(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<CategoryCreateRequest>,
) -> Result<(StatusCode, Json<Category>), ApiError> {
    require_admin(&state, &headers).await?;
    let (name, prefix) = validate_category(&body)?;
    let category = state
        .store
        .create_category(Category {
            id: CategoryId::new(),
            name,
            prefix,
        })
        .await
        .map_err(|err| api_from_store("failed to create category", err))?;
    tracing::info!(category_id = %category.id, prefix = %category.prefix, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}
