//! Asset API handlers.
//!
//! # Purpose
//! CRUD over assets at the acting admin's location. Creating an asset issues
//! its code from the category prefix through the identifier generator.
//!
//! # Key invariants
//! - Assets at another location read as missing.
//! - `Assigned` is only ever set by the assignment flow, never by a request body.
use crate::api::error::{ApiError, api_from_sequence, api_from_store, api_validation_error};
use crate::api::types::{AssetCreateRequest, AssetListResponse, ErrorResponse};
use crate::api::{ListParams, ensure_same_location, parse_enum_list, parse_id};
use crate::app::AppState;
use crate::auth::principal::require_admin;
use crate::model::{Asset, AssetFilter, AssetPatch, AssetState};
use assetdesk_common::ids::{AssetId, CategoryId};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use std::collections::HashMap;

const SORT_FIELDS: &[&str] = &["code", "name", "category", "state"];

#[utoipa::path(
    get,
    path = "/asset-management",
    tag = "assets",
    params(
        ("state" = Option<String>, Query, description = "Comma-separated asset states"),
        ("category_id" = Option<String>, Query, description = "Category filter"),
        ("search" = Option<String>, Query, description = "Substring of code or name"),
        ("sort" = Option<String>, Query, description = "code, name, category or state"),
        ("order" = Option<String>, Query, description = "asc or desc"),
        ("page" = Option<usize>, Query, description = "1-based page"),
        ("page_size" = Option<usize>, Query, description = "Items per page")
    ),
    responses(
        (status = 200, description = "Assets at the admin's location", body = AssetListResponse),
        (status = 400, description = "Invalid filter or sort field", body = ErrorResponse)
    )
)]
pub(crate) async fn list_assets(
    Query(params): Query<HashMap<String, String>>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<AssetListResponse>, ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let list = ListParams::from_query(&params)?;
    let sort = list.sort_field(SORT_FIELDS)?;
    let filter = AssetFilter {
        location: admin.location.clone(),
        states: parse_enum_list(&params, "state")?,
        category_id: params
            .get("category_id")
            .map(|raw| parse_id::<CategoryId>(raw, "category"))
            .transpose()?,
        search: list.search.clone(),
    };
    let mut items = state
        .store
        .list_assets(&filter)
        .await
        .map_err(|err| api_from_store("failed to list assets", err))?;
    match sort {
        "name" => items.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.code.cmp(&b.code))),
        "category" => {
            let names: HashMap<CategoryId, String> = state
                .store
                .list_categories()
                .await
                .map_err(|err| api_from_store("failed to list categories", err))?
                .into_iter()
                .map(|category| (category.id, category.name))
                .collect();
            items.sort_by(|a, b| {
                names
                    .get(&a.category_id)
                    .cmp(&names.get(&b.category_id))
                    .then_with(|| a.code.cmp(&b.code))
            });
        }
        "state" => items.sort_by_key(|asset| (asset.state as u8, asset.code.clone())),
        _ => items.sort_by(|a, b| a.code.cmp(&b.code)),
    }
    let (items, total) = list.paginate(items);
    Ok(Json(AssetListResponse {
        items,
        total,
        page: list.page,
        page_size: list.page_size,
    }))
}

#[utoipa::path(
    post,
    path = "/asset-management",
    tag = "assets",
    request_body = AssetCreateRequest,
    responses(
        (status = 201, description = "Asset created with a generated code", body = Asset),
        (status = 400, description = "Invalid asset", body = ErrorResponse),
        (status = 404, description = "Unknown category", body = ErrorResponse),
        (status = 409, description = "Code space exhausted", body = ErrorResponse),
        (status = 503, description = "Identifier cache unavailable", body = ErrorResponse)
    )
)]
pub(crate) async fn create_asset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<AssetCreateRequest>,
) -> Result<(StatusCode, Json<Asset>), ApiError> {
    let admin = require_admin(&state, &headers).await?;
    let name = body.name.trim();
    if name.is_empty() {
        return Err(api_validation_error("asset name must not be empty"));
    }
    if !body.state.is_initial() {
        return Err(api_validation_error(
            "a new asset must be Available or NotAvailable",
        ));
    }
    let category = state
        .store
        .get_category(body.category_id)
        .await
        .map_err(|err| api_from_store("failed to load category", err))?;
    let code = state
        .generator
        .next_asset_code(&category.prefix)
        .await
        .map_err(|err| api_from_sequence("failed to issue asset code", err))?;
    let asset = state
        .store
        .create_asset(Asset {
            id: AssetId::new(),
            code,
            name: name.to_string(),
            category_id: category.id,
            specification: body.specification.trim().to_string(),
            installed_date: body.installed_date,
            state: body.state,
            location: admin.location,
            is_deleted: false,
        })
        .await
        .map_err(|err| api_from_store("failed to create asset", err))?;
    tracing::info!(asset_id = %asset.id, code = %asset.code, "asset created");
    Ok((StatusCode::CREATED, Json(asset)))
}

async fn load_local_asset(
    state: &AppState,
    headers: &HeaderMap,
    raw_id: &str,
) -> Result<Asset, ApiError> {
    let admin = require_admin(state, headers).await?;
    let id: AssetId = parse_id(raw_id, "asset")?;
    let asset = state
        .store
        .get_asset(id)
        .await
        .map_err(|err| api_from_store("failed to load asset", err))?;
    ensure_same_location(&admin, &asset.location)?;
    Ok(asset)
}

#[utoipa::path(
    get,
    path = "/asset-management/{id}",
    tag = "assets",
    params(("id" = String, Path, description = "Asset id")),
    responses(
        (status = 200, description = "Asset", body = Asset),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    )
)]
pub(crate) async fn get_asset(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Asset>, ApiError> {
    load_local_asset(&state, &headers, &id).await.map(Json)
}

#[utoipa::path(
    put,
    path = "/asset-management/{id}",
    tag = "assets",
    params(("id" = String, Path, description = "Asset id")),
    request_body = AssetPatch,
    responses(
        (status = 200, description = "Updated asset", body = Asset),
        (status = 400, description = "Asset is assigned or patch is invalid", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    )
)]
pub(crate) async fn update_asset(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut patch): Json<AssetPatch>,
) -> Result<Json<Asset>, ApiError> {
    let asset = load_local_asset(&state, &headers, &id).await?;
    if let Some(name) = patch.name.as_mut() {
        *name = name.trim().to_string();
        if name.is_empty() {
            return Err(api_validation_error("asset name must not be empty"));
        }
    }
    if patch.state == Some(AssetState::Assigned) {
        return Err(api_validation_error(
            "assets become Assigned through an assignment",
        ));
    }
    let asset = state
        .store
        .update_asset(asset.id, patch)
        .await
        .map_err(|err| api_from_store("failed to update asset", err))?;
    Ok(Json(asset))
}

#[utoipa::path(
    delete,
    path = "/asset-management/{id}",
    tag = "assets",
    params(("id" = String, Path, description = "Asset id")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 400, description = "Asset has assignment history", body = ErrorResponse),
        (status = 404, description = "Asset not found", body = ErrorResponse)
    )
)]
pub(crate) async fn delete_asset(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let asset = load_local_asset(&state, &headers, &id).await?;
    state
        .store
        .delete_asset(asset.id)
        .await
        .map_err(|err| api_from_store("failed to delete asset", err))?;
    tracing::info!(asset_id = %asset.id, "asset deleted");
    Ok(StatusCode::NO_CONTENT)
}
