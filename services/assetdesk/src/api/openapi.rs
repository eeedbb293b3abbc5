//! OpenAPI schema aggregation for the asset-desk API.
//!
//! # Purpose
//! Collects all routes and schema types into a single OpenAPI document served
//! at `/openapi.json` and rendered at `/docs`.
use crate::api::{
    assets, assignments, categories, report, returning, sample, system,
    types::{
        AssetCreateRequest, AssetListResponse, AssignmentCreateRequest, AssignmentListResponse,
        CategoryCreateRequest, CategoryListResponse, ChangePasswordRequest, ErrorResponse,
        HealthStatus, LoginRequest, LoginResponse, ReportResponse, ResyncResponse,
        ReturningCreateRequest, ReturningListResponse, SystemInfo, UserCreateRequest,
        UserListResponse,
    },
    users,
};
use crate::auth::login;
use crate::model::{
    Asset, AssetPatch, AssetState, Assignment, AssignmentPatch, AssignmentState, Category,
    CategoryReport, Gender, ReturningRequest, ReturningState, Role, User, UserPatch,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "assetdesk",
        version = "v1",
        description = "IT asset and assignment tracking HTTP API"
    ),
    paths(
        system::system_info,
        system::system_health,
        login::login,
        login::change_password,
        categories::list_categories,
        categories::create_category,
        assets::list_assets,
        assets::create_asset,
        assets::get_asset,
        assets::update_asset,
        assets::delete_asset,
        users::list_users,
        users::create_user,
        users::get_user,
        users::update_user,
        users::disable_user,
        assignments::list_assignments,
        assignments::create_assignment,
        assignments::get_assignment,
        assignments::edit_assignment,
        assignments::delete_assignment,
        assignments::accept_assignment,
        assignments::decline_assignment,
        returning::list_returning_requests,
        returning::create_returning_request,
        returning::cancel_returning_request,
        returning::complete_returning_request,
        report::category_report,
        sample::sync_redis
    ),
    components(schemas(
        SystemInfo,
        HealthStatus,
        ErrorResponse,
        LoginRequest,
        LoginResponse,
        ChangePasswordRequest,
        Category,
        CategoryCreateRequest,
        CategoryListResponse,
        CategoryReport,
        ReportResponse,
        Asset,
        AssetState,
        AssetPatch,
        AssetCreateRequest,
        AssetListResponse,
        User,
        Role,
        Gender,
        UserPatch,
        UserCreateRequest,
        UserListResponse,
        Assignment,
        AssignmentState,
        AssignmentPatch,
        AssignmentCreateRequest,
        AssignmentListResponse,
        ReturningRequest,
        ReturningState,
        ReturningCreateRequest,
        ReturningListResponse,
        ResyncResponse
    )),
    tags(
        (name = "system", description = "Health, metadata and maintenance"),
        (name = "auth", description = "Login and password management"),
        (name = "categories", description = "Asset categories"),
        (name = "assets", description = "Asset management"),
        (name = "users", description = "User management"),
        (name = "assignments", description = "Asset assignments"),
        (name = "returning", description = "Returning requests"),
        (name = "report", description = "Per-category report")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();
        for expected in [
            "/auth/login",
            "/category",
            "/asset-management/{id}",
            "/user-management/{id}/disable",
            "/assignment/{id}/accept",
            "/returning-request/{id}/complete",
            "/report",
            "/sample/sync-redis",
            "/system/health",
        ] {
            assert!(paths.contains(&expected), "missing {expected}");
        }
    }
}
