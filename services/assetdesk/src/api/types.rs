//! HTTP API request/response types.
//!
//! # Purpose
//! Defines payload shapes for the asset-desk REST API and OpenAPI schema
//! generation. Domain records from [`crate::model`] are returned as-is.
use crate::model::{
    Asset, AssetState, Assignment, Category, CategoryReport, Gender, ReturningRequest, Role, User,
};
use assetdesk_common::ids::{AssetId, AssignmentId, CategoryId, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
    pub request_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct SystemInfo {
    pub api_version: String,
    pub storage_backend: String,
    pub cache_backend: String,
    pub durable_storage: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct HealthStatus {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct LoginResponse {
    pub user: User,
    /// The client should force a password change when set.
    pub is_first_login: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct CategoryCreateRequest {
    pub name: String,
    pub prefix: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CategoryListResponse {
    pub items: Vec<Category>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AssetCreateRequest {
    pub name: String,
    #[schema(value_type = String)]
    pub category_id: CategoryId,
    #[serde(default)]
    pub specification: String,
    pub installed_date: NaiveDate,
    pub state: AssetState,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssetListResponse {
    pub items: Vec<Asset>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct UserCreateRequest {
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub joined_date: NaiveDate,
    pub gender: Gender,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserListResponse {
    pub items: Vec<User>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct AssignmentCreateRequest {
    #[schema(value_type = String)]
    pub asset_id: AssetId,
    #[schema(value_type = String)]
    pub assigned_to: UserId,
    pub assigned_date: NaiveDate,
    #[serde(default)]
    pub note: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentListResponse {
    pub items: Vec<Assignment>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone)]
pub struct ReturningCreateRequest {
    #[schema(value_type = String)]
    pub assignment_id: AssignmentId,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReturningListResponse {
    pub items: Vec<ReturningRequest>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportResponse {
    pub location: String,
    pub items: Vec<CategoryReport>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResyncResponse {
    /// Number of stored usernames replayed into the presence set.
    pub usernames: usize,
}
