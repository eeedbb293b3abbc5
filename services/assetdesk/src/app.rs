//! Asset-desk HTTP application wiring.
//!
//! # Purpose
//! Builds the Axum router, configures middleware, and defines the shared
//! application state injected into handlers.
//!
//! # Notes
//! This module centralizes route composition to keep `main` small and testable.
use crate::api;
use crate::api::openapi::ApiDoc;
use crate::auth;
use crate::auth::password::hash_password;
use crate::config::AppConfig;
use crate::model::{Gender, Role, User};
use crate::observability;
use crate::sequence::naming::initial_password;
use crate::sequence::{IdGenerator, SequenceCache};
use crate::store::AssetStore;
use anyhow::Context;
use assetdesk_common::Location;
use assetdesk_common::ids::UserId;
use axum::Router;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_opentelemetry::OpenTelemetrySpanExt;
use utoipa::OpenApi;

#[derive(Debug, Clone, Copy)]
pub struct LoginLimits {
    pub max_attempts: u32,
    pub lockout_seconds: u64,
}

#[derive(Clone)]
pub struct AppState {
    pub api_version: String,
    pub store: Arc<dyn AssetStore>,
    pub cache: Arc<dyn SequenceCache>,
    pub generator: IdGenerator,
    pub login: LoginLimits,
    pub request_timeout: Duration,
}

impl AppState {
    pub fn new(
        store: Arc<dyn AssetStore>,
        cache: Arc<dyn SequenceCache>,
        config: &AppConfig,
    ) -> Self {
        let generator = IdGenerator::new(
            cache.clone(),
            store.clone(),
            config.username_bitmap_bits,
        );
        Self {
            api_version: "v1".to_string(),
            store,
            cache,
            generator,
            login: LoginLimits {
                max_attempts: config.max_login_attempts,
                lockout_seconds: config.login_lockout_seconds,
            },
            request_timeout: Duration::from_millis(config.request_timeout_ms),
        }
    }
}

/// Create the first admin account when the store holds no users.
///
/// The account is `Admin Desk` at `location`, born 1990-01-01, so its initial
/// password follows the usual `username@ddMMyyyy` rule. Returns `None` when
/// users already exist.
pub async fn bootstrap_admin(state: &AppState, location: &str) -> anyhow::Result<Option<User>> {
    let location = Location::new(location).context("parse bootstrap admin location")?;
    if !state.store.list_usernames().await?.is_empty() {
        return Ok(None);
    }
    let date_of_birth = NaiveDate::from_ymd_opt(1990, 1, 1).context("bootstrap date of birth")?;
    let staff_code = state.generator.next_staff_code().await?;
    let username = state.generator.next_username("Admin", "Desk").await?;
    let password_hash = hash_password(&initial_password(&username, date_of_birth))
        .context("hash bootstrap admin password")?;
    let user = state
        .store
        .create_user(User {
            id: UserId::new(),
            staff_code,
            password_hash,
            username,
            first_name: "Admin".to_string(),
            last_name: "Desk".to_string(),
            date_of_birth,
            joined_date: chrono::Utc::now().date_naive(),
            gender: Gender::Unspecified,
            role: Role::Admin,
            location,
            is_first_login: true,
            is_disabled: false,
        })
        .await?;
    tracing::warn!(
        user_id = %user.id,
        username = %user.username,
        "bootstrap admin created; change its password after first login"
    );
    Ok(Some(user))
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer =
        TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            let parent = observability::trace_context_from_headers(request.headers());
            let span = tracing::info_span!(
                "http.request",
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version()
            );
            span.set_parent(parent);
            span
        });
    let timeout_layer = TimeoutLayer::new(state.request_timeout);

    Router::new()
        .route("/system/info", axum::routing::get(api::system::system_info))
        .route(
            "/system/health",
            axum::routing::get(api::system::system_health),
        )
        .route("/auth/login", axum::routing::post(auth::login::login))
        .route(
            "/auth/change-password",
            axum::routing::post(auth::login::change_password),
        )
        .route(
            "/category",
            axum::routing::get(api::categories::list_categories)
                .post(api::categories::create_category),
        )
        .route(
            "/asset-management",
            axum::routing::get(api::assets::list_assets).post(api::assets::create_asset),
        )
        .route(
            "/asset-management/:id",
            axum::routing::get(api::assets::get_asset)
                .put(api::assets::update_asset)
                .delete(api::assets::delete_asset),
        )
        .route(
            "/user-management",
            axum::routing::get(api::users::list_users).post(api::users::create_user),
        )
        .route(
            "/user-management/:id",
            axum::routing::get(api::users::get_user).put(api::users::update_user),
        )
        .route(
            "/user-management/:id/disable",
            axum::routing::post(api::users::disable_user),
        )
        .route(
            "/assignment",
            axum::routing::get(api::assignments::list_assignments)
                .post(api::assignments::create_assignment),
        )
        .route(
            "/assignment/:id",
            axum::routing::get(api::assignments::get_assignment)
                .put(api::assignments::edit_assignment)
                .delete(api::assignments::delete_assignment),
        )
        .route(
            "/assignment/:id/accept",
            axum::routing::post(api::assignments::accept_assignment),
        )
        .route(
            "/assignment/:id/decline",
            axum::routing::post(api::assignments::decline_assignment),
        )
        .route(
            "/returning-request",
            axum::routing::get(api::returning::list_returning_requests)
                .post(api::returning::create_returning_request),
        )
        .route(
            "/returning-request/:id",
            axum::routing::delete(api::returning::cancel_returning_request),
        )
        .route(
            "/returning-request/:id/complete",
            axum::routing::post(api::returning::complete_returning_request),
        )
        .route("/report", axum::routing::get(api::report::category_report))
        .route(
            "/sample/sync-redis",
            axum::routing::get(api::sample::sync_redis),
        )
        .merge(utoipa_swagger_ui::SwaggerUi::new("/docs").url("/openapi.json", ApiDoc::openapi()))
        .layer(timeout_layer)
        .layer(trace_layer)
        .with_state(state)
}
