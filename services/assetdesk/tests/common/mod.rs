#![allow(dead_code)]

use assetdesk::app::{AppState, bootstrap_admin, build_router};
use assetdesk::config::AppConfig;
use assetdesk::model::User;
use assetdesk::sequence::SequenceCache;
use assetdesk::sequence::memory::MemoryCache;
use assetdesk::store::AssetStore;
use assetdesk::store::memory::InMemoryStore;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

pub type App = axum::routing::RouterIntoService<axum::body::Body, ()>;

pub async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json")
}

/// Router over in-memory backends plus a bootstrap admin at `HN`.
pub async fn test_app(config: AppConfig) -> (App, AppState, User) {
    let store: Arc<dyn AssetStore> = Arc::new(InMemoryStore::new());
    let cache: Arc<dyn SequenceCache> = Arc::new(MemoryCache::new());
    let state = AppState::new(store, cache, &config);
    let admin = bootstrap_admin(&state, "HN")
        .await
        .expect("bootstrap")
        .expect("empty store");
    (build_router(state.clone()).into_service(), state, admin)
}

/// Send `request` and decode the JSON body, `Null` when the body is empty.
pub async fn send(app: &App, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let value = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json")
    };
    (status, value)
}
