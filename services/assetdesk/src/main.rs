//! Asset-desk HTTP service entry point.
//!
//! # Purpose
//! Wires configuration, storage, the identifier cache and the HTTP router,
//! then serves the API until shutdown.
//!
//! # Notes
//! The `build_state` helper keeps wiring testable and minimizes main setup logic.
use anyhow::Context;
use assetdesk::app::{AppState, bootstrap_admin, build_router};
use assetdesk::config::{self, AppConfig};
use assetdesk::observability;
use assetdesk::sequence::SequenceCache;
use assetdesk::sequence::memory::MemoryCache;
use assetdesk::sequence::redis_cache::RedisCache;
use assetdesk::store::AssetStore;
use assetdesk::store::memory::InMemoryStore;
use assetdesk::store::postgres::PostgresStore;
use std::future::Future;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env_or_yaml().context("assetdesk config")?;
    run_with_shutdown(config, async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await
}

async fn run_with_shutdown<F>(config: AppConfig, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let metrics_handle = observability::init_observability("assetdesk")?;
    let state = build_state(&config).await?;
    if let Some(location) = &config.bootstrap_admin_location {
        bootstrap_admin(&state, location).await?;
    }
    let metrics_task = tokio::spawn(observability::serve_metrics(
        metrics_handle,
        config.metrics_bind,
    ));

    let app = build_router(state.clone());
    let addr = config.bind_addr;
    tracing::info!(
        %addr,
        storage = state.store.backend_name(),
        cache = state.cache.backend_name(),
        "assetdesk listening"
    );
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tokio::pin!(shutdown);
    tokio::select! {
        result = axum::serve(listener, app.into_make_service()) => {
            result?;
        }
        _ = &mut shutdown => {}
    }

    metrics_task.abort();
    let _ = metrics_task.await;
    Ok(())
}

async fn build_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn AssetStore> = match config.storage {
        config::StorageBackend::Memory => Arc::new(InMemoryStore::new()),
        config::StorageBackend::Postgres => {
            let pg = config
                .postgres
                .as_ref()
                .context("postgres configuration missing")?;
            Arc::new(PostgresStore::connect(pg).await?)
        }
    };
    let cache: Arc<dyn SequenceCache> = match config.cache {
        config::CacheBackend::Memory => Arc::new(MemoryCache::new()),
        config::CacheBackend::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .context("redis_url missing for the redis cache")?;
            Arc::new(RedisCache::connect(url).await?)
        }
    };
    Ok(AppState::new(store, cache, config))
}
