//! Service configuration sourced from environment variables, optionally
//! overridden by a YAML file named by `ASSETDESK_CONFIG`.
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::net::SocketAddr;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_LOGIN_ATTEMPTS: u32 = 5;
pub const DEFAULT_LOGIN_LOCKOUT_SECONDS: u64 = 300;
pub const DEFAULT_USERNAME_BITMAP_BITS: u32 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    Memory,
    Redis,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_pg_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_pg_timeout_ms")]
    pub acquire_timeout_ms: u64,
}

fn default_max_connections() -> u32 {
    10
}

fn default_pg_timeout_ms() -> u64 {
    5_000
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub metrics_bind: SocketAddr,
    pub storage: StorageBackend,
    pub postgres: Option<PostgresConfig>,
    pub cache: CacheBackend,
    pub redis_url: Option<String>,
    pub request_timeout_ms: u64,
    pub max_login_attempts: u32,
    pub login_lockout_seconds: u64,
    pub username_bitmap_bits: u32,
    /// Location of an admin account created on startup when the store has no users.
    pub bootstrap_admin_location: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AppConfigOverride {
    bind_addr: Option<String>,
    metrics_bind: Option<String>,
    storage: Option<StorageBackend>,
    postgres: Option<PostgresConfig>,
    cache: Option<CacheBackend>,
    redis_url: Option<String>,
    request_timeout_ms: Option<u64>,
    max_login_attempts: Option<u32>,
    login_lockout_seconds: Option<u64>,
    username_bitmap_bits: Option<u32>,
    bootstrap_admin_location: Option<String>,
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(value) => value.parse().with_context(|| format!("parse {key}")),
        Err(_) => Ok(default),
    }
}

fn parse_storage(value: &str) -> Result<StorageBackend> {
    match value.to_ascii_lowercase().as_str() {
        "memory" => Ok(StorageBackend::Memory),
        "postgres" => Ok(StorageBackend::Postgres),
        other => bail!("unknown storage backend {other:?}"),
    }
}

fn parse_cache(value: &str) -> Result<CacheBackend> {
    match value.to_ascii_lowercase().as_str() {
        "memory" => Ok(CacheBackend::Memory),
        "redis" => Ok(CacheBackend::Redis),
        other => bail!("unknown cache backend {other:?}"),
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let bind_addr = std::env::var("ASSETDESK_BIND")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()
            .with_context(|| "parse ASSETDESK_BIND")?;
        let metrics_bind = std::env::var("ASSETDESK_METRICS_BIND")
            .unwrap_or_else(|_| "0.0.0.0:9090".to_string())
            .parse()
            .with_context(|| "parse ASSETDESK_METRICS_BIND")?;
        let storage = match std::env::var("ASSETDESK_STORAGE") {
            Ok(value) => parse_storage(&value).with_context(|| "parse ASSETDESK_STORAGE")?,
            Err(_) => StorageBackend::Memory,
        };
        let postgres = match std::env::var("ASSETDESK_POSTGRES_URL") {
            Ok(url) => Some(PostgresConfig {
                url,
                max_connections: env_or(
                    "ASSETDESK_POSTGRES_MAX_CONNECTIONS",
                    default_max_connections(),
                )?,
                connect_timeout_ms: env_or(
                    "ASSETDESK_POSTGRES_CONNECT_TIMEOUT_MS",
                    default_pg_timeout_ms(),
                )?,
                acquire_timeout_ms: env_or(
                    "ASSETDESK_POSTGRES_ACQUIRE_TIMEOUT_MS",
                    default_pg_timeout_ms(),
                )?,
            }),
            Err(_) => None,
        };
        let cache = match std::env::var("ASSETDESK_CACHE") {
            Ok(value) => parse_cache(&value).with_context(|| "parse ASSETDESK_CACHE")?,
            Err(_) => CacheBackend::Memory,
        };
        Ok(Self {
            bind_addr,
            metrics_bind,
            storage,
            postgres,
            cache,
            redis_url: std::env::var("ASSETDESK_REDIS_URL").ok(),
            request_timeout_ms: env_or(
                "ASSETDESK_REQUEST_TIMEOUT_MS",
                DEFAULT_REQUEST_TIMEOUT_MS,
            )?,
            max_login_attempts: env_or(
                "ASSETDESK_MAX_LOGIN_ATTEMPTS",
                DEFAULT_MAX_LOGIN_ATTEMPTS,
            )?,
            login_lockout_seconds: env_or(
                "ASSETDESK_LOGIN_LOCKOUT_SECONDS",
                DEFAULT_LOGIN_LOCKOUT_SECONDS,
            )?,
            username_bitmap_bits: env_or(
                "ASSETDESK_USERNAME_BITMAP_BITS",
                DEFAULT_USERNAME_BITMAP_BITS,
            )?,
            bootstrap_admin_location: std::env::var("ASSETDESK_BOOTSTRAP_ADMIN_LOCATION").ok(),
        })
    }

    pub fn from_env_or_yaml() -> Result<Self> {
        let mut config = Self::from_env()?;
        if let Ok(path) = std::env::var("ASSETDESK_CONFIG") {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("read ASSETDESK_CONFIG: {path}"))?;
            config.apply_yaml(&contents)?;
        }
        config.validate()?;
        Ok(config)
    }

    fn apply_yaml(&mut self, contents: &str) -> Result<()> {
        let override_cfg: AppConfigOverride =
            serde_yaml::from_str(contents).with_context(|| "parse assetdesk config yaml")?;
        if let Some(value) = override_cfg.bind_addr {
            self.bind_addr = value.parse().with_context(|| "parse bind_addr")?;
        }
        if let Some(value) = override_cfg.metrics_bind {
            self.metrics_bind = value.parse().with_context(|| "parse metrics_bind")?;
        }
        if let Some(value) = override_cfg.storage {
            self.storage = value;
        }
        if let Some(value) = override_cfg.postgres {
            self.postgres = Some(value);
        }
        if let Some(value) = override_cfg.cache {
            self.cache = value;
        }
        if let Some(value) = override_cfg.redis_url {
            self.redis_url = Some(value);
        }
        if let Some(value) = override_cfg.request_timeout_ms {
            self.request_timeout_ms = value;
        }
        if let Some(value) = override_cfg.max_login_attempts {
            self.max_login_attempts = value;
        }
        if let Some(value) = override_cfg.login_lockout_seconds {
            self.login_lockout_seconds = value;
        }
        if let Some(value) = override_cfg.username_bitmap_bits {
            self.username_bitmap_bits = value;
        }
        if let Some(value) = override_cfg.bootstrap_admin_location {
            self.bootstrap_admin_location = Some(value);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.username_bitmap_bits == 0 {
            bail!("username_bitmap_bits must be positive");
        }
        if self.max_login_attempts == 0 {
            bail!("max_login_attempts must be positive");
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            metrics_bind: SocketAddr::from(([127, 0, 0, 1], 0)),
            storage: StorageBackend::Memory,
            postgres: None,
            cache: CacheBackend::Memory,
            redis_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            max_login_attempts: DEFAULT_MAX_LOGIN_ATTEMPTS,
            login_lockout_seconds: DEFAULT_LOGIN_LOCKOUT_SECONDS,
            username_bitmap_bits: DEFAULT_USERNAME_BITMAP_BITS,
            bootstrap_admin_location: None,
        }
    }
}
