//! Sequential identifier generation.
//!
//! # Purpose
//! Issues asset codes (`<prefix><6 digits>`), staff codes (`SD<4 digits>`) and usernames with
//! numeric postfixes. Counters live in a [`SequenceCache`] in front of the store so issuing an
//! identifier never scans a table once the counter is warm.
//!
//! # Key invariants
//! - A counter only moves through the cache's atomic increment; seeding after a miss uses
//!   set-if-absent, so a concurrent seeder can never move a counter backwards.
//! - The bare base username is claimed by the previous bit returned from an atomic set-bit.
//! - There is no store-only fallback: if the cache is unreachable, generation fails.
use crate::store::StoreError;
use async_trait::async_trait;
use thiserror::Error;

pub mod generator;
pub mod memory;
pub mod naming;
pub mod redis_cache;

pub use generator::IdGenerator;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("cache value at {0} is not an integer")]
    NotAnInteger(String),
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("sequence {key} exhausted at {width} digits")]
    Exhausted { key: String, width: u32 },
    #[error("cannot derive a username from {0:?}")]
    InvalidName(String),
}

/// Key/value primitives the generator and the login limiter need from the cache.
///
/// Bit offsets follow Redis `SETBIT` addressing: offset 0 is the most significant bit of the
/// first byte.
#[async_trait]
pub trait SequenceCache: Send + Sync {
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;
    /// Returns `true` when the value was written.
    async fn set_if_absent(&self, key: &str, value: &str) -> CacheResult<bool>;
    /// Increments and returns the new value; a missing key counts as 0.
    async fn incr(&self, key: &str, delta: i64) -> CacheResult<i64>;
    async fn get_bit(&self, key: &str, offset: u32) -> CacheResult<bool>;
    /// Returns the previous value of the bit.
    async fn set_bit(&self, key: &str, offset: u32, value: bool) -> CacheResult<bool>;
    async fn delete(&self, key: &str) -> CacheResult<()>;
    async fn expire(&self, key: &str, seconds: u64) -> CacheResult<()>;
    async fn ping(&self) -> CacheResult<()>;
    fn backend_name(&self) -> &'static str;
}
