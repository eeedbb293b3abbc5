//! In-process cache backend.
//!
//! Used for local development and tests. Values are lost on restart, and counters are not shared
//! between instances, so multi-instance deployments need the Redis backend.
use super::{CacheError, CacheResult, SequenceCache};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Entries {
    values: HashMap<String, (String, Option<Instant>)>,
    bitmaps: HashMap<String, Vec<u8>>,
}

impl Entries {
    fn live_value(&mut self, key: &str) -> Option<&mut String> {
        let expired = matches!(
            self.values.get(key),
            Some((_, Some(deadline))) if *deadline <= Instant::now()
        );
        if expired {
            self.values.remove(key);
            return None;
        }
        self.values.get_mut(key).map(|(value, _)| value)
    }
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

fn bit_position(offset: u32) -> (usize, u8) {
    ((offset / 8) as usize, 0x80 >> (offset % 8))
}

#[async_trait]
impl SequenceCache for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.entries.lock().await.live_value(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.entries
            .lock()
            .await
            .values
            .insert(key.to_string(), (value.to_string(), None));
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str) -> CacheResult<bool> {
        let mut entries = self.entries.lock().await;
        if entries.live_value(key).is_some() {
            return Ok(false);
        }
        entries
            .values
            .insert(key.to_string(), (value.to_string(), None));
        Ok(true)
    }

    async fn incr(&self, key: &str, delta: i64) -> CacheResult<i64> {
        let mut entries = self.entries.lock().await;
        let next = match entries.live_value(key) {
            Some(current) => {
                let parsed: i64 = current
                    .parse()
                    .map_err(|_| CacheError::NotAnInteger(key.to_string()))?;
                let next = parsed + delta;
                *current = next.to_string();
                next
            }
            None => {
                entries
                    .values
                    .insert(key.to_string(), (delta.to_string(), None));
                delta
            }
        };
        Ok(next)
    }

    async fn get_bit(&self, key: &str, offset: u32) -> CacheResult<bool> {
        let entries = self.entries.lock().await;
        let (byte, mask) = bit_position(offset);
        Ok(entries
            .bitmaps
            .get(key)
            .and_then(|bits| bits.get(byte))
            .is_some_and(|b| b & mask != 0))
    }

    async fn set_bit(&self, key: &str, offset: u32, value: bool) -> CacheResult<bool> {
        let mut entries = self.entries.lock().await;
        let (byte, mask) = bit_position(offset);
        let bits = entries.bitmaps.entry(key.to_string()).or_default();
        if bits.len() <= byte {
            bits.resize(byte + 1, 0);
        }
        let previous = bits[byte] & mask != 0;
        if value {
            bits[byte] |= mask;
        } else {
            bits[byte] &= !mask;
        }
        Ok(previous)
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        entries.values.remove(key);
        entries.bitmaps.remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, seconds: u64) -> CacheResult<()> {
        let mut entries = self.entries.lock().await;
        if let Some((_, deadline)) = entries.values.get_mut(key) {
            *deadline = Some(Instant::now() + Duration::from_secs(seconds));
        }
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incr_starts_from_zero_and_rejects_text() {
        let cache = MemoryCache::new();
        assert_eq!(cache.incr("seq:a", 1).await.expect("incr"), 1);
        assert_eq!(cache.incr("seq:a", 1).await.expect("incr"), 2);
        cache.set("seq:b", "abc").await.expect("set");
        assert!(matches!(
            cache.incr("seq:b", 1).await,
            Err(CacheError::NotAnInteger(key)) if key == "seq:b"
        ));
    }

    #[tokio::test]
    async fn set_if_absent_keeps_existing_value() {
        let cache = MemoryCache::new();
        assert!(cache.set_if_absent("k", "7").await.expect("first"));
        assert!(!cache.set_if_absent("k", "3").await.expect("second"));
        assert_eq!(cache.get("k").await.expect("get"), Some("7".to_string()));
    }

    #[tokio::test]
    async fn set_bit_returns_previous_value() {
        let cache = MemoryCache::new();
        assert!(!cache.set_bit("bits", 13, true).await.expect("set"));
        assert!(cache.set_bit("bits", 13, true).await.expect("set again"));
        assert!(cache.get_bit("bits", 13).await.expect("get"));
        assert!(!cache.get_bit("bits", 12).await.expect("neighbour"));
        cache.delete("bits").await.expect("delete");
        assert!(!cache.get_bit("bits", 13).await.expect("cleared"));
    }

    #[tokio::test]
    async fn expired_values_disappear() {
        let cache = MemoryCache::new();
        cache.incr("attempts", 1).await.expect("incr");
        cache.expire("attempts", 0).await.expect("expire");
        assert_eq!(cache.get("attempts").await.expect("get"), None);
        assert_eq!(cache.incr("attempts", 1).await.expect("incr"), 1);
    }
}
