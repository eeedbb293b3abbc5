//! Identifier generator over the cache and the store.
//!
//! # Counter lifecycle
//! 1. A warm counter in the cache is authoritative.
//! 2. On a miss, the store is scanned for the greatest identifier with the prefix and the counter
//!    is seeded from its numeric tail with set-if-absent. A cached value that is not a number is
//!    overwritten from the store.
//! 3. Every issuance is one atomic increment of the counter.
//!
//! A tail that does not parse counts as 0, logs a warning and bumps
//! `assetdesk_sequence_parse_failures_total`.
use super::naming::{base_username, presence_offset, strip_postfix};
use super::{SequenceCache, SequenceError};
use crate::store::{AssetStore, numeric_suffix};
use std::collections::BTreeSet;
use std::sync::Arc;

pub const STAFF_CODE_PREFIX: &str = "SD";
pub const ASSET_CODE_WIDTH: u32 = 6;
pub const STAFF_CODE_WIDTH: u32 = 4;
pub const USERNAME_BITMAP_KEY: &str = "usernames:present";

fn asset_counter_key(prefix: &str) -> String {
    format!("seq:asset:{prefix}")
}

fn staff_counter_key() -> String {
    format!("seq:staff:{STAFF_CODE_PREFIX}")
}

fn postfix_counter_key(base: &str) -> String {
    format!("seq:username:{base}")
}

#[derive(Debug, Clone, Copy)]
enum Family {
    Asset,
    Staff,
    Username,
}

impl Family {
    fn label(self) -> &'static str {
        match self {
            Family::Asset => "asset",
            Family::Staff => "staff",
            Family::Username => "username",
        }
    }
}

/// Issues asset codes, staff codes and usernames.
#[derive(Clone)]
pub struct IdGenerator {
    cache: Arc<dyn SequenceCache>,
    store: Arc<dyn AssetStore>,
    bitmap_bits: u32,
}

impl IdGenerator {
    pub fn new(cache: Arc<dyn SequenceCache>, store: Arc<dyn AssetStore>, bitmap_bits: u32) -> Self {
        Self {
            cache,
            store,
            bitmap_bits,
        }
    }

    /// Next asset code for a category prefix, e.g. `LA000008`.
    pub async fn next_asset_code(&self, prefix: &str) -> Result<String, SequenceError> {
        let key = asset_counter_key(prefix);
        self.ensure_seeded(&key, Family::Asset, || async {
            let max = self.store.max_asset_code(prefix).await?;
            Ok::<_, SequenceError>(
                max.map(|code| tail_or_zero(&code, prefix, Family::Asset))
                    .unwrap_or(0),
            )
        })
        .await?;
        let next = self.increment(&key, Some(ASSET_CODE_WIDTH)).await?;
        metrics::counter!("assetdesk_identifiers_issued_total", "family" => Family::Asset.label())
            .increment(1);
        Ok(format!("{prefix}{next:0width$}", width = ASSET_CODE_WIDTH as usize))
    }

    /// Next staff code, e.g. `SD0001`.
    pub async fn next_staff_code(&self) -> Result<String, SequenceError> {
        let key = staff_counter_key();
        self.ensure_seeded(&key, Family::Staff, || async {
            let max = self.store.max_staff_code(STAFF_CODE_PREFIX).await?;
            Ok::<_, SequenceError>(
                max.map(|code| tail_or_zero(&code, STAFF_CODE_PREFIX, Family::Staff))
                    .unwrap_or(0),
            )
        })
        .await?;
        let next = self.increment(&key, Some(STAFF_CODE_WIDTH)).await?;
        metrics::counter!("assetdesk_identifiers_issued_total", "family" => Family::Staff.label())
            .increment(1);
        Ok(format!(
            "{STAFF_CODE_PREFIX}{next:0width$}",
            width = STAFF_CODE_WIDTH as usize
        ))
    }

    /// Next username for a person: the bare base when it was never issued, otherwise the base
    /// with the next numeric postfix.
    pub async fn next_username(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> Result<String, SequenceError> {
        let base = base_username(first_name, last_name)
            .ok_or_else(|| SequenceError::InvalidName(format!("{first_name} {last_name}")))?;
        let key = postfix_counter_key(&base);
        // Read before claiming the bit: a concurrent caller that loses the claim may bump the
        // counter before the winner looks at it.
        let postfix_issued = self
            .cache
            .get(&key)
            .await?
            .and_then(|value| value.parse::<u64>().ok())
            .is_some_and(|value| value > 0);
        let offset = presence_offset(&base, self.bitmap_bits);
        let was_present = self
            .cache
            .set_bit(USERNAME_BITMAP_KEY, offset, true)
            .await?;

        let username = if !was_present && !postfix_issued {
            base
        } else {
            self.ensure_seeded(&key, Family::Username, || async {
                let names = self.store.usernames_with_prefix(&base).await?;
                // Other bases can share the prefix; only `base<digits>` counts.
                Ok::<_, SequenceError>(
                    names
                        .iter()
                        .filter_map(|name| numeric_suffix(name, &base))
                        .max()
                        .unwrap_or(0),
                )
            })
            .await?;
            let postfix = self.increment(&key, None).await?;
            format!("{base}{postfix}")
        };
        metrics::counter!("assetdesk_identifiers_issued_total", "family" => Family::Username.label())
            .increment(1);
        Ok(username)
    }

    /// Rebuild the username presence bitmap from the store.
    ///
    /// Clears the bitmap, re-marks the base of every stored username and drops the postfix
    /// counters so they re-seed from the store on next use. Returns the number of usernames
    /// replayed.
    pub async fn resync(&self) -> Result<usize, SequenceError> {
        let usernames = self.store.list_usernames().await?;
        self.cache.delete(USERNAME_BITMAP_KEY).await?;
        let mut bases = BTreeSet::new();
        for username in &usernames {
            bases.insert(strip_postfix(username).to_string());
        }
        for base in &bases {
            self.cache
                .set_bit(USERNAME_BITMAP_KEY, presence_offset(base, self.bitmap_bits), true)
                .await?;
            self.cache.delete(&postfix_counter_key(base)).await?;
        }
        tracing::info!(
            usernames = usernames.len(),
            bases = bases.len(),
            "username presence set rebuilt"
        );
        Ok(usernames.len())
    }

    async fn ensure_seeded<F, Fut>(
        &self,
        key: &str,
        family: Family,
        scan: F,
    ) -> Result<(), SequenceError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<u64, SequenceError>>,
    {
        match self.cache.get(key).await? {
            Some(value) if value.parse::<u64>().is_ok() => Ok(()),
            Some(value) => {
                tracing::warn!(key, value = %value, family = family.label(), "non-numeric counter in cache");
                metrics::counter!("assetdesk_sequence_parse_failures_total", "family" => family.label())
                    .increment(1);
                let seed = scan().await?;
                self.cache.set(key, &seed.to_string()).await?;
                Ok(())
            }
            None => {
                let seed = scan().await?;
                if self.cache.set_if_absent(key, &seed.to_string()).await? {
                    tracing::debug!(key, seed, "sequence counter seeded from store");
                }
                Ok(())
            }
        }
    }

    async fn increment(&self, key: &str, width: Option<u32>) -> Result<u64, SequenceError> {
        let next = self.cache.incr(key, 1).await?;
        let next = u64::try_from(next).unwrap_or(0);
        if let Some(width) = width {
            if next > 10u64.pow(width) - 1 {
                return Err(SequenceError::Exhausted {
                    key: key.to_string(),
                    width,
                });
            }
        }
        Ok(next)
    }
}

fn tail_or_zero(identifier: &str, prefix: &str, family: Family) -> u64 {
    match numeric_suffix(identifier, prefix) {
        Some(value) => value,
        None => {
            tracing::warn!(
                identifier,
                prefix,
                family = family.label(),
                "malformed identifier tail, counting from 0"
            );
            metrics::counter!("assetdesk_sequence_parse_failures_total", "family" => family.label())
                .increment(1);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Asset, AssetState, Category, Gender, Role, User};
    use crate::sequence::memory::MemoryCache;
    use crate::store::memory::InMemoryStore;
    use assetdesk_common::Location;
    use assetdesk_common::ids::{AssetId, CategoryId, UserId};
    use chrono::NaiveDate;
    use std::collections::HashSet;
    use tokio::task::JoinSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn setup() -> (Arc<MemoryCache>, Arc<InMemoryStore>, IdGenerator) {
        let cache = Arc::new(MemoryCache::new());
        let store = Arc::new(InMemoryStore::new());
        let generator = IdGenerator::new(cache.clone(), store.clone(), 1 << 16);
        (cache, store, generator)
    }

    async fn seed_asset(store: &InMemoryStore, prefix: &str, code: &str) {
        let category = match store
            .list_categories()
            .await
            .expect("categories")
            .into_iter()
            .find(|c| c.prefix == prefix)
        {
            Some(category) => category,
            None => store
                .create_category(Category {
                    id: CategoryId::new(),
                    name: format!("Category {prefix}"),
                    prefix: prefix.to_string(),
                })
                .await
                .expect("category"),
        };
        store
            .create_asset(Asset {
                id: AssetId::new(),
                code: code.to_string(),
                name: "Asset".to_string(),
                category_id: category.id,
                specification: String::new(),
                installed_date: date(2024, 1, 1),
                state: AssetState::Available,
                location: Location::new("HN").expect("location"),
                is_deleted: false,
            })
            .await
            .expect("asset");
    }

    async fn seed_user(store: &InMemoryStore, username: &str, staff_code: &str) {
        store
            .create_user(User {
                id: UserId::new(),
                staff_code: staff_code.to_string(),
                username: username.to_string(),
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                date_of_birth: date(1990, 1, 1),
                joined_date: date(2020, 1, 6),
                gender: Gender::Male,
                role: Role::Staff,
                location: Location::new("HN").expect("location"),
                password_hash: String::new(),
                is_first_login: true,
                is_disabled: false,
            })
            .await
            .expect("user");
    }

    #[tokio::test]
    async fn warm_counter_increments_sequentially() {
        let (cache, _store, generator) = setup();
        cache.set("seq:asset:LA", "41").await.expect("set");
        assert_eq!(generator.next_asset_code("LA").await.expect("first"), "LA000042");
        assert_eq!(generator.next_asset_code("LA").await.expect("second"), "LA000043");
        assert_eq!(
            cache.get("seq:asset:LA").await.expect("get"),
            Some("43".to_string())
        );
    }

    #[tokio::test]
    async fn cold_counter_backfills_from_store() {
        let (_cache, store, generator) = setup();
        seed_asset(&store, "LA", "LA000002").await;
        seed_asset(&store, "LA", "LA000007").await;
        assert_eq!(generator.next_asset_code("LA").await.expect("code"), "LA000008");
    }

    #[tokio::test]
    async fn codes_are_zero_padded_to_six_digits() {
        let (cache, _store, generator) = setup();
        cache.set("seq:asset:MON", "2").await.expect("set");
        assert_eq!(generator.next_asset_code("MON").await.expect("code"), "MON000003");
    }

    #[tokio::test]
    async fn malformed_cached_counter_is_reseeded() {
        let (cache, store, generator) = setup();
        seed_asset(&store, "LA", "LA000005").await;
        cache.set("seq:asset:LA", "garbage").await.expect("set");
        assert_eq!(generator.next_asset_code("LA").await.expect("code"), "LA000006");
    }

    #[tokio::test]
    async fn exhausted_counter_is_an_error() {
        let (cache, _store, generator) = setup();
        cache.set("seq:staff:SD", "9999").await.expect("set");
        let err = generator.next_staff_code().await.expect_err("exhausted");
        assert!(matches!(err, SequenceError::Exhausted { width: 4, .. }));
    }

    #[tokio::test]
    async fn staff_codes_continue_from_store() {
        let (_cache, store, generator) = setup();
        assert_eq!(generator.next_staff_code().await.expect("first"), "SD0001");
        seed_user(&store, "janed", "SD0009").await;
        // The counter is warm now; the store is not consulted again.
        assert_eq!(generator.next_staff_code().await.expect("second"), "SD0002");
    }

    #[tokio::test]
    async fn username_collision_appends_postfix() {
        let (cache, _store, generator) = setup();
        let offset = presence_offset("johnd", 1 << 16);
        cache
            .set_bit(USERNAME_BITMAP_KEY, offset, true)
            .await
            .expect("mark");
        assert_eq!(generator.next_username("John", "Doe").await.expect("first"), "johnd1");
        assert_eq!(generator.next_username("John", "Doe").await.expect("second"), "johnd2");
    }

    #[tokio::test]
    async fn first_issuance_claims_bare_base() {
        let (_cache, _store, generator) = setup();
        assert_eq!(generator.next_username("John", "Doe").await.expect("first"), "johnd");
        assert_eq!(generator.next_username("John", "Doe").await.expect("second"), "johnd1");
    }

    #[tokio::test]
    async fn postfix_counter_backfills_from_store() {
        let (cache, store, generator) = setup();
        seed_user(&store, "johnd", "SD0001").await;
        seed_user(&store, "johnd4", "SD0002").await;
        seed_user(&store, "johndoe7", "SD0003").await;
        cache
            .set_bit(USERNAME_BITMAP_KEY, presence_offset("johnd", 1 << 16), true)
            .await
            .expect("mark");
        assert_eq!(generator.next_username("John", "Doe").await.expect("name"), "johnd5");
    }

    #[tokio::test]
    async fn resync_rebuilds_presence_from_store() {
        let (cache, store, generator) = setup();
        seed_user(&store, "johnd", "SD0001").await;
        seed_user(&store, "johnd1", "SD0002").await;
        seed_user(&store, "marya", "SD0003").await;
        cache.set("seq:username:johnd", "40").await.expect("stale");

        assert_eq!(generator.resync().await.expect("resync"), 3);
        assert!(
            cache
                .get_bit(USERNAME_BITMAP_KEY, presence_offset("marya", 1 << 16))
                .await
                .expect("bit")
        );
        assert_eq!(cache.get("seq:username:johnd").await.expect("get"), None);
        assert_eq!(generator.next_username("John", "Doe").await.expect("name"), "johnd2");
    }

    #[tokio::test]
    async fn unusable_names_are_rejected() {
        let (_cache, _store, generator) = setup();
        let err = generator.next_username("!!", "Doe").await.expect_err("invalid");
        assert!(matches!(err, SequenceError::InvalidName(_)));
    }

    #[tokio::test]
    async fn digit_in_last_name_does_not_reissue_after_resync() {
        let (_cache, store, generator) = setup();
        let first = generator.next_username("Jo", "Doe 2").await.expect("first");
        assert_eq!(first, "jod");
        seed_user(&store, &first, "SD0001").await;
        generator.resync().await.expect("resync");
        let second = generator.next_username("Jo", "Doe 2").await.expect("second");
        assert_eq!(second, "jod1");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_asset_codes_are_distinct() {
        let (_cache, store, generator) = setup();
        seed_asset(&store, "LA", "LA000010").await;
        let mut tasks = JoinSet::new();
        for _ in 0..50 {
            let generator = generator.clone();
            tasks.spawn(async move { generator.next_asset_code("LA").await });
        }
        let mut codes = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let code = joined.expect("task").expect("code");
            assert!(codes.insert(code.clone()), "duplicate code {code}");
        }
        assert_eq!(codes.len(), 50);
        let expected: HashSet<String> = (11..=60).map(|n| format!("LA{n:06}")).collect();
        assert_eq!(codes, expected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_usernames_are_distinct() {
        let (_cache, _store, generator) = setup();
        let mut tasks = JoinSet::new();
        for _ in 0..50 {
            let generator = generator.clone();
            tasks.spawn(async move { generator.next_username("John", "Doe").await });
        }
        let mut names = HashSet::new();
        while let Some(joined) = tasks.join_next().await {
            let name = joined.expect("task").expect("username");
            assert!(names.insert(name.clone()), "duplicate username {name}");
        }
        assert_eq!(names.len(), 50);
        assert!(names.contains("johnd"));
        let expected: HashSet<String> = std::iter::once("johnd".to_string())
            .chain((1..=49).map(|n| format!("johnd{n}")))
            .collect();
        assert_eq!(names, expected);
    }
}
