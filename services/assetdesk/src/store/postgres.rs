//! Postgres-backed implementation of the asset store.
//!
//! # What this module is
//! This module implements the `AssetStore` trait using Postgres (via `sqlx`) as the durable system of
//! record for categories, assets, users, assignments and returning requests.
//!
//! # Key invariants
//! - Every guard-and-mutate operation runs in one transaction and locks the rows it reads with
//!   `SELECT ... FOR UPDATE`, so concurrent responses to the same assignment serialize.
//! - Enum columns are stored as their variant names and parsed back through explicit mappers.
//! - A partial unique index on `returning_requests (assignment_id)` keeps at most one active request
//!   per assignment even if two transactions race past the application check.
//!
//! # Operational notes
//! - Migrations are executed at startup via `sqlx::migrate!("./migrations")`.
//! - Connection pooling/timeouts are explicitly configured so a stalled database fails requests
//!   instead of hanging them.
//! - Database URLs may contain credentials; avoid logging them.
use super::{AssetStore, StoreError, StoreResult};
use crate::config::PostgresConfig;
use crate::lifecycle::{
    AssignmentEvent, ReturningEvent, assignment_transition, returning_transition,
};
use crate::model::{
    Asset, AssetFilter, AssetPatch, AssetState, Assignment, AssignmentFilter, AssignmentPatch,
    AssignmentState, Category, CategoryReport, Gender, ReturningFilter, ReturningRequest,
    ReturningState, Role, User, UserFilter, UserPatch,
};
use anyhow::anyhow;
use assetdesk_common::Location;
use assetdesk_common::ids::{AssetId, AssignmentId, CategoryId, ReturningRequestId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

/// Durable asset store backed by Postgres.
///
/// # Errors
/// - Connection and query failures are surfaced as [`StoreError::Unexpected`].
/// - Unique-key violations are surfaced as [`StoreError::Conflict`].
///
/// # Example
/// ```rust,no_run
/// use assetdesk::config::PostgresConfig;
/// use assetdesk::store::postgres::PostgresStore;
///
/// async fn open(pg: PostgresConfig) {
///     let _ = PostgresStore::connect(&pg).await;
/// }
/// ```
pub struct PostgresStore {
    pool: PgPool,
}

#[derive(Debug, Clone, FromRow)]
struct DbCategory {
    id: Uuid,
    name: String,
    prefix: String,
}

#[derive(Debug, Clone, FromRow)]
struct DbAsset {
    id: Uuid,
    code: String,
    name: String,
    category_id: Uuid,
    specification: String,
    installed_date: NaiveDate,
    state: String,
    location: String,
    is_deleted: bool,
}

#[derive(Debug, Clone, FromRow)]
struct DbUser {
    id: Uuid,
    staff_code: String,
    username: String,
    first_name: String,
    last_name: String,
    date_of_birth: NaiveDate,
    joined_date: NaiveDate,
    gender: String,
    role: String,
    location: String,
    password_hash: String,
    is_first_login: bool,
    is_disabled: bool,
}

#[derive(Debug, Clone, FromRow)]
struct DbAssignment {
    id: Uuid,
    asset_id: Uuid,
    assigned_to: Uuid,
    assigned_by: Uuid,
    assigned_date: NaiveDate,
    note: String,
    state: String,
    is_deleted: bool,
}

#[derive(Debug, Clone, FromRow)]
struct DbReturning {
    id: Uuid,
    assignment_id: Uuid,
    requested_by: Uuid,
    accepted_by: Option<Uuid>,
    returned_date: Option<NaiveDate>,
    state: String,
    is_deleted: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
struct DbReportRow {
    category: String,
    total: i64,
    available: i64,
    not_available: i64,
    assigned: i64,
    waiting_for_recycling: i64,
    recycled: i64,
}

const ASSET_COLUMNS: &str = "a.id, a.code, a.name, a.category_id, a.specification, \
     a.installed_date, a.state, a.location, a.is_deleted";
const USER_COLUMNS: &str = "id, staff_code, username, first_name, last_name, date_of_birth, \
     joined_date, gender, role, location, password_hash, is_first_login, is_disabled";
const ASSIGNMENT_COLUMNS: &str = "s.id, s.asset_id, s.assigned_to, s.assigned_by, \
     s.assigned_date, s.note, s.state, s.is_deleted";
const RETURNING_COLUMNS: &str = "r.id, r.assignment_id, r.requested_by, r.accepted_by, \
     r.returned_date, r.state, r.is_deleted, r.created_at";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Unexpected(err.into())
    }
}

impl PostgresStore {
    /// Connect to Postgres and apply the embedded migrations before serving.
    pub async fn connect(pg: &PostgresConfig) -> StoreResult<Self> {
        let connect_options = PgConnectOptions::from_str(&pg.url)?;
        let pool = PgPoolOptions::new()
            .max_connections(pg.max_connections)
            .acquire_timeout(Duration::from_millis(pg.acquire_timeout_ms))
            .connect_with(connect_options);
        let pool = tokio::time::timeout(Duration::from_millis(pg.connect_timeout_ms), pool)
            .await
            .map_err(|_| StoreError::Unexpected(anyhow!("postgres connect timed out")))??;

        // Handlers assume the schema exists; fail startup otherwise.
        sqlx::migrate!("./migrations").run(&pool).await?;

        let store = Self { pool };
        store.refresh_counts().await?;
        Ok(store)
    }

    async fn refresh_counts(&self) -> StoreResult<()> {
        let assets: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM assets WHERE NOT is_deleted")
            .fetch_one(&self.pool)
            .await?;
        metrics::gauge!("assetdesk_assets_total").set(assets as f64);

        let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE NOT is_disabled")
            .fetch_one(&self.pool)
            .await?;
        metrics::gauge!("assetdesk_users_total").set(users as f64);
        Ok(())
    }

    async fn lock_asset(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<Asset> {
        let query = format!(
            "SELECT {ASSET_COLUMNS} FROM assets a WHERE a.id = $1 AND NOT a.is_deleted FOR UPDATE"
        );
        let row = sqlx::query_as::<_, DbAsset>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("asset".into()))?;
        asset_from_db(row)
    }

    async fn lock_assignment(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<Assignment> {
        let query = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments s \
             WHERE s.id = $1 AND NOT s.is_deleted FOR UPDATE"
        );
        let row = sqlx::query_as::<_, DbAssignment>(&query)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("assignment".into()))?;
        assignment_from_db(row)
    }

    async fn set_asset_state(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
        state: AssetState,
    ) -> StoreResult<()> {
        sqlx::query("UPDATE assets SET state = $2 WHERE id = $1")
            .bind(id)
            .bind(asset_state_to_str(state))
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    async fn require_enabled_user(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> StoreResult<()> {
        let disabled: Option<bool> =
            sqlx::query_scalar("SELECT is_disabled FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut **tx)
                .await?;
        match disabled {
            None => Err(StoreError::NotFound("user".into())),
            Some(true) => Err(StoreError::Rejected("user is disabled".into())),
            Some(false) => Ok(()),
        }
    }
}

#[async_trait]
impl AssetStore for PostgresStore {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, DbCategory>(
            "SELECT id, name, prefix FROM categories ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(category_from_db).collect())
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Category> {
        let row = sqlx::query_as::<_, DbCategory>(
            "SELECT id, name, prefix FROM categories WHERE id = $1",
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound("category".into()))?;
        Ok(category_from_db(row))
    }

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        let mut tx = self.pool.begin().await?;
        // Self-conflicting lock: concurrent creators run the overlap check one at a time.
        sqlx::query("LOCK TABLE categories IN SHARE ROW EXCLUSIVE MODE")
            .execute(&mut *tx)
            .await?;
        // A prefix that extends another would make code scans ambiguous.
        let overlapping: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM categories WHERE starts_with(prefix, $1) OR starts_with($1, prefix))",
        )
        .bind(&category.prefix)
        .fetch_one(&mut *tx)
        .await?;
        if overlapping {
            return Err(StoreError::Conflict("category prefix".into()));
        }
        let insert = sqlx::query("INSERT INTO categories (id, name, prefix) VALUES ($1, $2, $3)")
            .bind(category.id.as_uuid())
            .bind(&category.name)
            .bind(&category.prefix)
            .execute(&mut *tx)
            .await;
        if let Err(err) = insert {
            if let Some(constraint) = unique_violation(&err) {
                let what = if constraint.contains("prefix") {
                    "category prefix"
                } else {
                    "category name"
                };
                return Err(StoreError::Conflict(what.into()));
            }
            return Err(err.into());
        }
        tx.commit().await?;
        Ok(category)
    }

    async fn list_assets(&self, filter: &AssetFilter) -> StoreResult<Vec<Asset>> {
        let states = to_strings(&filter.states, asset_state_to_str);
        let query = format!(
            "SELECT {ASSET_COLUMNS} FROM assets a \
             WHERE NOT a.is_deleted AND a.location = $1 \
               AND (cardinality($2::text[]) = 0 OR a.state = ANY($2)) \
               AND ($3::uuid IS NULL OR a.category_id = $3) \
               AND ($4::text IS NULL OR strpos(lower(a.code), lower($4)) > 0 \
                    OR strpos(lower(a.name), lower($4)) > 0) \
             ORDER BY a.code"
        );
        let rows = sqlx::query_as::<_, DbAsset>(&query)
            .bind(filter.location.as_str())
            .bind(&states)
            .bind(filter.category_id.map(|id| id.as_uuid()))
            .bind(filter.search.as_deref())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(asset_from_db).collect()
    }

    async fn get_asset(&self, id: AssetId) -> StoreResult<Asset> {
        let query =
            format!("SELECT {ASSET_COLUMNS} FROM assets a WHERE a.id = $1 AND NOT a.is_deleted");
        let row = sqlx::query_as::<_, DbAsset>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("asset".into()))?;
        asset_from_db(row)
    }

    async fn create_asset(&self, asset: Asset) -> StoreResult<Asset> {
        let mut tx = self.pool.begin().await?;
        let category_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM categories WHERE id = $1)")
                .bind(asset.category_id.as_uuid())
                .fetch_one(&mut *tx)
                .await?;
        if !category_exists {
            return Err(StoreError::NotFound("category".into()));
        }
        let insert = sqlx::query(
            "INSERT INTO assets (id, code, name, category_id, specification, installed_date, state, location, is_deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, FALSE)",
        )
        .bind(asset.id.as_uuid())
        .bind(&asset.code)
        .bind(&asset.name)
        .bind(asset.category_id.as_uuid())
        .bind(&asset.specification)
        .bind(asset.installed_date)
        .bind(asset_state_to_str(asset.state))
        .bind(asset.location.as_str())
        .execute(&mut *tx)
        .await;
        if let Err(err) = insert {
            if unique_violation(&err).is_some() {
                return Err(StoreError::Conflict("asset code".into()));
            }
            return Err(err.into());
        }
        tx.commit().await?;
        self.refresh_counts().await?;
        Ok(asset)
    }

    async fn update_asset(&self, id: AssetId, patch: AssetPatch) -> StoreResult<Asset> {
        let mut tx = self.pool.begin().await?;
        let mut asset = Self::lock_asset(&mut tx, id.as_uuid()).await?;
        if asset.state == AssetState::Assigned {
            return Err(StoreError::Rejected("asset is assigned".into()));
        }
        if let Some(name) = patch.name {
            asset.name = name;
        }
        if let Some(specification) = patch.specification {
            asset.specification = specification;
        }
        if let Some(installed_date) = patch.installed_date {
            asset.installed_date = installed_date;
        }
        if let Some(state) = patch.state {
            asset.state = state;
        }
        sqlx::query(
            "UPDATE assets SET name = $2, specification = $3, installed_date = $4, state = $5 WHERE id = $1",
        )
        .bind(asset.id.as_uuid())
        .bind(&asset.name)
        .bind(&asset.specification)
        .bind(asset.installed_date)
        .bind(asset_state_to_str(asset.state))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(asset)
    }

    async fn delete_asset(&self, id: AssetId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let asset = Self::lock_asset(&mut tx, id.as_uuid()).await?;
        let has_history: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM assignments WHERE asset_id = $1 AND NOT is_deleted)",
        )
        .bind(asset.id.as_uuid())
        .fetch_one(&mut *tx)
        .await?;
        if asset.state == AssetState::Assigned || has_history {
            return Err(StoreError::Rejected("asset has assignment history".into()));
        }
        sqlx::query("UPDATE assets SET is_deleted = TRUE WHERE id = $1")
            .bind(asset.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.refresh_counts().await?;
        Ok(())
    }

    async fn max_asset_code(&self, prefix: &str) -> StoreResult<Option<String>> {
        let max: Option<String> =
            sqlx::query_scalar("SELECT MAX(code) FROM assets WHERE starts_with(code, $1)")
                .bind(prefix)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let roles = to_strings(&filter.roles, role_to_str);
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE NOT is_disabled AND location = $1 \
               AND (cardinality($2::text[]) = 0 OR role = ANY($2)) \
               AND ($3::text IS NULL OR strpos(lower(staff_code), lower($3)) > 0 \
                    OR strpos(lower(username), lower($3)) > 0 \
                    OR strpos(lower(first_name || ' ' || last_name), lower($3)) > 0) \
             ORDER BY staff_code"
        );
        let rows = sqlx::query_as::<_, DbUser>(&query)
            .bind(filter.location.as_str())
            .bind(&roles)
            .bind(filter.search.as_deref())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(user_from_db).collect()
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, DbUser>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user_from_db(row)
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<User> {
        let query = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, DbUser>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user_from_db(row)
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let insert = sqlx::query(
            "INSERT INTO users (id, staff_code, username, first_name, last_name, date_of_birth, joined_date, gender, role, location, password_hash, is_first_login, is_disabled) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(user.id.as_uuid())
        .bind(&user.staff_code)
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(user.date_of_birth)
        .bind(user.joined_date)
        .bind(gender_to_str(user.gender))
        .bind(role_to_str(user.role))
        .bind(user.location.as_str())
        .bind(&user.password_hash)
        .bind(user.is_first_login)
        .bind(user.is_disabled)
        .execute(&self.pool)
        .await;
        if let Err(err) = insert {
            if let Some(constraint) = unique_violation(&err) {
                let what = if constraint.contains("staff_code") {
                    "staff code"
                } else {
                    "username"
                };
                return Err(StoreError::Conflict(what.into()));
            }
            return Err(err.into());
        }
        self.refresh_counts().await?;
        Ok(user)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND NOT is_disabled FOR UPDATE"
        );
        let row = sqlx::query_as::<_, DbUser>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        let mut user = user_from_db(row)?;
        if let Some(date_of_birth) = patch.date_of_birth {
            user.date_of_birth = date_of_birth;
        }
        if let Some(joined_date) = patch.joined_date {
            user.joined_date = joined_date;
        }
        if let Some(gender) = patch.gender {
            user.gender = gender;
        }
        if let Some(role) = patch.role {
            user.role = role;
        }
        sqlx::query(
            "UPDATE users SET date_of_birth = $2, joined_date = $3, gender = $4, role = $5 WHERE id = $1",
        )
        .bind(user.id.as_uuid())
        .bind(user.date_of_birth)
        .bind(user.joined_date)
        .bind(gender_to_str(user.gender))
        .bind(role_to_str(user.role))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(user)
    }

    async fn disable_user(&self, id: UserId) -> StoreResult<User> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND NOT is_disabled FOR UPDATE"
        );
        let row = sqlx::query_as::<_, DbUser>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        let holds_assets: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM assignments WHERE assigned_to = $1 AND NOT is_deleted AND state = ANY($2))",
        )
        .bind(id.as_uuid())
        .bind(vec![
            assignment_state_to_str(AssignmentState::WaitingForAcceptance).to_string(),
            assignment_state_to_str(AssignmentState::Accepted).to_string(),
        ])
        .fetch_one(&mut *tx)
        .await?;
        if holds_assets {
            return Err(StoreError::Rejected("user has valid assignments".into()));
        }
        sqlx::query("UPDATE users SET is_disabled = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        self.refresh_counts().await?;
        let mut user = user_from_db(row)?;
        user.is_disabled = true;
        Ok(user)
    }

    async fn set_password(&self, id: UserId, password_hash: String) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, is_first_login = FALSE WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound("user".into()));
        }
        Ok(())
    }

    async fn max_staff_code(&self, prefix: &str) -> StoreResult<Option<String>> {
        let max: Option<String> =
            sqlx::query_scalar("SELECT MAX(staff_code) FROM users WHERE starts_with(staff_code, $1)")
                .bind(prefix)
                .fetch_one(&self.pool)
                .await?;
        Ok(max)
    }

    async fn usernames_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let names: Vec<String> =
            sqlx::query_scalar("SELECT username FROM users WHERE starts_with(username, $1)")
                .bind(prefix)
                .fetch_all(&self.pool)
                .await?;
        Ok(names)
    }

    async fn list_usernames(&self) -> StoreResult<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar("SELECT username FROM users")
            .fetch_all(&self.pool)
            .await?;
        Ok(names)
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let states = to_strings(&filter.states, assignment_state_to_str);
        let query = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments s JOIN assets a ON a.id = s.asset_id \
             WHERE NOT s.is_deleted \
               AND ($1::text IS NULL OR a.location = $1) \
               AND ($2::uuid IS NULL OR s.assigned_to = $2) \
               AND (cardinality($3::text[]) = 0 OR s.state = ANY($3)) \
               AND ($4::date IS NULL OR s.assigned_date = $4) \
               AND ($5::text IS NULL OR strpos(lower(a.code), lower($5)) > 0 \
                    OR strpos(lower(a.name), lower($5)) > 0) \
             ORDER BY s.assigned_date"
        );
        let rows = sqlx::query_as::<_, DbAssignment>(&query)
            .bind(filter.location.as_ref().map(Location::as_str))
            .bind(filter.assigned_to.map(|id| id.as_uuid()))
            .bind(&states)
            .bind(filter.assigned_date)
            .bind(filter.search.as_deref())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(assignment_from_db).collect()
    }

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Assignment> {
        let query = format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM assignments s WHERE s.id = $1 AND NOT s.is_deleted"
        );
        let row = sqlx::query_as::<_, DbAssignment>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("assignment".into()))?;
        assignment_from_db(row)
    }

    async fn create_assignment(&self, assignment: Assignment) -> StoreResult<Assignment> {
        let mut tx = self.pool.begin().await?;
        Self::require_enabled_user(&mut tx, assignment.assigned_to.as_uuid()).await?;
        let asset = Self::lock_asset(&mut tx, assignment.asset_id.as_uuid()).await?;
        if asset.state != AssetState::Available {
            return Err(StoreError::Rejected("asset is not available".into()));
        }
        Self::set_asset_state(&mut tx, asset.id.as_uuid(), AssetState::Assigned).await?;
        sqlx::query(
            "INSERT INTO assignments (id, asset_id, assigned_to, assigned_by, assigned_date, note, state, is_deleted) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE)",
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.asset_id.as_uuid())
        .bind(assignment.assigned_to.as_uuid())
        .bind(assignment.assigned_by.as_uuid())
        .bind(assignment.assigned_date)
        .bind(&assignment.note)
        .bind(assignment_state_to_str(assignment.state))
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(assignment)
    }

    async fn edit_assignment(
        &self,
        id: AssignmentId,
        patch: AssignmentPatch,
    ) -> StoreResult<Assignment> {
        let mut tx = self.pool.begin().await?;
        let mut assignment = Self::lock_assignment(&mut tx, id.as_uuid()).await?;
        assignment_transition(assignment.state, AssignmentEvent::Edit)?;

        if let Some(user_id) = patch.assigned_to {
            Self::require_enabled_user(&mut tx, user_id.as_uuid()).await?;
            assignment.assigned_to = user_id;
        }
        if let Some(asset_id) = patch.asset_id.filter(|asset_id| *asset_id != assignment.asset_id) {
            let replacement = Self::lock_asset(&mut tx, asset_id.as_uuid()).await?;
            if replacement.state != AssetState::Available {
                return Err(StoreError::Rejected("asset is not available".into()));
            }
            Self::set_asset_state(&mut tx, asset_id.as_uuid(), AssetState::Assigned).await?;
            Self::set_asset_state(&mut tx, assignment.asset_id.as_uuid(), AssetState::Available)
                .await?;
            assignment.asset_id = asset_id;
        }
        if let Some(date) = patch.assigned_date {
            assignment.assigned_date = date;
        }
        if let Some(note) = patch.note {
            assignment.note = note;
        }
        sqlx::query(
            "UPDATE assignments SET asset_id = $2, assigned_to = $3, assigned_date = $4, note = $5 WHERE id = $1",
        )
        .bind(assignment.id.as_uuid())
        .bind(assignment.asset_id.as_uuid())
        .bind(assignment.assigned_to.as_uuid())
        .bind(assignment.assigned_date)
        .bind(&assignment.note)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(assignment)
    }

    async fn respond_to_assignment(
        &self,
        id: AssignmentId,
        event: AssignmentEvent,
    ) -> StoreResult<Assignment> {
        if !matches!(event, AssignmentEvent::Accept | AssignmentEvent::Decline) {
            return Err(StoreError::Unexpected(anyhow!(
                "unsupported assignment response {event:?}"
            )));
        }
        let mut tx = self.pool.begin().await?;
        let mut assignment = Self::lock_assignment(&mut tx, id.as_uuid()).await?;
        let rule = assignment_transition(assignment.state, event)?;
        if let Some(asset_state) = rule.asset {
            Self::set_asset_state(&mut tx, assignment.asset_id.as_uuid(), asset_state).await?;
        }
        sqlx::query("UPDATE assignments SET state = $2 WHERE id = $1")
            .bind(assignment.id.as_uuid())
            .bind(assignment_state_to_str(rule.to))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        assignment.state = rule.to;
        Ok(assignment)
    }

    async fn delete_assignment(&self, id: AssignmentId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let assignment = Self::lock_assignment(&mut tx, id.as_uuid()).await?;
        let rule = assignment_transition(assignment.state, AssignmentEvent::Delete)?;
        if let Some(asset_state) = rule.asset {
            Self::set_asset_state(&mut tx, assignment.asset_id.as_uuid(), asset_state).await?;
        }
        sqlx::query("UPDATE assignments SET is_deleted = TRUE WHERE id = $1")
            .bind(assignment.id.as_uuid())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_returning_requests(
        &self,
        filter: &ReturningFilter,
    ) -> StoreResult<Vec<ReturningRequest>> {
        let states = to_strings(&filter.states, returning_state_to_str);
        let query = format!(
            "SELECT {RETURNING_COLUMNS} FROM returning_requests r \
             JOIN assignments s ON s.id = r.assignment_id \
             JOIN assets a ON a.id = s.asset_id \
             WHERE NOT r.is_deleted AND a.location = $1 \
               AND (cardinality($2::text[]) = 0 OR r.state = ANY($2)) \
               AND ($3::date IS NULL OR r.returned_date = $3) \
               AND ($4::text IS NULL OR strpos(lower(a.code), lower($4)) > 0 \
                    OR strpos(lower(a.name), lower($4)) > 0) \
             ORDER BY r.created_at"
        );
        let rows = sqlx::query_as::<_, DbReturning>(&query)
            .bind(filter.location.as_str())
            .bind(&states)
            .bind(filter.returned_date)
            .bind(filter.search.as_deref())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(returning_from_db).collect()
    }

    async fn get_returning_request(
        &self,
        id: ReturningRequestId,
    ) -> StoreResult<ReturningRequest> {
        let query = format!(
            "SELECT {RETURNING_COLUMNS} FROM returning_requests r WHERE r.id = $1 AND NOT r.is_deleted"
        );
        let row = sqlx::query_as::<_, DbReturning>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound("returning request".into()))?;
        returning_from_db(row)
    }

    async fn create_returning_request(
        &self,
        request: ReturningRequest,
    ) -> StoreResult<ReturningRequest> {
        let mut tx = self.pool.begin().await?;
        // Locking the assignment serializes concurrent requests for it.
        let assignment = Self::lock_assignment(&mut tx, request.assignment_id.as_uuid()).await?;
        assignment_transition(assignment.state, AssignmentEvent::RequestReturn)?;
        let insert = sqlx::query(
            "INSERT INTO returning_requests (id, assignment_id, requested_by, accepted_by, returned_date, state, is_deleted, created_at) \
             VALUES ($1, $2, $3, NULL, NULL, $4, FALSE, $5)",
        )
        .bind(request.id.as_uuid())
        .bind(request.assignment_id.as_uuid())
        .bind(request.requested_by.as_uuid())
        .bind(returning_state_to_str(request.state))
        .bind(request.created_at)
        .execute(&mut *tx)
        .await;
        if let Err(err) = insert {
            if unique_violation(&err).is_some() {
                return Err(StoreError::Conflict("active returning request".into()));
            }
            return Err(err.into());
        }
        tx.commit().await?;
        Ok(request)
    }

    async fn cancel_returning_request(&self, id: ReturningRequestId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "SELECT {RETURNING_COLUMNS} FROM returning_requests r \
             WHERE r.id = $1 AND NOT r.is_deleted FOR UPDATE"
        );
        let row = sqlx::query_as::<_, DbReturning>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("returning request".into()))?;
        let request = returning_from_db(row)?;
        let rule = returning_transition(request.state, ReturningEvent::Cancel)?;
        sqlx::query("UPDATE returning_requests SET state = $2, is_deleted = TRUE WHERE id = $1")
            .bind(request.id.as_uuid())
            .bind(returning_state_to_str(rule.to))
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn complete_returning_request(
        &self,
        id: ReturningRequestId,
        accepted_by: UserId,
        returned_date: NaiveDate,
    ) -> StoreResult<ReturningRequest> {
        let mut tx = self.pool.begin().await?;
        let query = format!(
            "SELECT {RETURNING_COLUMNS} FROM returning_requests r \
             WHERE r.id = $1 AND NOT r.is_deleted FOR UPDATE"
        );
        let row = sqlx::query_as::<_, DbReturning>(&query)
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| StoreError::NotFound("returning request".into()))?;
        let mut request = returning_from_db(row)?;
        let request_rule = returning_transition(request.state, ReturningEvent::Complete)?;
        let assignment = Self::lock_assignment(&mut tx, request.assignment_id.as_uuid()).await?;
        let assignment_rule =
            assignment_transition(assignment.state, AssignmentEvent::CompleteReturn)?;

        if let Some(asset_state) = assignment_rule.asset.or(request_rule.asset) {
            Self::set_asset_state(&mut tx, assignment.asset_id.as_uuid(), asset_state).await?;
        }
        sqlx::query("UPDATE assignments SET state = $2 WHERE id = $1")
            .bind(assignment.id.as_uuid())
            .bind(assignment_state_to_str(assignment_rule.to))
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "UPDATE returning_requests SET state = $2, accepted_by = $3, returned_date = $4 WHERE id = $1",
        )
        .bind(request.id.as_uuid())
        .bind(returning_state_to_str(request_rule.to))
        .bind(accepted_by.as_uuid())
        .bind(returned_date)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        request.state = request_rule.to;
        request.accepted_by = Some(accepted_by);
        request.returned_date = Some(returned_date);
        Ok(request)
    }

    async fn category_report(&self, location: &Location) -> StoreResult<Vec<CategoryReport>> {
        let rows = sqlx::query_as::<_, DbReportRow>(
            r#"SELECT c.name AS category,
                      COUNT(a.id) AS total,
                      COUNT(a.id) FILTER (WHERE a.state = 'Available') AS available,
                      COUNT(a.id) FILTER (WHERE a.state = 'NotAvailable') AS not_available,
                      COUNT(a.id) FILTER (WHERE a.state = 'Assigned') AS assigned,
                      COUNT(a.id) FILTER (WHERE a.state = 'WaitingForRecycling') AS waiting_for_recycling,
                      COUNT(a.id) FILTER (WHERE a.state = 'Recycled') AS recycled
               FROM categories c
               LEFT JOIN assets a
                 ON a.category_id = c.id AND NOT a.is_deleted AND a.location = $1
               GROUP BY c.name
               ORDER BY c.name"#,
        )
        .bind(location.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| CategoryReport {
                category: row.category,
                total: row.total as u64,
                available: row.available as u64,
                not_available: row.not_available as u64,
                assigned: row.assigned as u64,
                waiting_for_recycling: row.waiting_for_recycling as u64,
                recycled: row.recycled as u64,
            })
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn is_durable(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

/// Name of the violated unique constraint, when `err` is a unique violation.
fn unique_violation(err: &sqlx::Error) -> Option<String> {
    if let sqlx::Error::Database(db_err) = err {
        if db_err.code().is_some_and(|code| code == "23505") {
            return Some(db_err.constraint().unwrap_or_default().to_string());
        }
    }
    None
}

fn to_strings<T: Copy>(values: &[T], to_str: fn(T) -> &'static str) -> Vec<String> {
    values.iter().map(|value| to_str(*value).to_string()).collect()
}

fn parse_location(value: &str) -> StoreResult<Location> {
    Location::new(value).map_err(|err| StoreError::Unexpected(err.into()))
}

fn category_from_db(row: DbCategory) -> Category {
    Category {
        id: CategoryId::from_uuid(row.id),
        name: row.name,
        prefix: row.prefix,
    }
}

fn asset_from_db(row: DbAsset) -> StoreResult<Asset> {
    Ok(Asset {
        id: AssetId::from_uuid(row.id),
        code: row.code,
        name: row.name,
        category_id: CategoryId::from_uuid(row.category_id),
        specification: row.specification,
        installed_date: row.installed_date,
        state: parse_asset_state(&row.state)?,
        location: parse_location(&row.location)?,
        is_deleted: row.is_deleted,
    })
}

fn user_from_db(row: DbUser) -> StoreResult<User> {
    Ok(User {
        id: UserId::from_uuid(row.id),
        staff_code: row.staff_code,
        username: row.username,
        first_name: row.first_name,
        last_name: row.last_name,
        date_of_birth: row.date_of_birth,
        joined_date: row.joined_date,
        gender: parse_gender(&row.gender)?,
        role: parse_role(&row.role)?,
        location: parse_location(&row.location)?,
        password_hash: row.password_hash,
        is_first_login: row.is_first_login,
        is_disabled: row.is_disabled,
    })
}

fn assignment_from_db(row: DbAssignment) -> StoreResult<Assignment> {
    Ok(Assignment {
        id: AssignmentId::from_uuid(row.id),
        asset_id: AssetId::from_uuid(row.asset_id),
        assigned_to: UserId::from_uuid(row.assigned_to),
        assigned_by: UserId::from_uuid(row.assigned_by),
        assigned_date: row.assigned_date,
        note: row.note,
        state: parse_assignment_state(&row.state)?,
        is_deleted: row.is_deleted,
    })
}

fn returning_from_db(row: DbReturning) -> StoreResult<ReturningRequest> {
    Ok(ReturningRequest {
        id: ReturningRequestId::from_uuid(row.id),
        assignment_id: AssignmentId::from_uuid(row.assignment_id),
        requested_by: UserId::from_uuid(row.requested_by),
        accepted_by: row.accepted_by.map(UserId::from_uuid),
        returned_date: row.returned_date,
        state: parse_returning_state(&row.state)?,
        is_deleted: row.is_deleted,
        created_at: row.created_at,
    })
}

fn parse_asset_state(value: &str) -> StoreResult<AssetState> {
    match value {
        "Available" => Ok(AssetState::Available),
        "NotAvailable" => Ok(AssetState::NotAvailable),
        "Assigned" => Ok(AssetState::Assigned),
        "WaitingForRecycling" => Ok(AssetState::WaitingForRecycling),
        "Recycled" => Ok(AssetState::Recycled),
        _ => Err(StoreError::Unexpected(anyhow!("invalid asset state {value}"))),
    }
}

fn asset_state_to_str(state: AssetState) -> &'static str {
    match state {
        AssetState::Available => "Available",
        AssetState::NotAvailable => "NotAvailable",
        AssetState::Assigned => "Assigned",
        AssetState::WaitingForRecycling => "WaitingForRecycling",
        AssetState::Recycled => "Recycled",
    }
}

fn parse_assignment_state(value: &str) -> StoreResult<AssignmentState> {
    match value {
        "WaitingForAcceptance" => Ok(AssignmentState::WaitingForAcceptance),
        "Accepted" => Ok(AssignmentState::Accepted),
        "Declined" => Ok(AssignmentState::Declined),
        "Returned" => Ok(AssignmentState::Returned),
        _ => Err(StoreError::Unexpected(anyhow!(
            "invalid assignment state {value}"
        ))),
    }
}

fn assignment_state_to_str(state: AssignmentState) -> &'static str {
    match state {
        AssignmentState::WaitingForAcceptance => "WaitingForAcceptance",
        AssignmentState::Accepted => "Accepted",
        AssignmentState::Declined => "Declined",
        AssignmentState::Returned => "Returned",
    }
}

fn parse_returning_state(value: &str) -> StoreResult<ReturningState> {
    match value {
        "WaitingForReturning" => Ok(ReturningState::WaitingForReturning),
        "Completed" => Ok(ReturningState::Completed),
        "Cancelled" => Ok(ReturningState::Cancelled),
        _ => Err(StoreError::Unexpected(anyhow!(
            "invalid returning state {value}"
        ))),
    }
}

fn returning_state_to_str(state: ReturningState) -> &'static str {
    match state {
        ReturningState::WaitingForReturning => "WaitingForReturning",
        ReturningState::Completed => "Completed",
        ReturningState::Cancelled => "Cancelled",
    }
}

fn parse_role(value: &str) -> StoreResult<Role> {
    match value {
        "Admin" => Ok(Role::Admin),
        "Staff" => Ok(Role::Staff),
        _ => Err(StoreError::Unexpected(anyhow!("invalid role {value}"))),
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "Admin",
        Role::Staff => "Staff",
    }
}

fn parse_gender(value: &str) -> StoreResult<Gender> {
    match value {
        "Female" => Ok(Gender::Female),
        "Male" => Ok(Gender::Male),
        "Unspecified" => Ok(Gender::Unspecified),
        _ => Err(StoreError::Unexpected(anyhow!("invalid gender {value}"))),
    }
}

fn gender_to_str(gender: Gender) -> &'static str {
    match gender {
        Gender::Female => "Female",
        Gender::Male => "Male",
        Gender::Unspecified => "Unspecified",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_mappers_round_trip_every_variant() {
        for state in [
            AssetState::Available,
            AssetState::NotAvailable,
            AssetState::Assigned,
            AssetState::WaitingForRecycling,
            AssetState::Recycled,
        ] {
            assert_eq!(parse_asset_state(asset_state_to_str(state)).expect("asset"), state);
        }
        for state in [
            AssignmentState::WaitingForAcceptance,
            AssignmentState::Accepted,
            AssignmentState::Declined,
            AssignmentState::Returned,
        ] {
            assert_eq!(
                parse_assignment_state(assignment_state_to_str(state)).expect("assignment"),
                state
            );
        }
        for state in [
            ReturningState::WaitingForReturning,
            ReturningState::Completed,
            ReturningState::Cancelled,
        ] {
            assert_eq!(
                parse_returning_state(returning_state_to_str(state)).expect("returning"),
                state
            );
        }
        assert_eq!(parse_role(role_to_str(Role::Admin)).expect("role"), Role::Admin);
        assert_eq!(
            parse_gender(gender_to_str(Gender::Female)).expect("gender"),
            Gender::Female
        );
    }

    #[test]
    fn invalid_enum_values_are_unexpected() {
        assert!(matches!(
            parse_asset_state("Broken"),
            Err(StoreError::Unexpected(_))
        ));
        assert!(matches!(parse_role("root"), Err(StoreError::Unexpected(_))));
    }

    #[test]
    fn active_index_matches_waiting_state_name() {
        // The partial unique index in the migration filters on this literal.
        assert_eq!(
            returning_state_to_str(ReturningState::WaitingForReturning),
            "WaitingForReturning"
        );
        let migration = include_str!("../../migrations/0001_init.sql");
        assert!(migration.contains("WHERE state = 'WaitingForReturning' AND NOT is_deleted"));
    }

    #[test]
    fn asset_row_maps_to_domain() {
        let id = Uuid::new_v4();
        let category_id = Uuid::new_v4();
        let asset = asset_from_db(DbAsset {
            id,
            code: "LA000001".to_string(),
            name: "Laptop".to_string(),
            category_id,
            specification: "spec".to_string(),
            installed_date: NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            state: "Assigned".to_string(),
            location: "hcm".to_string(),
            is_deleted: false,
        })
        .expect("map");
        assert_eq!(asset.id.as_uuid(), id);
        assert_eq!(asset.state, AssetState::Assigned);
        assert_eq!(asset.location.as_str(), "HCM");
    }
}
