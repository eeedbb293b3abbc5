//! In-memory implementation of the asset store.
//!
//! # Purpose
//! This store implements the `AssetStore` trait entirely in memory. It exists for:
//! - local development and tests (no external dependencies)
//! - deployments where durability is not required
//!
//! # Durability and consistency
//! - **Not durable**: all state is lost on process restart.
//! - **Single unit of work**: every table lives behind one `tokio::sync::RwLock`. Guard-and-mutate
//!   sequences (accept an assignment and flip its asset, complete a returning request and free the
//!   asset) touch several tables, so they run under a single write guard and can never interleave.
//! - **No multi-node coordination**: multiple instances each have independent state.
//!
//! # Metrics
//! Gauges for asset and user totals mirror the durable backend.
use super::{AssetStore, StoreError, StoreResult};
use crate::lifecycle::{
    AssignmentEvent, ReturningEvent, assignment_transition, returning_transition,
};
use crate::model::{
    Asset, AssetFilter, AssetPatch, AssetState, Assignment, AssignmentFilter, AssignmentPatch,
    AssignmentState, Category, CategoryReport, ReturningFilter, ReturningRequest, User,
    UserFilter, UserPatch,
};
use assetdesk_common::Location;
use assetdesk_common::ids::{AssetId, AssignmentId, CategoryId, ReturningRequestId, UserId};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    categories: HashMap<CategoryId, Category>,
    assets: HashMap<AssetId, Asset>,
    users: HashMap<UserId, User>,
    assignments: HashMap<AssignmentId, Assignment>,
    returning: HashMap<ReturningRequestId, ReturningRequest>,
}

impl Tables {
    fn live_asset_mut(&mut self, id: AssetId) -> StoreResult<&mut Asset> {
        self.assets
            .get_mut(&id)
            .filter(|asset| !asset.is_deleted)
            .ok_or_else(|| StoreError::NotFound("asset".into()))
    }

    fn live_assignment(&self, id: AssignmentId) -> StoreResult<&Assignment> {
        self.assignments
            .get(&id)
            .filter(|assignment| !assignment.is_deleted)
            .ok_or_else(|| StoreError::NotFound("assignment".into()))
    }

    fn enabled_user(&self, id: UserId) -> StoreResult<&User> {
        match self.users.get(&id) {
            Some(user) if user.is_disabled => Err(StoreError::Rejected("user is disabled".into())),
            Some(user) => Ok(user),
            None => Err(StoreError::NotFound("user".into())),
        }
    }

    fn set_asset_state(&mut self, id: AssetId, state: AssetState) -> StoreResult<()> {
        self.live_asset_mut(id)?.state = state;
        Ok(())
    }

    /// Text matched by assignment and returning-request searches.
    fn asset_matches(&self, asset_id: AssetId, location: Option<&Location>, search: Option<&str>) -> bool {
        let Some(asset) = self.assets.get(&asset_id) else {
            return false;
        };
        if let Some(location) = location {
            if &asset.location != location {
                return false;
            }
        }
        match search {
            Some(term) => {
                let term = term.to_lowercase();
                asset.code.to_lowercase().contains(&term)
                    || asset.name.to_lowercase().contains(&term)
            }
            None => true,
        }
    }

    fn record_gauges(&self) {
        let assets = self.assets.values().filter(|a| !a.is_deleted).count();
        let users = self.users.values().filter(|u| !u.is_disabled).count();
        metrics::gauge!("assetdesk_assets_total").set(assets as f64);
        metrics::gauge!("assetdesk_users_total").set(users as f64);
    }
}

/// In-memory asset store.
///
/// Reads take the shared guard and may run concurrently; every mutation takes the exclusive guard
/// for its whole guard-and-mutate sequence.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetStore for InMemoryStore {
    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables.categories.values().cloned().collect();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn get_category(&self, id: CategoryId) -> StoreResult<Category> {
        self.tables
            .read()
            .await
            .categories
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("category".into()))
    }

    async fn create_category(&self, category: Category) -> StoreResult<Category> {
        let mut tables = self.tables.write().await;
        for existing in tables.categories.values() {
            if existing.name.eq_ignore_ascii_case(&category.name) {
                return Err(StoreError::Conflict("category name".into()));
            }
            // A prefix that extends another would make code scans ambiguous.
            if existing.prefix.starts_with(&category.prefix)
                || category.prefix.starts_with(&existing.prefix)
            {
                return Err(StoreError::Conflict("category prefix".into()));
            }
        }
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn list_assets(&self, filter: &AssetFilter) -> StoreResult<Vec<Asset>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .assets
            .values()
            .filter(|asset| filter.matches(asset))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(items)
    }

    async fn get_asset(&self, id: AssetId) -> StoreResult<Asset> {
        self.tables
            .read()
            .await
            .assets
            .get(&id)
            .filter(|asset| !asset.is_deleted)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("asset".into()))
    }

    async fn create_asset(&self, asset: Asset) -> StoreResult<Asset> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&asset.category_id) {
            return Err(StoreError::NotFound("category".into()));
        }
        // Codes stay unique even across soft-deleted rows.
        if tables.assets.values().any(|a| a.code == asset.code) {
            return Err(StoreError::Conflict("asset code".into()));
        }
        tables.assets.insert(asset.id, asset.clone());
        tables.record_gauges();
        Ok(asset)
    }

    async fn update_asset(&self, id: AssetId, patch: AssetPatch) -> StoreResult<Asset> {
        let mut tables = self.tables.write().await;
        let asset = tables.live_asset_mut(id)?;
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
        Ok(asset.clone())
    }

    async fn delete_asset(&self, id: AssetId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let has_history = tables
            .assignments
            .values()
            .any(|a| a.asset_id == id && !a.is_deleted);
        let asset = tables.live_asset_mut(id)?;
        if asset.state == AssetState::Assigned || has_history {
            return Err(StoreError::Rejected("asset has assignment history".into()));
        }
        asset.is_deleted = true;
        tables.record_gauges();
        Ok(())
    }

    async fn max_asset_code(&self, prefix: &str) -> StoreResult<Option<String>> {
        Ok(self
            .tables
            .read()
            .await
            .assets
            .values()
            .filter(|asset| asset.code.starts_with(prefix))
            .map(|asset| asset.code.clone())
            .max())
    }

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .users
            .values()
            .filter(|user| filter.matches(user))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.staff_code.cmp(&b.staff_code));
        Ok(items)
    }

    async fn get_user(&self, id: UserId) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn find_user_by_username(&self, username: &str) -> StoreResult<User> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.username == username)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("user".into()))
    }

    async fn create_user(&self, user: User) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        for existing in tables.users.values() {
            if existing.username == user.username {
                return Err(StoreError::Conflict("username".into()));
            }
            if existing.staff_code == user.staff_code {
                return Err(StoreError::Conflict("staff code".into()));
            }
        }
        tables.users.insert(user.id, user.clone());
        tables.record_gauges();
        Ok(user)
    }

    async fn update_user(&self, id: UserId, patch: UserPatch) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .filter(|user| !user.is_disabled)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
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
        Ok(user.clone())
    }

    async fn disable_user(&self, id: UserId) -> StoreResult<User> {
        let mut tables = self.tables.write().await;
        let holds_assets = tables.assignments.values().any(|a| {
            a.assigned_to == id
                && !a.is_deleted
                && matches!(
                    a.state,
                    AssignmentState::WaitingForAcceptance | AssignmentState::Accepted
                )
        });
        if holds_assets {
            return Err(StoreError::Rejected("user has valid assignments".into()));
        }
        let user = tables
            .users
            .get_mut(&id)
            .filter(|user| !user.is_disabled)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user.is_disabled = true;
        let user = user.clone();
        tables.record_gauges();
        Ok(user)
    }

    async fn set_password(&self, id: UserId, password_hash: String) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("user".into()))?;
        user.password_hash = password_hash;
        user.is_first_login = false;
        Ok(())
    }

    async fn max_staff_code(&self, prefix: &str) -> StoreResult<Option<String>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|user| user.staff_code.starts_with(prefix))
            .map(|user| user.staff_code.clone())
            .max())
    }

    async fn usernames_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .filter(|user| user.username.starts_with(prefix))
            .map(|user| user.username.clone())
            .collect())
    }

    async fn list_usernames(&self) -> StoreResult<Vec<String>> {
        Ok(self
            .tables
            .read()
            .await
            .users
            .values()
            .map(|user| user.username.clone())
            .collect())
    }

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .assignments
            .values()
            .filter(|a| !a.is_deleted)
            .filter(|a| filter.assigned_to.is_none_or(|user| a.assigned_to == user))
            .filter(|a| filter.states.is_empty() || filter.states.contains(&a.state))
            .filter(|a| filter.assigned_date.is_none_or(|date| a.assigned_date == date))
            .filter(|a| {
                tables.asset_matches(a.asset_id, filter.location.as_ref(), filter.search.as_deref())
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.assigned_date.cmp(&b.assigned_date));
        Ok(items)
    }

    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Assignment> {
        self.tables.read().await.live_assignment(id).cloned()
    }

    async fn create_assignment(&self, assignment: Assignment) -> StoreResult<Assignment> {
        let mut tables = self.tables.write().await;
        tables.enabled_user(assignment.assigned_to)?;
        let asset = tables.live_asset_mut(assignment.asset_id)?;
        if asset.state != AssetState::Available {
            return Err(StoreError::Rejected("asset is not available".into()));
        }
        asset.state = AssetState::Assigned;
        tables.assignments.insert(assignment.id, assignment.clone());
        Ok(assignment)
    }

    async fn edit_assignment(
        &self,
        id: AssignmentId,
        patch: AssignmentPatch,
    ) -> StoreResult<Assignment> {
        let mut tables = self.tables.write().await;
        let current = tables.live_assignment(id)?.clone();
        assignment_transition(current.state, AssignmentEvent::Edit)?;

        if let Some(user_id) = patch.assigned_to {
            tables.enabled_user(user_id)?;
        }
        if let Some(asset_id) = patch.asset_id.filter(|asset_id| *asset_id != current.asset_id) {
            let replacement = tables.live_asset_mut(asset_id)?;
            if replacement.state != AssetState::Available {
                return Err(StoreError::Rejected("asset is not available".into()));
            }
            replacement.state = AssetState::Assigned;
            tables.set_asset_state(current.asset_id, AssetState::Available)?;
        }

        let assignment = tables
            .assignments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("assignment".into()))?;
        if let Some(asset_id) = patch.asset_id {
            assignment.asset_id = asset_id;
        }
        if let Some(user_id) = patch.assigned_to {
            assignment.assigned_to = user_id;
        }
        if let Some(date) = patch.assigned_date {
            assignment.assigned_date = date;
        }
        if let Some(note) = patch.note {
            assignment.note = note;
        }
        Ok(assignment.clone())
    }

    async fn respond_to_assignment(
        &self,
        id: AssignmentId,
        event: AssignmentEvent,
    ) -> StoreResult<Assignment> {
        if !matches!(event, AssignmentEvent::Accept | AssignmentEvent::Decline) {
            return Err(StoreError::Unexpected(anyhow::anyhow!(
                "unsupported assignment response {event:?}"
            )));
        }
        let mut tables = self.tables.write().await;
        let current = tables.live_assignment(id)?.clone();
        let rule = assignment_transition(current.state, event)?;
        if let Some(asset_state) = rule.asset {
            tables.set_asset_state(current.asset_id, asset_state)?;
        }
        let assignment = tables
            .assignments
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("assignment".into()))?;
        assignment.state = rule.to;
        Ok(assignment.clone())
    }

    async fn delete_assignment(&self, id: AssignmentId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let current = tables.live_assignment(id)?.clone();
        let rule = assignment_transition(current.state, AssignmentEvent::Delete)?;
        if let Some(asset_state) = rule.asset {
            tables.set_asset_state(current.asset_id, asset_state)?;
        }
        if let Some(assignment) = tables.assignments.get_mut(&id) {
            assignment.is_deleted = true;
        }
        Ok(())
    }

    async fn list_returning_requests(
        &self,
        filter: &ReturningFilter,
    ) -> StoreResult<Vec<ReturningRequest>> {
        let tables = self.tables.read().await;
        let mut items: Vec<_> = tables
            .returning
            .values()
            .filter(|r| !r.is_deleted)
            .filter(|r| filter.states.is_empty() || filter.states.contains(&r.state))
            .filter(|r| filter.returned_date.is_none_or(|date| r.returned_date == Some(date)))
            .filter(|r| {
                tables.assignments.get(&r.assignment_id).is_some_and(|a| {
                    tables.asset_matches(a.asset_id, Some(&filter.location), filter.search.as_deref())
                })
            })
            .cloned()
            .collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(items)
    }

    async fn get_returning_request(
        &self,
        id: ReturningRequestId,
    ) -> StoreResult<ReturningRequest> {
        self.tables
            .read()
            .await
            .returning
            .get(&id)
            .filter(|r| !r.is_deleted)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("returning request".into()))
    }

    async fn create_returning_request(
        &self,
        request: ReturningRequest,
    ) -> StoreResult<ReturningRequest> {
        let mut tables = self.tables.write().await;
        let assignment = tables.live_assignment(request.assignment_id)?;
        assignment_transition(assignment.state, AssignmentEvent::RequestReturn)?;
        let already_active = tables
            .returning
            .values()
            .any(|r| r.assignment_id == request.assignment_id && r.is_active());
        if already_active {
            return Err(StoreError::Conflict("active returning request".into()));
        }
        tables.returning.insert(request.id, request.clone());
        Ok(request)
    }

    async fn cancel_returning_request(&self, id: ReturningRequestId) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let request = tables
            .returning
            .get_mut(&id)
            .filter(|r| !r.is_deleted)
            .ok_or_else(|| StoreError::NotFound("returning request".into()))?;
        let rule = returning_transition(request.state, ReturningEvent::Cancel)?;
        request.state = rule.to;
        request.is_deleted = true;
        Ok(())
    }

    async fn complete_returning_request(
        &self,
        id: ReturningRequestId,
        accepted_by: UserId,
        returned_date: NaiveDate,
    ) -> StoreResult<ReturningRequest> {
        let mut tables = self.tables.write().await;
        let request = tables
            .returning
            .get(&id)
            .filter(|r| !r.is_deleted)
            .cloned()
            .ok_or_else(|| StoreError::NotFound("returning request".into()))?;
        let request_rule = returning_transition(request.state, ReturningEvent::Complete)?;
        let assignment = tables.live_assignment(request.assignment_id)?.clone();
        let assignment_rule =
            assignment_transition(assignment.state, AssignmentEvent::CompleteReturn)?;

        // All guards passed; apply every coupled write.
        if let Some(asset_state) = assignment_rule.asset.or(request_rule.asset) {
            tables.set_asset_state(assignment.asset_id, asset_state)?;
        }
        if let Some(stored) = tables.assignments.get_mut(&assignment.id) {
            stored.state = assignment_rule.to;
        }
        let stored = tables
            .returning
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound("returning request".into()))?;
        stored.state = request_rule.to;
        stored.accepted_by = Some(accepted_by);
        stored.returned_date = Some(returned_date);
        Ok(stored.clone())
    }

    async fn category_report(&self, location: &Location) -> StoreResult<Vec<CategoryReport>> {
        let tables = self.tables.read().await;
        let mut rows: Vec<CategoryReport> = tables
            .categories
            .values()
            .map(|category| {
                let mut row = CategoryReport {
                    category: category.name.clone(),
                    ..CategoryReport::default()
                };
                for asset in tables.assets.values().filter(|asset| {
                    asset.category_id == category.id
                        && !asset.is_deleted
                        && &asset.location == location
                }) {
                    row.total += 1;
                    match asset.state {
                        AssetState::Available => row.available += 1,
                        AssetState::NotAvailable => row.not_available += 1,
                        AssetState::Assigned => row.assigned += 1,
                        AssetState::WaitingForRecycling => row.waiting_for_recycling += 1,
                        AssetState::Recycled => row.recycled += 1,
                    }
                }
                row
            })
            .collect();
        rows.sort_by(|a, b| a.category.cmp(&b.category));
        Ok(rows)
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn is_durable(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Gender, ReturningState, Role};
    use chrono::Utc;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("date")
    }

    fn hcm() -> Location {
        Location::new("HCM").expect("location")
    }

    async fn seed_category(store: &InMemoryStore, name: &str, prefix: &str) -> Category {
        store
            .create_category(Category {
                id: CategoryId::new(),
                name: name.to_string(),
                prefix: prefix.to_string(),
            })
            .await
            .expect("category")
    }

    async fn seed_asset(store: &InMemoryStore, category: &Category, code: &str) -> Asset {
        store
            .create_asset(Asset {
                id: AssetId::new(),
                code: code.to_string(),
                name: "Laptop HP Probook 450 G1".to_string(),
                category_id: category.id,
                specification: "Core i5, 8GB RAM".to_string(),
                installed_date: date(2024, 1, 10),
                state: AssetState::Available,
                location: hcm(),
                is_deleted: false,
            })
            .await
            .expect("asset")
    }

    async fn seed_user(store: &InMemoryStore, username: &str, staff_code: &str) -> User {
        store
            .create_user(User {
                id: UserId::new(),
                staff_code: staff_code.to_string(),
                username: username.to_string(),
                first_name: "John".to_string(),
                last_name: "Doe".to_string(),
                date_of_birth: date(1995, 4, 2),
                joined_date: date(2020, 6, 1),
                gender: Gender::Male,
                role: Role::Staff,
                location: hcm(),
                password_hash: String::new(),
                is_first_login: true,
                is_disabled: false,
            })
            .await
            .expect("user")
    }

    async fn seed_assignment(store: &InMemoryStore, asset: &Asset, user: &User) -> Assignment {
        store
            .create_assignment(Assignment {
                id: AssignmentId::new(),
                asset_id: asset.id,
                assigned_to: user.id,
                assigned_by: user.id,
                assigned_date: date(2024, 3, 1),
                note: String::new(),
                state: AssignmentState::WaitingForAcceptance,
                is_deleted: false,
            })
            .await
            .expect("assignment")
    }

    fn returning_request(assignment: &Assignment) -> ReturningRequest {
        ReturningRequest {
            id: ReturningRequestId::new(),
            assignment_id: assignment.id,
            requested_by: assignment.assigned_to,
            accepted_by: None,
            returned_date: None,
            state: ReturningState::WaitingForReturning,
            is_deleted: false,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn duplicate_category_name_or_prefix_conflicts() {
        let store = InMemoryStore::new();
        seed_category(&store, "Laptop", "LA").await;
        let err = store
            .create_category(Category {
                id: CategoryId::new(),
                name: "laptop".to_string(),
                prefix: "LP".to_string(),
            })
            .await
            .expect_err("name conflict");
        assert!(matches!(err, StoreError::Conflict(msg) if msg == "category name"));
        let err = store
            .create_category(Category {
                id: CategoryId::new(),
                name: "Monitor".to_string(),
                prefix: "LA".to_string(),
            })
            .await
            .expect_err("prefix conflict");
        assert!(matches!(err, StoreError::Conflict(msg) if msg == "category prefix"));
    }

    #[tokio::test]
    async fn max_asset_code_is_lexicographic_per_prefix() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let monitor = seed_category(&store, "Monitor", "MO").await;
        seed_asset(&store, &laptop, "LA000002").await;
        seed_asset(&store, &laptop, "LA000007").await;
        seed_asset(&store, &monitor, "MO000010").await;
        assert_eq!(
            store.max_asset_code("LA").await.expect("max"),
            Some("LA000007".to_string())
        );
        assert_eq!(store.max_asset_code("PC").await.expect("max"), None);
    }

    #[tokio::test]
    async fn declined_assignment_cannot_be_accepted() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let asset = seed_asset(&store, &laptop, "LA000001").await;
        let user = seed_user(&store, "johnd", "SD0001").await;
        let assignment = seed_assignment(&store, &asset, &user).await;
        assert_eq!(
            store.get_asset(asset.id).await.expect("asset").state,
            AssetState::Assigned
        );

        let declined = store
            .respond_to_assignment(assignment.id, AssignmentEvent::Decline)
            .await
            .expect("decline");
        assert_eq!(declined.state, AssignmentState::Declined);
        assert_eq!(
            store.get_asset(asset.id).await.expect("asset").state,
            AssetState::Available
        );

        let err = store
            .respond_to_assignment(assignment.id, AssignmentEvent::Accept)
            .await
            .expect_err("declined cannot be accepted");
        assert!(matches!(err, StoreError::InvalidTransition(_)));
        assert_eq!(
            store.get_assignment(assignment.id).await.expect("get").state,
            AssignmentState::Declined
        );
    }

    #[tokio::test]
    async fn only_waiting_or_declined_assignments_are_deletable() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let user = seed_user(&store, "johnd", "SD0001").await;

        let waiting_asset = seed_asset(&store, &laptop, "LA000001").await;
        let waiting = seed_assignment(&store, &waiting_asset, &user).await;
        store.delete_assignment(waiting.id).await.expect("delete waiting");
        assert!(matches!(
            store.get_assignment(waiting.id).await,
            Err(StoreError::NotFound(_))
        ));
        assert_eq!(
            store.get_asset(waiting_asset.id).await.expect("asset").state,
            AssetState::Available
        );

        let declined_asset = seed_asset(&store, &laptop, "LA000002").await;
        let declined = seed_assignment(&store, &declined_asset, &user).await;
        store
            .respond_to_assignment(declined.id, AssignmentEvent::Decline)
            .await
            .expect("decline");
        store.delete_assignment(declined.id).await.expect("delete declined");

        let accepted_asset = seed_asset(&store, &laptop, "LA000003").await;
        let accepted = seed_assignment(&store, &accepted_asset, &user).await;
        store
            .respond_to_assignment(accepted.id, AssignmentEvent::Accept)
            .await
            .expect("accept");
        let err = store
            .delete_assignment(accepted.id)
            .await
            .expect_err("accepted is not deletable");
        assert!(matches!(err, StoreError::InvalidTransition(_)));

        let request = store
            .create_returning_request(returning_request(&accepted))
            .await
            .expect("request");
        store
            .complete_returning_request(request.id, user.id, date(2024, 4, 1))
            .await
            .expect("complete");
        let err = store
            .delete_assignment(accepted.id)
            .await
            .expect_err("returned is not deletable");
        assert!(matches!(err, StoreError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn single_active_returning_request_and_completion_couples_writes() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let asset = seed_asset(&store, &laptop, "LA000001").await;
        let user = seed_user(&store, "johnd", "SD0001").await;
        let assignment = seed_assignment(&store, &asset, &user).await;

        let err = store
            .create_returning_request(returning_request(&assignment))
            .await
            .expect_err("waiting assignment cannot be returned");
        assert!(matches!(err, StoreError::InvalidTransition(_)));

        store
            .respond_to_assignment(assignment.id, AssignmentEvent::Accept)
            .await
            .expect("accept");
        let first = store
            .create_returning_request(returning_request(&assignment))
            .await
            .expect("first request");
        let err = store
            .create_returning_request(returning_request(&assignment))
            .await
            .expect_err("second active request");
        assert!(matches!(err, StoreError::Conflict(_)));

        let completed = store
            .complete_returning_request(first.id, user.id, date(2024, 4, 1))
            .await
            .expect("complete");
        assert_eq!(completed.state, ReturningState::Completed);
        assert_eq!(completed.accepted_by, Some(user.id));
        assert_eq!(completed.returned_date, Some(date(2024, 4, 1)));
        assert_eq!(
            store.get_assignment(assignment.id).await.expect("get").state,
            AssignmentState::Returned
        );
        assert_eq!(
            store.get_asset(asset.id).await.expect("asset").state,
            AssetState::Available
        );

        let err = store
            .complete_returning_request(first.id, user.id, date(2024, 4, 2))
            .await
            .expect_err("already completed");
        assert!(matches!(err, StoreError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn cancelled_request_frees_the_slot() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let asset = seed_asset(&store, &laptop, "LA000001").await;
        let user = seed_user(&store, "johnd", "SD0001").await;
        let assignment = seed_assignment(&store, &asset, &user).await;
        store
            .respond_to_assignment(assignment.id, AssignmentEvent::Accept)
            .await
            .expect("accept");

        let first = store
            .create_returning_request(returning_request(&assignment))
            .await
            .expect("first");
        store
            .cancel_returning_request(first.id)
            .await
            .expect("cancel");
        assert!(matches!(
            store.get_returning_request(first.id).await,
            Err(StoreError::NotFound(_))
        ));
        store
            .create_returning_request(returning_request(&assignment))
            .await
            .expect("second after cancel");
    }

    #[tokio::test]
    async fn assigned_asset_is_locked_and_history_blocks_delete() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let asset = seed_asset(&store, &laptop, "LA000001").await;
        let user = seed_user(&store, "johnd", "SD0001").await;
        let assignment = seed_assignment(&store, &asset, &user).await;

        let err = store
            .update_asset(asset.id, AssetPatch::default())
            .await
            .expect_err("assigned asset");
        assert!(matches!(err, StoreError::Rejected(_)));

        store
            .respond_to_assignment(assignment.id, AssignmentEvent::Decline)
            .await
            .expect("decline");
        let err = store.delete_asset(asset.id).await.expect_err("history");
        assert!(matches!(err, StoreError::Rejected(_)));

        let fresh = seed_asset(&store, &laptop, "LA000002").await;
        store.delete_asset(fresh.id).await.expect("delete fresh");
        assert!(matches!(
            store.get_asset(fresh.id).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn disable_user_requires_no_valid_assignments() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let asset = seed_asset(&store, &laptop, "LA000001").await;
        let user = seed_user(&store, "johnd", "SD0001").await;
        let assignment = seed_assignment(&store, &asset, &user).await;

        let err = store.disable_user(user.id).await.expect_err("holds asset");
        assert!(matches!(err, StoreError::Rejected(_)));

        store
            .respond_to_assignment(assignment.id, AssignmentEvent::Decline)
            .await
            .expect("decline");
        let disabled = store.disable_user(user.id).await.expect("disable");
        assert!(disabled.is_disabled);

        let other = seed_asset(&store, &laptop, "LA000002").await;
        let err = store
            .create_assignment(Assignment {
                id: AssignmentId::new(),
                asset_id: other.id,
                assigned_to: user.id,
                assigned_by: user.id,
                assigned_date: date(2024, 3, 1),
                note: String::new(),
                state: AssignmentState::WaitingForAcceptance,
                is_deleted: false,
            })
            .await
            .expect_err("disabled assignee");
        assert!(matches!(err, StoreError::Rejected(_)));
    }

    #[tokio::test]
    async fn edit_assignment_swaps_reserved_asset() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        let first = seed_asset(&store, &laptop, "LA000001").await;
        let second = seed_asset(&store, &laptop, "LA000002").await;
        let user = seed_user(&store, "johnd", "SD0001").await;
        let assignment = seed_assignment(&store, &first, &user).await;

        let edited = store
            .edit_assignment(
                assignment.id,
                AssignmentPatch {
                    asset_id: Some(second.id),
                    note: Some("swap".to_string()),
                    ..AssignmentPatch::default()
                },
            )
            .await
            .expect("edit");
        assert_eq!(edited.asset_id, second.id);
        assert_eq!(edited.note, "swap");
        assert_eq!(edited.state, AssignmentState::WaitingForAcceptance);
        assert_eq!(
            store.get_asset(first.id).await.expect("first").state,
            AssetState::Available
        );
        assert_eq!(
            store.get_asset(second.id).await.expect("second").state,
            AssetState::Assigned
        );
    }

    #[tokio::test]
    async fn report_counts_states_per_category() {
        let store = InMemoryStore::new();
        let laptop = seed_category(&store, "Laptop", "LA").await;
        seed_category(&store, "Monitor", "MO").await;
        let asset = seed_asset(&store, &laptop, "LA000001").await;
        seed_asset(&store, &laptop, "LA000002").await;
        let user = seed_user(&store, "johnd", "SD0001").await;
        seed_assignment(&store, &asset, &user).await;

        let report = store.category_report(&hcm()).await.expect("report");
        assert_eq!(report.len(), 2);
        assert_eq!(report[0].category, "Laptop");
        assert_eq!(report[0].total, 2);
        assert_eq!(report[0].assigned, 1);
        assert_eq!(report[0].available, 1);
        assert_eq!(report[1].total, 0);
    }
}
