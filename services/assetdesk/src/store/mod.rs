//! System-of-record abstraction.
//!
//! # Purpose
//! Defines the [`AssetStore`] trait implemented by the in-memory and Postgres
//! backends, plus the shared error type handlers translate into HTTP errors.
//!
//! # Key invariants
//! - Every guard-and-mutate operation (assignment responses, returning
//!   requests, deletes) re-reads current state inside the backend's unit of
//!   work and consults [`crate::lifecycle`] before writing.
//! - A failed guard writes nothing.
use crate::lifecycle::{AssignmentEvent, InvalidTransition};
use crate::model::{
    Asset, AssetFilter, AssetPatch, Assignment, AssignmentFilter, AssignmentPatch, Category,
    CategoryReport, ReturningFilter, ReturningRequest, User, UserFilter, UserPatch,
};
use assetdesk_common::Location;
use assetdesk_common::ids::{AssetId, AssignmentId, CategoryId, ReturningRequestId, UserId};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    /// A business precondition other than a state transition failed.
    #[error("rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait AssetStore: Send + Sync {
    async fn list_categories(&self) -> StoreResult<Vec<Category>>;
    async fn get_category(&self, id: CategoryId) -> StoreResult<Category>;
    /// Fails with `Conflict` when the name or prefix is already taken.
    async fn create_category(&self, category: Category) -> StoreResult<Category>;

    async fn list_assets(&self, filter: &AssetFilter) -> StoreResult<Vec<Asset>>;
    async fn get_asset(&self, id: AssetId) -> StoreResult<Asset>;
    async fn create_asset(&self, asset: Asset) -> StoreResult<Asset>;
    async fn update_asset(&self, id: AssetId, patch: AssetPatch) -> StoreResult<Asset>;
    async fn delete_asset(&self, id: AssetId) -> StoreResult<()>;
    /// Lexicographically greatest asset code starting with `prefix`.
    async fn max_asset_code(&self, prefix: &str) -> StoreResult<Option<String>>;

    async fn list_users(&self, filter: &UserFilter) -> StoreResult<Vec<User>>;
    async fn get_user(&self, id: UserId) -> StoreResult<User>;
    async fn find_user_by_username(&self, username: &str) -> StoreResult<User>;
    async fn create_user(&self, user: User) -> StoreResult<User>;
    async fn update_user(&self, id: UserId, patch: UserPatch) -> StoreResult<User>;
    async fn disable_user(&self, id: UserId) -> StoreResult<User>;
    async fn set_password(&self, id: UserId, password_hash: String) -> StoreResult<()>;
    /// Lexicographically greatest staff code starting with `prefix`.
    async fn max_staff_code(&self, prefix: &str) -> StoreResult<Option<String>>;
    async fn usernames_with_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
    async fn list_usernames(&self) -> StoreResult<Vec<String>>;

    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>>;
    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Assignment>;
    /// Reserves the asset (Available → Assigned) together with the insert.
    async fn create_assignment(&self, assignment: Assignment) -> StoreResult<Assignment>;
    async fn edit_assignment(
        &self,
        id: AssignmentId,
        patch: AssignmentPatch,
    ) -> StoreResult<Assignment>;
    /// Applies `Accept` or `Decline` and the coupled asset state.
    async fn respond_to_assignment(
        &self,
        id: AssignmentId,
        event: AssignmentEvent,
    ) -> StoreResult<Assignment>;
    async fn delete_assignment(&self, id: AssignmentId) -> StoreResult<()>;

    async fn list_returning_requests(
        &self,
        filter: &ReturningFilter,
    ) -> StoreResult<Vec<ReturningRequest>>;
    async fn get_returning_request(&self, id: ReturningRequestId)
    -> StoreResult<ReturningRequest>;
    /// Fails with `Conflict` when the assignment already has an active request.
    async fn create_returning_request(
        &self,
        request: ReturningRequest,
    ) -> StoreResult<ReturningRequest>;
    async fn cancel_returning_request(&self, id: ReturningRequestId) -> StoreResult<()>;
    /// Completes the request, returns the assignment and frees the asset in one unit of work.
    async fn complete_returning_request(
        &self,
        id: ReturningRequestId,
        accepted_by: UserId,
        returned_date: NaiveDate,
    ) -> StoreResult<ReturningRequest>;

    async fn category_report(&self, location: &Location) -> StoreResult<Vec<CategoryReport>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn is_durable(&self) -> bool;
    fn backend_name(&self) -> &'static str;
}

/// Parse the numeric tail following `prefix` in an issued identifier.
///
/// Returns `None` when the tail is missing or not a plain decimal number.
pub fn numeric_suffix(identifier: &str, prefix: &str) -> Option<u64> {
    let tail = identifier.strip_prefix(prefix)?;
    if tail.is_empty() || !tail.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    tail.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_suffix_parses_digits_only() {
        assert_eq!(numeric_suffix("LA000007", "LA"), Some(7));
        assert_eq!(numeric_suffix("johnd12", "johnd"), Some(12));
        assert_eq!(numeric_suffix("LA", "LA"), None);
        assert_eq!(numeric_suffix("LA00x1", "LA"), None);
        assert_eq!(numeric_suffix("MO000001", "LA"), None);
    }
}
