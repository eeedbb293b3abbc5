//! Returning-request records and list filters.
use assetdesk_common::Location;
use assetdesk_common::ids::{AssignmentId, ReturningRequestId, UserId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct ReturningRequest {
    #[schema(value_type = String)]
    pub id: ReturningRequestId,
    #[schema(value_type = String)]
    pub assignment_id: AssignmentId,
    #[schema(value_type = String)]
    pub requested_by: UserId,
    #[schema(value_type = Option<String>)]
    pub accepted_by: Option<UserId>,
    pub returned_date: Option<NaiveDate>,
    pub state: ReturningState,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}

impl ReturningRequest {
    /// A request blocks new ones for the same assignment until it completes or is cancelled.
    pub fn is_active(&self) -> bool {
        !self.is_deleted && self.state == ReturningState::WaitingForReturning
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReturningState {
    WaitingForReturning,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ReturningFilter {
    pub location: Location,
    pub states: Vec<ReturningState>,
    pub returned_date: Option<NaiveDate>,
    /// Case-insensitive substring over the asset code and name.
    pub search: Option<String>,
}
