//! Assignment records, patch payloads and list filters.
use assetdesk_common::ids::{AssetId, AssignmentId, UserId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Assignment {
    #[schema(value_type = String)]
    pub id: AssignmentId,
    #[schema(value_type = String)]
    pub asset_id: AssetId,
    #[schema(value_type = String)]
    pub assigned_to: UserId,
    #[schema(value_type = String)]
    pub assigned_by: UserId,
    pub assigned_date: NaiveDate,
    pub note: String,
    pub state: AssignmentState,
    pub is_deleted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentState {
    WaitingForAcceptance,
    Accepted,
    Declined,
    Returned,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct AssignmentPatch {
    #[schema(value_type = Option<String>)]
    pub asset_id: Option<AssetId>,
    #[schema(value_type = Option<String>)]
    pub assigned_to: Option<UserId>,
    pub assigned_date: Option<NaiveDate>,
    pub note: Option<String>,
}

/// Filter for assignment listings.
///
/// `location` restricts to assets at that site (admin view); `assigned_to`
/// restricts to one assignee (staff view). `search` matches the asset code or
/// name, which the store resolves through the asset table.
#[derive(Debug, Clone, Default)]
pub struct AssignmentFilter {
    pub location: Option<assetdesk_common::Location>,
    pub assigned_to: Option<UserId>,
    pub states: Vec<AssignmentState>,
    pub assigned_date: Option<NaiveDate>,
    pub search: Option<String>,
}
