//! Category records and the per-category report row.
use assetdesk_common::ids::CategoryId;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Category {
    #[schema(value_type = String)]
    pub id: CategoryId,
    pub name: String,
    /// Asset code prefix, e.g. `LA` for laptops.
    pub prefix: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq, Default)]
pub struct CategoryReport {
    pub category: String,
    pub total: u64,
    pub available: u64,
    pub not_available: u64,
    pub assigned: u64,
    pub waiting_for_recycling: u64,
    pub recycled: u64,
}
