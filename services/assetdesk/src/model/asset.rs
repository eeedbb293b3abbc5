//! Asset records, patch payloads and list filters.
use assetdesk_common::Location;
use assetdesk_common::ids::{AssetId, CategoryId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct Asset {
    #[schema(value_type = String)]
    pub id: AssetId,
    pub code: String,
    pub name: String,
    #[schema(value_type = String)]
    pub category_id: CategoryId,
    pub specification: String,
    pub installed_date: NaiveDate,
    pub state: AssetState,
    #[schema(value_type = String)]
    pub location: Location,
    pub is_deleted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetState {
    Available,
    NotAvailable,
    Assigned,
    WaitingForRecycling,
    Recycled,
}

impl AssetState {
    /// States an admin may pick when creating an asset.
    pub fn is_initial(self) -> bool {
        matches!(self, AssetState::Available | AssetState::NotAvailable)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct AssetPatch {
    pub name: Option<String>,
    pub specification: Option<String>,
    pub installed_date: Option<NaiveDate>,
    pub state: Option<AssetState>,
}

#[derive(Debug, Clone)]
pub struct AssetFilter {
    pub location: Location,
    pub states: Vec<AssetState>,
    pub category_id: Option<CategoryId>,
    /// Case-insensitive substring over code and name.
    pub search: Option<String>,
}

impl AssetFilter {
    pub fn matches(&self, asset: &Asset) -> bool {
        if asset.is_deleted || asset.location != self.location {
            return false;
        }
        if !self.states.is_empty() && !self.states.contains(&asset.state) {
            return false;
        }
        if let Some(category_id) = self.category_id {
            if asset.category_id != category_id {
                return false;
            }
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                asset.code.to_lowercase().contains(&term)
                    || asset.name.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}
