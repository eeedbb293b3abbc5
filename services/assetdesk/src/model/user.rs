//! User records, patch payloads and list filters.
use assetdesk_common::Location;
use assetdesk_common::ids::UserId;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq, Eq)]
pub struct User {
    #[schema(value_type = String)]
    pub id: UserId,
    pub staff_code: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub joined_date: NaiveDate,
    pub gender: Gender,
    pub role: Role,
    #[schema(value_type = String)]
    pub location: Location,
    #[serde(skip)]
    pub password_hash: String,
    pub is_first_login: bool,
    pub is_disabled: bool,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Staff,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Female,
    Male,
    Unspecified,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default)]
pub struct UserPatch {
    pub date_of_birth: Option<NaiveDate>,
    pub joined_date: Option<NaiveDate>,
    pub gender: Option<Gender>,
    pub role: Option<Role>,
}

#[derive(Debug, Clone)]
pub struct UserFilter {
    pub location: Location,
    pub roles: Vec<Role>,
    /// Case-insensitive substring over staff code, username and full name.
    pub search: Option<String>,
}

impl UserFilter {
    pub fn matches(&self, user: &User) -> bool {
        if user.is_disabled || user.location != self.location {
            return false;
        }
        if !self.roles.is_empty() && !self.roles.contains(&user.role) {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                user.staff_code.to_lowercase().contains(&term)
                    || user.username.to_lowercase().contains(&term)
                    || user.full_name().to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}
