//! Asset-desk HTTP API module.
//!
//! # Purpose
//! Exposes route handler modules and the shared query helpers for id parsing,
//! enum filters, sorting and paging.
pub mod assets;
pub mod assignments;
pub mod categories;
pub mod error;
pub mod openapi;
pub mod report;
pub mod returning;
pub mod sample;
pub mod system;
pub mod types;
pub mod users;

use crate::api::error::{ApiError, api_forbidden, api_not_found, api_validation_error};
use crate::model::User;
use assetdesk_common::Location;
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

/// Sorting, paging and search parameters shared by every list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListParams {
    pub page: usize,
    pub page_size: usize,
    pub sort: Option<String>,
    pub descending: bool,
    pub search: Option<String>,
}

impl ListParams {
    pub(crate) fn from_query(params: &HashMap<String, String>) -> Result<Self, ApiError> {
        let page = parse_positive(params, "page")?.unwrap_or(1);
        let page_size = parse_positive(params, "page_size")?
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .min(MAX_PAGE_SIZE);
        let descending = match params.get("order").map(|value| value.to_ascii_lowercase()) {
            None => false,
            Some(order) if order == "asc" => false,
            Some(order) if order == "desc" => true,
            Some(_) => return Err(api_validation_error("order must be asc or desc")),
        };
        Ok(Self {
            page,
            page_size,
            sort: non_empty(params, "sort"),
            descending,
            search: non_empty(params, "search"),
        })
    }

    /// The requested sort field, checked against `allowed`; defaults to the first entry.
    pub(crate) fn sort_field<'a>(&self, allowed: &[&'a str]) -> Result<&'a str, ApiError> {
        let Some(requested) = self.sort.as_deref() else {
            return Ok(allowed[0]);
        };
        allowed
            .iter()
            .copied()
            .find(|field| *field == requested)
            .ok_or_else(|| {
                api_validation_error(&format!(
                    "cannot sort by {requested:?}; expected one of {}",
                    allowed.join(", ")
                ))
            })
    }

    /// Slice one page out of `items`; returns the page and the total count.
    pub(crate) fn paginate<T>(&self, mut items: Vec<T>) -> (Vec<T>, usize) {
        if self.descending {
            items.reverse();
        }
        let total = items.len();
        let page = items
            .into_iter()
            .skip((self.page - 1).saturating_mul(self.page_size))
            .take(self.page_size)
            .collect();
        (page, total)
    }
}

fn non_empty(params: &HashMap<String, String>, key: &str) -> Option<String> {
    params
        .get(key)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_positive(params: &HashMap<String, String>, key: &str) -> Result<Option<usize>, ApiError> {
    match params.get(key) {
        None => Ok(None),
        Some(raw) => match raw.parse::<usize>() {
            Ok(value) if value > 0 => Ok(Some(value)),
            _ => Err(api_validation_error(&format!(
                "{key} must be a positive integer"
            ))),
        },
    }
}

/// Parse a path or query identifier, mapping failures to 400.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| api_validation_error(&format!("invalid {what} id")))
}

/// Parse a comma-separated list of enum variant names, e.g. `state=Available,Assigned`.
pub(crate) fn parse_enum_list<T: DeserializeOwned>(
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Vec<T>, ApiError> {
    let Some(raw) = params.get(key) else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| {
            serde_json::from_value(serde_json::Value::String(value.to_string()))
                .map_err(|_| api_validation_error(&format!("invalid {key} {value:?}")))
        })
        .collect()
}

pub(crate) fn parse_date(
    params: &HashMap<String, String>,
    key: &str,
) -> Result<Option<NaiveDate>, ApiError> {
    params
        .get(key)
        .map(|raw| {
            NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map_err(|_| api_validation_error(&format!("{key} must be YYYY-MM-DD")))
        })
        .transpose()
}

pub(crate) fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Admins only see records at their own location; anything else reads as missing.
pub(crate) fn ensure_same_location(actor: &User, location: &Location) -> Result<(), ApiError> {
    if &actor.location != location {
        return Err(api_not_found("record not found at your location"));
    }
    Ok(())
}

pub(crate) fn ensure_admin_or(actor: &User, owner: bool) -> Result<(), ApiError> {
    if !actor.is_admin() && !owner {
        return Err(api_forbidden("not allowed to act on this record"));
    }
    Ok(())
}
