//! Asset-desk data model module.
//!
//! # Purpose
//! Re-exports the category/asset/user/assignment/returning-request records,
//! their patch payloads and the list filters used by the store and API layers.
mod asset;
mod assignment;
mod category;
mod returning;
mod user;

pub use asset::{Asset, AssetFilter, AssetPatch, AssetState};
pub use assignment::{Assignment, AssignmentFilter, AssignmentPatch, AssignmentState};
pub use category::{Category, CategoryReport};
pub use returning::{ReturningFilter, ReturningRequest, ReturningState};
pub use user::{Gender, Role, User, UserFilter, UserPatch};
