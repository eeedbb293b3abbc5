//! Asset-desk authentication.
//!
//! # Purpose
//! Resolves the acting user from the trusted identity header set by the
//! gateway, hashes and verifies passwords, and serves the login and
//! change-password endpoints.
pub mod login;
pub mod password;
pub mod principal;
