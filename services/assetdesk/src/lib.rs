//! Asset-desk service library crate.
//!
//! # Purpose
//! Exposes the HTTP API, identifier generator, lifecycle rules, configuration
//! and storage backends for use by the binary and tests.
pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod lifecycle;
pub mod model;
pub mod observability;
pub mod sequence;
pub mod store;
