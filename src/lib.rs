//! Aruba Cloud infrastructure-as-code provider
//!
//! - [`api`] - REST transport, credentials and the error taxonomy
//! - [`lifecycle`] - the reconciler core shared by every resource type
//! - [`resource`] - one adapter per Aruba Cloud resource type
//! - [`server`] - the JSON-lines plugin surface spoken to the orchestrator

pub mod api;
pub mod config;
pub mod lifecycle;
pub mod resource;
pub mod server;

/// Provider version reported by `get_metadata`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Provider name reported by `get_metadata`
pub const PROVIDER_NAME: &str = "arubacloud";
