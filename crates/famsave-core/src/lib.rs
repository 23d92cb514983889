//! famsave-core - client library for the family savings service.
//!
//! Handles the session (token storage and the refresh-on-401 protocol),
//! typed access to goals, transactions and analytics, a staleness-aware
//! query cache with mutation-driven invalidation, and pure aggregates over
//! the cached lists.

pub mod aggregates;
pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod models;
pub mod resources;
pub mod utils;

pub use api::{ApiClient, ApiError, Result};
pub use auth::{AuthState, Session, SignOutReason, TokenStore};
pub use cache::{QueryCache, QueryKey, Resource};
pub use config::{Config, TokenBackend};
pub use resources::{Dashboard, Resources};
