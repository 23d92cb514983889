//! REST API client module for the family savings backend.
//!
//! This module provides the `ApiClient` for authenticating and for reading
//! and mutating goals, transactions and analytics.
//!
//! The API uses bearer token authentication. An expired access token is
//! exchanged for a new one through the refresh endpoint and the rejected
//! request is retried once.

pub mod client;
pub mod error;
pub mod request;

pub use client::{
    ApiClient, DEFAULT_API_BASE_URL, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SPENDING_PERIOD_DAYS,
};
pub use error::{ApiError, Result};
pub use request::{PendingRequest, RequestPhase};
