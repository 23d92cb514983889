//! Query cache for server reads.
//!
//! Each read is keyed by a [`QueryKey`] with its own staleness window
//! (transactions 2 minutes, goals 5, analytics 5 to 15). Mutations mark the
//! affected [`Resource`]s invalidated so the next read refetches. Entries
//! can be mirrored to JSON files in the cache directory.

pub mod keys;
pub mod manager;

pub use keys::{QueryKey, Resource};
pub use manager::{CachedData, QueryCache};
