//! Authentication state: credential storage and the session handle.
//!
//! This module provides:
//! - `TokenStore`: persistence for the access/refresh token pair and the
//!   cached user identity, with file, keychain and in-memory backends
//! - `Session`: the explicit session object handed to the API client
//!
//! Tokens carry no local expiry; the server decides when they are stale.

pub mod credentials;
pub mod session;
pub mod store;

pub use credentials::KeyringTokenStore;
pub use session::{AuthState, Session, SignOutReason};
pub use store::{CredentialPair, FileTokenStore, MemoryTokenStore, TokenStore};
