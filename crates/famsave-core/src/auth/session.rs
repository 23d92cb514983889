use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

use super::store::{CredentialPair, TokenStore};
use crate::api::{ApiError, Result};
use crate::models::User;

/// Why the session ended up signed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOutReason {
    /// No credentials were found at startup.
    NeverSignedIn,
    LoggedOut,
    /// The refresh token was rejected; the user must log in again.
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    SignedIn { user: Option<User> },
    SignedOut { reason: SignOutReason },
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn { .. })
    }
}

/// Explicit session handle shared by the API client and resources.
///
/// Lifecycle: `init` loads whatever the token store holds, `establish` and
/// `replace` mutate it on login and refresh, `end` tears it down. Tokens are
/// read from the store on every call rather than cached here, so a refresh
/// performed by one request is picked up by the next one immediately.
pub struct Session {
    store: Arc<dyn TokenStore>,
    state: watch::Sender<AuthState>,
}

fn storage_error(e: anyhow::Error) -> ApiError {
    ApiError::Storage(format!("{:#}", e))
}

impl Session {
    pub fn init(store: Arc<dyn TokenStore>) -> Result<Self> {
        let initial = if store.load().map_err(storage_error)?.is_some() {
            AuthState::SignedIn {
                user: store.load_user().map_err(storage_error)?,
            }
        } else {
            AuthState::SignedOut {
                reason: SignOutReason::NeverSignedIn,
            }
        };
        debug!(signed_in = initial.is_signed_in(), "Session initialized");
        let (state, _) = watch::channel(initial);
        Ok(Self { store, state })
    }

    /// Observe sign-in/sign-out transitions, e.g. to show a login prompt
    /// when a refresh fails.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn credentials(&self) -> Result<Option<CredentialPair>> {
        self.store.load().map_err(storage_error)
    }

    pub fn access_token(&self) -> Result<Option<String>> {
        Ok(self.credentials()?.map(|pair| pair.access_token))
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self.credentials(), Ok(Some(_)))
    }

    pub fn user(&self) -> Result<Option<User>> {
        self.store.load_user().map_err(storage_error)
    }

    /// Store a freshly issued pair after logging in as `email`.
    ///
    /// A cached identity is kept only if it belongs to `email`, e.g. the
    /// account registered just before; any other one is dropped.
    pub fn establish(&self, pair: &CredentialPair, email: &str) -> Result<()> {
        self.store.save(pair).map_err(storage_error)?;

        let user = match self.user()? {
            Some(user) if user.email.trim().eq_ignore_ascii_case(email.trim()) => Some(user),
            Some(other) => {
                debug!(cached = %other.email, "Dropping identity of another account");
                self.store.clear_user().map_err(storage_error)?;
                None
            }
            None => None,
        };
        self.state.send_replace(AuthState::SignedIn { user });
        Ok(())
    }

    /// Swap in the pair returned by a refresh. State observers are not
    /// notified: the user is still signed in.
    pub fn replace(&self, pair: &CredentialPair) -> Result<()> {
        self.store.save(pair).map_err(storage_error)
    }

    /// Cache the identity of the account this client acts for.
    pub fn set_user(&self, user: &User) -> Result<()> {
        self.store.save_user(user).map_err(storage_error)?;
        if self.state.borrow().is_signed_in() {
            self.state.send_replace(AuthState::SignedIn {
                user: Some(user.clone()),
            });
        }
        Ok(())
    }

    /// Clear every stored credential and publish the signed-out state.
    pub fn end(&self, reason: SignOutReason) -> Result<()> {
        self.store.clear().map_err(storage_error)?;
        self.state.send_replace(AuthState::SignedOut { reason });
        info!(reason = ?reason, "Session ended");
        Ok(())
    }
}
