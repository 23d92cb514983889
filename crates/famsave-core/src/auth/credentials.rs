use anyhow::{Context, Result};
use keyring::Entry;

use super::store::{CredentialPair, TokenStore};
use crate::models::User;

const SERVICE_NAME: &str = "famsave";

const ACCESS_TOKEN_KEY: &str = "access_token";
const REFRESH_TOKEN_KEY: &str = "refresh_token";
const USER_KEY: &str = "user";

/// Token store backed by the OS keychain. Each value lives in its own entry
/// under a fixed name.
pub struct KeyringTokenStore {
    service: String,
}

impl KeyringTokenStore {
    pub fn new() -> Self {
        Self::with_service(SERVICE_NAME)
    }

    /// Use a custom keychain service name, e.g. one per API environment.
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to create keyring entry")
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {} from keychain", key)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .with_context(|| format!("Failed to store {} in keychain", key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {} from keychain", key)),
        }
    }
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenStore for KeyringTokenStore {
    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.set(ACCESS_TOKEN_KEY, &pair.access_token)?;
        self.set(REFRESH_TOKEN_KEY, &pair.refresh_token)
    }

    fn load(&self) -> Result<Option<CredentialPair>> {
        let access = self.get(ACCESS_TOKEN_KEY)?;
        let refresh = self.get(REFRESH_TOKEN_KEY)?;
        Ok(match (access, refresh) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        })
    }

    fn clear(&self) -> Result<()> {
        self.delete(ACCESS_TOKEN_KEY)?;
        self.delete(REFRESH_TOKEN_KEY)?;
        self.delete(USER_KEY)
    }

    fn save_user(&self, user: &User) -> Result<()> {
        let json = serde_json::to_string(user)?;
        self.set(USER_KEY, &json)
    }

    fn load_user(&self) -> Result<Option<User>> {
        match self.get(USER_KEY)? {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Failed to parse cached user")?,
            )),
            None => Ok(None),
        }
    }

    fn clear_user(&self) -> Result<()> {
        self.delete(USER_KEY)
    }
}
