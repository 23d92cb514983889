//! Durable storage for the credential pair and the cached user identity.
//!
//! Nothing here tracks expiry: a token is only known to be stale when the
//! server rejects it. All operations are synchronous so a refreshed pair is
//! visible to the very next request.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::User;

/// Token file name in the data directory
const TOKEN_FILE: &str = "tokens.json";

/// Access and refresh token issued together by login or refresh.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens never end up in logs through Debug.
impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

pub trait TokenStore: Send + Sync {
    /// Overwrite any stored pair. Token shape is not validated.
    fn save(&self, pair: &CredentialPair) -> Result<()>;

    /// The stored pair, or `None` if either token is missing.
    fn load(&self) -> Result<Option<CredentialPair>>;

    /// Remove both tokens and the cached user identity.
    fn clear(&self) -> Result<()>;

    fn save_user(&self, user: &User) -> Result<()>;

    fn load_user(&self) -> Result<Option<User>>;

    /// Forget the cached identity, keeping the tokens.
    fn clear_user(&self) -> Result<()>;
}

/// On-disk layout shared by the file and memory stores. Each key is
/// independent, so a half-written record loads as "no credentials".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
}

impl StoredTokens {
    fn pair(&self) -> Option<CredentialPair> {
        match (&self.access_token, &self.refresh_token) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        }
    }

    fn set_pair(&mut self, pair: &CredentialPair) {
        self.access_token = Some(pair.access_token.clone());
        self.refresh_token = Some(pair.refresh_token.clone());
    }
}

/// Token store backed by a JSON file, written atomically with owner-only
/// permissions.
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            path: data_dir.as_ref().join(TOKEN_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoredTokens> {
        if !self.path.exists() {
            return Ok(StoredTokens::default());
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read token file {}", self.path.display()))?;
        serde_json::from_str(&contents).context("Failed to parse token file")
    }

    fn modify(&self, f: impl FnOnce(&mut StoredTokens)) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?;
        let mut stored = self.read()?;
        f(&mut stored);
        write_atomic(&self.path, &stored)
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.modify(|stored| stored.set_pair(pair))
    }

    fn load(&self) -> Result<Option<CredentialPair>> {
        Ok(self.read()?.pair())
    }

    fn clear(&self) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?;
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove token file")?;
            debug!(path = %self.path.display(), "Removed token file");
        }
        Ok(())
    }

    fn save_user(&self, user: &User) -> Result<()> {
        self.modify(|stored| stored.user = Some(user.clone()))
    }

    fn load_user(&self) -> Result<Option<User>> {
        Ok(self.read()?.user)
    }

    fn clear_user(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        self.modify(|stored| stored.user = None)
    }
}

/// Write the token file via a temp file and rename so a crash never leaves
/// a truncated record behind.
fn write_atomic(path: &Path, stored: &StoredTokens) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Token path has no parent directory"))?;
    std::fs::create_dir_all(dir)?;

    let tmp_path = dir.join(format!(".{}.tmp.{}", TOKEN_FILE, std::process::id()));
    let contents = serde_json::to_string_pretty(stored)?;
    std::fs::write(&tmp_path, contents).context("Failed to write temp token file")?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp_path, std::fs::Permissions::from_mode(0o600))
            .context("Failed to set token file permissions")?;
    }

    std::fs::rename(&tmp_path, path).context("Failed to replace token file")?;
    debug!(path = %path.display(), "Persisted tokens");
    Ok(())
}

/// Process-local token store for tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    state: Mutex<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: CredentialPair) -> Self {
        let mut stored = StoredTokens::default();
        stored.set_pair(&pair);
        Self {
            state: Mutex::new(stored),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut StoredTokens) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| anyhow::anyhow!("Token store lock poisoned"))?;
        Ok(f(&mut state))
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, pair: &CredentialPair) -> Result<()> {
        self.with_state(|s| s.set_pair(pair))
    }

    fn load(&self) -> Result<Option<CredentialPair>> {
        self.with_state(|s| s.pair())
    }

    fn clear(&self) -> Result<()> {
        self.with_state(|s| *s = StoredTokens::default())
    }

    fn save_user(&self, user: &User) -> Result<()> {
        self.with_state(|s| s.user = Some(user.clone()))
    }

    fn load_user(&self) -> Result<Option<User>> {
        self.with_state(|s| s.user.clone())
    }

    fn clear_user(&self) -> Result<()> {
        self.with_state(|s| s.user = None)
    }
}

#[cfg(test)]
pub(crate) fn test_user() -> User {
    User {
        id: "u-1".into(),
        email: "amani@example.com".into(),
        name: "Amani".into(),
        role: crate::models::UserRole::Parent,
        phone_number: None,
        is_active: true,
        is_verified: true,
        two_factor_enabled: false,
        created_at: chrono::Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        assert!(store.load().unwrap().is_none());

        store.save(&CredentialPair::new("a1", "r1")).unwrap();
        store.save_user(&test_user()).unwrap();

        // A second handle on the same directory sees the persisted state
        let reopened = FileTokenStore::new(dir.path());
        assert_eq!(reopened.load().unwrap(), Some(CredentialPair::new("a1", "r1")));
        assert_eq!(reopened.load_user().unwrap().map(|u| u.name), Some("Amani".to_string()));
    }

    #[test]
    fn test_file_store_save_overwrites_and_keeps_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        store.save(&CredentialPair::new("a1", "r1")).unwrap();
        store.save_user(&test_user()).unwrap();
        store.save(&CredentialPair::new("a2", "r2")).unwrap();

        assert_eq!(store.load().unwrap(), Some(CredentialPair::new("a2", "r2")));
        assert!(store.load_user().unwrap().is_some());
    }

    #[test]
    fn test_file_store_clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        store.save(&CredentialPair::new("a1", "r1")).unwrap();
        store.save_user(&test_user()).unwrap();

        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
        assert!(store.load_user().unwrap().is_none());
        assert!(!store.path().exists());

        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_clear_user_keeps_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        store.clear_user().unwrap();
        assert!(!store.path().exists());

        store.save(&CredentialPair::new("a1", "r1")).unwrap();
        store.save_user(&test_user()).unwrap();
        store.clear_user().unwrap();

        assert_eq!(store.load().unwrap(), Some(CredentialPair::new("a1", "r1")));
        assert!(store.load_user().unwrap().is_none());
    }

    #[test]
    fn test_load_requires_both_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        std::fs::write(store.path(), r#"{"access_token":"a1","refresh_token":null,"user":null}"#)
            .unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn test_file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path());
        store.save(&CredentialPair::new("a1", "r1")).unwrap();

        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "token file must be 0600, got {mode:o}");
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryTokenStore::with_pair(CredentialPair::new("a1", "r1"));
        assert_eq!(store.load().unwrap(), Some(CredentialPair::new("a1", "r1")));
        store.clear().unwrap();
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let rendered = format!("{:?}", CredentialPair::new("secret-access", "secret-refresh"));
        assert!(!rendered.contains("secret"));
    }
}
