use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::keys::{QueryKey, Resource};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
    /// Set by a mutation; forces a refetch regardless of age.
    #[serde(default)]
    pub invalidated: bool,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
            invalidated: false,
        }
    }

    pub fn age(&self) -> Duration {
        Utc::now() - self.cached_at
    }

    pub fn age_minutes(&self) -> i64 {
        self.age().num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Includes negative ages from clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                // Round up: 1d 12h+ becomes 2d
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }

    /// Stale once invalidated or older than `window`.
    pub fn is_stale(&self, window: Duration) -> bool {
        self.invalidated || self.age() > window
    }
}

/// Query cache with per-key staleness windows and resource-level
/// invalidation.
///
/// Entries are held as JSON values so one map serves every resource type.
/// When built with [`QueryCache::persistent`] each entry is mirrored to
/// `<dir>/<name>.json`, so a later process sees both the data and any
/// pending invalidations.
pub struct QueryCache {
    dir: Option<PathBuf>,
    state: Mutex<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<QueryKey, CachedData<serde_json::Value>>,
    /// Bumped per resource by every invalidation and by `clear`. A fetch
    /// that started under an older generation must not store its result.
    generations: HashMap<Resource, u64>,
}

impl QueryCache {
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Open a cache directory, loading whatever entries it already holds.
    pub fn persistent(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create cache directory {}", dir.display()))?;

        let mut entries = HashMap::new();
        for file in std::fs::read_dir(&dir)? {
            let path = file?.path();
            let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|_| path.extension().is_some_and(|ext| ext == "json"))
                .and_then(QueryKey::parse)
            else {
                continue;
            };

            match Self::read_entry(&path) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(e) => {
                    debug!(cache = %key.name(), error = %e, "Ignoring unreadable cache file");
                }
            }
        }

        debug!(dir = %dir.display(), entries = entries.len(), "Loaded query cache");
        Ok(Self {
            dir: Some(dir),
            state: Mutex::new(CacheState {
                entries,
                generations: HashMap::new(),
            }),
        })
    }

    fn read_entry(path: &std::path::Path) -> Result<CachedData<serde_json::Value>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn cache_path(&self, key: &QueryKey) -> Option<PathBuf> {
        self.dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", key.name())))
    }

    /// Mirror an entry to disk. Failures only cost persistence, so they are
    /// logged rather than returned.
    fn persist(&self, key: &QueryKey, entry: &CachedData<serde_json::Value>) {
        let Some(path) = self.cache_path(key) else {
            return;
        };
        let result = serde_json::to_string_pretty(entry)
            .map_err(anyhow::Error::from)
            .and_then(|contents| std::fs::write(&path, contents).map_err(anyhow::Error::from));
        if let Err(e) = result {
            warn!(cache = %key.name(), error = %e, "Failed to write cache file");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, CacheState> {
        // A panic while holding the lock cannot leave a half-written entry
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The cached entry for `key`, fresh or not.
    pub fn get<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<CachedData<T>> {
        let entry = self.lock().entries.get(key).cloned()?;
        match serde_json::from_value(entry.data) {
            Ok(data) => Some(CachedData {
                data,
                cached_at: entry.cached_at,
                invalidated: entry.invalidated,
            }),
            Err(e) => {
                debug!(cache = %key.name(), error = %e, "Cached entry no longer decodes");
                None
            }
        }
    }

    /// The cached value if it is within its staleness window and not invalidated.
    pub fn get_fresh<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        self.get::<T>(key)
            .filter(|cached| !cached.is_stale(key.stale_after()))
            .map(|cached| cached.data)
    }

    pub fn put<T: Serialize>(&self, key: QueryKey, data: &T) {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!(cache = %key.name(), error = %e, "Failed to encode cache entry");
                return;
            }
        };
        let entry = CachedData::new(value);
        self.persist(&key, &entry);
        self.lock().entries.insert(key, entry);
    }

    /// Store `data` only if nothing invalidated `key`'s resource since
    /// `generation` was read. Returns whether it was stored.
    fn put_if_current<T: Serialize>(&self, key: QueryKey, data: &T, generation: u64) -> bool {
        let value = match serde_json::to_value(data) {
            Ok(value) => value,
            Err(e) => {
                warn!(cache = %key.name(), error = %e, "Failed to encode cache entry");
                return false;
            }
        };

        let mut state = self.lock();
        let current = state.generations.get(&key.resource()).copied().unwrap_or(0);
        if current != generation {
            debug!(cache = %key.name(), "Invalidated while fetching, result not cached");
            return false;
        }
        let entry = CachedData::new(value);
        self.persist(&key, &entry);
        state.entries.insert(key, entry);
        true
    }

    fn generation(&self, resource: Resource) -> u64 {
        *self.lock().generations.entry(resource).or_insert(0)
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        match self.lock().entries.get(key) {
            Some(entry) => entry.is_stale(key.stale_after()),
            None => true, // No cache = stale
        }
    }

    /// Mark every entry belonging to `resources` stale so the next read
    /// refetches it. Entries are kept until then.
    pub fn invalidate(&self, resources: &[Resource]) {
        let mut state = self.lock();
        for resource in resources {
            *state.generations.entry(*resource).or_insert(0) += 1;
        }
        for (key, entry) in state.entries.iter_mut() {
            if resources.contains(&key.resource()) && !entry.invalidated {
                entry.invalidated = true;
                self.persist(key, entry);
                debug!(cache = %key.name(), "Invalidated cache entry");
            }
        }
    }

    /// Drop every entry, e.g. when a different user signs in.
    pub fn clear(&self) {
        let mut state = self.lock();
        for generation in state.generations.values_mut() {
            *generation += 1;
        }
        for key in state.entries.keys() {
            if let Some(path) = self.cache_path(key) {
                if let Err(e) = std::fs::remove_file(&path) {
                    debug!(cache = %key.name(), error = %e, "Failed to remove cache file");
                }
            }
        }
        state.entries.clear();
    }

    /// Return the fresh cached value for `key`, or run `fetch` and cache its
    /// result. A failed fetch leaves the cache untouched and its error is
    /// returned; stale data is never substituted. A result whose resource
    /// was invalidated while the fetch ran is returned but not cached.
    pub async fn fetch_with<T, F, Fut, E>(&self, key: QueryKey, force: bool, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !force {
            if let Some(data) = self.get_fresh::<T>(&key) {
                debug!(cache = %key.name(), "Cache hit");
                return Ok(data);
            }
        }

        debug!(cache = %key.name(), force, "Cache miss, fetching");
        let generation = self.generation(key.resource());
        let data = fetch().await?;
        self.put_if_current(key, &data, generation);
        Ok(data)
    }

    pub fn age_display(&self, key: &QueryKey) -> Option<String> {
        self.lock().entries.get(key).map(|entry| entry.age_display())
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, key: &QueryKey, by: Duration) {
        if let Some(entry) = self.lock().entries.get_mut(key) {
            entry.cached_at = entry.cached_at - by;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
