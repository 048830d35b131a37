//! File-backed credential store.
//!
//! Values live in a flat JSON object, by default at
//! `<config dir>/pulsefeed/settings.json`:
//!
//! ```text
//! { "pulseops_api_key": "abc123" }
//! ```
//!
//! The file is read once on open and cached; reads never touch the disk.
//! Other processes may rewrite the file: [`FileCredentialStore::reload`]
//! (driven by [`spawn_file_watcher`](crate::credential_watcher::spawn_file_watcher))
//! picks the new content up and announces each changed key.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::credentials::{SignalBus, StorageChange};
use crate::error::StoreError;
use crate::traits::CredentialStore;

const APP_DIR: &str = "pulsefeed";
const SETTINGS_FILE: &str = "settings.json";

type Values = BTreeMap<String, String>;

/// JSON-file [`CredentialStore`] with an in-memory cache.
#[derive(Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
    cache: Mutex<Values>,
    signals: SignalBus,
}

impl FileCredentialStore {
    /// Default settings file location under the platform config directory.
    pub fn default_path() -> Result<PathBuf, StoreError> {
        let base = dirs::config_dir().ok_or(StoreError::NoConfigDir)?;
        Ok(base.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, signals: SignalBus) -> Result<Self, StoreError> {
        let path = path.into();
        let values = read_values(&path)?;
        tracing::debug!(
            "Opened settings file {} ({} keys)",
            path.display(),
            values.len()
        );

        Ok(Self {
            path,
            cache: Mutex::new(values),
            signals,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the file and announce every key whose value changed.
    ///
    /// Returns the announced changes. Writes made through this store are
    /// already cached, so reloading after them announces nothing.
    pub fn reload(&self) -> Result<Vec<StorageChange>, StoreError> {
        let changes = {
            // Read under the lock so an in-flight write through this store
            // is never observed half done
            let mut cache = self.lock();
            let fresh = read_values(&self.path)?;
            let changes = diff(&cache, &fresh);
            *cache = fresh;
            changes
        };

        for change in &changes {
            tracing::info!("Settings key '{}' changed on disk", change.key);
            self.signals.notify(change.clone());
        }
        Ok(changes)
    }

    fn lock(&self) -> MutexGuard<'_, Values> {
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Apply `update` to the cache and persist it, holding the lock across
    /// the write so concurrent writers cannot interleave.
    fn write_with<F>(&self, update: F) -> Result<bool, StoreError>
    where
        F: FnOnce(&mut Values) -> bool,
    {
        let mut cache = self.lock();
        let mut next = cache.clone();
        if !update(&mut next) {
            return Ok(false);
        }

        write_values(&self.path, &next)?;
        *cache = next;
        Ok(true)
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let changed = self.write_with(|values| {
            values.insert(key.to_string(), value.to_string()).as_deref() != Some(value)
        })?;
        if changed {
            self.signals
                .notify(StorageChange::new(key, Some(value.to_string())));
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let changed = self.write_with(|values| values.remove(key).is_some())?;
        if changed {
            self.signals.notify(StorageChange::new(key, None));
        }
        Ok(())
    }
}

fn read_values(path: &Path) -> Result<Values, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Values::new()),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    if content.trim().is_empty() {
        return Ok(Values::new());
    }
    serde_json::from_str(&content).map_err(|e| StoreError::serialization(path, e))
}

fn write_values(path: &Path, values: &Values) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
    }
    let json =
        serde_json::to_string_pretty(values).map_err(|e| StoreError::serialization(path, e))?;

    // Replace atomically so watchers never read a truncated file
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).map_err(|e| StoreError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))
}

fn diff(old: &Values, new: &Values) -> Vec<StorageChange> {
    let mut changes: Vec<StorageChange> = new
        .iter()
        .filter(|(key, value)| old.get(*key) != Some(*value))
        .map(|(key, value)| StorageChange::new(key.clone(), Some(value.clone())))
        .collect();

    changes.extend(
        old.keys()
            .filter(|key| !new.contains_key(*key))
            .map(|key| StorageChange::new(key.clone(), None)),
    );
    changes
}
