//! Settings store
//!
//! Owns the live settings together with the matcher cache built from them.
//! Both are published as one immutable [`SettingsSnapshot`]; replacing the
//! settings builds a complete new snapshot and swaps the pointer, so a reader
//! holding a snapshot never sees settings and matchers from different
//! generations.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::cache::MatcherCache;
use crate::config::STORAGE_KEY;
use crate::defaults::default_settings;
use crate::migrate::{migrate, MigrationError};
use crate::types::{EditError, Settings};

// =============================================================================
// Persistence backend
// =============================================================================

/// Error from the persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Failed to read settings: {0}")]
    Read(String),
    #[error("Failed to write settings: {0}")]
    Write(String),
}

/// Key/value store holding the persisted settings record.
#[allow(async_fn_in_trait)]
pub trait PersistenceBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;
}

/// In-memory backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: Value) -> Self {
        let backend = Self::new();
        backend.insert(key, value);
        backend
    }

    pub fn insert(&self, key: &str, value: Value) {
        self.lock().insert(key.to_string(), value);
    }

    pub fn value(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Value>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PersistenceBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.value(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.insert(key, value);
        Ok(())
    }
}

// =============================================================================
// Snapshot
// =============================================================================

/// Settings and the matchers compiled from them.
#[derive(Debug)]
pub struct SettingsSnapshot {
    /// Increases by one on every replace.
    pub version: u64,
    pub settings: Settings,
    pub matchers: MatcherCache,
}

impl SettingsSnapshot {
    pub fn new(version: u64, settings: Settings) -> Self {
        let matchers = MatcherCache::rebuild(&settings);
        Self {
            version,
            settings,
            matchers,
        }
    }
}

/// Where loaded settings came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// Nothing stored; built-in defaults.
    Defaults,
    /// Stored record was already current layout.
    Stored,
    /// Stored record was legacy layout and has been migrated.
    Migrated,
    /// Stored record could not be read or parsed; built-in defaults.
    Unreadable,
}

#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub source: LoadSource,
    pub snapshot: Arc<SettingsSnapshot>,
}

impl LoadOutcome {
    /// Whether the loaded settings should be written back to storage.
    ///
    /// Unreadable records are left in place rather than overwritten.
    pub fn needs_persist(&self) -> bool {
        matches!(self.source, LoadSource::Defaults | LoadSource::Migrated)
    }
}

// =============================================================================
// Store
// =============================================================================

type Listener = Box<dyn FnMut(&Arc<SettingsSnapshot>)>;

/// Holder of the live settings.
pub struct SettingsStore {
    key: String,
    current: Arc<SettingsSnapshot>,
    listeners: Vec<Listener>,
}

impl SettingsStore {
    /// Create a store holding empty, globally enabled settings until loaded.
    pub fn new() -> Self {
        Self::with_key(STORAGE_KEY)
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            current: Arc::new(SettingsSnapshot::new(0, Settings::default())),
            listeners: Vec::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// The live snapshot. Cheap; callers keep it for the duration of one decision.
    pub fn current(&self) -> Arc<SettingsSnapshot> {
        Arc::clone(&self.current)
    }

    pub fn settings(&self) -> &Settings {
        &self.current.settings
    }

    /// Register a callback run after every replace.
    pub fn subscribe(&mut self, listener: impl FnMut(&Arc<SettingsSnapshot>) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Swap in new settings and rebuild the matcher cache.
    pub fn replace(&mut self, settings: Settings) -> Arc<SettingsSnapshot> {
        let next = Arc::new(SettingsSnapshot::new(self.current.version + 1, settings));
        self.current = Arc::clone(&next);
        for listener in &mut self.listeners {
            listener(&next);
        }
        next
    }

    /// Install a raw stored value (or its absence) without touching storage.
    pub fn ingest(&mut self, raw: Option<Value>) -> LoadOutcome {
        let (source, settings) = match raw {
            None | Some(Value::Null) => (LoadSource::Defaults, default_settings()),
            Some(value) => match migrate(value) {
                Ok(migrated) if migrated.changed => (LoadSource::Migrated, migrated.settings),
                Ok(migrated) => (LoadSource::Stored, migrated.settings),
                Err(e) => {
                    log::warn!("stored settings unusable, falling back to defaults: {}", e);
                    (LoadSource::Unreadable, default_settings())
                }
            },
        };
        let snapshot = self.replace(settings);
        LoadOutcome { source, snapshot }
    }

    /// Read, migrate and install the stored settings, writing back defaults
    /// or migrated records. Read failures count as nothing stored; write
    /// failures are logged and the in-memory settings stay authoritative.
    pub async fn load<B: PersistenceBackend>(&mut self, backend: &B) -> LoadOutcome {
        let raw = match backend.get(&self.key).await {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("{}", e);
                None
            }
        };
        let outcome = self.ingest(raw);
        if outcome.needs_persist() {
            self.persist_logged(backend).await;
        }
        outcome
    }

    /// Replace the settings with a value written by another context.
    /// Malformed values are rejected and the current settings kept.
    pub fn on_external_change(&mut self, raw: Value) -> Result<Arc<SettingsSnapshot>, MigrationError> {
        let migrated = migrate(raw)?;
        log::debug!("settings changed externally");
        Ok(self.replace(migrated.settings))
    }

    /// Apply an edit to a copy of the current settings and install it.
    /// On error the live settings are untouched.
    pub fn edit<F, R>(&mut self, edit: F) -> Result<R, EditError>
    where
        F: FnOnce(&mut Settings) -> Result<R, EditError>,
    {
        let mut settings = self.current.settings.clone();
        let result = edit(&mut settings)?;
        self.replace(settings);
        Ok(result)
    }

    /// [`edit`](Self::edit), then persist best-effort.
    pub async fn update<B, F, R>(&mut self, backend: &B, edit: F) -> Result<R, EditError>
    where
        B: PersistenceBackend,
        F: FnOnce(&mut Settings) -> Result<R, EditError>,
    {
        let result = self.edit(edit)?;
        self.persist_logged(backend).await;
        Ok(result)
    }

    /// Write the current settings under the store key.
    pub async fn persist<B: PersistenceBackend>(&self, backend: &B) -> Result<(), StorageError> {
        let value = serde_json::to_value(&self.current.settings)
            .map_err(|e| StorageError::Write(e.to_string()))?;
        backend.set(&self.key, value).await
    }

    async fn persist_logged<B: PersistenceBackend>(&self, backend: &B) {
        if let Err(e) = self.persist(backend).await {
            log::warn!("{}", e);
        }
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::defaults::{DEFAULT_MATCH_PATTERNS, DEFAULT_PREFIX_URL};

    struct FailingBackend {
        stored: Option<Value>,
    }

    impl PersistenceBackend for FailingBackend {
        async fn get(&self, _key: &str) -> Result<Option<Value>, StorageError> {
            match &self.stored {
                Some(v) => Ok(Some(v.clone())),
                None => Err(StorageError::Read("backend offline".to_string())),
            }
        }

        async fn set(&self, _key: &str, _value: Value) -> Result<(), StorageError> {
            Err(StorageError::Write("quota exceeded".to_string()))
        }
    }

    fn legacy_record() -> Value {
        json!({
            "globalEnabled": true,
            "rules": [
                { "id": "1", "matchUrl": "https://a/", "prefixUrl": "https://p/", "enabled": true },
                { "id": "2", "matchUrl": "https://b/", "prefixUrl": "https://p/", "enabled": false },
            ]
        })
    }

    #[tokio::test]
    async fn test_load_absent_persists_defaults() {
        let backend = MemoryBackend::new();
        let mut store = SettingsStore::new();

        let outcome = store.load(&backend).await;
        assert_eq!(outcome.source, LoadSource::Defaults);
        assert_eq!(store.settings().rules[0].prefix_url, DEFAULT_PREFIX_URL);
        assert_eq!(store.current().matchers.len(), DEFAULT_MATCH_PATTERNS.len());

        let stored = backend.value(STORAGE_KEY).unwrap();
        let stored: Settings = serde_json::from_value(stored).unwrap();
        assert_eq!(&stored, store.settings());
    }

    #[tokio::test]
    async fn test_load_migrates_and_writes_back() {
        let backend = MemoryBackend::with_value(STORAGE_KEY, legacy_record());
        let mut store = SettingsStore::new();

        let outcome = store.load(&backend).await;
        assert_eq!(outcome.source, LoadSource::Migrated);
        assert_eq!(store.settings().rules.len(), 1);

        let stored = backend.value(STORAGE_KEY).unwrap();
        assert!(stored["rules"][0]["matchUrls"].is_array());
    }

    #[tokio::test]
    async fn test_load_current_does_not_write() {
        let record = json!({
            "globalEnabled": false,
            "rules": [{ "id": "r", "prefixUrl": "P", "enabled": true,
                        "matchUrls": [{ "id": "m", "pattern": "x" }] }]
        });
        let backend = FailingBackend { stored: Some(record) };
        let mut store = SettingsStore::new();

        let outcome = store.load(&backend).await;
        assert_eq!(outcome.source, LoadSource::Stored);
        assert!(!outcome.needs_persist());
        assert!(!store.settings().global_enabled);
    }

    #[tokio::test]
    async fn test_failures_fall_back_and_keep_memory() {
        let backend = FailingBackend { stored: None };
        let mut store = SettingsStore::new();

        let outcome = store.load(&backend).await;
        assert_eq!(outcome.source, LoadSource::Defaults);
        assert_eq!(store.settings().rules.len(), 1);

        let backend = FailingBackend { stored: Some(legacy_record()) };
        let outcome = store.load(&backend).await;
        assert_eq!(outcome.source, LoadSource::Migrated);
        assert_eq!(store.settings().rules[0].prefix_url, "https://p/");
    }

    #[tokio::test]
    async fn test_unreadable_record_is_not_overwritten() {
        let backend = MemoryBackend::with_value(STORAGE_KEY, json!("garbage"));
        let mut store = SettingsStore::new();

        let outcome = store.load(&backend).await;
        assert_eq!(outcome.source, LoadSource::Unreadable);
        assert_eq!(backend.value(STORAGE_KEY), Some(json!("garbage")));
        assert_eq!(store.settings().rules[0].prefix_url, DEFAULT_PREFIX_URL);
    }

    #[test]
    fn test_external_change_replaces_and_notifies() {
        let mut store = SettingsStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        store.subscribe(move |snapshot| sink.borrow_mut().push(snapshot.version));

        store.ingest(None);
        let before = store.current();

        let snapshot = store.on_external_change(legacy_record()).unwrap();
        assert_eq!(snapshot.version, before.version + 1);
        assert_eq!(snapshot.settings.rules[0].prefix_url, "https://p/");
        assert_eq!(snapshot.matchers.len(), 2);

        // Earlier holders keep their own consistent generation.
        assert_eq!(before.settings.rules[0].prefix_url, DEFAULT_PREFIX_URL);
        assert_eq!(*seen.borrow(), vec![1, 2]);

        assert!(store.on_external_change(json!(42)).is_err());
        assert_eq!(store.current().version, 2);
    }

    #[tokio::test]
    async fn test_update_persists_edit() {
        let backend = MemoryBackend::new();
        let mut store = SettingsStore::new();
        store.load(&backend).await;
        let rule_id = store.settings().rules[0].id.clone();

        store
            .update(&backend, |s| s.set_rule_enabled(&rule_id, false))
            .await
            .unwrap();
        assert!(!store.settings().rules[0].enabled);
        assert_eq!(backend.value(STORAGE_KEY).unwrap()["rules"][0]["enabled"], false);

        let version = store.current().version;
        let err = store.update(&backend, |s| s.set_prefix("missing", "x")).await;
        assert!(err.is_err());
        assert_eq!(store.current().version, version);
    }
}
