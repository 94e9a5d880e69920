//! Persisted boolean preferences for the search overlay.
//!
//! A [`PreferenceStore`] caches values in memory and writes through to a
//! pluggable [`PreferenceBackend`]:
//!
//! - [`MemoryBackend`]: process-local map (tests, ephemeral sessions)
//! - [`JsonFileBackend`]: JSON object file, atomic write-rename
//! - [`EnvfileBackend`]: `KEY=value` lines, unrelated lines preserved
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | Key absent | default used |
//! | Value not a boolean | treated as absent, logged |
//! | Backend read error | treated as absent, logged |
//! | Backend write error | in-memory value kept, `Error` returned |
//! | Backend remove error | cached value untouched, `Error` returned |
//! | Governing flag off | reported `false`, stored value untouched |

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde_json::{Map, Value};

use crate::config::{self, Config, PreferenceBackendKind};
use crate::error::{Error, Result};

/// Storage key for the include-panels preference.
pub const SEARCH_PANELS_KEY: &str = "dashboard.search.include.panels";
/// Storage key for the legacy show-previews preference.
pub const SEARCH_PREVIEWS_KEY: &str = "dashboard.search.previews";

pub const INCLUDE_PANELS_DEFAULT: bool = true;
pub const SHOW_PREVIEWS_DEFAULT: bool = false;

/// Resolve the effective value of a flag-gated preference.
///
/// With the flag off the answer is always `false`; otherwise the stored value
/// wins over `default`.
#[must_use]
pub const fn resolve_preference(stored: Option<bool>, flag_enabled: bool, default: bool) -> bool {
    if !flag_enabled {
        return false;
    }
    match stored {
        Some(v) => v,
        None => default,
    }
}

/// Encode a boolean for storage (JSON text).
#[must_use]
pub const fn encode_bool(value: bool) -> &'static str {
    if value { "true" } else { "false" }
}

/// Decode a stored value. JSON booleans and the JSON strings `"true"`/`"false"`
/// are accepted; anything else is `None`.
#[must_use]
pub fn decode_bool(raw: &str) -> Option<bool> {
    match serde_json::from_str::<Value>(raw.trim()).ok()? {
        Value::Bool(b) => Some(b),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend trait
// ─────────────────────────────────────────────────────────────────────────────

/// Durable key-value storage for encoded preference values.
pub trait PreferenceBackend: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Raw stored value for `key`, `None` if absent.
    fn load(&self, key: &str) -> Result<Option<String>>;

    /// Persist `raw` under `key`, replacing any previous value.
    fn store(&self, key: &str, raw: &str) -> Result<()>;

    /// Remove `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}

/// Build the backend selected by `config`.
#[must_use]
pub fn open_backend(config: &Config) -> Arc<dyn PreferenceBackend> {
    match config.prefs_backend {
        PreferenceBackendKind::Json => Arc::new(JsonFileBackend::new(&config.prefs_path)),
        PreferenceBackendKind::Envfile => Arc::new(EnvfileBackend::new(&config.prefs_path)),
        PreferenceBackendKind::Memory => Arc::new(MemoryBackend::new()),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory backend
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory backend pre-populated with raw values.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            data: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl PreferenceBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        let guard = self
            .data
            .read()
            .map_err(|_| Error::Storage("lock poisoned".into()))?;
        Ok(guard.get(key).cloned())
    }

    fn store(&self, key: &str, raw: &str) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| Error::Storage("lock poisoned".into()))?;
        guard.insert(key.to_string(), raw.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = self
            .data
            .write()
            .map_err(|_| Error::Storage("lock poisoned".into()))?;
        guard.remove(key);
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// JSON file backend
// ─────────────────────────────────────────────────────────────────────────────

/// Preferences as one JSON object: `{ "<key>": <value>, ... }`.
///
/// Writes go to `{path}.tmp` first and are renamed into place.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Read the object, treating a missing or malformed file as empty.
    fn read_map(&self) -> Result<Map<String, Value>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str::<Value>(&contents) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "preference file is not a JSON object, ignoring");
                Ok(Map::new())
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "preference file is corrupt, ignoring");
                Ok(Map::new())
            }
        }
    }

    fn write_map(&self, map: &Map<String, Value>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = self.temp_path();
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, map)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl PreferenceBackend for JsonFileBackend {
    fn name(&self) -> &str {
        "json-file"
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(key).map(Value::to_string))
    }

    fn store(&self, key: &str, raw: &str) -> Result<()> {
        let value: Value = serde_json::from_str(raw)?;
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Envfile backend
// ─────────────────────────────────────────────────────────────────────────────

/// Preferences as `KEY=value` lines. Storage keys are upper-cased with
/// non-alphanumerics mapped to `_` (`dashboard.search.previews` becomes
/// `DASHBOARD_SEARCH_PREVIEWS`).
#[derive(Debug, Clone)]
pub struct EnvfileBackend {
    path: PathBuf,
}

impl EnvfileBackend {
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn env_key(key: &str) -> String {
        key.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl PreferenceBackend for EnvfileBackend {
    fn name(&self) -> &str {
        "envfile"
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(config::parse_dotenv_contents(&contents).remove(&Self::env_key(key)))
    }

    fn store(&self, key: &str, raw: &str) -> Result<()> {
        let env_key = Self::env_key(key);
        let mut updates = HashMap::new();
        updates.insert(env_key.as_str(), raw.to_string());
        config::update_envfile(&self.path, &updates)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        config::remove_envfile_keys(&self.path, &[Self::env_key(key).as_str()])?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PreferenceStore
// ─────────────────────────────────────────────────────────────────────────────

/// In-memory view of persisted preferences with write-through.
///
/// Each key is read from the backend at most once; afterwards the cached
/// value is authoritative for this store.
pub struct PreferenceStore {
    backend: Arc<dyn PreferenceBackend>,
    cache: HashMap<String, Option<bool>>,
}

impl PreferenceStore {
    #[must_use]
    pub fn new(backend: Arc<dyn PreferenceBackend>) -> Self {
        Self {
            backend,
            cache: HashMap::new(),
        }
    }

    /// Store over a fresh [`MemoryBackend`].
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// The stored value for `key`, `None` if absent or unreadable.
    pub fn stored(&mut self, key: &str) -> Option<bool> {
        if let Some(cached) = self.cache.get(key) {
            return *cached;
        }
        let value = match self.backend.load(key) {
            Ok(Some(raw)) => {
                let decoded = decode_bool(&raw);
                if decoded.is_none() {
                    tracing::warn!(key, raw = %raw, backend = self.backend.name(), "ignoring malformed preference");
                }
                decoded
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, backend = self.backend.name(), error = %e, "failed to read preference");
                None
            }
        };
        self.cache.insert(key.to_string(), value);
        value
    }

    /// Stored value for `key`, or `default` if absent or corrupt.
    pub fn get_preference(&mut self, key: &str, default: bool) -> bool {
        self.stored(key).unwrap_or(default)
    }

    /// Like [`Self::get_preference`] but reports `false` while `flag_enabled` is off.
    /// The stored value is never modified here.
    pub fn get_gated(&mut self, key: &str, default: bool, flag_enabled: bool) -> bool {
        if !flag_enabled {
            return false;
        }
        resolve_preference(self.stored(key), flag_enabled, default)
    }

    /// Set `key` to `value`. The in-memory value is updated even if the
    /// write fails.
    pub fn set_preference(&mut self, key: &str, value: bool) -> Result<()> {
        self.cache.insert(key.to_string(), Some(value));
        self.backend
            .store(key, encode_bool(value))
            .inspect_err(|e| {
                tracing::warn!(key, value, backend = self.backend.name(), error = %e, "failed to persist preference");
            })?;
        tracing::debug!(key, value, backend = self.backend.name(), "preference saved");
        Ok(())
    }

    /// Forget `key` in storage, then in memory. If the backend refuses, the
    /// cached value is left as it was.
    pub fn clear(&mut self, key: &str) -> Result<()> {
        self.backend.remove(key).inspect_err(|e| {
            tracing::warn!(key, backend = self.backend.name(), error = %e, "failed to clear preference");
        })?;
        self.cache.insert(key.to_string(), None);
        Ok(())
    }
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("backend", &self.backend.name())
            .field("cached", &self.cache.len())
            .finish()
    }
}
