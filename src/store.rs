//! Key-value persistence following the XDG Base Directory layout.
//!
//! Saved locations, the alarm timing preference and the alarm state are each
//! stored under their own key. The file backend keeps one file per key in
//! `$XDG_STATE_HOME/sunrise-alarm/{namespace}`, where the namespace is:
//! - `default` for the default configuration directory
//! - `custom_<hash>` for a custom configuration directory (via `--config`)

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use fs2::FileExt;

use crate::common::constants::{APP_DIR_NAME, STORE_LOCK_FILE};
use crate::common::utils::private_path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not encode or decode stored value for '{key}': {message}")]
    Encoding { key: String, message: String },
}

/// Minimal string key-value storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Block until this process holds the store exclusively.
    ///
    /// Stores private to one process need no lock and keep this default.
    fn lock_exclusive(&self) -> Result<StoreLock, StoreError> {
        Ok(StoreLock::unshared())
    }
}

/// Exclusive hold on a store shared between processes, released on drop.
pub struct StoreLock {
    _file: Option<File>,
}

impl StoreLock {
    /// A lock that excludes nothing.
    pub fn unshared() -> Self {
        Self { _file: None }
    }
}

/// Read a JSON value stored under `key`.
pub fn get_json<T: serde::de::DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StoreError::Encoding {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Store `value` as JSON under `key`.
pub fn set_json<T: serde::Serialize>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let raw = serde_json::to_string(value).map_err(|e| StoreError::Encoding {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    store.set(key, &raw)
}

/// One file per key inside a state directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// Open the store for the given configuration directory (None = default).
    pub fn for_config_dir(config_dir: Option<&Path>) -> anyhow::Result<Self> {
        Ok(Self::new(get_state_dir(config_dir)?))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }

    fn io_error(path: &Path, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: private_path(path),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        // Write to a sibling temp file and rename so readers never see a torn value
        let path = self.path_for(key);
        let mut file =
            tempfile::NamedTempFile::new_in(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;
        file.write_all(value.as_bytes())
            .map_err(|e| Self::io_error(&path, e))?;
        file.persist(&path)
            .map_err(|e| Self::io_error(&path, e.error))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_error(&path, e)),
        }
    }

    fn lock_exclusive(&self) -> Result<StoreLock, StoreError> {
        fs::create_dir_all(&self.dir).map_err(|e| Self::io_error(&self.dir, e))?;

        let path = self.path_for(STORE_LOCK_FILE);
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| Self::io_error(&path, e))?;
        file.lock_exclusive().map_err(|e| Self::io_error(&path, e))?;

        Ok(StoreLock { _file: Some(file) })
    }
}

/// In-process storage, used by tests and as a fallback when no state directory exists.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut values = self.values.lock().unwrap_or_else(|e| e.into_inner());
        values.remove(key);
        Ok(())
    }
}

/// Get the state directory for a given configuration directory.
pub fn get_state_dir(config_dir: Option<&Path>) -> anyhow::Result<PathBuf> {
    let state_home = std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(".local/state")
        });

    let namespace = match config_dir {
        None => "default".to_string(),
        Some(path) => {
            let default_config = dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME));
            if default_config.as_deref() == Some(path) {
                "default".to_string()
            } else {
                get_state_namespace(path)
            }
        }
    };

    Ok(state_home.join(APP_DIR_NAME).join(namespace))
}

/// Generate a stable namespace for a custom config directory.
fn get_state_namespace(config_path: &Path) -> String {
    let canonical = config_path
        .canonicalize()
        .unwrap_or_else(|_| config_path.to_path_buf());

    // SHA256 truncated to 16 chars is stable across runs and unique enough
    let hash = sha256::digest(canonical.to_string_lossy().as_bytes());
    format!("custom_{}", &hash[..16])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn test_file_store_round_trip_and_remove() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));

        assert_eq!(store.get("alarm_timing").unwrap(), None);
        store.set("alarm_timing", "after").unwrap();
        assert_eq!(store.get("alarm_timing").unwrap().as_deref(), Some("after"));

        store.set("alarm_timing", "before").unwrap();
        assert_eq!(store.get("alarm_timing").unwrap().as_deref(), Some("before"));

        store.remove("alarm_timing").unwrap();
        assert_eq!(store.get("alarm_timing").unwrap(), None);
        // Removing a missing key is fine
        store.remove("alarm_timing").unwrap();
    }

    #[test]
    fn test_file_store_lock_excludes_other_handles() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("state"));
        let other = FileStore::new(dir.path().join("state"));

        let held = store.lock_exclusive().unwrap();
        let (tx, rx) = std::sync::mpsc::channel();
        let waiter = std::thread::spawn(move || {
            let _lock = other.lock_exclusive().unwrap();
            tx.send(()).unwrap();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        drop(held);
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        waiter.join().unwrap();
        assert!(dir.path().join("state").join(STORE_LOCK_FILE).exists());
    }

    #[test]
    fn test_json_helpers_report_key_on_bad_data() {
        let store = MemoryStore::new();
        store.set("saved_locations", "{not json").unwrap();

        let err = get_json::<Vec<String>>(&store, "saved_locations").unwrap_err();
        assert!(err.to_string().contains("saved_locations"));
    }

    #[test]
    fn test_json_helpers_round_trip() {
        let store = MemoryStore::new();
        set_json(&store, "numbers", &vec![1, 2, 3]).unwrap();
        let numbers: Option<Vec<i32>> = get_json(&store, "numbers").unwrap();
        assert_eq!(numbers, Some(vec![1, 2, 3]));
    }

    #[test]
    #[serial]
    fn test_state_dir_namespaces() {
        let state_home = tempdir().unwrap();
        // SAFETY: serialized with other environment-touching tests
        unsafe { std::env::set_var("XDG_STATE_HOME", state_home.path()) };

        let default_dir = get_state_dir(None).unwrap();
        assert_eq!(default_dir, state_home.path().join("sunrise-alarm/default"));

        let custom = tempdir().unwrap();
        let custom_dir = get_state_dir(Some(custom.path())).unwrap();
        let namespace = custom_dir.file_name().unwrap().to_string_lossy().to_string();
        assert!(namespace.starts_with("custom_"));
        assert_eq!(namespace.len(), "custom_".len() + 16);

        // Stable across calls
        assert_eq!(get_state_dir(Some(custom.path())).unwrap(), custom_dir);

        unsafe { std::env::remove_var("XDG_STATE_HOME") };
    }
}
