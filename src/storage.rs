//! JSON-valued key-value storage with default-on-failure reads.

use std::{
    collections::{BTreeMap, HashMap},
    fs, io,
    path::{Path, PathBuf},
    sync::{Mutex, MutexGuard, PoisonError},
};

use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io error: {0}")]
    Io(#[from] io::Error),
    #[error("could not encode value for '{key}': {source}")]
    Encode {
        key: String,
        source: serde_json::Error,
    },
    #[error("could not decode value for '{key}': {source}")]
    Decode {
        key: String,
        source: serde_json::Error,
    },
    #[error("storage file {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
}

/// Raw string-to-string persistent store.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: String) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
    fn clear(&self) -> Result<(), StorageError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.entries().insert(key.to_owned(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries().clear();
        Ok(())
    }
}

/// Store backed by a single JSON object file.
///
/// The file is read once on open and rewritten in full after every
/// mutation (write to a sibling temp file, then rename).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens `path`, creating an empty store if the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => BTreeMap::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|err| StorageError::Corrupt {
                    path: path.clone(),
                    reason: err.to_string(),
                })?
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => return Err(StorageError::Io(err)),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `a.json` -> `a.json.tmp`, next to the store file.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn mutate<F>(&self, change: F) -> Result<(), StorageError>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = entries.clone();
        change(&mut next);

        let content = serde_json::to_vec_pretty(&next).map_err(io::Error::from)?;
        let tmp = self.temp_path();
        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.insert(key.to_owned(), value);
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.mutate(|entries| {
            entries.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.mutate(BTreeMap::clear)
    }
}

/// Typed JSON access on top of a [`KeyValueStore`].
#[derive(Debug, Default)]
pub struct JsonStorage<S> {
    store: S,
}

impl<S: KeyValueStore> JsonStorage<S> {
    /// Wraps `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Underlying raw store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Encodes `value` as JSON and stores it under `key`.
    pub fn set_item<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value).map_err(|source| StorageError::Encode {
            key: key.to_owned(),
            source,
        })?;
        self.store.set(key, json).map_err(|err| {
            #[cfg(feature = "tracing")]
            tracing::error!("failed to set storage item '{key}': {err}");
            err
        })
    }

    /// Reads and decodes `key`; `Ok(None)` when it is absent.
    pub fn try_get_item<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StorageError> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::Decode {
                key: key.to_owned(),
                source,
            })
    }

    /// Reads `key`, returning `default` if it is missing, undecodable, or the
    /// store fails.
    pub fn get_item<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        match self.try_get_item(key) {
            Ok(Some(value)) => value,
            Ok(None) => default,
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("failed to read storage item '{key}': {_err}");
                default
            }
        }
    }

    /// Deletes `key`; removing an absent key is not an error.
    pub fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.store.remove(key)
    }

    /// Removes every key in the underlying store.
    pub fn clear_all(&self) -> Result<(), StorageError> {
        self.store.clear()
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use serde::{Deserialize, Serialize};

    use super::{FileStore, JsonStorage, KeyValueStore, MemoryStore, StorageError};

    /// Backend whose every operation fails, like a full disk or a store
    /// without permissions.
    struct FailingStore;

    fn denied() -> StorageError {
        StorageError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "storage is read-only",
        ))
    }

    impl KeyValueStore for FailingStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StorageError> {
            Err(denied())
        }

        fn set(&self, _key: &str, _value: String) -> Result<(), StorageError> {
            Err(denied())
        }

        fn remove(&self, _key: &str) -> Result<(), StorageError> {
            Err(denied())
        }

        fn clear(&self) -> Result<(), StorageError> {
            Err(denied())
        }
    }

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct User {
        id: u32,
        name: String,
    }

    #[test]
    fn round_trips_structured_value() {
        let storage = JsonStorage::new(MemoryStore::new());
        let user = User {
            id: 1,
            name: "Kit".to_owned(),
        };
        storage.set_item("user", &user).expect("set must succeed");

        assert_eq!(storage.get_item("user", User::default()), user);
        assert_eq!(
            storage.store().get("user").expect("get").as_deref(),
            Some(r#"{"id":1,"name":"Kit"}"#)
        );
    }

    #[test]
    fn missing_or_invalid_values_fall_back_to_default() {
        let storage = JsonStorage::new(MemoryStore::new());
        assert_eq!(storage.get_item("absent", 7u32), 7);

        storage
            .store()
            .set("broken", "{not json".to_owned())
            .expect("raw set");
        assert_eq!(storage.get_item("broken", 7u32), 7);
        assert!(matches!(
            storage.try_get_item::<u32>("broken"),
            Err(StorageError::Decode { .. })
        ));
    }

    #[test]
    fn remove_and_clear() {
        let storage = JsonStorage::new(MemoryStore::new());
        storage.set_item("a", &1).expect("set a");
        storage.set_item("b", &2).expect("set b");

        storage.remove_item("a").expect("remove");
        assert_eq!(storage.try_get_item::<i32>("a").expect("read a"), None);
        assert_eq!(storage.get_item("b", 0), 2);

        storage.clear_all().expect("clear");
        assert_eq!(storage.get_item("b", 0), 0);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");

        {
            let storage = JsonStorage::new(FileStore::open(&path).expect("open new store"));
            storage
                .set_item("theme", "dark")
                .expect("set theme");
            storage.set_item("volume", &0.5).expect("set volume");
            storage.remove_item("volume").expect("remove volume");
        }

        let reopened = JsonStorage::new(FileStore::open(&path).expect("reopen store"));
        assert_eq!(reopened.get_item("theme", String::new()), "dark");
        assert_eq!(reopened.try_get_item::<f64>("volume").expect("read"), None);
    }

    #[test]
    fn failing_backend_reads_default_and_surfaces_write_errors() {
        let storage = JsonStorage::new(FailingStore);

        assert_eq!(storage.get_item("k", 5), 5);
        assert!(matches!(
            storage.try_get_item::<i32>("k"),
            Err(StorageError::Io(ref err)) if err.kind() == io::ErrorKind::PermissionDenied
        ));
        assert!(matches!(
            storage.set_item("k", &1),
            Err(StorageError::Io(_))
        ));
        assert!(matches!(storage.remove_item("k"), Err(StorageError::Io(_))));
        assert!(matches!(storage.clear_all(), Err(StorageError::Io(_))));
    }

    #[test]
    fn stores_sharing_a_stem_use_distinct_temp_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let json_path = dir.path().join("a.json");
        let yaml_path = dir.path().join("a.yaml");

        let json = FileStore::open(&json_path).expect("open a.json");
        let yaml = FileStore::open(&yaml_path).expect("open a.yaml");
        assert_eq!(json.temp_path(), dir.path().join("a.json.tmp"));
        assert_eq!(yaml.temp_path(), dir.path().join("a.yaml.tmp"));

        json.set("from", "json".to_owned()).expect("set json");
        yaml.set("from", "yaml".to_owned()).expect("set yaml");

        let json = FileStore::open(&json_path).expect("reopen a.json");
        let yaml = FileStore::open(&yaml_path).expect("reopen a.yaml");
        assert_eq!(json.get("from").expect("get json").as_deref(), Some("json"));
        assert_eq!(yaml.get("from").expect("get yaml").as_deref(), Some("yaml"));
        assert!(!dir.path().join("a.json.tmp").exists());
        assert!(!dir.path().join("a.yaml.tmp").exists());
        assert!(!dir.path().join("a.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_rejected_on_open() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("store.json");
        std::fs::write(&path, "[1, 2").expect("write corrupt file");

        let err = FileStore::open(&path).expect_err("corrupt file must not open");
        assert!(matches!(err, StorageError::Corrupt { .. }));
    }
}
