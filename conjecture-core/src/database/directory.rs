use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tempfile::NamedTempFile;
use tracing::{trace, warn};

use super::{short_hash, DatabaseEvent, ExampleDatabase, Listener, ListenerId, Listeners};
use crate::error::DatabaseError;

/// A database stored as files under a root directory.
///
/// Each key is a directory named by the hash of the key, and each value is a
/// file in it named by the hash of the value. Writes go through a temporary
/// file and an atomic rename, so readers never see partial values and
/// several processes can share one directory.
#[derive(Debug)]
pub struct DirectoryDatabase {
    root: PathBuf,
    listeners: Listeners,
}

/// One key directory, as seen by tooling.
#[derive(Debug, Clone)]
pub struct StoredKey {
    pub hash: String,
    pub values: Vec<StoredValue>,
}

/// One stored value file.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub name: String,
    pub bytes: Vec<u8>,
    pub modified: Option<SystemTime>,
}

impl DirectoryDatabase {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryDatabase {
            root: root.into(),
            listeners: Listeners::default(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_dir(&self, key: &[u8]) -> PathBuf {
        self.root.join(short_hash(key))
    }

    fn value_path(&self, key: &[u8], value: &[u8]) -> PathBuf {
        self.key_dir(key).join(short_hash(value))
    }

    fn read_values(dir: &Path) -> Result<Vec<StoredValue>, DatabaseError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DatabaseError::io(dir, e)),
        };
        let mut values = Vec::new();
        for entry in entries {
            // Entries can vanish between listing and reading.
            let Ok(entry) = entry else { continue };
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            let path = entry.path();
            match fs::read(&path) {
                Ok(bytes) => values.push(StoredValue {
                    name,
                    bytes,
                    modified: entry.metadata().and_then(|m| m.modified()).ok(),
                }),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    trace!(path = %path.display(), "value vanished during fetch");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable database entry"),
            }
        }
        values.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(values)
    }

    /// Every key directory with its values.
    pub fn entries(&self) -> Result<Vec<StoredKey>, DatabaseError> {
        let dirs = match fs::read_dir(&self.root) {
            Ok(dirs) => dirs,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DatabaseError::io(&self.root, e)),
        };
        let mut keys = Vec::new();
        for dir in dirs.flatten() {
            if !dir.path().is_dir() {
                continue;
            }
            keys.push(StoredKey {
                hash: dir.file_name().to_string_lossy().into_owned(),
                values: Self::read_values(&dir.path())?,
            });
        }
        keys.sort_by(|a, b| a.hash.cmp(&b.hash));
        Ok(keys)
    }

    /// Values stored under a key directory, addressed by its hash.
    pub fn fetch_hashed(&self, hash: &str) -> Result<Vec<StoredValue>, DatabaseError> {
        Self::read_values(&self.root.join(hash))
    }

    /// Remove a whole key directory, or one value in it, by hash. Returns how
    /// many values were removed.
    pub fn delete_hashed(&self, hash: &str, value: Option<&str>) -> Result<usize, DatabaseError> {
        let dir = self.root.join(hash);
        let names: Vec<String> = match value {
            Some(name) => vec![name.to_string()],
            None => Self::read_values(&dir)?.into_iter().map(|v| v.name).collect(),
        };
        let mut removed = 0;
        for name in names {
            let path = dir.join(&name);
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(DatabaseError::io(&path, e)),
            }
        }
        let _ = fs::remove_dir(&dir);
        Ok(removed)
    }
}

impl ExampleDatabase for DirectoryDatabase {
    fn save(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        let dir = self.key_dir(key);
        let path = self.value_path(key, value);
        if path.exists() {
            return Ok(());
        }
        // Another writer may remove the key directory once it empties.
        let mut attempts = 0;
        let mut file = loop {
            fs::create_dir_all(&dir).map_err(|e| DatabaseError::io(&dir, e))?;
            match NamedTempFile::new_in(&dir) {
                Ok(file) => break file,
                Err(e) if e.kind() == io::ErrorKind::NotFound && attempts < 3 => attempts += 1,
                Err(e) => return Err(DatabaseError::io(&dir, e)),
            }
        };
        file.write_all(value).map_err(|e| DatabaseError::io(file.path(), e))?;
        file.persist(&path)?;
        self.listeners.broadcast(DatabaseEvent::Save {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        Ok(())
    }

    fn fetch(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, DatabaseError> {
        Ok(Self::read_values(&self.key_dir(key))?
            .into_iter()
            .map(|v| v.bytes)
            .collect())
    }

    fn delete(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        let path = self.value_path(key, value);
        match fs::remove_file(&path) {
            Ok(()) => {
                // Only succeeds once the directory is empty.
                let _ = fs::remove_dir(self.key_dir(key));
                self.listeners.broadcast(DatabaseEvent::Delete {
                    key: key.to_vec(),
                    value: Some(value.to_vec()),
                });
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(DatabaseError::io(&path, e)),
        }
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
