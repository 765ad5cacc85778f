//! Read-side view of a directory example database for `cargo conjecture db`.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use conjecture_core::blob::encode_blob;
use conjecture_core::database::{key_for_name, secondary_key, short_hash, StoredValue};
use conjecture_core::{choices_from_bytes, ChoiceValue, DirectoryDatabase};

/// Summary of one key directory.
#[derive(Debug, Clone, Serialize)]
pub struct KeySummary {
    pub hash: String,
    pub entries: usize,
    pub bytes: usize,
    pub modified: Option<DateTime<Local>>,
}

/// One stored buffer, decoded for display.
#[derive(Debug, Clone)]
pub struct ShownEntry {
    pub name: String,
    pub size: usize,
    pub modified: Option<DateTime<Local>>,
    /// The decoded choices, or why the buffer could not be decoded.
    pub choices: std::result::Result<Vec<ChoiceValue>, String>,
    pub blob: String,
}

pub struct Inventory {
    db: DirectoryDatabase,
}

fn local_time(time: Option<SystemTime>) -> Option<DateTime<Local>> {
    time.map(DateTime::<Local>::from)
}

impl Inventory {
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Inventory {
            db: DirectoryDatabase::new(root),
        }
    }

    pub fn root(&self) -> &Path {
        self.db.root()
    }

    /// Every key directory, newest first.
    pub fn keys(&self) -> Result<Vec<KeySummary>> {
        let mut keys: Vec<KeySummary> = self
            .db
            .entries()
            .with_context(|| format!("Failed to read database at {}", self.root().display()))?
            .into_iter()
            .map(|key| KeySummary {
                entries: key.values.len(),
                bytes: key.values.iter().map(|v| v.bytes.len()).sum(),
                modified: local_time(key.values.iter().filter_map(|v| v.modified).max()),
                hash: key.hash,
            })
            .collect();
        keys.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.hash.cmp(&b.hash)));
        Ok(keys)
    }

    /// Map a key argument to its directory name.
    ///
    /// An existing directory name is taken as is. Anything else is treated as
    /// a test name and hashed the way the runner hashes it.
    pub fn resolve(&self, key: &str, secondary: bool) -> String {
        if !secondary && self.root().join(key).is_dir() {
            return key.to_string();
        }
        let mut hashed = key_for_name(key);
        if secondary {
            hashed = secondary_key(&hashed);
        }
        let hash = short_hash(&hashed);
        debug!(key, hash = %hash, secondary, "resolved test name");
        hash
    }

    /// Every value stored under `hash`, decoded.
    pub fn show(&self, hash: &str) -> Result<Vec<ShownEntry>> {
        let values = self
            .db
            .fetch_hashed(hash)
            .with_context(|| format!("Failed to read key {}", hash))?;
        Ok(values.into_iter().map(Self::decode).collect())
    }

    fn decode(value: StoredValue) -> ShownEntry {
        ShownEntry {
            size: value.bytes.len(),
            modified: local_time(value.modified),
            choices: choices_from_bytes(&value.bytes).map_err(|e| e.to_string()),
            blob: encode_blob(&value.bytes),
            name: value.name,
        }
    }

    /// Delete a key directory or a single value in it.
    pub fn prune(&self, hash: &str, value: Option<&str>) -> Result<usize> {
        self.db
            .delete_hashed(hash, value)
            .with_context(|| format!("Failed to prune key {}", hash))
    }

    /// Temporary files left behind by writers that died mid-save.
    pub fn stray_files(&self) -> Vec<PathBuf> {
        WalkDir::new(self.root())
            .min_depth(2)
            .max_depth(2)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| e.file_name().to_string_lossy().starts_with('.'))
            .map(|e| e.into_path())
            .collect()
    }

    /// Remove stray temporary files. Returns how many were removed.
    pub fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.stray_files() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(e).with_context(|| format!("Failed to remove {}", path.display())),
            }
        }
        Ok(removed)
    }
}
