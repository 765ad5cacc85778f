//! Example databases: persistent storage of interesting choice sequences.
//!
//! A database is a multimap from byte keys to sets of byte values. The
//! runner stores the best known buffer for each bug under the test's key and
//! replays them on the next run.

mod directory;
mod memory;
mod multiplexed;
mod readonly;

pub use directory::{DirectoryDatabase, StoredKey, StoredValue};
pub use memory::InMemoryDatabase;
pub use multiplexed::MultiplexedDatabase;
pub use readonly::ReadOnlyDatabase;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use sha2::{Digest, Sha384};

use crate::error::DatabaseError;

/// A change observed on a database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseEvent {
    Save { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8>, value: Option<Vec<u8>> },
}

/// Callback invoked for each [`DatabaseEvent`].
pub type Listener = Arc<dyn Fn(&DatabaseEvent) + Send + Sync>;

/// Handle returned by [`ExampleDatabase::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Storage backend for example buffers.
///
/// All operations are idempotent: saving twice stores one copy, deleting a
/// missing value succeeds, fetching a missing key yields nothing.
pub trait ExampleDatabase: fmt::Debug + Send + Sync {
    fn save(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError>;

    fn fetch(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, DatabaseError>;

    fn delete(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError>;

    /// Move `value` from `src` to `dest`. The value ends up at `dest` even if
    /// it was never at `src`.
    fn move_value(&self, src: &[u8], dest: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        if src == dest {
            return self.save(src, value);
        }
        self.delete(src, value)?;
        self.save(dest, value)
    }

    fn add_listener(&self, listener: Listener) -> ListenerId;

    fn remove_listener(&self, id: ListenerId) -> bool;
}

/// Registered listeners of one database.
#[derive(Default)]
pub(crate) struct Listeners {
    next: AtomicU64,
    entries: RwLock<Vec<(ListenerId, Listener)>>,
}

impl Listeners {
    pub(crate) fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next.fetch_add(1, Ordering::Relaxed));
        self.entries.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub(crate) fn broadcast(&self, event: DatabaseEvent) {
        let entries: Vec<Listener> = self.entries.read().iter().map(|(_, l)| Arc::clone(l)).collect();
        for listener in entries {
            listener(&event);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.read().len()
    }
}

impl fmt::Debug for Listeners {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners").field("count", &self.len()).finish()
    }
}

/// First 16 hex characters of SHA-384 of `data`.
pub fn short_hash(data: &[u8]) -> String {
    Sha384::digest(data)
        .iter()
        .take(8)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// A stable database key for a named test.
pub fn key_for_name(name: &str) -> Vec<u8> {
    Sha384::digest(name.as_bytes())[..16].to_vec()
}

/// The key holding buffers that were superseded by simpler ones.
pub fn secondary_key(key: &[u8]) -> Vec<u8> {
    let mut out = key.to_vec();
    out.extend_from_slice(b".secondary");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_short_hash_is_stable_hex() {
        let hash = short_hash(b"key");
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, short_hash(b"key"));
        assert_ne!(hash, short_hash(b"other"));
    }

    #[test]
    fn test_secondary_key_appends_suffix() {
        assert_eq!(secondary_key(b"abc"), b"abc.secondary".to_vec());
    }

    #[test]
    fn test_listeners_add_broadcast_remove() {
        let listeners = Listeners::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let id = listeners.add(Arc::new(move |event: &DatabaseEvent| sink.lock().push(event.clone())));
        listeners.broadcast(DatabaseEvent::Save {
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        });
        assert!(listeners.remove(id));
        assert!(!listeners.remove(id));
        listeners.broadcast(DatabaseEvent::Delete {
            key: b"k".to_vec(),
            value: None,
        });
        assert_eq!(seen.lock().len(), 1);
    }
}
