use std::collections::{BTreeSet, HashMap};

use parking_lot::Mutex;

use super::{DatabaseEvent, ExampleDatabase, Listener, ListenerId, Listeners};
use crate::error::DatabaseError;

/// A database that lives for the lifetime of the process.
#[derive(Debug, Default)]
pub struct InMemoryDatabase {
    data: Mutex<HashMap<Vec<u8>, BTreeSet<Vec<u8>>>>,
    listeners: Listeners,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExampleDatabase for InMemoryDatabase {
    fn save(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        let inserted = self.data.lock().entry(key.to_vec()).or_default().insert(value.to_vec());
        if inserted {
            self.listeners.broadcast(DatabaseEvent::Save {
                key: key.to_vec(),
                value: value.to_vec(),
            });
        }
        Ok(())
    }

    fn fetch(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, DatabaseError> {
        Ok(self
            .data
            .lock()
            .get(key)
            .map(|values| values.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn delete(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        let removed = {
            let mut data = self.data.lock();
            let removed = data.get_mut(key).map_or(false, |values| values.remove(value));
            if data.get(key).map_or(false, BTreeSet::is_empty) {
                data.remove(key);
            }
            removed
        };
        if removed {
            self.listeners.broadcast(DatabaseEvent::Delete {
                key: key.to_vec(),
                value: Some(value.to_vec()),
            });
        }
        Ok(())
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_save_is_idempotent() {
        let db = InMemoryDatabase::new();
        db.save(b"k", b"v").unwrap();
        db.save(b"k", b"v").unwrap();
        assert_eq!(db.fetch(b"k").unwrap(), vec![b"v".to_vec()]);
    }

    #[test]
    fn test_missing_keys_and_values_are_fine() {
        let db = InMemoryDatabase::new();
        assert!(db.fetch(b"nothing").unwrap().is_empty());
        db.delete(b"nothing", b"v").unwrap();
    }

    #[test]
    fn test_move_places_value_even_if_absent() {
        let db = InMemoryDatabase::new();
        db.move_value(b"a", b"b", b"v").unwrap();
        assert_eq!(db.fetch(b"b").unwrap(), vec![b"v".to_vec()]);
        db.move_value(b"b", b"b", b"v").unwrap();
        assert_eq!(db.fetch(b"b").unwrap(), vec![b"v".to_vec()]);
        db.move_value(b"b", b"c", b"v").unwrap();
        assert!(db.fetch(b"b").unwrap().is_empty());
    }

    #[test]
    fn test_listeners_see_only_real_changes() {
        let db = InMemoryDatabase::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        db.add_listener(Arc::new(move |e: &DatabaseEvent| sink.lock().push(e.clone())));
        db.save(b"k", b"v").unwrap();
        db.save(b"k", b"v").unwrap();
        db.delete(b"k", b"v").unwrap();
        db.delete(b"k", b"v").unwrap();
        assert_eq!(
            *events.lock(),
            vec![
                DatabaseEvent::Save {
                    key: b"k".to_vec(),
                    value: b"v".to_vec()
                },
                DatabaseEvent::Delete {
                    key: b"k".to_vec(),
                    value: Some(b"v".to_vec())
                },
            ]
        );
    }
}
