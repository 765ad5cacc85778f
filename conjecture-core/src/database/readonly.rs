use std::sync::Arc;

use super::{ExampleDatabase, Listener, ListenerId};
use crate::error::DatabaseError;

/// Reads from a wrapped database and silently drops every write.
#[derive(Debug)]
pub struct ReadOnlyDatabase {
    inner: Arc<dyn ExampleDatabase>,
}

impl ReadOnlyDatabase {
    pub fn new(inner: Arc<dyn ExampleDatabase>) -> Self {
        ReadOnlyDatabase { inner }
    }
}

impl ExampleDatabase for ReadOnlyDatabase {
    fn save(&self, _key: &[u8], _value: &[u8]) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn fetch(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, DatabaseError> {
        self.inner.fetch(key)
    }

    fn delete(&self, _key: &[u8], _value: &[u8]) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn move_value(&self, _src: &[u8], _dest: &[u8], _value: &[u8]) -> Result<(), DatabaseError> {
        Ok(())
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        self.inner.add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.remove_listener(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::InMemoryDatabase;

    #[test]
    fn test_writes_are_ignored() {
        let inner = Arc::new(InMemoryDatabase::new());
        inner.save(b"k", b"kept").unwrap();
        let db = ReadOnlyDatabase::new(inner.clone());
        db.save(b"k", b"new").unwrap();
        db.delete(b"k", b"kept").unwrap();
        db.move_value(b"k", b"other", b"kept").unwrap();
        assert_eq!(db.fetch(b"k").unwrap(), vec![b"kept".to_vec()]);
        assert!(inner.fetch(b"other").unwrap().is_empty());
    }
}
