use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use super::{DatabaseEvent, ExampleDatabase, Listener, ListenerId, Listeners};
use crate::error::DatabaseError;

/// Fans writes out to several databases and reads from all of them.
///
/// A typical setup pairs a local directory with a read-only shared one.
/// Listeners see the changes the backends report, once each, so a no-op
/// write stays silent like it does on a single backend.
#[derive(Debug)]
pub struct MultiplexedDatabase {
    backends: Vec<Arc<dyn ExampleDatabase>>,
    listeners: Listeners,
}

impl MultiplexedDatabase {
    pub fn new(backends: Vec<Arc<dyn ExampleDatabase>>) -> Self {
        MultiplexedDatabase {
            backends,
            listeners: Listeners::default(),
        }
    }

    fn each(
        &self,
        keys: &[&[u8]],
        mut op: impl FnMut(&dyn ExampleDatabase) -> Result<(), DatabaseError>,
    ) -> Result<(), DatabaseError> {
        let seen: Arc<Mutex<Vec<DatabaseEvent>>> = Arc::default();
        let mut first_error = None;
        // Every backend gets the write even if an earlier one failed.
        for backend in &self.backends {
            let sink = Arc::clone(&seen);
            let id = backend.add_listener(Arc::new(move |event: &DatabaseEvent| {
                let mut seen = sink.lock();
                if !seen.contains(event) {
                    seen.push(event.clone());
                }
            }));
            let result = op(backend.as_ref());
            backend.remove_listener(id);
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }

        let events = std::mem::take(&mut *seen.lock());
        for event in events {
            let key = match &event {
                DatabaseEvent::Save { key, .. } | DatabaseEvent::Delete { key, .. } => key,
            };
            // Unrelated writes that raced with this one belong to their own caller.
            if keys.contains(&key.as_slice()) {
                self.listeners.broadcast(event);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl ExampleDatabase for MultiplexedDatabase {
    fn save(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        self.each(&[key], |db| db.save(key, value))
    }

    fn fetch(&self, key: &[u8]) -> Result<Vec<Vec<u8>>, DatabaseError> {
        let mut seen = BTreeSet::new();
        for backend in &self.backends {
            seen.extend(backend.fetch(key)?);
        }
        Ok(seen.into_iter().collect())
    }

    fn delete(&self, key: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        self.each(&[key], |db| db.delete(key, value))
    }

    fn move_value(&self, src: &[u8], dest: &[u8], value: &[u8]) -> Result<(), DatabaseError> {
        self.each(&[src, dest], |db| db.move_value(src, dest, value))
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
    use crate::database::InMemoryDatabase;

    fn pair() -> (Arc<InMemoryDatabase>, Arc<InMemoryDatabase>, MultiplexedDatabase) {
        let a = Arc::new(InMemoryDatabase::new());
        let b = Arc::new(InMemoryDatabase::new());
        let multi = MultiplexedDatabase::new(vec![
            a.clone() as Arc<dyn ExampleDatabase>,
            b.clone() as Arc<dyn ExampleDatabase>,
        ]);
        (a, b, multi)
    }

    #[test]
    fn test_writes_reach_every_backend() {
        let (a, b, multi) = pair();
        multi.save(b"k", b"v").unwrap();
        assert_eq!(a.fetch(b"k").unwrap(), vec![b"v".to_vec()]);
        assert_eq!(b.fetch(b"k").unwrap(), vec![b"v".to_vec()]);
        multi.delete(b"k", b"v").unwrap();
        assert!(a.fetch(b"k").unwrap().is_empty());
    }

    #[test]
    fn test_reads_are_the_deduplicated_union() {
        let (a, b, multi) = pair();
        a.save(b"k", b"x").unwrap();
        b.save(b"k", b"x").unwrap();
        b.save(b"k", b"y").unwrap();
        assert_eq!(multi.fetch(b"k").unwrap(), vec![b"x".to_vec(), b"y".to_vec()]);
    }

    #[test]
    fn test_move_applies_to_all() {
        let (a, b, multi) = pair();
        a.save(b"src", b"v").unwrap();
        multi.move_value(b"src", b"dest", b"v").unwrap();
        assert!(a.fetch(b"src").unwrap().is_empty());
        assert_eq!(b.fetch(b"dest").unwrap(), vec![b"v".to_vec()]);
    }

    #[test]
    fn test_listeners_see_each_change_once() {
        let (a, _b, multi) = pair();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        multi.add_listener(Arc::new(move |e: &DatabaseEvent| sink.lock().push(e.clone())));

        multi.save(b"k", b"v").unwrap();
        multi.save(b"k", b"v").unwrap();
        multi.delete(b"k", b"missing").unwrap();
        a.save(b"k", b"w").unwrap();
        multi.save(b"k", b"w").unwrap();
        multi.move_value(b"k", b"j", b"v").unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                DatabaseEvent::Save {
                    key: b"k".to_vec(),
                    value: b"v".to_vec()
                },
                DatabaseEvent::Save {
                    key: b"k".to_vec(),
                    value: b"w".to_vec()
                },
                DatabaseEvent::Delete {
                    key: b"k".to_vec(),
                    value: Some(b"v".to_vec())
                },
                DatabaseEvent::Save {
                    key: b"j".to_vec(),
                    value: b"v".to_vec()
                },
            ]
        );
    }
}
