//! Every backend behaves like a map of sets under any sequence of operations.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use tempfile::tempdir;

use crate::meta_config;
use conjecture::*;

#[derive(Debug, Clone, Copy)]
enum Op {
    Save(u8, u8),
    Delete(u8, u8),
    Move(u8, u8, u8),
}

fn op() -> Gen<Op> {
    let small = |hi: i128| Gen::int_range(0, hi).map(|n| n as u8);
    Gen::one_of(vec![
        Gen::tuple_of(small(2), small(3)).map(|(k, v)| Op::Save(k, v)),
        Gen::tuple_of(small(2), small(3)).map(|(k, v)| Op::Delete(k, v)),
        Gen::tuple_of(small(2), Gen::tuple_of(small(2), small(3))).map(|(s, (d, v))| Op::Move(s, d, v)),
    ])
}

fn apply(db: &dyn ExampleDatabase, op: Op) -> bool {
    match op {
        Op::Save(k, v) => db.save(&[k], &[v]).is_ok(),
        Op::Delete(k, v) => db.delete(&[k], &[v]).is_ok(),
        Op::Move(s, d, v) => db.move_value(&[s], &[d], &[v]).is_ok(),
    }
}

fn apply_model(model: &mut BTreeMap<u8, BTreeSet<u8>>, op: Op) {
    match op {
        Op::Save(k, v) => {
            model.entry(k).or_default().insert(v);
        }
        Op::Delete(k, v) => {
            model.entry(k).or_default().remove(&v);
        }
        Op::Move(s, d, v) => {
            if s != d {
                model.entry(s).or_default().remove(&v);
            }
            model.entry(d).or_default().insert(v);
        }
    }
}

fn agrees(db: &dyn ExampleDatabase, model: &BTreeMap<u8, BTreeSet<u8>>) -> bool {
    (0..3u8).all(|k| {
        let stored: BTreeSet<u8> = match db.fetch(&[k]) {
            Ok(values) => values.into_iter().filter_map(|v| v.first().copied()).collect(),
            Err(_) => return false,
        };
        stored == model.get(&k).cloned().unwrap_or_default()
    })
}

/// Property: in-memory, directory and multiplexed backends all match a model
pub fn test_backends_agree_with_model() {
    let prop = for_all_named(Gen::vec_of(op(), 0, 12), "ops", |ops: &Vec<Op>| {
        let Ok(dir) = tempdir() else { return false };
        let backends: Vec<Arc<dyn ExampleDatabase>> = vec![
            Arc::new(InMemoryDatabase::new()),
            Arc::new(DirectoryDatabase::new(dir.path().join("plain"))),
            Arc::new(MultiplexedDatabase::new(vec![
                Arc::new(InMemoryDatabase::new()),
                Arc::new(DirectoryDatabase::new(dir.path().join("fanned"))),
            ])),
        ];
        let mut model = BTreeMap::new();
        for &op in ops {
            apply_model(&mut model, op);
            if !backends.iter().all(|db| apply(db.as_ref(), op)) {
                return false;
            }
        }
        backends.iter().all(|db| agrees(db.as_ref(), &model))
    });

    match prop.run(&meta_config().with_tests(40)) {
        Report::Pass { .. } => println!("✓ Database model property passed"),
        result => panic!("Database model property failed: {result}"),
    }
}
