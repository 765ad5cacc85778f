//! Properties of the simplicity order used by the shrinker.

use std::cmp::Ordering;

use crate::meta_config;
use conjecture::*;

fn integer_node(value: i128) -> ChoiceNode {
    ChoiceNode {
        value: ChoiceValue::Integer(value),
        constraints: Constraints::Integer(IntegerConstraints::unbounded()),
        was_forced: false,
    }
}

fn nodes(values: &[i128]) -> Vec<ChoiceNode> {
    values.iter().copied().map(integer_node).collect()
}

/// Property: integers closer to zero are simpler
pub fn test_integers_order_by_distance() {
    let pairs = Gen::tuple_of(Gen::int_range(-1000, 1000), Gen::int_range(-1000, 1000));
    let prop = for_all_named(pairs, "(a, b)", |&(a, b)| {
        let (ka, kb) = (integer_node(a).key(), integer_node(b).key());
        let distance = a.unsigned_abs().cmp(&b.unsigned_abs());
        (ka == kb) == (a == b) && (distance == Ordering::Equal || ka.cmp(&kb) == distance)
    });

    match prop.run(&meta_config().with_tests(200)) {
        Report::Pass { .. } => println!("✓ Integer order property passed"),
        result => panic!("Integer order property failed: {result}"),
    }
}

/// Property: sort keys form a total order, agree with the fast comparison,
/// and put shorter sequences first
pub fn test_sort_key_is_a_total_order() {
    let list = || Gen::vec_of(Gen::int_range(-3, 3), 0, 4);
    let triples = Gen::tuple_of(list(), Gen::tuple_of(list(), list()));
    let prop = for_all_named(triples, "(a, (b, c))", |(a, (b, c))| {
        let (na, nb, nc) = (nodes(a), nodes(b), nodes(c));
        let (ka, kb, kc) = (choice::sort_key(&na), choice::sort_key(&nb), choice::sort_key(&nc));
        let antisymmetric = ka.cmp(&kb) == kb.cmp(&ka).reverse();
        let transitive = !(ka <= kb && kb <= kc) || ka <= kc;
        let consistent = choice::compare_nodes(&na, &nb) == ka.cmp(&kb);
        let shortlex = a.len() >= b.len() || ka < kb;
        antisymmetric && transitive && consistent && shortlex
    });

    match prop.run(&meta_config().with_tests(200)) {
        Report::Pass { .. } => println!("✓ Sort key order property passed"),
        result => panic!("Sort key order property failed: {result}"),
    }
}
