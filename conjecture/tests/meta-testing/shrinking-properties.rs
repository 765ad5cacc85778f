//! Shrinking correctness properties
//!
//! These properties ensure that shrinking behaves correctly - that it only
//! ever accepts simpler failures and converges to the minimal one.

use crate::meta_config;
use conjecture::origin::catch_panic;
use conjecture::*;

fn replay<T>(test: &mut T, choices: &[ChoiceValue]) -> SessionResult
where
    T: FnMut(&mut DrawSession<'_>) -> Result<DrawOutcome, StopTest>,
{
    let mut provider = ReplayProvider::new(choices);
    let mut session = DrawSession::new(&mut provider, 8192);
    let outcome = catch_panic(|| test(&mut session));
    session.conclude(outcome)
}

fn at_least(threshold: i128) -> impl FnMut(&mut DrawSession<'_>) -> Result<DrawOutcome, StopTest> {
    move |s: &mut DrawSession<'_>| {
        let n = s.draw_integer(IntegerConstraints::bounded(0, 10_000), None)?;
        Ok(DrawOutcome::check(n < threshold, "over threshold"))
    }
}

/// Property: the engine finds exactly the threshold of a monotone predicate
pub fn test_threshold_is_found_exactly() {
    let prop = for_all_named(Gen::int_range(0, 5000), "threshold", |&threshold| {
        let inner = Config::default()
            .with_seed(threshold as u64)
            .with_deadline(None);
        let report = run_test(at_least(threshold), inner);
        report.failures().iter().map(|f| f.choices.clone()).collect::<Vec<_>>()
            == vec![vec![ChoiceValue::Integer(threshold)]]
    });

    match prop.run(&meta_config()) {
        Report::Pass { .. } => println!("✓ Threshold shrinking property passed"),
        result => panic!("Threshold shrinking property failed: {result}"),
    }
}

/// Property: shrinking an already minimal example changes nothing
pub fn test_minimal_examples_stay_put() {
    let prop = for_all_named(Gen::int_range(0, 10_000), "threshold", |&threshold| {
        let mut test = at_least(threshold);
        let target = replay(&mut test, &[ChoiceValue::Integer(threshold)]);
        let mut shrinker = Shrinker::new(|c: &[ChoiceValue]| replay(&mut test, c), target, ShrinkConfig::default());
        shrinker.shrink();
        shrinker.shrinks() == 0 && shrinker.target().choices() == vec![ChoiceValue::Integer(threshold)]
    });

    match prop.run(&meta_config()) {
        Report::Pass { .. } => println!("✓ Shrinking idempotence property passed"),
        result => panic!("Shrinking idempotence property failed: {result}"),
    }
}

/// Property: every accepted shrink is strictly simpler than the one before
pub fn test_history_strictly_decreases() {
    let lists = Gen::vec_of(Gen::int_range(0, 1000), 0, 10).filter(|v| v.iter().sum::<i128>() >= 1000);
    let prop = for_all_named(lists, "start", |start: &Vec<i128>| {
        let elements = Gen::vec_of(Gen::int_range(0, 1000), 0, 10);
        let mut test = |s: &mut DrawSession<'_>| -> Result<DrawOutcome, StopTest> {
            let v = elements.draw(s)?;
            Ok(DrawOutcome::check(v.iter().sum::<i128>() < 1000, "sum"))
        };
        let choices: Vec<ChoiceValue> = start
            .iter()
            .flat_map(|&n| [ChoiceValue::Boolean(true), ChoiceValue::Integer(n)])
            .chain([ChoiceValue::Boolean(false)])
            .collect();
        let target = replay(&mut test, &choices);
        let mut shrinker = Shrinker::new(|c: &[ChoiceValue]| replay(&mut test, c), target, ShrinkConfig::default());
        shrinker.shrink();

        let decreasing = shrinker
            .history()
            .windows(2)
            .all(|pair| choice::sort_key(&pair[1]) < choice::sort_key(&pair[0]));
        decreasing && shrinker.target().status == Status::Interesting
    });

    match prop.run(&meta_config()) {
        Report::Pass { .. } => println!("✓ Monotone shrinking property passed"),
        result => panic!("Monotone shrinking property failed: {result}"),
    }
}
