// Test that the Quick Start example compiles and works
use conjecture::*;

fn safe_divide(a: i128, b: i128) -> Option<i128> {
    if b == 0 {
        None
    } else {
        Some(a / b)
    }
}

#[test]
fn prop_division_safety() {
    let prop = for_all_named(
        Gen::tuple_of(Gen::int_range(-50, 50), Gen::int_range(-5, 5)),
        "input",
        |&(a, b)| match safe_divide(a, b) {
            Some(result) => b != 0 && result == a / b,
            None => b == 0,
        },
    );

    let report = prop.run(&Config::default().with_seed(7));
    assert!(report.is_pass(), "{report}");
}

#[test]
fn prop_unchecked_division_is_caught() {
    let prop = for_all_named(
        Gen::tuple_of(Gen::int_range(-50, 50), Gen::int_range(-5, 5)),
        "input",
        |&(a, b)| a.checked_div(b).is_some(),
    );

    let report = prop.run(&Config::default().with_seed(7));
    let failures = report.failures();
    assert_eq!(failures.len(), 1, "{report}");
    assert_eq!(failures[0].notes, vec!["input = (0, 0)".to_string()]);
}
