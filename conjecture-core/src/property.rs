//! Property definitions for property-based testing.

use std::fmt::Debug;

use crate::config::Config;
use crate::error::DrawOutcome;
use crate::gen::Gen;
use crate::report::Report;
use crate::runner::run_test;
use crate::session::DrawSession;

type ClassificationFn<T> = Box<dyn Fn(&T) -> bool>;

/// A property that can be tested with generated inputs.
pub struct Property<T> {
    generator: Gen<T>,
    test_function: Box<dyn Fn(&T) -> DrawOutcome>,
    variable_name: Option<String>,
    classifications: Vec<(String, ClassificationFn<T>)>,
}

impl<T> Property<T>
where
    T: Debug + 'static,
{
    /// Create a new property from a generator and test function.
    pub fn new<F>(generator: Gen<T>, test_function: F) -> Self
    where
        F: Fn(&T) -> DrawOutcome + 'static,
    {
        Property {
            generator,
            test_function: Box::new(test_function),
            variable_name: None,
            classifications: Vec::new(),
        }
    }

    /// Create a property that checks a boolean condition.
    pub fn for_all<F>(generator: Gen<T>, condition: F) -> Self
    where
        F: Fn(&T) -> bool + 'static,
    {
        Property::new(generator, move |input| DrawOutcome::check(condition(input), "property"))
    }

    /// Create a property that checks a boolean condition with a named variable.
    pub fn for_all_named<F>(generator: Gen<T>, variable_name: &str, condition: F) -> Self
    where
        F: Fn(&T) -> bool + 'static,
    {
        let mut property = Property::for_all(generator, condition);
        property.variable_name = Some(variable_name.to_string());
        property
    }

    /// Add a classification to categorize test inputs. Matching inputs are
    /// counted as events and shown in the test data distribution.
    pub fn classify<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + 'static,
    {
        self.classifications.push((name.to_string(), Box::new(predicate)));
        self
    }

    fn trial(&self, session: &mut DrawSession<'_>) -> Result<DrawOutcome, crate::error::StopTest> {
        let value = self.generator.draw(session)?;
        match &self.variable_name {
            Some(name) => session.note(format!("{} = {:?}", name, value)),
            None => session.note(format!("{:?}", value)),
        }
        for (name, predicate) in &self.classifications {
            if predicate(&value) {
                session.event(name.as_str());
            }
        }
        Ok((self.test_function)(&value))
    }

    /// Run this property with the given configuration.
    pub fn run(&self, config: &Config) -> Report {
        run_test(|s: &mut DrawSession<'_>| self.trial(s), config.clone())
    }
}

/// Create a property for a generator and test function.
pub fn property<T, F>(generator: Gen<T>, test_function: F) -> Property<T>
where
    T: Debug + 'static,
    F: Fn(&T) -> DrawOutcome + 'static,
{
    Property::new(generator, test_function)
}

/// Create a property that checks a boolean condition.
pub fn for_all<T, F>(generator: Gen<T>, condition: F) -> Property<T>
where
    T: Debug + 'static,
    F: Fn(&T) -> bool + 'static,
{
    Property::for_all(generator, condition)
}

/// Create a property that checks a boolean condition with a named variable.
pub fn for_all_named<T, F>(generator: Gen<T>, variable_name: &str, condition: F) -> Property<T>
where
    T: Debug + 'static,
    F: Fn(&T) -> bool + 'static,
{
    Property::for_all_named(generator, variable_name, condition)
}

/// Run `predicate` against values from `gen`.
///
/// The predicate may return a `bool` or a [`DrawOutcome`]. Each generated
/// value is attached to the trial as a note, so a failure report shows the
/// minimal counterexample in its debug form.
pub fn run<T, F, R>(gen: &Gen<T>, mut predicate: F, config: Config) -> Report
where
    T: Debug,
    F: FnMut(&T) -> R,
    R: Into<DrawOutcome>,
{
    run_test(
        |s: &mut DrawSession<'_>| {
            let value = gen.draw(s)?;
            s.note(format!("{:?}", value));
            Ok(predicate(&value).into())
        },
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::default().with_seed(11)
    }

    #[test]
    fn test_run_reports_minimal_list() {
        let gen = Gen::vec_of(Gen::int_range(0, 1000), 0, 20);
        let report = run(&gen, |v: &Vec<i128>| v.iter().sum::<i128>() < 1000, config());
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].notes, vec!["[1000]".to_string()]);
    }

    #[test]
    fn test_run_passes_true_property() {
        let gen = Gen::tuple_of(Gen::int_range(-50, 50), Gen::int_range(-50, 50));
        let report = run(&gen, |(a, b): &(i128, i128)| a + b == b + a, config());
        assert!(report.is_pass(), "{report}");
    }

    #[test]
    fn test_run_finds_small_string() {
        let report = run(&Gen::ascii(10), |s: &String| !s.contains('z'), config().with_tests(1000));
        assert_eq!(report.failures()[0].notes, vec!["\"z\"".to_string()]);
    }

    #[test]
    fn test_for_all_named_notes_variable() {
        let report = for_all_named(Gen::int_range(0, 100), "n", |n| *n < 30).run(&config());
        let failures = report.failures();
        assert_eq!(failures[0].notes, vec!["n = 30".to_string()]);
        assert_eq!(failures[0].origin.to_string(), "property");
    }

    #[test]
    fn test_classify_counts_events() {
        let report = for_all(Gen::int_range(0, 100), |n| *n <= 100)
            .classify("small", |n| *n < 10)
            .classify("never", |n| *n > 100)
            .run(&config());
        let stats = report.stats().unwrap();
        assert!(stats.events.get("small").copied().unwrap_or(0) > 0);
        assert!(!stats.events.contains_key("never"));
    }

    #[test]
    fn test_property_with_custom_outcome() {
        let report = property(Gen::bool(), |b| {
            if *b {
                DrawOutcome::fail_with("true", "saw true")
            } else {
                DrawOutcome::Continue
            }
        })
        .run(&config());
        assert_eq!(report.failures()[0].payload.as_deref(), Some("saw true"));
    }
}
