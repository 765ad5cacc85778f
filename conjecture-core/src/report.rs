//! What a run reports back to its caller.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::choice::ChoiceValue;
use crate::config::Phase;
use crate::error::{ConjectureError, FailedToNormalize};
use crate::origin::InterestingOrigin;

/// Counters gathered over a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    /// Test executions, including shrinking.
    pub calls: usize,
    pub valid: usize,
    pub invalid: usize,
    pub overrun: usize,
    pub timed_out: usize,
    pub shrink_calls: usize,
    pub shrinks: usize,
    /// Set when every possible choice sequence has been tried.
    pub exhausted: bool,
    pub phase_times: BTreeMap<Phase, Duration>,
    pub events: BTreeMap<String, usize>,
}

impl RunStats {
    pub fn record_event(&mut self, label: &str) {
        *self.events.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn add_phase_time(&mut self, phase: Phase, elapsed: Duration) {
        *self.phase_times.entry(phase).or_default() += elapsed;
    }
}

/// One distinct bug and its minimal example.
#[derive(Debug, Clone, PartialEq)]
pub struct Failure {
    pub origin: InterestingOrigin,
    pub choices: Vec<ChoiceValue>,
    /// Panic message or failure payload.
    pub payload: Option<String>,
    /// Notes attached while replaying the minimal example.
    pub notes: Vec<String>,
    /// Reproduction blob of `choices`.
    pub blob: String,
    pub diagnostics: Vec<FailedToNormalize>,
}

/// Outcome of a property run.
#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Pass {
        name: Option<String>,
        tests_run: usize,
        stats: RunStats,
    },

    Fail {
        name: Option<String>,
        tests_run: usize,
        failures: Vec<Failure>,
        stats: RunStats,
    },

    /// Too few valid examples could be generated.
    Unsatisfiable {
        name: Option<String>,
        valid: usize,
        invalid: usize,
        overrun: usize,
    },

    /// A failure seen earlier did not reproduce.
    Flaky {
        name: Option<String>,
        origin: Option<InterestingOrigin>,
        message: String,
    },

    /// The run could not be carried out at all.
    Error { name: Option<String>, message: String },
}

impl Report {
    pub fn is_pass(&self) -> bool {
        matches!(self, Report::Pass { .. })
    }

    pub fn failures(&self) -> &[Failure] {
        match self {
            Report::Fail { failures, .. } => failures,
            _ => &[],
        }
    }

    pub fn stats(&self) -> Option<&RunStats> {
        match self {
            Report::Pass { stats, .. } | Report::Fail { stats, .. } => Some(stats),
            _ => None,
        }
    }

    pub fn with_name(mut self, new_name: Option<String>) -> Self {
        match &mut self {
            Report::Pass { name, .. }
            | Report::Fail { name, .. }
            | Report::Unsatisfiable { name, .. }
            | Report::Flaky { name, .. }
            | Report::Error { name, .. } => *name = new_name,
        }
        self
    }

    fn name(&self) -> &str {
        let name = match self {
            Report::Pass { name, .. }
            | Report::Fail { name, .. }
            | Report::Unsatisfiable { name, .. }
            | Report::Flaky { name, .. }
            | Report::Error { name, .. } => name,
        };
        name.as_deref().unwrap_or("property")
    }
}

/// `[a, b, c]` using each choice's display form.
pub fn format_choices(choices: &[ChoiceValue]) -> String {
    let parts: Vec<String> = choices.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

fn write_distribution(f: &mut fmt::Formatter<'_>, stats: &RunStats, tests_run: usize) -> fmt::Result {
    if stats.events.is_empty() || tests_run == 0 {
        return Ok(());
    }
    writeln!(f)?;
    writeln!(f)?;
    write!(f, "  Test data distribution:")?;
    for (label, count) in &stats.events {
        let percentage = (*count as f64 / tests_run as f64) * 100.0;
        write!(f, "\n    {:>3.0}% {}", percentage, label)?;
    }
    Ok(())
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        match self {
            Report::Pass { tests_run, stats, .. } => {
                write!(f, "  ✓ {} passed {} tests.", name, tests_run)?;
                if stats.exhausted {
                    write!(f, " Every possible example was tried.")?;
                }
                write_distribution(f, stats, *tests_run)
            }
            Report::Fail {
                tests_run,
                failures,
                stats,
                ..
            } => {
                write!(
                    f,
                    "  ✗ {} failed after {} tests and {} shrinks.",
                    name, tests_run, stats.shrinks
                )?;
                let many = failures.len() > 1;
                for (i, failure) in failures.iter().enumerate() {
                    writeln!(f)?;
                    if many {
                        writeln!(f)?;
                        writeln!(f, "    Bug {} of {}:", i + 1, failures.len())?;
                    }
                    if !failure.notes.is_empty() {
                        writeln!(f)?;
                        for note in &failure.notes {
                            writeln!(f, "      │ {}", note)?;
                        }
                        writeln!(f)?;
                    }
                    writeln!(f, "    === {} ===", failure.origin)?;
                    if let Some(payload) = failure.payload.as_deref().filter(|p| !p.is_empty()) {
                        writeln!(f, "    {}", payload)?;
                    }
                    for diagnostic in &failure.diagnostics {
                        writeln!(f, "    (could not normalize further: {})", diagnostic.reason)?;
                    }
                    writeln!(f, "    Minimal counterexample: {}", format_choices(&failure.choices))?;
                    write!(f, "    Reproduce with: {}", failure.blob)?;
                }
                Ok(())
            }
            Report::Unsatisfiable {
                valid,
                invalid,
                overrun,
                ..
            } => write!(
                f,
                "  ⚐ {} gave up after {} discards ({} valid, {} overrun)",
                name, invalid, valid, overrun
            ),
            Report::Flaky { origin, message, .. } => match origin {
                Some(origin) => write!(f, "  ⚐ {} is flaky: {} ({})", name, message, origin),
                None => write!(f, "  ⚐ {} is flaky: {}", name, message),
            },
            Report::Error { message, .. } => write!(f, "  ✗ {} could not run: {}", name, message),
        }
    }
}

impl From<ConjectureError> for Report {
    fn from(error: ConjectureError) -> Self {
        match error {
            ConjectureError::Unsatisfiable {
                valid,
                invalid,
                overrun,
            } => Report::Unsatisfiable {
                name: None,
                valid,
                invalid,
                overrun,
            },
            ConjectureError::FlakyReplay { ref origin } => Report::Flaky {
                name: None,
                origin: Some(origin.clone()),
                message: error.to_string(),
            },
            other => Report::Error {
                name: None,
                message: other.to_string(),
            },
        }
    }
}
