//! Run configuration.

use std::collections::BTreeSet;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::database::{DirectoryDatabase, ExampleDatabase};
use crate::error::{ConjectureError, Result};
use crate::provider::ProviderFactory;

pub const SEED_VAR: &str = "CONJECTURE_SEED";
pub const REPLAY_VAR: &str = "CONJECTURE_REPLAY";
pub const MAX_EXAMPLES_VAR: &str = "CONJECTURE_MAX_EXAMPLES";
pub const DATABASE_VAR: &str = "CONJECTURE_DATABASE";

/// A stage of a run. Each can be switched off independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    /// Replay blobs supplied in the configuration.
    Explicit,
    /// Replay examples saved in the database.
    Reuse,
    /// Generate fresh examples.
    Generate,
    /// Shrink every interesting example found.
    Shrink,
}

impl Phase {
    pub const ALL: [Phase; 4] = [Phase::Explicit, Phase::Reuse, Phase::Generate, Phase::Shrink];

    pub fn name(&self) -> &'static str {
        match self {
            Phase::Explicit => "explicit",
            Phase::Reuse => "reuse",
            Phase::Generate => "generate",
            Phase::Shrink => "shrink",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration for a property run.
#[derive(Clone)]
pub struct Config {
    /// Valid examples to generate before stopping.
    pub test_limit: usize,

    /// Maximum number of accepted shrinks per bug.
    pub shrink_limit: usize,

    /// Maximum number of choices in one trial.
    pub size_limit: usize,

    /// Invalid trials tolerated before giving up.
    pub discard_limit: usize,

    /// Seed for the random provider. A fresh seed is drawn when unset.
    pub seed: Option<u64>,

    pub database: Option<Arc<dyn ExampleDatabase>>,

    /// Name of the test; the database key is derived from it.
    pub name: Option<String>,

    /// Per-trial time limit.
    pub deadline: Option<Duration>,

    /// Wall-clock budget for shrinking each bug.
    pub timeout: Option<Duration>,

    pub phases: BTreeSet<Phase>,

    /// Reproduction blobs to replay before anything else.
    pub replay: Vec<String>,

    pub provider: ProviderFactory,

    /// Keep searching for, and report, every distinct bug.
    pub report_multiple_bugs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            test_limit: 100,
            shrink_limit: 500,
            size_limit: 8192,
            discard_limit: 1000,
            seed: None,
            database: None,
            name: None,
            deadline: Some(Duration::from_millis(200)),
            timeout: Some(Duration::from_secs(300)),
            phases: Phase::ALL.into_iter().collect(),
            replay: Vec::new(),
            provider: ProviderFactory::default(),
            report_multiple_bugs: true,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("test_limit", &self.test_limit)
            .field("shrink_limit", &self.shrink_limit)
            .field("size_limit", &self.size_limit)
            .field("discard_limit", &self.discard_limit)
            .field("seed", &self.seed)
            .field("database", &self.database.is_some())
            .field("name", &self.name)
            .field("deadline", &self.deadline)
            .field("timeout", &self.timeout)
            .field("phases", &self.phases)
            .field("replay", &self.replay.len())
            .field("provider", &self.provider.name())
            .field("report_multiple_bugs", &self.report_multiple_bugs)
            .finish()
    }
}

impl Config {
    /// Create a new config with the given number of tests.
    pub fn with_tests(mut self, tests: usize) -> Self {
        self.test_limit = tests;
        self
    }

    /// Create a new config with the given shrink limit.
    pub fn with_shrinks(mut self, shrinks: usize) -> Self {
        self.shrink_limit = shrinks;
        self
    }

    /// Create a new config with the given size limit.
    pub fn with_size_limit(mut self, size: usize) -> Self {
        self.size_limit = size;
        self
    }

    pub fn with_discard_limit(mut self, discards: usize) -> Self {
        self.discard_limit = discards;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_database(mut self, database: Arc<dyn ExampleDatabase>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_phases(mut self, phases: impl IntoIterator<Item = Phase>) -> Self {
        self.phases = phases.into_iter().collect();
        self
    }

    pub fn with_replay(mut self, blob: impl Into<String>) -> Self {
        self.replay.push(blob.into());
        self
    }

    pub fn with_provider(mut self, provider: ProviderFactory) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_report_multiple_bugs(mut self, report: bool) -> Self {
        self.report_multiple_bugs = report;
        self
    }

    pub fn runs(&self, phase: Phase) -> bool {
        self.phases.contains(&phase)
    }

    /// The database key for this test, if it has a name.
    pub fn database_key(&self) -> Option<Vec<u8>> {
        self.name.as_deref().map(crate::database::key_for_name)
    }

    /// The default config overlaid with the `CONJECTURE_*` environment.
    pub fn from_env() -> Result<Config> {
        Config::default().with_env()
    }

    /// Overlay the `CONJECTURE_*` environment variables that are set.
    pub fn with_env(self) -> Result<Config> {
        self.with_vars(|name| env::var(name).ok())
    }

    fn with_vars(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Config> {
        if let Some(seed) = var(SEED_VAR) {
            self.seed = Some(parse_var(SEED_VAR, &seed)?);
        }
        if let Some(blobs) = var(REPLAY_VAR) {
            self.replay.extend(
                blobs
                    .split(',')
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(String::from),
            );
        }
        if let Some(max) = var(MAX_EXAMPLES_VAR) {
            self.test_limit = parse_var(MAX_EXAMPLES_VAR, &max)?;
        }
        if let Some(path) = var(DATABASE_VAR).filter(|p| !p.is_empty()) {
            self.database = Some(Arc::new(DirectoryDatabase::new(path)));
        }
        Ok(self)
    }
}

fn parse_var<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| ConjectureError::InvalidConfig {
        message: format!("{name} must be a non-negative integer, got {value:?}"),
    })
}
