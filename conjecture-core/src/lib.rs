//! Core engine for Conjecture property-based testing.
//!
//! Test data is drawn from a sequence of typed choices. The engine
//! generates those sequences, remembers the ones that fail in an example
//! database, and shrinks each distinct failure towards the simplest
//! sequence that still reproduces it.

pub mod blob;
pub mod choice;
pub mod codec;
pub mod config;
pub mod database;
pub mod datatree;
pub mod error;
pub mod floats;
pub mod gen;
pub mod origin;
pub mod property;
pub mod provider;
pub mod report;
pub mod runner;
pub mod session;
pub mod shrinker;
pub mod span;

// Re-export the main types
pub use blob::{decode_failure, encode_failure};
pub use choice::{
    BooleanConstraints, BytesConstraints, CharIntervals, ChoiceKind, ChoiceNode, ChoiceValue, Constraints,
    FloatConstraints, IntegerConstraints, SortKey, StringConstraints,
};
pub use codec::{choices_from_bytes, choices_to_bytes};
pub use config::{Config, Phase};
pub use database::{
    DatabaseEvent, DirectoryDatabase, ExampleDatabase, InMemoryDatabase, MultiplexedDatabase, ReadOnlyDatabase,
};
pub use error::{
    BlobError, CodecError, ConjectureError, DatabaseError, DrawOutcome, FailedToNormalize, InvalidReason,
    ProviderExhausted, StopTest,
};
pub use gen::Gen;
pub use origin::InterestingOrigin;
pub use property::{for_all, for_all_named, property, run, Property};
pub use provider::{PrimitiveProvider, ProviderFactory, ProviderLifetime, RandomProvider, ReplayProvider};
pub use report::{Failure, Report, RunStats};
pub use runner::{run_test, Runner};
pub use session::{DrawSession, SessionResult, Status};
pub use shrinker::{Pass, ShrinkConfig, Shrinker};
