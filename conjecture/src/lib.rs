//! Conjecture property-based testing library.
//!
//! This is the main entry point for Conjecture: generators, the engine
//! that runs and shrinks properties, and the example databases that let a
//! failure found once be replayed on every later run.
//!
//! ```
//! use conjecture::*;
//!
//! let gen = Gen::vec_of(Gen::int_range(0, 100), 0, 10);
//! let report = run(
//!     &gen,
//!     |v: &Vec<i128>| {
//!         let mut twice = v.clone();
//!         twice.reverse();
//!         twice.reverse();
//!         &twice == v
//!     },
//!     Config::default().with_seed(1),
//! );
//! assert!(report.is_pass(), "{report}");
//! ```
//!
//! Tests that build their configuration with [`Config::from_env`] pick up
//! the seed, replay blobs and database directory that
//! `cargo conjecture test` passes down.

pub use conjecture_core::*;
