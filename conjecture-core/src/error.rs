//! Error types for the conjecture engine.

use std::fmt;
use thiserror::Error;

use crate::origin::InterestingOrigin;

/// Main error type for a test run.
#[derive(Error, Debug)]
pub enum ConjectureError {
    /// Generation could not produce valid trials.
    #[error("Unable to satisfy assumptions: {valid} valid, {invalid} invalid and {overrun} overrun trials")]
    Unsatisfiable {
        valid: usize,
        invalid: usize,
        overrun: usize,
    },

    /// A recorded interesting example no longer reproduces.
    #[error("Flaky replay: {origin} was interesting once but did not reproduce")]
    FlakyReplay { origin: InterestingOrigin },

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A reproduction blob could not be read.
    #[error(transparent)]
    Blob(#[from] BlobError),

    /// The example database failed.
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

/// Result type for conjecture operations.
pub type Result<T> = std::result::Result<T, ConjectureError>;

/// Errors raised while decoding a serialized choice sequence.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input at byte {offset}")]
    Truncated { offset: usize },

    #[error("unknown choice tag {tag} at byte {offset}")]
    UnknownTag { tag: u8, offset: usize },

    #[error("invalid boolean payload {value} at byte {offset}")]
    InvalidBoolean { value: u8, offset: usize },

    #[error("invalid float width {size} at byte {offset}")]
    InvalidFloat { size: usize, offset: usize },

    #[error("integer of {size} bytes does not fit at byte {offset}")]
    IntegerTooLarge { size: usize, offset: usize },

    #[error("string at byte {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("length prefix at byte {offset} overflows")]
    LengthOverflow { offset: usize },
}

/// Errors raised while decoding a reproduction blob.
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("blob is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("blob is too short ({len} bytes)")]
    TooShort { len: usize },

    #[error("unsupported blob version {found} (this build reads version {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },

    #[error("unknown blob flags {flags:#04x}")]
    UnknownFlags { flags: u8 },

    #[error("blob checksum mismatch")]
    Checksum,

    #[error("blob declares {declared} bytes but holds {actual}")]
    Length { declared: usize, actual: usize },

    #[error("blob payload failed to decompress: {0}")]
    Compression(#[source] std::io::Error),

    #[error("blob payload is not a choice sequence: {0}")]
    Codec(#[from] CodecError),
}

/// Errors raised by example database backends.
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("database I/O failed at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("database temp file could not be persisted: {0}")]
    Persist(#[from] tempfile::PersistError),
}

impl DatabaseError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        DatabaseError::Io {
            path: path.display().to_string(),
            source,
        }
    }
}

/// Why a trial was marked invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvalidReason {
    /// The test or a strategy rejected the data.
    Rejected,
    /// The trial ran past its deadline.
    DeadlineExceeded,
    /// A forced value fell outside its own constraints.
    BadForcedValue,
}

impl fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvalidReason::Rejected => write!(f, "rejected"),
            InvalidReason::DeadlineExceeded => write!(f, "deadline exceeded"),
            InvalidReason::BadForcedValue => write!(f, "forced value violates its constraints"),
        }
    }
}

/// Control flow raised from inside a draw.
///
/// Strategies propagate this with `?`; the runner turns it into the
/// status of the trial.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopTest {
    #[error("ran out of choices")]
    Overrun,

    #[error("data rejected")]
    Rejected,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("forced value violates its constraints")]
    BadForcedValue,

    #[error("session already concluded")]
    Frozen,
}

/// A primitive provider has nothing left to give.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("provider exhausted")]
pub struct ProviderExhausted;

/// The bridge pass gave up on learning a normal form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to normalize {origin}: {reason}")]
pub struct FailedToNormalize {
    pub origin: InterestingOrigin,
    pub reason: String,
    pub queries: usize,
}

/// What a test function reports for one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The property held.
    Continue,
    /// The data does not satisfy the test's assumptions.
    Reject,
    /// The property failed.
    Interesting {
        origin: InterestingOrigin,
        payload: String,
    },
}

impl DrawOutcome {
    /// A failure identified by `label`.
    pub fn fail(label: impl Into<String>) -> Self {
        DrawOutcome::Interesting {
            origin: InterestingOrigin::new(label),
            payload: String::new(),
        }
    }

    /// A failure identified by `label`, carrying a message for the report.
    pub fn fail_with(label: impl Into<String>, payload: impl Into<String>) -> Self {
        DrawOutcome::Interesting {
            origin: InterestingOrigin::new(label),
            payload: payload.into(),
        }
    }

    /// `Continue` when `holds`, otherwise a failure identified by `label`.
    pub fn check(holds: bool, label: impl Into<String>) -> Self {
        if holds {
            DrawOutcome::Continue
        } else {
            DrawOutcome::fail(label)
        }
    }

    pub fn is_interesting(&self) -> bool {
        matches!(self, DrawOutcome::Interesting { .. })
    }
}

impl From<bool> for DrawOutcome {
    fn from(holds: bool) -> Self {
        DrawOutcome::check(holds, "assertion")
    }
}
