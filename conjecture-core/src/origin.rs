//! Interesting origins and panic capture.
//!
//! Two failures are the same bug when they share an origin. A panic inside a
//! trial is turned into an origin keyed on the panic's source location, so a
//! test that panics at two different places reports two bugs.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

/// Identifies a distinct bug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterestingOrigin {
    pub kind: String,
    pub location: Option<String>,
}

impl InterestingOrigin {
    pub fn new(kind: impl Into<String>) -> Self {
        InterestingOrigin {
            kind: kind.into(),
            location: None,
        }
    }

    pub fn at(kind: impl Into<String>, location: impl Into<String>) -> Self {
        InterestingOrigin {
            kind: kind.into(),
            location: Some(location.into()),
        }
    }

    pub fn is_panic(&self) -> bool {
        self.kind == PANIC_KIND
    }
}

impl fmt::Display for InterestingOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(location) => write!(f, "{} at {}", self.kind, location),
            None => write!(f, "{}", self.kind),
        }
    }
}

const PANIC_KIND: &str = "panic";

/// A panic caught while running a trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicRecord {
    pub location: String,
    pub message: String,
}

impl PanicRecord {
    pub fn origin(&self) -> InterestingOrigin {
        InterestingOrigin::at(PANIC_KIND, self.location.clone())
    }
}

thread_local! {
    static CAPTURING: Cell<bool> = const { Cell::new(false) };
    static LAST_PANIC: RefCell<Option<PanicRecord>> = const { RefCell::new(None) };
}

static HOOK: Once = Once::new();

fn install_hook() {
    HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if CAPTURING.with(|capturing| capturing.get()) {
                let location = info
                    .location()
                    .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()))
                    .unwrap_or_else(|| "<unknown>".to_string());
                let record = PanicRecord {
                    location,
                    message: payload_message(info.payload()),
                };
                LAST_PANIC.with(|last| *last.borrow_mut() = Some(record));
            } else {
                previous(info);
            }
        }));
    });
}

fn payload_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

/// Run `f`, turning a panic into a [`PanicRecord`].
///
/// Panic output is silenced on this thread while `f` runs; other threads
/// keep the previously installed hook.
pub fn catch_panic<R>(f: impl FnOnce() -> R) -> Result<R, PanicRecord> {
    install_hook();
    let was_capturing = CAPTURING.with(|capturing| capturing.replace(true));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    CAPTURING.with(|capturing| capturing.set(was_capturing));

    result.map_err(|payload| {
        LAST_PANIC
            .with(|last| last.borrow_mut().take())
            .unwrap_or_else(|| PanicRecord {
                location: "<unknown>".to_string(),
                message: payload_message(payload.as_ref()),
            })
    })
}
