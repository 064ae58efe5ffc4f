//! First-failure container shared by all workers of one loop run.
//!
//! A failure is either the body's own `Err(E)` or a panic payload. Only the
//! first one recorded is kept; later failures from other workers are dropped.
//! Recorded panics are resumed on the thread that asks for the result, so the
//! caller sees the original payload rather than a wrapped engine error.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// A failure raised by a loop body on some worker
pub enum Failure<E> {
    /// The body returned an error
    Error(E),
    /// The body (or the engine on its behalf) panicked
    Panic(Box<dyn Any + Send + 'static>),
}

impl<E> Failure<E> {
    /// Re-raise on the current thread: errors are returned, panics resumed.
    pub fn raise(self) -> Result<(), E> {
        match self {
            Failure::Error(err) => Err(err),
            Failure::Panic(payload) => panic::resume_unwind(payload),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::Error(err) => f.debug_tuple("Error").field(err).finish(),
            Failure::Panic(payload) => f
                .debug_tuple("Panic")
                .field(&panic_message(payload.as_ref()))
                .finish(),
        }
    }
}

/// Best-effort text of a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Thread-safe, first-writer-wins failure slot
pub struct FirstFailure<E> {
    recorded: AtomicBool,
    slot: Mutex<Option<Failure<E>>>,
}

impl<E> FirstFailure<E> {
    pub fn new() -> Self {
        Self {
            recorded: AtomicBool::new(false),
            slot: Mutex::new(None),
        }
    }

    /// Run `action`, recording its error or panic.
    ///
    /// Returns `None` when the action failed; the failure is kept only if no
    /// other failure was recorded before it.
    pub fn try_run<T>(&self, action: impl FnOnce() -> Result<T, E>) -> Option<T> {
        match panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.record(Failure::Error(err));
                None
            }
            Err(payload) => {
                self.record(Failure::Panic(payload));
                None
            }
        }
    }

    /// Record `failure` unless one is already present. Returns true if it was kept.
    pub fn record(&self, failure: Failure<E>) -> bool {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return false;
        }
        *slot = Some(failure);
        self.recorded.store(true, Ordering::Release);
        true
    }

    pub fn has_any(&self) -> bool {
        self.recorded.load(Ordering::Acquire)
    }

    pub fn has_none(&self) -> bool {
        !self.has_any()
    }

    /// Return the recorded error, or resume the recorded panic.
    pub fn throw_if_any(self) -> Result<(), E> {
        match self.into_inner() {
            Some(failure) => failure.raise(),
            None => Ok(()),
        }
    }

    /// Take the recorded failure without raising it
    pub fn into_inner(self) -> Option<Failure<E>> {
        self.slot
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl<E> Default for FirstFailure<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for FirstFailure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirstFailure")
            .field("recorded", &self.has_any())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_try_run_success_records_nothing() {
        let failures: FirstFailure<String> = FirstFailure::new();
        assert_eq!(failures.try_run(|| Ok(5)), Some(5));
        assert!(failures.has_none());
        assert!(failures.throw_if_any().is_ok());
    }

    #[test]
    fn test_first_error_wins() {
        let failures: FirstFailure<&str> = FirstFailure::new();
        assert_eq!(failures.try_run::<()>(|| Err("first")), None);
        assert_eq!(failures.try_run::<()>(|| Err("second")), None);
        assert!(failures.has_any());
        assert_eq!(failures.throw_if_any(), Err("first"));
    }

    #[test]
    fn test_panic_is_captured_and_resumed() {
        let failures: FirstFailure<()> = FirstFailure::new();
        let outcome = failures.try_run::<()>(|| panic!("body exploded"));
        assert!(outcome.is_none());
        assert!(failures.has_any());

        let resumed = panic::catch_unwind(AssertUnwindSafe(|| failures.throw_if_any()));
        let payload = resumed.expect_err("panic should be resumed");
        assert_eq!(panic_message(payload.as_ref()), "body exploded");
    }

    #[test]
    fn test_concurrent_records_keep_exactly_one() {
        let failures = Arc::new(FirstFailure::<usize>::new());
        let handles: Vec<_> = (0..8)
            .map(|id| {
                let failures = failures.clone();
                thread::spawn(move || failures.record(Failure::Error(id)))
            })
            .collect();

        let kept = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|kept| *kept)
            .count();
        assert_eq!(kept, 1);

        let failures = Arc::try_unwrap(failures).unwrap();
        assert!(matches!(failures.into_inner(), Some(Failure::Error(id)) if id < 8));
    }

    #[test]
    fn test_debug_shows_panic_message() {
        let failure: Failure<()> = Failure::Panic(Box::new("boom"));
        assert_eq!(format!("{failure:?}"), "Panic(\"boom\")");
    }
}
