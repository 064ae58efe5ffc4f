//! Shared result box used by `find`

use std::sync::{Mutex, PoisonError};

/// A mutex-guarded optional value written by any worker.
///
/// Concurrent writers race and the last one wins; callers that need "any one
/// of the results" can ignore the race.
#[derive(Debug, Default)]
pub struct Slot<T> {
    value: Mutex<Option<T>>,
}

impl<T> Slot<T> {
    pub fn new() -> Self {
        Self {
            value: Mutex::new(None),
        }
    }

    pub fn set(&self, value: T) {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(value);
    }

    pub fn into_inner(self) -> Option<T> {
        self.value.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}
