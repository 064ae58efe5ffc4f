//! Source strategy: workers pull items from one shared, locked iterator

use super::{LoopExecution, LoopState};
use std::sync::{Mutex, PoisonError};

/// Source loop over an iterator that is not thread-safe by itself.
///
/// Every `next()` happens under the lock, so each item reaches exactly one
/// worker. The lock is released before the body runs.
pub struct ForeachExecution<'f, I, F, E> {
    source: Mutex<I>,
    body: &'f F,
    state: LoopState<E>,
}

impl<'f, I, F, E> ForeachExecution<'f, I, F, E>
where
    I: Iterator + Send,
    I::Item: Send,
    F: Fn(I::Item) -> Result<bool, E> + Sync,
    E: Send,
{
    pub fn new(source: I, body: &'f F) -> Self {
        Self {
            source: Mutex::new(source),
            body,
            state: LoopState::new(),
        }
    }

    pub fn into_state(self) -> LoopState<E> {
        self.state
    }

    fn pull(&self) -> Option<I::Item> {
        self.source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .next()
    }
}

impl<I, F, E> LoopExecution<E> for ForeachExecution<'_, I, F, E>
where
    I: Iterator + Send,
    I::Item: Send,
    F: Fn(I::Item) -> Result<bool, E> + Sync,
    E: Send,
{
    fn state(&self) -> &LoopState<E> {
        &self.state
    }

    fn work(&self) -> bool {
        loop {
            if self.state.should_stop() {
                return true;
            }
            let Some(item) = self.pull() else {
                return false;
            };
            if self.state.visit(|| (self.body)(item)) {
                return true;
            }
        }
    }
}
