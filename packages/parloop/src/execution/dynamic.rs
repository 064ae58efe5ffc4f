//! Dynamic strategy: workers claim the next index from a shared cursor

use super::{CountedRange, LoopExecution, LoopState};
use std::sync::{Mutex, PoisonError};

/// Counted loop where every worker pulls indices until the range is exhausted.
///
/// The cursor is a plain mutex-guarded counter; an atomic `fetch_add` would
/// be equally correct.
pub struct ForExecution<'f, F, E> {
    range: CountedRange,
    next: Mutex<u64>,
    body: &'f F,
    state: LoopState<E>,
}

impl<'f, F, E> ForExecution<'f, F, E>
where
    F: Fn(i64) -> Result<bool, E> + Sync,
    E: Send,
{
    pub fn new(range: CountedRange, body: &'f F) -> Self {
        Self {
            range,
            next: Mutex::new(0),
            body,
            state: LoopState::new(),
        }
    }

    pub fn into_state(self) -> LoopState<E> {
        self.state
    }

    /// Claim the next iteration index, or None once the range is exhausted
    fn claim(&self) -> Option<u64> {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        if *next >= self.range.count {
            return None;
        }
        let index = *next;
        *next += 1;
        Some(index)
    }
}

impl<F, E> LoopExecution<E> for ForExecution<'_, F, E>
where
    F: Fn(i64) -> Result<bool, E> + Sync,
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
            let Some(index) = self.claim() else {
                return false;
            };
            let value = self.range.value(index);
            if self.state.visit(|| (self.body)(value)) {
                return true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_single_worker_visits_range_in_order() {
        let seen = Mutex::new(Vec::new());
        let body = |i: i64| {
            seen.lock().unwrap().push(i);
            Ok::<_, ()>(false)
        };
        let execution = ForExecution::new(CountedRange::new(3, 12, 4), &body);

        assert!(!execution.work());
        assert_eq!(execution.into_state().finish(), Ok(false));
        assert_eq!(seen.into_inner().unwrap(), vec![3, 7, 11]);
    }

    #[test]
    fn test_concurrent_workers_visit_each_index_once() {
        let seen = Mutex::new(Vec::new());
        let body = |i: i64| {
            seen.lock().unwrap().push(i);
            Ok::<_, ()>(false)
        };
        let execution = ForExecution::new(CountedRange::new(0, 500, 1), &body);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| execution.work());
            }
        });

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 500);
        assert_eq!(seen.into_iter().collect::<HashSet<_>>().len(), 500);
    }

    #[test]
    fn test_stop_signal_ends_worker() {
        let body = |i: i64| Ok::<_, ()>(i == 2);
        let execution = ForExecution::new(CountedRange::new(0, 100, 1), &body);

        assert!(execution.work());
        // The cursor stopped right after the matching index
        assert_eq!(*execution.next.lock().unwrap(), 3);
        assert_eq!(execution.into_state().finish(), Ok(true));
    }
}
