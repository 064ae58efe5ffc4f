//! Counted loop plan

use crate::configuration;
use crate::error::PlanError;
use crate::execution::{self, CountedRange, Workers};
use crate::slot::Slot;
use std::ops::Range;

/// Parallel counted loop over `start, start + increment, ... < stop`.
///
/// ```rust
/// use parloop::For;
/// use std::sync::atomic::{AtomicI64, Ordering};
///
/// let sum = AtomicI64::new(0);
/// For::new(0, 100)
///     .threads(4)
///     .run(|i| {
///         sum.fetch_add(i, Ordering::Relaxed);
///         Ok::<_, std::convert::Infallible>(())
///     })
///     .unwrap();
/// assert_eq!(sum.into_inner(), 4950);
/// ```
///
/// Bodies return `Result<_, E>`; the first error raised on any worker is
/// returned once every worker has stopped. Panics in a body are resumed on the
/// calling thread the same way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct For {
    start: i64,
    stop: i64,
    increment: i64,
    threads: i32,
    balanced: bool,
}

impl For {
    /// Loop over `0..count`
    pub fn count(count: i64) -> Self {
        Self::new(0, count)
    }

    /// Loop over `start..stop` with increment 1
    pub fn new(start: i64, stop: i64) -> Self {
        let config = configuration::get_config();
        Self {
            start,
            stop,
            increment: 1,
            threads: config.default_threads,
            balanced: config.balanced,
        }
    }

    /// Loop over `start..stop` stepping by `increment`
    pub fn with_increment(start: i64, stop: i64, increment: i64) -> Result<Self, PlanError> {
        Self::new(start, stop).step(increment)
    }

    /// Set the increment; it must be at least 1
    pub fn step(mut self, increment: i64) -> Result<Self, PlanError> {
        if increment < 1 {
            return Err(PlanError::InvalidIncrement(increment));
        }
        self.increment = increment;
        Ok(self)
    }

    /// Worker threads: `<= 0` auto, `1` sequential, more for an explicit count
    pub fn threads(mut self, threads: i32) -> Self {
        self.threads = threads;
        self
    }

    /// Pre-partition the range into one contiguous chunk per worker
    pub fn balanced(mut self, balanced: bool) -> Self {
        self.balanced = balanced;
        self
    }

    pub fn start(&self) -> i64 {
        self.start
    }

    pub fn stop(&self) -> i64 {
        self.stop
    }

    pub fn increment(&self) -> i64 {
        self.increment
    }

    pub fn thread_count(&self) -> i32 {
        self.threads
    }

    pub fn is_balanced(&self) -> bool {
        self.balanced
    }

    /// Number of iterations
    pub fn len(&self) -> u64 {
        self.range().count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn range(&self) -> CountedRange {
        CountedRange::new(self.start, self.stop, self.increment)
    }

    /// True iff `predicate` returned true for some index.
    ///
    /// Stops handing out work once any call returned true or failed.
    pub fn any<F, E>(&self, predicate: F) -> Result<bool, E>
    where
        F: Fn(i64) -> Result<bool, E> + Sync,
        E: Send,
    {
        execution::run_counted(
            self.range(),
            self.balanced,
            Workers::from_request(self.threads),
            &predicate,
        )
    }

    /// True iff `predicate` returned true for every index (vacuously true when empty)
    pub fn all<F, E>(&self, predicate: F) -> Result<bool, E>
    where
        F: Fn(i64) -> Result<bool, E> + Sync,
        E: Send,
    {
        Ok(!self.any(|i| predicate(i).map(|ok| !ok))?)
    }

    /// Some non-`None` value produced by `mapper`, if any index produced one.
    ///
    /// When several indices qualify, which one is returned is unspecified.
    pub fn find<R, F, E>(&self, mapper: F) -> Result<Option<R>, E>
    where
        F: Fn(i64) -> Result<Option<R>, E> + Sync,
        R: Send,
        E: Send,
    {
        let found = Slot::new();
        self.any(|i| {
            Ok(match mapper(i)? {
                Some(value) => {
                    found.set(value);
                    true
                }
                None => false,
            })
        })?;
        Ok(found.into_inner())
    }

    /// Like [`find`](Self::find), calling `fallback` once only if nothing was found
    pub fn find_or_else<R, F, D, E>(&self, mapper: F, fallback: D) -> Result<R, E>
    where
        F: Fn(i64) -> Result<Option<R>, E> + Sync,
        D: FnOnce() -> R,
        R: Send,
        E: Send,
    {
        Ok(self.find(mapper)?.unwrap_or_else(fallback))
    }

    /// Call `consumer` for every index
    pub fn run<F, E>(&self, consumer: F) -> Result<(), E>
    where
        F: Fn(i64) -> Result<(), E> + Sync,
        E: Send,
    {
        self.any(|i| {
            consumer(i)?;
            Ok(false)
        })?;
        Ok(())
    }

    /// [`any`](Self::any) with the index truncated to `i32` per call
    pub fn any_i32<F, E>(&self, predicate: F) -> Result<bool, E>
    where
        F: Fn(i32) -> Result<bool, E> + Sync,
        E: Send,
    {
        self.any(|i| predicate(i as i32))
    }

    /// [`all`](Self::all) with the index truncated to `i32` per call
    pub fn all_i32<F, E>(&self, predicate: F) -> Result<bool, E>
    where
        F: Fn(i32) -> Result<bool, E> + Sync,
        E: Send,
    {
        self.all(|i| predicate(i as i32))
    }

    /// [`find`](Self::find) with the index truncated to `i32` per call
    pub fn find_i32<R, F, E>(&self, mapper: F) -> Result<Option<R>, E>
    where
        F: Fn(i32) -> Result<Option<R>, E> + Sync,
        R: Send,
        E: Send,
    {
        self.find(|i| mapper(i as i32))
    }

    /// [`find_or_else`](Self::find_or_else) with the index truncated to `i32` per call
    pub fn find_or_else_i32<R, F, D, E>(&self, mapper: F, fallback: D) -> Result<R, E>
    where
        F: Fn(i32) -> Result<Option<R>, E> + Sync,
        D: FnOnce() -> R,
        R: Send,
        E: Send,
    {
        self.find_or_else(|i| mapper(i as i32), fallback)
    }

    /// [`run`](Self::run) with the index truncated to `i32` per call
    pub fn run_i32<F, E>(&self, consumer: F) -> Result<(), E>
    where
        F: Fn(i32) -> Result<(), E> + Sync,
        E: Send,
    {
        self.run(|i| consumer(i as i32))
    }
}

impl From<Range<i64>> for For {
    fn from(range: Range<i64>) -> Self {
        Self::new(range.start, range.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::convert::Infallible;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_builder_setters() {
        let plan = For::new(2, 20).threads(3).balanced(true).step(5).unwrap();
        assert_eq!(plan.start(), 2);
        assert_eq!(plan.stop(), 20);
        assert_eq!(plan.increment(), 5);
        assert_eq!(plan.thread_count(), 3);
        assert!(plan.is_balanced());
        assert_eq!(plan.len(), 4);
    }

    #[test]
    fn test_invalid_increment_fails_at_configuration() {
        assert_eq!(
            For::with_increment(0, 10, 0),
            Err(PlanError::InvalidIncrement(0))
        );
        assert_eq!(
            For::new(0, 10).step(-2),
            Err(PlanError::InvalidIncrement(-2))
        );
    }

    #[test]
    fn test_from_range() {
        let plan = For::from(-3..3);
        assert_eq!((plan.start(), plan.stop(), plan.len()), (-3, 3, 6));
        assert_eq!(For::count(7).len(), 7);
    }

    #[test]
    fn test_sequential_run_is_ordered() {
        let seen = Mutex::new(Vec::new());
        For::new(0, 10)
            .threads(1)
            .run(|i| {
                seen.lock().unwrap().push(i);
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert_eq!(seen.into_inner().unwrap(), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_stepped_run_visits_each_value_once() {
        for threads in [1, 3, 0] {
            for balanced in [false, true] {
                let seen = Mutex::new(Vec::new());
                For::with_increment(-7, 50, 3)
                    .unwrap()
                    .threads(threads)
                    .balanced(balanced)
                    .run(|i| {
                        seen.lock().unwrap().push(i);
                        Ok::<_, Infallible>(())
                    })
                    .unwrap();

                let mut seen = seen.into_inner().unwrap();
                seen.sort_unstable();
                assert_eq!(seen, (-7..50).step_by(3).collect::<Vec<_>>());
            }
        }
    }

    #[test]
    fn test_all_and_empty_ranges() {
        let calls = AtomicUsize::new(0);
        let plan = For::new(5, 5);
        let count = |_| {
            calls.fetch_add(1, Ordering::Relaxed);
            Ok::<_, Infallible>(true)
        };

        assert!(!plan.any(count).unwrap());
        assert!(plan.all(count).unwrap());
        assert_eq!(plan.find(|i| Ok::<_, Infallible>(Some(i))).unwrap(), None);
        assert_eq!(calls.load(Ordering::Relaxed), 0);

        assert!(For::new(0, 100).all(|i| Ok::<_, Infallible>(i < 100)).unwrap());
        assert!(!For::new(0, 100).all(|i| Ok::<_, Infallible>(i < 99)).unwrap());
    }

    #[test]
    fn test_find_or_else_calls_fallback_only_when_missing() {
        let fallbacks = AtomicUsize::new(0);
        let fallback = || {
            fallbacks.fetch_add(1, Ordering::Relaxed);
            -1
        };

        let hit = For::new(0, 64)
            .threads(4)
            .find_or_else(|i| Ok::<_, Infallible>((i == 40).then_some(i)), fallback)
            .unwrap();
        assert_eq!(hit, 40);
        assert_eq!(fallbacks.load(Ordering::Relaxed), 0);

        let miss = For::new(0, 64)
            .threads(4)
            .find_or_else(|_| Ok::<_, Infallible>(None), fallback)
            .unwrap();
        assert_eq!(miss, -1);
        assert_eq!(fallbacks.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_narrow_index_truncates() {
        let base = i64::from(u32::MAX) + 1;
        let seen = Mutex::new(HashSet::new());
        For::new(base, base + 4)
            .threads(2)
            .run_i32(|i| {
                seen.lock().unwrap().insert(i);
                Ok::<_, Infallible>(())
            })
            .unwrap();
        assert_eq!(seen.into_inner().unwrap(), HashSet::from([0, 1, 2, 3]));

        assert!(For::new(0, 10).any_i32(|i| Ok::<_, Infallible>(i == 9)).unwrap());
        assert!(For::new(0, 10).all_i32(|i| Ok::<_, Infallible>(i >= 0)).unwrap());
        assert_eq!(
            For::new(0, 10)
                .find_i32(|i| Ok::<_, Infallible>((i == 3).then_some(i * 2)))
                .unwrap(),
            Some(6)
        );
        assert_eq!(
            For::new(0, 0)
                .find_or_else_i32(|i| Ok::<_, Infallible>(Some(i)), || 77)
                .unwrap(),
            77
        );
    }

    #[test]
    fn test_error_propagates() {
        let result = For::new(0, 1000)
            .threads(4)
            .run(|i| if i == 500 { Err(format!("bad index {i}")) } else { Ok(()) });
        assert_eq!(result, Err("bad index 500".to_string()));
    }
}
