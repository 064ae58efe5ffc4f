//! Per-invocation execution contexts and work distribution
//!
//! A terminal operation on a plan resolves its thread request into a
//! [`Workers`] value and hands the body to [`run_counted`] or
//! [`run_iterator`]. Those either loop sequentially on the calling thread or
//! build an execution context (one of the strategies below) and pass it to
//! the [`dispatch`] module.
//!
//! | Strategy | Work unit claimed by |
//! |---|---|
//! | [`dynamic::ForExecution`] | mutex-guarded index cursor |
//! | [`balanced::BalancedForExecution`] | one precomputed contiguous chunk per worker |
//! | [`foreach::ForeachExecution`] | mutex-guarded iterator `next()` |
//!
//! Every worker checks [`LoopState::should_stop`] before claiming work and
//! after running the body, so a match or failure on one worker stops the rest
//! cooperatively.

pub mod balanced;
pub mod dispatch;
pub mod dynamic;
pub mod foreach;

use crate::failure::{Failure, FirstFailure};
use rayon::iter::{ParallelBridge, ParallelIterator};
use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};
use system_profile::SystemProfile;
use tracing::debug;

/// Shared-pool budget; the host profile is logged the first time it is read
pub(crate) fn common_threads() -> usize {
    static LOGGED: Once = Once::new();
    let profile = SystemProfile::get();
    LOGGED.call_once(|| debug!("Thread budget\n{}", profile.summary()));
    profile.effective_common_threads
}

/// Resolved thread request of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workers {
    /// Run on the calling thread only
    Sequential,
    /// One partition per usable shared-pool thread
    Auto,
    /// Exactly this many workers (always at least 2)
    Fixed(usize),
}

impl Workers {
    /// Interpret a plan's `threads` value: `<= 0` auto, `1` sequential
    pub fn from_request(threads: i32) -> Self {
        match threads {
            i32::MIN..=0 => Workers::Auto,
            1 => Workers::Sequential,
            n => Workers::Fixed(n as usize),
        }
    }

    /// Worker count for a run with the given shared-pool budget
    pub fn count(self, common: usize) -> usize {
        match self {
            Workers::Sequential => 1,
            Workers::Auto => common.max(1),
            Workers::Fixed(n) => n,
        }
    }
}

/// Run state shared by every worker of one invocation
pub struct LoopState<E> {
    stop: AtomicBool,
    failures: FirstFailure<E>,
}

impl<E> LoopState<E> {
    pub fn new() -> Self {
        Self {
            stop: AtomicBool::new(false),
            failures: FirstFailure::new(),
        }
    }

    /// True once any worker found a result or failed.
    ///
    /// The flag is read relaxed: a worker may finish one more unit after
    /// another worker raised it.
    pub fn should_stop(&self) -> bool {
        self.stop.load(Ordering::Relaxed) || self.failures.has_any()
    }

    pub fn signal_stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Run one unit of work. Returns true when the calling worker must stop.
    pub fn visit(&self, unit: impl FnOnce() -> Result<bool, E>) -> bool {
        match self.failures.try_run(unit) {
            Some(false) => self.should_stop(),
            Some(true) | None => {
                self.signal_stop();
                true
            }
        }
    }

    /// Record a failure raised by the engine itself, e.g. a thread that could
    /// not be spawned. It is resumed as a panic on the calling thread.
    pub fn host_failure(&self, message: String) {
        self.failures.record(Failure::Panic(Box::new(message)));
        self.signal_stop();
    }

    /// Resolve the run: the first failure if any, else whether a body asked to stop
    pub fn finish(self) -> Result<bool, E> {
        let stopped = self.stop.into_inner();
        self.failures.throw_if_any()?;
        Ok(stopped)
    }
}

impl<E> Default for LoopState<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// An execution context the dispatcher can fan out
pub trait LoopExecution<E>: Sync {
    fn state(&self) -> &LoopState<E>;

    /// One worker's loop. Returns true if the worker left because of a stop
    /// signal rather than running out of work.
    fn work(&self) -> bool;
}

/// Counted iteration space `start, start + increment, ... < stop`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountedRange {
    pub start: i64,
    pub increment: i64,
    pub count: u64,
}

impl CountedRange {
    /// `increment` must already be validated as `>= 1`
    pub fn new(start: i64, stop: i64, increment: i64) -> Self {
        let span = i128::from(stop) - i128::from(start);
        let count = if span <= 0 {
            0
        } else {
            let increment = i128::from(increment);
            ((span + increment - 1) / increment) as u64
        };
        Self {
            start,
            increment,
            count,
        }
    }

    /// Loop value of the `index`-th iteration
    #[inline]
    pub fn value(&self, index: u64) -> i64 {
        // In-range results never overflow; wrapping keeps the arithmetic
        // exact when `index * increment` alone exceeds i64.
        self.start
            .wrapping_add((index as i64).wrapping_mul(self.increment))
    }
}

/// Run `body` over a counted range. Returns true if some call returned true.
pub fn run_counted<F, E>(
    range: CountedRange,
    balanced: bool,
    workers: Workers,
    body: &F,
) -> Result<bool, E>
where
    F: Fn(i64) -> Result<bool, E> + Sync,
    E: Send,
{
    if range.count == 0 {
        return Ok(false);
    }

    let common = common_threads();
    let capped = usize::try_from(range.count).unwrap_or(usize::MAX);
    let worker_count = workers.count(common).min(capped);

    if workers == Workers::Sequential || worker_count <= 1 {
        debug!(count = range.count, "Running counted loop sequentially");
        for index in 0..range.count {
            if body(range.value(index))? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    if balanced {
        let execution = balanced::BalancedForExecution::new(range, worker_count, body);
        debug!(
            count = range.count,
            chunks = execution.chunks().len(),
            common,
            "Running balanced counted loop"
        );
        dispatch::dispatch(&execution, execution.chunks().len(), common);
        execution.into_state().finish()
    } else {
        let execution = dynamic::ForExecution::new(range, body);
        debug!(
            count = range.count,
            workers = worker_count,
            common,
            "Running dynamic counted loop"
        );
        dispatch::dispatch(&execution, worker_count, common);
        execution.into_state().finish()
    }
}

/// Run `body` over the items of `iter`. Returns true if some call returned true.
pub fn run_iterator<I, F, E>(iter: I, workers: Workers, body: &F) -> Result<bool, E>
where
    I: Iterator + Send,
    I::Item: Send,
    F: Fn(I::Item) -> Result<bool, E> + Sync,
    E: Send,
{
    if workers == Workers::Sequential {
        debug!("Running source loop sequentially");
        for item in iter {
            if body(item)? {
                return Ok(true);
            }
        }
        return Ok(false);
    }

    let common = common_threads();
    let worker_count = workers.count(common);

    if worker_count == common {
        debug!(common, "Folding source loop over the shared pool");
        let state = LoopState::new();
        iter.par_bridge()
            .any(|item| state.should_stop() || state.visit(|| body(item)));
        return state.finish();
    }

    debug!(workers = worker_count, common, "Running locked source loop");
    let execution = foreach::ForeachExecution::new(iter, body);
    dispatch::dispatch(&execution, worker_count, common);
    execution.into_state().finish()
}
