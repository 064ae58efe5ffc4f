//! Fan a loop execution out over the shared pool and dedicated threads
//!
//! ```text
//! workers <= common   (0..workers).into_par_iter().any(work)
//! workers >  common   spawn workers - common scoped threads running work,
//!                     run (0..common).into_par_iter().any(work) here,
//!                     wait on the latch for every dedicated thread
//! ```
//!
//! The shared-pool part is joined by `any` returning. Dedicated threads are
//! joined by the [`Latch`]; the crossbeam scope then only reaps threads that
//! have already counted down.

use super::LoopExecution;
use crate::configuration;
use rayon::prelude::*;
use std::panic;
use std::sync::{Condvar, Mutex, PoisonError};
use tracing::{debug, trace, warn};

/// Run `execution` on `workers` workers given a shared-pool budget of `common`
pub fn dispatch<E, X>(execution: &X, workers: usize, common: usize)
where
    X: LoopExecution<E>,
{
    if workers <= common {
        debug!(workers, "Dispatching onto the shared pool");
        let stopped = on_shared_pool(execution, workers.max(1));
        trace!(stopped, "Shared pool partitions finished");
        return;
    }

    let dedicated = workers - common;
    debug!(dedicated, common, "Dispatching onto dedicated threads and the shared pool");

    let config = configuration::get_config();
    let latch = Latch::new(dedicated);

    let outcome = crossbeam::thread::scope(|scope| {
        for worker_id in 0..dedicated {
            if execution.state().should_stop() {
                trace!(
                    skipped = dedicated - worker_id,
                    "Stop observed before all workers were spawned"
                );
                latch.count_down(dedicated - worker_id);
                break;
            }

            let mut builder = scope
                .builder()
                .name(format!("{}-{}", config.worker_name_prefix, worker_id));
            if let Some(stack_size) = config.worker_stack_size {
                builder = builder.stack_size(stack_size);
            }

            let latch = &latch;
            let spawned = builder.spawn(move |_| {
                let _done = latch.guard();
                trace!(worker_id, "Dedicated worker started");
                let stopped = execution.work();
                trace!(worker_id, stopped, "Dedicated worker finished");
            });

            if let Err(err) = spawned {
                warn!("Failed to spawn loop worker {}: {}", worker_id, err);
                execution
                    .state()
                    .host_failure(format!("failed to spawn parallel loop worker: {err}"));
                latch.count_down(dedicated - worker_id);
                break;
            }
        }

        let stopped = on_shared_pool(execution, common);
        trace!(stopped, "Shared pool partitions finished, waiting for dedicated workers");
        latch.wait();
    });

    // Worker bodies are unwound into the failure slot, so only an engine
    // panic can surface here.
    if let Err(payload) = outcome {
        panic::resume_unwind(payload);
    }
}

/// Short-circuiting OR over `partitions` copies of the worker loop
fn on_shared_pool<E, X>(execution: &X, partitions: usize) -> bool
where
    X: LoopExecution<E>,
{
    (0..partitions).into_par_iter().any(|_| execution.work())
}

/// Counter + condvar join for dedicated threads
pub struct Latch {
    remaining: Mutex<usize>,
    done: Condvar,
}

impl Latch {
    pub fn new(count: usize) -> Self {
        Self {
            remaining: Mutex::new(count),
            done: Condvar::new(),
        }
    }

    pub fn count_down(&self, n: usize) {
        let mut remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        *remaining = remaining.saturating_sub(n);
        if *remaining == 0 {
            self.done.notify_all();
        }
    }

    /// Counts down by one when dropped, including during unwinding
    pub fn guard(&self) -> LatchGuard<'_> {
        LatchGuard { latch: self }
    }

    /// Block until the count reaches zero
    pub fn wait(&self) {
        let remaining = self.remaining.lock().unwrap_or_else(PoisonError::into_inner);
        let _remaining = self
            .done
            .wait_while(remaining, |remaining| *remaining > 0)
            .unwrap_or_else(PoisonError::into_inner);
    }
}

pub struct LatchGuard<'a> {
    latch: &'a Latch,
}

impl Drop for LatchGuard<'_> {
    fn drop(&mut self) {
        self.latch.count_down(1);
    }
}
