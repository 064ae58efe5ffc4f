//! Host facts that size parallel loops
//!
//! Core counts and the shared-pool width are read once, on first access, and
//! reused for the rest of the process. A pool resized later is not observed.

use std::sync::{Arc, LazyLock};

/// Process-wide profile, detected on first use
pub static SYSTEM: LazyLock<Arc<SystemProfile>> =
    LazyLock::new(|| Arc::new(SystemProfile::detect()));

/// Host profile relevant to worker-thread budgeting
#[derive(Debug, Clone)]
pub struct SystemProfile {
    /// Logical cores, counting SMT siblings
    pub cpu_count: usize,

    /// Physical cores
    pub physical_cpu_count: usize,

    /// Parallelism advertised by the shared (rayon global) pool
    pub common_pool_threads: usize,

    /// Threads the engine may actually use on the shared pool
    pub effective_common_threads: usize,
}

impl SystemProfile {
    /// Probe the host; only [`SYSTEM`] calls this
    fn detect() -> Self {
        let cpu_count = num_cpus::get();
        let physical_cpu_count = num_cpus::get_physical();

        // Touching current_num_threads initializes the global pool if nobody has yet
        let common_pool_threads = rayon::current_num_threads();

        Self {
            cpu_count,
            physical_cpu_count,
            common_pool_threads,
            effective_common_threads: effective_threads(common_pool_threads, cpu_count),
        }
    }

    /// Shared handle to [`SYSTEM`]
    pub fn get() -> Arc<SystemProfile> {
        SYSTEM.clone()
    }

    /// Multi-line description for debug logs
    pub fn summary(&self) -> String {
        format!(
            "CPUs: {} ({} physical)\n\
             Shared pool: {} threads\n\
             Effective budget: {} threads",
            self.cpu_count,
            self.physical_cpu_count,
            self.common_pool_threads,
            self.effective_common_threads,
        )
    }
}

/// Usable shared-pool threads for a pool advertising `pool_parallelism`
/// on a host with `available_processors` cores.
///
/// The `+ 1` accounts for the calling thread, which pools conventionally
/// leave out of their advertised parallelism. The outer `min` keeps a pool
/// that clamps itself to a floor of one thread from claiming two threads on
/// a single-core host.
pub fn effective_threads(pool_parallelism: usize, available_processors: usize) -> usize {
    pool_parallelism
        .saturating_add(1)
        .min(available_processors)
        .max(1)
}

/// Field shortcuts on the cached profile
impl SystemProfile {
    /// Logical cores
    pub fn cpu_count() -> usize {
        SYSTEM.cpu_count
    }

    /// Physical cores
    pub fn physical_cpu_count() -> usize {
        SYSTEM.physical_cpu_count
    }

    /// Effective shared-pool budget, cached per process
    pub fn effective_common_threads() -> usize {
        SYSTEM.effective_common_threads
    }
}
