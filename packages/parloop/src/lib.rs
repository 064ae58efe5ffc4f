//! # parloop - Parallel loops with short-circuiting and first-failure propagation
//!
//! parloop runs a counted range or an element source across worker threads:
//!
//! - **Counted loops** ([`For`]): `start..stop` stepped by a positive increment
//! - **Source loops** ([`Foreach`]): iterators, re-iterable collections, slices
//!   and rayon parallel iterators
//! - **Short-circuiting**: `any`, `all` and `find` stop every worker once the
//!   answer is known or a body fails
//! - **Two strategies**: dynamic claiming from a shared cursor, or balanced
//!   contiguous chunks computed up front
//! - **Failure propagation**: the first `Err` (or panic) raised by any worker is
//!   returned on the calling thread once all workers have stopped
//!
//! Work runs on rayon's global pool. When a plan asks for more threads than the
//! pool can give, the extra workers run on dedicated scoped threads and the
//! caller waits for all of them before returning.
//!
//! ## Quick Start
//!
//! ```rust
//! use parloop::{For, Foreach};
//!
//! // Counted loop, short-circuits as soon as a match is seen
//! let found = For::new(0, 1000)
//!     .threads(8)
//!     .any(|i| Ok::<_, std::convert::Infallible>(i == 999))
//!     .unwrap();
//! assert!(found);
//!
//! // Source loop returning the first mapped value
//! let words = ["x", "y", "z"];
//! let hit = Foreach::slice(&words)
//!     .find(|s| Ok::<_, std::convert::Infallible>((*s == "y").then_some(*s)))
//!     .unwrap();
//! assert_eq!(hit, Some("y"));
//! ```
//!
//! ## Thread counts
//!
//! | `threads(n)` | Execution |
//! |---|---|
//! | `n <= 0` | auto: one partition per usable shared-pool thread |
//! | `n == 1` | sequential on the calling thread |
//! | `1 < n <= budget` | `n` partitions on the shared pool |
//! | `n > budget` | `n - budget` dedicated threads plus the shared pool |
//!
//! The budget comes from [`effective_common_threads`].

pub mod config;
pub mod configuration;
pub mod error;
pub mod execution;
pub mod failure;
pub mod plan;
pub mod slot;

pub use config::EngineConfig;
pub use error::PlanError;
pub use execution::balanced::ChunkTable;
pub use failure::{Failure, FirstFailure};
pub use plan::{For, Foreach, IterSource, IterableSource, ParSource, SliceSource, Source};
pub use slot::Slot;

/// Threads the engine may use on the shared pool, cached per process.
pub fn effective_common_threads() -> usize {
    system_profile::SystemProfile::effective_common_threads()
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
