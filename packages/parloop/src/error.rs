//! Plan configuration errors

/// Error raised while configuring a loop plan.
///
/// These are reported synchronously by constructors and setters, never from
/// inside a worker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("loop increment must be at least 1, got {0}")]
    InvalidIncrement(i64),
}
