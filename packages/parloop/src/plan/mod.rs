//! Loop plans: reusable descriptions of an iteration space plus execution preferences
//!
//! Plans hold no run-time state. Every terminal operation (`run`, `any`,
//! `all`, `find`, `find_or_else`) builds a fresh execution context, blocks
//! until all workers have stopped, then returns the result or the first
//! failure.

pub mod foreach;
pub mod for_loop;
pub mod source;

pub use for_loop::For;
pub use foreach::Foreach;
pub use source::{IterSource, IterableSource, ParSource, SliceSource, Source};
