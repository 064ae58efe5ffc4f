//! Element sources a [`Foreach`](super::Foreach) plan can loop over

use crate::configuration;
use crate::execution::{self, CountedRange, LoopState, Workers, common_threads};
use rayon::iter::ParallelIterator;
use tracing::{debug, warn};

/// Something a `Foreach` plan can drive.
///
/// `drive` runs `body` over the source's items with the requested workers and
/// returns true if some call returned true. It is the hook each source uses
/// to pick its execution strategy; plan users call the terminal operations on
/// [`Foreach`](super::Foreach) instead.
pub trait Source {
    type Item: Send;

    fn drive<F, E>(&mut self, workers: Workers, body: &F) -> Result<bool, E>
    where
        F: Fn(Self::Item) -> Result<bool, E> + Sync,
        E: Send;
}

/// A one-shot iterator.
///
/// Items are consumed by the run; items left behind by a short-circuit stay
/// in the iterator for the next run.
#[derive(Debug)]
pub struct IterSource<I> {
    iter: I,
}

impl<I> IterSource<I> {
    pub fn new(iter: I) -> Self {
        Self { iter }
    }

    pub fn into_inner(self) -> I {
        self.iter
    }
}

impl<I> Source for IterSource<I>
where
    I: Iterator + Send,
    I::Item: Send,
{
    type Item = I::Item;

    fn drive<F, E>(&mut self, workers: Workers, body: &F) -> Result<bool, E>
    where
        F: Fn(Self::Item) -> Result<bool, E> + Sync,
        E: Send,
    {
        execution::run_iterator(&mut self.iter, workers, body)
    }
}

/// A borrowed collection, re-iterated from the start on every run
#[derive(Debug)]
pub struct IterableSource<'a, C: ?Sized> {
    collection: &'a C,
}

impl<'a, C: ?Sized> IterableSource<'a, C> {
    pub fn new(collection: &'a C) -> Self {
        Self { collection }
    }
}

impl<'a, C> Source for IterableSource<'a, C>
where
    C: ?Sized + Sync,
    &'a C: IntoIterator,
    <&'a C as IntoIterator>::IntoIter: Send,
    <&'a C as IntoIterator>::Item: Send,
{
    type Item = <&'a C as IntoIterator>::Item;

    fn drive<F, E>(&mut self, workers: Workers, body: &F) -> Result<bool, E>
    where
        F: Fn(Self::Item) -> Result<bool, E> + Sync,
        E: Send,
    {
        execution::run_iterator(self.collection.into_iter(), workers, body)
    }
}

/// A slice, run as a counted loop over its indices with no iterator lock
#[derive(Debug)]
pub struct SliceSource<'a, T> {
    items: &'a [T],
}

impl<'a, T> SliceSource<'a, T> {
    pub fn new(items: &'a [T]) -> Self {
        Self { items }
    }
}

impl<'a, T: Sync> Source for SliceSource<'a, T> {
    type Item = &'a T;

    fn drive<F, E>(&mut self, workers: Workers, body: &F) -> Result<bool, E>
    where
        F: Fn(Self::Item) -> Result<bool, E> + Sync,
        E: Send,
    {
        let items = self.items;
        let range = CountedRange::new(0, items.len() as i64, 1);
        execution::run_counted(range, false, workers, &|index: i64| {
            body(&items[index as usize])
        })
    }
}

/// A push-style rayon parallel iterator. One-shot: a second run sees no items.
#[derive(Debug)]
pub struct ParSource<P> {
    iter: Option<P>,
}

impl<P> ParSource<P> {
    pub fn new(iter: P) -> Self {
        Self { iter: Some(iter) }
    }

    pub fn is_consumed(&self) -> bool {
        self.iter.is_none()
    }
}

impl<P> Source for ParSource<P>
where
    P: ParallelIterator,
{
    type Item = P::Item;

    fn drive<F, E>(&mut self, workers: Workers, body: &F) -> Result<bool, E>
    where
        F: Fn(Self::Item) -> Result<bool, E> + Sync,
        E: Send,
    {
        let Some(iter) = self.iter.take() else {
            warn!("Parallel iterator source was already consumed, treating it as empty");
            return Ok(false);
        };

        if workers == Workers::Sequential {
            // Items are produced on the pool; every body call runs here, in order
            debug!("Running parallel source sequentially on the calling thread");
            let items: Vec<P::Item> = iter.collect();
            for item in items {
                if body(item)? {
                    return Ok(true);
                }
            }
            return Ok(false);
        }

        let state = LoopState::new();
        let fold = |iter: P| {
            iter.any(|item| state.should_stop() || state.visit(|| body(item)))
        };

        let common = common_threads();
        let worker_count = workers.count(common);
        if worker_count == common {
            debug!(common, "Folding parallel source over the shared pool");
            fold(iter);
            return state.finish();
        }

        let config = configuration::get_config();
        let prefix = config.worker_name_prefix.clone();
        let mut builder = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count)
            .thread_name(move |index| format!("{prefix}-pool-{index}"));
        if let Some(stack_size) = config.worker_stack_size {
            builder = builder.stack_size(stack_size);
        }

        match builder.build() {
            Ok(pool) => {
                debug!(workers = worker_count, "Folding parallel source on a dedicated pool");
                pool.install(|| fold(iter));
            }
            Err(err) => {
                warn!(
                    "Failed to build a {}-thread pool, using the shared pool: {}",
                    worker_count, err
                );
                fold(iter);
            }
        }
        state.finish()
    }
}
