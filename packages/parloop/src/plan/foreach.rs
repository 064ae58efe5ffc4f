//! Source-driven loop plan

use super::source::{IterSource, IterableSource, ParSource, SliceSource, Source};
use crate::configuration;
use crate::execution::Workers;
use crate::slot::Slot;
use rayon::iter::ParallelIterator;

/// Parallel loop over the items of a [`Source`].
///
/// ```rust
/// use parloop::Foreach;
///
/// let names = vec!["ada".to_string(), "grace".to_string()];
/// let longest = Foreach::iterable(&names)
///     .threads(2)
///     .any(|name| Ok::<_, std::convert::Infallible>(name.len() > 4))
///     .unwrap();
/// assert!(longest);
/// ```
///
/// Terminal operations take `&mut self`: an iterator source is advanced by
/// the run, and a plan can never be reconfigured while it is running.
#[derive(Debug)]
pub struct Foreach<S> {
    source: S,
    threads: i32,
}

impl<I> Foreach<IterSource<I>>
where
    I: Iterator + Send,
    I::Item: Send,
{
    /// Loop over a one-shot iterator
    pub fn iter<T>(iter: T) -> Self
    where
        T: IntoIterator<IntoIter = I>,
    {
        Self::from_source(IterSource::new(iter.into_iter()))
    }
}

impl<'a, C> Foreach<IterableSource<'a, C>>
where
    C: ?Sized + Sync,
    &'a C: IntoIterator,
    <&'a C as IntoIterator>::IntoIter: Send,
    <&'a C as IntoIterator>::Item: Send,
{
    /// Loop over a borrowed collection; every run starts from its first item
    pub fn iterable(collection: &'a C) -> Self {
        Self::from_source(IterableSource::new(collection))
    }
}

impl<'a, T: Sync> Foreach<SliceSource<'a, T>> {
    /// Loop over a slice by index, without locking an iterator
    pub fn slice(items: &'a [T]) -> Self {
        Self::from_source(SliceSource::new(items))
    }
}

impl<P: ParallelIterator> Foreach<ParSource<P>> {
    /// Loop over a rayon parallel iterator (consumed by the first run)
    pub fn par_iter(iter: P) -> Self {
        Self::from_source(ParSource::new(iter))
    }
}

impl<S: Source> Foreach<S> {
    /// Loop over any [`Source`] implementation
    pub fn from_source(source: S) -> Self {
        Self {
            source,
            threads: configuration::get_config().default_threads,
        }
    }

    /// Worker threads: `<= 0` auto, `1` sequential, more for an explicit count
    pub fn threads(mut self, threads: i32) -> Self {
        self.threads = threads;
        self
    }

    pub fn thread_count(&self) -> i32 {
        self.threads
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }

    /// True iff `predicate` returned true for some item
    pub fn any<F, E>(&mut self, predicate: F) -> Result<bool, E>
    where
        F: Fn(S::Item) -> Result<bool, E> + Sync,
        E: Send,
    {
        self.source
            .drive(Workers::from_request(self.threads), &predicate)
    }

    /// True iff `predicate` returned true for every item (vacuously true when empty)
    pub fn all<F, E>(&mut self, predicate: F) -> Result<bool, E>
    where
        F: Fn(S::Item) -> Result<bool, E> + Sync,
        E: Send,
    {
        Ok(!self.any(|item| predicate(item).map(|ok| !ok))?)
    }

    /// Some non-`None` value produced by `mapper`; unspecified which one if several
    pub fn find<R, F, E>(&mut self, mapper: F) -> Result<Option<R>, E>
    where
        F: Fn(S::Item) -> Result<Option<R>, E> + Sync,
        R: Send,
        E: Send,
    {
        let found = Slot::new();
        self.any(|item| {
            Ok(match mapper(item)? {
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
    pub fn find_or_else<R, F, D, E>(&mut self, mapper: F, fallback: D) -> Result<R, E>
    where
        F: Fn(S::Item) -> Result<Option<R>, E> + Sync,
        D: FnOnce() -> R,
        R: Send,
        E: Send,
    {
        Ok(self.find(mapper)?.unwrap_or_else(fallback))
    }

    /// Call `consumer` for every item
    pub fn run<F, E>(&mut self, consumer: F) -> Result<(), E>
    where
        F: Fn(S::Item) -> Result<(), E> + Sync,
        E: Send,
    {
        self.any(|item| {
            consumer(item)?;
            Ok(false)
        })?;
        Ok(())
    }
}
