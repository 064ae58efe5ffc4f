//! Balanced strategy: the range is cut into near-equal contiguous chunks up front

use super::{CountedRange, LoopExecution, LoopState};
use std::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Partition of `[0, count)` into `min(workers, count)` contiguous chunks.
///
/// Chunk sizes differ by at most one. Chunk `c` starts at
/// `floor(count * c / chunks)`, which is `(count / chunks) * c` whenever the
/// division is exact; the last chunk always ends at `count`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkTable {
    count: u64,
    chunks: usize,
}

impl ChunkTable {
    pub fn new(count: u64, workers: usize) -> Self {
        let chunks = usize::try_from(count).map_or(workers, |count| workers.min(count));
        Self { count, chunks }
    }

    /// Number of chunks
    pub fn len(&self) -> usize {
        self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks == 0
    }

    /// Total number of indices covered
    pub fn count(&self) -> u64 {
        self.count
    }

    fn start(&self, chunk: usize) -> u64 {
        // u128 keeps count * chunk exact for every u64 count
        (u128::from(self.count) * chunk as u128 / self.chunks as u128) as u64
    }

    /// Index range of `chunk`; `chunk` must be below [`len`](Self::len)
    pub fn bounds(&self, chunk: usize) -> Range<u64> {
        let end = if chunk + 1 == self.chunks {
            self.count
        } else {
            self.start(chunk + 1)
        };
        self.start(chunk)..end
    }

    pub fn iter(&self) -> impl Iterator<Item = Range<u64>> + '_ {
        (0..self.chunks).map(|chunk| self.bounds(chunk))
    }
}

/// Counted loop where each worker takes one precomputed chunk.
///
/// Workers claim chunks through a cursor. With one worker per chunk each gets
/// exactly one; a chunk whose worker never started is taken by whichever
/// worker finishes first.
pub struct BalancedForExecution<'f, F, E> {
    range: CountedRange,
    chunks: ChunkTable,
    next_chunk: AtomicUsize,
    body: &'f F,
    state: LoopState<E>,
}

impl<'f, F, E> BalancedForExecution<'f, F, E>
where
    F: Fn(i64) -> Result<bool, E> + Sync,
    E: Send,
{
    pub fn new(range: CountedRange, workers: usize, body: &'f F) -> Self {
        Self {
            range,
            chunks: ChunkTable::new(range.count, workers),
            next_chunk: AtomicUsize::new(0),
            body,
            state: LoopState::new(),
        }
    }

    pub fn chunks(&self) -> &ChunkTable {
        &self.chunks
    }

    pub fn into_state(self) -> LoopState<E> {
        self.state
    }
}

impl<F, E> LoopExecution<E> for BalancedForExecution<'_, F, E>
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
            let chunk = self.next_chunk.fetch_add(1, Ordering::Relaxed);
            if chunk >= self.chunks.len() {
                return false;
            }
            for index in self.chunks.bounds(chunk) {
                // Checked per element so a stop elsewhere is seen mid-chunk
                if self.state.should_stop() {
                    return true;
                }
                let value = self.range.value(index);
                if self.state.visit(|| (self.body)(value)) {
                    return true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn assert_partition(count: u64, workers: usize) {
        let table = ChunkTable::new(count, workers);
        assert_eq!(table.len() as u64, (workers as u64).min(count));

        let mut expected_start = 0;
        let mut sizes = Vec::new();
        for bounds in table.iter() {
            assert_eq!(bounds.start, expected_start, "chunks must be contiguous");
            assert!(bounds.end > bounds.start, "chunks must not be empty");
            sizes.push(bounds.end - bounds.start);
            expected_start = bounds.end;
        }
        assert_eq!(expected_start, count, "chunks must cover the range");

        let min = sizes.iter().min().copied().unwrap_or(0);
        let max = sizes.iter().max().copied().unwrap_or(0);
        assert!(max - min <= 1, "count={count} workers={workers} sizes={sizes:?}");
    }

    #[test]
    fn test_partition_coverage() {
        for count in 1..=64 {
            for workers in 1..=count as usize {
                assert_partition(count, workers);
            }
        }
        assert_partition(1_000_003, 7);
        assert_partition(u64::MAX, 13);
    }

    #[test]
    fn test_even_division() {
        let table = ChunkTable::new(12, 4);
        let chunks: Vec<_> = table.iter().collect();
        assert_eq!(chunks, vec![0..3, 3..6, 6..9, 9..12]);
    }

    #[test]
    fn test_uneven_division() {
        let table = ChunkTable::new(10, 4);
        let chunks: Vec<_> = table.iter().collect();
        assert_eq!(chunks, vec![0..2, 2..5, 5..7, 7..10]);
    }

    #[test]
    fn test_more_workers_than_items() {
        let table = ChunkTable::new(3, 16);
        assert_eq!(table.len(), 3);
        assert_eq!(table.iter().collect::<Vec<_>>(), vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_empty_range_has_no_chunks() {
        let table = ChunkTable::new(0, 4);
        assert!(table.is_empty());
        assert_eq!(table.iter().count(), 0);
    }

    #[test]
    fn test_worker_walks_its_chunk_in_order() {
        let seen = Mutex::new(Vec::new());
        let body = |i: i64| {
            seen.lock().unwrap().push(i);
            Ok::<_, ()>(false)
        };
        let execution = BalancedForExecution::new(CountedRange::new(100, 110, 1), 2, &body);

        // A lone worker drains both chunks, one after the other
        assert!(!execution.work());
        assert_eq!(
            seen.into_inner().unwrap(),
            (100..110).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_stop_inside_chunk() {
        let body = |i: i64| Ok::<_, ()>(i == 4);
        let execution = BalancedForExecution::new(CountedRange::new(0, 10, 1), 2, &body);

        assert!(execution.work());
        assert_eq!(execution.into_state().finish(), Ok(true));
    }
}
