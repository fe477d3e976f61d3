use std::fmt;

use crate::{Chunk, NestedLog, Record, Segment};

/// Checkpoint into a `ChunkVector` and, through `inner`, into every log
/// nested beneath it.
///
/// Ordering is lexicographic over `(chunk, data, inner)`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChunkPosition<P> {
    /// Index of the chunk.
    pub chunk: usize,
    /// Offset of the next record inside that chunk.
    pub data: usize,
    /// Position the nested log had reached at the same time.
    pub inner: P,
}

impl<P: fmt::Debug> fmt::Display for ChunkPosition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} / {:?}", self.chunk, self.data, self.inner)
    }
}

/// An append-only log of `R` records kept in fixed-capacity chunks,
/// layered over the nested log `N`.
///
/// Chunks are never moved or reordered once created, so a
/// `ChunkPosition` stays a valid rewind target while the log grows.
/// Rewinding keeps the chunks around and refills them on the next
/// rollovers.
pub struct ChunkVector<R: Record, N: NestedLog> {
    pub(crate) chunks: Vec<Chunk<R>>,
    // nested position at the time chunk `i` became current
    pub(crate) positions: Vec<N::Position>,
    pub(crate) current: usize,
    pub(crate) chunk_size: usize,
    pub(crate) nested: N,
}

impl<R: Record, N: NestedLog> fmt::Debug for ChunkVector<R, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkVector")
            .field("chunk_size", &self.chunk_size)
            .field("chunks", &self.chunks.len())
            .field("current", &self.current)
            .field("positions", &self.positions)
            .finish()
    }
}

impl<R: Record, N: NestedLog> ChunkVector<R, N> {
    pub fn new(chunk_size: usize, nested: N) -> ChunkVector<R, N> {
        assert_ne!(chunk_size, 0, "ChunkVector chunks need a non-zero capacity");

        let position = nested.position();
        ChunkVector {
            chunks: vec![Chunk::new(chunk_size)],
            positions: vec![position],
            current: 0,
            chunk_size,
            nested,
        }
    }

    pub fn nested(&self) -> &N {
        &self.nested
    }

    pub fn nested_mut(&mut self) -> &mut N {
        &mut self.nested
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of allocated chunks, including ones kept after a rewind.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn chunk(&self, index: usize) -> &Chunk<R> {
        &self.chunks[index]
    }

    /// The nested position recorded when chunk `index` became current.
    pub fn nested_position_at(&self, index: usize) -> &N::Position {
        &self.positions[index]
    }

    /// Total number of records up to the current head.
    pub fn data_size(&self) -> usize {
        self.chunks[..=self.current]
            .iter()
            .map(Chunk::used_size)
            .sum()
    }

    /// Makes sure the current chunk can take `items` more records,
    /// rolling over to the next chunk if it can not.
    #[inline]
    pub fn reserve_items(&mut self, items: usize) {
        debug_assert!(
            items <= self.chunk_size,
            "can not reserve {items} items in chunks of size {}",
            self.chunk_size
        );

        if self.chunks[self.current].unused_size() < items {
            self.next_chunk();
        }
    }

    fn next_chunk(&mut self) {
        self.chunks[self.current].store();
        self.current += 1;

        let nested_position = self.nested.position();

        if self.current < self.chunks.len() {
            log::trace!(
                "reusing chunk {} at nested position {:?}",
                self.current,
                nested_position
            );
            self.chunks[self.current].reset();
            self.positions[self.current] = nested_position;
        } else {
            log::trace!(
                "allocating chunk {} of size {} at nested position {:?}",
                self.current,
                self.chunk_size,
                nested_position
            );
            self.chunks.push(Chunk::new(self.chunk_size));
            self.positions.push(nested_position);
        }
    }

    /// Appends one record. Room must have been reserved with
    /// `reserve_items` since the last rollover.
    #[inline]
    pub fn push(&mut self, record: R) {
        self.chunks[self.current].push(record);
    }

    /// Allocates enough chunks up front to hold `total_items` records
    /// without allocating at rollover. Never shrinks.
    pub fn resize(&mut self, total_items: usize) {
        let needed = ((total_items + self.chunk_size - 1) / self.chunk_size).max(1);

        if needed <= self.chunks.len() {
            return;
        }

        log::debug!(
            "pre-allocating {} chunks of size {} for {} items",
            needed - self.chunks.len(),
            self.chunk_size,
            total_items
        );

        let nested_position = self.nested.position();
        self.chunks.reserve(needed - self.chunks.len());
        while self.chunks.len() < needed {
            self.chunks.push(Chunk::new(self.chunk_size));
            self.positions.push(nested_position);
        }
    }

    /// Visits every chunk holding records of the current recording,
    /// oldest first.
    pub fn for_each_chunk<F>(&self, mut f: F)
    where
        F: FnMut(&Chunk<R>),
    {
        for chunk in &self.chunks[..=self.current] {
            f(chunk);
        }
    }

    /// Visits the records in `[end, start)` newest first.
    pub fn for_each_reverse<'a, F>(
        &'a self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
        mut visitor: F,
    ) where
        F: FnMut(R::Refs<'a>),
    {
        debug_assert!(
            (start.chunk, start.data) >= (end.chunk, end.data),
            "reverse traversal from {start} to {end} runs backwards"
        );

        let mut chunk = start.chunk;
        let mut data_start = start.data;

        loop {
            let data_end = if chunk == end.chunk { end.data } else { 0 };
            let current: &'a Chunk<R> = &self.chunks[chunk];

            for at in (data_end..data_start).rev() {
                visitor(current.refs(at));
            }

            if chunk <= end.chunk {
                break;
            }

            chunk -= 1;
            data_start = self.chunks[chunk].used_size();
        }
    }

    /// Visits the records in `[start, end)` oldest first.
    pub fn for_each_forward<'a, F>(
        &'a self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
        mut visitor: F,
    ) where
        F: FnMut(R::Refs<'a>),
    {
        debug_assert!(
            (start.chunk, start.data) <= (end.chunk, end.data),
            "forward traversal from {start} to {end} runs backwards"
        );

        let mut chunk = start.chunk;
        let mut data_start = start.data;

        loop {
            let current: &'a Chunk<R> = &self.chunks[chunk];
            let data_end = if chunk == end.chunk {
                end.data
            } else {
                current.used_size()
            };

            for at in data_start..data_end {
                visitor(current.refs(at));
            }

            if chunk >= end.chunk {
                break;
            }

            chunk += 1;
            data_start = 0;
        }
    }

    fn evaluate_chunk_reverse<'a, A, F>(
        &'a self,
        chunk: usize,
        data_start: usize,
        data_end: usize,
        inner_start: &N::Position,
        inner_end: &N::Position,
        frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut N::Frames<'a, (A, Segment<'a, R>)>),
    {
        let segment = Segment::new(self.chunks[chunk].slices(), data_start, data_end);

        let (frames, segment) = self
            .nested
            .evaluate_reverse(inner_start, inner_end, (frames, segment), f);

        debug_assert_eq!(
            segment.cursor, segment.end,
            "reverse evaluation of chunk {chunk} stopped at record {} instead of {}",
            segment.cursor, segment.end
        );

        frames
    }

    fn evaluate_chunk_forward<'a, A, F>(
        &'a self,
        chunk: usize,
        data_start: usize,
        data_end: usize,
        inner_start: &N::Position,
        inner_end: &N::Position,
        frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut N::Frames<'a, (A, Segment<'a, R>)>),
    {
        let segment = Segment::new(self.chunks[chunk].slices(), data_start, data_end);

        let (frames, segment) = self
            .nested
            .evaluate_forward(inner_start, inner_end, (frames, segment), f);

        debug_assert_eq!(
            segment.cursor, segment.end,
            "forward evaluation of chunk {chunk} stopped at record {} instead of {}",
            segment.cursor, segment.end
        );

        frames
    }
}

impl<R: Record, N: NestedLog> NestedLog for ChunkVector<R, N> {
    type Position = ChunkPosition<N::Position>;
    type Frames<'a, A> = N::Frames<'a, (A, Segment<'a, R>)> where Self: 'a;

    fn position(&self) -> ChunkPosition<N::Position> {
        ChunkPosition {
            chunk: self.current,
            data: self.chunks[self.current].used_size(),
            inner: self.nested.position(),
        }
    }

    fn zero_position(&self) -> ChunkPosition<N::Position> {
        ChunkPosition {
            chunk: 0,
            data: 0,
            inner: self.nested.zero_position(),
        }
    }

    fn reset_to(&mut self, position: &ChunkPosition<N::Position>) {
        debug_assert!(
            position.chunk < self.chunks.len() && position.data <= self.chunk_size,
            "reset target {position} is outside of {} chunks of size {}",
            self.chunks.len(),
            self.chunk_size
        );
        debug_assert!(
            (position.chunk, position.data)
                <= (self.current, self.chunks[self.current].used_size()),
            "reset target {position} is ahead of the current head"
        );

        log::trace!("rewinding chunk vector to {}", position);

        self.current = position.chunk;
        self.chunks[self.current].set_used_size(position.data);
        self.nested.reset_to(&position.inner);
    }

    fn reset_hard(&mut self) {
        log::debug!(
            "releasing {} chunks of size {}",
            self.chunks.len() - 1,
            self.chunk_size
        );

        self.chunks.truncate(1);
        self.chunks.shrink_to_fit();
        self.positions.truncate(1);
        self.positions.shrink_to_fit();
        self.current = 0;
        self.chunks[0].reset();

        self.nested.reset_hard();
        self.positions[0] = self.nested.position();
    }

    fn evaluate_reverse<'a, A, F>(
        &'a self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
        mut frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        debug_assert!(start >= end, "reverse evaluation from {start} to {end} runs backwards");

        let mut inner_start = start.inner;
        let mut data_start = start.data;

        for chunk in (end.chunk + 1..=start.chunk).rev() {
            let inner_end = self.positions[chunk];
            frames = self.evaluate_chunk_reverse(
                chunk,
                data_start,
                0,
                &inner_start,
                &inner_end,
                frames,
                f,
            );

            inner_start = inner_end;
            data_start = self.chunks[chunk - 1].used_size();
        }

        self.evaluate_chunk_reverse(
            end.chunk,
            data_start,
            end.data,
            &inner_start,
            &end.inner,
            frames,
            f,
        )
    }

    fn evaluate_forward<'a, A, F>(
        &'a self,
        start: &ChunkPosition<N::Position>,
        end: &ChunkPosition<N::Position>,
        mut frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        debug_assert!(start <= end, "forward evaluation from {start} to {end} runs backwards");

        let mut inner_start = start.inner;
        let mut data_start = start.data;

        for chunk in start.chunk..end.chunk {
            let inner_end = self.positions[chunk + 1];
            frames = self.evaluate_chunk_forward(
                chunk,
                data_start,
                self.chunks[chunk].used_size(),
                &inner_start,
                &inner_end,
                frames,
                f,
            );

            inner_start = inner_end;
            data_start = 0;
        }

        self.evaluate_chunk_forward(
            end.chunk,
            data_start,
            end.data,
            &inner_start,
            &end.inner,
            frames,
            f,
        )
    }
}
