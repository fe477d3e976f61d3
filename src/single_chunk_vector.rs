use std::fmt;

use crate::{Chunk, NestedLog, Record, Segment};

/// Checkpoint into a `SingleChunkVector` and the logs nested beneath it.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockPosition<P> {
    pub data: usize,
    pub inner: P,
}

impl<P: fmt::Debug> fmt::Display for BlockPosition<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {:?}", self.data, self.inner)
    }
}

/// A log that keeps all of its records in one chunk which grows on
/// demand.
///
/// Positions and traversal behave like a `ChunkVector` that never rolls
/// over, so it can be stacked anywhere a `ChunkVector` can. Growing
/// copies the records, which is why the chunked variant is preferred for
/// logs of unknown length.
pub struct SingleChunkVector<R: Record, N: NestedLog> {
    chunk: Chunk<R>,
    initial_size: usize,
    nested: N,
}

impl<R: Record, N: NestedLog> fmt::Debug for SingleChunkVector<R, N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleChunkVector")
            .field("chunk", &self.chunk)
            .finish()
    }
}

impl<R: Record, N: NestedLog> SingleChunkVector<R, N> {
    pub fn new(initial_size: usize, nested: N) -> SingleChunkVector<R, N> {
        SingleChunkVector {
            chunk: Chunk::new(initial_size),
            initial_size,
            nested,
        }
    }

    pub fn nested(&self) -> &N {
        &self.nested
    }

    pub fn nested_mut(&mut self) -> &mut N {
        &mut self.nested
    }

    pub fn chunk(&self) -> &Chunk<R> {
        &self.chunk
    }

    pub fn data_size(&self) -> usize {
        self.chunk.used_size()
    }

    /// Makes sure `items` more records fit, growing the chunk if needed.
    #[inline]
    pub fn reserve_items(&mut self, items: usize) {
        if self.chunk.unused_size() < items {
            let new_size = (self.chunk.size() * 2).max(self.chunk.used_size() + items);
            log::debug!(
                "growing single chunk from {} to {} items",
                self.chunk.size(),
                new_size
            );
            self.chunk.grow(new_size);
        }
    }

    #[inline]
    pub fn push(&mut self, record: R) {
        self.chunk.push(record);
    }

    /// Grows the chunk to hold `total_items`. Never shrinks.
    pub fn resize(&mut self, total_items: usize) {
        self.chunk.grow(total_items);
    }

    pub fn for_each_reverse<'a, F>(
        &'a self,
        start: &BlockPosition<N::Position>,
        end: &BlockPosition<N::Position>,
        mut visitor: F,
    ) where
        F: FnMut(R::Refs<'a>),
    {
        debug_assert!(start.data >= end.data);
        for at in (end.data..start.data).rev() {
            visitor(self.chunk.refs(at));
        }
    }

    pub fn for_each_forward<'a, F>(
        &'a self,
        start: &BlockPosition<N::Position>,
        end: &BlockPosition<N::Position>,
        mut visitor: F,
    ) where
        F: FnMut(R::Refs<'a>),
    {
        debug_assert!(start.data <= end.data);
        for at in start.data..end.data {
            visitor(self.chunk.refs(at));
        }
    }
}

impl<R: Record, N: NestedLog> NestedLog for SingleChunkVector<R, N> {
    type Position = BlockPosition<N::Position>;
    type Frames<'a, A> = N::Frames<'a, (A, Segment<'a, R>)> where Self: 'a;

    fn position(&self) -> BlockPosition<N::Position> {
        BlockPosition {
            data: self.chunk.used_size(),
            inner: self.nested.position(),
        }
    }

    fn zero_position(&self) -> BlockPosition<N::Position> {
        BlockPosition {
            data: 0,
            inner: self.nested.zero_position(),
        }
    }

    fn reset_to(&mut self, position: &BlockPosition<N::Position>) {
        debug_assert!(
            position.data <= self.chunk.used_size(),
            "reset target {position} is ahead of the current head"
        );
        self.chunk.set_used_size(position.data);
        self.nested.reset_to(&position.inner);
    }

    fn reset_hard(&mut self) {
        log::debug!(
            "releasing single chunk of {} items, back to {}",
            self.chunk.size(),
            self.initial_size
        );
        self.chunk.resize(self.initial_size);
        self.nested.reset_hard();
    }

    fn evaluate_reverse<'a, A, F>(
        &'a self,
        start: &BlockPosition<N::Position>,
        end: &BlockPosition<N::Position>,
        frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        debug_assert!(start >= end, "reverse evaluation from {start} to {end} runs backwards");

        let segment = Segment::new(self.chunk.slices(), start.data, end.data);
        let (frames, segment) =
            self.nested
                .evaluate_reverse(&start.inner, &end.inner, (frames, segment), f);

        debug_assert_eq!(
            segment.cursor, segment.end,
            "reverse evaluation stopped at record {} instead of {}",
            segment.cursor, segment.end
        );

        frames
    }

    fn evaluate_forward<'a, A, F>(
        &'a self,
        start: &BlockPosition<N::Position>,
        end: &BlockPosition<N::Position>,
        frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        debug_assert!(start <= end, "forward evaluation from {start} to {end} runs backwards");

        let segment = Segment::new(self.chunk.slices(), start.data, end.data);
        let (frames, segment) =
            self.nested
                .evaluate_forward(&start.inner, &end.inner, (frames, segment), f);

        debug_assert_eq!(
            segment.cursor, segment.end,
            "forward evaluation stopped at record {} instead of {}",
            segment.cursor, segment.end
        );

        frames
    }
}
