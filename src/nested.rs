use std::fmt::Debug;

use crate::Record;

/// One level of a stack of logs that are recorded and replayed together.
///
/// Every `ChunkVector` sits on top of exactly one nested log. When the
/// vector rolls over to a new chunk it remembers the position the nested
/// log had reached, which is what lets `evaluate_reverse` and
/// `evaluate_forward` walk all levels in lock-step.
///
/// Traversal accumulates one `Segment` per level. A stack such as
/// `ChunkVector<J, ChunkVector<S, EmptyLog>>` hands the evaluator frames
/// of the shape `((A, Segment<J>), Segment<S>)`, outermost level first.
pub trait NestedLog {
    /// Hierarchical checkpoint of this level and everything below it.
    type Position: Copy + Ord + Debug + Default;

    /// What the evaluator receives, given the frames `A` accumulated by
    /// the levels above.
    type Frames<'a, A>
    where
        Self: 'a;

    fn position(&self) -> Self::Position;

    fn zero_position(&self) -> Self::Position;

    /// Discards everything recorded at or after `position`, on this
    /// level and all levels below.
    fn reset_to(&mut self, position: &Self::Position);

    /// Like `reset_to(zero_position())` but also releases memory.
    fn reset_hard(&mut self);

    /// Replays `[end, start)` newest record first. `start >= end`.
    fn evaluate_reverse<'a, A, F>(
        &'a self,
        start: &Self::Position,
        end: &Self::Position,
        frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>);

    /// Replays `[start, end)` oldest record first. `start <= end`.
    fn evaluate_forward<'a, A, F>(
        &'a self,
        start: &Self::Position,
        end: &Self::Position,
        frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>);
}

/// The part of one chunk a traversal step covers, handed to the
/// evaluator.
///
/// `data` covers every used record of the chunk. The evaluator consumes
/// records by moving `cursor` towards `end`: downwards in reverse
/// traversals (the next record is `cursor - 1`), upwards in forward ones
/// (the next record is `cursor`). When the evaluator returns, `cursor`
/// must equal `end`.
pub struct Segment<'a, R: Record + 'a> {
    pub data: R::Slices<'a>,
    pub cursor: usize,
    pub end: usize,
}

impl<'a, R: Record + 'a> Segment<'a, R> {
    pub(crate) fn new(data: R::Slices<'a>, cursor: usize, end: usize) -> Segment<'a, R> {
        Segment { data, cursor, end }
    }

    /// Records left between `cursor` and `end`.
    pub fn remaining(&self) -> usize {
        self.cursor.abs_diff(self.end)
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == self.end
    }
}

impl<'a, R: Record + 'a> Debug for Segment<'a, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Segment")
            .field("cursor", &self.cursor)
            .field("end", &self.end)
            .finish()
    }
}

/// The bottom of a stack of logs. Records nothing and has the unit
/// position.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmptyLog;

impl NestedLog for EmptyLog {
    type Position = ();
    type Frames<'a, A> = A where Self: 'a;

    fn position(&self) {}

    fn zero_position(&self) {}

    fn reset_to(&mut self, _position: &()) {}

    fn reset_hard(&mut self) {}

    fn evaluate_reverse<'a, A, F>(&'a self, _start: &(), _end: &(), mut frames: A, f: &mut F) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        f(&mut frames);
        frames
    }

    fn evaluate_forward<'a, A, F>(&'a self, _start: &(), _end: &(), mut frames: A, f: &mut F) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        f(&mut frames);
        frames
    }
}
