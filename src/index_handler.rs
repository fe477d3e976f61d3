use std::fmt::Debug;

use crate::NestedLog;

/// Identifier of a tracked value, which is also the address of its
/// gradient slot. `0` means "not tracked" and is never handed out.
pub type Index = u32;

/// The identifier that marks passive values.
pub const UNTRACKED: Index = 0;

/// Allocator for the identifiers stored in the logs.
///
/// Identifiers are passed as `&mut Index` where the handler retires or
/// replaces the value an identifier variable holds, so that a freed
/// variable always ends up `UNTRACKED`.
pub trait IndexHandler {
    /// Whether `copy_index` lets the copy share the source identifier
    /// instead of asking the tape to record a statement.
    const COPY_OPTIMIZATION: bool = false;

    /// Whether freed identifiers are handed out again within a recording.
    /// Reverse evaluation then clears the gradient slot of every left hand
    /// side it processes, since the slot belongs to an earlier value.
    const RECYCLES_INDICES: bool = true;

    /// Part of the allocator state that follows tape rewinds.
    type Checkpoint: Copy + Ord + Debug + Default;

    /// Hands out an identifier, preferring recycled ones.
    fn create_index(&mut self) -> Index;

    /// Hands out an identifier that was not handed out before in this
    /// recording. Used for inputs.
    fn create_unused_index(&mut self) -> Index;

    /// Retires `index` and sets it to `UNTRACKED`. Freeing `UNTRACKED`
    /// is a no-op.
    fn free_index(&mut self, index: &mut Index);

    /// Gives `index` an identifier for a value that is about to be
    /// assigned by a new statement. Returns whether a new identifier
    /// was drawn.
    fn assign_index(&mut self, index: &mut Index) -> bool {
        self.free_index(index);
        *index = self.create_index();
        true
    }

    /// Like `assign_index` but the new identifier was never handed out
    /// before in this recording.
    fn assign_unused_index(&mut self, index: &mut Index) -> bool {
        self.free_index(index);
        *index = self.create_unused_index();
        true
    }

    /// Makes `lhs` a copy of `rhs`. Without copy optimization this just
    /// assigns a new identifier to `lhs` and the tape records the copy
    /// as a statement.
    fn copy_index(&mut self, lhs: &mut Index, rhs: Index) {
        let _ = rhs;
        self.assign_index(lhs);
    }

    /// Called when the whole recording is cleared.
    fn reset(&mut self);

    /// Largest identifier ever handed out.
    fn maximum_global_index(&self) -> Index;

    fn checkpoint(&self) -> Self::Checkpoint;

    fn zero_checkpoint(&self) -> Self::Checkpoint;

    /// Rewinds the state captured by `checkpoint`.
    fn restore(&mut self, checkpoint: &Self::Checkpoint);
}

/// Reports identifier exhaustion and aborts. No identifier space is
/// large enough for recovery to be meaningful.
#[cold]
pub(crate) fn index_overflow(maximum: Index, requested: Index) -> ! {
    let error = crate::Error::IndexOverflow { maximum, requested };
    log::error!("{}", error);
    panic!("{}", error);
}

/// Puts an `IndexHandler` at the bottom of a stack of logs so that
/// rewinding the logs also rewinds identifier allocation.
#[derive(Debug, Default, Clone)]
pub struct IndexLog<H> {
    handler: H,
}

impl<H: IndexHandler> IndexLog<H> {
    pub fn new(handler: H) -> IndexLog<H> {
        IndexLog { handler }
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

impl<H: IndexHandler> NestedLog for IndexLog<H> {
    type Position = H::Checkpoint;
    type Frames<'a, A> = A where Self: 'a;

    fn position(&self) -> H::Checkpoint {
        self.handler.checkpoint()
    }

    fn zero_position(&self) -> H::Checkpoint {
        self.handler.zero_checkpoint()
    }

    fn reset_to(&mut self, position: &H::Checkpoint) {
        self.handler.restore(position);
    }

    fn reset_hard(&mut self) {
        let zero = self.handler.zero_checkpoint();
        self.handler.restore(&zero);
    }

    fn evaluate_reverse<'a, A, F>(
        &'a self,
        _start: &H::Checkpoint,
        _end: &H::Checkpoint,
        mut frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        f(&mut frames);
        frames
    }

    fn evaluate_forward<'a, A, F>(
        &'a self,
        _start: &H::Checkpoint,
        _end: &H::Checkpoint,
        mut frames: A,
        f: &mut F,
    ) -> A
    where
        F: FnMut(&mut Self::Frames<'a, A>),
    {
        f(&mut frames);
        frames
    }
}
