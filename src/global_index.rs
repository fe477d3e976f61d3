use std::cell::Cell;
use std::ops::{Deref, Range};
use std::sync::atomic::{AtomicU32, Ordering::SeqCst};

use crate::debug_delay::debug_delay;
use crate::index_handler::index_overflow;
use crate::{Error, Index, IndexHandler, Result, UNTRACKED};

/// A shared identifier space that hands out contiguous batches.
pub trait IndexSource {
    /// Number of identifiers claimed per `get_range` call.
    fn range_size(&self) -> Index;

    /// Claims the next `range_size()` identifiers, or reports that the
    /// identifier space is exhausted. A failed claim changes nothing.
    fn try_get_range(&self) -> Result<Range<Index>>;

    /// Highest identifier claimed so far.
    fn maximum_global_index(&self) -> Index;

    /// Claims the next batch. Exhausting the identifier space is fatal.
    fn get_range(&self) -> Range<Index> {
        self.try_get_range()
            .unwrap_or_else(|_| index_overflow(self.maximum_global_index(), self.range_size()))
    }
}

fn next_claim(claimed: Index, range_size: Index) -> Option<Index> {
    // the exclusive end of the range has to be representable as well
    claimed
        .checked_add(range_size)
        .filter(|last| *last < Index::MAX)
}

/// Identifier space for tapes living on one thread.
#[derive(Debug)]
pub struct GlobalIndexCounter {
    claimed: Cell<Index>,
    range_size: Index,
}

impl GlobalIndexCounter {
    pub fn new(range_size: Index) -> GlobalIndexCounter {
        assert_ne!(range_size, 0, "identifier ranges must not be empty");
        GlobalIndexCounter {
            claimed: Cell::new(UNTRACKED),
            range_size,
        }
    }
}

impl IndexSource for GlobalIndexCounter {
    fn range_size(&self) -> Index {
        self.range_size
    }

    fn try_get_range(&self) -> Result<Range<Index>> {
        let claimed = self.claimed.get();
        let last = next_claim(claimed, self.range_size).ok_or(Error::IndexOverflow {
            maximum: claimed,
            requested: self.range_size,
        })?;

        self.claimed.set(last);
        Ok(claimed + 1..last + 1)
    }

    fn maximum_global_index(&self) -> Index {
        self.claimed.get()
    }
}

/// Identifier space shared by tapes on several threads. Claims are a
/// single compare-and-swap loop on one atomic counter.
#[derive(Debug)]
pub struct AtomicGlobalIndexCounter {
    claimed: AtomicU32,
    range_size: Index,
}

impl AtomicGlobalIndexCounter {
    pub fn new(range_size: Index) -> AtomicGlobalIndexCounter {
        assert_ne!(range_size, 0, "identifier ranges must not be empty");
        AtomicGlobalIndexCounter {
            claimed: AtomicU32::new(UNTRACKED),
            range_size,
        }
    }
}

impl IndexSource for AtomicGlobalIndexCounter {
    fn range_size(&self) -> Index {
        self.range_size
    }

    fn try_get_range(&self) -> Result<Range<Index>> {
        let range_size = self.range_size;

        let claim = self.claimed.fetch_update(SeqCst, SeqCst, |claimed| {
            debug_delay();
            next_claim(claimed, range_size)
        });

        match claim {
            Ok(claimed) => {
                log::trace!(
                    "claimed identifiers {}..{}",
                    claimed + 1,
                    claimed + 1 + range_size
                );
                Ok(claimed + 1..claimed + 1 + range_size)
            }
            Err(claimed) => Err(Error::IndexOverflow {
                maximum: claimed,
                requested: range_size,
            }),
        }
    }

    fn maximum_global_index(&self) -> Index {
        self.claimed.load(SeqCst)
    }
}

/// Monotonic identifier allocator drawing batches from a shared
/// `IndexSource`.
///
/// `P` is the sharing handle, `Rc<GlobalIndexCounter>` for a single
/// thread or `Arc<AtomicGlobalIndexCounter>` across threads. Identifiers
/// are never recycled and rewinding a tape does not give them back,
/// other tapes may have claimed the following ranges already.
#[derive(Debug, Clone)]
pub struct GlobalIndexHandler<P> {
    source: P,
    next: Index,
    end: Index,
}

impl<P> GlobalIndexHandler<P>
where
    P: Deref,
    P::Target: IndexSource,
{
    pub fn new(source: P) -> GlobalIndexHandler<P> {
        GlobalIndexHandler {
            source,
            next: UNTRACKED,
            end: UNTRACKED,
        }
    }

    pub fn source(&self) -> &P::Target {
        &self.source
    }

    /// Identifiers left in the currently claimed range.
    pub fn remaining_in_range(&self) -> Index {
        self.end - self.next
    }
}

impl<P> IndexHandler for GlobalIndexHandler<P>
where
    P: Deref,
    P::Target: IndexSource,
{
    const RECYCLES_INDICES: bool = false;

    type Checkpoint = ();

    #[inline]
    fn create_index(&mut self) -> Index {
        if self.next == self.end {
            let range = self.source.get_range();
            self.next = range.start;
            self.end = range.end;
        }

        let index = self.next;
        self.next += 1;
        index
    }

    #[inline]
    fn create_unused_index(&mut self) -> Index {
        self.create_index()
    }

    #[inline]
    fn free_index(&mut self, index: &mut Index) {
        *index = UNTRACKED;
    }

    fn reset(&mut self) {}

    fn maximum_global_index(&self) -> Index {
        self.source.maximum_global_index()
    }

    fn checkpoint(&self) {}

    fn zero_checkpoint(&self) {}

    fn restore(&mut self, _checkpoint: &()) {}
}
