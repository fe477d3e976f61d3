use crate::index_handler::index_overflow;
use crate::{Index, IndexHandler, UNTRACKED};

/// Monotonic identifier allocator whose state follows the tape.
///
/// Every assignment draws the next identifier, nothing is ever recycled
/// and rewinding the tape to a position rewinds the counter with it, so
/// identifiers issued after that position are handed out again.
/// Identifiers `1..=reserved` are never handed out.
#[derive(Debug, Default, Clone)]
pub struct LinearIndexHandler {
    reserved: Index,
    count: Index,
}

impl LinearIndexHandler {
    pub fn new(reserved: Index) -> LinearIndexHandler {
        LinearIndexHandler {
            reserved,
            count: reserved,
        }
    }

    pub fn reserved(&self) -> Index {
        self.reserved
    }
}

impl IndexHandler for LinearIndexHandler {
    const RECYCLES_INDICES: bool = false;

    type Checkpoint = Index;

    #[inline]
    fn create_index(&mut self) -> Index {
        self.count = match self.count.checked_add(1) {
            Some(next) => next,
            None => index_overflow(self.count, 1),
        };
        self.count
    }

    #[inline]
    fn create_unused_index(&mut self) -> Index {
        self.create_index()
    }

    #[inline]
    fn free_index(&mut self, index: &mut Index) {
        *index = UNTRACKED;
    }

    fn reset(&mut self) {
        log::debug!(
            "linear index handler reset from {} back to {}",
            self.count,
            self.reserved
        );
        self.count = self.reserved;
    }

    fn maximum_global_index(&self) -> Index {
        self.count
    }

    fn checkpoint(&self) -> Index {
        self.count
    }

    fn zero_checkpoint(&self) -> Index {
        self.reserved
    }

    fn restore(&mut self, checkpoint: &Index) {
        debug_assert!(
            *checkpoint >= self.reserved && *checkpoint <= self.count,
            "identifier checkpoint {checkpoint} outside of {}..={}",
            self.reserved,
            self.count
        );
        self.count = *checkpoint;
    }
}
