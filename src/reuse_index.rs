use crate::index_handler::index_overflow;
use crate::{Index, IndexHandler, UNTRACKED};

#[cfg(feature = "runtime_validation")]
use crate::debug_history::DebugHistory;

/// Identifier allocator that recycles freed identifiers.
///
/// Freed identifiers go to `used_indices` and are handed out again
/// before anything else, newest first, which keeps the gradient slots
/// in use close together. `unused_indices` holds identifiers that were
/// never handed out; it is refilled in batches of `batch_size` above
/// the global maximum.
#[derive(Debug)]
pub struct ReuseIndexHandler {
    used_indices: Vec<Index>,
    unused_indices: Vec<Index>,
    global_maximum_index: Index,
    batch_size: Index,
    sort_on_reset: bool,
    valid: bool,
    #[cfg(feature = "runtime_validation")]
    history: DebugHistory,
}

impl Default for ReuseIndexHandler {
    fn default() -> ReuseIndexHandler {
        ReuseIndexHandler::new(crate::Config::default().reuse_batch_size)
    }
}

impl ReuseIndexHandler {
    pub fn new(batch_size: Index) -> ReuseIndexHandler {
        assert_ne!(batch_size, 0, "identifier batches must not be empty");
        ReuseIndexHandler {
            used_indices: vec![],
            unused_indices: vec![],
            global_maximum_index: UNTRACKED,
            batch_size,
            sort_on_reset: true,
            valid: true,
            #[cfg(feature = "runtime_validation")]
            history: DebugHistory::default(),
        }
    }

    /// Whether `reset` sorts the recycled identifiers so that the
    /// lowest ones are handed out first.
    pub fn sort_on_reset(mut self, sort_on_reset: bool) -> ReuseIndexHandler {
        self.sort_on_reset = sort_on_reset;
        self
    }

    pub fn batch_size(&self) -> Index {
        self.batch_size
    }

    /// Number of freed identifiers waiting to be reused.
    pub fn used_count(&self) -> usize {
        self.used_indices.len()
    }

    /// Number of never handed out identifiers waiting in the pool.
    pub fn unused_count(&self) -> usize {
        self.unused_indices.len()
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Marks the handler as torn down. Values that outlive it may still
    /// free their identifiers, which is then silently ignored.
    pub fn retire(&mut self) {
        log::debug!(
            "retiring reuse index handler with maximum identifier {}",
            self.global_maximum_index
        );
        self.valid = false;
        self.used_indices = vec![];
        self.unused_indices = vec![];
    }

    fn generate_batch(&mut self) {
        let first = self.global_maximum_index + 1;
        let last = match self.global_maximum_index.checked_add(self.batch_size) {
            Some(last) => last,
            None => index_overflow(self.global_maximum_index, self.batch_size),
        };

        log::trace!("generating unused identifiers {}..={}", first, last);

        // descending, so that popping hands them out in ascending order
        self.unused_indices.extend((first..=last).rev());
        self.global_maximum_index = last;
    }

    fn draw_unused(&mut self) -> Index {
        if self.unused_indices.is_empty() {
            self.generate_batch();
        }

        match self.unused_indices.pop() {
            Some(index) => index,
            None => unreachable!("a freshly generated batch is never empty"),
        }
    }

    fn mark_create(&mut self, index: Index) -> Index {
        #[cfg(feature = "runtime_validation")]
        self.history.mark_create(index);
        index
    }
}

impl IndexHandler for ReuseIndexHandler {
    type Checkpoint = ();

    #[inline]
    fn create_index(&mut self) -> Index {
        let index = match self.used_indices.pop() {
            Some(index) => index,
            None => self.draw_unused(),
        };
        self.mark_create(index)
    }

    #[inline]
    fn create_unused_index(&mut self) -> Index {
        let index = self.draw_unused();
        self.mark_create(index)
    }

    #[inline]
    fn free_index(&mut self, index: &mut Index) {
        if self.valid && *index != UNTRACKED {
            debug_assert!(
                *index <= self.global_maximum_index,
                "identifier {} was never handed out",
                *index
            );

            #[cfg(feature = "runtime_validation")]
            self.history.mark_free(*index);

            self.used_indices.push(*index);
        }
        *index = UNTRACKED;
    }

    /// Moves every freed identifier back into the unused pool. Live
    /// identifiers stay live and the global maximum is kept.
    fn reset(&mut self) {
        log::debug!(
            "reuse index handler reset, recycling {} freed identifiers",
            self.used_indices.len()
        );

        self.unused_indices.append(&mut self.used_indices);

        if self.sort_on_reset {
            self.unused_indices.sort_unstable_by(|a, b| b.cmp(a));
        }
    }

    fn maximum_global_index(&self) -> Index {
        self.global_maximum_index
    }

    fn checkpoint(&self) {}

    fn zero_checkpoint(&self) {}

    fn restore(&mut self, _checkpoint: &()) {}
}

/// A `ReuseIndexHandler` that counts references per identifier so that
/// plain copies can share the source identifier instead of recording a
/// statement.
///
/// An identifier only goes back to the recycling list once its last
/// reference is freed.
#[derive(Debug, Default)]
pub struct MultiUseIndexHandler {
    reuse: ReuseIndexHandler,
    index_use: Vec<u32>,
}

impl MultiUseIndexHandler {
    pub fn new(batch_size: Index) -> MultiUseIndexHandler {
        MultiUseIndexHandler {
            reuse: ReuseIndexHandler::new(batch_size),
            index_use: vec![],
        }
    }

    pub fn sort_on_reset(mut self, sort_on_reset: bool) -> MultiUseIndexHandler {
        self.reuse = self.reuse.sort_on_reset(sort_on_reset);
        self
    }

    /// Outstanding references to `index`.
    pub fn use_count(&self, index: Index) -> u32 {
        self.index_use.get(index as usize).copied().unwrap_or(0)
    }

    pub fn used_count(&self) -> usize {
        self.reuse.used_count()
    }

    pub fn unused_count(&self) -> usize {
        self.reuse.unused_count()
    }

    pub fn is_valid(&self) -> bool {
        self.reuse.is_valid()
    }

    pub fn retire(&mut self) {
        self.reuse.retire();
        self.index_use = vec![];
    }

    fn track(&mut self, index: Index) -> Index {
        let slot = index as usize;
        if slot >= self.index_use.len() {
            // grow to cover the whole batch the identifier came from
            let len = (self.reuse.maximum_global_index() as usize + 1).max(slot + 1);
            self.index_use.resize(len, 0);
        }
        self.index_use[slot] = 1;
        index
    }
}

impl IndexHandler for MultiUseIndexHandler {
    const COPY_OPTIMIZATION: bool = true;

    type Checkpoint = ();

    #[inline]
    fn create_index(&mut self) -> Index {
        let index = self.reuse.create_index();
        self.track(index)
    }

    #[inline]
    fn create_unused_index(&mut self) -> Index {
        let index = self.reuse.create_unused_index();
        self.track(index)
    }

    #[inline]
    fn free_index(&mut self, index: &mut Index) {
        if self.reuse.is_valid() && *index != UNTRACKED {
            let count = &mut self.index_use[*index as usize];
            debug_assert_ne!(*count, 0, "identifier {} freed more often than used", *index);
            *count -= 1;

            if *count == 0 {
                self.reuse.free_index(index);
            }
        }
        *index = UNTRACKED;
    }

    /// Keeps an identifier that nothing else refers to, otherwise
    /// draws a new one.
    fn assign_index(&mut self, index: &mut Index) -> bool {
        if *index != UNTRACKED && self.reuse.is_valid() && self.use_count(*index) == 1 {
            return false;
        }

        self.free_index(index);
        *index = self.create_index();
        true
    }

    fn copy_index(&mut self, lhs: &mut Index, rhs: Index) {
        // count first, `lhs` and `rhs` may be the same identifier
        if rhs != UNTRACKED && self.reuse.is_valid() {
            self.index_use[rhs as usize] += 1;
        }
        self.free_index(lhs);
        *lhs = rhs;
    }

    fn reset(&mut self) {
        self.reuse.reset();
    }

    fn maximum_global_index(&self) -> Index {
        self.reuse.maximum_global_index()
    }

    fn checkpoint(&self) {}

    fn zero_checkpoint(&self) {}

    fn restore(&mut self, _checkpoint: &()) {}
}
