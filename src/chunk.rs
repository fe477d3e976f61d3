use crate::{ChunkFile, Result};

/// The shape of one log record: a tuple of one to four column values.
///
/// Every column lives in its own buffer, so a record such as
/// `(f64, Index)` is stored as a `Vec<f64>` next to a `Vec<Index>`.
/// Traversal hands out one slice per column through `Slices`.
pub trait Record: Sized {
    /// Number of parallel columns.
    const COLUMNS: usize;

    /// One buffer per column.
    type Storage;

    /// One shared slice per column.
    type Slices<'a>: Copy
    where
        Self: 'a;

    /// One shared reference per column, for a single record.
    type Refs<'a>
    where
        Self: 'a;

    /// One unique reference per column, for a single record.
    type RefsMut<'a>
    where
        Self: 'a;

    fn allocate(size: usize) -> Self::Storage;

    /// Extends every column to `size` elements, keeping existing values.
    fn grow(storage: &mut Self::Storage, size: usize);

    fn store(storage: &mut Self::Storage, at: usize, record: Self);

    fn slices<'a>(storage: &'a Self::Storage, len: usize) -> Self::Slices<'a>
    where
        Self: 'a;

    fn refs<'a>(storage: &'a Self::Storage, at: usize) -> Self::Refs<'a>
    where
        Self: 'a;

    fn refs_mut<'a>(storage: &'a mut Self::Storage, at: usize) -> Self::RefsMut<'a>
    where
        Self: 'a;
}

/// Records whose columns are plain old data and can therefore be dumped
/// to a `ChunkFile` byte for byte.
pub trait RawRecord: Record {
    fn write_storage(storage: &Self::Storage, file: &mut ChunkFile) -> Result<()>;

    /// Reads `size` elements per column into freshly allocated storage.
    fn read_storage(size: usize, file: &mut ChunkFile) -> Result<Self::Storage>;
}

macro_rules! impl_record {
    ($count:expr; $($column:ident : $idx:tt),+) => {
        impl<$($column),+> Record for ($($column,)+)
        where
            $($column: Default),+
        {
            const COLUMNS: usize = $count;

            type Storage = ($(Vec<$column>,)+);
            type Slices<'a> = ($(&'a [$column],)+) where Self: 'a;
            type Refs<'a> = ($(&'a $column,)+) where Self: 'a;
            type RefsMut<'a> = ($(&'a mut $column,)+) where Self: 'a;

            fn allocate(size: usize) -> Self::Storage {
                ($(
                    {
                        let mut column: Vec<$column> = Vec::with_capacity(size);
                        column.resize_with(size, Default::default);
                        column
                    },
                )+)
            }

            fn grow(storage: &mut Self::Storage, size: usize) {
                $(
                    storage.$idx.resize_with(size, Default::default);
                )+
            }

            #[inline]
            fn store(storage: &mut Self::Storage, at: usize, record: Self) {
                $(
                    storage.$idx[at] = record.$idx;
                )+
            }

            #[inline]
            fn slices<'a>(storage: &'a Self::Storage, len: usize) -> Self::Slices<'a>
            where
                Self: 'a,
            {
                ($(&storage.$idx[..len],)+)
            }

            #[inline]
            fn refs<'a>(storage: &'a Self::Storage, at: usize) -> Self::Refs<'a>
            where
                Self: 'a,
            {
                ($(&storage.$idx[at],)+)
            }

            #[inline]
            fn refs_mut<'a>(storage: &'a mut Self::Storage, at: usize) -> Self::RefsMut<'a>
            where
                Self: 'a,
            {
                ($(&mut storage.$idx[at],)+)
            }
        }

        impl<$($column),+> RawRecord for ($($column,)+)
        where
            $($column: Default + bytemuck::Pod),+
        {
            fn write_storage(storage: &Self::Storage, file: &mut ChunkFile) -> Result<()> {
                $(
                    file.write_bytes(bytemuck::cast_slice(&storage.$idx[..]))?;
                )+
                Ok(())
            }

            fn read_storage(size: usize, file: &mut ChunkFile) -> Result<Self::Storage> {
                let mut storage = Self::allocate(size);
                $(
                    file.read_bytes(bytemuck::cast_slice_mut(&mut storage.$idx[..]))?;
                )+
                Ok(storage)
            }
        }
    };
}

impl_record!(1; A: 0);
impl_record!(2; A: 0, B: 1);
impl_record!(3; A: 0, B: 1, C: 2);
impl_record!(4; A: 0, B: 1, C: 2, D: 3);

/// A fixed-capacity block of parallel record columns.
///
/// `size` slots are allocated up front. Only the first `used_size` of
/// them hold records of the current recording; the rest keep whatever a
/// previous recording left behind.
pub struct Chunk<R: Record> {
    storage: R::Storage,
    size: usize,
    used_size: usize,
}

impl<R: Record> std::fmt::Debug for Chunk<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("columns", &R::COLUMNS)
            .field("size", &self.size)
            .field("used_size", &self.used_size)
            .finish()
    }
}

impl<R: Record> Chunk<R> {
    pub fn new(size: usize) -> Chunk<R> {
        Chunk {
            storage: R::allocate(size),
            size,
            used_size: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn used_size(&self) -> usize {
        self.used_size
    }

    pub fn unused_size(&self) -> usize {
        self.size - self.used_size
    }

    /// Appends `record` at `used_size`. The caller must have reserved
    /// room for it.
    #[inline]
    pub fn push(&mut self, record: R) {
        debug_assert!(
            self.used_size < self.size,
            "push into a full chunk of size {}, reserve items first",
            self.size
        );
        R::store(&mut self.storage, self.used_size, record);
        self.used_size += 1;
    }

    /// Forgets all records. Buffers are kept.
    pub fn reset(&mut self) {
        self.used_size = 0;
    }

    pub fn set_used_size(&mut self, used_size: usize) {
        debug_assert!(
            used_size <= self.size,
            "used size {used_size} is beyond the chunk size {}",
            self.size
        );
        self.used_size = used_size;
    }

    /// Drops all columns and reallocates them with `size` slots.
    /// Meant for one-time pre-sizing, the contents are lost.
    pub fn resize(&mut self, size: usize) {
        self.storage = R::allocate(size);
        self.size = size;
        self.used_size = 0;
    }

    /// Extends the capacity to `size` slots keeping all records.
    pub fn grow(&mut self, size: usize) {
        if size > self.size {
            R::grow(&mut self.storage, size);
            self.size = size;
        }
    }

    /// Hook point for paging a finished chunk out. Called at rollover.
    pub fn store(&self) {
        log::trace!("chunk with {} of {} records stored", self.used_size, self.size);
    }

    /// One slice per column covering the used records.
    #[inline]
    pub fn slices(&self) -> R::Slices<'_> {
        R::slices(&self.storage, self.used_size)
    }

    #[inline]
    pub fn refs(&self, at: usize) -> R::Refs<'_> {
        debug_assert!(at < self.used_size);
        R::refs(&self.storage, at)
    }

    #[inline]
    pub fn refs_mut(&mut self, at: usize) -> R::RefsMut<'_> {
        debug_assert!(at < self.used_size);
        R::refs_mut(&mut self.storage, at)
    }
}

impl<R: RawRecord> Chunk<R> {
    /// Writes the full capacity of every column to `file`, independent
    /// of how many slots are in use.
    pub fn write_data(&self, file: &mut ChunkFile) -> Result<()> {
        R::write_storage(&self.storage, file)?;
        log::trace!(
            "wrote {} slots of {} columns to {:?}",
            self.size,
            R::COLUMNS,
            file.path()
        );
        Ok(())
    }

    /// Reads the full capacity of every column from `file`. On failure
    /// the chunk keeps its previous contents. `used_size` is untouched,
    /// callers restore it with `set_used_size`.
    pub fn read_data(&mut self, file: &mut ChunkFile) -> Result<()> {
        let storage = R::read_storage(self.size, file)?;
        self.storage = storage;
        log::trace!(
            "read {} slots of {} columns from {:?}",
            self.size,
            R::COLUMNS,
            file.path()
        );
        Ok(())
    }
}
