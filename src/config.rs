use crate::{
    AtomicGlobalIndexCounter, Error, GlobalIndexCounter, Index, IndexHandler, JacobianTape,
    LinearIndexHandler, MultiUseIndexHandler, Result, ReuseIndexHandler,
};

/// Configuration for tapes and the identifier allocators they use.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Records per chunk of the statement and Jacobian logs. A single
    /// statement must fit into one chunk, so this has to be at least
    /// the largest number of operands of any statement.
    pub chunk_size: usize,
    /// External functions per chunk.
    pub external_function_chunk_size: usize,
    /// How many fresh identifiers a reuse handler generates at once when
    /// its pools run dry.
    pub reuse_batch_size: Index,
    /// How many identifiers a global counter hands out per claim.
    pub global_range_size: Index,
    /// Sort recycled identifiers on a full tape reset so that the lowest
    /// ones are handed out first, which keeps gradient accesses of the
    /// next recording dense.
    pub sort_indices_on_reset: bool,
    /// Drop operands whose Jacobian is exactly zero instead of recording
    /// them.
    pub skip_zero_jacobians: bool,
    /// Drop operands whose Jacobian is infinite or NaN instead of
    /// recording them.
    pub skip_invalid_jacobians: bool,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            chunk_size: 2 * 1024 * 1024,
            external_function_chunk_size: 1000,
            reuse_batch_size: 1024,
            global_range_size: 1024,
            sort_indices_on_reset: true,
            skip_zero_jacobians: true,
            skip_invalid_jacobians: false,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("Config's chunk_size must be non-zero"));
        }

        if self.external_function_chunk_size == 0 {
            return Err(Error::InvalidConfig(
                "Config's external_function_chunk_size must be non-zero",
            ));
        }

        if self.reuse_batch_size == 0 {
            return Err(Error::InvalidConfig(
                "Config's reuse_batch_size must be non-zero",
            ));
        }

        if self.global_range_size == 0 {
            return Err(Error::InvalidConfig(
                "Config's global_range_size must be non-zero",
            ));
        }

        Ok(())
    }

    /// Builds an empty, passive tape on top of `handler`.
    pub fn tape<H: IndexHandler>(&self, handler: H) -> Result<JacobianTape<H>> {
        self.validate()?;
        Ok(JacobianTape::with_config(self.clone(), handler))
    }

    pub fn reuse_index_handler(&self) -> ReuseIndexHandler {
        ReuseIndexHandler::new(self.reuse_batch_size).sort_on_reset(self.sort_indices_on_reset)
    }

    pub fn multi_use_index_handler(&self) -> MultiUseIndexHandler {
        MultiUseIndexHandler::new(self.reuse_batch_size).sort_on_reset(self.sort_indices_on_reset)
    }

    pub fn linear_index_handler(&self) -> LinearIndexHandler {
        LinearIndexHandler::new(0)
    }

    /// A counter for tapes on a single thread, to be shared through an
    /// `Rc` with `GlobalIndexHandler::new`.
    pub fn global_index_counter(&self) -> GlobalIndexCounter {
        GlobalIndexCounter::new(self.global_range_size)
    }

    /// A counter for tapes on several threads, to be shared through an
    /// `Arc` with `GlobalIndexHandler::new`.
    pub fn atomic_global_index_counter(&self) -> AtomicGlobalIndexCounter {
        AtomicGlobalIndexCounter::new(self.global_range_size)
    }
}
