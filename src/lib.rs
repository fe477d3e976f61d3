//! # chunktape
//!
//! chunktape is the recording substrate of a reverse-mode automatic
//! differentiation tool. It stores what a program computed in
//! append-only logs and replays those logs backwards (or forwards)
//! to propagate derivatives.
//!
//! Logs are kept in fixed-size chunks so that appending never moves
//! data that was already recorded. A `ChunkVector` sits on top of a
//! nested log and, whenever it rolls over to a new chunk, remembers how
//! far the nested log had come. That is what allows several logs
//! recorded together to be checkpointed with one `ChunkPosition`,
//! rewound together with `reset_to`, and replayed together in lock-step
//! by `evaluate_reverse` and `evaluate_forward`.
//!
//! The innermost layer of every stack is an `IndexHandler`, the
//! allocator of the identifiers that name tracked values and address
//! their gradient slots. Four strategies are provided:
//! `LinearIndexHandler` (monotonic, rewinds with the tape),
//! `GlobalIndexHandler` (monotonic, batches claimed from a counter shared
//! between tapes and threads), `ReuseIndexHandler` (recycles freed
//! identifiers) and `MultiUseIndexHandler` (recycling plus reference
//! counts, so plain copies share identifiers).
//!
//! `JacobianTape` puts it all together: a statement log and a Jacobian
//! log over an index handler, with external functions as the outermost
//! layer.
//!
//! chunktape does not overload any operators and knows no derivative
//! formulas. A front end computes the partial derivatives of every
//! statement and records them with `JacobianTape::push_statement`.
//!
//! # Examples
//!
//! A single log of `(f64, u32)` records over no nested log:
//!
//! ```
//! use chunktape::{ChunkVector, EmptyLog, NestedLog};
//!
//! let mut log: ChunkVector<(f64, u32), EmptyLog> = ChunkVector::new(1, EmptyLog);
//!
//! log.reserve_items(1);
//! log.push((2.0, 5));
//! let checkpoint = log.position();
//!
//! log.reserve_items(1);
//! log.push((3.0, 7));
//! assert_eq!(log.chunk_count(), 2);
//!
//! let mut seen = vec![];
//! log.for_each_reverse(&log.position(), &log.zero_position(), |(value, id)| {
//!     seen.push((*value, *id))
//! });
//! assert_eq!(seen, vec![(3.0, 7), (2.0, 5)]);
//!
//! // forget everything recorded after the checkpoint
//! log.reset_to(&checkpoint);
//! assert_eq!(log.data_size(), 1);
//! ```
//!
//! A tape, configured for small chunks and identifier reuse:
//!
//! ```
//! use chunktape::{Config, UNTRACKED};
//!
//! let config = Config {
//!     chunk_size: 64,
//!     reuse_batch_size: 16,
//!     ..Default::default()
//! };
//!
//! let mut tape = config.tape(config.reuse_index_handler()).unwrap();
//! tape.set_active();
//!
//! let mut x = UNTRACKED;
//! tape.register_input(&mut x);
//!
//! // y = x * x at x = 5
//! let mut y = UNTRACKED;
//! tape.push_statement(&mut y, &[(5.0, x), (5.0, x)]);
//! tape.set_passive();
//!
//! tape.set_gradient(y, 1.0);
//! tape.evaluate_full();
//! assert_eq!(tape.gradient(x), 10.0);
//!
//! // clear the recording for the next one, keeping the memory
//! tape.reset();
//! assert_eq!(tape.statement_count(), 0);
//! ```

mod adjoints;
mod chunk;
mod chunk_vector;
mod config;
mod debug_delay;
#[cfg(feature = "runtime_validation")]
mod debug_history;
mod error;
mod external_function;
mod global_index;
mod index_handler;
mod io;
mod linear_index;
mod nested;
mod reuse_index;
mod single_chunk_vector;
mod tape;

pub use adjoints::AdjointVector;
pub use chunk::{Chunk, RawRecord, Record};
pub use chunk_vector::{ChunkPosition, ChunkVector};
pub use config::Config;
pub use error::{Error, Result};
pub use external_function::{ExternalFunction, ExternalFunctionHandle, ExternalFunctionLog};
pub use global_index::{
    AtomicGlobalIndexCounter, GlobalIndexCounter, GlobalIndexHandler, IndexSource,
};
pub use index_handler::{Index, IndexHandler, IndexLog, UNTRACKED};
pub use io::{ChunkFile, Mode};
pub use linear_index::LinearIndexHandler;
pub use nested::{EmptyLog, NestedLog, Segment};
pub use reuse_index::{MultiUseIndexHandler, ReuseIndexHandler};
pub use single_chunk_vector::{BlockPosition, SingleChunkVector};
pub use tape::{
    ArgumentCount, JacobianLog, JacobianTape, StatementLog, TapePosition, INPUT_TAG,
    MAX_ARGUMENTS,
};
