use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::io::Mode;
use crate::Index;

/// Errors surfaced by the recoverable parts of this crate: chunk
/// persistence, identifier range claims and configuration checks.
///
/// Precondition violations in the append and traversal hot paths are
/// not represented here. Those are `debug_assert!`s.
#[derive(Debug)]
pub enum Error {
    /// A `ChunkFile` was used in the direction it was not opened for.
    Mode { expected: Mode, actual: Mode },
    /// The backing file could not be opened or created.
    Open { path: PathBuf, io_error: io::Error },
    /// The handle ran out of bytes before a full chunk column was read.
    ShortRead { expected: usize },
    /// The handle accepted fewer bytes than a full chunk column.
    ShortWrite { expected: usize },
    /// Any other I/O failure while transferring chunk data.
    Io(io::Error),
    /// The identifier space can not hold the requested range.
    IndexOverflow { maximum: Index, requested: Index },
    /// A `Config` field holds a value the structures can not work with.
    InvalidConfig(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn from_read(io_error: io::Error, expected: usize) -> Error {
        if io_error.kind() == io::ErrorKind::UnexpectedEof {
            Error::ShortRead { expected }
        } else {
            Error::Io(io_error)
        }
    }

    pub(crate) fn from_write(io_error: io::Error, expected: usize) -> Error {
        if io_error.kind() == io::ErrorKind::WriteZero {
            Error::ShortWrite { expected }
        } else {
            Error::Io(io_error)
        }
    }
}

impl From<io::Error> for Error {
    fn from(io_error: io::Error) -> Error {
        Error::Io(io_error)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Mode { expected, actual } => write!(
                f,
                "chunk file is opened for {actual:?} but was used for {expected:?}"
            ),
            Error::Open { path, io_error } => {
                write!(f, "failed to open chunk file {path:?}: {io_error}")
            }
            Error::ShortRead { expected } => {
                write!(f, "chunk file ended before {expected} bytes could be read")
            }
            Error::ShortWrite { expected } => {
                write!(f, "chunk file accepted fewer than {expected} bytes")
            }
            Error::Io(io_error) => write!(f, "chunk file I/O failed: {io_error}"),
            Error::IndexOverflow { maximum, requested } => write!(
                f,
                "identifier space exhausted: {requested} more identifiers requested \
                 after {maximum}"
            ),
            Error::InvalidConfig(reason) => write!(f, "invalid Config: {reason}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Open { io_error, .. } | Error::Io(io_error) => Some(io_error),
            _ => None,
        }
    }
}
