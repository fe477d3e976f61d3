use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use fault_injection::fallible;

use crate::{Error, Result};

/// The direction a `ChunkFile` was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

enum Handle {
    Read(BufReader<File>),
    Write(BufWriter<File>),
}

/// Binary handle that raw chunk dumps are written to and read from.
///
/// No header or versioning is written. The reader has to know how many
/// chunks of which record shape and capacity to expect.
pub struct ChunkFile {
    path: PathBuf,
    handle: Handle,
}

impl std::fmt::Debug for ChunkFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkFile")
            .field("path", &self.path)
            .field("mode", &self.mode())
            .finish()
    }
}

impl ChunkFile {
    /// Creates (or truncates) `path` for writing chunk dumps.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<ChunkFile> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);

        let file = open_with(&options, &path).map_err(|io_error| Error::Open {
            path: path.clone(),
            io_error,
        })?;

        log::debug!("created chunk file {:?}", path);

        Ok(ChunkFile {
            path,
            handle: Handle::Write(BufWriter::new(file)),
        })
    }

    /// Opens an existing `path` for reading chunk dumps.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<ChunkFile> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        options.read(true);

        let file = open_with(&options, &path).map_err(|io_error| Error::Open {
            path: path.clone(),
            io_error,
        })?;

        log::debug!("opened chunk file {:?}", path);

        Ok(ChunkFile {
            path,
            handle: Handle::Read(BufReader::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn mode(&self) -> Mode {
        match self.handle {
            Handle::Read(_) => Mode::Read,
            Handle::Write(_) => Mode::Write,
        }
    }

    /// Writes all of `bytes` or fails with `Error::ShortWrite`.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let writer = match &mut self.handle {
            Handle::Write(writer) => writer,
            Handle::Read(_) => {
                return Err(Error::Mode {
                    expected: Mode::Write,
                    actual: Mode::Read,
                })
            }
        };

        write_all(writer, bytes).map_err(|e| Error::from_write(e, bytes.len()))
    }

    /// Fills all of `bytes` or fails with `Error::ShortRead`.
    pub fn read_bytes(&mut self, bytes: &mut [u8]) -> Result<()> {
        let expected = bytes.len();
        let reader = match &mut self.handle {
            Handle::Read(reader) => reader,
            Handle::Write(_) => {
                return Err(Error::Mode {
                    expected: Mode::Read,
                    actual: Mode::Write,
                })
            }
        };

        read_exact(reader, bytes).map_err(|e| Error::from_read(e, expected))
    }

    /// Flushes buffered writes and syncs them to disk. A no-op for
    /// handles opened for reading.
    pub fn sync_all(&mut self) -> Result<()> {
        if let Handle::Write(writer) = &mut self.handle {
            flush_and_sync(writer)?;
        }
        Ok(())
    }
}

fn open_with(options: &OpenOptions, path: &Path) -> io::Result<File> {
    Ok(fallible!(options.open(path)))
}

fn write_all(writer: &mut BufWriter<File>, bytes: &[u8]) -> io::Result<()> {
    fallible!(writer.write_all(bytes));
    Ok(())
}

fn read_exact(reader: &mut BufReader<File>, bytes: &mut [u8]) -> io::Result<()> {
    fallible!(reader.read_exact(bytes));
    Ok(())
}

fn flush_and_sync(writer: &mut BufWriter<File>) -> io::Result<()> {
    fallible!(writer.flush());
    fallible!(writer.get_ref().sync_all());
    Ok(())
}
