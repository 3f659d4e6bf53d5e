//! Storage backends underneath a stream.
//!
//! A [`Backend`] presents memory, an OS file or an abstract filesystem file
//! through one read/write/seek/tell contract. The backend owns the position
//! cursor; the stream layer never touches the underlying storage directly.
//!
//! ## Extensibility
//!
//! The [`FsFile`] trait is the seam for external filesystem implementations:
//!
//! ```no_run
//! use pdfstm_core::backend::{Backend, IoFile};
//! use std::io::Cursor;
//!
//! let backend = Backend::abstract_file(IoFile::new(Cursor::new(Vec::new())));
//! ```

mod file;
mod memory;

use crate::buffer::Buffer;
use crate::error::{Error, Result};
use std::io::{Read, Seek, SeekFrom, Write};
use tracing::trace;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// File handle provided by an external filesystem layer
///
/// These are the only operations the stream layer needs from a filesystem.
pub trait FsFile: Send {
    /// Reads into `buf`, returning the number of bytes read (0 at end of file)
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Writes from `buf`, returning the number of bytes accepted
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;

    /// Moves to the absolute position `pos`, returning the new position
    fn seek(&mut self, pos: u64) -> std::io::Result<u64>;

    /// Returns the current position
    fn tell(&mut self) -> std::io::Result<u64>;

    /// Releases the file
    fn close(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Adapts any `Read + Write + Seek` value to [`FsFile`]
#[derive(Debug)]
pub struct IoFile<T>(T);

impl<T> IoFile<T> {
    /// Wraps `inner`
    pub fn new(inner: T) -> Self {
        Self(inner)
    }

    /// Returns the wrapped value
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T: Read + Write + Seek + Send> FsFile for IoFile<T> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write(buf)
    }

    fn seek(&mut self, pos: u64) -> std::io::Result<u64> {
        self.0.seek(SeekFrom::Start(pos))
    }

    fn tell(&mut self) -> std::io::Result<u64> {
        self.0.stream_position()
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.0.flush()
    }
}

/// Backend over an abstract filesystem file
pub struct AbstractBackend {
    file: Box<dyn FsFile>,
    pos: u64,
}

impl std::fmt::Debug for AbstractBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbstractBackend")
            .field("pos", &self.pos)
            .finish_non_exhaustive()
    }
}

impl AbstractBackend {
    /// Wraps a filesystem file, starting at its current position
    pub fn new(mut file: Box<dyn FsFile>) -> Result<Self> {
        let pos = file.tell().map_err(|e| Error::io("tell", e))?;
        Ok(Self { file, pos })
    }

    fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < dst.len() {
            match self.file.read(&mut dst[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::io("read", e)),
            }
        }
        self.pos += filled as u64;
        Ok(filled)
    }

    /// One attempt per call; `Interrupted` is reported like any other failure
    fn write(&mut self, src: &[u8]) -> Result<usize> {
        let written = self.file.write(src).map_err(|e| Error::io("write", e))?;
        self.pos += written as u64;
        check_complete(written, src.len())
    }

    fn seek(&mut self, pos: u64) -> Result<u64> {
        self.pos = self.file.seek(pos).map_err(|e| Error::io("seek", e))?;
        Ok(self.pos)
    }

    fn close(mut self) -> Result<()> {
        self.file.close().map_err(|e| Error::io("close", e))
    }
}

/// Fails a write that stored fewer bytes than requested
pub(crate) fn check_complete(written: usize, requested: usize) -> Result<usize> {
    if written < requested {
        return Err(Error::io(
            "write",
            std::io::Error::new(
                std::io::ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, requested),
            ),
        ));
    }
    Ok(written)
}

/// Storage adapter underneath a stream
#[derive(Debug)]
pub enum Backend {
    /// In-memory storage
    Memory(MemoryBackend),
    /// Native OS file
    File(FileBackend),
    /// File from an external filesystem layer
    Abstract(AbstractBackend),
}

impl Backend {
    /// Creates a backend over an abstract filesystem file
    pub fn abstract_file(file: impl FsFile + 'static) -> Result<Self> {
        Ok(Self::Abstract(AbstractBackend::new(Box::new(file))?))
    }

    /// Reads up to `max` bytes into the free space of `dst`
    ///
    /// Fewer bytes are returned only at the end of the storage.
    pub fn read(&mut self, dst: &mut Buffer, max: usize) -> Result<usize> {
        let n = max.min(dst.free());
        let spare = &mut dst.spare_mut()[..n];
        let read = match self {
            Backend::Memory(mem) => mem.read(spare),
            Backend::File(file) => file.read(spare)?,
            Backend::Abstract(file) => file.read(spare)?,
        };
        dst.commit(read);
        if read < n {
            trace!("Backend reached end of storage at {}", self.tell());
        }
        Ok(read)
    }

    /// Writes `n` unread bytes of `src` at the current position
    pub fn write(&mut self, src: &mut Buffer, n: usize) -> Result<usize> {
        if n > src.available() {
            return Err(Error::invalid_argument(format!(
                "cannot write {} bytes from a buffer holding {}",
                n,
                src.available()
            )));
        }
        let bytes = &src.unread()[..n];
        let written = match self {
            Backend::Memory(mem) => mem.write(bytes)?,
            Backend::File(file) => file.write(bytes)?,
            Backend::Abstract(file) => file.write(bytes)?,
        };
        src.consume(written);
        Ok(written)
    }

    /// Moves to `pos`, returning the position actually reached
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        match self {
            Backend::Memory(mem) => Ok(mem.seek(pos)),
            Backend::File(file) => file.seek(pos),
            Backend::Abstract(file) => file.seek(pos),
        }
    }

    /// Returns the current position
    pub fn tell(&self) -> u64 {
        match self {
            Backend::Memory(mem) => mem.tell(),
            Backend::File(file) => file.tell(),
            Backend::Abstract(file) => file.pos,
        }
    }

    /// Flushes buffered writes to the storage
    pub fn flush(&mut self) -> Result<()> {
        match self {
            Backend::Memory(_) | Backend::Abstract(_) => Ok(()),
            Backend::File(file) => file.flush(),
        }
    }

    /// Releases the backend and any storage it owns
    pub fn close(self) -> Result<()> {
        match self {
            Backend::Memory(_) => Ok(()),
            Backend::File(file) => file.close(),
            Backend::Abstract(file) => file.close(),
        }
    }

    /// Returns the memory backend, if this is one
    pub fn as_memory(&self) -> Option<&MemoryBackend> {
        match self {
            Backend::Memory(mem) => Some(mem),
            _ => None,
        }
    }

    /// Converts into the memory backend, if this is one
    pub fn into_memory(self) -> Option<MemoryBackend> {
        match self {
            Backend::Memory(mem) => Some(mem),
            _ => None,
        }
    }
}

impl From<MemoryBackend> for Backend {
    fn from(mem: MemoryBackend) -> Self {
        Backend::Memory(mem)
    }
}

impl From<FileBackend> for Backend {
    fn from(file: FileBackend) -> Self {
        Backend::File(file)
    }
}
