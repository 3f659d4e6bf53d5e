//! Native file backend.

use super::check_complete;
use crate::error::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Backend over an OS file handle
#[derive(Debug)]
pub struct FileBackend {
    file: File,
    pos: u64,
}

impl FileBackend {
    /// Wraps an open file, starting at its current position
    pub fn new(mut file: File) -> Result<Self> {
        let pos = file.stream_position().map_err(|e| Error::io("tell", e))?;
        Ok(Self { file, pos })
    }

    /// Opens an existing file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::file_open(path, e))?;
        Ok(Self { file, pos: 0 })
    }

    /// Creates (or truncates) a file for writing
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .map_err(|e| Error::file_open(path, e))?;
        Ok(Self { file, pos: 0 })
    }

    pub(crate) fn read(&mut self, dst: &mut [u8]) -> Result<usize> {
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

    /// Disk writes are not retried: a failure aborts the operation
    pub(crate) fn write(&mut self, src: &[u8]) -> Result<usize> {
        let written = self.file.write(src).map_err(|e| Error::io("write", e))?;
        self.pos += written as u64;
        check_complete(written, src.len())
    }

    pub(crate) fn seek(&mut self, pos: u64) -> Result<u64> {
        self.pos = self
            .file
            .seek(SeekFrom::Start(pos))
            .map_err(|e| Error::io("seek", e))?;
        Ok(self.pos)
    }

    pub(crate) fn tell(&self) -> u64 {
        self.pos
    }

    pub(crate) fn flush(&mut self) -> Result<()> {
        self.file.flush().map_err(|e| Error::io("flush", e))
    }

    pub(crate) fn close(mut self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_write_reopen_read() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");

        let mut backend = FileBackend::create(&path).unwrap();
        assert_eq!(backend.write(b"file backend").unwrap(), 12);
        assert_eq!(backend.tell(), 12);
        backend.close().unwrap();

        let mut backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.seek(5).unwrap(), 5);
        let mut out = [0u8; 16];
        assert_eq!(backend.read(&mut out).unwrap(), 7);
        assert_eq!(&out[..7], b"backend");
    }

    #[test]
    fn test_open_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = FileBackend::open(temp_dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, Error::FileOpen { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
