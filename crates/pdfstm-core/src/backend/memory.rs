//! In-memory storage backend.

use crate::error::{Error, Result};

/// Byte storage held in memory
///
/// A fixed backend never grows: writes that would pass its capacity fail with
/// [`Error::Truncated`] and leave the storage untouched. A growable backend
/// extends on demand.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Vec<u8>,
    size: usize,
    pos: usize,
    growable: bool,
}

impl MemoryBackend {
    /// Wraps existing bytes; the storage is readable and fixed in size
    pub fn from_vec(data: Vec<u8>) -> Self {
        let size = data.len();
        Self {
            data,
            size,
            pos: 0,
            growable: false,
        }
    }

    /// Allocates zeroed, fixed-capacity storage with no readable content
    pub fn fixed(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            size: 0,
            pos: 0,
            growable: false,
        }
    }

    /// Creates empty storage that grows as it is written
    pub fn growable() -> Self {
        Self {
            data: Vec::new(),
            size: 0,
            pos: 0,
            growable: true,
        }
    }

    /// Number of bytes the storage can hold without growing
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of meaningful bytes (the readable length)
    pub fn len(&self) -> usize {
        self.size
    }

    /// Returns true if the storage holds no meaningful bytes
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// The meaningful bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.size]
    }

    /// Consumes the backend, returning the meaningful bytes
    pub fn into_vec(mut self) -> Vec<u8> {
        self.data.truncate(self.size);
        self.data
    }

    pub(crate) fn read(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.size.saturating_sub(self.pos));
        dst[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    pub(crate) fn write(&mut self, src: &[u8]) -> Result<usize> {
        let end = self.pos + src.len();
        if end > self.data.len() {
            if !self.growable {
                return Err(Error::Truncated {
                    requested: src.len(),
                    available: self.data.len().saturating_sub(self.pos),
                });
            }
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(src);
        self.pos = end;
        self.size = self.size.max(end);
        Ok(src.len())
    }

    /// Positions are clamped to the meaningful length
    pub(crate) fn seek(&mut self, pos: u64) -> u64 {
        self.pos = usize::try_from(pos).unwrap_or(usize::MAX).min(self.size);
        self.pos as u64
    }

    pub(crate) fn tell(&self) -> u64 {
        self.pos as u64
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::growable()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_from_vec() {
        let mut mem = MemoryBackend::from_vec(b"hello".to_vec());
        let mut out = [0u8; 3];
        assert_eq!(mem.read(&mut out), 3);
        assert_eq!(&out, b"hel");
        assert_eq!(mem.read(&mut out), 2);
        assert_eq!(mem.read(&mut out), 0);
    }

    #[test]
    fn test_fixed_write_past_capacity() {
        let mut mem = MemoryBackend::fixed(4);
        assert_eq!(mem.write(b"ab").unwrap(), 2);

        let err = mem.write(b"cde").unwrap_err();
        assert!(matches!(
            err,
            Error::Truncated {
                requested: 3,
                available: 2
            }
        ));
        // Nothing of the rejected write lands in storage
        assert_eq!(mem.as_slice(), b"ab");
        assert_eq!(mem.capacity(), 4);
    }

    #[test]
    fn test_growable_write() {
        let mut mem = MemoryBackend::growable();
        mem.write(b"abc").unwrap();
        mem.write(b"def").unwrap();
        assert_eq!(mem.into_vec(), b"abcdef");
    }

    #[test]
    fn test_overwrite_after_seek() {
        let mut mem = MemoryBackend::growable();
        mem.write(b"abcdef").unwrap();
        assert_eq!(mem.seek(2), 2);
        mem.write(b"XY").unwrap();
        assert_eq!(mem.as_slice(), b"abXYef");
        assert_eq!(mem.len(), 6);
    }

    #[test]
    fn test_seek_is_clamped() {
        let mut mem = MemoryBackend::from_vec(b"abc".to_vec());
        assert_eq!(mem.seek(10), 3);
        assert_eq!(mem.tell(), 3);
    }
}
