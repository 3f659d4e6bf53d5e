//! Fixed-capacity byte buffer with read and write cursors.
//!
//! A [`Buffer`] is the unit of data handed between backends and filters.
//! Bytes are appended at the write cursor and consumed from the read cursor;
//! the region between them is the unread data. The cursors always satisfy
//! `read_pos <= write_pos <= capacity`.

use crate::error::{Error, Result};

/// Byte buffer with explicit, bounds-checked cursors
#[derive(Clone, PartialEq, Eq)]
pub struct Buffer {
    data: Vec<u8>,
    read_pos: usize,
    write_pos: usize,
}

impl std::fmt::Debug for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buffer")
            .field("capacity", &self.capacity())
            .field("read_pos", &self.read_pos)
            .field("write_pos", &self.write_pos)
            .finish()
    }
}

impl Buffer {
    /// Creates an empty buffer holding up to `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            read_pos: 0,
            write_pos: 0,
        }
    }

    /// Creates an empty buffer, reporting allocation failure instead of aborting
    pub fn try_new(capacity: usize) -> Result<Self> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| Error::OutOfMemory { requested: capacity })?;
        data.resize(capacity, 0);
        Ok(Self {
            data,
            read_pos: 0,
            write_pos: 0,
        })
    }

    /// Creates a buffer that is filled with `bytes` and ready to be read
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            read_pos: 0,
            write_pos: bytes.len(),
        }
    }

    /// Total number of bytes the buffer can hold
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Position of the read cursor
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Position of the write cursor
    pub fn write_pos(&self) -> usize {
        self.write_pos
    }

    /// Resets both cursors to zero, discarding unread bytes
    pub fn rewind(&mut self) {
        self.read_pos = 0;
        self.write_pos = 0;
    }

    /// Returns true if no more bytes can be written
    pub fn is_full(&self) -> bool {
        self.write_pos == self.capacity()
    }

    /// Returns true if there are no unread bytes
    pub fn is_empty(&self) -> bool {
        self.write_pos == self.read_pos
    }

    /// Number of unread bytes
    pub fn available(&self) -> usize {
        self.write_pos - self.read_pos
    }

    /// Number of bytes that can still be written
    pub fn free(&self) -> usize {
        self.capacity() - self.write_pos
    }

    /// The unread bytes
    pub fn unread(&self) -> &[u8] {
        &self.data[self.read_pos..self.write_pos]
    }

    /// The writable space after the write cursor
    ///
    /// Bytes placed here become visible after [`Buffer::commit`].
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.write_pos..]
    }

    /// Marks up to `n` unread bytes as consumed and returns how many were
    ///
    /// The read cursor never passes the write cursor.
    pub fn consume(&mut self, n: usize) -> usize {
        let n = n.min(self.available());
        self.read_pos += n;
        n
    }

    /// Marks up to `n` bytes of spare space as written and returns how many were
    ///
    /// The write cursor never passes the capacity.
    pub fn commit(&mut self, n: usize) -> usize {
        let n = n.min(self.free());
        self.write_pos += n;
        n
    }

    /// Appends as much of `bytes` as fits and returns how many were taken
    pub fn write_slice(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.free());
        self.data[self.write_pos..self.write_pos + n].copy_from_slice(&bytes[..n]);
        self.write_pos += n;
        n
    }

    /// Copies unread bytes into `dst` and returns how many were copied
    pub fn read_into(&mut self, dst: &mut [u8]) -> usize {
        let n = dst.len().min(self.available());
        dst[..n].copy_from_slice(&self.data[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        n
    }

    /// Moves as many unread bytes as fit from `src` into this buffer
    pub fn transfer_from(&mut self, src: &mut Buffer) -> usize {
        let n = self.write_slice(src.unread());
        src.consume(n);
        n
    }

    /// Appends one byte; returns false if the buffer is full
    pub fn push(&mut self, byte: u8) -> bool {
        if self.is_full() {
            return false;
        }
        self.data[self.write_pos] = byte;
        self.write_pos += 1;
        true
    }

    /// Takes the next unread byte
    pub fn pop(&mut self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        let byte = self.data[self.read_pos];
        self.read_pos += 1;
        Some(byte)
    }

    /// Moves the unread bytes to the front, freeing the consumed prefix
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.data.copy_within(self.read_pos..self.write_pos, 0);
        self.write_pos -= self.read_pos;
        self.read_pos = 0;
    }

    /// Reallocates to `new_capacity`, keeping unread bytes shifted to offset 0
    pub fn resize(&mut self, new_capacity: usize) -> Result<()> {
        let available = self.available();
        if new_capacity < available {
            return Err(Error::invalid_argument(format!(
                "cannot resize buffer to {} bytes while {} bytes are unread",
                new_capacity, available
            )));
        }

        let mut data = Vec::new();
        data.try_reserve_exact(new_capacity)
            .map_err(|_| Error::OutOfMemory {
                requested: new_capacity,
            })?;
        data.extend_from_slice(self.unread());
        data.resize(new_capacity, 0);

        self.data = data;
        self.read_pos = 0;
        self.write_pos = available;
        Ok(())
    }

    /// Checks the cursor invariant
    pub fn is_consistent(&self) -> bool {
        self.read_pos <= self.write_pos && self.write_pos <= self.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_empty() {
        let buf = Buffer::new(8);
        assert_eq!(buf.capacity(), 8);
        assert!(buf.is_empty());
        assert!(!buf.is_full());
        assert_eq!(buf.free(), 8);
    }

    #[test]
    fn test_write_then_read() {
        let mut buf = Buffer::new(4);
        assert_eq!(buf.write_slice(b"abcdef"), 4);
        assert!(buf.is_full());

        let mut out = [0u8; 3];
        assert_eq!(buf.read_into(&mut out), 3);
        assert_eq!(&out, b"abc");
        assert_eq!(buf.unread(), b"d");
        assert!(buf.is_consistent());
    }

    #[test]
    fn test_push_pop() {
        let mut buf = Buffer::new(2);
        assert!(buf.push(1));
        assert!(buf.push(2));
        assert!(!buf.push(3));
        assert_eq!(buf.pop(), Some(1));
        assert_eq!(buf.pop(), Some(2));
        assert_eq!(buf.pop(), None);
    }

    #[test]
    fn test_rewind() {
        let mut buf = Buffer::from_slice(b"xyz");
        buf.consume(1);
        buf.rewind();
        assert_eq!(buf.read_pos(), 0);
        assert_eq!(buf.write_pos(), 0);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_compact() {
        let mut buf = Buffer::new(4);
        buf.write_slice(b"abcd");
        buf.consume(3);
        buf.compact();
        assert_eq!(buf.unread(), b"d");
        assert_eq!(buf.free(), 3);
    }

    #[test]
    fn test_resize_keeps_unread() {
        let mut buf = Buffer::new(4);
        buf.write_slice(b"abcd");
        buf.consume(2);
        buf.resize(8).unwrap();
        assert_eq!(buf.capacity(), 8);
        assert_eq!(buf.read_pos(), 0);
        assert_eq!(buf.unread(), b"cd");

        buf.resize(2).unwrap();
        assert!(buf.is_full());
        assert!(buf.resize(1).is_err());
    }

    #[test]
    fn test_transfer_from() {
        let mut src = Buffer::from_slice(b"hello");
        let mut dst = Buffer::new(3);
        assert_eq!(dst.transfer_from(&mut src), 3);
        assert_eq!(dst.unread(), b"hel");
        assert_eq!(src.unread(), b"lo");
    }

    #[test]
    fn test_spare_and_commit() {
        let mut buf = Buffer::new(4);
        buf.spare_mut()[..2].copy_from_slice(b"hi");
        buf.commit(2);
        assert_eq!(buf.unread(), b"hi");
    }

    #[test]
    fn test_cursor_moves_are_clamped() {
        let mut buf = Buffer::new(4);
        assert_eq!(buf.commit(100), 4);
        assert_eq!(buf.free(), 0);

        buf.consume(1);
        assert_eq!(buf.consume(10), 3);
        assert_eq!(buf.available(), 0);
        assert!(buf.is_consistent());
    }

    #[test]
    fn test_try_new() {
        let buf = Buffer::try_new(16).unwrap();
        assert_eq!(buf.capacity(), 16);
        assert!(matches!(
            Buffer::try_new(usize::MAX),
            Err(Error::OutOfMemory { .. })
        ));
    }
}
