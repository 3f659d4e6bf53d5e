//! Streams: a backend plus an ordered filter chain.
//!
//! A read stream pulls bytes from its backend through the chain; a write
//! stream pushes caller bytes through the chain into its backend. Filters are
//! always listed in data-flow order: the first filter of a read stream sees
//! raw backend bytes, the first filter of a write stream sees caller bytes.
//!
//! Internally the stream keeps one buffer per chain position. Level 0 is the
//! cache next to the caller or backend, level `k` is the output of filter `k`:
//!
//! ```text
//! read:   backend -> cache -> f1 -> out1 -> f2 -> out2 -> caller
//! write:  caller  -> cache -> f1 -> out1 -> f2 -> out2 -> backend
//! ```
//!
//! # Example
//!
//! ```
//! use pdfstm_core::filter::{Direction, FilterSpec};
//! use pdfstm_core::{MemoryBackend, Stream, StreamMode};
//! use std::io::{Read, Write};
//!
//! let mut writer = Stream::open(
//!     MemoryBackend::growable().into(),
//!     StreamMode::Write,
//!     vec![FilterSpec::AsciiHex(Direction::Encode)],
//! )?;
//! writer.write_all(b"hi")?;
//! let encoded = writer.finish()?.into_memory().map(|m| m.into_vec()).unwrap_or_default();
//! assert_eq!(encoded, b"6869>");
//!
//! let mut reader = Stream::open(
//!     MemoryBackend::from_vec(encoded).into(),
//!     StreamMode::Read,
//!     vec![FilterSpec::AsciiHex(Direction::Decode)],
//! )?;
//! let mut decoded = Vec::new();
//! reader.read_to_end(&mut decoded)?;
//! assert_eq!(decoded, b"hi");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use crate::backend::Backend;
use crate::buffer::Buffer;
use crate::error::{Error, Result};
use crate::filter::{Filter, FilterSpec, FilterStatus};
use tracing::{debug, trace, warn};

/// Default capacity of stream buffers
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Direction a stream moves data in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamMode {
    /// Backend to caller, decoding
    Read,
    /// Caller to backend, encoding
    Write,
}

impl std::fmt::Display for StreamMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamMode::Read => f.write_str("read"),
            StreamMode::Write => f.write_str("write"),
        }
    }
}

/// Buffer sizing for a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Capacity of the cache between the chain and the caller or backend
    pub cache_size: usize,
    /// Capacity of each filter's output buffer
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            cache_size: DEFAULT_BUFFER_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl StreamConfig {
    /// Creates a config with default sizes
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the cache capacity
    pub fn cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    /// Sets the per-filter buffer capacity
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.cache_size == 0 || self.buffer_size == 0 {
            return Err(Error::invalid_argument("stream buffer sizes must be non-zero"));
        }
        Ok(())
    }
}

/// One filter in the chain and the buffer it writes into
#[derive(Debug)]
struct Stage {
    filter: Filter,
    out: Buffer,
    done: bool,
}

/// A backend and filter chain driven in one direction
#[derive(Debug)]
pub struct Stream {
    backend: Option<Backend>,
    mode: StreamMode,
    stages: Vec<Stage>,
    cache: Buffer,
    backend_eof: bool,
    position: u64,
    failed: bool,
}

impl Stream {
    /// Opens a stream with default buffer sizes
    pub fn open(
        backend: Backend,
        mode: StreamMode,
        chain: impl IntoIterator<Item = FilterSpec>,
    ) -> Result<Self> {
        Self::open_with_config(backend, mode, chain, StreamConfig::default())
    }

    /// Opens a stream, initializing every filter of `chain`
    pub fn open_with_config(
        backend: Backend,
        mode: StreamMode,
        chain: impl IntoIterator<Item = FilterSpec>,
        config: StreamConfig,
    ) -> Result<Self> {
        config.validate()?;
        let stages = chain
            .into_iter()
            .map(|spec| -> Result<Stage> {
                Ok(Stage {
                    filter: Filter::new(spec)?,
                    out: Buffer::try_new(config.buffer_size)?,
                    done: false,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            "Opened {} stream at {} with {} filter(s)",
            mode,
            backend.tell(),
            stages.len()
        );
        Ok(Self {
            position: 0,
            backend: Some(backend),
            mode,
            stages,
            cache: Buffer::try_new(config.cache_size)?,
            backend_eof: false,
            failed: false,
        })
    }

    /// The stream's direction
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Returns true once an error has made the stream unusable
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// The filters of the chain in data-flow order
    pub fn filters(&self) -> impl Iterator<Item = &Filter> {
        self.stages.iter().map(|stage| &stage.filter)
    }

    /// Bytes delivered to (read) or accepted from (write) the caller so far
    pub fn tell(&self) -> u64 {
        self.position
    }

    /// Reads decoded bytes into `buf`
    ///
    /// Returns fewer than `buf.len()` bytes only at end of data; 0 means the
    /// backend is exhausted and every filter has been flushed.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.check_usable(StreamMode::Read, "read")?;
        let result = self.read_chain(buf);
        let n = self.track(result)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Writes `data` into the chain, returning the number of bytes accepted
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.check_usable(StreamMode::Write, "write")?;
        let result = self.write_chain(data);
        let n = self.track(result)?;
        self.position += n as u64;
        Ok(n)
    }

    /// Pushes buffered bytes through the chain without finishing it
    ///
    /// Filters keep whatever they need to produce their final output, so the
    /// backend may not yet hold a complete encoding.
    pub fn flush(&mut self) -> Result<()> {
        self.check_usable(StreamMode::Write, "flush")?;
        let result = self.flush_chain();
        self.track(result)
    }

    /// Moves to `pos` in the decoded (read) or caller (write) byte sequence
    ///
    /// Through a chain of seek-transparent filters the backend is positioned
    /// directly. Otherwise a read stream rewinds every filter and the backend
    /// and replays the data up to `pos`; a write stream cannot seek.
    pub fn seek(&mut self, pos: u64) -> Result<u64> {
        if self.failed {
            return Err(Error::StreamFailed);
        }

        let transparent = self.stages.iter().all(|s| s.filter.is_seek_transparent());
        if !transparent && self.mode == StreamMode::Write {
            return Err(Error::NotSeekable(format!(
                "write stream through {} filter(s)",
                self.stages.len()
            )));
        }

        let result = if transparent {
            self.seek_direct(pos)
        } else {
            self.seek_replay(pos)
        };
        let reached = self.track(result)?;
        debug!("Seeked {} stream to {} (requested {})", self.mode, reached, pos);
        Ok(reached)
    }

    /// Flushes the chain and returns the backend without closing it
    ///
    /// A write stream drives `finish` through every filter so each emits its
    /// trailing bytes before the backend is flushed.
    pub fn finish(mut self) -> Result<Backend> {
        self.finish_chain()?;
        self.backend.take().ok_or(Error::StreamFailed)
    }

    /// Finishes the chain, releases the filters and closes the backend
    ///
    /// A failed stream is closed without flushing.
    pub fn close(mut self) -> Result<()> {
        let finished = if self.failed {
            Ok(())
        } else {
            self.finish_chain()
        };
        let closed = match self.backend.take() {
            Some(backend) => backend.close(),
            None => Ok(()),
        };
        debug!("Closed {} stream after {} bytes", self.mode, self.position);
        finished.and(closed)
    }

    fn check_usable(&self, mode: StreamMode, operation: &str) -> Result<()> {
        if self.failed {
            return Err(Error::StreamFailed);
        }
        if self.mode != mode {
            return Err(Error::bad_perms(format!(
                "{} on a {} stream",
                operation, self.mode
            )));
        }
        Ok(())
    }

    fn track<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            warn!("{} stream failed: {}", self.mode, e);
            self.failed = true;
        }
        result
    }

    fn level_mut(&mut self, level: usize) -> &mut Buffer {
        match level {
            0 => &mut self.cache,
            k => &mut self.stages[k - 1].out,
        }
    }

    /// Runs filter `index` from its input level into its output buffer
    fn run_stage(&mut self, index: usize, finish: bool) -> Result<FilterStatus> {
        let (upstream, rest) = self.stages.split_at_mut(index);
        let stage = &mut rest[0];
        let input = match upstream.last_mut() {
            Some(previous) => &mut previous.out,
            None => &mut self.cache,
        };

        stage.out.compact();
        let status = stage.filter.apply(input, &mut stage.out, finish)?;
        input.compact();
        trace!("{} filter returned {:?}", stage.filter.name(), status);

        match status {
            FilterStatus::Done => stage.done = true,
            FilterStatus::NeedInput if finish => {
                return Err(Error::filter(stage.filter.name(), "requested input after finish"))
            }
            _ => {}
        }
        Ok(status)
    }

    /// Makes bytes available at `level`; false once it is exhausted for good
    fn fill_level(&mut self, level: usize) -> Result<bool> {
        if level == 0 {
            if !self.cache.is_empty() {
                return Ok(true);
            }
            if self.backend_eof {
                return Ok(false);
            }
            self.cache.rewind();
            let backend = self.backend.as_mut().ok_or(Error::StreamFailed)?;
            let want = self.cache.free();
            let n = backend.read(&mut self.cache, want)?;
            if n < want {
                self.backend_eof = true;
            }
            return Ok(n > 0);
        }

        let index = level - 1;
        loop {
            let stage = &self.stages[index];
            if !stage.out.is_empty() {
                return Ok(true);
            }
            if stage.done {
                return Ok(false);
            }
            let upstream_exhausted = !self.fill_level(index)?;
            self.run_stage(index, upstream_exhausted)?;
        }
    }

    fn read_chain(&mut self, buf: &mut [u8]) -> Result<usize> {
        let last = self.stages.len();
        let mut total = 0;
        while total < buf.len() {
            if !self.fill_level(last)? {
                break;
            }
            total += self.level_mut(last).read_into(&mut buf[total..]);
        }
        Ok(total)
    }

    /// Drives the bytes at `level` downstream, finishing every later filter if asked
    fn push_level(&mut self, level: usize, finish: bool) -> Result<()> {
        if level == self.stages.len() {
            let buf = match level {
                0 => &mut self.cache,
                k => &mut self.stages[k - 1].out,
            };
            let backend = self.backend.as_mut().ok_or(Error::StreamFailed)?;
            let n = buf.available();
            if n > 0 {
                backend.write(buf, n)?;
            }
            buf.compact();
            return Ok(());
        }

        loop {
            match self.run_stage(level, finish)? {
                FilterStatus::NeedOutput => self.push_level(level + 1, false)?,
                FilterStatus::NeedInput => return Ok(()),
                FilterStatus::Done => return self.push_level(level + 1, true),
            }
        }
    }

    fn write_chain(&mut self, data: &[u8]) -> Result<usize> {
        let mut taken = 0;
        while taken < data.len() {
            taken += self.cache.write_slice(&data[taken..]);
            if self.cache.is_full() {
                self.push_level(0, false)?;
            }
        }
        Ok(taken)
    }

    fn flush_chain(&mut self) -> Result<()> {
        for level in 0..=self.stages.len() {
            self.push_level(level, false)?;
        }
        self.backend.as_mut().ok_or(Error::StreamFailed)?.flush()
    }

    fn finish_chain(&mut self) -> Result<()> {
        if self.failed {
            return Err(Error::StreamFailed);
        }
        if self.mode == StreamMode::Write {
            let result = self
                .push_level(0, true)
                .and_then(|()| self.backend.as_mut().ok_or(Error::StreamFailed)?.flush());
            self.track(result)?;
        }
        Ok(())
    }

    /// Drops every buffered byte and returns the filters to their initial state
    fn rewind_chain(&mut self) -> Result<()> {
        self.cache.rewind();
        for stage in &mut self.stages {
            stage.filter.reset()?;
            stage.out.rewind();
            stage.done = false;
        }
        self.backend_eof = false;
        Ok(())
    }

    fn seek_direct(&mut self, pos: u64) -> Result<u64> {
        if self.mode == StreamMode::Write {
            self.flush_chain()?;
        }
        self.rewind_chain()?;
        let reached = self.backend.as_mut().ok_or(Error::StreamFailed)?.seek(pos)?;
        self.position = reached;
        Ok(reached)
    }

    fn seek_replay(&mut self, pos: u64) -> Result<u64> {
        self.rewind_chain()?;
        self.backend.as_mut().ok_or(Error::StreamFailed)?.seek(0)?;
        self.position = 0;

        let mut scratch = [0u8; 1024];
        while self.position < pos {
            let want = usize::try_from(pos - self.position)
                .unwrap_or(usize::MAX)
                .min(scratch.len());
            let n = self.read_chain(&mut scratch[..want])?;
            if n == 0 {
                break;
            }
            self.position += n as u64;
        }
        Ok(self.position)
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        if self.backend.is_none() || self.failed || self.mode != StreamMode::Write {
            return;
        }
        if let Err(e) = self.finish_chain() {
            warn!("Failed to finish write stream on drop: {}", e);
        }
    }
}

impl std::io::Read for Stream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        Stream::read(self, buf).map_err(Into::into)
    }
}

impl std::io::Write for Stream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        Stream::write(self, buf).map_err(Into::into)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Stream::flush(self).map_err(Into::into)
    }
}
