//! # pdfstm-core
//!
//! A streaming filter pipeline for PDF stream data.
//!
//! This crate provides the core functionality for:
//! - Encoding and decoding the standard PDF stream filters (ASCIIHex, ASCII85,
//!   RunLength, LZW, Flate, TIFF/PNG predictors) incrementally
//! - Encrypting and decrypting with the AESV2 and V2 crypt filters, and MD5
//!   digests
//! - Moving data between memory, files or an external filesystem and a chain
//!   of filters with bounded buffers
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`buffer`]: Byte buffers with read and write cursors
//! - [`backend`]: Memory, file and abstract-file storage
//! - [`filter`]: The codec state machines and their configuration
//! - [`stream`]: Orchestration of a backend and a filter chain
//! - [`crypt`]: Cipher and digest handles used by the crypt filters
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use pdfstm_core::filter::{DecodeParms, Direction, FilterKind};
//! use pdfstm_core::{FileBackend, Stream, StreamMode};
//! use std::io::Read;
//!
//! // A FlateDecode stream body extracted from a PDF
//! let chain = FilterKind::Flate.specs(Direction::Decode, &DecodeParms::new())?;
//! let backend = FileBackend::open("./content-stream.bin")?;
//!
//! let mut stream = Stream::open(backend.into(), StreamMode::Read, chain)?;
//! let mut content = Vec::new();
//! stream.read_to_end(&mut content)?;
//! stream.close()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`backend::FsFile`]: Plug in files from an external filesystem layer
//! - [`filter::DecodeParms`]: Configure filters from PDF-style dictionaries
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod backend;
pub mod buffer;
pub mod crypt;
pub mod error;
pub mod filter;
pub mod stream;

// Re-export primary types for convenience
pub use backend::{Backend, FileBackend, FsFile, IoFile, MemoryBackend};
pub use buffer::Buffer;
pub use error::{Error, ErrorKind, Result};
pub use filter::{transform, Direction, Filter, FilterKind, FilterSpec, FilterStatus};
pub use stream::{Stream, StreamConfig, StreamMode};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
