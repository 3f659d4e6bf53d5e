//! Error types for the pdfstm-core library.
//!
//! Every fallible operation in the pipeline returns [`Result`]. Variants carry
//! enough context to build a readable message, and [`Error::kind`] folds them
//! onto the small status taxonomy callers branch on ([`ErrorKind`]).

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pdfstm operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed filter input or out-of-range filter parameters
    BadData,
    /// Allocation failure
    NoMem,
    /// Operation not permitted on this stream or backend
    BadPerms,
    /// Storage failure reported by a backend
    Io,
    /// Any other filter-internal or stream failure
    Generic,
}

impl ErrorKind {
    /// Returns the status code name for this kind
    pub fn status(&self) -> &'static str {
        match self {
            ErrorKind::BadData => "EBADDATA",
            ErrorKind::NoMem => "ENOMEM",
            ErrorKind::BadPerms => "EBADPERMS",
            ErrorKind::Io => "EIO",
            ErrorKind::Generic => "ERROR",
        }
    }
}

/// Comprehensive error type for all pdfstm operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Filter input does not follow the filter's encoding
    #[error("malformed {filter} data: {details}")]
    BadData {
        /// Name of the filter that rejected the data
        filter: &'static str,
        /// Detailed description of the issue
        details: String,
    },

    /// Filter parameters are missing or out of range
    #[error("invalid {filter} parameter: {details}")]
    InvalidParameter {
        /// Name of the filter being configured
        filter: &'static str,
        /// Detailed description of the issue
        details: String,
    },

    /// Failed to allocate buffer storage
    #[error("failed to allocate {requested} bytes")]
    OutOfMemory {
        /// Number of bytes requested
        requested: usize,
    },

    /// Write would run past the end of a fixed-capacity backend
    #[error("write of {requested} bytes exceeds fixed backend capacity ({available} bytes left)")]
    Truncated {
        /// Number of bytes the caller tried to write
        requested: usize,
        /// Number of bytes left before the end of the storage
        available: usize,
    },

    /// Operation not permitted in the current mode
    #[error("operation not permitted: {0}")]
    BadPerms(String),

    /// Failed to open a file for a file backend
    #[error("failed to open file '{path}': {source}")]
    FileOpen {
        /// Path to the file that failed to open
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Backend storage failure
    #[error("backend {operation} failed: {source}")]
    Io {
        /// Backend operation that failed
        operation: &'static str,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Filter-internal failure not caused by the input data
    #[error("{filter} filter failed: {details}")]
    Filter {
        /// Name of the failing filter
        filter: &'static str,
        /// Detailed description of the issue
        details: String,
    },

    /// A previous error left the stream unusable
    #[error("stream is in a failed state after a previous error")]
    StreamFailed,

    /// Seek requested on a chain that cannot replay to the target
    #[error("stream is not seekable: {0}")]
    NotSeekable(String),

    /// Invalid argument passed to a buffer, backend or stream operation
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// Creates a new malformed data error
    pub fn bad_data(filter: &'static str, details: impl Into<String>) -> Self {
        Self::BadData {
            filter,
            details: details.into(),
        }
    }

    /// Creates a new invalid parameter error
    pub fn invalid_parameter(filter: &'static str, details: impl Into<String>) -> Self {
        Self::InvalidParameter {
            filter,
            details: details.into(),
        }
    }

    /// Creates a new filter failure
    pub fn filter(filter: &'static str, details: impl Into<String>) -> Self {
        Self::Filter {
            filter,
            details: details.into(),
        }
    }

    /// Creates a new backend I/O error
    pub fn io(operation: &'static str, source: std::io::Error) -> Self {
        Self::Io { operation, source }
    }

    /// Creates a new file open error
    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    /// Creates a new permission error
    pub fn bad_perms(msg: impl Into<String>) -> Self {
        Self::BadPerms(msg.into())
    }

    /// Creates a new invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Returns the status classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadData { .. } | Self::InvalidParameter { .. } => ErrorKind::BadData,
            Self::OutOfMemory { .. } => ErrorKind::NoMem,
            Self::Truncated { .. } | Self::BadPerms(_) => ErrorKind::BadPerms,
            Self::FileOpen { .. } | Self::Io { .. } => ErrorKind::Io,
            Self::Filter { .. }
            | Self::StreamFailed
            | Self::NotSeekable(_)
            | Self::InvalidArgument(_) => ErrorKind::Generic,
        }
    }

    /// Returns the subsystem that raised this error
    pub fn domain(&self) -> &'static str {
        match self {
            Self::BadData { .. } | Self::InvalidParameter { .. } | Self::Filter { .. } => "filter",
            Self::Truncated { .. } | Self::FileOpen { .. } | Self::Io { .. } => "backend",
            Self::OutOfMemory { .. } | Self::InvalidArgument(_) => "buffer",
            Self::BadPerms(_) | Self::StreamFailed | Self::NotSeekable(_) => "stream",
        }
    }
}

impl From<Error> for std::io::Error {
    fn from(err: Error) -> Self {
        let kind = match err.kind() {
            ErrorKind::BadData => std::io::ErrorKind::InvalidData,
            ErrorKind::NoMem => std::io::ErrorKind::OutOfMemory,
            ErrorKind::BadPerms => std::io::ErrorKind::PermissionDenied,
            ErrorKind::Io | ErrorKind::Generic => std::io::ErrorKind::Other,
        };
        std::io::Error::new(kind, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::bad_data("ASCIIHexDecode", "invalid hex digit 'g'");
        assert!(err.to_string().contains("ASCIIHexDecode"));
        assert!(err.to_string().contains("'g'"));
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(Error::bad_data("LZWDecode", "x").kind(), ErrorKind::BadData);
        assert_eq!(Error::invalid_parameter("Predictor", "x").kind(), ErrorKind::BadData);
        assert_eq!(
            Error::Truncated {
                requested: 4,
                available: 1
            }
            .kind(),
            ErrorKind::BadPerms
        );
        assert_eq!(Error::OutOfMemory { requested: 1 }.kind().status(), "ENOMEM");
        assert_eq!(
            Error::io("read", std::io::Error::other("disk")).kind(),
            ErrorKind::Io
        );
    }

    #[test]
    fn test_error_domain() {
        assert_eq!(Error::bad_data("RunLengthDecode", "x").domain(), "filter");
        assert_eq!(Error::StreamFailed.domain(), "stream");
        assert_eq!(
            Error::Truncated {
                requested: 1,
                available: 0
            }
            .domain(),
            "backend"
        );
    }

    #[test]
    fn test_into_io_error() {
        let io: std::io::Error = Error::bad_data("ASCII85Decode", "x").into();
        assert_eq!(io.kind(), std::io::ErrorKind::InvalidData);
    }
}
