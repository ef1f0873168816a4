use std::fmt;
use std::io;

/// Unified error type for the staging stream.
#[derive(Debug)]
pub enum Error {
    /// IO error from any file touched by the download, sort or read steps.
    Io(io::Error),
    /// A record frame could not be decoded (truncated, CRC mismatch, bad UTF-8).
    Corruption(String),
    /// The iterator was advanced past its last record.
    Exhausted,
    /// A record came out of a sorted stream smaller than its predecessor.
    OrderingViolation { previous: String, current: String },
    /// A pipeline operation was called in a state that does not allow it.
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
    /// An identifier too long to fit in a frame.
    RecordTooLarge { id_len: usize, max: usize },
    /// The downloader failed for a reason of its own.
    Download(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "IO error: {e}"),
            Error::Corruption(msg) => write!(f, "Corruption: {msg}"),
            Error::Exhausted => write!(f, "Iterator exhausted"),
            Error::OrderingViolation { previous, current } => {
                write!(f, "Ordering violation: {current:?} follows {previous:?}")
            }
            Error::InvalidState { operation, state } => {
                write!(f, "Cannot call {operation}() on a {state} stream")
            }
            Error::RecordTooLarge { id_len, max } => {
                write!(f, "Identifier of {id_len} bytes exceeds the {max} byte limit")
            }
            Error::Download(msg) => write!(f, "Download failed: {msg}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(e)
    }
}

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
