use std::{fmt, io, path::PathBuf};

use thiserror::Error;

/// Fatal conversion failures. Any of these aborts the whole conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("unknown format in state {state}: {line:?}")]
    MalformedLine { state: &'static str, line: String },

    #[error("malformed binary record: {0}")]
    MalformedRecord(String),

    #[error("unsupported {what} version: {version}")]
    UnsupportedVersion { what: &'static str, version: u64 },

    #[error("invalid magic: expected {expected:#010x}, got {got:#010x}")]
    InvalidMagic { expected: u32, got: u32 },

    #[error("unexpected end of input: {0}")]
    UnexpectedEof(String),

    #[error("offset is lower than the header size: {0}")]
    InvalidOffset(u16),

    #[error("unknown method name: {0:?}")]
    InvalidMethodName(String),

    #[error("thread not found: {0}")]
    ThreadNotFound(u32),

    #[error("method not found at address {0:#010x}")]
    MethodNotFound(u32),

    #[error("class not found: {0}")]
    ClassNotFound(u32),

    #[error("reserved method action on thread {thread_id} at address {method_address:#010x}")]
    ReservedAction { thread_id: u32, method_address: u32 },

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("capture header already recorded")]
    DuplicateHeader,

    #[error("io error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Stream(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, ConvertError>;

impl ConvertError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn malformed_line(state: &'static str, line: impl Into<String>) -> Self {
        Self::MalformedLine {
            state,
            line: line.into(),
        }
    }

    pub fn malformed_record(details: impl fmt::Display) -> Self {
        Self::MalformedRecord(details.to_string())
    }

    pub fn eof(details: impl fmt::Display) -> Self {
        Self::UnexpectedEof(details.to_string())
    }
}

/// Recoverable conditions. The adapter records these and keeps going.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertWarning {
    /// Exit action for a thread whose call stack is empty; the event was dropped.
    StackUnderflow { thread_id: u32, method: String },
    /// A thread id listed twice; the first registration was kept.
    DuplicateThread { thread_id: u32, name: String },
}

impl fmt::Display for ConvertWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertWarning::StackUnderflow { thread_id, method } => write!(
                f,
                "failed to exit method without calling record: {method} (thread {thread_id})"
            ),
            ConvertWarning::DuplicateThread { thread_id, name } => {
                write!(f, "duplicate thread {thread_id} ({name:?}) ignored")
            }
        }
    }
}
