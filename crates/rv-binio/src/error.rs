use thiserror::Error;

/// Errors raised by the binary I/O primitives.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short read: expected {expected} bytes at offset {at}")]
    ShortRead { expected: usize, at: u64 },

    #[error("short write: expected {expected} bytes")]
    ShortWrite { expected: usize },

    #[error("string was not NUL-terminated before end of stream")]
    UnterminatedString,

    #[error("compressed integer exceeds 5 continuation groups")]
    CompressedIntOverflow,
}

pub type Result<T> = std::result::Result<T, Error>;
