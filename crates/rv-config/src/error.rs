use thiserror::Error;

/// Errors raised while reading a rapified config.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] rv_binio::Error),

    #[error("not a rapified config (signature: {0:02x?})")]
    BadSignature([u8; 4]),

    #[error("unknown class entry type {0}")]
    UnknownEntryType(u8),

    #[error("unknown variable subtype {0}")]
    UnknownVariableSubtype(u8),

    #[error("unknown array element type {0}")]
    UnknownArrayElementType(u8),
}

pub type Result<T> = std::result::Result<T, Error>;
