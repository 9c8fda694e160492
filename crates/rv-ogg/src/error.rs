use thiserror::Error;

/// Errors raised while reading an OGG/Vorbis header.
#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid OGG page capture pattern")]
    InvalidCapturePattern,

    #[error("packet 0 is not a Vorbis identification header")]
    NotIdentificationHeader,

    #[error("packet 1 is not a Vorbis comment header")]
    NotCommentHeader,
}

pub type Result<T> = std::result::Result<T, Error>;
