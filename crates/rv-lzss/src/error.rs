use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("short input: needed more bytes than were available")]
    ShortInput,

    #[error("back-reference distance exceeds the decompression window")]
    LookbehindBelowZero,

    #[error("checksum mismatch: expected {expected:#x}, computed {actual:#x}")]
    ChecksumMismatch { expected: u32, actual: u32 },

    #[error("decompression would overrun the expected output size")]
    OutputOverrun,
}

pub type Result<T> = std::result::Result<T, Error>;
