use thiserror::Error;

/// Errors raised while decoding a WSS or WAV audio stream.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] rv_binio::Error),

    #[error("unknown audio signature {0:?}")]
    InvalidSignature([u8; 4]),

    #[error("unsupported WSS compression type {0}")]
    UnsupportedCompression(u32),

    #[error("WAV stream has no fmt chunk")]
    MissingFmtChunk,

    #[error("WAV stream has no data chunk")]
    MissingDataChunk,

    #[error("unsupported WAV audio format {0} (only PCM/1 is supported)")]
    UnsupportedAudioFormat(u16),

    #[error("unsupported PCM bit depth {0}")]
    UnsupportedBitDepth(u16),
}

pub type Result<T> = std::result::Result<T, Error>;
